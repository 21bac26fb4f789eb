//! Recent-template MRU lists in the registry. Each Office app keeps
//! `Item N` / `Item Metadata N` value pairs under one or more
//! `Recent Templates\File MRU` keys; signed-in profiles move the list into
//! `ADAL_*` / `LIVEID_*` container subkeys, which take precedence.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::classify::OfficeApp;
use crate::paths;
use crate::registry;

/// Longest MRU list the rewrite will produce.
pub const MRU_MAX_ENTRIES: usize = 10;

const ITEM_PREFIX: &str = "Item ";
const METADATA_PREFIX: &str = "Item Metadata ";

/// Pull the file path out of a raw `Item N` value. The path follows the last
/// `*`; a value without one is taken as a bare path.
pub fn extract_path(raw: &str) -> String {
    let tail = raw.rsplit('*').next().unwrap_or(raw);
    paths::normalize(tail)
}

/// Render a path as a raw `Item N` registry value.
pub fn format_item(path: &str) -> String {
    format!("[F00000000][T0000000000000000][O00000000]*{path}")
}

/// Render the matching `Item Metadata N` value. The name stem is split off
/// textually so Windows-style paths render the same on any host.
pub fn format_metadata(path: &str) -> String {
    let name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!(
        "<Metadata><AppSpecific><id>{path}</id><nm>{stem}</nm><du>{path}</du></AppSpecific></Metadata>"
    )
}

/// Drop the entries whose extracted path fails the predicate, preserving the
/// order of the survivors.
pub fn repair<F>(entries: Vec<String>, keep: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    entries
        .into_iter()
        .filter(|raw| keep(&extract_path(raw)))
        .collect()
}

/// Build the rewritten path list after recording `new_path`: the new entry
/// first, prior entries (normalized to bare paths) with any occurrence of the
/// same path dropped, capped at `max`.
pub fn record(existing_raw: Vec<String>, new_path: &str, max: usize) -> Vec<String> {
    let new_normalized = paths::normalize(new_path);
    let new_lower = new_normalized.to_lowercase();

    let mut rebuilt = vec![new_normalized];
    for raw in existing_raw {
        if rebuilt.len() == max {
            break;
        }
        let path = extract_path(&raw);
        if path.is_empty() || path.to_lowercase() == new_lower {
            continue;
        }
        rebuilt.push(path);
    }
    rebuilt
}

/// The ordered MRU key paths for one app: per version, any `ADAL_*` or
/// `LIVEID_*` container's `File MRU` first, then the plain `File MRU`.
pub fn mru_key_paths(app: OfficeApp) -> Vec<String> {
    let mut key_paths = Vec::new();
    for version in crate::resolver::OFFICE_VERSIONS {
        let base = format!(
            r"Software\Microsoft\Office\{version}\{}\Recent Templates",
            app.registry_name()
        );
        for subkey in registry::list_subkeys(&base) {
            let upper = subkey.to_uppercase();
            if upper.starts_with("ADAL_") || upper.starts_with("LIVEID_") {
                key_paths.push(format!(r"{base}\{subkey}\File MRU"));
            }
        }
        key_paths.push(format!(r"{base}\File MRU"));
    }
    key_paths.dedup();
    key_paths
}

/// Numbered `Item N` values under an MRU key, sorted by N. Metadata values
/// are rebuilt on write and never read back.
fn read_items(key_path: &str) -> Vec<(u32, String)> {
    let mut items: Vec<(u32, String)> = registry::list_values(key_path)
        .into_iter()
        .filter_map(|(name, value)| {
            if name.starts_with(METADATA_PREFIX) {
                return None;
            }
            let number = name.strip_prefix(ITEM_PREFIX)?.trim().parse().ok()?;
            Some((number, value))
        })
        .collect();
    items.sort_by_key(|(number, _)| *number);
    items
}

/// Record one installed template at the front of every MRU list for its app.
pub fn record_template(app: OfficeApp, installed: &Path) {
    let installed = paths::normalize_path(installed);
    let full_path = installed.to_string_lossy().to_string();

    for key_path in mru_key_paths(app) {
        let existing = read_items(&key_path);
        let previous_len = existing.len();
        let raw_values = existing.into_iter().map(|(_, value)| value).collect();
        let rebuilt = record(raw_values, &full_path, MRU_MAX_ENTRIES);

        let mut ok = true;
        for (position, path) in rebuilt.iter().enumerate() {
            let index = position + 1;
            ok &= registry::write_value(&key_path, &format!("{ITEM_PREFIX}{index}"), &format_item(path));
            ok &= registry::write_value(
                &key_path,
                &format!("{METADATA_PREFIX}{index}"),
                &format_metadata(path),
            );
        }
        // Stale tail values from a previously longer list.
        for index in rebuilt.len() + 1..=previous_len {
            registry::delete_value(&key_path, &format!("{ITEM_PREFIX}{index}"));
            registry::delete_value(&key_path, &format!("{METADATA_PREFIX}{index}"));
        }

        if ok {
            debug!(key = %key_path, file = %full_path, "recent-template list updated");
        } else {
            warn!(key = %key_path, "could not rewrite recent-template list");
        }
    }
}

/// Delete MRU values whose target file no longer exists. Returns the key
/// paths that were processed.
pub fn repair_stale_entries() -> Vec<String> {
    repair_stale_entries_with(|path| PathBuf::from(path).exists())
}

/// Repair with an injected validity predicate over extracted paths.
pub fn repair_stale_entries_with<F>(is_still_valid: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut processed = Vec::new();
    for app in OfficeApp::ALL {
        for key_path in mru_key_paths(app) {
            let mut removed = 0usize;
            for (name, value) in registry::list_values(&key_path) {
                // Metadata values share the "Item " prefix; their matching
                // item decides whether they stay.
                if name.starts_with(METADATA_PREFIX) || !name.starts_with(ITEM_PREFIX) {
                    continue;
                }
                let path = extract_path(&value);
                if path.is_empty() || is_still_valid(&path) {
                    continue;
                }
                if registry::delete_value(&key_path, &name) {
                    removed += 1;
                    if let Some(index) = name.strip_prefix(ITEM_PREFIX) {
                        registry::delete_value(&key_path, &format!("{METADATA_PREFIX}{}", index.trim()));
                    }
                } else {
                    warn!(key = %key_path, value = %name, "could not delete stale entry");
                }
            }
            if removed > 0 {
                debug!(key = %key_path, removed, "stale recent-template entries removed");
            }
            processed.push(key_path);
        }
    }
    processed
}
