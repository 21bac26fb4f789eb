//! Uninstall flow: mirror of the install passes. Every template named in the
//! source payload is removed from the destination it would have been
//! installed to, then the recent-template lists are scrubbed of entries that
//! no longer resolve.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::classify::{self, TemplateFile};
use crate::config::Config;
use crate::registry::HkcuRegistry;
use crate::resolver::ResolvedDestinations;
use crate::shell;
use crate::{mru, paths};

/// Per-file removal record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RemovalOutcome {
    pub file_name: String,
    pub target: PathBuf,
    pub removed: bool,
    pub detail: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct UninstallReport {
    pub source_root: PathBuf,
    pub outcomes: Vec<RemovalOutcome>,
    pub removed: usize,
    pub mru_keys_processed: Vec<String>,
}

/// Delete the installed counterparts of every template in the payload.
pub fn remove_templates(
    templates: &[TemplateFile],
    destinations: &ResolvedDestinations,
) -> Vec<RemovalOutcome> {
    let mut outcomes = Vec::new();
    for template in templates {
        let destination = if template.is_base {
            destinations.base_destination(template.category)
        } else {
            destinations.custom_destination(template.category)
        };
        outcomes.push(remove_one(template, &destination.directory));

        // Custom files may also have landed in the alternate folder on a
        // previous run with different resolution.
        if !template.is_base {
            let alternate = &destinations.custom_alternate.directory;
            if !paths::same_target(alternate, &destination.directory) {
                let candidate = alternate.join(&template.file_name);
                if candidate.exists() {
                    outcomes.push(remove_one(template, alternate));
                }
            }
        }
    }
    outcomes
}

fn remove_one(template: &TemplateFile, directory: &Path) -> RemovalOutcome {
    let target = directory.join(&template.file_name);
    if !target.exists() {
        debug!(target = %target.display(), "not installed; nothing to remove");
        return RemovalOutcome {
            file_name: template.file_name.clone(),
            target,
            removed: false,
            detail: Some("not installed".to_string()),
        };
    }
    match fs::remove_file(&target) {
        Ok(()) => {
            info!(target = %target.display(), "template removed");
            RemovalOutcome {
                file_name: template.file_name.clone(),
                target,
                removed: true,
                detail: None,
            }
        }
        Err(e) => {
            warn!(target = %target.display(), error = %e, "could not remove template");
            RemovalOutcome {
                file_name: template.file_name.clone(),
                target,
                removed: false,
                detail: Some(e.to_string()),
            }
        }
    }
}

/// The full uninstall flow. Per-file failures are reported, not fatal.
pub fn run(config: &Config, source_hint: &Path) -> Result<UninstallReport> {
    let source_root = match classify::resolve_source_root(source_hint) {
        Some(root) => root,
        None => bail!(
            "no recognized templates under {} or its payload subfolders",
            source_hint.display()
        ),
    };
    info!(source = %source_root.display(), "uninstalling templates");

    if let Err(e) = shell::close_running_office_apps() {
        warn!(error = %format!("{e:#}"), "could not close Office applications");
    }

    let registry = HkcuRegistry;
    let destinations = ResolvedDestinations::resolve(&registry, &config.overrides);

    let templates = classify::scan_templates(&source_root);
    let outcomes = remove_templates(&templates, &destinations);
    let removed = outcomes.iter().filter(|outcome| outcome.removed).count();

    // Removed files leave dangling MRU entries behind.
    let mru_keys_processed = mru::repair_stale_entries();

    info!(removed, total = outcomes.len(), "uninstallation finished");
    Ok(UninstallReport {
        source_root,
        outcomes,
        removed,
        mru_keys_processed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DestinationKind, DestinationSpec};
    use tempfile::TempDir;

    fn spec(kind: DestinationKind, directory: &Path) -> DestinationSpec {
        DestinationSpec {
            kind,
            directory: directory.to_path_buf(),
            source: "explicit override".to_string(),
            consulted: Vec::new(),
        }
    }

    fn destinations(root: &Path) -> ResolvedDestinations {
        ResolvedDestinations {
            roaming_templates: spec(DestinationKind::RoamingTemplates, &root.join("Roaming")),
            excel_startup: spec(DestinationKind::ExcelStartup, &root.join("XLSTART")),
            document_themes: spec(DestinationKind::DocumentThemes, &root.join("Themes")),
            word_custom: spec(DestinationKind::WordCustom, &root.join("Custom")),
            powerpoint_custom: spec(DestinationKind::PowerPointCustom, &root.join("Custom")),
            excel_custom: spec(DestinationKind::ExcelCustom, &root.join("Custom")),
            custom_alternate: spec(DestinationKind::CustomAlternate, &root.join("Alternate")),
        }
    }

    #[test]
    fn removes_installed_counterparts() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        fs::write(source.path().join("Normal.dotm"), b"x").unwrap();
        fs::write(source.path().join("Report.dotx"), b"x").unwrap();

        let roaming = dest_root.path().join("Roaming");
        let custom = dest_root.path().join("Custom");
        fs::create_dir_all(&roaming).unwrap();
        fs::create_dir_all(&custom).unwrap();
        fs::write(roaming.join("Normal.dotm"), b"installed").unwrap();
        fs::write(custom.join("Report.dotx"), b"installed").unwrap();

        let templates = classify::scan_templates(source.path());
        let outcomes = remove_templates(&templates, &destinations(dest_root.path()));

        assert_eq!(outcomes.iter().filter(|o| o.removed).count(), 2);
        assert!(!roaming.join("Normal.dotm").exists());
        assert!(!custom.join("Report.dotx").exists());
    }

    #[test]
    fn missing_installed_file_is_reported_not_fatal() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        fs::write(source.path().join("Report.dotx"), b"x").unwrap();

        let templates = classify::scan_templates(source.path());
        let outcomes = remove_templates(&templates, &destinations(dest_root.path()));

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].removed);
        assert_eq!(outcomes[0].detail.as_deref(), Some("not installed"));
    }

    #[test]
    fn alternate_folder_copy_is_also_removed() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        fs::write(source.path().join("Report.dotx"), b"x").unwrap();

        let alternate = dest_root.path().join("Alternate");
        fs::create_dir_all(&alternate).unwrap();
        fs::write(alternate.join("Report.dotx"), b"installed").unwrap();

        let templates = classify::scan_templates(source.path());
        let outcomes = remove_templates(&templates, &destinations(dest_root.path()));

        assert!(outcomes.iter().any(|o| o.removed && o.target.starts_with(&alternate)));
        assert!(!alternate.join("Report.dotx").exists());
    }

    #[test]
    fn base_files_never_touch_custom_folders() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        fs::write(source.path().join("Book.xltx"), b"x").unwrap();

        let custom = dest_root.path().join("Custom");
        fs::create_dir_all(&custom).unwrap();
        fs::write(custom.join("Book.xltx"), b"user file").unwrap();

        let templates = classify::scan_templates(source.path());
        remove_templates(&templates, &destinations(dest_root.path()));

        assert!(custom.join("Book.xltx").exists());
    }

    #[test]
    fn run_fails_without_template_payload() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("notes.txt"), b"x").unwrap();
        assert!(run(&Config::default(), source.path()).is_err());
    }
}
