use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::classify;

/// Authors accepted when no override is configured.
pub const DEFAULT_ALLOWED_AUTHORS: &[&str] = &["www.grada.cc", "www.gradaz.com"];

/// Entry in the OOXML package that carries the document's core properties.
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Result of validating a single file or listing a folder.
#[derive(Debug, Clone)]
pub struct AuthorCheck {
    pub allowed: bool,
    pub authors: Vec<String>,
    pub detail: String,
}

/// Case-insensitive membership test against the allow-list.
pub fn is_allowed(declared_author: &str, allow_list: &[String]) -> bool {
    allow_list
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(declared_author.trim()))
}

/// Read the declared author (`dc:creator`) from an OOXML template package.
///
/// `Ok(None)` means the package is readable but carries no author;
/// `Err` means the package itself could not be read. Both fail closed when
/// validation is enabled.
pub fn extract_author(template: &Path) -> Result<Option<String>> {
    let file = File::open(template)
        .with_context(|| format!("cannot open template: {}", template.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("not a readable template package: {}", template.display()))?;

    let mut xml = String::new();
    match archive.by_name(CORE_PROPERTIES_PART) {
        Ok(mut part) => {
            part.read_to_string(&mut xml)
                .with_context(|| format!("cannot read core properties: {}", template.display()))?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("cannot open core properties: {}", template.display())
            })
        }
    }

    parse_creator(&xml)
}

/// Pull the first non-empty `creator` element out of core.xml.
fn parse_creator(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut in_creator = false;

    loop {
        match reader.read_event().context("malformed core properties XML")? {
            Event::Start(e) if e.local_name().as_ref() == b"creator" => in_creator = true,
            Event::End(e) if e.local_name().as_ref() == b"creator" => in_creator = false,
            Event::Text(t) if in_creator => {
                let text = t.unescape().context("malformed creator text")?;
                let text = text.trim();
                if !text.is_empty() {
                    return Ok(Some(text.to_string()));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Decide whether a single template file may be installed.
///
/// Document themes carry no meaningful author metadata and are always let
/// through, matching the host application's behavior. With validation
/// disabled every file is allowed.
pub fn check_template(
    template: &Path,
    allow_list: &[String],
    validation_enabled: bool,
) -> AuthorCheck {
    if !validation_enabled {
        return AuthorCheck {
            allowed: true,
            authors: Vec::new(),
            detail: "author validation disabled".to_string(),
        };
    }

    let is_theme = template
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("thmx"))
        .unwrap_or(false);
    if is_theme {
        return AuthorCheck {
            allowed: true,
            authors: Vec::new(),
            detail: "author check skipped for document themes".to_string(),
        };
    }

    match extract_author(template) {
        Ok(Some(author)) => {
            let allowed = is_allowed(&author, allow_list);
            debug!(file = %template.display(), %author, allowed, "author checked");
            AuthorCheck {
                allowed,
                detail: if allowed {
                    format!("author approved: {author}")
                } else {
                    format!("author not in allow-list: {author}")
                },
                authors: vec![author],
            }
        }
        Ok(None) => AuthorCheck {
            allowed: false,
            authors: Vec::new(),
            detail: format!("no author declared in {}", template.display()),
        },
        Err(e) => AuthorCheck {
            allowed: false,
            authors: Vec::new(),
            detail: format!("unreadable author metadata: {e:#}"),
        },
    }
}

/// Validate a file, or list authors for every template in a folder. Backs
/// the `--check-author` CLI mode.
pub fn check_target(target: &Path, allow_list: &[String], validation_enabled: bool) -> AuthorCheck {
    if !target.exists() {
        return AuthorCheck {
            allowed: false,
            authors: Vec::new(),
            detail: format!("path not found: {}", target.display()),
        };
    }

    if target.is_dir() {
        let mut authors = Vec::new();
        for template in classify::scan_templates(target) {
            if template.category == classify::TemplateCategory::DocumentTheme {
                continue;
            }
            match extract_author(&template.source) {
                Ok(Some(author)) => {
                    debug!(file = %template.file_name, %author, "author listed");
                    authors.push(author);
                }
                Ok(None) => debug!(file = %template.file_name, "no author declared"),
                Err(e) => warn!(file = %template.file_name, error = %format!("{e:#}"), "unreadable template"),
            }
        }
        let detail = if authors.is_empty() {
            format!("no authored templates found in {}", target.display())
        } else {
            format!("authors listed for {}", target.display())
        };
        return AuthorCheck {
            allowed: true,
            authors,
            detail,
        };
    }

    check_template(target, allow_list, validation_enabled)
}
