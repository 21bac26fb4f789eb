use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// File name stems that mark a template as one of the Office-managed "base"
/// starter files (Normal.dotm, Blank.potx, Book.xltx, Sheet.xltm, ...).
pub const BASE_TEMPLATE_STEMS: &[&str] = &["Normal", "Blank", "Book", "Sheet"];

/// Subfolders of the source root that may hold the template payload.
const SOURCE_SUBFOLDERS: &[&str] = &["payload", "templates", "extracted"];

/// Office application a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum OfficeApp {
    Word,
    PowerPoint,
    Excel,
}

impl OfficeApp {
    pub const ALL: [OfficeApp; 3] = [OfficeApp::Word, OfficeApp::PowerPoint, OfficeApp::Excel];

    /// Name used in `Software\Microsoft\Office\<version>\<name>` registry keys.
    pub fn registry_name(&self) -> &'static str {
        match self {
            OfficeApp::Word => "Word",
            OfficeApp::PowerPoint => "PowerPoint",
            OfficeApp::Excel => "Excel",
        }
    }

    pub fn executable(&self) -> &'static str {
        match self {
            OfficeApp::Word => "winword.exe",
            OfficeApp::PowerPoint => "powerpnt.exe",
            OfficeApp::Excel => "excel.exe",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OfficeApp::Word => "Microsoft Word",
            OfficeApp::PowerPoint => "Microsoft PowerPoint",
            OfficeApp::Excel => "Microsoft Excel",
        }
    }
}

/// Category a recognized template file falls into, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TemplateCategory {
    Word,
    PowerPoint,
    Excel,
    DocumentTheme,
}

impl TemplateCategory {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "dotx" | "dotm" => Some(TemplateCategory::Word),
            "potx" | "potm" => Some(TemplateCategory::PowerPoint),
            "xltx" | "xltm" => Some(TemplateCategory::Excel),
            "thmx" => Some(TemplateCategory::DocumentTheme),
            _ => None,
        }
    }

    /// The application to relaunch for this category; themes have none.
    pub fn app(&self) -> Option<OfficeApp> {
        match self {
            TemplateCategory::Word => Some(OfficeApp::Word),
            TemplateCategory::PowerPoint => Some(OfficeApp::PowerPoint),
            TemplateCategory::Excel => Some(OfficeApp::Excel),
            TemplateCategory::DocumentTheme => None,
        }
    }
}

/// A classified source template file. Immutable once built.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateFile {
    pub source: PathBuf,
    pub file_name: String,
    pub category: TemplateCategory,
    pub is_base: bool,
}

/// Classify a file name into its category and base/custom split. Returns
/// `None` for unrecognized extensions; arbitrary files may coexist in the
/// source tree, so this is a silent skip rather than an error.
pub fn classify(file_name: &str) -> Option<(TemplateCategory, bool)> {
    let ext = Path::new(file_name).extension()?.to_string_lossy();
    let category = TemplateCategory::from_extension(&ext)?;
    let is_base = BASE_TEMPLATE_STEMS
        .iter()
        .any(|stem| starts_with_ignore_case(file_name, stem));
    Some((category, is_base))
}

// Char-wise so multibyte file names never land on a byte slice boundary.
fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    let mut name_chars = name.chars();
    prefix
        .chars()
        .all(|p| name_chars.next().is_some_and(|n| n.eq_ignore_ascii_case(&p)))
}

/// Locate the folder actually holding the template payload: the hint itself
/// or one of its well-known subfolders, whichever contains at least one
/// recognized template. `None` means the environment check failed.
pub fn resolve_source_root(hint: &Path) -> Option<PathBuf> {
    let mut candidates = vec![hint.to_path_buf()];
    for sub in SOURCE_SUBFOLDERS {
        candidates.push(hint.join(sub));
    }

    candidates
        .into_iter()
        .find(|dir| !scan_templates(dir).is_empty())
        .map(|dir| paths::normalize_path(&dir))
}

/// Enumerate recognized template files at the top level of `dir`, classified
/// and sorted by file name for deterministic processing order.
pub fn scan_templates(dir: &Path) -> Vec<TemplateFile> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return found,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        if let Some((category, is_base)) = classify(&file_name) {
            found.push(TemplateFile {
                source: path,
                file_name,
                category,
                is_base,
            });
        }
    }

    found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    found
}
