use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::classify::TemplateCategory;
use crate::config::DestinationOverrides;
use crate::paths;
use crate::registry::RegistryLookup;

/// Office product versions consulted in descending order.
pub const OFFICE_VERSIONS: &[&str] = &["16.0", "15.0", "14.0", "12.0"];

const USER_SHELL_FOLDERS_KEY: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\User Shell Folders";

/// One resolvable destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum DestinationKind {
    RoamingTemplates,
    ExcelStartup,
    DocumentThemes,
    WordCustom,
    PowerPointCustom,
    ExcelCustom,
    CustomAlternate,
}

impl DestinationKind {
    pub const ALL: [DestinationKind; 7] = [
        DestinationKind::RoamingTemplates,
        DestinationKind::ExcelStartup,
        DestinationKind::DocumentThemes,
        DestinationKind::WordCustom,
        DestinationKind::PowerPointCustom,
        DestinationKind::ExcelCustom,
        DestinationKind::CustomAlternate,
    ];

    /// Human-readable label used for logging and folder-open reporting.
    pub fn label(&self) -> &'static str {
        match self {
            DestinationKind::RoamingTemplates => "roaming templates",
            DestinationKind::ExcelStartup => "Excel startup",
            DestinationKind::DocumentThemes => "document themes",
            DestinationKind::WordCustom => "Word custom templates",
            DestinationKind::PowerPointCustom => "PowerPoint custom templates",
            DestinationKind::ExcelCustom => "Excel custom templates",
            DestinationKind::CustomAlternate => "alternate custom templates",
        }
    }
}

/// A resolved destination: which candidate source produced the directory and
/// the full list of sources consulted before it, in order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DestinationSpec {
    pub kind: DestinationKind,
    pub directory: PathBuf,
    pub source: String,
    pub consulted: Vec<String>,
}

/// All destination directories for one run, resolved once up front and
/// read-only afterward.
#[derive(Debug, Clone)]
pub struct ResolvedDestinations {
    pub roaming_templates: DestinationSpec,
    pub excel_startup: DestinationSpec,
    pub document_themes: DestinationSpec,
    pub word_custom: DestinationSpec,
    pub powerpoint_custom: DestinationSpec,
    pub excel_custom: DestinationSpec,
    pub custom_alternate: DestinationSpec,
}

impl ResolvedDestinations {
    pub fn resolve(registry: &dyn RegistryLookup, overrides: &DestinationOverrides) -> Self {
        let resolver = Resolver::new(registry, overrides);
        let resolved = ResolvedDestinations {
            roaming_templates: resolver.resolve(DestinationKind::RoamingTemplates),
            excel_startup: resolver.resolve(DestinationKind::ExcelStartup),
            document_themes: resolver.resolve(DestinationKind::DocumentThemes),
            word_custom: resolver.resolve(DestinationKind::WordCustom),
            powerpoint_custom: resolver.resolve(DestinationKind::PowerPointCustom),
            excel_custom: resolver.resolve(DestinationKind::ExcelCustom),
            custom_alternate: resolver.resolve(DestinationKind::CustomAlternate),
        };
        for spec in resolved.all() {
            debug!(
                kind = spec.kind.label(),
                directory = %spec.directory.display(),
                source = %spec.source,
                "destination resolved"
            );
        }
        if paths::same_target(&resolved.word_custom.directory, &resolved.custom_alternate.directory)
        {
            debug!("custom and alternate custom directories resolve to the same folder");
        }
        if !path_under(
            &resolved.document_themes.directory,
            &resolved.roaming_templates.directory,
        ) {
            debug!("theme folder resolved outside the roaming template folder");
        }
        resolved
    }

    pub fn get(&self, kind: DestinationKind) -> &DestinationSpec {
        match kind {
            DestinationKind::RoamingTemplates => &self.roaming_templates,
            DestinationKind::ExcelStartup => &self.excel_startup,
            DestinationKind::DocumentThemes => &self.document_themes,
            DestinationKind::WordCustom => &self.word_custom,
            DestinationKind::PowerPointCustom => &self.powerpoint_custom,
            DestinationKind::ExcelCustom => &self.excel_custom,
            DestinationKind::CustomAlternate => &self.custom_alternate,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &DestinationSpec> {
        DestinationKind::ALL.iter().map(|kind| self.get(*kind))
    }

    /// Where a base template for `category` belongs: Word and PowerPoint
    /// starters live in the roaming template folder, Excel starters in
    /// XLSTART, themes in the theme folder.
    pub fn base_destination(&self, category: TemplateCategory) -> &DestinationSpec {
        match category {
            TemplateCategory::Word | TemplateCategory::PowerPoint => &self.roaming_templates,
            TemplateCategory::Excel => &self.excel_startup,
            TemplateCategory::DocumentTheme => &self.document_themes,
        }
    }

    /// Where a custom template for `category` belongs.
    pub fn custom_destination(&self, category: TemplateCategory) -> &DestinationSpec {
        match category {
            TemplateCategory::Word => &self.word_custom,
            TemplateCategory::PowerPoint => &self.powerpoint_custom,
            TemplateCategory::Excel => &self.excel_custom,
            TemplateCategory::DocumentTheme => &self.document_themes,
        }
    }
}

type Candidate<'a> = (String, Box<dyn Fn() -> Option<String> + 'a>);

struct Resolver<'a> {
    registry: &'a dyn RegistryLookup,
    overrides: &'a DestinationOverrides,
    appdata: PathBuf,
    documents: PathBuf,
    profile: PathBuf,
}

impl<'a> Resolver<'a> {
    fn new(registry: &'a dyn RegistryLookup, overrides: &'a DestinationOverrides) -> Self {
        let profile = user_profile_dir();
        let appdata = registry
            .lookup(USER_SHELL_FOLDERS_KEY, "AppData")
            .map(|raw| PathBuf::from(paths::normalize(&raw)))
            .or_else(|| std::env::var("APPDATA").ok().map(PathBuf::from))
            .unwrap_or_else(|| profile.join("AppData").join("Roaming"));
        let documents = registry
            .lookup(USER_SHELL_FOLDERS_KEY, "Personal")
            .map(|raw| PathBuf::from(paths::normalize(&raw)))
            .unwrap_or_else(|| profile.join("Documents"));
        Resolver {
            registry,
            overrides,
            appdata,
            documents,
            profile,
        }
    }

    /// First-match-wins over the ordered candidate list; once a candidate
    /// yields a non-empty value, later ones are never consulted. An empty
    /// chain falls back to the hardcoded default and logs a warning.
    fn resolve(&self, kind: DestinationKind) -> DestinationSpec {
        let mut consulted = Vec::new();
        for (label, eval) in self.candidates(kind) {
            consulted.push(label.clone());
            if let Some(raw) = eval() {
                let normalized = paths::normalize(&raw);
                if !normalized.is_empty() {
                    return DestinationSpec {
                        kind,
                        directory: PathBuf::from(normalized),
                        source: label,
                        consulted,
                    };
                }
            }
        }

        let fallback = self.hardcoded_fallback(kind);
        warn!(
            kind = kind.label(),
            fallback = %fallback.display(),
            "no destination source yielded a value; using hardcoded fallback"
        );
        DestinationSpec {
            kind,
            directory: paths::normalize_path(&fallback),
            source: "hardcoded fallback".to_string(),
            consulted,
        }
    }

    fn candidates(&self, kind: DestinationKind) -> Vec<Candidate<'_>> {
        match kind {
            // The explicit custom override applies to all three apps.
            DestinationKind::WordCustom => {
                self.custom_chain("Word", self.overrides.custom_templates.as_ref())
            }
            DestinationKind::PowerPointCustom => {
                self.custom_chain("PowerPoint", self.overrides.custom_templates.as_ref())
            }
            DestinationKind::ExcelCustom => {
                self.custom_chain("Excel", self.overrides.custom_templates.as_ref())
            }
            DestinationKind::CustomAlternate => {
                let mut chain =
                    override_candidate(self.overrides.custom_templates_alternate.as_ref());
                chain.push(self.profile_candidate(
                    "documents folder default",
                    self.documents.join("Plantillas personalizadas de Office"),
                ));
                chain
            }
            DestinationKind::RoamingTemplates => {
                let mut chain = override_candidate(self.overrides.roaming_templates.as_ref());
                chain.push(self.profile_candidate(
                    "roaming profile default",
                    self.appdata.join("Microsoft").join("Templates"),
                ));
                chain
            }
            DestinationKind::ExcelStartup => {
                let mut chain = override_candidate(self.overrides.excel_startup.as_ref());
                chain.push(self.profile_candidate(
                    "roaming profile default",
                    self.appdata.join("Microsoft").join("Excel").join("XLSTART"),
                ));
                chain
            }
            DestinationKind::DocumentThemes => {
                vec![self.profile_candidate(
                    "roaming profile default",
                    self.appdata
                        .join("Microsoft")
                        .join("Templates")
                        .join("Document Themes"),
                )]
            }
        }
    }

    /// The registry chain shared by the three per-app custom folders:
    /// `PersonalTemplates` under `<app>\Options`, then `UserTemplates` under
    /// `Common\General`, each across descending product versions, then the
    /// computed Documents default.
    fn custom_chain<'b>(
        &'b self,
        app: &'static str,
        explicit: Option<&'b PathBuf>,
    ) -> Vec<Candidate<'b>> {
        let mut chain = override_candidate(explicit);
        for version in OFFICE_VERSIONS {
            chain.push((
                format!("registry {version} {app} PersonalTemplates"),
                Box::new(move || {
                    self.registry.lookup(
                        &format!(r"Software\Microsoft\Office\{version}\{app}\Options"),
                        "PersonalTemplates",
                    )
                }),
            ));
        }
        for version in OFFICE_VERSIONS {
            chain.push((
                format!("registry {version} Common UserTemplates"),
                Box::new(move || {
                    self.registry.lookup(
                        &format!(r"Software\Microsoft\Office\{version}\Common\General"),
                        "UserTemplates",
                    )
                }),
            ));
        }
        chain.push(self.profile_candidate(
            "documents folder default",
            self.documents.join("Custom Templates"),
        ));
        chain
    }

    fn profile_candidate(&self, label: &str, path: PathBuf) -> Candidate<'_> {
        (
            label.to_string(),
            Box::new(move || Some(path.to_string_lossy().to_string())),
        )
    }

    fn hardcoded_fallback(&self, kind: DestinationKind) -> PathBuf {
        match kind {
            DestinationKind::WordCustom
            | DestinationKind::PowerPointCustom
            | DestinationKind::ExcelCustom => {
                self.profile.join("Documents").join("Custom Templates")
            }
            DestinationKind::CustomAlternate => self
                .profile
                .join("Documents")
                .join("Plantillas personalizadas de Office"),
            DestinationKind::RoamingTemplates => self
                .profile
                .join("AppData")
                .join("Roaming")
                .join("Microsoft")
                .join("Templates"),
            DestinationKind::ExcelStartup => self
                .profile
                .join("AppData")
                .join("Roaming")
                .join("Microsoft")
                .join("Excel")
                .join("XLSTART"),
            DestinationKind::DocumentThemes => self
                .profile
                .join("AppData")
                .join("Roaming")
                .join("Microsoft")
                .join("Templates")
                .join("Document Themes"),
        }
    }
}

fn override_candidate(explicit: Option<&PathBuf>) -> Vec<Candidate<'_>> {
    match explicit {
        Some(path) => vec![(
            "explicit override".to_string(),
            Box::new(move || Some(path.to_string_lossy().to_string())),
        )],
        None => Vec::new(),
    }
}

fn user_profile_dir() -> PathBuf {
    std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Whether a path sits under the given root, compared on normalized forms.
pub fn path_under(path: &Path, root: &Path) -> bool {
    let path_key = paths::dedup_key(path);
    let root_key = paths::dedup_key(root);
    path_key == root_key || path_key.starts_with(&format!("{root_key}\\")) || {
        let root_slash = root_key.replace('\\', "/");
        path_key.replace('\\', "/").starts_with(&format!("{root_slash}/"))
    }
}
