use std::path::PathBuf;

use crate::author::DEFAULT_ALLOWED_AUTHORS;
use crate::paths;

/// Explicit destination-directory overrides. Each takes precedence over the
/// registry lookup chain for its folder.
#[derive(Debug, Clone, Default)]
pub struct DestinationOverrides {
    pub custom_templates: Option<PathBuf>,
    pub custom_templates_alternate: Option<PathBuf>,
    pub roaming_templates: Option<PathBuf>,
    pub excel_startup: Option<PathBuf>,
}

/// Fully resolved configuration. Env-derived string flags are normalized to
/// booleans here, before anything downstream sees them.
#[derive(Debug, Clone)]
pub struct Config {
    pub design_mode: bool,
    pub allowed_authors: Vec<String>,
    pub author_validation_enabled: bool,
    pub relaunch_delay_secs: u64,
    pub overrides: DestinationOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            design_mode: false,
            allowed_authors: default_allowed_authors(),
            author_validation_enabled: true,
            relaunch_delay_secs: 0,
            overrides: DestinationOverrides::default(),
        }
    }
}

impl Config {
    /// Build the configuration from environment variables, then layer the
    /// CLI values on top (CLI wins over env, env wins over defaults).
    pub fn from_env(
        cli_design_mode: bool,
        cli_allowed_authors: Option<&str>,
        cli_disable_validation: bool,
        cli_relaunch_delay: Option<u64>,
    ) -> Self {
        let design_mode = cli_design_mode || env_flag("IsDesignModeEnabled", false);

        let allowed_authors = cli_allowed_authors
            .map(parse_author_list)
            .or_else(|| {
                std::env::var("AllowedTemplateAuthors")
                    .ok()
                    .as_deref()
                    .map(parse_author_list)
            })
            .filter(|authors| !authors.is_empty())
            .unwrap_or_else(default_allowed_authors);

        let author_validation_enabled =
            !cli_disable_validation && env_flag("AuthorValidationEnabled", true);

        let relaunch_delay_secs = cli_relaunch_delay.unwrap_or_else(|| {
            std::env::var("DOCUMENT_THEME_OPEN_DELAY_SECONDS")
                .ok()
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(0)
        });

        Config {
            design_mode,
            allowed_authors,
            author_validation_enabled,
            relaunch_delay_secs,
            overrides: DestinationOverrides {
                custom_templates: env_path("CUSTOM_OFFICE_TEMPLATE_PATH"),
                custom_templates_alternate: env_path("CUSTOM_OFFICE_ADDITIONAL_TEMPLATE_PATH"),
                roaming_templates: env_path("ROAMING_TEMPLATE_FOLDER_PATH"),
                excel_startup: env_path("EXCEL_STARTUP_FOLDER_PATH"),
            },
        }
    }
}

pub fn default_allowed_authors() -> Vec<String> {
    DEFAULT_ALLOWED_AUTHORS.iter().map(|s| s.to_string()).collect()
}

/// Normalize a string-typed boolean flag: "true"/"1"/"yes"/"on" in any case
/// mean true, everything else means false.
pub fn parse_bool_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Read a boolean env flag, falling back to `default` when unset or empty.
fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_bool_flag(&raw),
        _ => default,
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|raw| paths::normalize(&raw))
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

/// Split a semicolon-separated author list, dropping empty segments.
pub fn parse_author_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|author| author.trim().to_string())
        .filter(|author| !author.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_flags_normalize_accepted_spellings() {
        for raw in ["true", "TRUE", "1", "yes", "Yes", "on", " ON "] {
            assert!(parse_bool_flag(raw), "expected {raw:?} to be true");
        }
        for raw in ["false", "0", "no", "off", "", "enabled"] {
            assert!(!parse_bool_flag(raw), "expected {raw:?} to be false");
        }
    }

    #[test]
    fn author_list_splits_on_semicolons() {
        assert_eq!(
            parse_author_list("www.grada.cc; www.gradaz.com;;"),
            vec!["www.grada.cc".to_string(), "www.gradaz.com".to_string()]
        );
        assert!(parse_author_list(" ; ").is_empty());
    }

    #[test]
    fn defaults_enable_validation_with_stock_allow_list() {
        let config = Config::default();
        assert!(config.author_validation_enabled);
        assert!(!config.design_mode);
        assert_eq!(config.relaunch_delay_secs, 0);
        assert_eq!(config.allowed_authors, default_allowed_authors());
    }

    #[test]
    fn cli_values_win_over_defaults() {
        let config = Config::from_env(true, Some("a.example;b.example"), true, Some(3));
        assert!(config.design_mode);
        assert!(!config.author_validation_enabled);
        assert_eq!(config.relaunch_delay_secs, 3);
        assert_eq!(config.allowed_authors, vec!["a.example", "b.example"]);
    }
}
