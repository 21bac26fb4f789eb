//! Installation orchestrator: validates the source payload, stages base and
//! custom templates into their resolved destinations, then performs the
//! desktop follow-ups (folder opening, application relaunch, MRU updates).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Local;
use tracing::{debug, info, warn};

use crate::author;
use crate::classify::{self, OfficeApp, TemplateCategory, TemplateFile};
use crate::config::Config;
use crate::copy_engine::{self, CopyOutcome, CopyStatus};
use crate::folders::FolderTargetSet;
use crate::mru;
use crate::registry::HkcuRegistry;
use crate::resolver::ResolvedDestinations;
use crate::shell;

/// Aggregate counters over the per-file outcomes.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Totals {
    pub copied: usize,
    pub skipped: usize,
    pub blocked: usize,
    pub failed: usize,
}

impl Totals {
    pub fn from_outcomes(outcomes: &[CopyOutcome]) -> Self {
        let mut totals = Totals::default();
        for outcome in outcomes {
            match outcome.status {
                CopyStatus::Copied => totals.copied += 1,
                CopyStatus::SkippedSameLocation => totals.skipped += 1,
                CopyStatus::Blocked => totals.blocked += 1,
                CopyStatus::Failed(_) => totals.failed += 1,
            }
        }
        totals
    }
}

/// Full record of one install run, serializable for `--report`.
#[derive(Debug, serde::Serialize)]
pub struct InstallReport {
    pub started_at: String,
    pub source_root: PathBuf,
    pub design_mode: bool,
    pub destinations: Vec<crate::resolver::DestinationSpec>,
    pub outcomes: Vec<CopyOutcome>,
    pub totals: Totals,
    pub folders_opened: Vec<PathBuf>,
    pub apps_relaunched: Vec<String>,
    pub mru_keys_processed: Vec<String>,
}

/// Result of the staging passes, before any desktop follow-up runs.
#[derive(Debug)]
pub struct StagedInstall {
    pub outcomes: Vec<CopyOutcome>,
    pub folder_targets: FolderTargetSet,
    pub apps_to_relaunch: Vec<OfficeApp>,
    pub theme_installed: bool,
}

/// Run the staging passes over every recognized template: base files first,
/// then custom ones, the author gate in front of each copy.
pub fn stage_templates(
    templates: &[TemplateFile],
    destinations: &ResolvedDestinations,
    config: &Config,
) -> StagedInstall {
    let mut staged = StagedInstall {
        outcomes: Vec::new(),
        folder_targets: FolderTargetSet::new(),
        apps_to_relaunch: Vec::new(),
        theme_installed: false,
    };

    for template in templates.iter().filter(|t| t.is_base) {
        stage_one(template, destinations.base_destination(template.category), config, &mut staged);
    }
    for template in templates.iter().filter(|t| !t.is_base) {
        stage_one(template, destinations.custom_destination(template.category), config, &mut staged);
    }

    staged
}

fn stage_one(
    template: &TemplateFile,
    destination: &crate::resolver::DestinationSpec,
    config: &Config,
    staged: &mut StagedInstall,
) {
    let check = author::check_template(
        &template.source,
        &config.allowed_authors,
        config.author_validation_enabled,
    );
    if !check.allowed {
        warn!(file = %template.file_name, detail = %check.detail, "template blocked");
        staged.outcomes.push(copy_engine::blocked(
            &template.source,
            &destination.directory,
            check.detail,
        ));
        return;
    }

    let outcome = copy_engine::copy_with_backup(&template.source, &destination.directory);
    let installed = outcome.copied();
    if installed {
        staged.folder_targets.register(
            &destination.directory,
            true,
            Some(&outcome.destination),
        );
        if template.category == TemplateCategory::DocumentTheme {
            staged.theme_installed = true;
        }
        if let Some(app) = template.category.app() {
            if !staged.apps_to_relaunch.contains(&app) {
                staged.apps_to_relaunch.push(app);
            }
            // Base starters and themes never enter the recent-template lists.
            if !template.is_base {
                mru::record_template(app, &outcome.destination);
            }
        }
    }
    staged.outcomes.push(outcome);
}

/// The full install flow.
pub fn run(config: &Config, source_hint: &Path) -> Result<InstallReport> {
    let started_at = Local::now().to_rfc3339();

    let source_root = match classify::resolve_source_root(source_hint) {
        Some(root) => root,
        None => bail!(
            "no recognized templates under {} or its payload subfolders",
            source_hint.display()
        ),
    };
    info!(source = %source_root.display(), "installing templates");

    if let Err(e) = shell::close_running_office_apps() {
        warn!(error = %format!("{e:#}"), "could not close Office applications");
    }

    let registry = HkcuRegistry;
    let destinations = ResolvedDestinations::resolve(&registry, &config.overrides);

    let templates = classify::scan_templates(&source_root);
    debug!(count = templates.len(), "templates recognized");
    let staged = stage_templates(&templates, &destinations, config);

    // After the copy passes, so freshly recorded entries survive the sweep.
    let mru_keys_processed = mru::repair_stale_entries();

    let mut folders_opened = Vec::new();
    if !staged.folder_targets.is_empty() {
        debug!(targets = staged.folder_targets.len(), "folder targets collected");
    }
    for target in staged.folder_targets.to_open() {
        shell::open_folder(&target);
        folders_opened.push(target.directory);
    }

    if staged.theme_installed && config.relaunch_delay_secs > 0 {
        debug!(seconds = config.relaunch_delay_secs, "waiting before relaunching applications");
        std::thread::sleep(Duration::from_secs(config.relaunch_delay_secs));
    }

    let mut apps_relaunched = Vec::new();
    for app in &staged.apps_to_relaunch {
        shell::launch_app(*app);
        apps_relaunched.push(app.display_name().to_string());
    }

    let totals = Totals::from_outcomes(&staged.outcomes);
    info!(
        copied = totals.copied,
        skipped = totals.skipped,
        blocked = totals.blocked,
        failed = totals.failed,
        "installation finished"
    );

    Ok(InstallReport {
        started_at,
        source_root,
        design_mode: config.design_mode,
        destinations: destinations.all().cloned().collect(),
        outcomes: staged.outcomes,
        totals,
        folders_opened,
        apps_relaunched,
        mru_keys_processed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DestinationKind, DestinationSpec};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

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
            excel_custom: spec(DestinationKind::ExcelCustom, &root.join("CustomExcel")),
            custom_alternate: spec(DestinationKind::CustomAlternate, &root.join("Custom")),
        }
    }

    fn write_template(path: &Path, author: &str) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("docProps/core.xml", FileOptions::default())
            .unwrap();
        let xml = format!(
            "<cp:coreProperties xmlns:cp=\"x\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
             <dc:creator>{author}</dc:creator></cp:coreProperties>"
        );
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    fn test_config() -> Config {
        Config::default()
    }

    #[test]
    fn base_templates_go_to_base_destinations() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        write_template(&source.path().join("Normal.dotm"), "www.grada.cc");
        write_template(&source.path().join("Book.xltx"), "www.grada.cc");

        let templates = classify::scan_templates(source.path());
        let staged = stage_templates(&templates, &destinations(dest_root.path()), &test_config());

        let totals = Totals::from_outcomes(&staged.outcomes);
        assert_eq!(totals.copied, 2);
        assert!(dest_root.path().join("Roaming").join("Normal.dotm").exists());
        assert!(dest_root.path().join("XLSTART").join("Book.xltx").exists());
    }

    #[test]
    fn custom_templates_go_to_custom_destinations_and_queue_relaunch() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        write_template(&source.path().join("Report.dotx"), "www.grada.cc");
        write_template(&source.path().join("Pitch.potx"), "www.gradaz.com");

        let templates = classify::scan_templates(source.path());
        let staged = stage_templates(&templates, &destinations(dest_root.path()), &test_config());

        assert!(dest_root.path().join("Custom").join("Report.dotx").exists());
        assert!(dest_root.path().join("Custom").join("Pitch.potx").exists());
        // Scan order is by file name, so Pitch.potx stages first.
        assert_eq!(
            staged.apps_to_relaunch,
            vec![OfficeApp::PowerPoint, OfficeApp::Word]
        );
        // Both custom copies land in the same folder; one open target.
        assert_eq!(staged.folder_targets.to_open().len(), 1);
    }

    #[test]
    fn disallowed_author_is_blocked_and_not_copied() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        write_template(&source.path().join("Evil.dotx"), "evil.example");

        let templates = classify::scan_templates(source.path());
        let staged = stage_templates(&templates, &destinations(dest_root.path()), &test_config());

        let totals = Totals::from_outcomes(&staged.outcomes);
        assert_eq!(totals.blocked, 1);
        assert_eq!(totals.copied, 0);
        assert!(!dest_root.path().join("Custom").join("Evil.dotx").exists());
        assert!(staged.apps_to_relaunch.is_empty());
    }

    #[test]
    fn theme_install_sets_the_delay_flag_without_relaunch() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        fs::write(source.path().join("brand.thmx"), b"opaque theme").unwrap();

        let templates = classify::scan_templates(source.path());
        let staged = stage_templates(&templates, &destinations(dest_root.path()), &test_config());

        assert!(staged.theme_installed);
        assert!(staged.apps_to_relaunch.is_empty());
        assert!(dest_root.path().join("Themes").join("brand.thmx").exists());
    }

    #[test]
    fn existing_destination_file_is_backed_up() {
        let source = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();
        write_template(&source.path().join("Report.dotx"), "www.grada.cc");
        let custom = dest_root.path().join("Custom");
        fs::create_dir_all(&custom).unwrap();
        fs::write(custom.join("Report.dotx"), b"previous").unwrap();

        let templates = classify::scan_templates(source.path());
        let staged = stage_templates(&templates, &destinations(dest_root.path()), &test_config());

        assert_eq!(Totals::from_outcomes(&staged.outcomes).copied, 1);
        assert!(staged.outcomes[0].backup.is_some());
        assert!(custom.join("Backup").exists());
    }

    #[test]
    fn run_fails_when_source_has_no_templates() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("readme.txt"), b"nothing here").unwrap();
        assert!(run(&test_config(), source.path()).is_err());
    }
}
