mod author;
mod classify;
mod config;
mod copy_engine;
mod folders;
mod installer;
mod mru;
mod paths;
mod registry;
mod resolver;
mod shell;
mod uninstaller;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Office Template Installer - stages document templates into the Office
/// template folders
#[derive(Parser, Debug)]
#[command(name = "oti")]
#[command(about = "Installs Office document templates with author validation", long_about = None)]
struct Args {
    /// Folder holding the template payload (or a payload/templates/extracted subfolder)
    source: Option<PathBuf>,

    /// Verbose run with debug logging
    #[arg(long)]
    design_mode: bool,

    /// Semicolon-separated author allow-list override
    #[arg(long)]
    allowed_authors: Option<String>,

    /// Skip the author gate entirely
    #[arg(long)]
    disable_author_validation: bool,

    /// Print TRUE/FALSE for a template's author (or list authors for a folder) and exit
    #[arg(long, value_name = "PATH")]
    check_author: Option<PathBuf>,

    /// Seconds to wait before relaunching applications after a theme install
    #[arg(long, value_name = "SECONDS")]
    relaunch_delay: Option<u64>,

    /// Remove the payload's templates instead of installing them
    #[arg(long)]
    uninstall: bool,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let config = Config::from_env(
        args.design_mode,
        args.allowed_authors.as_deref(),
        args.disable_author_validation,
        args.relaunch_delay,
    );
    init_logging(config.design_mode);

    std::process::exit(match run(args, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("[ERROR] {e:#}");
            1
        }
    });
}

fn run(args: Args, config: &Config) -> Result<i32> {
    if let Some(target) = &args.check_author {
        let check = author::check_target(
            target,
            &config.allowed_authors,
            config.author_validation_enabled,
        );
        for author in &check.authors {
            println!("{author}");
        }
        println!("{}", if check.allowed { "TRUE" } else { "FALSE" });
        if config.design_mode {
            eprintln!("{}", check.detail);
        }
        return Ok(if check.allowed { 0 } else { 1 });
    }

    let source = args
        .source
        .as_deref()
        .context("no source folder given; pass the template payload folder")?;

    if args.uninstall {
        let report = uninstaller::run(config, source)?;
        if let Some(path) = &args.report {
            write_report(path, &report)?;
        }
    } else {
        let report = installer::run(config, source)?;
        if let Some(path) = &args.report {
            write_report(path, &report)?;
        }
    }

    // Completion marker consumed by the launcher scripts.
    if !config.design_mode {
        println!("Ready");
    }
    Ok(0)
}

fn init_logging(design_mode: bool) {
    let default_level = if design_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn write_report<T: serde::Serialize>(path: &Path, report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("cannot serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("cannot write run report to {}", path.display()))?;
    Ok(())
}
