#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Quilt **
//! Dry-run content packs against a game context and report what they would patch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::info;

use quilt_data::validate_pack;
use quilt_engine::{
    GameSnapshot, MemoryStore, Patch, PatchManager, QUILT_VERSION, load_pack_def, load_snapshot, load_user_config,
};

#[derive(Parser)]
#[command(author, version, about = "Check conditional content packs without starting the game")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate pack declarations without resolving tokens or conditions.
    Validate {
        #[arg(value_name = "PACK", required = true)]
        packs: Vec<PathBuf>,
    },
    /// Load packs, apply a game context and list which patches are active.
    Check(CheckArgs),
}

#[derive(Args)]
struct CheckArgs {
    #[arg(value_name = "PACK", required = true)]
    packs: Vec<PathBuf>,
    /// Game context file (TOML, JSON or RON); defaults to day 1 of spring, year 1.
    #[arg(long, value_name = "FILE")]
    context: Option<PathBuf>,
    /// Player config for a pack, as PACK_ID=FILE. May be repeated.
    #[arg(long = "config", value_name = "PACK_ID=FILE", value_parser = parse_config_arg)]
    configs: Vec<(String, PathBuf)>,
    /// Directory of unpatched JSON/TOML/RON assets to apply data patches to.
    #[arg(long, value_name = "DIR")]
    assets: Option<PathBuf>,
    /// Print every asset changed by the packs.
    #[arg(long)]
    show_assets: bool,
}

fn parse_config_arg(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((pack, file)) if !pack.trim().is_empty() && !file.trim().is_empty() => {
            Ok((pack.trim().to_string(), PathBuf::from(file.trim())))
        },
        _ => Err(format!("expected PACK_ID=FILE, got '{raw}'")),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    info!("quilt {QUILT_VERSION}");
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { packs } => validate(&packs),
        Command::Check(args) => check(&args),
    }
}

fn validate(paths: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for path in paths {
        let pack = load_pack_def(path)?;
        let errors = validate_pack(&pack);
        if errors.is_empty() {
            println!("{} {} ({})", "ok".bright_green().bold(), pack.id, path.display());
            continue;
        }
        failed += 1;
        println!("{} {} ({})", "invalid".bright_red().bold(), pack.id, path.display());
        for err in errors {
            println!("    - {err}");
        }
    }
    if failed > 0 {
        bail!("{failed} of {} packs failed validation", paths.len());
    }
    Ok(())
}

fn check(args: &CheckArgs) -> Result<()> {
    let snapshot = match &args.context {
        Some(path) => load_snapshot(path)?,
        None => GameSnapshot::default(),
    };
    let mut configs: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for (pack, file) in &args.configs {
        let values = load_user_config(file).with_context(|| format!("while loading config for pack '{pack}'"))?;
        configs.insert(pack.to_ascii_lowercase(), values);
    }

    let mut store = MemoryStore::new();
    if let Some(dir) = &args.assets {
        store.load_originals(dir)?;
    }

    let mut manager = PatchManager::new();
    let no_config = BTreeMap::new();
    for path in &args.packs {
        let pack = load_pack_def(path)?;
        let config = configs.get(&pack.id.trim().to_ascii_lowercase()).unwrap_or(&no_config);
        let report = manager
            .add_pack(&pack, config)
            .with_context(|| format!("while adding content pack from '{}'", path.display()))?;
        store.set_pack_root(&report.pack_id, path.parent().unwrap_or(Path::new(".")));

        println!(
            "{} {} ({} patches, {} tokens)",
            "loaded".bright_blue().bold(),
            report.pack_id.bold(),
            report.patches,
            report.config_fields + report.dynamic_tokens
        );
        for skipped in &report.skipped {
            println!("    {} {skipped}", "!".yellow().bold());
        }
    }

    for conflict in manager.find_load_conflicts() {
        println!("{} {conflict}", "possible conflict:".yellow().bold());
    }

    let report = manager.refresh(snapshot, &mut store);
    for failure in &report.tokens.failed {
        println!("{} {}", "token failed:".bright_red().bold(), failure.error);
    }

    println!();
    for patch in manager.patches() {
        println!("{} {}", status(patch), patch.log_name());
    }
    println!();

    for conflict in &report.conflicts {
        println!("{} {conflict}", "conflict:".bright_red().bold());
    }
    for issue in &report.issues {
        println!("{} {issue}", "issue:".yellow().bold());
    }
    for edit in store.area_edits() {
        let kind = if edit.map { "map" } else { "image" };
        println!("{} {kind} patch on '{}' from '{}'", "forwarded".dimmed(), edit.asset, edit.pack_id);
    }

    if args.show_assets {
        for (name, value) in store.changed_assets() {
            println!("{}", name.bold().underline());
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }

    println!(
        "{} of {} patches active; {} assets patched",
        manager.matching_patches().count(),
        manager.patches().len(),
        report.assets_applied.len()
    );
    Ok(())
}

fn status(patch: &Patch) -> colored::ColoredString {
    if patch.is_matching() {
        "  active ".bright_green().bold()
    } else if patch.is_ready() {
        " skipped ".dimmed()
    } else {
        "not ready".yellow()
    }
}
