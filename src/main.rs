//! Stratum CLI - pipeline manifest linter and planner

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use walkdir::WalkDir;

use stratum::{FixSuggestion, Manifest, StratumError};

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Stratum - typed artifact pipeline scheduler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate manifest files (a single file, or every .yaml/.yml in a directory)
    Validate {
        /// Manifest file or directory
        path: String,
    },

    /// Plan a manifest: print layers, pruned steps and the final set
    Plan {
        /// Manifest file
        file: String,

        /// Set a pipeline flag (repeatable), overriding the manifest's flags
        #[arg(short = 'f', long = "flag")]
        flags: Vec<String>,

        /// Request a final artifact type (repeatable), overriding the manifest's
        #[arg(long = "final")]
        finals: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { path } => validate(&path),
        Commands::Plan { file, flags, finals } => plan(&file, flags, finals),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn validate(path: &str) -> Result<(), StratumError> {
    let path = Path::new(path);
    let files = collect_manifests(path)?;
    if files.is_empty() {
        return Err(StratumError::Execution(format!(
            "no manifest files found under '{}'",
            path.display()
        )));
    }

    for file in &files {
        let manifest = Manifest::from_file(file)?;
        let plan = manifest.plan()?;
        println!(
            "{} Pipeline '{}' is valid ({})",
            "✓".green(),
            manifest.name.bold(),
            file.display()
        );
        println!("  Steps: {} scheduled, {} pruned", plan.scheduled_count(), plan.pruned().len());
        println!("  Layers: {}", plan.layers().len());
    }

    Ok(())
}

fn plan(file: &str, flag_overrides: Vec<String>, final_overrides: Vec<String>) -> Result<(), StratumError> {
    let mut manifest = Manifest::from_file(file)?;

    if !flag_overrides.is_empty() {
        manifest.flags = flag_overrides.into_iter().collect::<HashSet<_>>();
    }
    if !final_overrides.is_empty() {
        manifest.finals = final_overrides
            .iter()
            .map(|f| stratum::ArtifactTypeId::new(f))
            .collect::<Result<Vec<_>, _>>()?;
    }

    let plan = manifest.plan()?;

    println!("{} Pipeline: {}", "→".cyan(), manifest.name.cyan().bold());
    println!(
        "  Final set: {}",
        manifest
            .finals
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    for (idx, layer) in plan.layers().iter().enumerate() {
        let ids = layer.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
        println!("  Layer {}: {}", idx.to_string().bold(), ids);
    }

    if !plan.inactive().is_empty() {
        let ids = plan.inactive().iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
        println!("  {} {}", "Inactive (flags):".yellow(), ids);
    }
    if !plan.pruned().is_empty() {
        let ids = plan.pruned().iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
        println!("  {} {}", "Pruned:".yellow(), ids);
    }

    Ok(())
}

fn collect_manifests(path: &Path) -> Result<Vec<PathBuf>, StratumError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}
