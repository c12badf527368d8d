use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use stockmeta::core::category::CategoryClassifier;
use stockmeta::core::listing::ListingRecord;
use stockmeta::core::metadata::CaptionProcessor;
use stockmeta::core::pipeline::{DedupReport, FilterReport, ListingReport};
use stockmeta::history::{HISTORY_FILE, History, Selection};
use stockmeta::{Buckets, CommandCaptioner, Pipeline, Policy};

#[derive(Parser, Debug)]
#[command(
    name = "stockmeta",
    version,
    about = "Curate stock photos and generate upload metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Filter, dedupe, caption and write the upload CSV
    Run {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Output CSV (relative to the root)
        #[arg(long, value_name = "FILE", default_value = "shutterstock_content_upload.csv")]
        output: PathBuf,
        /// Captioning program; receives the image path as its last argument
        #[arg(long, value_name = "PROGRAM")]
        caption_cmd: PathBuf,
        /// Extra argument for the captioning program (repeatable)
        #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
        caption_arg: Vec<String>,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Sort source images into valid / too-small buckets by resolution
    Filter {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
    },

    /// Move exact duplicates out of the valid bucket
    Dedup {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the metadata a caption would produce
    Describe {
        /// Caption text
        #[arg(short, long)]
        caption: String,
        /// Policy overrides (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Work with the move history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Args, Debug)]
struct WorkspaceArgs {
    /// Directory the bucket paths are relative to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    root: PathBuf,
    /// Source bucket
    #[arg(long, value_name = "DIR", default_value = "images")]
    source: PathBuf,
    /// Bucket for images that meet the resolution minimum
    #[arg(long, value_name = "DIR", default_value = "images_valid")]
    valid: PathBuf,
    /// Bucket for images below the resolution minimum
    #[arg(long, value_name = "DIR", default_value = "too_small")]
    too_small: PathBuf,
    /// Bucket for duplicates
    #[arg(long, value_name = "DIR", default_value = "duplicates")]
    duplicates: PathBuf,
    /// Policy overrides (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl WorkspaceArgs {
    fn buckets(&self) -> Buckets {
        Buckets {
            source: self.root.join(&self.source),
            valid: self.root.join(&self.valid),
            too_small: self.root.join(&self.too_small),
            duplicates: self.root.join(&self.duplicates),
        }
    }

    fn history(&self) -> History {
        History::new(self.root.join(HISTORY_FILE))
    }
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List recorded moves
    List {
        /// Directory containing the history file
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
    },

    /// Move files back to where they were
    Restore {
        /// Directory containing the history file
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
        /// Restore a specific record index
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore all records (default: the most recent one)
        #[arg(long, conflicts_with = "record")]
        all: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workspace,
            output,
            caption_cmd,
            caption_arg,
            no_progress,
        } => {
            let policy = load_policy(workspace.config.as_deref())?;
            let captioner = CommandCaptioner::new(caption_cmd, caption_arg);
            let pipeline = Pipeline::new(&policy, workspace.buckets())
                .with_history(workspace.history())
                .with_progress(!no_progress);

            let output = workspace.root.join(output);
            println!("▶ Curating {}", pipeline.buckets().source.display());
            let report = benchmark("full run", || pipeline.run(&captioner, &output))?;

            println!("\n▶ Filter");
            print_filter(&report.filter, &policy);
            println!("\n▶ Duplicates");
            print_dedup(&report.dedup, false);
            println!("\n▶ Metadata");
            print_listing(&report.listing);

            println!(
                "\n✔ DONE: {} rows written to {}",
                report.listing.records.len(),
                output.display()
            );
        }

        Commands::Filter { workspace, dry_run } => {
            let policy = load_policy(workspace.config.as_deref())?;
            let pipeline = Pipeline::new(&policy, workspace.buckets())
                .with_history(workspace.history())
                .with_dry_run(dry_run);

            println!("▶ Filtering images in: {}", pipeline.buckets().source.display());
            let report = pipeline.filter_images()?;
            if dry_run {
                for name in &report.valid {
                    println!("   📦 [dry-run] {} → {}", name, pipeline.buckets().valid.display());
                }
                for name in &report.too_small {
                    println!("   📦 [dry-run] {} → {}", name, pipeline.buckets().too_small.display());
                }
            }
            print_filter(&report, &policy);
            if dry_run {
                println!("\n⚠️  Dry-run only; no files were changed.");
            }
        }

        Commands::Dedup { workspace, dry_run } => {
            let policy = load_policy(workspace.config.as_deref())?;
            let pipeline = Pipeline::new(&policy, workspace.buckets())
                .with_history(workspace.history())
                .with_dry_run(dry_run);

            println!("▶ Checking duplicates in: {}", pipeline.buckets().valid.display());
            let report = pipeline.remove_duplicates()?;
            print_dedup(&report, true);
            if dry_run {
                println!("\n⚠️  Dry-run only; no files were changed.");
            }
        }

        Commands::Describe { caption, config } => {
            let policy = load_policy(config.as_deref())?;
            let processor = CaptionProcessor::new(&policy);
            let classifier = CategoryClassifier::new(&policy.category_rules, policy.default_categories);
            let record =
                ListingRecord::from_caption(String::new(), &caption, &processor, &classifier);

            println!("Description: {}", record.description);
            println!("Category 1:  {}", record.categories.0);
            println!("Category 2:  {}", record.categories.1);
            println!("Keywords:    {}", record.keywords_field());
        }

        Commands::History { command } => match command {
            HistoryCmd::List { root } => {
                let history = History::new(root.join(HISTORY_FILE));
                let records = history
                    .load()
                    .with_context(|| format!("Could not read {}", history.path().display()))?;

                println!("🗂️  Move History:");
                if records.is_empty() {
                    println!("   (empty)");
                }
                for (i, rec) in records.iter().enumerate() {
                    println!("[{}] {} {:?}: {} file(s)", i, rec.timestamp, rec.stage, rec.moves.len());
                    for entry in &rec.moves {
                        println!("     {} → {}", entry.from.display(), entry.to.display());
                    }
                }
            }

            HistoryCmd::Restore { root, record, all } => {
                let selection = match (record, all) {
                    (Some(idx), _) => Selection::Record(idx),
                    (None, true) => Selection::All,
                    (None, false) => Selection::Latest,
                };
                let history = History::new(root.join(HISTORY_FILE));
                let summary = history.restore(selection)?;

                println!(
                    "🔄 Restored {} file(s) from {} record(s)",
                    summary.restored, summary.records
                );
                if summary.skipped > 0 {
                    println!("⚠ Skipped {} file(s); see log for details", summary.skipped);
                }
            }
        },
    }

    Ok(())
}

fn load_policy(path: Option<&Path>) -> Result<Policy> {
    match path {
        Some(path) => {
            Policy::from_file(path).with_context(|| format!("Failed to load policy {}", path.display()))
        }
        None => Ok(Policy::default()),
    }
}

fn print_filter(report: &FilterReport, policy: &Policy) {
    println!("✔ Valid images: {}", report.valid.len());
    println!(
        "✖ Too small (<{:.1}MP): {}",
        policy.min_pixels as f64 / 1_000_000.0,
        report.too_small.len()
    );
    if report.errors.is_empty() {
        println!("✔ No errors");
    } else {
        println!("⚠ Errors: {}", report.errors.len());
    }
}

fn print_dedup(report: &DedupReport, verbose: bool) {
    if verbose {
        for dup in &report.duplicates {
            println!("   📦 {} (kept {})", dup.moved, dup.kept);
        }
    }
    if report.duplicates.is_empty() {
        println!("✔ No duplicates found");
    } else {
        println!("✔ Duplicates removed: {}", report.duplicates.len());
    }
    if !report.errors.is_empty() {
        println!("⚠ Errors: {}", report.errors.len());
    }
}

fn print_listing(report: &ListingReport) {
    println!("✔ Listed: {}", report.records.len());
    if !report.errors.is_empty() {
        println!("⚠ Caption errors: {}", report.errors.len());
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
