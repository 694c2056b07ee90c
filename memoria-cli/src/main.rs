mod reports;
mod util;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

use memoria_core::{
    BucketKey, Catalog, DisplayFilter, FsBucketReader, JsonFileStore, MemoryStore, PassContext,
    Progression, QuestId, QuestTracker, Settings, SettingsStore,
};
use reports::{SummaryOptions, build_summary};
use util::{load_completed, parse_completed, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    /// Show every quest
    All,
    /// Hide completed quests
    Incomplete,
    /// Hide incomplete quests
    Complete,
}

impl From<FilterArg> for DisplayFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Self::ShowAll,
            FilterArg::Incomplete => Self::IncompleteOnly,
            FilterArg::Complete => Self::CompleteOnly,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "memoria-cli", version)]
#[command(about = "Open quest buckets against a set of completed quests and report progress")]
struct Args {
    /// Catalog manifest (defaults to the bundled manifest)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Root directory holding the bucket files
    #[arg(long)]
    quests_dir: PathBuf,

    /// File with completed quest ids (JSON array or comma-separated)
    #[arg(long)]
    completed: Option<PathBuf>,

    /// Additional completed quest ids (comma-separated)
    #[arg(long, default_value = "")]
    completed_ids: String,

    /// Settings file; read at start and written whenever the tracker persists
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Display filter, overriding the settings file
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,

    /// Bucket keys to open, in order (comma-separated)
    #[arg(long, default_value = "")]
    open: String,

    /// Load buckets even when they are known to be complete
    #[arg(long)]
    force: bool,

    /// Table of contents file; adds questline unlock state to the report
    #[arg(long)]
    toc: Option<PathBuf>,

    /// Only list quests whose title contains this text (with --verbose)
    #[arg(long)]
    search: Option<String>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// List the visible quests of every loaded leaf
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.report == "console" && args.output.is_none() {
        announce_banner();
    }

    let catalog = match &args.manifest {
        Some(path) => Catalog::load_or_empty(path),
        None => Catalog::bundled(),
    };
    let oracle = completed_ids(&args)?;
    let store: Box<dyn SettingsStore> = match &args.settings {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };
    let mut settings = store
        .load()
        .context("failed to load settings")?
        .unwrap_or_default();
    if let Some(filter) = args.filter {
        settings.display_filter = filter.into();
    }
    let progression = args.toc.as_deref().map(Progression::load_or_empty);

    let mut tracker = QuestTracker::new(catalog, FsBucketReader::new(&args.quests_dir));
    let delta = {
        let mut ctx = PassContext::new(&oracle, &mut settings, store.as_ref());
        tracker.startup(&mut ctx);
        open_buckets(&args, &mut tracker, &mut ctx);
        tracker.recompute(&mut ctx)
    };

    let options = SummaryOptions {
        include_quests: args.verbose,
        search: args.search.as_deref(),
        progression: progression.as_ref(),
    };
    let summary = build_summary(&tracker, &settings, &oracle, delta, &options);
    write_report(&args, &summary)
}

fn announce_banner() {
    println!("{}", "📜 Time Memoria Quest Tracker".bright_cyan().bold());
    println!("{}", "=============================".cyan());
}

fn completed_ids(args: &Args) -> Result<HashSet<QuestId>> {
    let mut ids = match &args.completed {
        Some(path) => load_completed(path)?,
        None => HashSet::new(),
    };
    ids.extend(parse_completed(&args.completed_ids)?);
    log::debug!("{} completed quest ids", ids.len());
    Ok(ids)
}

fn open_buckets(
    args: &Args,
    tracker: &mut QuestTracker<FsBucketReader>,
    ctx: &mut PassContext<'_>,
) {
    for key in split_csv(&args.open) {
        let key = BucketKey::new(key);
        if !tracker.open_bucket(&key, args.force, ctx) {
            log::debug!("Bucket {key} not read");
        }
    }
}

fn write_reports_to(
    out: &mut dyn Write,
    report: &str,
    summary: &reports::TrackerSummary,
) -> Result<()> {
    match report {
        "json" => reports::generate_json_report(out, summary),
        "markdown" => reports::generate_markdown_report(out, summary),
        _ => reports::generate_console_report(out, summary),
    }
}

fn write_report(args: &Args, summary: &reports::TrackerSummary) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    write_reports_to(output_target.writer(), &args.report, summary)?;
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}
