use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind};
use tracing::info;

use crate::config::{ContentPolicy, EmptyAnswerPolicy, HunkSelection, PipelineConfig, SplitConfig};
use crate::constants::pipeline::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONTEXT_WINDOW, DEFAULT_KEEP_LAST, LOG_PREFIX,
};
use crate::constants::splits::{DEFAULT_MANIFEST_FILENAME, DEFAULT_TEST_FRACTION, SPLIT_SEED};
use crate::noise::NoiseFilter;
use crate::pipeline::Extractor;
use crate::sink::{JsonlFormat, JsonlSink, TaskSink};
use crate::source::FileLogSource;
use crate::splits::SplitManifest;
use crate::store::{PathRemap, RecordStore};
use crate::tasks::load_artifacts;
use crate::utils::join_lines;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum JsonlFormatArg {
    ContextHunk,
    Text,
}

impl From<JsonlFormatArg> for JsonlFormat {
    fn from(value: JsonlFormatArg) -> Self {
        match value {
            JsonlFormatArg::ContextHunk => JsonlFormat::ContextHunk,
            JsonlFormatArg::Text => JsonlFormat::Text,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "loghunks",
    disable_help_subcommand = true,
    about = "Failed/passed CI log hunk extraction",
    long_about = "Diff failed and passed CI build logs, extract context/answer hunks, and derive a deterministic train/test split."
)]
struct LoghunksCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract hunks for every task in an artifacts file.
    Extract(ExtractArgs),
    /// Build the train/test manifest over an extracted dataset.
    Split(SplitArgs),
    /// Print the cleaned form of one raw log.
    Clean(CleanArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[arg(long, value_name = "PATH", help = "JSON array of build-pair artifacts")]
    artifacts: PathBuf,
    #[arg(long = "log-dir", value_name = "PATH", help = "Directory holding <job_id>.log files")]
    log_dir: PathBuf,
    #[arg(long = "out-dir", value_name = "PATH", help = "Dataset root to write task directories into")]
    out_dir: PathBuf,
    #[arg(
        long = "context-window",
        value_name = "N",
        help = "Unchanged lines kept around each change, repeat for several windows"
    )]
    context_windows: Vec<usize>,
    #[arg(
        long = "keep-last",
        value_name = "K",
        default_value_t = DEFAULT_KEEP_LAST,
        conflicts_with = "all",
        help = "Keep only the last K hunks of each task"
    )]
    keep_last: usize,
    #[arg(long, help = "Keep every hunk of each task")]
    all: bool,
    #[arg(long, help = "Drop hunks that contain no deleted line")]
    drop_empty_answers: bool,
    #[arg(long, help = "Keep inserted lines in the context, marked with '+'")]
    include_insertions: bool,
    #[arg(
        long = "chunk-size",
        value_name = "N",
        default_value_t = DEFAULT_CHUNK_SIZE,
        value_parser = parse_positive_usize,
        help = "Tasks computed in parallel between writes"
    )]
    chunk_size: usize,
    #[arg(long, value_name = "PATH", help = "Append flat JSON-lines records to this file")]
    jsonl: Option<PathBuf>,
    #[arg(
        long = "jsonl-format",
        value_enum,
        default_value = "context-hunk",
        help = "Record shape written to --jsonl"
    )]
    jsonl_format: JsonlFormatArg,
    #[arg(
        long = "jsonl-window",
        value_name = "N",
        help = "Context window exported to --jsonl (defaults to the largest)"
    )]
    jsonl_window: Option<usize>,
}

#[derive(Debug, Args)]
struct SplitArgs {
    #[arg(long = "data-root", value_name = "PATH", help = "Dataset root written by extract")]
    data_root: PathBuf,
    #[arg(
        long,
        value_name = "PATH",
        help = "Manifest output path (defaults to <data-root>/train_test.json)"
    )]
    manifest: Option<PathBuf>,
    #[arg(long, default_value_t = SPLIT_SEED, help = "Deterministic shuffle seed")]
    seed: u64,
    #[arg(
        long = "test-fraction",
        default_value_t = DEFAULT_TEST_FRACTION,
        help = "Fraction of tasks assigned to test"
    )]
    test_fraction: f64,
    #[arg(
        long = "context-window",
        value_name = "N",
        default_value_t = DEFAULT_CONTEXT_WINDOW,
        help = "Context window whose hunk files are listed"
    )]
    context_window: usize,
    #[arg(long, help = "Load every listed hunk after writing the manifest")]
    verify: bool,
    #[arg(
        long = "remap-from",
        value_name = "PREFIX",
        requires = "remap_to",
        help = "Path prefix recorded in the manifest, replaced when verifying"
    )]
    remap_from: Option<String>,
    #[arg(
        long = "remap-to",
        value_name = "PREFIX",
        requires = "remap_from",
        help = "Replacement for --remap-from"
    )]
    remap_to: Option<String>,
}

#[derive(Debug, Args)]
struct CleanArgs {
    #[arg(value_name = "PATH", help = "Raw log file")]
    input: PathBuf,
    #[arg(long, value_name = "PATH", help = "Write cleaned lines here instead of stdout")]
    output: Option<PathBuf>,
}

/// Run the `loghunks` command line over `args_iter` (program name excluded).
pub fn run_loghunks<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) =
        parse_cli::<LoghunksCli, _>(std::iter::once("loghunks".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    match cli.command {
        Command::Extract(args) => run_extract(args),
        Command::Split(args) => run_split(args),
        Command::Clean(args) => run_clean(args),
    }
}

fn run_extract(args: ExtractArgs) -> Result<(), Box<dyn Error>> {
    let windows = if args.context_windows.is_empty() {
        vec![DEFAULT_CONTEXT_WINDOW]
    } else {
        args.context_windows
    };
    let selection = if args.all {
        HunkSelection::All
    } else {
        HunkSelection::LastK(args.keep_last)
    };
    let content = if args.include_insertions {
        ContentPolicy::IncludeInsertions
    } else {
        ContentPolicy::FailedDeletionsOnly
    };
    let empty_answers = if args.drop_empty_answers {
        EmptyAnswerPolicy::Drop
    } else {
        EmptyAnswerPolicy::Keep
    };
    let config = PipelineConfig::default()
        .with_context_windows(windows)
        .with_selection(selection)
        .with_content_policy(content)
        .with_empty_answers(empty_answers)
        .with_chunk_size(args.chunk_size);
    let extractor = Extractor::new(config, NoiseFilter::builtin()?)?;

    let tasks = load_artifacts(&args.artifacts)?;
    if tasks.is_empty() {
        return Err(format!("no tasks loaded from {}", args.artifacts.display()).into());
    }
    let tasks = tasks.into_tasks();
    let source = FileLogSource::new(&args.log_dir);

    let windows = &extractor.config().context_windows;
    let largest = windows.last().copied().unwrap_or(DEFAULT_CONTEXT_WINDOW);
    let mut store = RecordStore::new(&args.out_dir, largest);
    let report = match args.jsonl {
        Some(path) => {
            let jsonl_window = args.jsonl_window.unwrap_or(largest);
            if !windows.contains(&jsonl_window) {
                return Err(format!(
                    "--jsonl-window {jsonl_window} is not one of the configured context windows {windows:?}"
                )
                .into());
            }
            let mut jsonl = JsonlSink::append(&path, args.jsonl_format.into(), jsonl_window)?;
            let sinks: &mut [&mut dyn TaskSink] = &mut [&mut store, &mut jsonl];
            let report = extractor.run(&tasks, &source, sinks);
            info!(records = jsonl.records(), path = %path.display(), "{LOG_PREFIX} jsonl written");
            report
        }
        None => {
            let sinks: &mut [&mut dyn TaskSink] = &mut [&mut store];
            extractor.run(&tasks, &source, sinks)
        }
    };

    println!("{report}");
    println!(
        "Hunks: {}, Answer lines: {}",
        report.hunks, report.answer_lines
    );
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<(), Box<dyn Error>> {
    let config = SplitConfig {
        seed: args.seed,
        test_fraction: args.test_fraction,
    };
    let mut store = RecordStore::new(&args.data_root, args.context_window);
    let manifest = SplitManifest::build(&store, args.context_window, config)?;
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| args.data_root.join(DEFAULT_MANIFEST_FILENAME));
    manifest.save(&manifest_path)?;
    println!(
        "Train: {}, Test: {}, Manifest: {}",
        manifest.train.len(),
        manifest.test.len(),
        manifest_path.display()
    );

    if args.verify {
        if let (Some(from), Some(to)) = (args.remap_from, args.remap_to) {
            store = store.with_remap(PathRemap::new(from, to));
        }
        let mut hunks = 0usize;
        for task in manifest.train.iter().chain(&manifest.test) {
            hunks += store.load_ref(task)?.len();
        }
        println!("Verified hunks: {hunks}");
    }
    Ok(())
}

fn run_clean(args: CleanArgs) -> Result<(), Box<dyn Error>> {
    let raw = fs::read(&args.input)?;
    let cleaned = NoiseFilter::builtin()?.clean(&String::from_utf8_lossy(&raw));
    let text = join_lines(&cleaned);
    match args.output {
        Some(path) => fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
