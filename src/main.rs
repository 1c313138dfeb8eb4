//! opscript - Batch copy, move and delete driven by operation scripts.
//!
//! Usage:
//!   opscript plan copy --source DIR --target DIR NAMES...   Print the operation script
//!   opscript run move --source DIR --target DIR NAMES...    Execute it, answering from policies
//!   opscript run delete --source DIR --interactive NAMES... Execute it, asking on the terminal
//!   opscript --help                                         Show help

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use opscript_core::{
    Action, BuildConfig, BuildState, OperationScript, SelectionSnapshot, SnapshotItem,
    SnapshotOptions,
};
use opscript_ops::{
    Button, CallKind, DialogEvent, DialogPolicy, DialogRequest, FileSystem, HeadlessObserver,
    RunSummary, StdFileSystem, WorkerControl, build, dialog_channel, spawn_worker,
};

#[derive(Parser)]
#[command(
    name = "opscript",
    version,
    about = "Batch copy, move and delete driven by operation scripts",
    long_about = "opscript turns a selection of files and directories into an operation \
                  script and executes it.\n\n\
                  Use `plan` to see the script without touching anything, or `run` to \
                  execute it."
)]
struct Cli {
    /// Build configuration file (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the operation script and print it as JSON
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Build the operation script and execute it
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        answers: AnswerArgs,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAction {
    Copy,
    Move,
    Delete,
}

impl From<CliAction> for Action {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::Copy => Action::Copy,
            CliAction::Move => Action::Move,
            CliAction::Delete => Action::Delete,
        }
    }
}

#[derive(Args)]
struct SelectionArgs {
    /// What to do with the selection
    #[arg(value_enum)]
    action: CliAction,

    /// Directory the selected names live in
    #[arg(short, long)]
    source: PathBuf,

    /// Destination directory (copy and move)
    #[arg(short, long)]
    target: Option<PathBuf>,

    /// Target name mask, e.g. "*.bak"
    #[arg(short, long, default_value = "*.*")]
    mask: String,

    /// Only overwrite targets older than their source, without asking
    #[arg(long)]
    overwrite_older: bool,

    /// Carry compression and encryption attributes over
    #[arg(long)]
    preserve_attrs: bool,

    /// Carry directory modification times over
    #[arg(long)]
    preserve_dir_time: bool,

    /// Copy permissions along with the content
    #[arg(long)]
    copy_security: bool,

    /// Delete to the recycle bin
    #[arg(long)]
    recycle: bool,

    /// Do not create directories that are empty in the source
    #[arg(long)]
    skip_empty_dirs: bool,

    /// Limit transfers to this many bytes per second
    #[arg(long)]
    speed_limit: Option<u32>,

    /// Names of the selected files and directories
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Args)]
struct AnswerArgs {
    /// Answer every question on the terminal
    #[arg(short, long)]
    interactive: bool,

    /// Answer for existing targets (skip, skip_all, yes, yes_all, cancel, ...)
    #[arg(long, default_value = "yes")]
    on_conflict: DialogPolicy,

    /// Answer for errors (retry, skip, skip_all, ignore, cancel, ...)
    #[arg(long, default_value = "skip")]
    on_error: DialogPolicy,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Plan { selection } => {
            let (script, _) = build_script(&selection, &config)?;
            println!("{}", serde_json::to_string_pretty(&script)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { selection, answers } => {
            let (script, state) = build_script(&selection, &config)?;
            let summary = if answers.interactive {
                run_interactive(script, state)?
            } else {
                run_headless(script, state, &answers)?
            };

            println!("{}", summary.summary());
            Ok(if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default: warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    let Some(path) = path else {
        return Ok(BuildConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Cannot read config {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("Invalid config {}", path.display()))
}

/// Assemble a snapshot from the arguments and build its script.
fn build_script(
    args: &SelectionArgs,
    config: &BuildConfig,
) -> Result<(OperationScript, BuildState)> {
    let source = args.source.canonicalize().context("Invalid source path")?;
    let source = path_text(&source)?;

    let fs = StdFileSystem::new();
    let mut items = Vec::with_capacity(args.names.len());
    for name in &args.names {
        let path = config.path_style.join(&source, name);
        let info = fs
            .symlink_metadata(&path)
            .wrap_err_with(|| format!("Cannot read {path}"))?;
        let mut item = if info.is_dir {
            SnapshotItem::dir(name.as_str())
        } else {
            SnapshotItem::file(name.as_str(), info.size)
        };
        item.attrs = info.attrs;
        item.last_write = info.modified;
        items.push(item);
    }

    let options = SnapshotOptions {
        overwrite_older: args.overwrite_older,
        copy_security: args.copy_security,
        copy_attrs: args.preserve_attrs,
        preserve_dir_time: args.preserve_dir_time,
        skip_empty_dirs: args.skip_empty_dirs,
        use_recycle_bin: args.recycle,
        use_speed_limit: args.speed_limit.is_some(),
        speed_limit: args.speed_limit.unwrap_or(0),
        ..SnapshotOptions::default()
    };

    let mut builder = SelectionSnapshot::builder();
    builder
        .source_path(source)
        .action(Action::from(args.action))
        .items(items)
        .mask(args.mask.clone())
        .options(options);
    if let Some(target) = &args.target {
        let target = target.canonicalize().context("Invalid target path")?;
        builder.target_path(path_text(&target)?);
    }
    let snapshot = builder.build().map_err(|err| eyre!("{err}"))?;

    let mut state = BuildState::new();
    let script = build(&snapshot, config, &mut state).context("Cannot build operation script")?;
    debug!(
        operations = script.len(),
        weight = script.total_weight(),
        "Script ready"
    );
    Ok((script, state))
}

fn path_text(path: &Path) -> Result<String> {
    match path.to_str() {
        Some(text) => Ok(text.to_string()),
        None => bail!("Path is not valid UTF-8: {}", path.display()),
    }
}

fn file_system() -> Arc<dyn FileSystem> {
    Arc::new(StdFileSystem::new())
}

fn run_headless(
    script: OperationScript,
    state: BuildState,
    answers: &AnswerArgs,
) -> Result<RunSummary> {
    let observer = HeadlessObserver::new()
        .with_policy(CallKind::Overwrite, answers.on_conflict)
        .with_policy(CallKind::FileError, answers.on_error)
        .with_policy(CallKind::CannotMove, answers.on_error);

    let report = spawn_worker(script, state, observer, file_system())?.join()?;

    for call in report.observer.calls() {
        if let Some(answer) = &call.answer {
            eprintln!("{}: {} ({}) -> {}", call.kind, call.arg1, call.arg2, answer);
        }
    }
    Ok(report.summary)
}

fn run_interactive(script: OperationScript, state: BuildState) -> Result<RunSummary> {
    let control = WorkerControl::new();
    let (observer, mut events) = dialog_channel(control.clone());
    let handle = spawn_worker(script, state, observer, file_system())?;

    let runtime = tokio::runtime::Runtime::new().context("Cannot start runtime")?;
    runtime.block_on(async {
        while let Some(event) = events.recv().await {
            match event {
                DialogEvent::OperationInfo(info) => eprintln!("{info}"),
                DialogEvent::Progress(progress) => {
                    eprint!("\r{:5.1}%", progress.percentage());
                }
                DialogEvent::Dialog(request) => {
                    let answer = tokio::task::spawn_blocking(move || prompt(request)).await;
                    if answer.is_err() {
                        control.cancel();
                    }
                }
                DialogEvent::Status { index, status } => {
                    debug!(index, %status, "Operation status");
                }
                DialogEvent::Error(_) => {}
                DialogEvent::Done => break,
            }
        }
    });
    eprintln!();

    Ok(handle.join()?.summary)
}

/// Show a dialog on the terminal and send back the chosen button.
fn prompt(request: DialogRequest) {
    let buttons = request.kind.buttons();
    eprintln!();
    eprintln!("{}", request.kind);
    for slot in &request.slots {
        eprintln!("  {slot}");
    }

    let stdin = io::stdin();
    let button = loop {
        let choices: Vec<String> = buttons
            .iter()
            .enumerate()
            .map(|(i, button)| format!("[{}] {button}", i + 1))
            .collect();
        eprint!("{} > ", choices.join("  "));
        let _ = io::stderr().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break Button::Cancel,
            Ok(_) => {}
        }
        let chosen = line
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| buttons.get(i));
        if let Some(button) = chosen {
            break *button;
        }
    };
    request.answer(button);
}
