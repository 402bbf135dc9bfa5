//! Terminal front-end for the keystroke recorder.

mod hooks;

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::warn;

use kbn_core::{
    config::Config,
    formatting::format_hms,
    recorder::{
        history::{history_line, stats_lines},
        Recorder,
    },
};

use hooks::TerminalHook;

#[derive(Parser)]
#[command(
    name = "kbn-recorder",
    version = env!("CARGO_PKG_VERSION"),
    about = "Record keystroke sessions, browse history and statistics, export CSV",
    long_about = None
)]
struct Cli {
    /// Override the sessions file (default: SESSIONS_FILE or sessions.json)
    #[arg(global = true, long = "sessions")]
    sessions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a session until an empty line is entered
    Record {
        /// Capture keys system-wide instead of from typed lines
        #[cfg(feature = "os-hook")]
        #[arg(long = "global")]
        global: bool,
    },

    /// List recorded sessions, newest first
    History {
        #[arg(long, short = 'n', help = "Show at most N sessions")]
        limit: Option<usize>,
    },

    /// Show the most pressed keys across all sessions
    Stats,

    /// Write the session history as CSV
    Export {
        /// Output file (default: keyboard-logger-YYYY-MM-DD.csv)
        path: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    kbn_core::logging::init("kbn-recorder")?;

    let cli = Cli::parse();
    let sessions_path = match cli.sessions {
        Some(p) => p,
        None => Config::load()?.sessions_file,
    };

    match cli.command {
        #[cfg(feature = "os-hook")]
        Commands::Record { global: true } => record_global(&sessions_path),
        Commands::Record { .. } => record_lines(&sessions_path),
        Commands::History { limit } => {
            let recorder = open_readonly(&sessions_path);
            let sessions = recorder.sessions();
            if sessions.is_empty() {
                println!("No sessions recorded yet.");
            }
            for s in sessions.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{}", history_line(s));
            }
            Ok(())
        }
        Commands::Stats => {
            let recorder = open_readonly(&sessions_path);
            for line in stats_lines(recorder.stats()) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Export { path } => {
            let recorder = open_readonly(&sessions_path);
            let path = path.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "keyboard-logger-{}.csv",
                    Local::now().format("%Y-%m-%d")
                ))
            });
            recorder
                .export_csv(&path)
                .with_context(|| format!("export to {}", path.display()))?;
            println!(
                "Exported {} sessions to {}",
                recorder.sessions().len(),
                path.display()
            );
            Ok(())
        }
    }
}

/// History and stats only read the file; no hook is ever installed.
fn open_readonly(path: &Path) -> Recorder {
    let (hook, _) = TerminalHook::connected();
    let recorder = Recorder::open(path, Box::new(hook));
    if let Some(e) = recorder.load_error() {
        eprintln!("Could not read {}: {e}", path.display());
    }
    recorder
}

fn print_tick(elapsed: u64) {
    let mut err = std::io::stderr();
    let _ = write!(err, "\r⏺ {}  ", format_hms(elapsed));
    let _ = err.flush();
}

fn start(recorder: &mut Recorder) -> anyhow::Result<()> {
    if let Some(e) = recorder.load_error() {
        eprintln!(
            "Could not read {}: {e}; starting with an empty history",
            recorder.sessions_path().display()
        );
    }
    recorder.start(print_tick).context("start recording")?;
    Ok(())
}

fn finish(recorder: &mut Recorder) -> anyhow::Result<()> {
    let report = recorder.stop().context("stop recording")?;
    eprintln!();
    println!(
        "Session {}: {} keys in {}",
        report.session.id,
        report.session.key_count,
        format_hms(report.session.duration)
    );
    if let Some(e) = report.persist_error {
        warn!("session kept in memory only");
        eprintln!("Could not save {}: {e}", recorder.sessions_path().display());
    }
    Ok(())
}

fn record_lines(sessions_path: &Path) -> anyhow::Result<()> {
    let (hook, feed) = TerminalHook::connected();
    let mut recorder = Recorder::open(sessions_path, Box::new(hook));
    start(&mut recorder)?;
    println!("Recording. Type and press Enter; an empty line stops.");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        if line.is_empty() {
            break;
        }
        feed.feed_line(&line);
    }
    finish(&mut recorder)
}

#[cfg(feature = "os-hook")]
fn record_global(sessions_path: &Path) -> anyhow::Result<()> {
    use kbn_core::recorder::KeyHook;

    let hook: Box<dyn KeyHook> = Box::new(hooks::OsHook::default());
    let mut recorder = Recorder::open(sessions_path, hook);
    start(&mut recorder)?;
    println!("Recording system-wide. Press Enter in this terminal to stop.");

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read stdin")?;
    finish(&mut recorder)
}
