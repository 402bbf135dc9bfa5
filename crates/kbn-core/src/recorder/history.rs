//! `sessions.json` persistence and terminal renderings of the history.

use std::path::Path;

use crate::{
    errors::Error,
    formatting::format_hms,
    recorder::session::{KeyStats, Session},
    sessions_csv::{write_csv, CsvSessionRow},
    Result,
};

const BAR_WIDTH: usize = 20;

/// Read the session history. A missing or blank file is an empty history.
pub fn load_sessions(path: &Path) -> Result<Vec<Session>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&txt)?)
}

/// Rewrite the whole history file (newest first, pretty-printed).
pub fn save_sessions(path: &Path, sessions: &[Session]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let txt = serde_json::to_string_pretty(sessions)?;
    std::fs::write(path, txt)?;
    Ok(())
}

/// Write every session as a CSV row to `path`.
pub fn export_csv(path: &Path, sessions: &[Session]) -> Result<()> {
    if sessions.is_empty() {
        return Err(Error::Validation(
            "no sessions to export; record at least one session first".to_string(),
        ));
    }
    let rows: Vec<CsvSessionRow> = sessions.iter().map(Session::csv_row).collect();
    let file = std::fs::File::create(path).map_err(|e| Error::InvalidPath {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    write_csv(file, &rows)
}

/// `dd.mm.yyyy HH:MM | HH:MM:SS | N keys`
pub fn history_line(session: &Session) -> String {
    format!(
        "{} | {} | {} keys",
        session.start_time.format("%d.%m.%Y %H:%M"),
        format_hms(session.duration),
        session.key_count
    )
}

/// Top-10 keys with proportional bars.
pub fn stats_lines(stats: &KeyStats) -> Vec<String> {
    let top = stats.top(10);
    let Some(max) = top.first().map(|(_, c)| *c).filter(|c| *c > 0) else {
        return vec!["No data yet. Start a recording to collect statistics.".to_string()];
    };

    top.iter()
        .enumerate()
        .map(|(idx, (key, count))| {
            let filled = (count * BAR_WIDTH as u64 / max) as usize;
            let bar = format!(
                "{}{}",
                "█".repeat(filled),
                "░".repeat(BAR_WIDTH - filled)
            );
            format!("#{:>2} [{key:<10}] {bar} {count:>4}", idx + 1)
        })
        .collect()
}
