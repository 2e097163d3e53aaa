//! Indexing progress reporting.
//!
//! Reports observable progress during `clinic-rag index` so users see how
//! many FAQ entries have been embedded and which batches have been written.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an indexing run.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexProgressEvent {
    /// The FAQ file was read.
    Loaded { index: String, entries: u64 },
    /// `n` of `total` entries embedded.
    Embedded { index: String, n: u64, total: u64 },
    /// Batch number `batch` of `size` vectors was upserted; `upserted`
    /// vectors written so far.
    Upserted {
        index: String,
        batch: u64,
        size: u64,
        upserted: u64,
        total: u64,
    },
}

/// Reports indexing progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the indexer.
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr:
/// "index clinic-faqs-index  embedding  40 / 120 entries".
pub struct StderrProgress;

/// Embedding lines are printed every this many entries (and at the end).
const EMBED_LINE_EVERY: u64 = 10;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Loaded { index, entries } => {
                format!("index {}  loaded {} entries\n", index, format_number(*entries))
            }
            IndexProgressEvent::Embedded { index, n, total } => {
                if n % EMBED_LINE_EVERY != 0 && n != total {
                    return;
                }
                format!(
                    "index {}  embedding  {} / {} entries\n",
                    index,
                    format_number(*n),
                    format_number(*total)
                )
            }
            IndexProgressEvent::Upserted {
                index,
                batch,
                size,
                upserted,
                total,
            } => format!(
                "index {}  batch {} upserted ({} vectors, {} / {})\n",
                index,
                batch,
                format_number(*size),
                format_number(*upserted),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Loaded { index, entries } => serde_json::json!({
                "event": "progress",
                "index": index,
                "phase": "loaded",
                "entries": entries
            }),
            IndexProgressEvent::Embedded { index, n, total } => serde_json::json!({
                "event": "progress",
                "index": index,
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            IndexProgressEvent::Upserted {
                index,
                batch,
                size,
                upserted,
                total,
            } => serde_json::json!({
                "event": "progress",
                "index": index,
                "phase": "upserted",
                "batch": batch,
                "size": size,
                "upserted": upserted,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it to the indexer.
    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
