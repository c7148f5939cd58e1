use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::types::{ProbeOutcome, RunResult};

/// Append-only store of reportable outcomes, shared by all probe tasks.
#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    entries: Arc<Mutex<Vec<ProbeOutcome>>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, outcome: ProbeOutcome) {
        self.entries.lock().await.push(outcome);
    }

    /// Take the collected entries, leaving the store empty.
    pub async fn take(&self) -> Vec<ProbeOutcome> {
        std::mem::take(&mut *self.entries.lock().await)
    }
}

/// Write one `candidate - Status: code` line per hit, replacing the file.
pub fn write_lines(path: &Path, result: &RunResult) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for line in result.lines() {
        writeln!(w, "{line}")?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_json(path: &Path, result: &RunResult) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, result)?;
    Ok(())
}
