pub mod age;
pub mod completions;
pub mod fetch;
pub mod issues;

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use agelog_core::RawIssue;
use agelog_core::config::EffectiveConfig;
use agelog_core::source::{self, LoadReport};
use anyhow::{Context as _, Result};
use tracing::{info, warn};

use crate::output::OutputMode;

/// Settings shared by every command handler.
#[derive(Debug)]
pub struct Context {
    pub output: OutputMode,
    pub quiet: bool,
    pub config: EffectiveConfig,
}

/// Load a snapshot from `input`, or from stdin when no path is given.
pub fn read_snapshot(input: Option<&Path>) -> Result<(Vec<RawIssue>, LoadReport)> {
    let (issues, report) = match input {
        Some(path) => source::load_snapshot_file(path)?,
        None => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .context("failed to read snapshot from stdin")?;
            source::parse_snapshot(&content)?
        }
    };

    if report.skipped > 0 {
        warn!(
            skipped = report.skipped,
            layout = report.layout,
            "some snapshot entries were not issue objects"
        );
    }
    info!(issues = report.loaded, layout = report.layout, "loaded snapshot");
    Ok((issues, report))
}

/// Open `output` for writing, or stdout when no path is given.
pub fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
