use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::analysis::timeline::TimelineFrame;
use crate::analysis::{AmplitudePoint, FrequencyBar};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: usize,
    pub samples: usize,
    pub duration_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub source: SourceInfo,
    pub waveform: &'a [AmplitudePoint],
    pub spectrum: &'a [FrequencyBar],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<&'a [TimelineFrame]>,
}

pub fn write_report(path: &Path, report: &Report<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    log::info!("Wrote report to {}", path.display());
    Ok(())
}
