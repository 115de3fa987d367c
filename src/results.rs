use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::errors::{CodedError, NO_RESULTS};
use crate::schema::{ResultFile, SuiteSummary, SummaryFile, SystemInfo};
use crate::stats::{mean_of_present, Summary};

pub fn save_results(path: &Path, file: &ResultFile) -> Result<()> {
    write_json(path, file)
}

pub fn load_results(path: &Path) -> Result<ResultFile> {
    read_json(path)
}

/// Like [`load_results`], but a missing file is `Ok(None)`.
pub fn load_results_if_present(path: &Path) -> Result<Option<ResultFile>> {
    match fs::metadata(path) {
        Ok(_) => load_results(path).map(Some),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => {
            Err(error).with_context(|| format!("failed to stat result file {}", path.display()))
        }
    }
}

pub fn summarize_suite(source: &Path, file: &ResultFile) -> Result<SuiteSummary> {
    let (Some(peak), Some(lowest)) = (
        file.results
            .iter()
            .max_by(|a, b| a.avg_fps.total_cmp(&b.avg_fps)),
        file.results
            .iter()
            .min_by(|a, b| a.avg_fps.total_cmp(&b.avg_fps)),
    ) else {
        return Err(anyhow::Error::new(
            CodedError::usage(
                NO_RESULTS,
                format!("{} contains no benchmark results", source.display()),
            )
            .with_details(json!({ "path": source.display().to_string() })),
        ));
    };

    let mean_cpu = Summary::of_iter(file.results.iter().map(|result| result.avg_cpu))
        .map_or(0.0, |summary| summary.mean);

    Ok(SuiteSummary {
        suite: file.suite,
        source: source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string()),
        configurations: file.results.len(),
        total_frames: file.results.iter().map(|result| result.total_frames).sum(),
        peak_avg_fps: peak.avg_fps,
        peak_config: peak.config,
        lowest_avg_fps: lowest.avg_fps,
        lowest_config: lowest.config,
        mean_cpu,
        mean_gpu: mean_of_present(file.results.iter().map(|result| result.avg_gpu)),
    })
}

pub fn build_summary(
    generated_at: String,
    system_info: SystemInfo,
    files: &[(PathBuf, ResultFile)],
) -> Result<SummaryFile> {
    let suites = files
        .iter()
        .map(|(path, file)| summarize_suite(path, file))
        .collect::<Result<Vec<_>>>()?;

    Ok(SummaryFile {
        generated_at,
        system_info,
        suites,
    })
}

pub fn save_summary(path: &Path, summary: &SummaryFile) -> Result<()> {
    write_json(path, summary)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let mut raw = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    raw.push('\n');
    fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
