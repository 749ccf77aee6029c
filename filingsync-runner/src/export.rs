//! Output persistence: CSV tables, coverage JSON, and the run manifest.
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! crashed run never leaves a half-written table behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use filingsync_core::domain::{AlignedRecord, CanonicalFact};
use serde::{Deserialize, Serialize};

use crate::config::{OutputConfig, RunId};
use crate::reconcile::ReconcileOutput;

pub const SCHEMA_VERSION: u32 = 1;

// ─── CSV tables ─────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Assets table.
///
/// Columns: identifier, fact_name, form_type, period_end, filed_date, value
pub fn export_assets_csv(assets: &[CanonicalFact]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "identifier",
        "fact_name",
        "form_type",
        "period_end",
        "filed_date",
        "value",
    ])?;
    for fact in assets {
        wtr.write_record([
            fact.identifier.as_str(),
            fact.fact_name.as_str(),
            fact.form_type.form_code(),
            &fact.period_end.to_string(),
            &fact.filed_date.to_string(),
            &fact.value.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Prices table. The return column is empty for the first row of each
/// identifier and for flagged rows.
///
/// Columns: identifier, date, adjusted_close, interperiod_return_pct
pub fn export_prices_csv(records: &[AlignedRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["identifier", "date", "adjusted_close", "interperiod_return_pct"])?;
    for r in records {
        wtr.write_record([
            r.identifier.as_str(),
            &r.adjusted_target_date.to_string(),
            &r.adjusted_close.to_string(),
            &opt(r.interperiod_return_pct),
        ])?;
    }
    finish(wtr)
}

/// Full aligned records including the filing each price belongs to.
pub fn export_records_csv(records: &[AlignedRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "identifier",
        "period_end",
        "filed_date",
        "adjusted_target_date",
        "adjusted_close",
        "interperiod_return_pct",
        "return_flag",
    ])?;
    for r in records {
        wtr.write_record([
            r.identifier.as_str(),
            &r.period_end.to_string(),
            &r.filed_date.to_string(),
            &r.adjusted_target_date.to_string(),
            &r.adjusted_close.to_string(),
            &opt(r.interperiod_return_pct),
            r.return_flag.map(|f| f.as_str()).unwrap_or(""),
        ])?;
    }
    finish(wtr)
}

// ─── Manifest ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub name: String,
    pub blake3: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: RunId,
    pub start_date: String,
    pub generated_at: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub files: BTreeMap<String, ManifestFile>,
}

/// Paths of everything a run wrote.
#[derive(Debug, Clone)]
pub struct SavedOutputs {
    pub dir: PathBuf,
    pub assets: PathBuf,
    pub prices: PathBuf,
    pub records: PathBuf,
    pub coverage: PathBuf,
    pub manifest: PathBuf,
}

/// Write `contents` to `path` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    std::fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))
}

/// Save every run artifact under `config.dir`.
pub fn save_outputs(output: &ReconcileOutput, config: &OutputConfig, run_id: &str) -> Result<SavedOutputs> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("failed to create output dir: {}", config.dir.display()))?;

    let tables = [
        (&config.assets_file, export_assets_csv(&output.assets)?, output.assets.len()),
        (&config.prices_file, export_prices_csv(&output.records)?, output.records.len()),
        (&config.records_file, export_records_csv(&output.records)?, output.records.len()),
    ];

    let mut files = BTreeMap::new();
    for (name, contents, rows) in &tables {
        write_atomic(&config.dir.join(name), contents.as_bytes())?;
        files.insert(
            name.to_string(),
            ManifestFile {
                name: name.to_string(),
                blake3: blake3::hash(contents.as_bytes()).to_hex().to_string(),
                rows: *rows,
            },
        );
    }

    let coverage = serde_json::to_string_pretty(&output.coverage)
        .context("failed to serialize coverage report")?;
    write_atomic(&config.dir.join(&config.coverage_file), coverage.as_bytes())?;

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: run_id.to_string(),
        start_date: output.start_date.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        attempted: output.coverage.attempted,
        succeeded: output.coverage.succeeded,
        partial: output.coverage.partial,
        failed: output.coverage.failed,
        files,
    };
    let manifest_json =
        serde_json::to_string_pretty(&manifest).context("failed to serialize run manifest")?;
    write_atomic(&config.dir.join(&config.manifest_file), manifest_json.as_bytes())?;

    tracing::info!(
        dir = %config.dir.display(),
        assets = output.assets.len(),
        prices = output.records.len(),
        "outputs written"
    );

    Ok(SavedOutputs {
        dir: config.dir.clone(),
        assets: config.dir.join(&config.assets_file),
        prices: config.dir.join(&config.prices_file),
        records: config.dir.join(&config.records_file),
        coverage: config.dir.join(&config.coverage_file),
        manifest: config.dir.join(&config.manifest_file),
    })
}

/// Load a manifest written by [`save_outputs`].
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        anyhow::bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}
