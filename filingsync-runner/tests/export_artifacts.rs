//! Output persistence: files on disk, manifest hashes, offline re-runs.

use chrono::NaiveDate;
use filingsync_core::data::{
    CsvFactSource, CsvPriceSource, FetchError, MemoryFactSource, MemoryPriceSource,
};
use filingsync_core::domain::{DisclosureFact, FormType, PriceQuote};
use filingsync_runner::export::load_manifest;
use filingsync_runner::{save_outputs, OutputConfig, ReconcileConfig, ReconcileOutput, Reconciler};
use std::sync::Arc;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn fact(identifier: &str, form_type: FormType, period_end: &str, filed: &str, value: f64) -> DisclosureFact {
    DisclosureFact {
        identifier: identifier.into(),
        fact_name: "Assets".into(),
        form_type,
        period_end: d(period_end),
        filed_date: d(filed),
        value,
    }
}

fn quote(identifier: &str, date: &str, close: f64) -> PriceQuote {
    PriceQuote {
        identifier: identifier.into(),
        date: d(date),
        adjusted_close: close,
    }
}

fn sample_run() -> ReconcileOutput {
    let facts = MemoryFactSource::new()
        .with_facts(
            "MMM",
            vec![
                fact("MMM", FormType::Annual, "2015-12-31", "2016-02-09", 32_718_000_000.0),
                fact("MMM", FormType::Quarterly, "2016-03-31", "2016-05-05", 33_000_000_000.5),
            ],
        )
        .with_failure("BAD", FetchError::IdentifierNotFound { identifier: "BAD".into() });
    let prices = MemoryPriceSource::new().with_quotes(
        "MMM",
        vec![quote("MMM", "2016-02-09", 150.0), quote("MMM", "2016-05-05", 165.0)],
    );

    Reconciler::new(Arc::new(facts), Arc::new(prices), ReconcileConfig::default())
        .run(&["MMM".into(), "BAD".into()], d("2016-01-01"))
        .unwrap()
}

fn output_config(dir: &std::path::Path) -> OutputConfig {
    OutputConfig {
        dir: dir.join("out"),
        ..OutputConfig::default()
    }
}

#[test]
fn writes_all_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let config = output_config(tmp.path());
    let output = sample_run();

    let saved = save_outputs(&output, &config, "run-123").unwrap();

    for path in [&saved.assets, &saved.prices, &saved.records, &saved.coverage, &saved.manifest] {
        assert!(path.exists(), "missing {}", path.display());
    }

    let prices = std::fs::read_to_string(&saved.prices).unwrap();
    assert_eq!(
        prices,
        "identifier,date,adjusted_close,interperiod_return_pct\n\
         MMM,2016-02-09,150,\n\
         MMM,2016-05-05,165,0.1\n"
    );

    let coverage: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved.coverage).unwrap()).unwrap();
    assert_eq!(coverage["attempted"], 2);
    assert_eq!(coverage["failures_by_category"]["fetch"][0], "BAD");
}

#[test]
fn manifest_hashes_match_written_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let config = output_config(tmp.path());
    let saved = save_outputs(&sample_run(), &config, "run-abc").unwrap();

    let manifest = load_manifest(&saved.manifest).unwrap();
    assert_eq!(manifest.run_id, "run-abc");
    assert_eq!(manifest.start_date, "2016-01-01");
    assert_eq!(manifest.succeeded, 1);
    assert_eq!(manifest.failed, 1);

    let assets_entry = &manifest.files["assets_data.csv"];
    assert_eq!(assets_entry.rows, 2);
    let bytes = std::fs::read(&saved.assets).unwrap();
    assert_eq!(assets_entry.blake3, blake3::hash(&bytes).to_hex().to_string());
}

#[test]
fn written_tables_feed_an_offline_rerun() {
    let tmp = tempfile::tempdir().unwrap();
    let config = output_config(tmp.path());
    let first = sample_run();
    let saved = save_outputs(&first, &config, "first").unwrap();

    let facts = CsvFactSource::from_path(&saved.assets).unwrap();
    let prices_csv = std::fs::read_to_string(&saved.prices).unwrap();
    let prices = CsvPriceSource::from_reader(prices_csv.as_bytes()).unwrap();

    let second = Reconciler::new(Arc::new(facts), Arc::new(prices), ReconcileConfig::default())
        .run(&["MMM".into()], d("2016-01-01"))
        .unwrap();

    assert_eq!(second.assets, first.assets);
    assert_eq!(second.records, first.records);
}
