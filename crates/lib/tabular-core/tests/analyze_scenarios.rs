use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tabular_core::control::{ControlError, TabularControlPlane};
use tabular_core::reader::{ReadError, ReaderOptions, SearchOptions};
use tabular_core::source::{
    DataSourceRef,
    DataSources,
    LocalSource,
    LocalSourceConfig,
    ObjectStoreClient,
    ObjectStoreSource,
    RetryPolicy,
    SourceError,
};

/// In-memory bucket contents keyed by `bucket/key`.
struct MemoryStore {
    objects: HashMap<String, Vec<u8>>,
}

impl ObjectStoreClient for MemoryStore {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        _max_bytes: usize,
    ) -> Result<Vec<u8>, SourceError> {
        self.objects
            .get(&format!("{bucket}/{key}"))
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("s3://{bucket}/{key}")))
    }
}

fn control_plane(sample_cap: usize) -> TabularControlPlane {
    let mut objects = HashMap::new();
    objects.insert(
        "reports/q1.csv".to_string(),
        b"region,total\nnorth,10\nsouth,12.5\n".to_vec(),
    );
    let client: Arc<dyn ObjectStoreClient> = Arc::new(MemoryStore { objects });
    let object_store =
        ObjectStoreSource::new(client).with_retry(RetryPolicy::new(3, Duration::ZERO));
    let sources = DataSources::new(LocalSource::new(LocalSourceConfig::default()))
        .with_object_store(object_store);
    TabularControlPlane::new(sources, ReaderOptions::default().with_sample_cap(sample_cap))
}

fn write_rows(path: &Path, rows: usize) {
    let mut text = String::from("id,label\n");
    for index in 0..rows {
        text.push_str(&format!("{index},item-{index}\n"));
    }
    fs::write(path, text).expect("write fixture");
}

#[test]
fn local_orders_are_summarized_in_full() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("orders.csv");
    fs::write(&path, "id,amount\n1,9.99\n2,15\n3,0.5\n4,120\n5,7.25\n").expect("write fixture");

    let report = control_plane(50)
        .analyze(&DataSourceRef::local(&path))
        .expect("orders should parse");

    assert_eq!(report.summary.row_count, 5);
    assert_eq!(report.summary.columns, vec!["id", "amount"]);
    assert_eq!(report.summary.sample_rows.len(), 5);
    assert!(!report.summary.truncated);
    assert_eq!(report.column_count, 2);
    assert_eq!(report.summary.sample_rows[0]["amount"], json!(9.99));
    assert_eq!(report.summary.sample_rows[4]["id"], json!(5));

    let payload = serde_json::to_value(&report).unwrap();
    assert_eq!(payload["row_count"], json!(5));
    assert_eq!(payload["truncated"], json!(false));
    assert_eq!(payload["source"], json!(path.display().to_string()));
}

#[test]
fn sample_bounds_hold_across_row_counts() {
    let cap = 7;
    let dir = tempfile::tempdir().expect("tempdir");
    let plane = control_plane(cap);
    for rows in [0, 1, cap, cap + 1, 1000] {
        let path = dir.path().join(format!("rows-{rows}.csv"));
        write_rows(&path, rows);
        let report = plane.analyze(&DataSourceRef::local(&path)).unwrap();
        assert_eq!(report.summary.row_count, rows);
        assert_eq!(report.summary.sample_rows.len(), rows.min(cap));
        assert_eq!(report.summary.truncated, rows > cap);
    }
}

#[test]
fn repeated_analysis_is_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stable.csv");
    write_rows(&path, 120);
    let plane = control_plane(50);
    let source = DataSourceRef::local(&path);
    assert_eq!(plane.analyze(&source).unwrap(), plane.analyze(&source).unwrap());
}

#[test]
fn blank_header_line_is_a_parse_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("blank.csv");
    fs::write(&path, "\n1,2\n3,4\n").expect("write fixture");

    let err = control_plane(50).analyze(&DataSourceRef::local(&path)).unwrap_err();
    assert_eq!(err, ControlError::Read(ReadError::EmptyHeader));
}

#[test]
fn object_keys_are_read_and_missing_keys_are_not_found() {
    let plane = control_plane(50);
    let report = plane
        .analyze(&DataSourceRef::object("reports", "q1.csv"))
        .expect("object should parse");
    assert_eq!(report.source, "s3://reports/q1.csv");
    assert_eq!(report.summary.row_count, 2);

    let err = plane
        .analyze(&DataSourceRef::object("bucket-x", "missing.csv"))
        .unwrap_err();
    assert!(matches!(err, ControlError::Source(SourceError::NotFound(_))));
}

#[test]
fn inspection_rejects_invalid_inputs_before_reading() {
    let plane = control_plane(50);
    let missing = DataSourceRef::local("/definitely/not/here.csv");

    let err = plane.validate_structure(&missing, -1, false).unwrap_err();
    assert!(matches!(err, ControlError::Invalid(_)));

    let err = plane.search_rows(&missing, &SearchOptions::new("")).unwrap_err();
    assert!(matches!(err, ControlError::Invalid(_)));
}

#[test]
fn structure_and_search_report_their_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("people.csv");
    fs::write(&path, "name,team\nada,core\ngrace,compilers\nlinus\n").expect("write fixture");
    let plane = control_plane(50);
    let source = DataSourceRef::local(&path);

    let check = plane.validate_structure(&source, 2, false).unwrap();
    let payload = serde_json::to_value(&check).unwrap();
    assert_eq!(payload["row_count"], json!(3));
    assert_eq!(payload["ragged_rows"], json!([{"row": 3, "field_count": 1}]));
    assert_eq!(payload["valid"], json!(false));

    let lenient = TabularControlPlane::new(
        plane.sources().clone(),
        ReaderOptions::default().with_strict(false),
    );
    let found = lenient
        .search_rows(&source, &SearchOptions::new("CORE"))
        .unwrap();
    assert_eq!(found.report.matched_rows, 1);
    assert_eq!(found.report.rows[0]["name"], json!("ada"));
}
