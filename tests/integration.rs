//! Integration tests for CohortForge

use cohortforge::{
    build_feature_table, export_artifacts, load_table, run_pipeline, CohortError, PipelineConfig,
    CLUSTER_COLUMN,
};
use polars::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a click events CSV file with sample data
fn create_click_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "MLID,Click Events LOFT").unwrap();

    // Price-sheet hunters
    writeln!(file, "u1,\"['PRICE$PRICE_SHEET', 'PRICE$UNLOCK_PRICESHEET', 'PAYMENT_STRUCTURE']\"").unwrap();
    writeln!(file, "u2,\"['PRICE$PRICE_SHEET', 'EMI_CALCULATOR', 'PRICE$PRICE_SHEET']\"").unwrap();

    // Lead creators, JSON dialect
    writeln!(file, "u3,\"[\"\"ENQUIRY_DIALOG$GET_OTP\"\", \"\"ENQUIRY_DIALOG$SUBMIT_LEAD\"\", \"\"WHATSAPP$OPEN\"\"]\"").unwrap();
    writeln!(file, "u4,\"['ENQUIRY_DIALOG$LEAD_CREATED', 'WHATSAPP$OPEN', 'WHATSAPP$SHARE']\"").unwrap();

    // Browsers
    writeln!(file, "u5,\"['PLANS$1BHK', 'VIDEOS$TOUR']\"").unwrap();
    writeln!(file, "u6,\"['PLANS$2BHK',\\n 'VIDEOS$TOUR', 'BROCHURE_DOWNLOAD']\"").unwrap();

    // Malformed and empty cells
    writeln!(file, "u7,not a list").unwrap();
    writeln!(file, "u8,").unwrap();

    // Only in the click table
    writeln!(file, "u9,\"['WHATSAPP$OPEN']\"").unwrap();

    file
}

/// Create a view events CSV file with sample data
fn create_view_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "MLID,View Events").unwrap();
    writeln!(file, "u1,\"[['PRICE_DETAIL', 120.5], ['PRICE_LIST', 80]]\"").unwrap();
    writeln!(file, "u2,\"[['PRICE_DETAIL', 95], ['BROCHURE', '30']]\"").unwrap();
    writeln!(file, "u3,\"[['GALLERY_VIEW', 12], ['PLAN_VIEW', 4]]\"").unwrap();
    writeln!(file, "u4,\"[['GALLERY_VIEW', 8]]\"").unwrap();
    writeln!(file, "u5,\"[['VIDEO_PLAY', 300], ['PLAN_VIEW', 40], ['PLAN_VIEW', 20]]\"").unwrap();
    writeln!(file, "u6,\"[['VIDEO_PLAY', 250], 'STRAY']\"").unwrap();
    writeln!(file, "u7,\"[]\"").unwrap();
    writeln!(file, "u8,\"[['GALLERY_VIEW', 1]]\"").unwrap();

    // Only in the view table
    writeln!(file, "u10,\"[['VIDEO_PLAY', 5]]\"").unwrap();

    file
}

fn load_sample_tables() -> (DataFrame, DataFrame, NamedTempFile, NamedTempFile) {
    let click_file = create_click_csv();
    let view_file = create_view_csv();
    let clicks = load_table(click_file.path()).unwrap();
    let views = load_table(view_file.path()).unwrap();
    (clicks, views, click_file, view_file)
}

#[test]
fn test_feature_table_from_csv() {
    let (clicks, views, _c, _v) = load_sample_tables();
    let features = build_feature_table(&clicks, &views, &PipelineConfig::new()).unwrap();

    // u9 and u10 appear on one side only
    assert_eq!(features.height(), 8);
    let ids = features.ids().unwrap();
    assert_eq!(ids, vec!["u1", "u2", "u3", "u4", "u5", "u6", "u7", "u8"]);

    assert_eq!(features.value("u1", "price_sheet"), Some(2.0));
    assert_eq!(features.value("u1", "payment"), Some(1.0));
    assert_eq!(features.value("u2", "n_click_unique"), Some(2.0));
    assert_eq!(features.value("u3", "contact_or_otp"), Some(2.0));
    assert_eq!(features.value("u6", "n_clicks"), Some(3.0));
    assert_eq!(features.value("u7", "n_clicks"), Some(0.0));
    assert_eq!(features.value("u8", "n_clicks"), Some(0.0));

    assert_eq!(features.value("u1", "total_view_time"), Some(200.5));
    assert_eq!(features.value("u2", "total_view_time"), Some(125.0));
    assert_eq!(features.value("u5", "plan_view"), Some(2.0));
    assert_eq!(features.value("u5", "n_view_unique"), Some(2.0));
    assert_eq!(features.value("u6", "n_view_events"), Some(2.0));
    assert_eq!(features.value("u6", "n_view_unique"), Some(1.0));
}

#[test]
fn test_end_to_end_pipeline() {
    let (clicks, views, _c, _v) = load_sample_tables();
    let result = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap();

    // Every row labelled, labels in range
    assert_eq!(result.clustered.height(), 8);
    let labels = result.clustered.column(CLUSTER_COLUMN).unwrap().i64().unwrap();
    assert_eq!(labels.null_count(), 0);
    assert!(labels.into_iter().all(|l| matches!(l, Some(0..=2))));

    // Cluster sizes sum to total users
    assert_eq!(result.cluster_sizes().iter().sum::<usize>(), 8);

    // One summary row per produced label
    let present = result.present_labels();
    assert_eq!(result.summary_mean.height(), present.len());
    assert_eq!(result.summary_median.height(), present.len());
}

#[test]
fn test_summaries_match_cohort_aggregates() {
    let (clicks, views, _c, _v) = load_sample_tables();
    let result = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap();

    let summary_labels: Vec<i64> = result
        .summary_mean
        .column(CLUSTER_COLUMN)
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();

    for name in result.features.feature_names() {
        let values = result.features.values(&name).unwrap();
        let means = result.summary_mean.column(&name).unwrap().f64().unwrap();
        let medians = result.summary_median.column(&name).unwrap().f64().unwrap();

        for (row, &label) in summary_labels.iter().enumerate() {
            let mut cohort: Vec<f64> = result
                .labels()
                .iter()
                .enumerate()
                .filter(|(_, &l)| l as i64 == label)
                .map(|(i, _)| values[i])
                .collect();
            cohort.sort_by(|a, b| a.partial_cmp(b).unwrap());

            let mean = cohort.iter().sum::<f64>() / cohort.len() as f64;
            let mid = cohort.len() / 2;
            let median = if cohort.len() % 2 == 0 {
                (cohort[mid - 1] + cohort[mid]) / 2.0
            } else {
                cohort[mid]
            };

            assert!((means.get(row).unwrap() - mean).abs() < 1e-9, "mean of {name}");
            assert!((medians.get(row).unwrap() - median).abs() < 1e-9, "median of {name}");
        }
    }
}

#[test]
fn test_clustering_is_reproducible() {
    let (clicks, views, _c, _v) = load_sample_tables();
    let config = PipelineConfig::new();

    let first = run_pipeline(&clicks, &views, &config).unwrap();
    let second = run_pipeline(&clicks, &views, &config).unwrap();

    assert_eq!(first.labels(), second.labels());
    assert!(first.clustered.equals(&second.clustered));
}

#[test]
fn test_disjoint_tables_yield_empty_feature_table() {
    let clicks = df!("MLID" => &["a", "b"], "Click Events LOFT" => &["['WHATSAPP']", "[]"]).unwrap();
    let views = df!("MLID" => &["c", "d"], "View Events" => &["[['VIDEO', 1]]", "[]"]).unwrap();

    let features = build_feature_table(&clicks, &views, &PipelineConfig::new()).unwrap();
    assert_eq!(features.height(), 0);

    let err = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap_err();
    assert!(matches!(
        err,
        CohortError::InsufficientRows {
            requested: 3,
            available: 0
        }
    ));
}

#[test]
fn test_invalid_duration_aborts_pipeline() {
    let clicks = df!("MLID" => &["a"], "Click Events LOFT" => &["[]"]).unwrap();
    let views = df!("MLID" => &["a"], "View Events" => &["[['PRICE_DETAIL', 'n/a']]"]).unwrap();

    let err = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap_err();
    assert!(matches!(err, CohortError::InvalidDuration { ref id, .. } if id == "a"));
}

#[test]
fn test_identical_users_signal_fewer_cohorts() {
    let ids = ["a", "b", "c", "d", "e"];
    let clicks = df!("MLID" => &ids, "Click Events LOFT" => &["['WHATSAPP$OPEN']"; 5]).unwrap();
    let views = df!("MLID" => &ids, "View Events" => &["[['VIDEO_PLAY', 10]]"; 5]).unwrap();

    let result = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap();
    assert_eq!(result.effective_clusters(), 1);
    assert_eq!(result.cluster_sizes(), vec![5, 0, 0]);
    assert_eq!(result.summary_mean.height(), 1);
    assert_eq!(result.summary_median.height(), 1);
}

#[test]
fn test_non_finite_duration_aborts_pipeline() {
    let clicks = df!("MLID" => &["a", "b"], "Click Events LOFT" => &["[]", "[]"]).unwrap();
    let views = df!("MLID" => &["a", "b"], "View Events" => &["[['X', 1]]", "[['X', 'nan']]"]).unwrap();

    let err = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap_err();
    assert!(matches!(err, CohortError::InvalidDuration { ref id, .. } if id == "b"));
}

#[test]
fn test_duplicate_identifier_rejected() {
    let clicks = df!("MLID" => &["a", "a"], "Click Events LOFT" => &["[]", "[]"]).unwrap();
    let views = df!("MLID" => &["a"], "View Events" => &["[]"]).unwrap();

    let err = build_feature_table(&clicks, &views, &PipelineConfig::new()).unwrap_err();
    assert!(matches!(err, CohortError::DuplicateIdentifier { ref table, .. } if table == "click"));
}

#[test]
fn test_export_from_csv_pipeline() {
    let (clicks, views, _c, _v) = load_sample_tables();
    let result = run_pipeline(&clicks, &views, &PipelineConfig::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let written = export_artifacts(&result, dir.path(), "MLID").unwrap();
    assert_eq!(written.len(), 3 + result.present_labels().len());

    // Cohort identifier lists cover every user exactly once
    let mut ids: Vec<String> = Vec::new();
    for label in result.present_labels() {
        let cohort = load_table(dir.path().join(format!("cluster_{label}_mlids.csv"))).unwrap();
        let column = cohort.column("MLID").unwrap().str().unwrap();
        ids.extend(column.into_no_null_iter().map(str::to_string));
    }
    ids.sort();
    assert_eq!(ids, vec!["u1", "u2", "u3", "u4", "u5", "u6", "u7", "u8"]);
}
