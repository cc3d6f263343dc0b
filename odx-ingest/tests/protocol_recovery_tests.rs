//! Integration tests for protocol recovery and the protocol repository

mod helpers;

use helpers::{count_rows, create_test_pool};
use odx_ingest::db::protocols;
use odx_ingest::parsers::text_table::RecoveredRow;
use odx_ingest::services::protocol_recovery::recover_protocol;
use odx_ingest::IngestError;

const GENERATED: &str = "Based on the literature, here is a medium:\n\
    ```csv\n\
    name,concentration,unit\n\
    Tris, 10mM, buffer,10,mM\n\
    Glycerol,NULL,liquid\n\
    Glucose,20,g/L\n\
    ```\n\
    Adjust the pH to 7.0 before use.";

#[tokio::test]
async fn test_recovered_table_is_persisted() {
    let pool = create_test_pool().await.unwrap();

    let report = recover_protocol(&pool, GENERATED, " Escherichia coli ").await.unwrap();
    assert_eq!(report.target_organism, "Escherichia coli");
    assert_eq!(report.repaired_lines, 1);

    let stored = protocols::list_by_tracker(&pool, report.tracker_id).await.unwrap();
    let rows: Vec<(&str, Option<f64>, &str)> = stored
        .iter()
        .map(|e| (e.reagent_name.as_str(), e.concentration, e.unit.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Tris, 10mM, buffer", Some(10.0), "mM"),
            ("Glycerol", None, "liquid"),
            ("Glucose", Some(20.0), "g/L"),
        ]
    );

    let tracker = protocols::get_tracker(&pool, report.tracker_id).await.unwrap().unwrap();
    assert_eq!(tracker.target_organism, "Escherichia coli");
}

#[tokio::test]
async fn test_failed_recovery_writes_nothing() {
    let pool = create_test_pool().await.unwrap();

    let bad = "name,concentration,unit\nGlucose,plenty,g/L\n";
    assert!(matches!(
        recover_protocol(&pool, bad, "Escherichia coli").await,
        Err(IngestError::TableRecovery(_))
    ));
    assert_eq!(count_rows(&pool, "protocol_trackers").await, 0);
    assert_eq!(count_rows(&pool, "protocols").await, 0);
}

#[tokio::test]
async fn test_trackers_by_organism_and_replace() {
    let pool = create_test_pool().await.unwrap();

    let first = recover_protocol(&pool, GENERATED, "Escherichia coli").await.unwrap();
    let second = recover_protocol(&pool, GENERATED, "Escherichia coli").await.unwrap();
    recover_protocol(&pool, GENERATED, "Bacillus subtilis").await.unwrap();

    let trackers = protocols::trackers_by_organism(&pool, "Escherichia coli").await.unwrap();
    let ids: Vec<i64> = trackers.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.tracker_id, first.tracker_id]);

    assert_eq!(
        protocols::distinct_organisms(&pool).await.unwrap(),
        vec!["Bacillus subtilis".to_string(), "Escherichia coli".to_string()]
    );

    let replacement = vec![RecoveredRow {
        name: "LB broth".to_string(),
        concentration: Some(25.0),
        unit: "g/L".to_string(),
    }];
    assert_eq!(
        protocols::replace_for_tracker(&pool, first.tracker_id, &replacement).await.unwrap(),
        1
    );

    let stored = protocols::list_by_tracker(&pool, first.tracker_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].reagent_name, "LB broth");
    assert_eq!(protocols::list_by_tracker(&pool, second.tracker_id).await.unwrap().len(), 3);
}
