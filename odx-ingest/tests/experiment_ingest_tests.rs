//! Integration tests for experiment ingestion

mod helpers;

use helpers::{count_rows, create_file_db, create_test_pool, seed_catalog, write_fixture, SHEET_EXP_1};
use odx_ingest::db::experiments;
use odx_ingest::db::reagents::SqliteReagentCatalog;
use odx_ingest::services::experiment_ingest::{
    ingest_experiment_path, ingest_experiment_text, DEFAULT_EXPERIMENT_PATTERN,
};
use odx_ingest::services::file_scanner::NamePattern;
use odx_ingest::IngestError;
use tempfile::TempDir;

#[tokio::test]
async fn test_matched_doses_are_persisted_and_unknown_names_reported() {
    let pool = create_test_pool().await.unwrap();
    let ids = seed_catalog(&pool, &["Glucose", "NaCl", "Tryptone"]).await.unwrap();
    let catalog = SqliteReagentCatalog::new(pool.clone());

    let report = ingest_experiment_text(&pool, &catalog, SHEET_EXP_1, "Costs analysis - exp 1.csv", None)
        .await
        .unwrap();

    assert_eq!(report.experiment_id, 1);
    assert_eq!(report.doses_inserted, 3);
    assert_eq!(report.skipped_reagents, vec!["Unobtainium".to_string()]);

    let experiment = experiments::get_by_id(&pool, 1).await.unwrap().unwrap();
    assert_eq!(experiment.cell_concentration, 5.0);
    assert_eq!(experiment.dilution, 10.0);

    // Sheet order is kept in storage
    let stored = experiments::list_reagent_values(&pool, 1).await.unwrap();
    let reagent_ids: Vec<i64> = stored.iter().map(|v| v.reagent_id).collect();
    assert_eq!(reagent_ids, vec![ids[2], ids[0], ids[1]]);

    // Slots follow catalog id
    let slotted = experiments::list_slotted_reagent_values(&pool, 1).await.unwrap();
    let values: Vec<f64> = slotted.iter().map(|v| v.value).collect();
    assert_eq!(values, vec![2.5, 0.5, 1.5]);
}

#[tokio::test]
async fn test_name_match_is_exact() {
    let pool = create_test_pool().await.unwrap();
    seed_catalog(&pool, &["Glucose"]).await.unwrap();
    let catalog = SqliteReagentCatalog::new(pool.clone());

    let sheet = "type,value,Units\ncell concentration,1,\ndilution,1,\nglucose,2,g/L\n";
    let report = ingest_experiment_text(&pool, &catalog, sheet, "data.csv", Some(4))
        .await
        .unwrap();

    assert_eq!(report.experiment_id, 4);
    assert_eq!(report.doses_inserted, 0);
    assert_eq!(report.skipped_reagents, vec!["glucose".to_string()]);
}

#[tokio::test]
async fn test_missing_identifier_and_invalid_scalars_write_nothing() {
    let pool = create_test_pool().await.unwrap();
    let catalog = SqliteReagentCatalog::new(pool.clone());

    let missing = ingest_experiment_text(&pool, &catalog, SHEET_EXP_1, "sheet.csv", None).await;
    assert!(matches!(missing, Err(IngestError::MissingExperimentIdentifier(_))));

    let zero_dilution = "type,value,Units\ncell concentration,5.0,\ndilution,0.0,\n";
    let invalid = ingest_experiment_text(&pool, &catalog, zero_dilution, "exp 2.csv", None).await;
    assert!(matches!(invalid, Err(IngestError::InvalidExperimentParameter { .. })));

    assert_eq!(count_rows(&pool, "experiments").await, 0);
}

#[tokio::test]
async fn test_duplicate_experiment_id_fails_without_partial_writes() {
    let pool = create_test_pool().await.unwrap();
    seed_catalog(&pool, &["Glucose", "NaCl", "Tryptone"]).await.unwrap();
    let catalog = SqliteReagentCatalog::new(pool.clone());

    ingest_experiment_text(&pool, &catalog, SHEET_EXP_1, "exp 1.csv", None)
        .await
        .unwrap();
    let again = ingest_experiment_text(&pool, &catalog, SHEET_EXP_1, "exp 1.csv", None).await;

    assert!(matches!(again, Err(IngestError::IngestionFailed { .. })));
    assert_eq!(count_rows(&pool, "reagent_values").await, 3);
    assert_eq!(count_rows(&pool, "experiment_feature_slots").await, 3);
}

#[tokio::test]
async fn test_delete_cascades_to_doses_and_slots() {
    let pool = create_test_pool().await.unwrap();
    seed_catalog(&pool, &["Glucose", "NaCl", "Tryptone"]).await.unwrap();
    let catalog = SqliteReagentCatalog::new(pool.clone());
    ingest_experiment_text(&pool, &catalog, SHEET_EXP_1, "exp 1.csv", None)
        .await
        .unwrap();

    assert!(experiments::delete(&pool, 1).await.unwrap());
    assert!(!experiments::delete(&pool, 1).await.unwrap());
    assert_eq!(count_rows(&pool, "reagent_values").await, 0);
    assert_eq!(count_rows(&pool, "experiment_feature_slots").await, 0);
}

#[tokio::test]
async fn test_directory_batch() {
    let (_db_dir, pool) = create_file_db().await.unwrap();
    let ids = seed_catalog(&pool, &["Glucose", "NaCl", "Tryptone"]).await.unwrap();
    let catalog = SqliteReagentCatalog::new(pool.clone());

    let input = TempDir::new().unwrap();
    write_fixture(input.path(), "chemicals - exp 1.csv", SHEET_EXP_1);
    write_fixture(input.path(), "chemicals - exp 2.csv", "type,value,Units\ndilution,2,\n");
    write_fixture(input.path(), "chemicals - exp 3.csv", SHEET_EXP_1);
    write_fixture(input.path(), "plate_1_abs.csv", ",A1\n0,0.1\n");

    let pattern = NamePattern::new(DEFAULT_EXPERIMENT_PATTERN).unwrap();
    let report = ingest_experiment_path(&pool, &catalog, input.path(), &pattern, None)
        .await
        .unwrap();

    assert_eq!(report.files.len(), 3);
    assert_eq!(report.failure_count(), 1);
    let created: Vec<i64> = report.succeeded().map(|(_, r)| r.experiment_id).collect();
    assert_eq!(created, vec![1, 3]);

    let by_reagent = experiments::list_reagent_values_by_reagent(&pool, ids[0]).await.unwrap();
    assert_eq!(by_reagent.len(), 2);
    assert_eq!(experiments::list_all(&pool).await.unwrap().len(), 2);

    assert_eq!(experiments::delete_reagent_values(&pool, 3).await.unwrap(), 3);
}
