//! Experiment, reagent value and feature slot persistence

use odx_common::db::{Experiment, ReagentValue};
use sqlx::{SqliteConnection, SqlitePool};

/// Dose ready to be written for an experiment
#[derive(Debug, Clone, PartialEq)]
pub struct NewReagentValue {
    pub reagent_id: i64,
    pub value: f64,
    pub unit: String,
}

/// Insert an experiment row and return its id.
///
/// With `id = None` SQLite assigns the next id; an explicit id that already
/// exists fails on the primary key.
pub async fn insert(
    conn: &mut SqliteConnection,
    id: Option<i64>,
    cell_concentration: f64,
    dilution: f64,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO experiments (id, cell_concentration, dilution) VALUES (?, ?, ?)",
    )
    .bind(id)
    .bind(cell_concentration)
    .bind(dilution)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Experiment>> {
    sqlx::query_as::<_, Experiment>(
        "SELECT id, cell_concentration, dilution FROM experiments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_all(pool: &SqlitePool) -> sqlx::Result<Vec<Experiment>> {
    sqlx::query_as::<_, Experiment>("SELECT id, cell_concentration, dilution FROM experiments ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Delete an experiment; its reagent values and slots cascade.
///
/// Returns false when the experiment did not exist.
pub async fn delete(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM experiments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Reagent values
// ============================================================================

/// Insert doses for an experiment; returns the new row ids in input order
pub async fn insert_reagent_values(
    conn: &mut SqliteConnection,
    experiment_id: i64,
    values: &[NewReagentValue],
) -> sqlx::Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(values.len());

    for value in values {
        let result = sqlx::query(
            "INSERT INTO reagent_values (experiment_id, reagent_id, value, unit) VALUES (?, ?, ?, ?)",
        )
        .bind(experiment_id)
        .bind(value.reagent_id)
        .bind(value.value)
        .bind(&value.unit)
        .execute(&mut *conn)
        .await?;

        ids.push(result.last_insert_rowid());
    }

    Ok(ids)
}

/// Doses of an experiment in persisted order
pub async fn list_reagent_values(pool: &SqlitePool, experiment_id: i64) -> sqlx::Result<Vec<ReagentValue>> {
    sqlx::query_as::<_, ReagentValue>(
        "SELECT id, experiment_id, reagent_id, value, unit FROM reagent_values WHERE experiment_id = ? ORDER BY id",
    )
    .bind(experiment_id)
    .fetch_all(pool)
    .await
}

/// Every dose of one catalog reagent across experiments
pub async fn list_reagent_values_by_reagent(
    pool: &SqlitePool,
    reagent_id: i64,
) -> sqlx::Result<Vec<ReagentValue>> {
    sqlx::query_as::<_, ReagentValue>(
        "SELECT id, experiment_id, reagent_id, value, unit FROM reagent_values WHERE reagent_id = ? ORDER BY id",
    )
    .bind(reagent_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_reagent_values(pool: &SqlitePool, experiment_id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM reagent_values WHERE experiment_id = ?")
        .bind(experiment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Feature slots
// ============================================================================

/// Persist the slot of each dose: `slots[i] = (slot_index, reagent_value_id, reagent_id)`
pub async fn insert_feature_slots(
    conn: &mut SqliteConnection,
    experiment_id: i64,
    slots: &[(i64, i64, i64)],
) -> sqlx::Result<()> {
    for (slot_index, reagent_value_id, reagent_id) in slots {
        sqlx::query(
            r#"
            INSERT INTO experiment_feature_slots (experiment_id, slot_index, reagent_value_id, reagent_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(experiment_id)
        .bind(slot_index)
        .bind(reagent_value_id)
        .bind(reagent_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Doses of an experiment ordered by their persisted feature slot.
///
/// Empty when the experiment has no slot mapping.
pub async fn list_slotted_reagent_values(
    pool: &SqlitePool,
    experiment_id: i64,
) -> sqlx::Result<Vec<ReagentValue>> {
    sqlx::query_as::<_, ReagentValue>(
        r#"
        SELECT rv.id, rv.experiment_id, rv.reagent_id, rv.value, rv.unit
        FROM experiment_feature_slots s
        JOIN reagent_values rv ON rv.id = s.reagent_value_id
        WHERE s.experiment_id = ?
        ORDER BY s.slot_index
        "#,
    )
    .bind(experiment_id)
    .fetch_all(pool)
    .await
}
