use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::StoredRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_records(
    pool: &PgPool,
    owner_id: Uuid,
    records: &[StoredRecord],
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await.context("failed to open transaction")?;
    let mut inserted = 0usize;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO health_monitor.health_records
            (owner_id, recorded_at, heart_rate, steps, sleep_hours, calories,
             blood_pressure_systolic, blood_pressure_diastolic, glucose,
             anomaly_flag, anomaly_score, anomaly_drivers)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(owner_id)
        .bind(record.timestamp)
        .bind(record.heart_rate)
        .bind(record.steps)
        .bind(record.sleep_hours)
        .bind(record.calories)
        .bind(record.blood_pressure_systolic)
        .bind(record.blood_pressure_diastolic)
        .bind(record.glucose)
        .bind(record.anomaly_flag)
        .bind(record.anomaly_score)
        .bind(&record.anomaly_drivers)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_records(pool: &PgPool, owner_id: Uuid) -> anyhow::Result<Vec<StoredRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT recorded_at, heart_rate, steps, sleep_hours, calories,
               blood_pressure_systolic, blood_pressure_diastolic, glucose,
               anomaly_flag, anomaly_score, anomaly_drivers
        FROM health_monitor.health_records
        WHERE owner_id = $1
        ORDER BY recorded_at ASC, record_id ASC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(StoredRecord {
            timestamp: row.get("recorded_at"),
            heart_rate: row.get("heart_rate"),
            steps: row.get("steps"),
            sleep_hours: row.get("sleep_hours"),
            calories: row.get("calories"),
            blood_pressure_systolic: row.get("blood_pressure_systolic"),
            blood_pressure_diastolic: row.get("blood_pressure_diastolic"),
            glucose: row.get("glucose"),
            anomaly_flag: row.get("anomaly_flag"),
            anomaly_score: row.get("anomaly_score"),
            anomaly_drivers: row.get("anomaly_drivers"),
        });
    }

    Ok(records)
}

pub async fn count_records(pool: &PgPool, owner_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS c FROM health_monitor.health_records WHERE owner_id = $1",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await?
    .get("c");
    Ok(count)
}

pub async fn count_all_records(pool: &PgPool) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM health_monitor.health_records")
        .fetch_one(pool)
        .await?
        .get("c");
    Ok(count)
}

pub async fn delete_records(pool: &PgPool, owner_id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM health_monitor.health_records WHERE owner_id = $1")
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
