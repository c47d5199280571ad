use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::domain::{Reading, ReadingRecord, Register, RegisterRow, Resolution};

/// Labels with at least one reading newer than `newer_than`, sorted.
pub async fn labels_active_since(
    pool: &PgPool,
    resolution: Resolution,
    newer_than: OffsetDateTime,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT DISTINCT label FROM {} WHERE ts > $1 ORDER BY label",
        resolution.policy().reading_table
    );

    let labels = sqlx::query_scalar::<_, String>(&sql)
        .bind(newer_than)
        .fetch_all(pool)
        .await?;

    Ok(labels)
}

/// Fetch up to `limit` readings of a label with id greater than `after_id`,
/// in id order, each with its registers.
pub async fn load_readings_after(
    pool: &PgPool,
    resolution: Resolution,
    label: &str,
    after_id: i64,
    limit: i64,
) -> Result<Vec<ReadingRecord>> {
    let policy = resolution.policy();

    let sql = format!(
        r#"
        SELECT id, label, device_id, ts
        FROM {}
        WHERE label = $1
          AND id > $2
        ORDER BY id
        LIMIT $3
        "#,
        policy.reading_table
    );
    let readings = sqlx::query_as::<_, Reading>(&sql)
        .bind(label)
        .bind(after_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    if readings.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = readings.iter().map(|r| r.id).collect();
    let sql = format!(
        r#"
        SELECT reading_id, code, value, scale, unit
        FROM {}
        WHERE reading_id = ANY($1)
        ORDER BY reading_id, code
        "#,
        policy.register_table
    );
    let rows = sqlx::query_as::<_, RegisterRow>(&sql)
        .bind(&ids)
        .fetch_all(pool)
        .await?;

    let mut by_reading: HashMap<i64, Vec<Register>> = HashMap::with_capacity(readings.len());
    for row in rows {
        let reading_id = row.reading_id;
        let register = Register::try_from(row).with_context(|| {
            format!("undecodable register of {resolution} reading {reading_id}")
        })?;
        by_reading.entry(reading_id).or_default().push(register);
    }

    Ok(readings
        .into_iter()
        .map(|reading| {
            let registers = by_reading.remove(&reading.id).unwrap_or_default();
            ReadingRecord::new(reading, registers)
        })
        .collect())
}

/// Latest reading timestamp stored for a label, if any.
pub async fn max_timestamp(
    pool: &PgPool,
    resolution: Resolution,
    label: &str,
) -> Result<Option<OffsetDateTime>> {
    let sql = format!(
        "SELECT MAX(ts) FROM {} WHERE label = $1",
        resolution.policy().reading_table
    );

    let ts = sqlx::query_scalar::<_, Option<OffsetDateTime>>(&sql)
        .bind(label)
        .fetch_one(pool)
        .await?;

    Ok(ts)
}

/// Insert a reading and return the id assigned by the destination table.
///
/// The reading's own `id` is ignored; `timestamp` is stored as given.
pub async fn insert_reading(
    conn: &mut PgConnection,
    resolution: Resolution,
    reading: &Reading,
) -> Result<i64> {
    let sql = format!(
        "INSERT INTO {} (label, device_id, ts) VALUES ($1, $2, $3) RETURNING id",
        resolution.policy().reading_table
    );

    let id = sqlx::query_scalar::<_, i64>(&sql)
        .bind(&reading.label)
        .bind(&reading.device_id)
        .bind(reading.timestamp)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Insert registers under `reading_id`, ignoring their current owner.
pub async fn insert_registers(
    conn: &mut PgConnection,
    resolution: Resolution,
    reading_id: i64,
    registers: &[Register],
) -> Result<()> {
    if registers.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {} (reading_id, code, value, scale, unit) ",
        resolution.policy().register_table
    ));

    builder.push_values(registers, |mut b, r| {
        b.push_bind(reading_id)
            .push_bind(&r.code)
            .push_bind(r.value)
            .push_bind(r.scale)
            .push_bind(r.unit.symbol());
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}
