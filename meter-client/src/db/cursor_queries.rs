use anyhow::Result;
use sqlx::{PgConnection, PgPool};

use crate::domain::Cursor;

pub async fn load_cursor(pool: &PgPool, stream_name: &str, label: &str) -> Result<Option<Cursor>> {
    let cursor = sqlx::query_as::<_, Cursor>(
        r#"
        SELECT stream_name, label, position
        FROM stream_position
        WHERE stream_name = $1
          AND label = $2
        "#,
    )
    .bind(stream_name)
    .bind(label)
    .fetch_optional(pool)
    .await?;

    Ok(cursor)
}

/// Create or advance a cursor. An existing position is never moved backwards.
pub async fn upsert_position(
    conn: &mut PgConnection,
    stream_name: &str,
    label: &str,
    position: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stream_position (stream_name, label, position)
        VALUES ($1, $2, $3)
        ON CONFLICT (stream_name, label)
        DO UPDATE SET position = GREATEST(stream_position.position, EXCLUDED.position)
        "#,
    )
    .bind(stream_name)
    .bind(label)
    .bind(position)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
