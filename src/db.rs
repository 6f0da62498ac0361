use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id            TEXT PRIMARY KEY,
        name          TEXT NOT NULL,
        description   TEXT,
        creator_id    TEXT NOT NULL,
        participants  TEXT[] NOT NULL DEFAULT '{}',
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id           TEXT PRIMARY KEY,
        room_id      TEXT NOT NULL REFERENCES rooms(id),
        sender_id    TEXT NOT NULL,
        sender_name  TEXT NOT NULL,
        text         TEXT NOT NULL,
        file_url     TEXT,
        file_name    TEXT,
        file_type    TEXT,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
        is_edited    BOOLEAN NOT NULL DEFAULT FALSE,
        deleted_at   TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_room_created
        ON messages(room_id, created_at)",
    "CREATE TABLE IF NOT EXISTS message_reads (
        message_id  TEXT NOT NULL REFERENCES messages(id),
        user_id     TEXT NOT NULL,
        read_at     TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (message_id, user_id)
    )",
];

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    info!("Connected to database");
    Ok(pool)
}

/// Creates the schema if it does not exist yet
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for statement in MIGRATIONS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to run database migration")?;
    }

    info!("Database migrations complete");
    Ok(())
}
