//! Idempotent schema setup, run at startup by the trigger binary.
//!
//! The UNIQUE constraint on `incidents.dedup_key` is the correctness backstop
//! for the whole pipeline: even if two cycles race on the same key, Postgres
//! guarantees only one creation succeeds.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS incidents (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        severity INT NOT NULL,
        category TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        lat DOUBLE PRECISION,
        lon DOUBLE PRECISION,
        confidence DOUBLE PRECISION NOT NULL DEFAULT 1.0,
        dedup_key TEXT NOT NULL UNIQUE,
        tags TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS evidence_reports (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        incident_id UUID NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
        source TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_evidence_incident
        ON evidence_reports (incident_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS missions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name TEXT NOT NULL,
        goal TEXT NOT NULL DEFAULT '',
        keywords TEXT[] NOT NULL DEFAULT '{}',
        status TEXT NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS system_config (
        key TEXT PRIMARY KEY,
        value JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    // Ingestion starts disabled; an operator flips the switch.
    r#"
    INSERT INTO system_config (key, value)
    VALUES ('ingestion_status', '{"enabled": false, "last_run_at": null}')
    ON CONFLICT (key) DO NOTHING
    "#,
];

pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(statements = STATEMENTS.len(), "Schema migration complete");
    Ok(())
}
