use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use sitroom_common::{
    CandidateReport, EvidenceReport, Incident, IncidentStatus, IngestionStatus, Mission,
    MissionStatus,
};

/// Result of the atomic incident upsert. `inserted` comes straight from
/// Postgres (`xmax = 0` on the returned row), so insert-vs-update detection
/// does not depend on comparing `created_at` to `updated_at`.
#[derive(Debug, Clone)]
pub struct UpsertedIncident {
    pub incident: Incident,
    pub inserted: bool,
}

/// Postgres-backed storage for incidents, evidence, missions, and the
/// ingestion switch. Safe to share across sequential calls within a cycle;
/// no incident state is cached in-process between cycles.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- Incidents ---

    /// Insert the candidate, or on `dedup_key` conflict refresh `updated_at`
    /// on the existing row. One indivisible statement — there is no
    /// check-then-act window for concurrent callers to slip through.
    pub async fn upsert_incident(&self, candidate: &CandidateReport) -> Result<UpsertedIncident> {
        let tags: Vec<String> = candidate.tags.iter().cloned().collect();

        let row = sqlx::query(
            r#"
            INSERT INTO incidents
                (title, description, severity, category, status, lat, lon,
                 confidence, dedup_key, tags)
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8, $9)
            ON CONFLICT (dedup_key) DO UPDATE SET updated_at = now()
            RETURNING id, title, description, severity, category, status,
                      lat, lon, confidence, dedup_key, tags,
                      created_at, updated_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(&candidate.title)
        .bind(&candidate.description)
        .bind(candidate.severity)
        .bind(&candidate.category)
        .bind(candidate.lat)
        .bind(candidate.lon)
        .bind(candidate.confidence.unwrap_or(1.0))
        .bind(&candidate.dedup_key)
        .bind(&tags)
        .fetch_one(&self.pool)
        .await?;

        let inserted: bool = row.get("inserted");
        Ok(UpsertedIncident {
            incident: row_to_incident(&row),
            inserted,
        })
    }

    /// Insert evidence rows one at a time, counting successes. Individual
    /// failures are logged and skipped; the incident itself is never rolled
    /// back over lost evidence.
    pub async fn insert_evidence(
        &self,
        incident_id: Uuid,
        reports: &[EvidenceReport],
    ) -> Result<u32> {
        let mut written = 0u32;
        for report in reports {
            let result = sqlx::query(
                r#"
                INSERT INTO evidence_reports (incident_id, source, content, metadata)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(incident_id)
            .bind(&report.source)
            .bind(&report.content)
            .bind(&report.metadata)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => written += 1,
                Err(e) => warn!(
                    incident_id = %incident_id,
                    source = report.source.as_str(),
                    error = %e,
                    "Failed to insert evidence report"
                ),
            }
        }
        Ok(written)
    }

    pub async fn evidence_count(&self, incident_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM evidence_reports WHERE incident_id = $1")
                .bind(incident_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn read_tags(&self, incident_id: Uuid) -> Result<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar("SELECT tags FROM incidents WHERE id = $1")
            .bind(incident_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn write_tags(&self, incident_id: Uuid, tags: &[String]) -> Result<()> {
        sqlx::query("UPDATE incidents SET tags = $2 WHERE id = $1")
            .bind(incident_id)
            .bind(tags)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Missions ---

    pub async fn active_missions(&self) -> Result<Vec<Mission>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, goal, keywords, status, created_at, updated_at
            FROM missions
            WHERE status = 'active'
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mission).collect())
    }

    pub async fn update_mission_status(&self, id: Uuid, status: MissionStatus) -> Result<()> {
        sqlx::query("UPDATE missions SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Ingestion switch ---

    /// Read the singleton switch row. A missing row reads as disabled.
    pub async fn ingestion_status(&self) -> Result<IngestionStatus> {
        let value: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT value FROM system_config WHERE key = 'ingestion_status'")
                .fetch_optional(&self.pool)
                .await?;

        Ok(value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default())
    }

    /// Atomically claim the next run by advancing `last_run_at`, but only if
    /// the cooldown has elapsed. Returns false when another cycle already
    /// claimed the slot — the conditional UPDATE closes the read-then-write
    /// race a plain timestamp check would leave open.
    pub async fn try_claim_run(&self, cooldown_secs: u64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE system_config
            SET value = jsonb_set(value, '{last_run_at}', to_jsonb(now()), true),
                updated_at = now()
            WHERE key = 'ingestion_status'
              AND (
                value->>'last_run_at' IS NULL
                OR (value->>'last_run_at')::timestamptz < now() - make_interval(secs => $1)
              )
            "#,
        )
        .bind(cooldown_secs as f64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Unconditionally stamp `last_run_at`. Used by forced runs, which bypass
    /// the cooldown but still record that a cycle happened.
    pub async fn touch_last_run(&self) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE system_config
            SET value = jsonb_set(value, '{last_run_at}', to_jsonb(now()), true),
                updated_at = now()
            WHERE key = 'ingestion_status'
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Operator kill switch.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE system_config
            SET value = jsonb_set(value, '{enabled}', to_jsonb($1::boolean), true),
                updated_at = now()
            WHERE key = 'ingestion_status'
            "#,
        )
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn row_to_incident(row: &PgRow) -> Incident {
    let status: String = row.get("status");
    Incident {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        severity: row.get("severity"),
        category: row.get("category"),
        status: IncidentStatus::from_str_loose(&status),
        lat: row.get("lat"),
        lon: row.get("lon"),
        confidence: row.get("confidence"),
        dedup_key: row.get("dedup_key"),
        tags: row.get("tags"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_mission(row: &PgRow) -> Mission {
    let status: String = row.get("status");
    Mission {
        id: row.get("id"),
        name: row.get("name"),
        goal: row.get("goal"),
        keywords: row.get("keywords"),
        status: MissionStatus::from_str_loose(&status),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
