use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;

use super::{Store, StoreError};
use crate::models::{
    Availability, CallSession, CandidateFilter, CandidateRecord, ConstraintSet, SessionFields, SessionStatus,
};

/// PostgreSQL-backed persistence for candidates, recruiter constraints and call sessions
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }

    fn candidate_from_row(row: &PgRow) -> Result<CandidateRecord, StoreError> {
        let availability: String = row.try_get("availability")?;
        let experience: i32 = row.try_get("experience")?;
        let attributes: Option<Json<Value>> = row.try_get("attributes")?;

        Ok(CandidateRecord {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            skills: row.try_get("skills")?,
            experience: u32::try_from(experience)
                .map_err(|_| StoreError::InvalidData(format!("negative experience {}", experience)))?,
            location: row.try_get("location")?,
            availability: Availability::parse(&availability)
                .ok_or_else(|| StoreError::InvalidData(format!("availability '{}'", availability)))?,
            is_online: row.try_get("is_online")?,
            attributes: match attributes {
                Some(Json(Value::Object(map))) => map,
                _ => Default::default(),
            },
        })
    }

    fn session_from_row(row: &PgRow) -> Result<CallSession, StoreError> {
        let status: String = row.try_get("status")?;
        let duration: Option<i64> = row.try_get("duration_secs")?;
        let decision: Option<Json<Value>> = row.try_get("decision")?;
        let summary: Option<Json<Value>> = row.try_get("summary")?;

        Ok(CallSession {
            id: row.try_get("id")?,
            candidate_id: row.try_get("candidate_id")?,
            recruiter_id: row.try_get("recruiter_id")?,
            room_id: row.try_get("room_id")?,
            status: SessionStatus::parse(&status)
                .ok_or_else(|| StoreError::InvalidData(format!("session status '{}'", status)))?,
            created_at: row.try_get("created_at")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            duration: duration.map(|d| d.max(0) as u64),
            decision: decision.map(|Json(v)| from_json(v, "decision")).transpose()?,
            summary: summary.map(|Json(v)| from_json(v, "summary")).transpose()?,
        })
    }
}

fn from_json<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::InvalidData(format!("{}: {}", what, e)))
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::InvalidData(format!("{}: {}", what, e)))
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_candidate_pool(&self, filter: &CandidateFilter) -> Result<Vec<CandidateRecord>, StoreError> {
        let query = r#"
            SELECT id, display_name, skills, experience, location, availability, is_online, attributes
            FROM candidates
            WHERE ($1::text IS NULL OR availability = $1)
              AND ($2::bool IS NULL OR is_online = $2)
            ORDER BY created_at, id
        "#;

        let rows = sqlx::query(query)
            .bind(filter.availability.map(|a| a.as_str()))
            .bind(filter.online)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Fetched candidate pool of {}", rows.len());

        rows.iter().map(Self::candidate_from_row).collect()
    }

    async fn get_constraint_set(&self, recruiter_id: &str) -> Result<Option<ConstraintSet>, StoreError> {
        let query = r#"
            SELECT constraints
            FROM recruiters
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(recruiter_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("recruiter {}", recruiter_id)))?;

        let constraints: Option<Json<Value>> = row.try_get("constraints")?;
        constraints
            .map(|Json(v)| from_json(v, "constraint set"))
            .transpose()
    }

    async fn create_session(&self, session: &CallSession) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO call_sessions (id, candidate_id, recruiter_id, room_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        sqlx::query(query)
            .bind(&session.id)
            .bind(&session.candidate_id)
            .bind(&session.recruiter_id)
            .bind(&session.room_id)
            .bind(session.status.as_str())
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Persisted session {}", session.id);

        Ok(())
    }

    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        fields: SessionFields,
    ) -> Result<(), StoreError> {
        let query = r#"
            UPDATE call_sessions SET
                status = $2,
                start_time = COALESCE($3, start_time),
                end_time = COALESCE($4, end_time),
                duration_secs = COALESCE($5, duration_secs),
                decision = COALESCE($6, decision),
                summary = COALESCE($7, summary)
            WHERE id = $1
        "#;

        let decision = fields
            .decision
            .as_ref()
            .map(|d| to_json(d, "decision"))
            .transpose()?;
        let summary = fields
            .summary
            .as_ref()
            .map(|s| to_json(s, "summary"))
            .transpose()?;

        let result = sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .bind(fields.start_time)
            .bind(fields.end_time)
            .bind(fields.duration.map(|d| d as i64))
            .bind(decision.map(Json))
            .bind(summary.map(Json))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("session {}", id)));
        }

        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<CallSession>, StoreError> {
        let query = r#"
            SELECT id, candidate_id, recruiter_id, room_id, status, created_at,
                   start_time, end_time, duration_secs, decision, summary
            FROM call_sessions
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::session_from_row).transpose()
    }

    async fn set_online(&self, identity: &str, online: bool) -> Result<(), StoreError> {
        let query = r#"
            UPDATE candidates
            SET is_online = $2, last_seen = NOW()
            WHERE id = $1
        "#;

        sqlx::query(query)
            .bind(identity)
            .bind(online)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
