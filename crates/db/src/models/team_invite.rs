use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres};
use ts_rs::TS;
use uuid::Uuid;

use super::team::TeamRole;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TeamInvite {
    pub id: Uuid,
    pub team_id: Uuid,
    pub email: String,
    pub role: TeamRole,
    pub code: String,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTeamInvite {
    pub email: String,
    pub role: Option<TeamRole>,
}

const INVITE_COLUMNS: &str = "id, team_id, email, role, code, invited_by, created_at";

impl TeamInvite {
    pub async fn find_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamInvite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM team_invites WHERE team_id = $1 ORDER BY created_at DESC"
        ))
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamInvite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM team_invites WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    /// Re-inviting the same address refreshes the role and code.
    pub async fn create(
        pool: &PgPool,
        team_id: Uuid,
        invited_by: Uuid,
        email: &str,
        role: TeamRole,
        code: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TeamInvite>(&format!(
            "INSERT INTO team_invites (id, team_id, email, role, code, invited_by)
             VALUES ($1, $2, lower($3), $4, $5, $6)
             ON CONFLICT (team_id, email) DO UPDATE SET
                role = EXCLUDED.role,
                code = EXCLUDED.code,
                invited_by = EXCLUDED.invited_by,
                created_at = now()
             RETURNING {INVITE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(email.trim())
        .bind(role)
        .bind(code)
        .bind(invited_by)
        .fetch_one(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid, team_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM team_invites WHERE id = $1 AND team_id = $2")
            .bind(id)
            .bind(team_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
