use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub locale: String,
    /// Team the dashboard is currently scoped to.
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub locale: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, full_name, avatar_url, locale, team_id, created_at, updated_at";

impl User {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Creates the profile row for an authenticated user on first request and
    /// keeps the stored email in sync with the token.
    pub async fn ensure(pool: &PgPool, id: Uuid, email: Option<&str>) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: &UpdateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                full_name = COALESCE($2, full_name),
                avatar_url = COALESCE($3, avatar_url),
                locale = COALESCE($4, locale),
                updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.full_name)
        .bind(&data.avatar_url)
        .bind(&data.locale)
        .fetch_one(pool)
        .await
    }

    pub async fn set_current_team<'e, E>(
        executor: E,
        id: Uuid,
        team_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET team_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(team_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Moves users whose current team is `team_id` onto another team they
    /// belong to, or clears it when they have none. `only_user` limits the
    /// move to one user.
    pub async fn reassign_current_team<'e, E>(
        executor: E,
        team_id: Uuid,
        only_user: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"UPDATE users u SET team_id = (
                   SELECT ut.team_id FROM users_on_team ut
                   WHERE ut.user_id = u.id AND ut.team_id <> $1
                   ORDER BY ut.created_at ASC
                   LIMIT 1
               ), updated_at = now()
               WHERE u.team_id = $1 AND ($2::uuid IS NULL OR u.id = $2)"#,
        )
        .bind(team_id)
        .bind(only_user)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
