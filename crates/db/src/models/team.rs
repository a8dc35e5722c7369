use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TeamRole {
    Owner,
    #[default]
    Member,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub logo_url: Option<String>,
    pub base_currency: String,
    pub invoice_prefix: String,
    pub vat_rate: f64,
    pub tax_rate: f64,
    /// Waste levy charged per tonne hauled.
    pub levy_rate: f64,
    pub payment_terms_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A team as seen by one of its members.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TeamMembership {
    pub team_id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    pub role: TeamRole,
    pub is_current: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TeamMember {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTeam {
    pub name: String,
    pub email: Option<String>,
    pub base_currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTeam {
    pub name: Option<String>,
    pub email: Option<String>,
    pub logo_url: Option<String>,
    pub base_currency: Option<String>,
    pub invoice_prefix: Option<String>,
    pub vat_rate: Option<f64>,
    pub tax_rate: Option<f64>,
    pub levy_rate: Option<f64>,
    pub payment_terms_days: Option<i32>,
}

const TEAM_COLUMNS: &str = "id, name, email, logo_url, base_currency, invoice_prefix, vat_rate, tax_rate, levy_rate, payment_terms_days, created_at, updated_at";

impl Team {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create<'e, E>(executor: E, data: &CreateTeam, id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Team>(&format!(
            "INSERT INTO teams (id, name, email, base_currency)
             VALUES ($1, $2, $3, COALESCE($4, 'AUD'))
             RETURNING {TEAM_COLUMNS}"
        ))
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.email)
        .bind(&data.base_currency)
        .fetch_one(executor)
        .await
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: &UpdateTeam) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Team>(&format!(
            "UPDATE teams SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                logo_url = COALESCE($4, logo_url),
                base_currency = COALESCE($5, base_currency),
                invoice_prefix = COALESCE($6, invoice_prefix),
                vat_rate = COALESCE($7, vat_rate),
                tax_rate = COALESCE($8, tax_rate),
                levy_rate = COALESCE($9, levy_rate),
                payment_terms_days = COALESCE($10, payment_terms_days),
                updated_at = now()
             WHERE id = $1
             RETURNING {TEAM_COLUMNS}"
        ))
        .bind(id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(&data.email)
        .bind(&data.logo_url)
        .bind(&data.base_currency)
        .bind(&data.invoice_prefix)
        .bind(data.vat_rate)
        .bind(data.tax_rate)
        .bind(data.levy_rate)
        .bind(data.payment_terms_days)
        .fetch_one(pool)
        .await
    }

    /// Deletes the team; its customers, jobs, invoices and memberships cascade.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_memberships_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<TeamMembership>, sqlx::Error> {
        sqlx::query_as::<_, TeamMembership>(
            r#"SELECT t.id AS team_id, t.name, t.logo_url, ut.role,
                      (u.team_id IS NOT DISTINCT FROM t.id) AS is_current
               FROM users_on_team ut
               JOIN teams t ON t.id = ut.team_id
               JOIN users u ON u.id = ut.user_id
               WHERE ut.user_id = $1
               ORDER BY t.name ASC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

impl TeamMember {
    /// Role of `user_id` in `team_id`, or `None` when not a member.
    pub async fn find_role<'e, E>(
        executor: E,
        user_id: Uuid,
        team_id: Uuid,
    ) -> Result<Option<TeamRole>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, TeamRole>(
            "SELECT role FROM users_on_team WHERE user_id = $1 AND team_id = $2",
        )
        .bind(user_id)
        .bind(team_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"SELECT u.id AS user_id, u.email, u.full_name, u.avatar_url, ut.role,
                      ut.created_at AS joined_at
               FROM users_on_team ut
               JOIN users u ON u.id = ut.user_id
               WHERE ut.team_id = $1
               ORDER BY ut.created_at ASC"#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn add<'e, E>(
        executor: E,
        user_id: Uuid,
        team_id: Uuid,
        role: TeamRole,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "INSERT INTO users_on_team (id, user_id, team_id, role)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, team_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(team_id)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_role<'e, E>(
        executor: E,
        user_id: Uuid,
        team_id: Uuid,
        role: TeamRole,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result =
            sqlx::query("UPDATE users_on_team SET role = $3 WHERE user_id = $1 AND team_id = $2")
                .bind(user_id)
                .bind(team_id)
                .bind(role)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn remove<'e, E>(executor: E, user_id: Uuid, team_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM users_on_team WHERE user_id = $1 AND team_id = $2")
            .bind(user_id)
            .bind(team_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Owners of the team, row-locked until the transaction ends so
    /// concurrent demotions and removals see each other's changes.
    pub async fn lock_owners<'e, E>(executor: E, team_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM users_on_team
             WHERE team_id = $1 AND role = 'owner'
             FOR UPDATE",
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }
}
