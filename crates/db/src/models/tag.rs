use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Tag {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTag {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateTag {
    pub name: String,
}

impl Tag {
    pub async fn find_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, team_id, name, created_at FROM tags WHERE team_id = $1 ORDER BY name ASC",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT id, team_id, name, created_at FROM tags WHERE id = $1 AND team_id = $2",
        )
        .bind(id)
        .bind(team_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, team_id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (id, team_id, name) VALUES ($1, $2, $3)
             RETURNING id, team_id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn rename(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = $3 WHERE id = $1 AND team_id = $2
             RETURNING id, team_id, name, created_at",
        )
        .bind(id)
        .bind(team_id)
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, team_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND team_id = $2")
            .bind(id)
            .bind(team_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_customer(
        pool: &PgPool,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.team_id, t.name, t.created_at
             FROM tags t JOIN customer_tags ct ON ct.tag_id = t.id
             WHERE ct.customer_id = $1
             ORDER BY t.name ASC",
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await
    }

    pub async fn assign_to_customer(
        pool: &PgPool,
        team_id: Uuid,
        customer_id: Uuid,
        tag_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO customer_tags (customer_id, tag_id, team_id) VALUES ($1, $2, $3)
             ON CONFLICT (customer_id, tag_id) DO NOTHING",
        )
        .bind(customer_id)
        .bind(tag_id)
        .bind(team_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn unassign_from_customer(
        pool: &PgPool,
        team_id: Uuid,
        customer_id: Uuid,
        tag_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM customer_tags WHERE customer_id = $1 AND tag_id = $2 AND team_id = $3",
        )
        .bind(customer_id)
        .bind(tag_id)
        .bind(team_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
