use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::tag::Tag;
use crate::Page;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Customer {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub abn: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CustomerWithStats {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub customer: Customer,
    pub job_count: i64,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

impl std::ops::Deref for CustomerWithStats {
    type Target = Customer;
    fn deref(&self) -> &Self::Target {
        &self.customer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub abn: Option<String>,
    pub note: Option<String>,
    pub tag_ids: Option<Vec<Uuid>>,
    /// Link existing unlinked jobs whose customer name matches. Defaults to true.
    pub link_jobs: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub abn: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CustomerFilter {
    pub q: Option<String>,
    pub tag_id: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(FromRow)]
struct CustomerTagRow {
    customer_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

const CUSTOMER_COLUMNS: &str = "id, team_id, name, email, phone, contact, address_line_1, address_line_2, city, state, postcode, country, abn, note, created_at, updated_at";

impl Customer {
    pub async fn find_by_id(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 AND team_id = $2"
        ))
        .bind(id)
        .bind(team_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        team_id: Uuid,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerWithStats>, sqlx::Error> {
        let page = Page::new(filter.page, filter.page_size);
        let search = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let mut customers = sqlx::query_as::<_, CustomerWithStats>(
            r#"SELECT c.id, c.team_id, c.name, c.email, c.phone, c.contact, c.address_line_1,
                      c.address_line_2, c.city, c.state, c.postcode, c.country, c.abn, c.note,
                      c.created_at, c.updated_at,
                      (SELECT COUNT(*) FROM jobs j WHERE j.customer_id = c.id) AS job_count
               FROM customers c
               WHERE c.team_id = $1
                 AND ($2::text IS NULL OR c.name ILIKE '%' || $2 || '%' OR c.email ILIKE '%' || $2 || '%')
                 AND ($3::uuid IS NULL OR EXISTS (
                        SELECT 1 FROM customer_tags ct WHERE ct.customer_id = c.id AND ct.tag_id = $3))
               ORDER BY lower(c.name) ASC
               LIMIT $4 OFFSET $5"#,
        )
        .bind(team_id)
        .bind(search)
        .bind(filter.tag_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

        let ids: Vec<Uuid> = customers.iter().map(|c| c.customer.id).collect();
        let mut tags = Self::tags_for(pool, &ids).await?;
        for customer in &mut customers {
            customer.tags = tags.remove(&customer.customer.id).unwrap_or_default();
        }
        Ok(customers)
    }

    async fn tags_for(
        pool: &PgPool,
        customer_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, sqlx::Error> {
        if customer_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, CustomerTagRow>(
            "SELECT ct.customer_id, t.id, t.team_id, t.name, t.created_at
             FROM customer_tags ct JOIN tags t ON t.id = ct.tag_id
             WHERE ct.customer_id = ANY($1)
             ORDER BY t.name ASC",
        )
        .bind(customer_ids)
        .fetch_all(pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            grouped.entry(row.customer_id).or_default().push(row.tag);
        }
        Ok(grouped)
    }

    pub async fn with_stats(
        pool: &PgPool,
        customer: Customer,
    ) -> Result<CustomerWithStats, sqlx::Error> {
        let job_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE customer_id = $1")
                .bind(customer.id)
                .fetch_one(pool)
                .await?;
        let tags = Tag::find_by_customer(pool, customer.id).await?;
        Ok(CustomerWithStats {
            customer,
            job_count,
            tags,
        })
    }

    pub async fn create(
        pool: &PgPool,
        team_id: Uuid,
        data: &CreateCustomer,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (id, team_id, name, email, phone, contact, address_line_1,
                                    address_line_2, city, state, postcode, country, abn, note)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(data.name.trim())
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.contact)
        .bind(&data.address_line_1)
        .bind(&data.address_line_2)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.postcode)
        .bind(&data.country)
        .bind(&data.abn)
        .bind(&data.note)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
        data: &UpdateCustomer,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                contact = COALESCE($6, contact),
                address_line_1 = COALESCE($7, address_line_1),
                address_line_2 = COALESCE($8, address_line_2),
                city = COALESCE($9, city),
                state = COALESCE($10, state),
                postcode = COALESCE($11, postcode),
                country = COALESCE($12, country),
                abn = COALESCE($13, abn),
                note = COALESCE($14, note),
                updated_at = now()
             WHERE id = $1 AND team_id = $2
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id)
        .bind(team_id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.contact)
        .bind(&data.address_line_1)
        .bind(&data.address_line_2)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.postcode)
        .bind(&data.country)
        .bind(&data.abn)
        .bind(&data.note)
        .fetch_optional(pool)
        .await
    }

    pub async fn names_for_team(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<(Uuid, String)>, sqlx::Error> {
        sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM customers WHERE team_id = $1")
            .bind(team_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_invoices(pool: &PgPool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoices WHERE customer_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, team_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND team_id = $2")
            .bind(id)
            .bind(team_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
