use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use crate::Page;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Invoiced,
    Cancelled,
}

/// What the job's `price` is charged per.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "pricing_unit", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PricingUnit {
    #[default]
    Load,
    Tonne,
    CubicMetre,
    Hour,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Job {
    pub id: Uuid,
    pub team_id: Uuid,
    pub customer_id: Option<Uuid>,
    /// Customer as typed or imported; kept when the job is linked.
    pub customer_name: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub job_number: Option<String>,
    pub job_date: NaiveDate,
    pub material: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub truck: Option<String>,
    pub driver: Option<String>,
    pub loads: Option<f64>,
    pub volume_m3: Option<f64>,
    pub weight_tonnes: Option<f64>,
    pub hours: Option<f64>,
    pub price: f64,
    pub pricing_unit: PricingUnit,
    pub status: JobStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateJob {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub job_number: Option<String>,
    pub job_date: Option<NaiveDate>,
    pub material: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub truck: Option<String>,
    pub driver: Option<String>,
    pub loads: Option<f64>,
    pub volume_m3: Option<f64>,
    pub weight_tonnes: Option<f64>,
    pub hours: Option<f64>,
    pub price: Option<f64>,
    pub pricing_unit: Option<PricingUnit>,
    pub status: Option<JobStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateJob {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub job_number: Option<String>,
    pub job_date: Option<NaiveDate>,
    pub material: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub truck: Option<String>,
    pub driver: Option<String>,
    pub loads: Option<f64>,
    pub volume_m3: Option<f64>,
    pub weight_tonnes: Option<f64>,
    pub hours: Option<f64>,
    pub price: Option<f64>,
    pub pricing_unit: Option<PricingUnit>,
    pub notes: Option<String>,
}

impl UpdateJob {
    /// True when the update touches anything that feeds an invoice line.
    pub fn changes_billing(&self) -> bool {
        self.customer_id.is_some()
            || self.loads.is_some()
            || self.volume_m3.is_some()
            || self.weight_tonnes.is_some()
            || self.hours.is_some()
            || self.price.is_some()
            || self.pricing_unit.is_some()
            || self.material.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub customer_id: Option<Uuid>,
    /// Only jobs without a linked customer.
    pub unlinked: Option<bool>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

const JOB_COLUMNS: &str = "id, team_id, customer_id, customer_name, invoice_id, job_number, job_date, material, source, destination, truck, driver, loads, volume_m3, weight_tonnes, hours, price, pricing_unit, status, notes, created_at, updated_at";

impl Job {
    pub async fn find_by_id(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 AND team_id = $2"
        ))
        .bind(id)
        .bind(team_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_ids<'e, E>(
        executor: E,
        team_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE team_id = $1 AND id = ANY($2)
             ORDER BY job_date ASC, created_at ASC
             FOR UPDATE"
        ))
        .bind(team_id)
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_invoice(pool: &PgPool, invoice_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE invoice_id = $1 ORDER BY job_date ASC"
        ))
        .bind(invoice_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list(pool: &PgPool, team_id: Uuid, filter: &JobFilter) -> Result<Vec<Self>, sqlx::Error> {
        let page = Page::new(filter.page, filter.page_size);
        let search = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        sqlx::query_as::<_, Job>(&format!(
            r#"SELECT {JOB_COLUMNS} FROM jobs
               WHERE team_id = $1
                 AND ($2::job_status IS NULL OR status = $2)
                 AND ($3::uuid IS NULL OR customer_id = $3)
                 AND (NOT $4 OR customer_id IS NULL)
                 AND ($5::date IS NULL OR job_date >= $5)
                 AND ($6::date IS NULL OR job_date <= $6)
                 AND ($7::text IS NULL
                      OR customer_name ILIKE '%' || $7 || '%'
                      OR material ILIKE '%' || $7 || '%'
                      OR job_number ILIKE '%' || $7 || '%'
                      OR destination ILIKE '%' || $7 || '%')
               ORDER BY job_date DESC, created_at DESC
               LIMIT $8 OFFSET $9"#
        ))
        .bind(team_id)
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(filter.unlinked.unwrap_or(false))
        .bind(filter.from)
        .bind(filter.to)
        .bind(search)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
    }

    pub async fn create<'e, E>(executor: E, team_id: Uuid, data: &CreateJob) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job_date = data.job_date.unwrap_or_else(|| Utc::now().date_naive());
        sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs (id, team_id, customer_id, customer_name, job_number, job_date,
                               material, source, destination, truck, driver, loads, volume_m3,
                               weight_tonnes, hours, price, pricing_unit, status, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(data.customer_id)
        .bind(data.customer_name.as_deref().map(str::trim))
        .bind(&data.job_number)
        .bind(job_date)
        .bind(&data.material)
        .bind(&data.source)
        .bind(&data.destination)
        .bind(&data.truck)
        .bind(&data.driver)
        .bind(data.loads)
        .bind(data.volume_m3)
        .bind(data.weight_tonnes)
        .bind(data.hours)
        .bind(data.price.unwrap_or(0.0))
        .bind(data.pricing_unit.unwrap_or_default())
        .bind(data.status.unwrap_or_default())
        .bind(&data.notes)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
        data: &UpdateJob,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET
                customer_id = COALESCE($3, customer_id),
                customer_name = COALESCE($4, customer_name),
                job_number = COALESCE($5, job_number),
                job_date = COALESCE($6, job_date),
                material = COALESCE($7, material),
                source = COALESCE($8, source),
                destination = COALESCE($9, destination),
                truck = COALESCE($10, truck),
                driver = COALESCE($11, driver),
                loads = COALESCE($12, loads),
                volume_m3 = COALESCE($13, volume_m3),
                weight_tonnes = COALESCE($14, weight_tonnes),
                hours = COALESCE($15, hours),
                price = COALESCE($16, price),
                pricing_unit = COALESCE($17, pricing_unit),
                notes = COALESCE($18, notes),
                updated_at = now()
             WHERE id = $1 AND team_id = $2
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(team_id)
        .bind(data.customer_id)
        .bind(data.customer_name.as_deref().map(str::trim))
        .bind(&data.job_number)
        .bind(data.job_date)
        .bind(&data.material)
        .bind(&data.source)
        .bind(&data.destination)
        .bind(&data.truck)
        .bind(&data.driver)
        .bind(data.loads)
        .bind(data.volume_m3)
        .bind(data.weight_tonnes)
        .bind(data.hours)
        .bind(data.price)
        .bind(data.pricing_unit)
        .bind(&data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_status(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
        status: JobStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET status = $3, updated_at = now()
             WHERE id = $1 AND team_id = $2
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(team_id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, team_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND team_id = $2")
            .bind(id)
            .bind(team_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Unlinked jobs of the team that carry a typed customer name.
    pub async fn find_unlinked_named(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE team_id = $1 AND customer_id IS NULL
               AND customer_name IS NOT NULL AND btrim(customer_name) <> ''
             ORDER BY job_date DESC"
        ))
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Links the given jobs to `customer_id`, skipping any that were linked
    /// in the meantime. Returns the number of jobs linked.
    pub async fn link_to_customer<'e, E>(
        executor: E,
        team_id: Uuid,
        customer_id: Uuid,
        job_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE jobs SET customer_id = $2, updated_at = now()
             WHERE team_id = $1 AND id = ANY($3) AND customer_id IS NULL",
        )
        .bind(team_id)
        .bind(customer_id)
        .bind(job_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_invoiced<'e, E>(
        executor: E,
        invoice_id: Uuid,
        job_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE jobs SET invoice_id = $1, status = 'invoiced', updated_at = now()
             WHERE id = ANY($2)",
        )
        .bind(invoice_id)
        .bind(job_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returns the invoice's jobs to `completed` so they can be billed again.
    pub async fn release_from_invoice<'e, E>(executor: E, invoice_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE jobs SET invoice_id = NULL, status = 'completed', updated_at = now()
             WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Non-cancelled jobs dated within the range, for reporting.
    pub async fn find_in_range(
        pool: &PgPool,
        team_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE team_id = $1 AND status <> 'cancelled'
               AND ($2::date IS NULL OR job_date >= $2)
               AND ($3::date IS NULL OR job_date <= $3)
             ORDER BY job_date ASC"
        ))
        .bind(team_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }
}
