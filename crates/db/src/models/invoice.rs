use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Type, types::Json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use crate::Page;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Unpaid,
    Paid,
    Overdue,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub amount: f64,
    /// Job this line was drafted from, if any.
    #[serde(default)]
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Invoice {
    pub id: Uuid,
    pub team_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    #[ts(as = "Vec<LineItem>")]
    pub line_items: Json<Vec<LineItem>>,
    pub vat_rate: f64,
    pub tax_rate: f64,
    pub subtotal: f64,
    pub vat: f64,
    pub tax: f64,
    pub levy: f64,
    pub discount: f64,
    pub amount: f64,
    pub note: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully computed invoice row, ready to insert or overwrite.
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub vat_rate: f64,
    pub tax_rate: f64,
    pub subtotal: f64,
    pub vat: f64,
    pub tax: f64,
    pub levy: f64,
    pub discount: f64,
    pub amount: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct InvoiceStatusSummary {
    pub status: InvoiceStatus,
    pub count: i64,
    pub total: f64,
}

/// Invoice money over a date range. Drafts and canceled invoices are left out.
#[derive(Debug, Clone, Default, FromRow)]
pub struct InvoiceRangeTotals {
    pub invoiced: f64,
    pub paid: f64,
    pub outstanding: f64,
    pub overdue_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MonthlyTotal {
    /// First day of the month.
    pub month: NaiveDate,
    pub count: i64,
    pub total: f64,
}

const INVOICE_COLUMNS: &str = "id, team_id, customer_id, customer_name, invoice_number, status, issue_date, due_date, currency, line_items, vat_rate, tax_rate, subtotal, vat, tax, levy, discount, amount, note, sent_at, paid_at, created_at, updated_at";

impl Invoice {
    pub async fn find_by_id<'e, E>(executor: E, team_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND team_id = $2"
        ))
        .bind(id)
        .bind(team_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        team_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let page = Page::new(filter.page, filter.page_size);
        let search = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        sqlx::query_as::<_, Invoice>(&format!(
            r#"SELECT {INVOICE_COLUMNS} FROM invoices
               WHERE team_id = $1
                 AND ($2::invoice_status IS NULL OR status = $2)
                 AND ($3::uuid IS NULL OR customer_id = $3)
                 AND ($4::date IS NULL OR issue_date >= $4)
                 AND ($5::date IS NULL OR issue_date <= $5)
                 AND ($6::text IS NULL
                      OR invoice_number ILIKE '%' || $6 || '%'
                      OR customer_name ILIKE '%' || $6 || '%')
               ORDER BY issue_date DESC, created_at DESC
               LIMIT $7 OFFSET $8"#
        ))
        .bind(team_id)
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(search)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
    }

    /// All invoice numbers of the team that start with `prefix`.
    pub async fn numbers_with_prefix<'e, E>(
        executor: E,
        team_id: Uuid,
        prefix: &str,
    ) -> Result<Vec<String>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, String>(
            "SELECT invoice_number FROM invoices
             WHERE team_id = $1 AND starts_with(invoice_number, $2)",
        )
        .bind(team_id)
        .bind(prefix)
        .fetch_all(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        team_id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(&format!(
            "INSERT INTO invoices (id, team_id, customer_id, customer_name, invoice_number, status,
                                   issue_date, due_date, currency, line_items, vat_rate, tax_rate,
                                   subtotal, vat, tax, levy, discount, amount, note)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(record.customer_id)
        .bind(&record.customer_name)
        .bind(&record.invoice_number)
        .bind(record.status)
        .bind(record.issue_date)
        .bind(record.due_date)
        .bind(&record.currency)
        .bind(Json(&record.line_items))
        .bind(record.vat_rate)
        .bind(record.tax_rate)
        .bind(record.subtotal)
        .bind(record.vat)
        .bind(record.tax)
        .bind(record.levy)
        .bind(record.discount)
        .bind(record.amount)
        .bind(&record.note)
        .fetch_one(executor)
        .await
    }

    /// Overwrites the editable content of an invoice. Status and payment
    /// timestamps are left alone.
    pub async fn overwrite<'e, E>(
        executor: E,
        team_id: Uuid,
        id: Uuid,
        record: &InvoiceRecord,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices SET
                customer_id = $3, customer_name = $4, invoice_number = $5, issue_date = $6,
                due_date = $7, currency = $8, line_items = $9, vat_rate = $10, tax_rate = $11,
                subtotal = $12, vat = $13, tax = $14, levy = $15, discount = $16, amount = $17,
                note = $18, updated_at = now()
             WHERE id = $1 AND team_id = $2
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(team_id)
        .bind(record.customer_id)
        .bind(&record.customer_name)
        .bind(&record.invoice_number)
        .bind(record.issue_date)
        .bind(record.due_date)
        .bind(&record.currency)
        .bind(Json(&record.line_items))
        .bind(record.vat_rate)
        .bind(record.tax_rate)
        .bind(record.subtotal)
        .bind(record.vat)
        .bind(record.tax)
        .bind(record.levy)
        .bind(record.discount)
        .bind(record.amount)
        .bind(&record.note)
        .fetch_one(executor)
        .await
    }

    /// Sets the status, stamping `paid_at` when paid and `sent_at` the first
    /// time an invoice leaves draft.
    pub async fn set_status<'e, E>(
        executor: E,
        team_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices SET
                status = $3,
                paid_at = CASE WHEN $3 = 'paid'::invoice_status THEN now() ELSE NULL END,
                sent_at = CASE
                    WHEN status = 'draft' AND $3 <> 'draft'::invoice_status THEN COALESCE(sent_at, now())
                    ELSE sent_at END,
                updated_at = now()
             WHERE id = $1 AND team_id = $2
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(team_id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, team_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND team_id = $2")
            .bind(id)
            .bind(team_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn summary_by_status(
        pool: &PgPool,
        team_id: Uuid,
    ) -> Result<Vec<InvoiceStatusSummary>, sqlx::Error> {
        sqlx::query_as::<_, InvoiceStatusSummary>(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(amount), 0)::float8 AS total
             FROM invoices WHERE team_id = $1
             GROUP BY status
             ORDER BY status",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Flags unpaid invoices whose due date is before `today` as overdue.
    pub async fn mark_overdue(pool: &PgPool, today: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET status = 'overdue', updated_at = now()
             WHERE status = 'unpaid' AND due_date < $1",
        )
        .bind(today)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn totals_in_range(
        pool: &PgPool,
        team_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<InvoiceRangeTotals, sqlx::Error> {
        sqlx::query_as::<_, InvoiceRangeTotals>(
            r#"SELECT
                   COALESCE(SUM(amount) FILTER (WHERE status IN ('unpaid', 'paid', 'overdue')), 0)::float8 AS invoiced,
                   COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0)::float8 AS paid,
                   COALESCE(SUM(amount) FILTER (WHERE status IN ('unpaid', 'overdue')), 0)::float8 AS outstanding,
                   COUNT(*) FILTER (WHERE status = 'overdue') AS overdue_count
               FROM invoices
               WHERE team_id = $1
                 AND ($2::date IS NULL OR issue_date >= $2)
                 AND ($3::date IS NULL OR issue_date <= $3)"#,
        )
        .bind(team_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }

    pub async fn monthly_totals(
        pool: &PgPool,
        team_id: Uuid,
        status: InvoiceStatus,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<MonthlyTotal>, sqlx::Error> {
        sqlx::query_as::<_, MonthlyTotal>(
            r#"SELECT date_trunc('month', issue_date)::date AS month,
                      COUNT(*) AS count,
                      COALESCE(SUM(amount), 0)::float8 AS total
               FROM invoices
               WHERE team_id = $1 AND status = $2
                 AND ($3::date IS NULL OR issue_date >= $3)
                 AND ($4::date IS NULL OR issue_date <= $4)
               GROUP BY 1
               ORDER BY 1 ASC"#,
        )
        .bind(team_id)
        .bind(status)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }
}
