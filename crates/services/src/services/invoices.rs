//! Invoice drafting, editing and status lifecycle.

use std::collections::HashSet;

use chrono::{Days, NaiveDate, Utc};
use db::{
    DBService, is_unique_violation,
    models::{
        customer::Customer,
        invoice::{Invoice, InvoiceRecord, InvoiceStatus, InvoiceStatusSummary, LineItem},
        job::{Job, JobStatus},
        team::Team,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgConnection};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    calculations::{InvoiceTotals, JobFigures, normalize_line_items, unit_label},
    invoice_number,
};

/// Attempts at claiming a generated number before giving up.
const MAX_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invoice not found")]
    NotFound,
    #[error("team not found")]
    TeamNotFound,
    #[error("customer not found")]
    CustomerNotFound,
    #[error("jobs not found: {0:?}")]
    JobsNotFound(Vec<Uuid>),
    #[error("job {job_id} cannot be invoiced: {reason}")]
    JobNotBillable { job_id: Uuid, reason: &'static str },
    #[error("invoice number {0} is already in use")]
    NumberTaken(String),
    #[error("a {0} invoice cannot be edited")]
    NotEditable(InvoiceStatus),
    #[error("a {0} invoice cannot be deleted")]
    NotDeletable(InvoiceStatus),
    #[error("cannot move invoice from {from} to {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateInvoice {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    /// Generated from the team prefix when absent.
    pub invoice_number: Option<String>,
    /// `draft` (default) or `unpaid`.
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub line_items: Vec<LineItem>,
    pub vat_rate: Option<f64>,
    pub tax_rate: Option<f64>,
    pub levy: Option<f64>,
    pub discount: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateInvoiceFromJobs {
    pub customer_id: Uuid,
    pub job_ids: Vec<Uuid>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub vat_rate: Option<f64>,
    pub tax_rate: Option<f64>,
    pub discount: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateInvoice {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub line_items: Option<Vec<LineItem>>,
    pub vat_rate: Option<f64>,
    pub tax_rate: Option<f64>,
    pub levy: Option<f64>,
    pub discount: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateInvoiceStatus {
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub invoice: Invoice,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct NextInvoiceNumber {
    pub invoice_number: String,
}

/// Allowed moves between invoice statuses.
pub fn can_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
    use InvoiceStatus::*;
    matches!(
        (from, to),
        (Draft, Unpaid)
            | (Unpaid, Paid)
            | (Overdue, Paid)
            | (Paid, Unpaid)
            | (Draft, Canceled)
            | (Unpaid, Canceled)
            | (Overdue, Canceled)
    )
}

pub fn is_editable(status: InvoiceStatus) -> bool {
    matches!(status, InvoiceStatus::Draft | InvoiceStatus::Unpaid)
}

pub fn is_deletable(status: InvoiceStatus) -> bool {
    matches!(status, InvoiceStatus::Draft | InvoiceStatus::Canceled)
}

pub fn default_due_date(issue_date: NaiveDate, payment_terms_days: i32) -> NaiveDate {
    let days = u64::try_from(payment_terms_days).unwrap_or(0);
    issue_date
        .checked_add_days(Days::new(days))
        .unwrap_or(issue_date)
}

/// "Clean Fill: Quarry Rd to Lot 12 (#J-88)"
pub fn job_description(job: &Job) -> String {
    let material = job
        .material
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("Haulage");
    let mut description = match (job.source.as_deref(), job.destination.as_deref()) {
        (Some(from), Some(to)) => format!("{material}: {from} to {to}"),
        (None, Some(to)) => format!("{material} to {to}"),
        (Some(from), None) => format!("{material} from {from}"),
        (None, None) => material.to_string(),
    };
    if let Some(number) = job.job_number.as_deref().filter(|n| !n.trim().is_empty()) {
        description.push_str(&format!(" (#{})", number.trim()));
    }
    description
}

pub fn job_line_item(job: &Job, figures: &JobFigures) -> LineItem {
    LineItem {
        description: job_description(job),
        quantity: figures.quantity,
        unit: Some(unit_label(job.pricing_unit).to_string()),
        price: job.price,
        amount: figures.amount,
        job_id: Some(job.id),
    }
}

/// Every requested job must exist, belong to the customer and be completed
/// but not yet invoiced.
pub fn check_billable(customer_id: Uuid, requested: &[Uuid], jobs: &[Job]) -> Result<(), InvoiceError> {
    let found: HashSet<Uuid> = jobs.iter().map(|job| job.id).collect();
    let missing: Vec<Uuid> = requested
        .iter()
        .filter(|id| !found.contains(id))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(InvoiceError::JobsNotFound(missing));
    }

    for job in jobs {
        let reason = if job.customer_id != Some(customer_id) {
            Some("belongs to a different customer")
        } else if job.invoice_id.is_some() || job.status == JobStatus::Invoiced {
            Some("already invoiced")
        } else if job.status != JobStatus::Completed {
            Some("not completed")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(InvoiceError::JobNotBillable {
                job_id: job.id,
                reason,
            });
        }
    }
    Ok(())
}

fn validate_line_items(items: &[LineItem]) -> Result<(), InvoiceError> {
    for (idx, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(InvoiceError::Validation(format!(
                "line {} needs a description",
                idx + 1
            )));
        }
        if !item.quantity.is_finite() || !item.price.is_finite() {
            return Err(InvoiceError::Validation(format!(
                "line {} has an invalid quantity or price",
                idx + 1
            )));
        }
    }
    Ok(())
}

fn validate_amounts(values: [(&str, Option<f64>); 4]) -> Result<(), InvoiceError> {
    for (name, value) in values {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(InvoiceError::Validation(format!("{name} must be zero or more")));
            }
        }
    }
    Ok(())
}

fn validate_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), InvoiceError> {
    if due_date < issue_date {
        return Err(InvoiceError::Validation(
            "due date cannot be before the issue date".to_string(),
        ));
    }
    Ok(())
}

fn explicit_number(number: Option<&str>) -> Option<String> {
    number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Inserts the invoice, generating its number when none was given. A
/// generated number that loses a race is regenerated; an explicit one is
/// reported as taken.
async fn insert_numbered(
    conn: &mut PgConnection,
    team: &Team,
    record: &mut InvoiceRecord,
    explicit: bool,
) -> Result<Invoice, InvoiceError> {
    for attempt in 1..=MAX_NUMBER_ATTEMPTS {
        if !explicit {
            record.invoice_number =
                invoice_number::next_for_team(&mut *conn, team.id, &team.invoice_prefix).await?;
        }

        let mut savepoint = conn.begin().await?;
        match Invoice::create(&mut *savepoint, team.id, record).await {
            Ok(invoice) => {
                savepoint.commit().await?;
                return Ok(invoice);
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await?;
                if let Some(err) = number_conflict(explicit, attempt, &record.invoice_number) {
                    return Err(err);
                }
                warn!(
                    team_id = %team.id,
                    invoice_number = %record.invoice_number,
                    attempt,
                    "Invoice number taken concurrently, retrying"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(InvoiceError::NumberTaken(record.invoice_number.clone()))
}

/// Decides what a unique violation on `number` means. A caller-chosen number
/// is rejected at once; a generated one is retried until the attempts run
/// out.
fn number_conflict(explicit: bool, attempt: usize, number: &str) -> Option<InvoiceError> {
    (explicit || attempt >= MAX_NUMBER_ATTEMPTS)
        .then(|| InvoiceError::NumberTaken(number.to_string()))
}

pub struct InvoiceService;

impl InvoiceService {
    async fn team(db: &DBService, team_id: Uuid) -> Result<Team, InvoiceError> {
        Team::find_by_id(&db.pool, team_id)
            .await?
            .ok_or(InvoiceError::TeamNotFound)
    }

    pub async fn get(db: &DBService, team_id: Uuid, id: Uuid) -> Result<InvoiceDetail, InvoiceError> {
        let invoice = Invoice::find_by_id(&db.pool, team_id, id)
            .await?
            .ok_or(InvoiceError::NotFound)?;
        let jobs = Job::find_by_invoice(&db.pool, invoice.id).await?;
        Ok(InvoiceDetail { invoice, jobs })
    }

    pub async fn summary(db: &DBService, team_id: Uuid) -> Result<Vec<InvoiceStatusSummary>, InvoiceError> {
        Ok(Invoice::summary_by_status(&db.pool, team_id).await?)
    }

    pub async fn next_number(db: &DBService, team_id: Uuid) -> Result<NextInvoiceNumber, InvoiceError> {
        let team = Self::team(db, team_id).await?;
        let invoice_number =
            invoice_number::next_for_team(&db.pool, team.id, &team.invoice_prefix).await?;
        Ok(NextInvoiceNumber { invoice_number })
    }

    pub async fn create(
        db: &DBService,
        team_id: Uuid,
        data: CreateInvoice,
    ) -> Result<Invoice, InvoiceError> {
        let team = Self::team(db, team_id).await?;
        let status = data.status.unwrap_or_default();
        if !matches!(status, InvoiceStatus::Draft | InvoiceStatus::Unpaid) {
            return Err(InvoiceError::Validation(
                "new invoices start as draft or unpaid".to_string(),
            ));
        }
        validate_line_items(&data.line_items)?;
        validate_amounts([
            ("vat_rate", data.vat_rate),
            ("tax_rate", data.tax_rate),
            ("levy", data.levy),
            ("discount", data.discount),
        ])?;

        let customer_name = match data.customer_id {
            Some(customer_id) => {
                let customer = Customer::find_by_id(&db.pool, team_id, customer_id)
                    .await?
                    .ok_or(InvoiceError::CustomerNotFound)?;
                data.customer_name.or(Some(customer.name))
            }
            None => data.customer_name,
        };

        let issue_date = data.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = data
            .due_date
            .unwrap_or_else(|| default_due_date(issue_date, team.payment_terms_days));
        validate_dates(issue_date, due_date)?;

        let line_items = normalize_line_items(data.line_items);
        let vat_rate = data.vat_rate.unwrap_or(team.vat_rate);
        let tax_rate = data.tax_rate.unwrap_or(team.tax_rate);
        let totals = InvoiceTotals::calculate(
            &line_items,
            vat_rate,
            tax_rate,
            data.discount.unwrap_or(0.0),
            data.levy.unwrap_or(0.0),
        );

        let number = explicit_number(data.invoice_number.as_deref());
        let explicit = number.is_some();
        let mut record = InvoiceRecord {
            customer_id: data.customer_id,
            customer_name,
            invoice_number: number.unwrap_or_default(),
            status,
            issue_date,
            due_date,
            currency: team.base_currency.clone(),
            line_items,
            vat_rate,
            tax_rate,
            subtotal: totals.subtotal,
            vat: totals.vat,
            tax: totals.tax,
            levy: totals.levy,
            discount: totals.discount,
            amount: totals.total,
            note: data.note,
        };

        let mut tx = db.begin().await?;
        let invoice = insert_numbered(&mut *tx, &team, &mut record, explicit).await?;
        tx.commit().await?;

        info!(
            team_id = %team_id,
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );
        Ok(invoice)
    }

    /// Drafts one invoice line per job and marks the jobs invoiced in the
    /// same transaction.
    pub async fn create_from_jobs(
        db: &DBService,
        team_id: Uuid,
        data: CreateInvoiceFromJobs,
    ) -> Result<InvoiceDetail, InvoiceError> {
        let team = Self::team(db, team_id).await?;
        let customer = Customer::find_by_id(&db.pool, team_id, data.customer_id)
            .await?
            .ok_or(InvoiceError::CustomerNotFound)?;

        let mut job_ids = data.job_ids;
        let mut seen = HashSet::new();
        job_ids.retain(|id| seen.insert(*id));
        if job_ids.is_empty() {
            return Err(InvoiceError::Validation("select at least one job".to_string()));
        }
        validate_amounts([
            ("vat_rate", data.vat_rate),
            ("tax_rate", data.tax_rate),
            ("levy", None),
            ("discount", data.discount),
        ])?;

        let issue_date = data.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = data
            .due_date
            .unwrap_or_else(|| default_due_date(issue_date, team.payment_terms_days));
        validate_dates(issue_date, due_date)?;

        let mut tx = db.begin().await?;
        let jobs = Job::find_by_ids(&mut *tx, team_id, &job_ids).await?;
        check_billable(customer.id, &job_ids, &jobs)?;

        let mut line_items = Vec::with_capacity(jobs.len());
        let mut levy = 0.0;
        for job in &jobs {
            let figures = JobFigures::for_job(job, team.levy_rate);
            levy += figures.levy;
            line_items.push(job_line_item(job, &figures));
        }

        let vat_rate = data.vat_rate.unwrap_or(team.vat_rate);
        let tax_rate = data.tax_rate.unwrap_or(team.tax_rate);
        let totals = InvoiceTotals::calculate(
            &line_items,
            vat_rate,
            tax_rate,
            data.discount.unwrap_or(0.0),
            levy,
        );

        let number = explicit_number(data.invoice_number.as_deref());
        let explicit = number.is_some();
        let mut record = InvoiceRecord {
            customer_id: Some(customer.id),
            customer_name: Some(customer.name.clone()),
            invoice_number: number.unwrap_or_default(),
            status: InvoiceStatus::Draft,
            issue_date,
            due_date,
            currency: team.base_currency.clone(),
            line_items,
            vat_rate,
            tax_rate,
            subtotal: totals.subtotal,
            vat: totals.vat,
            tax: totals.tax,
            levy: totals.levy,
            discount: totals.discount,
            amount: totals.total,
            note: data.note,
        };

        let invoice = insert_numbered(&mut *tx, &team, &mut record, explicit).await?;
        Job::mark_invoiced(&mut *tx, invoice.id, &job_ids).await?;
        tx.commit().await?;

        info!(
            team_id = %team_id,
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            jobs = job_ids.len(),
            "Invoice drafted from jobs"
        );

        let jobs = Job::find_by_invoice(&db.pool, invoice.id).await?;
        Ok(InvoiceDetail { invoice, jobs })
    }

    pub async fn update(
        db: &DBService,
        team_id: Uuid,
        id: Uuid,
        data: UpdateInvoice,
    ) -> Result<Invoice, InvoiceError> {
        let existing = Invoice::find_by_id(&db.pool, team_id, id)
            .await?
            .ok_or(InvoiceError::NotFound)?;
        if !is_editable(existing.status) {
            return Err(InvoiceError::NotEditable(existing.status));
        }
        if let Some(items) = &data.line_items {
            validate_line_items(items)?;
        }
        validate_amounts([
            ("vat_rate", data.vat_rate),
            ("tax_rate", data.tax_rate),
            ("levy", data.levy),
            ("discount", data.discount),
        ])?;

        let customer_name = match data.customer_id {
            Some(customer_id) if Some(customer_id) != existing.customer_id => {
                let customer = Customer::find_by_id(&db.pool, team_id, customer_id)
                    .await?
                    .ok_or(InvoiceError::CustomerNotFound)?;
                data.customer_name.or(Some(customer.name))
            }
            _ => data.customer_name.or(existing.customer_name),
        };

        let issue_date = data.issue_date.unwrap_or(existing.issue_date);
        let due_date = data.due_date.unwrap_or(existing.due_date);
        validate_dates(issue_date, due_date)?;

        let line_items = match data.line_items {
            Some(items) => normalize_line_items(items),
            None => existing.line_items.0,
        };
        let vat_rate = data.vat_rate.unwrap_or(existing.vat_rate);
        let tax_rate = data.tax_rate.unwrap_or(existing.tax_rate);
        let totals = InvoiceTotals::calculate(
            &line_items,
            vat_rate,
            tax_rate,
            data.discount.unwrap_or(existing.discount),
            data.levy.unwrap_or(existing.levy),
        );

        let record = InvoiceRecord {
            customer_id: data.customer_id.or(existing.customer_id),
            customer_name,
            invoice_number: explicit_number(data.invoice_number.as_deref())
                .unwrap_or(existing.invoice_number),
            status: existing.status,
            issue_date,
            due_date,
            currency: existing.currency,
            line_items,
            vat_rate,
            tax_rate,
            subtotal: totals.subtotal,
            vat: totals.vat,
            tax: totals.tax,
            levy: totals.levy,
            discount: totals.discount,
            amount: totals.total,
            note: data.note.or(existing.note),
        };

        match Invoice::overwrite(&db.pool, team_id, id, &record).await {
            Ok(invoice) => Ok(invoice),
            Err(e) if is_unique_violation(&e) => Err(InvoiceError::NumberTaken(record.invoice_number)),
            Err(e) => Err(e.into()),
        }
    }

    /// Cancelling returns the invoice's jobs to `completed`.
    pub async fn set_status(
        db: &DBService,
        team_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice, InvoiceError> {
        let mut tx = db.begin().await?;
        let existing = Invoice::find_by_id(&mut *tx, team_id, id)
            .await?
            .ok_or(InvoiceError::NotFound)?;
        if !can_transition(existing.status, status) {
            return Err(InvoiceError::InvalidTransition {
                from: existing.status,
                to: status,
            });
        }

        let invoice = Invoice::set_status(&mut *tx, team_id, id, status).await?;
        if status == InvoiceStatus::Canceled {
            let released = Job::release_from_invoice(&mut *tx, id).await?;
            info!(invoice_id = %id, released, "Released jobs from canceled invoice");
        }
        tx.commit().await?;

        info!(
            team_id = %team_id,
            invoice_id = %id,
            from = %existing.status,
            to = %status,
            "Invoice status changed"
        );
        Ok(invoice)
    }

    pub async fn delete(db: &DBService, team_id: Uuid, id: Uuid) -> Result<(), InvoiceError> {
        let mut tx = db.begin().await?;
        let existing = Invoice::find_by_id(&mut *tx, team_id, id)
            .await?
            .ok_or(InvoiceError::NotFound)?;
        if !is_deletable(existing.status) {
            return Err(InvoiceError::NotDeletable(existing.status));
        }

        Job::release_from_invoice(&mut *tx, id).await?;
        Invoice::delete(&mut *tx, team_id, id).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::job::PricingUnit;

    use super::*;

    #[test]
    fn explicit_number_conflicts_are_not_retried() {
        let err = number_conflict(true, 1, "INV-0007").unwrap();
        assert!(matches!(err, InvoiceError::NumberTaken(n) if n == "INV-0007"));
    }

    #[test]
    fn generated_numbers_retry_until_attempts_run_out() {
        assert!(number_conflict(false, 1, "INV-0008").is_none());
        assert!(number_conflict(false, MAX_NUMBER_ATTEMPTS - 1, "INV-0009").is_none());
        let err = number_conflict(false, MAX_NUMBER_ATTEMPTS, "INV-0010").unwrap();
        assert!(matches!(err, InvoiceError::NumberTaken(n) if n == "INV-0010"));
        assert_eq!(MAX_NUMBER_ATTEMPTS, 3);
    }

    fn job(customer_id: Option<Uuid>, status: JobStatus) -> Job {
        Job {
            id: Uuid::new_v4(),
            team_id: Uuid::nil(),
            customer_id,
            customer_name: Some("Acme Civil".to_string()),
            invoice_id: None,
            job_number: Some("J-88".to_string()),
            job_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            material: Some("Clean Fill".to_string()),
            source: Some("Quarry Rd".to_string()),
            destination: Some("Lot 12".to_string()),
            truck: None,
            driver: None,
            loads: Some(4.0),
            volume_m3: None,
            weight_tonnes: Some(30.0),
            hours: None,
            price: 55.0,
            pricing_unit: PricingUnit::Tonne,
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_transitions() {
        use InvoiceStatus::*;
        assert!(can_transition(Draft, Unpaid));
        assert!(can_transition(Unpaid, Paid));
        assert!(can_transition(Overdue, Paid));
        assert!(can_transition(Paid, Unpaid));
        assert!(can_transition(Overdue, Canceled));
        assert!(!can_transition(Paid, Canceled));
        assert!(!can_transition(Canceled, Unpaid));
        assert!(!can_transition(Draft, Paid));
        assert!(!can_transition(Unpaid, Unpaid));
    }

    #[test]
    fn edit_and_delete_rules() {
        assert!(is_editable(InvoiceStatus::Draft));
        assert!(is_editable(InvoiceStatus::Unpaid));
        assert!(!is_editable(InvoiceStatus::Paid));
        assert!(is_deletable(InvoiceStatus::Canceled));
        assert!(!is_deletable(InvoiceStatus::Overdue));
    }

    #[test]
    fn due_date_adds_payment_terms() {
        let issue = NaiveDate::from_ymd_opt(2025, 1, 25).unwrap();
        assert_eq!(
            default_due_date(issue, 14),
            NaiveDate::from_ymd_opt(2025, 2, 8).unwrap()
        );
        assert_eq!(default_due_date(issue, -3), issue);
    }

    #[test]
    fn job_lines_describe_material_and_route() {
        let job = job(None, JobStatus::Completed);
        let figures = JobFigures::for_job(&job, 2.5);
        let line = job_line_item(&job, &figures);
        assert_eq!(line.description, "Clean Fill: Quarry Rd to Lot 12 (#J-88)");
        assert_eq!(line.quantity, 30.0);
        assert_eq!(line.amount, 1650.0);
        assert_eq!(line.unit.as_deref(), Some("t"));
        assert_eq!(line.job_id, Some(job.id));
        assert_eq!(figures.levy, 75.0);
    }

    #[test]
    fn only_completed_uninvoiced_jobs_of_the_customer_are_billable() {
        let customer = Uuid::new_v4();
        let ok = job(Some(customer), JobStatus::Completed);
        assert!(check_billable(customer, &[ok.id], std::slice::from_ref(&ok)).is_ok());

        let pending = job(Some(customer), JobStatus::Pending);
        assert!(matches!(
            check_billable(customer, &[pending.id], std::slice::from_ref(&pending)),
            Err(InvoiceError::JobNotBillable { reason: "not completed", .. })
        ));

        let other = job(Some(Uuid::new_v4()), JobStatus::Completed);
        assert!(matches!(
            check_billable(customer, &[other.id], std::slice::from_ref(&other)),
            Err(InvoiceError::JobNotBillable { .. })
        ));

        let mut billed = job(Some(customer), JobStatus::Completed);
        billed.invoice_id = Some(Uuid::new_v4());
        assert!(matches!(
            check_billable(customer, &[billed.id], std::slice::from_ref(&billed)),
            Err(InvoiceError::JobNotBillable { reason: "already invoiced", .. })
        ));

        let missing = Uuid::new_v4();
        match check_billable(customer, &[ok.id, missing], std::slice::from_ref(&ok)) {
            Err(InvoiceError::JobsNotFound(ids)) => assert_eq!(ids, vec![missing]),
            other => panic!("expected JobsNotFound, got {other:?}"),
        }
    }

    #[test]
    fn line_items_need_descriptions() {
        let item = LineItem {
            description: "  ".to_string(),
            quantity: 1.0,
            unit: None,
            price: 10.0,
            amount: 10.0,
            job_id: None,
        };
        assert!(validate_line_items(&[item]).is_err());
    }
}
