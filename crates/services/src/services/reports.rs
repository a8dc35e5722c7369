//! Dashboard reports over invoices and jobs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use db::{
    DBService,
    models::{
        invoice::{Invoice, InvoiceStatus, MonthlyTotal},
        job::Job,
        team::Team,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::calculations::{JobFigures, round_money};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("`from` ({from}) is after `to` ({to})")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportRange {
    pub fn validate(&self) -> Result<(), ReportError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(ReportError::InvalidRange { from, to }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
pub struct RevenueQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Defaults to `paid`.
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ReportSummary {
    pub invoiced: f64,
    pub paid: f64,
    pub outstanding: f64,
    pub overdue_count: i64,
    pub job_count: i64,
    pub tonnage: f64,
    pub levy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MaterialReport {
    pub material: String,
    pub job_count: i64,
    pub tonnage: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JobTotals {
    pub count: i64,
    pub tonnage: f64,
    pub levy: f64,
}

pub fn job_totals(jobs: &[Job], levy_rate: f64) -> JobTotals {
    let mut totals = jobs.iter().fold(JobTotals::default(), |mut acc, job| {
        let figures = JobFigures::for_job(job, levy_rate);
        acc.count += 1;
        acc.tonnage += figures.tonnage.unwrap_or(0.0);
        acc.levy += figures.levy;
        acc
    });
    totals.tonnage = (totals.tonnage * 1000.0).round() / 1000.0;
    totals.levy = round_money(totals.levy);
    totals
}

/// Groups jobs by material name, case-insensitively. Jobs without one are
/// reported as "Unspecified". Sorted by amount, largest first.
pub fn material_breakdown(jobs: &[Job], levy_rate: f64) -> Vec<MaterialReport> {
    let mut groups: BTreeMap<String, MaterialReport> = BTreeMap::new();
    for job in jobs {
        let name = job
            .material
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("Unspecified");
        let figures = JobFigures::for_job(job, levy_rate);
        let entry = groups
            .entry(name.to_lowercase())
            .or_insert_with(|| MaterialReport {
                material: name.to_string(),
                job_count: 0,
                tonnage: 0.0,
                amount: 0.0,
            });
        entry.job_count += 1;
        entry.tonnage += figures.tonnage.unwrap_or(0.0);
        entry.amount += figures.amount;
    }

    let mut report: Vec<MaterialReport> = groups
        .into_values()
        .map(|mut row| {
            row.tonnage = (row.tonnage * 1000.0).round() / 1000.0;
            row.amount = round_money(row.amount);
            row
        })
        .collect();
    report.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    report
}

async fn levy_rate(db: &DBService, team_id: Uuid) -> Result<f64, ReportError> {
    Ok(Team::find_by_id(&db.pool, team_id)
        .await?
        .map(|team| team.levy_rate)
        .unwrap_or(0.0))
}

pub async fn summary(
    db: &DBService,
    team_id: Uuid,
    range: ReportRange,
) -> Result<ReportSummary, ReportError> {
    range.validate()?;
    let invoices = Invoice::totals_in_range(&db.pool, team_id, range.from, range.to).await?;
    let jobs = Job::find_in_range(&db.pool, team_id, range.from, range.to).await?;
    let job_totals = job_totals(&jobs, levy_rate(db, team_id).await?);

    Ok(ReportSummary {
        invoiced: round_money(invoices.invoiced),
        paid: round_money(invoices.paid),
        outstanding: round_money(invoices.outstanding),
        overdue_count: invoices.overdue_count,
        job_count: job_totals.count,
        tonnage: job_totals.tonnage,
        levy: job_totals.levy,
    })
}

pub async fn revenue(
    db: &DBService,
    team_id: Uuid,
    query: RevenueQuery,
) -> Result<Vec<MonthlyTotal>, ReportError> {
    ReportRange {
        from: query.from,
        to: query.to,
    }
    .validate()?;
    let status = query.status.unwrap_or(InvoiceStatus::Paid);
    Ok(Invoice::monthly_totals(&db.pool, team_id, status, query.from, query.to).await?)
}

pub async fn materials(
    db: &DBService,
    team_id: Uuid,
    range: ReportRange,
) -> Result<Vec<MaterialReport>, ReportError> {
    range.validate()?;
    let jobs = Job::find_in_range(&db.pool, team_id, range.from, range.to).await?;
    Ok(material_breakdown(&jobs, levy_rate(db, team_id).await?))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::job::{JobStatus, PricingUnit};

    use super::*;

    fn job(material: Option<&str>, weight: Option<f64>, price: f64) -> Job {
        Job {
            id: Uuid::new_v4(),
            team_id: Uuid::nil(),
            customer_id: None,
            customer_name: None,
            invoice_id: None,
            job_number: None,
            job_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            material: material.map(str::to_string),
            source: None,
            destination: None,
            truck: None,
            driver: None,
            loads: None,
            volume_m3: None,
            weight_tonnes: weight,
            hours: None,
            price,
            pricing_unit: PricingUnit::Tonne,
            status: JobStatus::Completed,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reversed_range_is_rejected() {
        let range = ReportRange {
            from: NaiveDate::from_ymd_opt(2025, 5, 1),
            to: NaiveDate::from_ymd_opt(2025, 4, 1),
        };
        assert!(matches!(range.validate(), Err(ReportError::InvalidRange { .. })));

        let open = ReportRange {
            from: NaiveDate::from_ymd_opt(2025, 5, 1),
            to: None,
        };
        assert!(open.validate().is_ok());
    }

    #[test]
    fn job_totals_sum_tonnage_and_levy() {
        let jobs = vec![job(Some("Sand"), Some(10.0), 20.0), job(None, Some(2.5), 20.0)];
        let totals = job_totals(&jobs, 3.0);
        assert_eq!(totals.count, 2);
        assert_eq!(totals.tonnage, 12.5);
        assert_eq!(totals.levy, 37.5);
    }

    #[test]
    fn materials_group_case_insensitively() {
        let jobs = vec![
            job(Some("Sand"), Some(10.0), 20.0),
            job(Some("sand "), Some(5.0), 20.0),
            job(Some("Topsoil"), Some(20.0), 30.0),
            job(None, Some(1.0), 10.0),
        ];
        let report = material_breakdown(&jobs, 0.0);
        assert_eq!(report.len(), 3);
        assert_eq!(report[0].material, "Topsoil");
        assert_eq!(report[0].amount, 600.0);
        assert_eq!(report[1].material, "Sand");
        assert_eq!(report[1].job_count, 2);
        assert_eq!(report[1].tonnage, 15.0);
        assert_eq!(report[1].amount, 300.0);
        assert_eq!(report[2].material, "Unspecified");
    }
}
