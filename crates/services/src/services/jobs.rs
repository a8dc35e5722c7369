//! Job CRUD rules layered over the `jobs` table.

use db::{
    DBService,
    models::{
        customer::Customer,
        job::{CreateJob, Job, JobFilter, JobStatus, UpdateJob},
        team::Team,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::calculations::JobFigures;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("job not found")]
    NotFound,
    #[error("customer not found")]
    CustomerNotFound,
    #[error("job is on invoice {0} and cannot be changed")]
    Invoiced(Uuid),
    #[error("status {0} is set by invoicing")]
    ReservedStatus(JobStatus),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct JobWithFigures {
    #[serde(flatten)]
    #[ts(flatten)]
    pub job: Job,
    pub figures: JobFigures,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateJobStatus {
    pub status: JobStatus,
}

pub(crate) fn validate_measurements(
    values: [(&str, Option<f64>); 5],
) -> Result<(), JobError> {
    for (name, value) in values {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(JobError::Validation(format!("{name} must be zero or more")));
            }
        }
    }
    Ok(())
}

pub struct JobService;

impl JobService {
    async fn levy_rate(db: &DBService, team_id: Uuid) -> Result<f64, JobError> {
        Ok(Team::find_by_id(&db.pool, team_id)
            .await?
            .map(|team| team.levy_rate)
            .unwrap_or(0.0))
    }

    fn with_figures(job: Job, levy_rate: f64) -> JobWithFigures {
        let figures = JobFigures::for_job(&job, levy_rate);
        JobWithFigures { job, figures }
    }

    pub async fn list(
        db: &DBService,
        team_id: Uuid,
        filter: &JobFilter,
    ) -> Result<Vec<JobWithFigures>, JobError> {
        let levy_rate = Self::levy_rate(db, team_id).await?;
        let jobs = Job::list(&db.pool, team_id, filter).await?;
        Ok(jobs
            .into_iter()
            .map(|job| Self::with_figures(job, levy_rate))
            .collect())
    }

    pub async fn get(db: &DBService, team_id: Uuid, id: Uuid) -> Result<JobWithFigures, JobError> {
        let job = Job::find_by_id(&db.pool, team_id, id)
            .await?
            .ok_or(JobError::NotFound)?;
        Ok(Self::with_figures(job, Self::levy_rate(db, team_id).await?))
    }

    pub async fn create(
        db: &DBService,
        team_id: Uuid,
        mut data: CreateJob,
    ) -> Result<JobWithFigures, JobError> {
        validate_measurements([
            ("loads", data.loads),
            ("volume_m3", data.volume_m3),
            ("weight_tonnes", data.weight_tonnes),
            ("hours", data.hours),
            ("price", data.price),
        ])?;
        if matches!(data.status, Some(JobStatus::Invoiced)) {
            return Err(JobError::ReservedStatus(JobStatus::Invoiced));
        }
        if let Some(customer_id) = data.customer_id {
            let customer = Customer::find_by_id(&db.pool, team_id, customer_id)
                .await?
                .ok_or(JobError::CustomerNotFound)?;
            if data.customer_name.as_deref().is_none_or(|name| name.trim().is_empty()) {
                data.customer_name = Some(customer.name);
            }
        }

        let job = Job::create(&db.pool, team_id, &data).await?;
        tracing::debug!(team_id = %team_id, job_id = %job.id, "Job created");
        Ok(Self::with_figures(job, Self::levy_rate(db, team_id).await?))
    }

    pub async fn update(
        db: &DBService,
        team_id: Uuid,
        id: Uuid,
        data: &UpdateJob,
    ) -> Result<JobWithFigures, JobError> {
        let existing = Job::find_by_id(&db.pool, team_id, id)
            .await?
            .ok_or(JobError::NotFound)?;
        if let Some(invoice_id) = existing.invoice_id {
            if data.changes_billing() {
                return Err(JobError::Invoiced(invoice_id));
            }
        }
        validate_measurements([
            ("loads", data.loads),
            ("volume_m3", data.volume_m3),
            ("weight_tonnes", data.weight_tonnes),
            ("hours", data.hours),
            ("price", data.price),
        ])?;
        if let Some(customer_id) = data.customer_id {
            Customer::find_by_id(&db.pool, team_id, customer_id)
                .await?
                .ok_or(JobError::CustomerNotFound)?;
        }

        let job = Job::update(&db.pool, team_id, id, data)
            .await?
            .ok_or(JobError::NotFound)?;
        Ok(Self::with_figures(job, Self::levy_rate(db, team_id).await?))
    }

    /// `invoiced` is owned by invoicing; jobs on an invoice keep their status.
    pub async fn set_status(
        db: &DBService,
        team_id: Uuid,
        id: Uuid,
        status: JobStatus,
    ) -> Result<JobWithFigures, JobError> {
        if status == JobStatus::Invoiced {
            return Err(JobError::ReservedStatus(status));
        }
        let existing = Job::find_by_id(&db.pool, team_id, id)
            .await?
            .ok_or(JobError::NotFound)?;
        if let Some(invoice_id) = existing.invoice_id {
            return Err(JobError::Invoiced(invoice_id));
        }

        let job = Job::update_status(&db.pool, team_id, id, status)
            .await?
            .ok_or(JobError::NotFound)?;
        Ok(Self::with_figures(job, Self::levy_rate(db, team_id).await?))
    }

    pub async fn delete(db: &DBService, team_id: Uuid, id: Uuid) -> Result<(), JobError> {
        let existing = Job::find_by_id(&db.pool, team_id, id)
            .await?
            .ok_or(JobError::NotFound)?;
        if let Some(invoice_id) = existing.invoice_id {
            return Err(JobError::Invoiced(invoice_id));
        }
        Job::delete(&db.pool, team_id, id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_or_nan_measurements_are_rejected() {
        assert!(validate_measurements([
            ("loads", Some(2.0)),
            ("volume_m3", None),
            ("weight_tonnes", Some(0.0)),
            ("hours", None),
            ("price", Some(95.0)),
        ])
        .is_ok());

        let err = validate_measurements([
            ("loads", None),
            ("volume_m3", Some(-1.0)),
            ("weight_tonnes", None),
            ("hours", None),
            ("price", None),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "volume_m3 must be zero or more");

        assert!(validate_measurements([
            ("loads", None),
            ("volume_m3", None),
            ("weight_tonnes", None),
            ("hours", None),
            ("price", Some(f64::NAN)),
        ])
        .is_err());
    }
}
