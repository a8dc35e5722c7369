//! Linking unlinked jobs to a customer by matching the typed customer name.

use std::collections::HashSet;

use db::{
    DBService,
    models::{customer::Customer, job::Job},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use utils::text::normalize_business_name;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LinkCandidate {
    pub job_id: Uuid,
    pub job_number: Option<String>,
    pub job_date: chrono::NaiveDate,
    pub customer_name: String,
    pub material: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct LinkJobsRequest {
    /// Restrict linking to these jobs; all candidates when absent.
    pub job_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LinkJobsResult {
    pub customer_id: Uuid,
    pub linked_jobs: u64,
}

/// Unlinked jobs whose customer name normalises to the customer's name.
pub fn matching_jobs<'a>(customer_name: &str, jobs: &'a [Job]) -> Vec<&'a Job> {
    let target = normalize_business_name(customer_name);
    if target.is_empty() {
        return Vec::new();
    }
    jobs.iter()
        .filter(|job| job.customer_id.is_none())
        .filter(|job| {
            job.customer_name
                .as_deref()
                .is_some_and(|name| normalize_business_name(name) == target)
        })
        .collect()
}

pub async fn find_candidates(
    db: &DBService,
    customer: &Customer,
) -> Result<Vec<LinkCandidate>, sqlx::Error> {
    let jobs = Job::find_unlinked_named(&db.pool, customer.team_id).await?;
    Ok(matching_jobs(&customer.name, &jobs)
        .into_iter()
        .map(|job| LinkCandidate {
            job_id: job.id,
            job_number: job.job_number.clone(),
            job_date: job.job_date,
            customer_name: job.customer_name.clone().unwrap_or_default(),
            material: job.material.clone(),
        })
        .collect())
}

/// Ids of the candidate jobs to link, narrowed to `only` when given.
pub fn ids_to_link(customer_name: &str, jobs: &[Job], only: Option<&[Uuid]>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = matching_jobs(customer_name, jobs)
        .into_iter()
        .map(|job| job.id)
        .collect();
    if let Some(only) = only {
        let only: HashSet<&Uuid> = only.iter().collect();
        ids.retain(|id| only.contains(id));
    }
    ids
}

/// Links matching jobs to the customer in one transaction. Explicit ids that
/// are not candidates are ignored.
pub async fn link_jobs(
    db: &DBService,
    customer: &Customer,
    only: Option<&[Uuid]>,
) -> Result<LinkJobsResult, sqlx::Error> {
    let jobs = Job::find_unlinked_named(&db.pool, customer.team_id).await?;
    let ids = ids_to_link(&customer.name, &jobs, only);

    if ids.is_empty() {
        return Ok(LinkJobsResult {
            customer_id: customer.id,
            linked_jobs: 0,
        });
    }

    let mut tx = db.begin().await?;
    let linked_jobs = Job::link_to_customer(&mut *tx, customer.team_id, customer.id, &ids).await?;
    tx.commit().await?;

    info!(
        team_id = %customer.team_id,
        customer_id = %customer.id,
        linked_jobs,
        "Linked jobs to customer"
    );

    Ok(LinkJobsResult {
        customer_id: customer.id,
        linked_jobs,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use db::models::job::{JobStatus, PricingUnit};

    use super::*;

    fn job(customer_name: Option<&str>, customer_id: Option<Uuid>) -> Job {
        Job {
            id: Uuid::new_v4(),
            team_id: Uuid::nil(),
            customer_id,
            customer_name: customer_name.map(str::to_string),
            invoice_id: None,
            job_number: None,
            job_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            material: None,
            source: None,
            destination: None,
            truck: None,
            driver: None,
            loads: Some(1.0),
            volume_m3: None,
            weight_tonnes: None,
            hours: None,
            price: 100.0,
            pricing_unit: PricingUnit::Load,
            status: JobStatus::Completed,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn explicit_ids_narrow_the_candidates() {
        let a = job(Some("Acme Civil"), None);
        let b = job(Some("ACME civil ltd"), None);
        let stranger = job(Some("Brown Bros"), None);
        let jobs = vec![a.clone(), b.clone(), stranger.clone()];

        assert_eq!(ids_to_link("Acme Civil", &jobs, None), vec![a.id, b.id]);
        assert_eq!(ids_to_link("Acme Civil", &jobs, Some(&[b.id][..])), vec![b.id]);
        // Ids that are not candidates are ignored.
        assert!(ids_to_link("Acme Civil", &jobs, Some(&[stranger.id, Uuid::new_v4()][..])).is_empty());
        assert!(ids_to_link("Acme Civil", &jobs, Some(&[][..])).is_empty());
    }

    #[test]
    fn matches_on_normalised_name_only() {
        let jobs = vec![
            job(Some("Smith & Sons Pty Ltd"), None),
            job(Some("smith and sons"), None),
            job(Some("Smith Sons"), None),
            job(Some("Smith & Sons"), Some(Uuid::new_v4())),
            job(None, None),
        ];

        let matched = matching_jobs("Smith and Sons", &jobs);
        let matched_ids: Vec<Uuid> = matched.iter().map(|job| job.id).collect();
        assert_eq!(matched_ids, vec![jobs[0].id, jobs[1].id]);
    }

    #[test]
    fn blank_customer_name_matches_nothing() {
        let jobs = vec![job(Some("   "), None)];
        assert!(matching_jobs("  ", &jobs).is_empty());
    }
}
