//! Background service that flags unpaid invoices past their due date.

use std::time::Duration;

use chrono::Utc;
use db::{DBService, models::invoice::Invoice};
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum InvoiceOverdueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct InvoiceOverdueService {
    db: DBService,
    poll_interval: Duration,
}

impl InvoiceOverdueService {
    pub async fn spawn(db: DBService, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        let service = Self { db, poll_interval };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting invoice overdue service with interval {:?}",
            self.poll_interval
        );

        let mut interval = interval(self.poll_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.sweep().await {
                error!("Error marking overdue invoices: {}", e);
            }
        }
    }

    async fn sweep(&self) -> Result<u64, InvoiceOverdueError> {
        let today = Utc::now().date_naive();
        let marked = Invoice::mark_overdue(&self.db.pool, today).await?;
        if marked > 0 {
            info!(marked, %today, "Marked invoices overdue");
        } else {
            debug!("Invoice overdue: nothing past due");
        }
        Ok(marked)
    }
}
