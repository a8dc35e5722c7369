pub mod calculations;
pub mod claude_api;
pub mod config;
pub mod customer_linking;
pub mod invoice_number;
pub mod invoice_overdue;
pub mod invoices;
pub mod job_import;
pub mod jobs;
pub mod reports;
pub mod team_permissions;
pub mod teams;
