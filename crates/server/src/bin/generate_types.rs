use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate-types`.\n// Do not edit this file manually.\n";
    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        db::models::user::User::decl(),
        db::models::user::UpdateUser::decl(),
        db::models::team::TeamRole::decl(),
        db::models::team::Team::decl(),
        db::models::team::TeamMembership::decl(),
        db::models::team::TeamMember::decl(),
        db::models::team::CreateTeam::decl(),
        db::models::team::UpdateTeam::decl(),
        db::models::team_invite::TeamInvite::decl(),
        db::models::team_invite::CreateTeamInvite::decl(),
        db::models::tag::Tag::decl(),
        db::models::tag::CreateTag::decl(),
        db::models::tag::UpdateTag::decl(),
        db::models::customer::Customer::decl(),
        db::models::customer::CustomerWithStats::decl(),
        db::models::customer::CreateCustomer::decl(),
        db::models::customer::UpdateCustomer::decl(),
        db::models::customer::CustomerFilter::decl(),
        db::models::job::JobStatus::decl(),
        db::models::job::PricingUnit::decl(),
        db::models::job::Job::decl(),
        db::models::job::CreateJob::decl(),
        db::models::job::UpdateJob::decl(),
        db::models::job::JobFilter::decl(),
        db::models::invoice::InvoiceStatus::decl(),
        db::models::invoice::LineItem::decl(),
        db::models::invoice::Invoice::decl(),
        db::models::invoice::InvoiceFilter::decl(),
        db::models::invoice::InvoiceStatusSummary::decl(),
        db::models::invoice::MonthlyTotal::decl(),
        services::services::calculations::JobFigures::decl(),
        services::services::calculations::InvoiceTotals::decl(),
        services::services::jobs::JobWithFigures::decl(),
        services::services::jobs::UpdateJobStatus::decl(),
        services::services::customer_linking::LinkCandidate::decl(),
        services::services::customer_linking::LinkJobsRequest::decl(),
        services::services::customer_linking::LinkJobsResult::decl(),
        services::services::job_import::ImportField::decl(),
        services::services::job_import::MappingSource::decl(),
        services::services::job_import::MappingRequest::decl(),
        services::services::job_import::MappingSuggestion::decl(),
        services::services::job_import::ImportRequest::decl(),
        services::services::job_import::RowError::decl(),
        services::services::job_import::ImportResult::decl(),
        services::services::invoices::CreateInvoice::decl(),
        services::services::invoices::CreateInvoiceFromJobs::decl(),
        services::services::invoices::UpdateInvoice::decl(),
        services::services::invoices::UpdateInvoiceStatus::decl(),
        services::services::invoices::InvoiceDetail::decl(),
        services::services::invoices::NextInvoiceNumber::decl(),
        services::services::reports::ReportRange::decl(),
        services::services::reports::RevenueQuery::decl(),
        services::services::reports::ReportSummary::decl(),
        services::services::reports::MaterialReport::decl(),
        services::services::teams::UpdateMemberRole::decl(),
        server::routes::customers::CreateCustomerResponse::decl(),
        server::routes::health::HealthStatus::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| {
            if decl.trim_start().starts_with("export") {
                decl
            } else {
                format!("export {}", decl.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n{body}\n")
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&shared_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            std::process::exit(0);
        } else {
            eprintln!("❌ shared/types.ts is not up to date. Run `cargo run --bin generate-types`.");
            std::process::exit(1);
        }
    }

    if let Some(parent) = shared_path.parent() {
        fs::create_dir_all(parent).expect("cannot create shared/");
    }
    fs::write(&shared_path, generated).expect("unable to write shared/types.ts");
    println!("✅ TypeScript types generated in shared/");
}
