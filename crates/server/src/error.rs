use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use deployment::DeploymentError;
use services::services::{
    invoices::InvoiceError, job_import::JobImportError, jobs::JobError, reports::ReportError,
    team_permissions::PermissionError, teams::TeamError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    Team(#[from] TeamError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    JobImport(#[from] JobImportError),
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
}

fn permission_status(err: &PermissionError) -> StatusCode {
    match err {
        PermissionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PermissionError::NotMember | PermissionError::OwnerRequired => StatusCode::FORBIDDEN,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Deployment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Permission(err) => permission_status(err),
            ApiError::Team(err) => match err {
                TeamError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                TeamError::Permission(err) => permission_status(err),
                TeamError::NotFound | TeamError::MemberNotFound | TeamError::InviteNotFound => {
                    StatusCode::NOT_FOUND
                }
                TeamError::InviteEmailMismatch => StatusCode::FORBIDDEN,
                TeamError::LastOwner => StatusCode::CONFLICT,
                TeamError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Job(err) => match err {
                JobError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                JobError::NotFound | JobError::CustomerNotFound => StatusCode::NOT_FOUND,
                JobError::Invoiced(_) => StatusCode::CONFLICT,
                JobError::ReservedStatus(_) | JobError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::JobImport(err) => match err {
                JobImportError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Invoice(err) => match err {
                InvoiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                InvoiceError::NotFound
                | InvoiceError::TeamNotFound
                | InvoiceError::CustomerNotFound
                | InvoiceError::JobsNotFound(_) => StatusCode::NOT_FOUND,
                InvoiceError::JobNotBillable { .. }
                | InvoiceError::NumberTaken(_)
                | InvoiceError::NotEditable(_)
                | InvoiceError::NotDeletable(_)
                | InvoiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
                InvoiceError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Report(err) => match err {
                ReportError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ReportError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let response = ApiResponse::<()>::error(&message);
        (status, ResponseJson(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::models::invoice::InvoiceStatus;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        assert_eq!(
            ApiError::from(PermissionError::NotMember).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(TeamError::LastOwner).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(TeamError::Permission(PermissionError::OwnerRequired)).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(JobError::Invoiced(Uuid::nil())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(InvoiceError::InvalidTransition {
                from: InvoiceStatus::Paid,
                to: InvoiceStatus::Canceled,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(InvoiceError::NumberTaken("INV-0001".to_string())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(JobImportError::TooManyRows(9000)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let response = ApiError::from(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::Unauthorized("token has expired".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
