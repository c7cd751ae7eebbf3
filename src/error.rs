use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::fingerprint::MatchResult;
use crate::model::payroll::PaymentStatus;
use crate::model::worker::WorkerStatus;
use crate::store::StoreError;

/// How a caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    Invalid,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("worker {worker_id} is not active (status {status})")]
    WorkerNotActive { worker_id: u64, status: WorkerStatus },

    #[error("worker {worker_id} is not assigned to site {site_id}")]
    WorkerNotAssignedToSite { worker_id: u64, site_id: u64 },

    #[error("fingerprint device {device_id} is unavailable: {reason}")]
    DeviceUnavailable { device_id: u64, reason: &'static str },

    #[error("worker {worker_id} has no active fingerprint templates enrolled")]
    NoTemplatesEnrolled { worker_id: u64 },

    #[error("fingerprint rejected for worker {worker_id}: {result} (score {match_score}, quality {scan_quality})")]
    FingerprintRejected {
        worker_id: u64,
        result: MatchResult,
        match_score: u8,
        scan_quality: u8,
    },

    #[error("worker {worker_id} has not checked in at site {site_id} today")]
    NotCheckedIn { worker_id: u64, site_id: u64 },

    #[error("worker {worker_id} already checked in at site {site_id} today")]
    AlreadyCheckedIn { worker_id: u64, site_id: u64 },

    #[error("worker {worker_id} already checked out at site {site_id} today")]
    AlreadyCheckedOut { worker_id: u64, site_id: u64 },

    #[error("payroll record {payroll_id} is paid and can no longer be modified")]
    CannotModifyPaidRecord { payroll_id: u64 },

    #[error("payroll record {payroll_id} cannot move from {from} to {to}")]
    InvalidPaymentTransition {
        payroll_id: u64,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::AlreadyCheckedIn { .. }
            | AppError::AlreadyCheckedOut { .. }
            | AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::WorkerNotActive { .. }
            | AppError::WorkerNotAssignedToSite { .. }
            | AppError::DeviceUnavailable { .. }
            | AppError::NoTemplatesEnrolled { .. }
            | AppError::FingerprintRejected { .. }
            | AppError::NotCheckedIn { .. }
            | AppError::CannotModifyPaidRecord { .. }
            | AppError::InvalidPaymentTransition { .. }
            | AppError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            AppError::Invalid(_) => ErrorKind::Invalid,
            AppError::Store(StoreError::AlreadyExists { .. } | StoreError::StaleWrite { .. }) => {
                ErrorKind::Conflict
            }
            AppError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            AppError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PreconditionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = self.kind();
        let message = if kind == ErrorKind::Internal {
            tracing::error!(error = %self, "Request failed");
            "Something went wrong, Contact with system admin".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": kind,
            "message": message,
        }))
    }
}
