use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::model::payroll::{PaymentStatus, PayrollFilter, PayrollRecord};
use crate::service::payment::{PaymentBatch, PaymentBatchResult, PaymentDetails, StatusChange};
use crate::service::payroll::{CalculatePayrollRequest, PayrollBatchResult, PayrollEdit};
use crate::service::{PaymentService, PayrollService};
use crate::store::Page;

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl From<Page<PayrollRecord>> for PaginatedPayrollResponse {
    fn from(page: Page<PayrollRecord>) -> Self {
        Self {
            data: page.data,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
        }
    }
}

/// Calculate payroll for a period
///
/// One record per active worker in scope. Workers whose period is already
/// calculated, or who cannot be paid, are reported in `errors` while the
/// rest of the batch goes ahead.
#[utoipa::path(
    post,
    path = "/api/payroll/calculate",
    request_body = CalculatePayrollRequest,
    responses(
        (status = 200, description = "Batch calculated", body = PayrollBatchResult),
        (status = 400, description = "Invalid period or initial status"),
        (status = 404, description = "Site not found"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(name = "api_calculate_payroll", skip(auth, service, body), fields(user = %auth.username))]
pub async fn calculate_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    body: web::Json<CalculatePayrollRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let mut req = body.into_inner();
    if req.calculated_by.is_none() {
        req.calculated_by = Some(auth.username.clone());
    }

    let result = service.calculate_payroll(req).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollFilter),
    responses(
        (status = 200, body = PaginatedPayrollResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    query: web::Query<PayrollFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let page = service.list_payrolls(&query).await?;
    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse::from(page)))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, body = PayrollRecord),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let payroll = service.get_payroll(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = PayrollEdit,
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll updated", body = PayrollRecord),
        (status = 404, description = "Payroll not found"),
        (status = 422, description = "Payroll already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
    body: web::Json<PayrollEdit>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let payroll = service
        .update_payroll(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    delete,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll deleted"),
        (status = 404, description = "Payroll not found"),
        (status = 422, description = "Payroll already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_payroll(
    auth: AuthUser,
    service: web::Data<PayrollService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    service.delete_payroll(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Payroll deleted successfully"
    })))
}

/// Move a payroll along its payment lifecycle
#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/status",
    request_body = StatusChange,
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, body = PayrollRecord),
        (status = 400, description = "Payment method missing for PAID"),
        (status = 404, description = "Payroll not found"),
        (status = 422, description = "Transition not allowed or payroll already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn set_payment_status(
    auth: AuthUser,
    service: web::Data<PaymentService>,
    path: web::Path<u64>,
    body: web::Json<StatusChange>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if body.status == PaymentStatus::Paid {
        auth.require_admin()?;
    }

    let payroll = service
        .set_status(path.into_inner(), body.into_inner(), &auth.username)
        .await?;
    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    post,
    path = "/api/payroll/{payroll_id}/pay",
    request_body = PaymentDetails,
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll paid", body = PayrollRecord),
        (status = 404, description = "Payroll not found"),
        (status = 422, description = "Payroll already paid or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn pay_payroll(
    auth: AuthUser,
    service: web::Data<PaymentService>,
    path: web::Path<u64>,
    body: web::Json<PaymentDetails>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll = service
        .mark_paid(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(payroll))
}

/// Pay several payroll records with one method and reference
#[utoipa::path(
    post,
    path = "/api/payroll/pay-batch",
    request_body = PaymentBatch,
    responses(
        (status = 200, description = "Batch processed", body = PaymentBatchResult),
        (status = 400, description = "Empty batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn pay_batch(
    auth: AuthUser,
    service: web::Data<PaymentService>,
    body: web::Json<PaymentBatch>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let result = service.process_batch(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}
