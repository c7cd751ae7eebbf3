use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::model::attendance::{AttendanceFilter, AttendanceRecord};
use crate::service::AttendanceService;
use crate::service::attendance::{
    AttendanceAdjustment, CheckOutcome, FingerprintCheck, ManualCheck,
};
use crate::store::Page;

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl From<Page<AttendanceRecord>> for AttendanceListResponse {
    fn from(page: Page<AttendanceRecord>) -> Self {
        Self {
            data: page.data,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
        }
    }
}

/// Fingerprint scan from a site terminal
///
/// Verifies the scan against the worker's enrolled templates, then checks
/// the worker in, out, or reports the day as already completed. Every
/// verified scan is kept in the fingerprint log, including rejected ones.
#[utoipa::path(
    post,
    path = "/api/attendance/scan",
    request_body = FingerprintCheck,
    responses(
        (status = 200, description = "Scan applied", body = CheckOutcome),
        (status = 404, description = "Worker, site or device not found"),
        (status = 409, description = "Concurrent check event for the same day"),
        (status = 422, description = "Worker inactive or unassigned, device unavailable, no templates, or fingerprint rejected"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "api_scan", skip(auth, service, body), fields(user_id = auth.user_id))]
pub async fn scan(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    body: web::Json<FingerprintCheck>,
) -> actix_web::Result<impl Responder> {
    auth.require_scanner()?;

    let outcome = service.fingerprint_check(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Manual check-in
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = ManualCheck,
    responses(
        (status = 200, description = "Checked in", body = CheckOutcome),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "error": "CONFLICT",
            "message": "worker 1 already checked in at site 10 today"
        })),
        (status = 404, description = "Worker or site not found"),
        (status = 422, description = "Worker not active"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    body: web::Json<ManualCheck>,
) -> actix_web::Result<impl Responder> {
    auth.require_site_operator()?;

    let outcome = service.manual_check_in(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Manual check-out
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = ManualCheck,
    responses(
        (status = 200, description = "Checked out", body = CheckOutcome),
        (status = 409, description = "Already checked out today"),
        (status = 422, description = "No check-in found for today", body = Object, example = json!({
            "error": "PRECONDITION_FAILED",
            "message": "worker 1 has not checked in at site 10 today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    body: web::Json<ManualCheck>,
) -> actix_web::Result<impl Responder> {
    auth.require_site_operator()?;

    let outcome = service.manual_check_out(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, body = AttendanceListResponse),
        (status = 400, description = "Invalid date range")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_site_operator()?;

    let page = service.list_attendance(&query).await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse::from(page)))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id", description = "Attendance record ID")),
    responses(
        (status = 200, body = AttendanceRecord),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_site_operator()?;

    let record = service.get_attendance(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Administrative correction; hours are recomputed from the times
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    request_body = AttendanceAdjustment,
    params(("id", description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance updated", body = AttendanceRecord),
        (status = 400, description = "Times out of order or outside the record's day"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn adjust_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    body: web::Json<AttendanceAdjustment>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let record = service
        .adjust_attendance(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id", description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance deleted"),
        (status = 404, description = "Attendance record not found"),
        (status = 422, description = "Covered by a paid payroll")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    service.delete_attendance(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance record deleted successfully"
    })))
}
