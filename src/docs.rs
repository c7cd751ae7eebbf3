use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::attendance::AttendanceListResponse;
use crate::api::payroll::PaginatedPayrollResponse;
use crate::biometric::ScanInput;
use crate::error::ErrorKind;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, CheckMethod};
use crate::model::fingerprint::{Finger, Hand, MatchResult};
use crate::model::payroll::{PayPeriodType, PaymentMethod, PaymentStatus, PayrollRecord};
use crate::service::attendance::{
    AttendanceAdjustment, CheckAction, CheckOutcome, FingerprintCheck, ManualCheck,
};
use crate::service::payment::{
    PaymentBatch, PaymentBatchResult, PaymentDetails, PaymentFailure, PaymentSummary,
    StatusChange,
};
use crate::service::payroll::{
    CalculatePayrollRequest, PayrollBatchResult, PayrollEdit, PayrollSummary, WorkerFailure,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sitecrew API",
        version = "1.0.0",
        description = r#"
## Construction workforce attendance and payroll

Site terminals post fingerprint scans; supervisors can check workers in and
out by hand. Each worker has at most one attendance record per site and day,
classified as present, late, overtime or early departure on check-out.

Payroll is calculated per worker and pay period from payable attendance
(PRESENT, LATE, OVERTIME) at the site-specific or job-type daily rate, then
moved through PENDING, CALCULATED, APPROVED and PAID. Paid records are frozen.

### Security
All endpoints require a **JWT Bearer** token. Scans are accepted from
terminals and site staff; payroll is restricted to HR and Admin, payment to
Admin.

### Errors
Failures return `{"error": KIND, "message": ...}` with KIND one of
`NOT_FOUND`, `CONFLICT`, `PRECONDITION_FAILED`, `INVALID`, `INTERNAL`.
"#,
    ),
    paths(
        crate::api::attendance::scan,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::adjust_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::payroll::calculate_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::delete_payroll,
        crate::api::payroll::set_payment_status,
        crate::api::payroll::pay_payroll,
        crate::api::payroll::pay_batch
    ),
    components(
        schemas(
            ErrorKind,
            ScanInput,
            Finger,
            Hand,
            MatchResult,
            AttendanceRecord,
            AttendanceStatus,
            CheckMethod,
            AttendanceListResponse,
            FingerprintCheck,
            ManualCheck,
            AttendanceAdjustment,
            CheckAction,
            CheckOutcome,
            PayrollRecord,
            PayPeriodType,
            PaymentStatus,
            PaymentMethod,
            PaginatedPayrollResponse,
            CalculatePayrollRequest,
            PayrollBatchResult,
            PayrollSummary,
            WorkerFailure,
            PayrollEdit,
            StatusChange,
            PaymentDetails,
            PaymentBatch,
            PaymentBatchResult,
            PaymentSummary,
            PaymentFailure
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Fingerprint and manual attendance"),
        (name = "Payroll", description = "Payroll calculation and payment"),
    )
)]
pub struct ApiDoc;
