//! Aggregation of attendance into payroll records, one worker at a time.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::error::{AppError, ErrorKind};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::payroll::{
    NewPayroll, PayPeriodType, PaymentMethod, PaymentStatus, PayrollFilter, PayrollRecord,
    PayrollUpdate,
};
use crate::model::worker::Worker;
use crate::store::{Page, Store};

pub const SYSTEM_CALCULATOR: &str = "SYSTEM";

const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CalculatePayrollRequest {
    /// Limit to workers assigned to this site; the payroll is booked to it
    #[schema(example = 10)]
    pub site_id: Option<u64>,

    /// Limit to these workers
    pub worker_ids: Option<Vec<u64>>,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub pay_period_start: NaiveDate,

    #[schema(example = "2024-01-31", value_type = String, format = "date")]
    pub pay_period_end: NaiveDate,

    pub pay_period_type: PayPeriodType,

    /// PENDING (default) or CALCULATED
    pub initial_status: Option<PaymentStatus>,

    pub calculated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollSummary {
    pub total_workers: usize,
    pub successful: usize,
    pub failed: usize,
    #[schema(value_type = String)]
    pub total_gross_pay: Decimal,
    #[schema(value_type = String)]
    pub total_net_pay: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkerFailure {
    pub worker_id: u64,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollBatchResult {
    pub summary: PayrollSummary,
    pub records: Vec<PayrollRecord>,
    pub errors: Vec<WorkerFailure>,
}

/// Fields an operator may change before a record is paid.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PayrollEdit {
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

/// Pay figures for one worker and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollFigures {
    pub total_days_worked: u32,
    pub total_hours: Decimal,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub regular_pay: Decimal,
    pub overtime_pay: Decimal,
    pub gross_pay: Decimal,
    pub net_pay: Decimal,
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Regular pay is day-rate based: every payable day earns the full daily
/// rate whatever its hours. Overtime is paid per hour at the daily rate
/// times the multiplier. Non-payable records are ignored.
pub fn compute_payroll(
    records: &[AttendanceRecord],
    daily_rate: Decimal,
    overtime_multiplier: Decimal,
) -> PayrollFigures {
    let payable: Vec<_> = records.iter().filter(|r| r.status.is_payable()).collect();

    let total_days_worked = payable.len() as u32;
    let total_hours = payable.iter().map(|r| r.total_hours).sum::<Decimal>();
    let regular_hours = payable.iter().map(|r| r.regular_hours).sum::<Decimal>();
    let overtime_hours = payable.iter().map(|r| r.overtime_hours).sum::<Decimal>();

    let regular_pay = money(Decimal::from(total_days_worked) * daily_rate);
    let overtime_pay = money(overtime_hours * daily_rate * overtime_multiplier);
    let gross_pay = regular_pay + overtime_pay;

    PayrollFigures {
        total_days_worked,
        total_hours,
        regular_hours,
        overtime_hours,
        regular_pay,
        overtime_pay,
        gross_pay,
        net_pay: gross_pay,
    }
}

struct Period<'a> {
    site_id: Option<u64>,
    start: NaiveDate,
    end: NaiveDate,
    kind: PayPeriodType,
    status: PaymentStatus,
    calculated_by: &'a str,
    calculated_at: DateTime<Utc>,
}

pub struct PayrollService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl PayrollService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Calculates one payroll record per active worker in scope. Workers are
    /// processed concurrently and independently; a failed worker becomes an
    /// entry in `errors` and never aborts the batch.
    #[instrument(
        name = "calculate_payroll",
        skip(self, req),
        fields(site_id = ?req.site_id, start = %req.pay_period_start, end = %req.pay_period_end)
    )]
    pub async fn calculate_payroll(
        &self,
        req: CalculatePayrollRequest,
    ) -> Result<PayrollBatchResult, AppError> {
        if req.pay_period_start > req.pay_period_end {
            return Err(AppError::Invalid(format!(
                "pay period start {} is after end {}",
                req.pay_period_start, req.pay_period_end
            )));
        }
        let status = req.initial_status.unwrap_or(PaymentStatus::Pending);
        if !matches!(status, PaymentStatus::Pending | PaymentStatus::Calculated) {
            return Err(AppError::Invalid(format!(
                "payroll cannot be created as {status}"
            )));
        }

        if let Some(site_id) = req.site_id {
            self.store
                .find_site(site_id)
                .await?
                .ok_or_else(|| AppError::not_found("site", site_id))?;
        }

        let mut workers = self.store.list_active_workers(req.site_id).await?;
        if let Some(ids) = &req.worker_ids {
            workers.retain(|w| ids.contains(&w.id));
        }

        let calculated_by = req
            .calculated_by
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(SYSTEM_CALCULATOR);
        let period = Period {
            site_id: req.site_id,
            start: req.pay_period_start,
            end: req.pay_period_end,
            kind: req.pay_period_type,
            status,
            calculated_by,
            calculated_at: self.clock.now(),
        };

        let outcomes = join_all(workers.iter().map(|w| self.calculate_for(w, &period))).await;

        let mut records = Vec::new();
        let mut errors = Vec::new();
        for (worker, outcome) in workers.iter().zip(outcomes) {
            match outcome {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(worker_id = worker.id, error = %e, "Payroll skipped for worker");
                    errors.push(WorkerFailure {
                        worker_id: worker.id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let total_gross_pay: Decimal = records.iter().map(|r| r.gross_pay).sum();
        let total_net_pay: Decimal = records.iter().map(|r| r.net_pay).sum();
        let summary = PayrollSummary {
            total_workers: workers.len(),
            successful: records.len(),
            failed: errors.len(),
            total_gross_pay,
            total_net_pay,
        };
        info!(
            successful = summary.successful,
            failed = summary.failed,
            total_gross_pay = %summary.total_gross_pay,
            "Payroll batch calculated"
        );

        Ok(PayrollBatchResult {
            summary,
            records,
            errors,
        })
    }

    async fn calculate_for(
        &self,
        worker: &Worker,
        period: &Period<'_>,
    ) -> Result<PayrollRecord, AppError> {
        let site_id = period
            .site_id
            .or(worker.assigned_site_id)
            .ok_or_else(|| {
                AppError::PreconditionFailed(format!(
                    "worker {} has no assigned site",
                    worker.id
                ))
            })?;
        let job_type_id = worker.job_type_id.ok_or_else(|| {
            AppError::PreconditionFailed(format!("worker {} has no job type", worker.id))
        })?;

        if self
            .store
            .find_payroll(worker.id, site_id, period.start)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "payroll already exists for worker {} at site {} for period starting {}",
                worker.id, site_id, period.start
            )));
        }

        let records = self
            .store
            .attendance_in_period(
                worker.id,
                period.start,
                period.end,
                &AttendanceStatus::PAYABLE,
            )
            .await?;

        let job_type = self
            .store
            .find_job_type(job_type_id)
            .await?
            .ok_or_else(|| AppError::not_found("job type", job_type_id))?;
        let daily_rate = match self.store.find_site_job_rate(site_id, job_type_id).await? {
            Some(rate) => rate.site_specific_rate,
            None => job_type.base_daily_rate,
        };

        let figures = compute_payroll(&records, daily_rate, job_type.overtime_multiplier);

        let record = self
            .store
            .create_payroll(NewPayroll {
                worker_id: worker.id,
                site_id,
                pay_period_start: period.start,
                pay_period_end: period.end,
                pay_period_type: period.kind,
                total_days_worked: figures.total_days_worked,
                total_hours: figures.total_hours,
                regular_hours: figures.regular_hours,
                overtime_hours: figures.overtime_hours,
                daily_rate,
                regular_pay: figures.regular_pay,
                overtime_pay: figures.overtime_pay,
                gross_pay: figures.gross_pay,
                net_pay: figures.net_pay,
                payment_status: period.status,
                calculated_by: period.calculated_by.to_string(),
                calculated_at: period.calculated_at,
            })
            .await?;

        info!(
            payroll_id = record.id,
            worker_id = worker.id,
            days = figures.total_days_worked,
            gross_pay = %figures.gross_pay,
            "Payroll created"
        );
        Ok(record)
    }

    pub async fn get_payroll(&self, id: u64) -> Result<PayrollRecord, AppError> {
        self.store
            .find_payroll_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("payroll record", id))
    }

    pub async fn list_payrolls(
        &self,
        filter: &PayrollFilter,
    ) -> Result<Page<PayrollRecord>, AppError> {
        Ok(self.store.list_payrolls(filter).await?)
    }

    #[instrument(name = "update_payroll", skip(self, edit))]
    pub async fn update_payroll(
        &self,
        id: u64,
        edit: PayrollEdit,
    ) -> Result<PayrollRecord, AppError> {
        let record = self.get_payroll(id).await?;
        if record.is_paid() {
            return Err(AppError::CannotModifyPaidRecord { payroll_id: id });
        }

        let mut update = PayrollUpdate::from_record(&record);
        if edit.payment_method.is_some() {
            update.payment_method = edit.payment_method;
        }
        if edit.payment_reference.is_some() {
            update.payment_reference = edit.payment_reference;
        }
        if edit.notes.is_some() {
            update.notes = edit.notes;
        }

        let updated = self
            .store
            .update_payroll(id, record.payment_status, update)
            .await?;
        info!(payroll_id = id, "Payroll updated");
        Ok(updated)
    }

    #[instrument(name = "delete_payroll", skip(self))]
    pub async fn delete_payroll(&self, id: u64) -> Result<(), AppError> {
        let record = self.get_payroll(id).await?;
        if record.is_paid() {
            return Err(AppError::CannotModifyPaidRecord { payroll_id: id });
        }

        self.store.delete_payroll(id).await?;
        info!(payroll_id = id, "Payroll deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::attendance::{AttendanceStatus, CheckMethod};
    use crate::model::job_type::JobType;
    use crate::model::site::{ConstructionSite, SiteJobRate};
    use crate::model::worker::WorkerStatus;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    const SITE: u64 = 10;
    const MASON: u64 = 3;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn attendance(id: u64, date: NaiveDate, overtime: Decimal, status: AttendanceStatus) -> AttendanceRecord {
        let check_in = Utc.from_utc_datetime(&date.and_hms_opt(8, 0, 0).unwrap());
        let total = dec!(8) + overtime;
        AttendanceRecord {
            id,
            worker_id: 1,
            site_id: SITE,
            attendance_date: date,
            check_in_time: Some(check_in),
            check_out_time: Some(check_in + Duration::hours(8)),
            total_hours: total,
            regular_hours: dec!(8),
            overtime_hours: overtime,
            break_time_minutes: 0,
            status,
            check_out_method: CheckMethod::Fingerprint,
            fingerprint_verified: true,
            notes: None,
            created_at: check_in,
            updated_at: check_in,
        }
    }

    fn worker(id: u64) -> Worker {
        Worker {
            id,
            employee_id: format!("CW-{id}"),
            first_name: "Worker".into(),
            last_name: id.to_string(),
            status: WorkerStatus::Active,
            assigned_site_id: Some(SITE),
            job_type_id: Some(MASON),
        }
    }

    fn seeded() -> (Arc<MemoryStore>, PayrollService) {
        let store = Arc::new(MemoryStore::new());
        store.insert_site(ConstructionSite {
            id: SITE,
            name: "Tower".into(),
            working_hours_start: "08:00".into(),
            working_hours_end: "17:00".into(),
            standard_hours_per_day: dec!(8),
            overtime_rate_multiplier: dec!(1.5),
            is_active: true,
        });
        store.insert_job_type(JobType {
            id: MASON,
            name: "Mason".into(),
            category: "SKILLED".into(),
            base_daily_rate: dec!(15000),
            overtime_multiplier: dec!(1.5),
        });
        store.insert_worker(worker(1));

        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()));
        let service = PayrollService::new(store.clone(), clock);
        (store, service)
    }

    fn request() -> CalculatePayrollRequest {
        CalculatePayrollRequest {
            site_id: Some(SITE),
            worker_ids: None,
            pay_period_start: day(1),
            pay_period_end: day(31),
            pay_period_type: PayPeriodType::Monthly,
            initial_status: None,
            calculated_by: None,
        }
    }

    #[test]
    fn ten_days_with_two_overtime_hours() {
        let mut records: Vec<_> = (1..=10)
            .map(|d| attendance(d as u64, day(d), Decimal::ZERO, AttendanceStatus::Present))
            .collect();
        records[3].overtime_hours = dec!(1.25);
        records[3].status = AttendanceStatus::Overtime;
        records[7].overtime_hours = dec!(0.75);
        records[7].status = AttendanceStatus::Late;

        let figures = compute_payroll(&records, dec!(15000), dec!(1.5));
        assert_eq!(figures.total_days_worked, 10);
        assert_eq!(figures.overtime_hours, dec!(2));
        assert_eq!(figures.regular_pay, dec!(150000));
        assert_eq!(figures.overtime_pay, dec!(45000));
        assert_eq!(figures.gross_pay, dec!(195000));
        assert_eq!(figures.net_pay, figures.gross_pay);
    }

    #[test]
    fn non_payable_days_are_ignored() {
        let records = vec![
            attendance(1, day(2), dec!(3), AttendanceStatus::EarlyDeparture),
            attendance(2, day(3), Decimal::ZERO, AttendanceStatus::HalfDay),
            attendance(3, day(4), Decimal::ZERO, AttendanceStatus::Absent),
            attendance(4, day(5), Decimal::ZERO, AttendanceStatus::Present),
        ];
        let figures = compute_payroll(&records, dec!(12000), dec!(2));
        assert_eq!(figures.total_days_worked, 1);
        assert_eq!(figures.overtime_pay, Decimal::ZERO);
        assert_eq!(figures.gross_pay, dec!(12000));
    }

    #[test]
    fn overtime_pay_is_rounded_to_cents() {
        let records = vec![attendance(1, day(2), dec!(1.08), AttendanceStatus::Overtime)];
        let figures = compute_payroll(&records, dec!(333.33), dec!(1.5));
        // 1.08 * 333.33 * 1.5 = 539.9946
        assert_eq!(figures.overtime_pay, dec!(539.99));
    }

    #[actix_web::test]
    async fn second_calculation_for_the_same_period_is_skipped() {
        let (store, service) = seeded();
        store.insert_worker(worker(2));

        let first = service.calculate_payroll(request()).await.unwrap();
        assert_eq!(first.summary.successful, 2);
        assert_eq!(first.summary.failed, 0);
        assert!(first.records.iter().all(|r| r.calculated_by == SYSTEM_CALCULATOR));

        let second = service.calculate_payroll(request()).await.unwrap();
        assert_eq!(second.summary.total_workers, 2);
        assert_eq!(second.summary.successful, 0);
        assert_eq!(second.summary.failed, 2);
        assert!(second.errors.iter().all(|e| e.kind == ErrorKind::Conflict));
        assert_eq!(store.payroll_records().len(), 2);
    }

    #[actix_web::test]
    async fn site_rate_overrides_base_rate_but_not_multiplier() {
        let (store, service) = seeded();
        store.insert_site_job_rate(SiteJobRate {
            site_id: SITE,
            job_type_id: MASON,
            site_specific_rate: dec!(20000),
        });

        let result = service.calculate_payroll(request()).await.unwrap();
        let record = &result.records[0];
        assert_eq!(record.daily_rate, dec!(20000));
        assert_eq!(record.total_days_worked, 0);
        assert_eq!(record.gross_pay, Decimal::ZERO);
        assert_eq!(record.payment_status, PaymentStatus::Pending);
    }

    #[actix_web::test]
    async fn workers_without_job_type_fail_alone() {
        let (store, service) = seeded();
        store.insert_worker(Worker {
            job_type_id: None,
            ..worker(2)
        });

        let result = service.calculate_payroll(request()).await.unwrap();
        assert_eq!(result.summary.successful, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].worker_id, 2);
        assert_eq!(result.errors[0].kind, ErrorKind::PreconditionFailed);
    }

    #[actix_web::test]
    async fn request_validation() {
        let (_, service) = seeded();

        let mut backwards = request();
        backwards.pay_period_start = day(31);
        backwards.pay_period_end = day(1);
        assert_eq!(
            service.calculate_payroll(backwards).await.unwrap_err().kind(),
            ErrorKind::Invalid
        );

        let mut paid = request();
        paid.initial_status = Some(PaymentStatus::Paid);
        assert_eq!(
            service.calculate_payroll(paid).await.unwrap_err().kind(),
            ErrorKind::Invalid
        );

        let mut unknown_site = request();
        unknown_site.site_id = Some(404);
        assert_eq!(
            service.calculate_payroll(unknown_site).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[actix_web::test]
    async fn edits_and_deletes_are_refused_once_paid() {
        let (store, service) = seeded();
        let record = service.calculate_payroll(request()).await.unwrap().records[0].clone();

        let edited = service
            .update_payroll(
                record.id,
                PayrollEdit {
                    notes: Some("hold until site audit".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.notes.as_deref(), Some("hold until site audit"));

        let mut paid = PayrollUpdate::from_record(&edited);
        paid.payment_status = PaymentStatus::Paid;
        paid.payment_method = Some(PaymentMethod::Cash);
        crate::store::PayrollStore::update_payroll(store.as_ref(), record.id, PaymentStatus::Pending, paid)
            .await
            .unwrap();
        let before = service.get_payroll(record.id).await.unwrap();

        assert!(matches!(
            service
                .update_payroll(record.id, PayrollEdit::default())
                .await
                .unwrap_err(),
            AppError::CannotModifyPaidRecord { .. }
        ));
        assert!(matches!(
            service.delete_payroll(record.id).await.unwrap_err(),
            AppError::CannotModifyPaidRecord { .. }
        ));
        assert_eq!(service.get_payroll(record.id).await.unwrap(), before);
    }
}
