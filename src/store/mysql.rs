//! MySQL-backed store.
//!
//! Queries are checked at runtime so the crate builds without a live
//! database. Enum columns are stored as their SCREAMING_SNAKE_CASE text.
//! Sites and job types change rarely and are cached for a configurable TTL.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};
use tracing::debug;

use super::{
    AttendanceStore, FingerprintLogStore, Page, PayrollStore, ReferenceStore, StoreError,
    StoreResult, page_bounds,
};
use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceStatus, AttendanceUpdate, NewAttendance,
    UpdateGuard,
};
use crate::model::fingerprint::{
    Finger, FingerprintDevice, FingerprintLog, FingerprintTemplate, Hand, NewFingerprintLog,
};
use crate::model::job_type::JobType;
use crate::model::payroll::{
    NewPayroll, PaymentStatus, PayrollFilter, PayrollRecord, PayrollUpdate,
};
use crate::model::site::{ConstructionSite, SiteJobRate};
use crate::model::worker::Worker;

const ATTENDANCE_COLUMNS: &str = "id, worker_id, site_id, attendance_date, check_in_time, \
     check_out_time, total_hours, regular_hours, overtime_hours, break_time_minutes, status, \
     check_out_method, fingerprint_verified, notes, created_at, updated_at";

const PAYROLL_COLUMNS: &str = "id, worker_id, site_id, pay_period_start, pay_period_end, \
     pay_period_type, total_days_worked, total_hours, regular_hours, overtime_hours, daily_rate, \
     regular_pay, overtime_pay, gross_pay, net_pay, payment_status, payment_method, payment_date, \
     payment_reference, approved_by, approved_at, calculated_by, calculated_at, notes";

pub struct MySqlStore {
    pool: MySqlPool,
    sites: Cache<u64, ConstructionSite>,
    job_types: Cache<u64, JobType>,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool, reference_ttl: Duration) -> Self {
        Self {
            pool,
            sites: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(reference_ttl)
                .build(),
            job_types: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(reference_ttl)
                .build(),
        }
    }
}

/// Duplicate-key violations carry SQLSTATE 23000.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

fn parse_column<T>(column: &str, value: &str) -> StoreResult<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    T::from_str(value)
        .map_err(|_| StoreError::Corrupt(format!("unexpected {column} value '{value}'")))
}

// ---------- rows ----------

#[derive(FromRow)]
struct WorkerRow {
    id: u64,
    employee_id: String,
    first_name: String,
    last_name: String,
    status: String,
    assigned_site_id: Option<u64>,
    job_type_id: Option<u64>,
}

impl TryFrom<WorkerRow> for Worker {
    type Error = StoreError;

    fn try_from(row: WorkerRow) -> StoreResult<Self> {
        Ok(Worker {
            id: row.id,
            employee_id: row.employee_id,
            first_name: row.first_name,
            last_name: row.last_name,
            status: parse_column("workers.status", &row.status)?,
            assigned_site_id: row.assigned_site_id,
            job_type_id: row.job_type_id,
        })
    }
}

#[derive(FromRow)]
struct SiteRow {
    id: u64,
    name: String,
    working_hours_start: String,
    working_hours_end: String,
    standard_hours_per_day: Decimal,
    overtime_rate_multiplier: Decimal,
    is_active: bool,
}

impl From<SiteRow> for ConstructionSite {
    fn from(row: SiteRow) -> Self {
        ConstructionSite {
            id: row.id,
            name: row.name,
            working_hours_start: row.working_hours_start,
            working_hours_end: row.working_hours_end,
            standard_hours_per_day: row.standard_hours_per_day,
            overtime_rate_multiplier: row.overtime_rate_multiplier,
            is_active: row.is_active,
        }
    }
}

#[derive(FromRow)]
struct JobTypeRow {
    id: u64,
    name: String,
    category: String,
    base_daily_rate: Decimal,
    overtime_multiplier: Decimal,
}

#[derive(FromRow)]
struct SiteJobRateRow {
    site_id: u64,
    job_type_id: u64,
    site_specific_rate: Decimal,
}

#[derive(FromRow)]
struct DeviceRow {
    id: u64,
    name: String,
    site_id: Option<u64>,
    is_active: bool,
    is_online: bool,
}

#[derive(FromRow)]
struct TemplateRow {
    id: u64,
    worker_id: u64,
    finger: String,
    hand: String,
    template_data: String,
    quality_score: u8,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for FingerprintTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> StoreResult<Self> {
        Ok(FingerprintTemplate {
            id: row.id,
            worker_id: row.worker_id,
            finger: parse_column("fingerprint_templates.finger", &row.finger)?,
            hand: parse_column("fingerprint_templates.hand", &row.hand)?,
            template_data: row.template_data,
            quality_score: row.quality_score,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    worker_id: u64,
    site_id: u64,
    attendance_date: NaiveDate,
    check_in_time: Option<DateTime<Utc>>,
    check_out_time: Option<DateTime<Utc>>,
    total_hours: Decimal,
    regular_hours: Decimal,
    overtime_hours: Decimal,
    break_time_minutes: u32,
    status: String,
    check_out_method: String,
    fingerprint_verified: bool,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> StoreResult<Self> {
        Ok(AttendanceRecord {
            id: row.id,
            worker_id: row.worker_id,
            site_id: row.site_id,
            attendance_date: row.attendance_date,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            total_hours: row.total_hours,
            regular_hours: row.regular_hours,
            overtime_hours: row.overtime_hours,
            break_time_minutes: row.break_time_minutes,
            status: parse_column("attendance_records.status", &row.status)?,
            check_out_method: parse_column(
                "attendance_records.check_out_method",
                &row.check_out_method,
            )?,
            fingerprint_verified: row.fingerprint_verified,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FingerprintLogRow {
    id: u64,
    worker_id: u64,
    device_id: u64,
    site_id: u64,
    template_id: Option<u64>,
    scan_time: DateTime<Utc>,
    match_score: u8,
    scan_quality: u8,
    match_result: String,
    error_message: Option<String>,
    attendance_record_id: Option<u64>,
}

impl TryFrom<FingerprintLogRow> for FingerprintLog {
    type Error = StoreError;

    fn try_from(row: FingerprintLogRow) -> StoreResult<Self> {
        Ok(FingerprintLog {
            id: row.id,
            worker_id: row.worker_id,
            device_id: row.device_id,
            site_id: row.site_id,
            template_id: row.template_id,
            scan_time: row.scan_time,
            match_score: row.match_score,
            scan_quality: row.scan_quality,
            match_result: parse_column("fingerprint_logs.match_result", &row.match_result)?,
            error_message: row.error_message,
            attendance_record_id: row.attendance_record_id,
        })
    }
}

#[derive(FromRow)]
struct PayrollRow {
    id: u64,
    worker_id: u64,
    site_id: u64,
    pay_period_start: NaiveDate,
    pay_period_end: NaiveDate,
    pay_period_type: String,
    total_days_worked: u32,
    total_hours: Decimal,
    regular_hours: Decimal,
    overtime_hours: Decimal,
    daily_rate: Decimal,
    regular_pay: Decimal,
    overtime_pay: Decimal,
    gross_pay: Decimal,
    net_pay: Decimal,
    payment_status: String,
    payment_method: Option<String>,
    payment_date: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    calculated_by: String,
    calculated_at: DateTime<Utc>,
    notes: Option<String>,
}

impl TryFrom<PayrollRow> for PayrollRecord {
    type Error = StoreError;

    fn try_from(row: PayrollRow) -> StoreResult<Self> {
        let payment_method = row
            .payment_method
            .as_deref()
            .map(|m| parse_column("payroll_records.payment_method", m))
            .transpose()?;

        Ok(PayrollRecord {
            id: row.id,
            worker_id: row.worker_id,
            site_id: row.site_id,
            pay_period_start: row.pay_period_start,
            pay_period_end: row.pay_period_end,
            pay_period_type: parse_column("payroll_records.pay_period_type", &row.pay_period_type)?,
            total_days_worked: row.total_days_worked,
            total_hours: row.total_hours,
            regular_hours: row.regular_hours,
            overtime_hours: row.overtime_hours,
            daily_rate: row.daily_rate,
            regular_pay: row.regular_pay,
            overtime_pay: row.overtime_pay,
            gross_pay: row.gross_pay,
            net_pay: row.net_pay,
            payment_status: parse_column("payroll_records.payment_status", &row.payment_status)?,
            payment_method,
            payment_date: row.payment_date,
            payment_reference: row.payment_reference,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            calculated_by: row.calculated_by,
            calculated_at: row.calculated_at,
            notes: row.notes,
        })
    }
}

// ---------- filters ----------

fn push_attendance_filters(qb: &mut QueryBuilder<'_, MySql>, filter: &AttendanceFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(worker_id) = filter.worker_id {
        qb.push(" AND worker_id = ").push_bind(worker_id);
    }
    if let Some(site_id) = filter.site_id {
        qb.push(" AND site_id = ").push_bind(site_id);
    }
    if let Some(from) = filter.from {
        qb.push(" AND attendance_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND attendance_date <= ").push_bind(to);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
}

fn push_payroll_filters(qb: &mut QueryBuilder<'_, MySql>, filter: &PayrollFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(worker_id) = filter.worker_id {
        qb.push(" AND worker_id = ").push_bind(worker_id);
    }
    if let Some(site_id) = filter.site_id {
        qb.push(" AND site_id = ").push_bind(site_id);
    }
    if let Some(status) = filter.payment_status {
        qb.push(" AND payment_status = ").push_bind(status.to_string());
    }
    if let Some(period_from) = filter.period_from {
        qb.push(" AND pay_period_start >= ").push_bind(period_from);
    }
}

fn guard_clause(guard: UpdateGuard) -> &'static str {
    match guard {
        UpdateGuard::None => "",
        UpdateGuard::NotCheckedIn => " AND check_in_time IS NULL",
        UpdateGuard::OpenShift => " AND check_in_time IS NOT NULL AND check_out_time IS NULL",
    }
}

// ---------- reference data ----------

#[async_trait]
impl ReferenceStore for MySqlStore {
    async fn find_worker(&self, worker_id: u64) -> StoreResult<Option<Worker>> {
        sqlx::query_as::<_, WorkerRow>(
            r#"
            SELECT id, employee_id, first_name, last_name, status, assigned_site_id, job_type_id
            FROM workers
            WHERE id = ?
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Worker::try_from)
        .transpose()
    }

    async fn list_active_workers(&self, site_id: Option<u64>) -> StoreResult<Vec<Worker>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT id, employee_id, first_name, last_name, status, assigned_site_id, job_type_id \
             FROM workers WHERE status = 'ACTIVE'",
        );
        if let Some(site_id) = site_id {
            qb.push(" AND assigned_site_id = ").push_bind(site_id);
        }
        qb.push(" ORDER BY id");

        qb.build_query_as::<WorkerRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Worker::try_from)
            .collect()
    }

    async fn find_site(&self, site_id: u64) -> StoreResult<Option<ConstructionSite>> {
        if let Some(site) = self.sites.get(&site_id).await {
            return Ok(Some(site));
        }

        let site = sqlx::query_as::<_, SiteRow>(
            r#"
            SELECT id, name, working_hours_start, working_hours_end,
                   standard_hours_per_day, overtime_rate_multiplier, is_active
            FROM construction_sites
            WHERE id = ?
            "#,
        )
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ConstructionSite::from);

        if let Some(site) = &site {
            debug!(site_id, "Caching site");
            self.sites.insert(site_id, site.clone()).await;
        }
        Ok(site)
    }

    async fn find_job_type(&self, job_type_id: u64) -> StoreResult<Option<JobType>> {
        if let Some(job_type) = self.job_types.get(&job_type_id).await {
            return Ok(Some(job_type));
        }

        let job_type = sqlx::query_as::<_, JobTypeRow>(
            r#"
            SELECT id, name, category, base_daily_rate, overtime_multiplier
            FROM job_types
            WHERE id = ?
            "#,
        )
        .bind(job_type_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| JobType {
            id: row.id,
            name: row.name,
            category: row.category,
            base_daily_rate: row.base_daily_rate,
            overtime_multiplier: row.overtime_multiplier,
        });

        if let Some(job_type) = &job_type {
            self.job_types.insert(job_type_id, job_type.clone()).await;
        }
        Ok(job_type)
    }

    async fn find_site_job_rate(
        &self,
        site_id: u64,
        job_type_id: u64,
    ) -> StoreResult<Option<SiteJobRate>> {
        let row = sqlx::query_as::<_, SiteJobRateRow>(
            r#"
            SELECT site_id, job_type_id, site_specific_rate
            FROM site_job_rates
            WHERE site_id = ? AND job_type_id = ?
            "#,
        )
        .bind(site_id)
        .bind(job_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SiteJobRate {
            site_id: r.site_id,
            job_type_id: r.job_type_id,
            site_specific_rate: r.site_specific_rate,
        }))
    }

    async fn find_device(&self, device_id: u64) -> StoreResult<Option<FingerprintDevice>> {
        let row = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, name, site_id, is_active, is_online FROM fingerprint_devices WHERE id = ?",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| FingerprintDevice {
            id: r.id,
            name: r.name,
            site_id: r.site_id,
            is_active: r.is_active,
            is_online: r.is_online,
        }))
    }

    async fn list_active_templates(
        &self,
        worker_id: u64,
        finger: Option<Finger>,
        hand: Option<Hand>,
    ) -> StoreResult<Vec<FingerprintTemplate>> {
        let mut qb = QueryBuilder::<MySql>::new(
            "SELECT id, worker_id, finger, hand, template_data, quality_score, is_active, created_at \
             FROM fingerprint_templates WHERE is_active = TRUE AND worker_id = ",
        );
        qb.push_bind(worker_id);
        if let Some(finger) = finger {
            qb.push(" AND finger = ").push_bind(finger.to_string());
        }
        if let Some(hand) = hand {
            qb.push(" AND hand = ").push_bind(hand.to_string());
        }
        qb.push(" ORDER BY created_at, id");

        qb.build_query_as::<TemplateRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FingerprintTemplate::try_from)
            .collect()
    }
}

// ---------- attendance ----------

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn find_attendance(
        &self,
        worker_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records \
             WHERE worker_id = ? AND site_id = ? AND attendance_date = ?"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(worker_id)
            .bind(site_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn find_attendance_by_id(&self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance_records WHERE id = ?");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn create_attendance(&self, new: NewAttendance) -> StoreResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
            (worker_id, site_id, attendance_date, check_in_time, status,
             check_out_method, fingerprint_verified, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.worker_id)
        .bind(new.site_id)
        .bind(new.attendance_date)
        .bind(new.check_in_time)
        .bind(new.status.to_string())
        .bind(new.check_out_method.to_string())
        .bind(new.fingerprint_verified)
        .bind(&new.notes)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_id(),
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::AlreadyExists {
                    entity: "attendance record",
                    key: format!(
                        "worker {} site {} on {}",
                        new.worker_id, new.site_id, new.attendance_date
                    ),
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.find_attendance_by_id(id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "attendance record",
                id,
            })
    }

    async fn update_attendance(
        &self,
        id: u64,
        update: AttendanceUpdate,
        guard: UpdateGuard,
    ) -> StoreResult<AttendanceRecord> {
        let sql = format!(
            "UPDATE attendance_records \
             SET check_in_time = ?, check_out_time = ?, total_hours = ?, regular_hours = ?, \
                 overtime_hours = ?, break_time_minutes = ?, status = ?, check_out_method = ?, \
                 fingerprint_verified = ?, notes = ? \
             WHERE id = ?{}",
            guard_clause(guard)
        );

        let result = sqlx::query(&sql)
            .bind(update.check_in_time)
            .bind(update.check_out_time)
            .bind(update.total_hours)
            .bind(update.regular_hours)
            .bind(update.overtime_hours)
            .bind(update.break_time_minutes)
            .bind(update.status.to_string())
            .bind(update.check_out_method.to_string())
            .bind(update.fingerprint_verified)
            .bind(&update.notes)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let current = self.find_attendance_by_id(id).await?.ok_or(StoreError::NotFound {
            entity: "attendance record",
            id,
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StaleWrite {
                entity: "attendance record",
                id,
            });
        }
        Ok(current)
    }

    async fn delete_attendance(&self, id: u64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM attendance_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "attendance record",
                id,
            });
        }
        Ok(())
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> StoreResult<Page<AttendanceRecord>> {
        let (page, per_page, offset) = page_bounds(filter.page, filter.per_page);

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM attendance_records");
        push_attendance_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut data = QueryBuilder::<MySql>::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records"
        ));
        push_attendance_filters(&mut data, filter);
        data.push(" ORDER BY attendance_date DESC, id DESC LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let data = data
            .build_query_as::<AttendanceRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            data,
            page,
            per_page,
            total,
        })
    }

    async fn attendance_in_period(
        &self,
        worker_id: u64,
        from: NaiveDate,
        to: NaiveDate,
        statuses: &[AttendanceStatus],
    ) -> StoreResult<Vec<AttendanceRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records WHERE worker_id = "
        ));
        qb.push_bind(worker_id)
            .push(" AND attendance_date BETWEEN ")
            .push_bind(from)
            .push(" AND ")
            .push_bind(to)
            .push(" AND status IN (");
        let mut separated = qb.separated(", ");
        for status in statuses {
            separated.push_bind(status.to_string());
        }
        separated.push_unseparated(") ORDER BY attendance_date");

        qb.build_query_as::<AttendanceRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect()
    }
}

// ---------- fingerprint logs ----------

#[async_trait]
impl FingerprintLogStore for MySqlStore {
    async fn append_fingerprint_log(&self, log: NewFingerprintLog) -> StoreResult<FingerprintLog> {
        let result = sqlx::query(
            r#"
            INSERT INTO fingerprint_logs
            (worker_id, device_id, site_id, template_id, scan_time, match_score,
             scan_quality, match_result, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.worker_id)
        .bind(log.device_id)
        .bind(log.site_id)
        .bind(log.template_id)
        .bind(log.scan_time)
        .bind(log.match_score)
        .bind(log.scan_quality)
        .bind(log.match_result.to_string())
        .bind(&log.error_message)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        sqlx::query_as::<_, FingerprintLogRow>(
            r#"
            SELECT id, worker_id, device_id, site_id, template_id, scan_time, match_score,
                   scan_quality, match_result, error_message, attendance_record_id
            FROM fingerprint_logs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn link_fingerprint_log(&self, log_id: u64, attendance_id: u64) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE fingerprint_logs SET attendance_record_id = ? WHERE id = ?")
                .bind(attendance_id)
                .bind(log_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "fingerprint log",
                id: log_id,
            });
        }
        Ok(())
    }
}

// ---------- payroll ----------

#[async_trait]
impl PayrollStore for MySqlStore {
    async fn find_payroll(
        &self,
        worker_id: u64,
        site_id: u64,
        pay_period_start: NaiveDate,
    ) -> StoreResult<Option<PayrollRecord>> {
        let sql = format!(
            "SELECT {PAYROLL_COLUMNS} FROM payroll_records \
             WHERE worker_id = ? AND site_id = ? AND pay_period_start = ?"
        );
        sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(worker_id)
            .bind(site_id)
            .bind(pay_period_start)
            .fetch_optional(&self.pool)
            .await?
            .map(PayrollRecord::try_from)
            .transpose()
    }

    async fn find_payroll_by_id(&self, id: u64) -> StoreResult<Option<PayrollRecord>> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll_records WHERE id = ?");
        sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PayrollRecord::try_from)
            .transpose()
    }

    async fn create_payroll(&self, new: NewPayroll) -> StoreResult<PayrollRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO payroll_records
            (worker_id, site_id, pay_period_start, pay_period_end, pay_period_type,
             total_days_worked, total_hours, regular_hours, overtime_hours, daily_rate,
             regular_pay, overtime_pay, gross_pay, net_pay, payment_status,
             calculated_by, calculated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.worker_id)
        .bind(new.site_id)
        .bind(new.pay_period_start)
        .bind(new.pay_period_end)
        .bind(new.pay_period_type.to_string())
        .bind(new.total_days_worked)
        .bind(new.total_hours)
        .bind(new.regular_hours)
        .bind(new.overtime_hours)
        .bind(new.daily_rate)
        .bind(new.regular_pay)
        .bind(new.overtime_pay)
        .bind(new.gross_pay)
        .bind(new.net_pay)
        .bind(new.payment_status.to_string())
        .bind(&new.calculated_by)
        .bind(new.calculated_at)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_id(),
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::AlreadyExists {
                    entity: "payroll record",
                    key: format!(
                        "worker {} site {} period starting {}",
                        new.worker_id, new.site_id, new.pay_period_start
                    ),
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.find_payroll_by_id(id).await?.ok_or(StoreError::NotFound {
            entity: "payroll record",
            id,
        })
    }

    async fn update_payroll(
        &self,
        id: u64,
        expected: PaymentStatus,
        update: PayrollUpdate,
    ) -> StoreResult<PayrollRecord> {
        let result = sqlx::query(
            r#"
            UPDATE payroll_records
            SET payment_status = ?, payment_method = ?, payment_date = ?,
                payment_reference = ?, approved_by = ?, approved_at = ?, notes = ?
            WHERE id = ? AND payment_status = ?
            "#,
        )
        .bind(update.payment_status.to_string())
        .bind(update.payment_method.map(|m| m.to_string()))
        .bind(update.payment_date)
        .bind(&update.payment_reference)
        .bind(&update.approved_by)
        .bind(update.approved_at)
        .bind(&update.notes)
        .bind(id)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?;

        let current = self.find_payroll_by_id(id).await?.ok_or(StoreError::NotFound {
            entity: "payroll record",
            id,
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StaleWrite {
                entity: "payroll record",
                id,
            });
        }
        Ok(current)
    }

    async fn delete_payroll(&self, id: u64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM payroll_records WHERE id = ? AND payment_status <> 'PAID'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return match self.find_payroll_by_id(id).await? {
                Some(_) => Err(StoreError::StaleWrite {
                    entity: "payroll record",
                    id,
                }),
                None => Err(StoreError::NotFound {
                    entity: "payroll record",
                    id,
                }),
            };
        }
        Ok(())
    }

    async fn list_payrolls(&self, filter: &PayrollFilter) -> StoreResult<Page<PayrollRecord>> {
        let (page, per_page, offset) = page_bounds(filter.page, filter.per_page);

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM payroll_records");
        push_payroll_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut data =
            QueryBuilder::<MySql>::new(format!("SELECT {PAYROLL_COLUMNS} FROM payroll_records"));
        push_payroll_filters(&mut data, filter);
        data.push(" ORDER BY pay_period_start DESC, id DESC LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let data = data
            .build_query_as::<PayrollRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PayrollRecord::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            data,
            page,
            per_page,
            total,
        })
    }

    async fn payrolls_covering(
        &self,
        worker_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Vec<PayrollRecord>> {
        let sql = format!(
            "SELECT {PAYROLL_COLUMNS} FROM payroll_records \
             WHERE worker_id = ? AND site_id = ? AND pay_period_start <= ? AND pay_period_end >= ?"
        );
        sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(worker_id)
            .bind(site_id)
            .bind(date)
            .bind(date)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PayrollRecord::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::CheckMethod;

    #[test]
    fn enum_columns_parse_or_report_corruption() {
        let status: AttendanceStatus =
            parse_column("attendance_records.status", "EARLY_DEPARTURE").unwrap();
        assert_eq!(status, AttendanceStatus::EarlyDeparture);

        let method: CheckMethod =
            parse_column("attendance_records.check_out_method", "EMERGENCY_OVERRIDE").unwrap();
        assert_eq!(method, CheckMethod::EmergencyOverride);

        let err = parse_column::<PaymentStatus>("payroll_records.payment_status", "DONE")
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("DONE")));
    }

    #[test]
    fn guard_clauses_match_transitions() {
        assert_eq!(guard_clause(UpdateGuard::None), "");
        assert!(guard_clause(UpdateGuard::OpenShift).contains("check_out_time IS NULL"));
        assert!(guard_clause(UpdateGuard::NotCheckedIn).contains("check_in_time IS NULL"));
    }
}
