//! In-process store used by tests and local runs without MySQL.
//!
//! A single mutex guards all tables, so every trait call is atomic and the
//! natural-key checks on insert give exactly one winner under contention.
//! Stale lookups can be queued to replay what a caller that read just before
//! a concurrent write would have seen.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{
    AttendanceStore, FingerprintLogStore, Page, PayrollStore, ReferenceStore, StoreError,
    StoreResult, page_bounds,
};
use crate::clock::{Clock, SystemClock};
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

#[derive(Default)]
struct Tables {
    workers: BTreeMap<u64, Worker>,
    sites: BTreeMap<u64, ConstructionSite>,
    job_types: BTreeMap<u64, JobType>,
    site_job_rates: BTreeMap<(u64, u64), SiteJobRate>,
    devices: BTreeMap<u64, FingerprintDevice>,
    templates: BTreeMap<u64, FingerprintTemplate>,
    attendance: BTreeMap<u64, AttendanceRecord>,
    fingerprint_logs: BTreeMap<u64, FingerprintLog>,
    payrolls: BTreeMap<u64, PayrollRecord>,
    next_id: u64,
    stale_attendance: VecDeque<Option<AttendanceRecord>>,
    stale_payrolls: VecDeque<Option<PayrollRecord>>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    /// The next `find_attendance` returns `snapshot` instead of the stored row.
    pub fn queue_stale_attendance(&self, snapshot: Option<AttendanceRecord>) {
        self.lock().stale_attendance.push_back(snapshot);
    }

    /// The next `find_payroll` returns `snapshot` instead of the stored row.
    pub fn queue_stale_payroll(&self, snapshot: Option<PayrollRecord>) {
        self.lock().stale_payrolls.push_back(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_worker(&self, worker: Worker) {
        self.lock().workers.insert(worker.id, worker);
    }

    pub fn insert_site(&self, site: ConstructionSite) {
        self.lock().sites.insert(site.id, site);
    }

    pub fn insert_job_type(&self, job_type: JobType) {
        self.lock().job_types.insert(job_type.id, job_type);
    }

    pub fn insert_site_job_rate(&self, rate: SiteJobRate) {
        self.lock()
            .site_job_rates
            .insert((rate.site_id, rate.job_type_id), rate);
    }

    pub fn insert_device(&self, device: FingerprintDevice) {
        self.lock().devices.insert(device.id, device);
    }

    pub fn insert_template(&self, template: FingerprintTemplate) {
        self.lock().templates.insert(template.id, template);
    }

    pub fn fingerprint_logs(&self) -> Vec<FingerprintLog> {
        self.lock().fingerprint_logs.values().cloned().collect()
    }

    pub fn attendance_records(&self) -> Vec<AttendanceRecord> {
        self.lock().attendance.values().cloned().collect()
    }

    pub fn payroll_records(&self) -> Vec<PayrollRecord> {
        self.lock().payrolls.values().cloned().collect()
    }
}

fn guard_holds(record: &AttendanceRecord, guard: UpdateGuard) -> bool {
    match guard {
        UpdateGuard::None => true,
        UpdateGuard::NotCheckedIn => record.check_in_time.is_none(),
        UpdateGuard::OpenShift => {
            record.check_in_time.is_some() && record.check_out_time.is_none()
        }
    }
}

fn attendance_matches(record: &AttendanceRecord, filter: &AttendanceFilter) -> bool {
    filter.worker_id.is_none_or(|id| record.worker_id == id)
        && filter.site_id.is_none_or(|id| record.site_id == id)
        && filter.from.is_none_or(|d| record.attendance_date >= d)
        && filter.to.is_none_or(|d| record.attendance_date <= d)
        && filter.status.is_none_or(|s| record.status == s)
}

fn payroll_matches(record: &PayrollRecord, filter: &PayrollFilter) -> bool {
    filter.worker_id.is_none_or(|id| record.worker_id == id)
        && filter.site_id.is_none_or(|id| record.site_id == id)
        && filter.payment_status.is_none_or(|s| record.payment_status == s)
        && filter.period_from.is_none_or(|d| record.pay_period_start >= d)
}

fn paginate<T>(rows: Vec<T>, page: Option<u32>, per_page: Option<u32>) -> Page<T> {
    let (page, per_page, offset) = page_bounds(page, per_page);
    let total = rows.len() as i64;
    let data = rows
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .collect();
    Page {
        data,
        page,
        per_page,
        total,
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn find_worker(&self, worker_id: u64) -> StoreResult<Option<Worker>> {
        Ok(self.lock().workers.get(&worker_id).cloned())
    }

    async fn list_active_workers(&self, site_id: Option<u64>) -> StoreResult<Vec<Worker>> {
        Ok(self
            .lock()
            .workers
            .values()
            .filter(|w| w.is_active())
            .filter(|w| site_id.is_none_or(|id| w.assigned_site_id == Some(id)))
            .cloned()
            .collect())
    }

    async fn find_site(&self, site_id: u64) -> StoreResult<Option<ConstructionSite>> {
        Ok(self.lock().sites.get(&site_id).cloned())
    }

    async fn find_job_type(&self, job_type_id: u64) -> StoreResult<Option<JobType>> {
        Ok(self.lock().job_types.get(&job_type_id).cloned())
    }

    async fn find_site_job_rate(
        &self,
        site_id: u64,
        job_type_id: u64,
    ) -> StoreResult<Option<SiteJobRate>> {
        Ok(self
            .lock()
            .site_job_rates
            .get(&(site_id, job_type_id))
            .cloned())
    }

    async fn find_device(&self, device_id: u64) -> StoreResult<Option<FingerprintDevice>> {
        Ok(self.lock().devices.get(&device_id).cloned())
    }

    async fn list_active_templates(
        &self,
        worker_id: u64,
        finger: Option<Finger>,
        hand: Option<Hand>,
    ) -> StoreResult<Vec<FingerprintTemplate>> {
        let mut templates: Vec<_> = self
            .lock()
            .templates
            .values()
            .filter(|t| t.worker_id == worker_id && t.is_active)
            .filter(|t| finger.is_none_or(|f| t.finger == f))
            .filter(|t| hand.is_none_or(|h| t.hand == h))
            .cloned()
            .collect();
        templates.sort_by_key(|t| (t.created_at, t.id));
        Ok(templates)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_attendance(
        &self,
        worker_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let mut tables = self.lock();
        if let Some(stale) = tables.stale_attendance.pop_front() {
            return Ok(stale);
        }
        Ok(tables
            .attendance
            .values()
            .find(|r| r.worker_id == worker_id && r.site_id == site_id && r.attendance_date == date)
            .cloned())
    }

    async fn find_attendance_by_id(&self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.lock().attendance.get(&id).cloned())
    }

    async fn create_attendance(&self, new: NewAttendance) -> StoreResult<AttendanceRecord> {
        let mut tables = self.lock();
        let taken = tables.attendance.values().any(|r| {
            r.worker_id == new.worker_id
                && r.site_id == new.site_id
                && r.attendance_date == new.attendance_date
        });
        if taken {
            return Err(StoreError::AlreadyExists {
                entity: "attendance record",
                key: format!(
                    "worker {} site {} on {}",
                    new.worker_id, new.site_id, new.attendance_date
                ),
            });
        }

        let now = self.clock.now();
        let record = AttendanceRecord {
            id: tables.next_id(),
            worker_id: new.worker_id,
            site_id: new.site_id,
            attendance_date: new.attendance_date,
            check_in_time: Some(new.check_in_time),
            check_out_time: None,
            total_hours: Decimal::ZERO,
            regular_hours: Decimal::ZERO,
            overtime_hours: Decimal::ZERO,
            break_time_minutes: 0,
            status: new.status,
            check_out_method: new.check_out_method,
            fingerprint_verified: new.fingerprint_verified,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        tables.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_attendance(
        &self,
        id: u64,
        update: AttendanceUpdate,
        guard: UpdateGuard,
    ) -> StoreResult<AttendanceRecord> {
        let mut tables = self.lock();
        let record = tables
            .attendance
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "attendance record",
                id,
            })?;
        if !guard_holds(record, guard) {
            return Err(StoreError::StaleWrite {
                entity: "attendance record",
                id,
            });
        }

        record.check_in_time = update.check_in_time;
        record.check_out_time = update.check_out_time;
        record.total_hours = update.total_hours;
        record.regular_hours = update.regular_hours;
        record.overtime_hours = update.overtime_hours;
        record.break_time_minutes = update.break_time_minutes;
        record.status = update.status;
        record.check_out_method = update.check_out_method;
        record.fingerprint_verified = update.fingerprint_verified;
        record.notes = update.notes;
        record.updated_at = self.clock.now();
        Ok(record.clone())
    }

    async fn delete_attendance(&self, id: u64) -> StoreResult<()> {
        self.lock()
            .attendance
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "attendance record",
                id,
            })
    }

    async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> StoreResult<Page<AttendanceRecord>> {
        let mut rows: Vec<_> = self
            .lock()
            .attendance
            .values()
            .filter(|r| attendance_matches(r, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.attendance_date
                .cmp(&a.attendance_date)
                .then(b.id.cmp(&a.id))
        });
        Ok(paginate(rows, filter.page, filter.per_page))
    }

    async fn attendance_in_period(
        &self,
        worker_id: u64,
        from: NaiveDate,
        to: NaiveDate,
        statuses: &[AttendanceStatus],
    ) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(self
            .lock()
            .attendance
            .values()
            .filter(|r| {
                r.worker_id == worker_id
                    && r.attendance_date >= from
                    && r.attendance_date <= to
                    && statuses.contains(&r.status)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FingerprintLogStore for MemoryStore {
    async fn append_fingerprint_log(&self, log: NewFingerprintLog) -> StoreResult<FingerprintLog> {
        let mut tables = self.lock();
        let row = FingerprintLog {
            id: tables.next_id(),
            worker_id: log.worker_id,
            device_id: log.device_id,
            site_id: log.site_id,
            template_id: log.template_id,
            scan_time: log.scan_time,
            match_score: log.match_score,
            scan_quality: log.scan_quality,
            match_result: log.match_result,
            error_message: log.error_message,
            attendance_record_id: None,
        };
        tables.fingerprint_logs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn link_fingerprint_log(&self, log_id: u64, attendance_id: u64) -> StoreResult<()> {
        let mut tables = self.lock();
        let row = tables
            .fingerprint_logs
            .get_mut(&log_id)
            .ok_or(StoreError::NotFound {
                entity: "fingerprint log",
                id: log_id,
            })?;
        row.attendance_record_id = Some(attendance_id);
        Ok(())
    }
}

#[async_trait]
impl PayrollStore for MemoryStore {
    async fn find_payroll(
        &self,
        worker_id: u64,
        site_id: u64,
        pay_period_start: NaiveDate,
    ) -> StoreResult<Option<PayrollRecord>> {
        let mut tables = self.lock();
        if let Some(stale) = tables.stale_payrolls.pop_front() {
            return Ok(stale);
        }
        Ok(tables
            .payrolls
            .values()
            .find(|p| {
                p.worker_id == worker_id
                    && p.site_id == site_id
                    && p.pay_period_start == pay_period_start
            })
            .cloned())
    }

    async fn find_payroll_by_id(&self, id: u64) -> StoreResult<Option<PayrollRecord>> {
        Ok(self.lock().payrolls.get(&id).cloned())
    }

    async fn create_payroll(&self, new: NewPayroll) -> StoreResult<PayrollRecord> {
        let mut tables = self.lock();
        let taken = tables.payrolls.values().any(|p| {
            p.worker_id == new.worker_id
                && p.site_id == new.site_id
                && p.pay_period_start == new.pay_period_start
        });
        if taken {
            return Err(StoreError::AlreadyExists {
                entity: "payroll record",
                key: format!(
                    "worker {} site {} period starting {}",
                    new.worker_id, new.site_id, new.pay_period_start
                ),
            });
        }

        let record = PayrollRecord {
            id: tables.next_id(),
            worker_id: new.worker_id,
            site_id: new.site_id,
            pay_period_start: new.pay_period_start,
            pay_period_end: new.pay_period_end,
            pay_period_type: new.pay_period_type,
            total_days_worked: new.total_days_worked,
            total_hours: new.total_hours,
            regular_hours: new.regular_hours,
            overtime_hours: new.overtime_hours,
            daily_rate: new.daily_rate,
            regular_pay: new.regular_pay,
            overtime_pay: new.overtime_pay,
            gross_pay: new.gross_pay,
            net_pay: new.net_pay,
            payment_status: new.payment_status,
            payment_method: None,
            payment_date: None,
            payment_reference: None,
            approved_by: None,
            approved_at: None,
            calculated_by: new.calculated_by,
            calculated_at: new.calculated_at,
            notes: None,
        };
        tables.payrolls.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_payroll(
        &self,
        id: u64,
        expected: PaymentStatus,
        update: PayrollUpdate,
    ) -> StoreResult<PayrollRecord> {
        let mut tables = self.lock();
        let record = tables.payrolls.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "payroll record",
            id,
        })?;
        if record.payment_status != expected {
            return Err(StoreError::StaleWrite {
                entity: "payroll record",
                id,
            });
        }

        record.payment_status = update.payment_status;
        record.payment_method = update.payment_method;
        record.payment_date = update.payment_date;
        record.payment_reference = update.payment_reference;
        record.approved_by = update.approved_by;
        record.approved_at = update.approved_at;
        record.notes = update.notes;
        Ok(record.clone())
    }

    async fn delete_payroll(&self, id: u64) -> StoreResult<()> {
        self.lock()
            .payrolls
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "payroll record",
                id,
            })
    }

    async fn list_payrolls(&self, filter: &PayrollFilter) -> StoreResult<Page<PayrollRecord>> {
        let mut rows: Vec<_> = self
            .lock()
            .payrolls
            .values()
            .filter(|p| payroll_matches(p, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.pay_period_start
                .cmp(&a.pay_period_start)
                .then(b.id.cmp(&a.id))
        });
        Ok(paginate(rows, filter.page, filter.per_page))
    }

    async fn payrolls_covering(
        &self,
        worker_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Vec<PayrollRecord>> {
        Ok(self
            .lock()
            .payrolls
            .values()
            .filter(|p| {
                p.worker_id == worker_id
                    && p.site_id == site_id
                    && p.pay_period_start <= date
                    && p.pay_period_end >= date
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::attendance::CheckMethod;
    use chrono::{Duration, TimeZone, Utc};

    fn new_attendance(day: u32) -> NewAttendance {
        NewAttendance {
            worker_id: 1,
            site_id: 2,
            attendance_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            check_in_time: Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap(),
            status: AttendanceStatus::Present,
            check_out_method: CheckMethod::Manual,
            fingerprint_verified: false,
            notes: None,
        }
    }

    #[actix_web::test]
    async fn second_insert_for_same_day_is_rejected() {
        let store = MemoryStore::new();
        store.create_attendance(new_attendance(15)).await.unwrap();

        let err = store.create_attendance(new_attendance(15)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        store.create_attendance(new_attendance(16)).await.unwrap();
        assert_eq!(store.attendance_records().len(), 2);
    }

    #[actix_web::test]
    async fn open_shift_guard_rejects_completed_rows() {
        let store = MemoryStore::new();
        let record = store.create_attendance(new_attendance(15)).await.unwrap();

        let mut update = AttendanceUpdate::from_record(&record);
        update.check_out_time = Some(Utc.with_ymd_and_hms(2024, 1, 15, 17, 0, 0).unwrap());
        store
            .update_attendance(record.id, update.clone(), UpdateGuard::OpenShift)
            .await
            .unwrap();

        let err = store
            .update_attendance(record.id, update, UpdateGuard::OpenShift)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
    }

    #[actix_web::test]
    async fn audit_timestamps_follow_the_store_clock() {
        let opened = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 3).unwrap();
        let clock = Arc::new(FixedClock::new(opened));
        let store = MemoryStore::with_clock(clock.clone());

        let record = store.create_attendance(new_attendance(15)).await.unwrap();
        assert_eq!(record.created_at, opened);
        assert_eq!(record.updated_at, opened);

        clock.advance(Duration::hours(9));
        let updated = store
            .update_attendance(
                record.id,
                AttendanceUpdate::from_record(&record),
                UpdateGuard::None,
            )
            .await
            .unwrap();
        assert_eq!(updated.created_at, opened);
        assert_eq!(updated.updated_at, opened + Duration::hours(9));
    }

    #[actix_web::test]
    async fn queued_stale_lookups_are_served_once() {
        let store = MemoryStore::new();
        let record = store.create_attendance(new_attendance(15)).await.unwrap();
        let date = record.attendance_date;

        store.queue_stale_attendance(None);
        assert_eq!(store.find_attendance(1, 2, date).await.unwrap(), None);
        assert_eq!(
            store.find_attendance(1, 2, date).await.unwrap(),
            Some(record)
        );
    }
}
