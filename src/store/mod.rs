//! Persistence port.
//!
//! Services only see the [`Store`] trait object, constructed once at startup
//! and injected. Natural-key uniqueness is enforced by the implementation:
//! inserting a second attendance row for `(worker, site, day)` or a second
//! payroll row for `(worker, site, period start)` fails with
//! [`StoreError::AlreadyExists`].

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

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

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} already exists for {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// The guarded row changed between read and write.
    #[error("{entity} {id} was modified concurrently")]
    StaleWrite { entity: &'static str, id: u64 },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of a listing, shaped like the HTTP list responses.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Clamps paging parameters the same way for every listing.
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;
    (page, per_page, offset)
}

/// Read-only reference data owned by administrative CRUD.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn find_worker(&self, worker_id: u64) -> StoreResult<Option<Worker>>;

    /// ACTIVE workers, optionally only those assigned to `site_id`.
    async fn list_active_workers(&self, site_id: Option<u64>) -> StoreResult<Vec<Worker>>;

    async fn find_site(&self, site_id: u64) -> StoreResult<Option<ConstructionSite>>;

    async fn find_job_type(&self, job_type_id: u64) -> StoreResult<Option<JobType>>;

    async fn find_site_job_rate(
        &self,
        site_id: u64,
        job_type_id: u64,
    ) -> StoreResult<Option<SiteJobRate>>;

    async fn find_device(&self, device_id: u64) -> StoreResult<Option<FingerprintDevice>>;

    /// Active templates for a worker, optionally narrowed to one finger/hand.
    async fn list_active_templates(
        &self,
        worker_id: u64,
        finger: Option<Finger>,
        hand: Option<Hand>,
    ) -> StoreResult<Vec<FingerprintTemplate>>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_attendance(
        &self,
        worker_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;

    async fn find_attendance_by_id(&self, id: u64) -> StoreResult<Option<AttendanceRecord>>;

    /// Fails with `AlreadyExists` when the day's row is already there.
    async fn create_attendance(&self, new: NewAttendance) -> StoreResult<AttendanceRecord>;

    /// Fails with `StaleWrite` when `guard` no longer holds.
    async fn update_attendance(
        &self,
        id: u64,
        update: AttendanceUpdate,
        guard: UpdateGuard,
    ) -> StoreResult<AttendanceRecord>;

    async fn delete_attendance(&self, id: u64) -> StoreResult<()>;

    async fn list_attendance(&self, filter: &AttendanceFilter)
    -> StoreResult<Page<AttendanceRecord>>;

    /// A worker's rows in `[from, to]` whose status is one of `statuses`.
    async fn attendance_in_period(
        &self,
        worker_id: u64,
        from: NaiveDate,
        to: NaiveDate,
        statuses: &[AttendanceStatus],
    ) -> StoreResult<Vec<AttendanceRecord>>;
}

/// Append-only scan audit trail.
#[async_trait]
pub trait FingerprintLogStore: Send + Sync {
    async fn append_fingerprint_log(&self, log: NewFingerprintLog) -> StoreResult<FingerprintLog>;

    /// Backfills the attendance record a scan produced.
    async fn link_fingerprint_log(&self, log_id: u64, attendance_id: u64) -> StoreResult<()>;
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    async fn find_payroll(
        &self,
        worker_id: u64,
        site_id: u64,
        pay_period_start: NaiveDate,
    ) -> StoreResult<Option<PayrollRecord>>;

    async fn find_payroll_by_id(&self, id: u64) -> StoreResult<Option<PayrollRecord>>;

    /// Fails with `AlreadyExists` when the period is already calculated.
    async fn create_payroll(&self, new: NewPayroll) -> StoreResult<PayrollRecord>;

    /// Fails with `StaleWrite` if the row's status is no longer `expected`.
    async fn update_payroll(
        &self,
        id: u64,
        expected: PaymentStatus,
        update: PayrollUpdate,
    ) -> StoreResult<PayrollRecord>;

    async fn delete_payroll(&self, id: u64) -> StoreResult<()>;

    async fn list_payrolls(&self, filter: &PayrollFilter) -> StoreResult<Page<PayrollRecord>>;

    /// Payroll rows for a worker and site whose period covers `date`.
    async fn payrolls_covering(
        &self,
        worker_id: u64,
        site_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Vec<PayrollRecord>>;
}

pub trait Store: ReferenceStore + AttendanceStore + FingerprintLogStore + PayrollStore {}

impl<T> Store for T where T: ReferenceStore + AttendanceStore + FingerprintLogStore + PayrollStore {}

#[cfg(test)]
mod tests {
    use super::page_bounds;

    #[test]
    fn page_bounds_clamp() {
        assert_eq!(page_bounds(None, None), (1, 20, 0));
        assert_eq!(page_bounds(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(page_bounds(Some(3), Some(10)), (3, 10, 20));
    }
}
