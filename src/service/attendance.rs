//! Check-in/check-out handling for fingerprint scans and manual actions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::biometric::{FingerprintScorer, MatchPolicy, ScanInput};
use crate::clock::Clock;
use crate::error::AppError;
use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceStatus, AttendanceUpdate, CheckMethod,
    NewAttendance, UpdateGuard,
};
use crate::model::fingerprint::{Finger, Hand, MatchResult, NewFingerprintLog};
use crate::model::site::ConstructionSite;
use crate::model::worker::Worker;
use crate::service::transition::{ShiftPhase, check_out_figures, phase_of, split_hours};
use crate::store::{Page, Store, StoreError};
use crate::utils::time::attendance_day;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CheckAction {
    CheckIn,
    CheckOut,
    AlreadyCompleted,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckOutcome {
    pub action: CheckAction,
    pub record: AttendanceRecord,
    /// Audit row of the scan, for fingerprint events
    pub fingerprint_log_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FingerprintCheck {
    #[schema(example = 1)]
    pub worker_id: u64,
    #[schema(example = 10)]
    pub site_id: u64,
    #[schema(example = 4)]
    pub device_id: u64,
    pub scan: ScanInput,
    /// Only match against this finger
    pub finger: Option<Finger>,
    /// Only match against this hand
    pub hand: Option<Hand>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ManualCheck {
    #[schema(example = 1)]
    pub worker_id: u64,
    #[schema(example = 10)]
    pub site_id: u64,
    /// MANUAL (default) or EMERGENCY_OVERRIDE
    pub method: Option<CheckMethod>,
    pub notes: Option<String>,
}

/// Administrative correction of a day's record. Absent fields keep their
/// current value; hours are recomputed from the resulting times.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AttendanceAdjustment {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,
    pub status: Option<AttendanceStatus>,
    pub break_time_minutes: Option<u32>,
    pub notes: Option<String>,
}

/// How a repeated event on a finished or open day is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Scan toggles in/out; a finished day is a no-op.
    Scan,
    ManualIn,
    ManualOut,
}

pub struct AttendanceService {
    store: Arc<dyn Store>,
    scorer: Arc<dyn FingerprintScorer>,
    clock: Arc<dyn Clock>,
    policy: MatchPolicy,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn Store>,
        scorer: Arc<dyn FingerprintScorer>,
        clock: Arc<dyn Clock>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            store,
            scorer,
            clock,
            policy,
        }
    }

    async fn active_worker(&self, worker_id: u64) -> Result<Worker, AppError> {
        let worker = self
            .store
            .find_worker(worker_id)
            .await?
            .ok_or_else(|| AppError::not_found("worker", worker_id))?;

        if !worker.is_active() {
            return Err(AppError::WorkerNotActive {
                worker_id,
                status: worker.status,
            });
        }
        Ok(worker)
    }

    async fn site(&self, site_id: u64) -> Result<ConstructionSite, AppError> {
        self.store
            .find_site(site_id)
            .await?
            .ok_or_else(|| AppError::not_found("site", site_id))
    }

    /// Verifies a scan and toggles the worker's day at the site.
    #[instrument(
        name = "fingerprint_check",
        skip(self, req),
        fields(worker_id = req.worker_id, site_id = req.site_id, device_id = req.device_id)
    )]
    pub async fn fingerprint_check(&self, req: FingerprintCheck) -> Result<CheckOutcome, AppError> {
        let now = self.clock.now();

        let worker = self.active_worker(req.worker_id).await?;
        let site = self.site(req.site_id).await?;
        if worker.assigned_site_id != Some(site.id) {
            return Err(AppError::WorkerNotAssignedToSite {
                worker_id: worker.id,
                site_id: site.id,
            });
        }

        let device = self
            .store
            .find_device(req.device_id)
            .await?
            .ok_or_else(|| AppError::not_found("fingerprint device", req.device_id))?;
        let unavailable = if !device.is_active {
            Some("device is inactive")
        } else if !device.is_online {
            Some("device is offline")
        } else if device.site_id.is_some_and(|id| id != site.id) {
            Some("device is registered to another site")
        } else {
            None
        };
        if let Some(reason) = unavailable {
            return Err(AppError::DeviceUnavailable {
                device_id: device.id,
                reason,
            });
        }

        let templates = self
            .store
            .list_active_templates(worker.id, req.finger, req.hand)
            .await?;

        if templates.is_empty() {
            self.store
                .append_fingerprint_log(NewFingerprintLog {
                    worker_id: worker.id,
                    device_id: device.id,
                    site_id: site.id,
                    template_id: None,
                    scan_time: now,
                    match_score: 0,
                    scan_quality: req.scan.quality,
                    match_result: MatchResult::NoMatch,
                    error_message: Some("no active fingerprint templates enrolled".into()),
                })
                .await?;
            warn!("No fingerprint templates enrolled");
            return Err(AppError::NoTemplatesEnrolled {
                worker_id: worker.id,
            });
        }

        let verdict = self
            .policy
            .evaluate(self.scorer.as_ref(), &req.scan, &templates);
        debug!(
            template_id = ?verdict.template_id,
            match_score = verdict.match_score,
            scan_quality = verdict.scan_quality,
            result = %verdict.match_result,
            "Fingerprint evaluated"
        );

        let log = self
            .store
            .append_fingerprint_log(NewFingerprintLog {
                worker_id: worker.id,
                device_id: device.id,
                site_id: site.id,
                template_id: verdict.template_id,
                scan_time: now,
                match_score: verdict.match_score,
                scan_quality: verdict.scan_quality,
                match_result: verdict.match_result,
                error_message: verdict.error_message.clone(),
            })
            .await?;

        if verdict.match_result != MatchResult::Success {
            warn!(result = %verdict.match_result, "Fingerprint rejected");
            return Err(AppError::FingerprintRejected {
                worker_id: worker.id,
                result: verdict.match_result,
                match_score: verdict.match_score,
                scan_quality: verdict.scan_quality,
            });
        }

        let (action, record) = self
            .apply(&worker, &site, now, CheckMethod::Fingerprint, None, Flow::Scan)
            .await?;
        self.store.link_fingerprint_log(log.id, record.id).await?;

        Ok(CheckOutcome {
            action,
            record,
            fingerprint_log_id: Some(log.id),
        })
    }

    #[instrument(name = "manual_check_in", skip(self, req), fields(worker_id = req.worker_id, site_id = req.site_id))]
    pub async fn manual_check_in(&self, req: ManualCheck) -> Result<CheckOutcome, AppError> {
        self.manual(req, Flow::ManualIn).await
    }

    #[instrument(name = "manual_check_out", skip(self, req), fields(worker_id = req.worker_id, site_id = req.site_id))]
    pub async fn manual_check_out(&self, req: ManualCheck) -> Result<CheckOutcome, AppError> {
        self.manual(req, Flow::ManualOut).await
    }

    async fn manual(&self, req: ManualCheck, flow: Flow) -> Result<CheckOutcome, AppError> {
        let method = req.method.unwrap_or(CheckMethod::Manual);
        if method == CheckMethod::Fingerprint {
            return Err(AppError::Invalid(
                "manual attendance must use MANUAL or EMERGENCY_OVERRIDE".into(),
            ));
        }

        let now = self.clock.now();
        let worker = self.active_worker(req.worker_id).await?;
        let site = self.site(req.site_id).await?;

        let (action, record) = self
            .apply(&worker, &site, now, method, req.notes, flow)
            .await?;
        Ok(CheckOutcome {
            action,
            record,
            fingerprint_log_id: None,
        })
    }

    /// Reads the day's record, decides, and writes the transition.
    async fn apply(
        &self,
        worker: &Worker,
        site: &ConstructionSite,
        now: DateTime<Utc>,
        method: CheckMethod,
        notes: Option<String>,
        flow: Flow,
    ) -> Result<(CheckAction, AttendanceRecord), AppError> {
        let day = attendance_day(now);
        let existing = self.store.find_attendance(worker.id, site.id, day).await?;
        let verified = method == CheckMethod::Fingerprint;
        let ids = (worker.id, site.id);

        match (phase_of(existing.as_ref()), existing, flow) {
            (ShiftPhase::NoRecord, _, Flow::Scan | Flow::ManualIn) => {
                let created = self
                    .store
                    .create_attendance(NewAttendance {
                        worker_id: worker.id,
                        site_id: site.id,
                        attendance_date: day,
                        check_in_time: now,
                        status: AttendanceStatus::Present,
                        check_out_method: method,
                        fingerprint_verified: verified,
                        notes,
                    })
                    .await
                    .map_err(|e| lost_race(e, flow, ids))?;
                info!(record_id = created.id, %day, "Checked in");
                Ok((CheckAction::CheckIn, created))
            }

            (ShiftPhase::NotCheckedIn, Some(record), Flow::Scan | Flow::ManualIn) => {
                let mut update = AttendanceUpdate::from_record(&record);
                update.check_in_time = Some(now);
                update.status = AttendanceStatus::Present;
                update.check_out_method = method;
                update.fingerprint_verified = verified;
                if notes.is_some() {
                    update.notes = notes;
                }
                let updated = self
                    .store
                    .update_attendance(record.id, update, UpdateGuard::NotCheckedIn)
                    .await
                    .map_err(|e| lost_race(e, flow, ids))?;
                info!(record_id = updated.id, %day, "Checked in on existing record");
                Ok((CheckAction::CheckIn, updated))
            }

            (ShiftPhase::OnShift { check_in }, Some(record), Flow::Scan | Flow::ManualOut) => {
                let figures = check_out_figures(check_in, now, record.status, site)?;
                let mut update = AttendanceUpdate::from_record(&record);
                update.check_out_time = Some(now);
                update.total_hours = figures.total_hours;
                update.regular_hours = figures.regular_hours;
                update.overtime_hours = figures.overtime_hours;
                update.status = figures.status;
                update.check_out_method = method;
                update.fingerprint_verified = verified;
                if notes.is_some() {
                    update.notes = notes;
                }
                let updated = self
                    .store
                    .update_attendance(record.id, update, UpdateGuard::OpenShift)
                    .await
                    .map_err(|e| lost_race(e, flow, ids))?;
                info!(
                    record_id = updated.id,
                    total_hours = %updated.total_hours,
                    overtime_hours = %updated.overtime_hours,
                    status = %updated.status,
                    "Checked out"
                );
                Ok((CheckAction::CheckOut, updated))
            }

            (ShiftPhase::Completed, Some(record), Flow::Scan) => {
                debug!(record_id = record.id, "Day already completed");
                Ok((CheckAction::AlreadyCompleted, record))
            }

            (ShiftPhase::OnShift { .. } | ShiftPhase::Completed, _, Flow::ManualIn) => {
                Err(AppError::AlreadyCheckedIn {
                    worker_id: worker.id,
                    site_id: site.id,
                })
            }

            (ShiftPhase::Completed, _, Flow::ManualOut) => Err(AppError::AlreadyCheckedOut {
                worker_id: worker.id,
                site_id: site.id,
            }),

            (ShiftPhase::NoRecord | ShiftPhase::NotCheckedIn, _, Flow::ManualOut) => {
                Err(AppError::NotCheckedIn {
                    worker_id: worker.id,
                    site_id: site.id,
                })
            }

            (phase, _, _) => Err(AppError::Conflict(format!(
                "attendance for worker {} at site {} changed while deciding ({phase:?})",
                worker.id, site.id
            ))),
        }
    }

    pub async fn get_attendance(&self, id: u64) -> Result<AttendanceRecord, AppError> {
        self.store
            .find_attendance_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("attendance record", id))
    }

    pub async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<Page<AttendanceRecord>, AppError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AppError::Invalid(format!(
                    "range start {from} is after range end {to}"
                )));
            }
        }
        Ok(self.store.list_attendance(filter).await?)
    }

    /// Administrative edit; the only way a completed day changes. Days
    /// covered by a paid payroll are frozen.
    #[instrument(name = "adjust_attendance", skip(self, adjustment))]
    pub async fn adjust_attendance(
        &self,
        id: u64,
        adjustment: AttendanceAdjustment,
    ) -> Result<AttendanceRecord, AppError> {
        let record = self.get_attendance(id).await?;
        self.ensure_unpaid(&record).await?;
        let site = self.site(record.site_id).await?;

        let mut update = AttendanceUpdate::from_record(&record);
        if let Some(check_in) = adjustment.check_in_time {
            update.check_in_time = Some(check_in);
        }
        if let Some(check_out) = adjustment.check_out_time {
            update.check_out_time = Some(check_out);
        }
        if let Some(minutes) = adjustment.break_time_minutes {
            update.break_time_minutes = minutes;
        }
        if adjustment.notes.is_some() {
            update.notes = adjustment.notes;
        }

        for ts in [update.check_in_time, update.check_out_time].into_iter().flatten() {
            if attendance_day(ts) != record.attendance_date {
                return Err(AppError::Invalid(format!(
                    "{ts} is not on the record's day {}",
                    record.attendance_date
                )));
            }
        }

        match (update.check_in_time, update.check_out_time) {
            (Some(check_in), Some(check_out)) => {
                if check_out <= check_in {
                    return Err(AppError::Invalid(
                        "check-out must be after check-in".into(),
                    ));
                }
                let (total, regular, overtime) = split_hours(check_in, check_out, &site)?;
                if u64::from(update.break_time_minutes) > (check_out - check_in).num_minutes() as u64 {
                    return Err(AppError::Invalid(
                        "break time exceeds the time on site".into(),
                    ));
                }
                update.total_hours = total;
                update.regular_hours = regular;
                update.overtime_hours = overtime;
            }
            (None, Some(_)) => {
                return Err(AppError::Invalid(
                    "check-out cannot be set without a check-in".into(),
                ));
            }
            _ => {}
        }

        if let Some(status) = adjustment.status {
            update.status = status;
        }

        let updated = self
            .store
            .update_attendance(id, update, UpdateGuard::None)
            .await?;
        info!(record_id = id, status = %updated.status, "Attendance adjusted");
        Ok(updated)
    }

    /// Refused when a paid payroll covers the record's day.
    #[instrument(name = "delete_attendance", skip(self))]
    pub async fn delete_attendance(&self, id: u64) -> Result<(), AppError> {
        let record = self.get_attendance(id).await?;
        self.ensure_unpaid(&record).await?;

        self.store.delete_attendance(id).await?;
        info!(record_id = id, "Attendance deleted");
        Ok(())
    }

    async fn ensure_unpaid(&self, record: &AttendanceRecord) -> Result<(), AppError> {
        let covering = self
            .store
            .payrolls_covering(record.worker_id, record.site_id, record.attendance_date)
            .await?;
        if let Some(paid) = covering.iter().find(|p| p.is_paid()) {
            return Err(AppError::PreconditionFailed(format!(
                "attendance record {} is covered by paid payroll record {}",
                record.id, paid.id
            )));
        }
        Ok(())
    }
}

/// A write that lost to a concurrent event for the same day. Manual flows
/// report it as the double action it is; scans surface the conflict.
fn lost_race(e: StoreError, flow: Flow, (worker_id, site_id): (u64, u64)) -> AppError {
    match (&e, flow) {
        (StoreError::AlreadyExists { .. } | StoreError::StaleWrite { .. }, Flow::ManualIn) => {
            AppError::AlreadyCheckedIn { worker_id, site_id }
        }
        (StoreError::StaleWrite { .. }, Flow::ManualOut) => {
            AppError::AlreadyCheckedOut { worker_id, site_id }
        }
        _ => AppError::Store(e),
    }
}
