use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    HalfDay,
    Overtime,
    EarlyDeparture,
}

impl AttendanceStatus {
    /// Statuses that count as a paid day.
    pub const PAYABLE: [AttendanceStatus; 3] = [
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::Overtime,
    ];

    pub fn is_payable(self) -> bool {
        Self::PAYABLE.contains(&self)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckMethod {
    Fingerprint,
    Manual,
    EmergencyOverride,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1)]
    pub worker_id: u64,

    #[schema(example = 10)]
    pub site_id: u64,

    #[schema(example = "2024-01-15", value_type = String, format = "date")]
    pub attendance_date: NaiveDate,

    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<DateTime<Utc>>,

    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,

    #[schema(value_type = String, example = "9.08")]
    pub total_hours: Decimal,

    #[schema(value_type = String, example = "8")]
    pub regular_hours: Decimal,

    #[schema(value_type = String, example = "1.08")]
    pub overtime_hours: Decimal,

    pub break_time_minutes: u32,

    pub status: AttendanceStatus,

    pub check_out_method: CheckMethod,

    pub fingerprint_verified: bool,

    pub notes: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn is_checked_in(&self) -> bool {
        self.check_in_time.is_some()
    }

    /// Both times set; only an administrative edit may change the record.
    pub fn is_completed(&self) -> bool {
        self.check_in_time.is_some() && self.check_out_time.is_some()
    }
}

/// Row for the first check-in of a day.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub worker_id: u64,
    pub site_id: u64,
    pub attendance_date: NaiveDate,
    pub check_in_time: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub check_out_method: CheckMethod,
    pub fingerprint_verified: bool,
    pub notes: Option<String>,
}

/// Full set of mutable attendance columns written by a transition or an
/// administrative edit.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceUpdate {
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub total_hours: Decimal,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub break_time_minutes: u32,
    pub status: AttendanceStatus,
    pub check_out_method: CheckMethod,
    pub fingerprint_verified: bool,
    pub notes: Option<String>,
}

impl AttendanceUpdate {
    /// Starts from the record's current values.
    pub fn from_record(record: &AttendanceRecord) -> Self {
        Self {
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            total_hours: record.total_hours,
            regular_hours: record.regular_hours,
            overtime_hours: record.overtime_hours,
            break_time_minutes: record.break_time_minutes,
            status: record.status,
            check_out_method: record.check_out_method,
            fingerprint_verified: record.fingerprint_verified,
            notes: record.notes.clone(),
        }
    }
}

/// Store-side guard on an attendance write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateGuard {
    /// Unconditional (administrative edit).
    None,
    /// Only apply while the record has no check-in.
    NotCheckedIn,
    /// Only apply while the record is checked in but not out.
    OpenShift,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    #[schema(example = 1)]
    pub worker_id: Option<u64>,

    #[schema(example = 10)]
    pub site_id: Option<u64>,

    /// Inclusive start day
    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,

    /// Inclusive end day
    #[schema(example = "2024-01-31", value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,

    pub status: Option<AttendanceStatus>,

    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 20)]
    pub per_page: Option<u32>,
}
