use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Hand {
    Left,
    Right,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchResult {
    Success,
    NoMatch,
    PoorQuality,
    DeviceError,
    MultipleMatches,
}

/// An enrolled fingerprint. `template_data` is the sensor's encoded
/// minutiae, opaque to everything but the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintTemplate {
    pub id: u64,
    pub worker_id: u64,
    pub finger: Finger,
    pub hand: Hand,
    pub template_data: String,
    /// Enrollment quality, 0-100
    pub quality_score: u8,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FingerprintDevice {
    pub id: u64,
    pub name: String,
    pub site_id: Option<u64>,
    pub is_active: bool,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FingerprintLog {
    pub id: u64,
    pub worker_id: u64,
    pub device_id: u64,
    pub site_id: u64,
    pub template_id: Option<u64>,

    #[schema(value_type = String, format = "date-time")]
    pub scan_time: DateTime<Utc>,

    pub match_score: u8,
    pub scan_quality: u8,
    pub match_result: MatchResult,
    pub error_message: Option<String>,
    pub attendance_record_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewFingerprintLog {
    pub worker_id: u64,
    pub device_id: u64,
    pub site_id: u64,
    pub template_id: Option<u64>,
    pub scan_time: DateTime<Utc>,
    pub match_score: u8,
    pub scan_quality: u8,
    pub match_result: MatchResult,
    pub error_message: Option<String>,
}
