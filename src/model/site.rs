use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::utils::time::parse_hh_mm;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 10,
        "name": "Kampala Road Tower",
        "working_hours_start": "08:00",
        "working_hours_end": "17:00",
        "standard_hours_per_day": "8",
        "overtime_rate_multiplier": "1.5",
        "is_active": true
    })
)]
pub struct ConstructionSite {
    pub id: u64,
    pub name: String,

    /// "HH:MM", 24-hour, UTC
    #[schema(example = "08:00")]
    pub working_hours_start: String,

    #[schema(example = "17:00")]
    pub working_hours_end: String,

    #[schema(value_type = String, example = "8")]
    pub standard_hours_per_day: Decimal,

    #[schema(value_type = String, example = "1.5")]
    pub overtime_rate_multiplier: Decimal,

    pub is_active: bool,
}

/// Parsed site working hours. `start` is strictly before `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ConstructionSite {
    pub fn working_window(&self) -> Result<WorkingWindow, AppError> {
        let start = parse_hh_mm(&self.working_hours_start).ok_or_else(|| {
            AppError::Invalid(format!(
                "site {} has malformed working_hours_start '{}'",
                self.id, self.working_hours_start
            ))
        })?;
        let end = parse_hh_mm(&self.working_hours_end).ok_or_else(|| {
            AppError::Invalid(format!(
                "site {} has malformed working_hours_end '{}'",
                self.id, self.working_hours_end
            ))
        })?;

        if start >= end {
            return Err(AppError::Invalid(format!(
                "site {} working hours start {} is not before end {}",
                self.id, self.working_hours_start, self.working_hours_end
            )));
        }

        Ok(WorkingWindow { start, end })
    }
}

/// Per-site override of a job type's daily rate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SiteJobRate {
    pub site_id: u64,
    pub job_type_id: u64,

    #[schema(value_type = String, example = "17500")]
    pub site_specific_rate: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn site(start: &str, end: &str) -> ConstructionSite {
        ConstructionSite {
            id: 1,
            name: "Test".into(),
            working_hours_start: start.into(),
            working_hours_end: end.into(),
            standard_hours_per_day: dec!(8),
            overtime_rate_multiplier: dec!(1.5),
            is_active: true,
        }
    }

    #[test]
    fn window_requires_start_before_end() {
        let window = site("08:00", "17:00").working_window().unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(window.end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());

        assert!(matches!(
            site("17:00", "08:00").working_window(),
            Err(AppError::Invalid(_))
        ));
        assert!(matches!(
            site("08:00", "08:00").working_window(),
            Err(AppError::Invalid(_))
        ));
        assert!(matches!(
            site("eight", "17:00").working_window(),
            Err(AppError::Invalid(_))
        ));
    }
}
