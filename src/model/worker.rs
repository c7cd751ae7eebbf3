use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Active,
    Inactive,
    Terminated,
    OnLeave,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_id": "CW-0001",
        "first_name": "John",
        "last_name": "Okello",
        "status": "ACTIVE",
        "assigned_site_id": 10,
        "job_type_id": 3
    })
)]
pub struct Worker {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "CW-0001")]
    pub employee_id: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Okello")]
    pub last_name: String,

    pub status: WorkerStatus,

    #[schema(example = 10, nullable = true)]
    pub assigned_site_id: Option<u64>,

    #[schema(example = 3, nullable = true)]
    pub job_type_id: Option<u64>,
}

impl Worker {
    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_column_text() {
        assert_eq!(WorkerStatus::OnLeave.as_ref(), "ON_LEAVE");
        assert_eq!(WorkerStatus::from_str("ACTIVE").unwrap(), WorkerStatus::Active);
        assert!(WorkerStatus::from_str("active").is_err());
    }
}
