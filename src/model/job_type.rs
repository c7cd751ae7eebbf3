use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "name": "Mason",
        "category": "SKILLED",
        "base_daily_rate": "15000",
        "overtime_multiplier": "1.5"
    })
)]
pub struct JobType {
    pub id: u64,
    pub name: String,
    pub category: String,

    #[schema(value_type = String, example = "15000")]
    pub base_daily_rate: Decimal,

    #[schema(value_type = String, example = "1.5")]
    pub overtime_multiplier: Decimal,
}
