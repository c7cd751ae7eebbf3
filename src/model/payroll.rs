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
pub enum PayPeriodType {
    Weekly,
    BiWeekly,
    Monthly,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Calculated,
    Approved,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    /// Position on the forward path; `None` for CANCELLED.
    fn rank(self) -> Option<u8> {
        match self {
            PaymentStatus::Pending => Some(0),
            PaymentStatus::Calculated => Some(1),
            PaymentStatus::Approved => Some(2),
            PaymentStatus::Paid => Some(3),
            PaymentStatus::Cancelled => None,
        }
    }

    /// Forward moves may skip steps. CANCELLED is reachable from any
    /// non-PAID state and is itself final, as is PAID.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        match (self, next) {
            (PaymentStatus::Paid, _) | (PaymentStatus::Cancelled, _) => false,
            (_, PaymentStatus::Cancelled) => true,
            (from, to) => match (from.rank(), to.rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
    MobileMoney,
    AirtelMoney,
    Check,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayrollRecord {
    #[schema(example = 1)]
    pub id: u64,
    pub worker_id: u64,
    pub site_id: u64,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub pay_period_start: NaiveDate,

    #[schema(example = "2024-01-31", value_type = String, format = "date")]
    pub pay_period_end: NaiveDate,

    pub pay_period_type: PayPeriodType,

    pub total_days_worked: u32,

    #[schema(value_type = String)]
    pub total_hours: Decimal,
    #[schema(value_type = String)]
    pub regular_hours: Decimal,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
    #[schema(value_type = String, example = "15000")]
    pub daily_rate: Decimal,
    #[schema(value_type = String, example = "150000")]
    pub regular_pay: Decimal,
    #[schema(value_type = String, example = "45000")]
    pub overtime_pay: Decimal,
    #[schema(value_type = String, example = "195000")]
    pub gross_pay: Decimal,
    #[schema(value_type = String, example = "195000")]
    pub net_pay: Decimal,

    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,

    #[schema(value_type = Option<String>, format = "date-time")]
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,

    pub approved_by: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,

    pub calculated_by: String,
    #[schema(value_type = String, format = "date-time")]
    pub calculated_at: DateTime<Utc>,

    pub notes: Option<String>,
}

impl PayrollRecord {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

#[derive(Debug, Clone)]
pub struct NewPayroll {
    pub worker_id: u64,
    pub site_id: u64,
    pub pay_period_start: NaiveDate,
    pub pay_period_end: NaiveDate,
    pub pay_period_type: PayPeriodType,
    pub total_days_worked: u32,
    pub total_hours: Decimal,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub daily_rate: Decimal,
    pub regular_pay: Decimal,
    pub overtime_pay: Decimal,
    pub gross_pay: Decimal,
    pub net_pay: Decimal,
    pub payment_status: PaymentStatus,
    pub calculated_by: String,
    pub calculated_at: DateTime<Utc>,
}

/// Mutable payment-side columns of a payroll record.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollUpdate {
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl PayrollUpdate {
    pub fn from_record(record: &PayrollRecord) -> Self {
        Self {
            payment_status: record.payment_status,
            payment_method: record.payment_method,
            payment_date: record.payment_date,
            payment_reference: record.payment_reference.clone(),
            approved_by: record.approved_by.clone(),
            approved_at: record.approved_at,
            notes: record.notes.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PayrollFilter {
    #[schema(example = 1)]
    pub worker_id: Option<u64>,

    #[schema(example = 10)]
    pub site_id: Option<u64>,

    pub payment_status: Option<PaymentStatus>,

    /// Only periods starting on or after this day
    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub period_from: Option<NaiveDate>,

    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::PaymentStatus::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        assert!(Pending.can_transition_to(Calculated));
        assert!(Pending.can_transition_to(Paid));
        assert!(Calculated.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Paid));

        assert!(!Approved.can_transition_to(Pending));
        assert!(!Calculated.can_transition_to(Calculated));
    }

    #[test]
    fn cancel_from_anything_but_paid() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }
}
