//! Payment-status lifecycle of payroll records.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, ErrorKind};
use crate::model::payroll::{PaymentMethod, PaymentStatus, PayrollRecord, PayrollUpdate};
use crate::store::Store;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: PaymentStatus,
    /// Required when moving to PAID
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub payment_method: PaymentMethod,
    /// Generated when absent
    pub payment_reference: Option<String>,
    /// Defaults to now
    #[schema(value_type = Option<String>, format = "date-time")]
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentBatch {
    pub payroll_ids: Vec<u64>,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaymentSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaymentFailure {
    pub payroll_id: u64,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentBatchResult {
    pub summary: PaymentSummary,
    pub paid: Vec<PayrollRecord>,
    pub errors: Vec<PaymentFailure>,
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn payroll(&self, id: u64) -> Result<PayrollRecord, AppError> {
        self.store
            .find_payroll_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("payroll record", id))
    }

    fn check_transition(record: &PayrollRecord, to: PaymentStatus) -> Result<(), AppError> {
        if record.is_paid() {
            return Err(AppError::CannotModifyPaidRecord {
                payroll_id: record.id,
            });
        }
        if !record.payment_status.can_transition_to(to) {
            return Err(AppError::InvalidPaymentTransition {
                payroll_id: record.id,
                from: record.payment_status,
                to,
            });
        }
        Ok(())
    }

    /// Moves a record along the lifecycle. A move to PAID goes through
    /// [`PaymentService::mark_paid`] and needs a payment method.
    #[instrument(name = "set_payment_status", skip(self, change), fields(to = %change.status))]
    pub async fn set_status(
        &self,
        id: u64,
        change: StatusChange,
        actor: &str,
    ) -> Result<PayrollRecord, AppError> {
        if change.status == PaymentStatus::Paid {
            let method = change.payment_method.ok_or_else(|| {
                AppError::Invalid("a payment method is required to mark a payroll paid".into())
            })?;
            let details = PaymentDetails {
                payment_method: method,
                payment_reference: change.payment_reference,
                payment_date: None,
            };
            return self.pay(id, details, change.notes).await;
        }

        let record = self.payroll(id).await?;
        Self::check_transition(&record, change.status)?;

        let mut update = PayrollUpdate::from_record(&record);
        update.payment_status = change.status;
        if change.status == PaymentStatus::Approved {
            update.approved_by = Some(actor.to_string());
            update.approved_at = Some(self.clock.now());
        }
        if change.payment_method.is_some() {
            update.payment_method = change.payment_method;
        }
        if change.notes.is_some() {
            update.notes = change.notes;
        }

        let updated = self
            .store
            .update_payroll(id, record.payment_status, update)
            .await?;
        info!(
            payroll_id = id,
            from = %record.payment_status,
            to = %updated.payment_status,
            "Payment status changed"
        );
        Ok(updated)
    }

    #[instrument(name = "mark_paid", skip(self, details), fields(method = %details.payment_method))]
    pub async fn mark_paid(
        &self,
        id: u64,
        details: PaymentDetails,
    ) -> Result<PayrollRecord, AppError> {
        self.pay(id, details, None).await
    }

    async fn pay(
        &self,
        id: u64,
        details: PaymentDetails,
        notes: Option<String>,
    ) -> Result<PayrollRecord, AppError> {
        let record = self.payroll(id).await?;
        Self::check_transition(&record, PaymentStatus::Paid)?;

        let reference = details
            .payment_reference
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("PAY-{}", Uuid::new_v4()));

        let mut update = PayrollUpdate::from_record(&record);
        update.payment_status = PaymentStatus::Paid;
        update.payment_method = Some(details.payment_method);
        update.payment_date = Some(details.payment_date.unwrap_or_else(|| self.clock.now()));
        update.payment_reference = Some(reference);
        if notes.is_some() {
            update.notes = notes;
        }

        let paid = self
            .store
            .update_payroll(id, record.payment_status, update)
            .await?;
        info!(
            payroll_id = id,
            net_pay = %paid.net_pay,
            reference = paid.payment_reference.as_deref().unwrap_or_default(),
            "Payroll paid"
        );
        Ok(paid)
    }

    /// Pays every listed record with one method and reference. Each record
    /// succeeds or fails on its own; repeated ids are paid once.
    #[instrument(name = "pay_batch", skip(self, batch), fields(count = batch.payroll_ids.len()))]
    pub async fn process_batch(&self, batch: PaymentBatch) -> Result<PaymentBatchResult, AppError> {
        if batch.payroll_ids.is_empty() {
            return Err(AppError::Invalid("no payroll records to pay".into()));
        }

        let mut seen = HashSet::new();
        let ids: Vec<u64> = batch
            .payroll_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let outcomes = join_all(ids.iter().map(|&id| {
            self.mark_paid(
                id,
                PaymentDetails {
                    payment_method: batch.payment_method,
                    payment_reference: batch.payment_reference.clone(),
                    payment_date: batch.payment_date,
                },
            )
        }))
        .await;

        let mut paid = Vec::new();
        let mut errors = Vec::new();
        for (id, outcome) in ids.iter().zip(outcomes) {
            match outcome {
                Ok(record) => paid.push(record),
                Err(e) => {
                    warn!(payroll_id = id, error = %e, "Payment failed");
                    errors.push(PaymentFailure {
                        payroll_id: *id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let total_amount: Decimal = paid.iter().map(|r| r.net_pay).sum();
        let summary = PaymentSummary {
            total: ids.len(),
            successful: paid.len(),
            failed: errors.len(),
            total_amount,
        };
        info!(
            successful = summary.successful,
            failed = summary.failed,
            total_amount = %summary.total_amount,
            "Payment batch processed"
        );

        Ok(PaymentBatchResult {
            summary,
            paid,
            errors,
        })
    }
}
