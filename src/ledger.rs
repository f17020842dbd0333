//! Credit debit applied once per batch.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::store::CreditLedger;

/// Charges a user's prepaid balance for a finished batch.
#[derive(Clone)]
pub struct CreditDebit {
    ledger: Arc<dyn CreditLedger>,
}

impl CreditDebit {
    pub fn new(ledger: Arc<dyn CreditLedger>) -> Self {
        Self { ledger }
    }

    /// Subtract `total_cost` from `user_id`'s balance.
    ///
    /// Returns `true` when the balance was changed. Failures are logged and
    /// reported as `false`; the messages have already gone out by now.
    pub async fn debit(&self, user_id: &str, total_cost: f64) -> bool {
        if total_cost.is_nan() || total_cost <= 0.0 {
            debug!(user_id, total_cost, "nothing to debit");
            return false;
        }

        match self.ledger.deduct_credits(user_id, total_cost).await {
            Ok(balance) => {
                info!(user_id, amount = total_cost, balance, "credits debited");
                true
            }
            Err(err) => {
                error!(user_id, amount = total_cost, error = %err, "credit debit failed");
                false
            }
        }
    }
}
