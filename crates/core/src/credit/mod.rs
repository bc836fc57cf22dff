//! Credit ceiling projection and the confirm-time credit check.
//!
//! Everything here is pure: callers load the policy and invoices fresh at
//! decision time and pass them in. No currency conversion is performed;
//! residuals are summed as stored and compared in the policy currency.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::credit::{CreditLimitPolicy, CreditPolicyId, CreditProjection};
use crate::domain::currency::CurrencyCode;
use crate::domain::invoice::Invoice;
use crate::domain::order::SaleOrder;
use crate::domain::partner::PartnerId;
use crate::errors::DomainError;

/// Figures carried by a failed credit check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBreach {
    pub credit_limit: Decimal,
    pub total_due: Decimal,
    pub order_total: Decimal,
    pub projected: Decimal,
    pub currency: CurrencyCode,
}

impl fmt::Display for CreditBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cur = &self.currency;
        write!(
            f,
            "Credit limit exceeded!\n\nLimit: {:.2} {cur}\nCurrent due: {:.2} {cur}\nOrder total: {:.2} {cur}\nProjected: {:.2} {cur}",
            self.credit_limit, self.total_due, self.order_total, self.projected
        )
    }
}

/// Sum of residuals over posted, unpaid customer invoices. Other invoices
/// in the input are ignored, so callers may pass an unfiltered set.
pub fn total_due<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> Decimal {
    invoices
        .into_iter()
        .filter(|invoice| invoice.is_outstanding_receivable())
        .map(|invoice| invoice.amount_residual)
        .sum()
}

pub fn project(policy: &CreditLimitPolicy, total_due: Decimal) -> CreditProjection {
    CreditProjection {
        policy_id: policy.id.clone(),
        credit_limit: policy.credit_limit,
        currency: policy.currency.clone(),
        total_due,
        remaining_credit: policy.credit_limit - total_due,
    }
}

/// Picks the policy that governs a commercial entity from the policies
/// attached to it or its sub-accounts: active only, newest first.
pub fn select_active_policy(
    candidates: impl IntoIterator<Item = CreditLimitPolicy>,
) -> Option<CreditLimitPolicy> {
    candidates.into_iter().filter(|policy| policy.active).max_by(|left, right| {
        left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
    })
}

/// Confirm-time credit gate. `projection` is `None` when the customer has
/// no active policy, in which case nothing is enforced.
pub fn check_order(
    order: &SaleOrder,
    projection: Option<&CreditProjection>,
) -> Result<(), DomainError> {
    let Some(projection) = projection else {
        return Ok(());
    };

    if projection.currency != order.currency {
        return Err(DomainError::CurrencyMismatch {
            policy_currency: projection.currency.clone(),
            order_currency: order.currency.clone(),
        });
    }

    let projected = projection.total_due + order.amount_total;
    if projected > projection.credit_limit {
        return Err(DomainError::CreditExceeded(CreditBreach {
            credit_limit: projection.credit_limit,
            total_due: projection.total_due,
            order_total: order.amount_total,
            projected,
            currency: projection.currency.clone(),
        }));
    }

    Ok(())
}

/// Rejects a write that would leave two active policies in one commercial
/// entity. `in_scope` are the stored policies attached to the entity or its
/// sub-accounts; the policy being written may or may not be among them.
pub fn ensure_single_active(
    policy: &CreditLimitPolicy,
    commercial_partner_id: &PartnerId,
    in_scope: &[CreditLimitPolicy],
) -> Result<(), DomainError> {
    if !policy.active {
        return Ok(());
    }

    let duplicates =
        in_scope.iter().filter(|other| other.active && other.id != policy.id).count();
    if duplicates > 0 {
        return Err(DomainError::DuplicateActivePolicy {
            commercial_partner_id: commercial_partner_id.clone(),
        });
    }

    Ok(())
}

/// Credit fields shown on an order. Zeros when the customer has no policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreditView {
    pub credit_policy_id: Option<CreditPolicyId>,
    pub credit_total_due: Decimal,
    pub credit_remaining: Decimal,
}

impl OrderCreditView {
    pub fn from_projection(projection: Option<&CreditProjection>) -> Self {
        match projection {
            Some(projection) => Self {
                credit_policy_id: Some(projection.policy_id.clone()),
                credit_total_due: projection.total_due,
                credit_remaining: projection.remaining_credit,
            },
            None => Self {
                credit_policy_id: None,
                credit_total_due: Decimal::ZERO,
                credit_remaining: Decimal::ZERO,
            },
        }
    }
}
