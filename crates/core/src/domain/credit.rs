use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::currency::CurrencyCode;
use crate::domain::partner::PartnerId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreditPolicyId(pub String);

impl CreditPolicyId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CreditPolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credit ceiling for a customer. Inactive policies are kept for history
/// and ignored by credit checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditLimitPolicy {
    pub id: CreditPolicyId,
    pub partner_id: PartnerId,
    pub credit_limit: Decimal,
    pub currency: CurrencyCode,
    pub active: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditLimitPolicy {
    pub fn new(
        partner_id: PartnerId,
        credit_limit: Decimal,
        currency: CurrencyCode,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CreditPolicyId::generate(),
            partner_id,
            credit_limit,
            currency,
            active: true,
            note,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Read-time credit figures for a policy. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditProjection {
    pub policy_id: CreditPolicyId,
    pub credit_limit: Decimal,
    pub currency: CurrencyCode,
    pub total_due: Decimal,
    pub remaining_credit: Decimal,
}
