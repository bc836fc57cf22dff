use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::UserId;
use crate::domain::currency::CurrencyCode;
use crate::domain::order::{OrderId, SaleOrder};
use crate::errors::DomainError;

/// Placeholder name carried until the sequence assigns the real one.
pub const UNASSIGNED_NAME: &str = "New";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl ApprovalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Draft | Self::Submitted)
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a state machine action. Actions called from an unexpected
/// state are skipped rather than failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Applied { from: ApprovalState, to: ApprovalState },
    Skipped { state: ApprovalState },
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub name: String,
    pub order_id: OrderId,
    pub requested_by: UserId,
    pub approved_by: Option<UserId>,
    pub state: ApprovalState,
    pub reject_reason: Option<String>,
    pub currency: CurrencyCode,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// New request for `order`, snapshotting its total and currency.
    pub fn for_order(
        order: &SaleOrder,
        requested_by: UserId,
        state: ApprovalState,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalId::generate(),
            name: UNASSIGNED_NAME.to_string(),
            order_id: order.id.clone(),
            requested_by,
            approved_by: None,
            state,
            reject_reason: None,
            currency: order.currency.clone(),
            total_amount: order.amount_total,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn has_assigned_name(&self) -> bool {
        !self.name.is_empty() && self.name != UNASSIGNED_NAME
    }

    /// Sets the sequence name once; later calls keep the first name.
    pub fn assign_name(&mut self, name: impl Into<String>) -> bool {
        if self.has_assigned_name() {
            return false;
        }
        self.name = name.into();
        true
    }

    pub fn submit(&mut self, at: DateTime<Utc>) -> Transition {
        if self.state != ApprovalState::Draft {
            return Transition::Skipped { state: self.state };
        }
        self.move_to(ApprovalState::Submitted, at)
    }

    pub fn approve(&mut self, approver: &UserId, at: DateTime<Utc>) -> Transition {
        if self.state != ApprovalState::Submitted {
            return Transition::Skipped { state: self.state };
        }
        self.approved_by = Some(approver.clone());
        self.move_to(ApprovalState::Approved, at)
    }

    /// Rejects a submitted request. `reason` replaces any stored reason when
    /// it is not blank; the effective reason must be non-blank.
    pub fn reject(
        &mut self,
        approver: &UserId,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Transition, DomainError> {
        if self.state != ApprovalState::Submitted {
            return Ok(Transition::Skipped { state: self.state });
        }

        let provided = reason.map(str::trim).filter(|reason| !reason.is_empty());
        let stored = self.reject_reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let Some(effective) = provided.or(stored).map(str::to_owned) else {
            return Err(DomainError::MissingRejectReason { request_id: self.id.clone() });
        };

        self.reject_reason = Some(effective);
        self.approved_by = Some(approver.clone());
        Ok(self.move_to(ApprovalState::Rejected, at))
    }

    fn move_to(&mut self, to: ApprovalState, at: DateTime<Utc>) -> Transition {
        let from = self.state;
        self.state = to;
        self.updated_at = at;
        Transition::Applied { from, to }
    }
}
