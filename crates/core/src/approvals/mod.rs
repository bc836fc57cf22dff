//! High-value order approval policy.
//!
//! [`decide`] is the pure half of the confirm-time approval check: given the
//! order and every request stored for it, it says whether confirmation may
//! proceed or which request has to be submitted before blocking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalId, ApprovalRequest, ApprovalState};
use crate::domain::order::SaleOrder;

/// Orders strictly above this total need an approved request. The
/// comparison ignores currency.
pub const APPROVAL_THRESHOLD: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

pub fn requires_approval(order: &SaleOrder) -> bool {
    order.amount_total > APPROVAL_THRESHOLD
}

/// Whether a confirm call runs the approval check. `BypassApproval` is only
/// used for the single confirmation triggered by approving a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmMode {
    #[default]
    Enforce,
    BypassApproval,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProceedReason {
    Bypassed,
    BelowThreshold,
    Approved { request_id: ApprovalId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockAction {
    /// An open request is still in draft; submit it.
    SubmitDraft { request_id: ApprovalId },
    /// An open request is already submitted; reuse it as is.
    AwaitSubmitted { request_id: ApprovalId },
    /// No open request exists; create one directly in `submitted`.
    CreateSubmitted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Proceed(ProceedReason),
    Block(BlockAction),
}

pub fn decide(
    order: &SaleOrder,
    mode: ConfirmMode,
    requests: &[ApprovalRequest],
) -> ApprovalDecision {
    if mode == ConfirmMode::BypassApproval {
        return ApprovalDecision::Proceed(ProceedReason::Bypassed);
    }

    if !requires_approval(order) {
        return ApprovalDecision::Proceed(ProceedReason::BelowThreshold);
    }

    let for_order = || requests.iter().filter(|request| request.order_id == order.id);

    if let Some(approved) = newest(for_order().filter(|r| r.state == ApprovalState::Approved)) {
        return ApprovalDecision::Proceed(ProceedReason::Approved {
            request_id: approved.id.clone(),
        });
    }

    // Rejected requests are history and never block a fresh request.
    match newest(for_order().filter(|request| request.state.is_open())) {
        Some(open) if open.state == ApprovalState::Draft => {
            ApprovalDecision::Block(BlockAction::SubmitDraft { request_id: open.id.clone() })
        }
        Some(open) => {
            ApprovalDecision::Block(BlockAction::AwaitSubmitted { request_id: open.id.clone() })
        }
        None => ApprovalDecision::Block(BlockAction::CreateSubmitted),
    }
}

fn newest<'a>(requests: impl Iterator<Item = &'a ApprovalRequest>) -> Option<&'a ApprovalRequest> {
    requests.max_by(|left, right| {
        left.created_at.cmp(&right.created_at).then_with(|| left.name.cmp(&right.name))
    })
}

/// Formats sequence numbers into request names such as `SAR/00042`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNaming {
    pub sequence_code: String,
    pub prefix: String,
    pub padding: usize,
}

impl Default for RequestNaming {
    fn default() -> Self {
        Self {
            sequence_code: "sale.approval.request".to_string(),
            prefix: "SAR/".to_string(),
            padding: 5,
        }
    }
}

impl RequestNaming {
    pub fn format(&self, number: u64) -> String {
        format!("{}{:0width$}", self.prefix, number, width = self.padding)
    }
}
