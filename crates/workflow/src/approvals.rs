use chrono::Utc;
use tracing::{info, warn};

use salesgate_core::approvals::{ConfirmMode, RequestNaming};
use salesgate_core::domain::actor::{Actor, SALES_APPROVAL_MANAGER};
use salesgate_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalState, Transition};
use salesgate_core::domain::order::{OrderId, OrderState, SaleOrder};
use salesgate_core::errors::{ApplicationError, DomainError};
use salesgate_db::repositories::OpenRequestInsert;

use crate::gate::OrderConfirmationGate;
use crate::stores::Stores;

/// Draws the request's name from the sequence on first persistence, then
/// inserts it as the order's open request.
pub(crate) async fn insert_named(
    stores: &Stores,
    naming: &RequestNaming,
    mut request: ApprovalRequest,
) -> Result<OpenRequestInsert, ApplicationError> {
    if !request.has_assigned_name() {
        let number = stores.sequences.next_value(&naming.sequence_code).await?;
        request.assign_name(naming.format(number));
    }
    Ok(stores.approvals.insert_open(request).await?)
}

#[derive(Clone, Debug, PartialEq)]
pub enum ApproveOutcome {
    /// Approved, and the order was confirmed with the approval check
    /// bypassed.
    Confirmed { request: ApprovalRequest, order: SaleOrder },
    /// Approved; the order had already left the quotation states.
    OrderNotPending { request: ApprovalRequest, order_state: OrderState },
    /// Approved, but the follow-up confirmation failed a credit check. The
    /// approval stands and a later confirm will not ask for another one.
    ConfirmationBlocked { request: ApprovalRequest, error: DomainError },
    /// The request was not awaiting a decision; nothing changed.
    Skipped { request: ApprovalRequest },
}

impl ApproveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::OrderNotPending { .. } => "order_not_pending",
            Self::ConfirmationBlocked { .. } => "confirmation_blocked",
            Self::Skipped { .. } => "skipped",
        }
    }

    pub fn request(&self) -> &ApprovalRequest {
        match self {
            Self::Confirmed { request, .. }
            | Self::OrderNotPending { request, .. }
            | Self::ConfirmationBlocked { request, .. }
            | Self::Skipped { request } => request,
        }
    }
}

#[derive(Clone)]
pub struct ApprovalService {
    stores: Stores,
    gate: OrderConfirmationGate,
    naming: RequestNaming,
}

impl ApprovalService {
    pub fn new(stores: Stores, gate: OrderConfirmationGate, naming: RequestNaming) -> Self {
        Self { stores, gate, naming }
    }

    /// Opens a draft request for an order by hand. When the order already
    /// has an open request, that one is returned instead.
    pub async fn create_request(
        &self,
        order_id: &OrderId,
        actor: &Actor,
    ) -> Result<OpenRequestInsert, ApplicationError> {
        let order = self.load_order(order_id).await?;
        let draft = ApprovalRequest::for_order(
            &order,
            actor.user_id.clone(),
            ApprovalState::Draft,
            Utc::now(),
        );
        let outcome = insert_named(&self.stores, &self.naming, draft).await?;

        if let OpenRequestInsert::Inserted(request) = &outcome {
            info!(
                event_name = "approval.request.created",
                order_id = %order.id,
                request_name = %request.name,
                user_id = %actor.user_id,
                "draft approval request created"
            );
        }
        Ok(outcome)
    }

    pub async fn submit(
        &self,
        request_id: &ApprovalId,
        actor: &Actor,
    ) -> Result<(ApprovalRequest, Transition), ApplicationError> {
        let mut request = self.load_request(request_id).await?;
        let transition = request.submit(Utc::now());
        let (request, transition) = self.persist(request, transition).await?;

        if transition.applied() {
            info!(
                event_name = "approval.request.submitted",
                request_name = %request.name,
                order_id = %request.order_id,
                user_id = %actor.user_id,
                "approval request submitted"
            );
        }
        Ok((request, transition))
    }

    /// Approves a submitted request and, if its order is still a quotation,
    /// confirms the order once with the approval check bypassed.
    pub async fn approve(
        &self,
        request_id: &ApprovalId,
        actor: &Actor,
    ) -> Result<ApproveOutcome, ApplicationError> {
        require_manager(actor)?;
        let mut request = self.load_request(request_id).await?;
        let transition = request.approve(&actor.user_id, Utc::now());
        let (request, transition) = self.persist(request, transition).await?;

        if !transition.applied() {
            return Ok(ApproveOutcome::Skipped { request });
        }
        info!(
            event_name = "approval.request.approved",
            request_name = %request.name,
            order_id = %request.order_id,
            user_id = %actor.user_id,
            "approval request approved"
        );

        let order = self.load_order(&request.order_id).await?;
        if !order.state.is_pre_confirmation() {
            return Ok(ApproveOutcome::OrderNotPending { request, order_state: order.state });
        }

        match self.gate.confirm(&order.id, actor, ConfirmMode::BypassApproval).await {
            Ok(order) => Ok(ApproveOutcome::Confirmed { request, order }),
            Err(ApplicationError::Domain(error)) => {
                warn!(
                    event_name = "approval.confirm.blocked",
                    request_name = %request.name,
                    order_id = %request.order_id,
                    error_kind = error.kind(),
                    "approved order could not be confirmed"
                );
                Ok(ApproveOutcome::ConfirmationBlocked { request, error })
            }
            Err(other) => Err(other),
        }
    }

    pub async fn reject(
        &self,
        request_id: &ApprovalId,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<(ApprovalRequest, Transition), ApplicationError> {
        require_manager(actor)?;
        let mut request = self.load_request(request_id).await?;
        let transition = request.reject(&actor.user_id, reason, Utc::now())?;
        let (request, transition) = self.persist(request, transition).await?;

        if transition.applied() {
            info!(
                event_name = "approval.request.rejected",
                request_name = %request.name,
                order_id = %request.order_id,
                user_id = %actor.user_id,
                "approval request rejected"
            );
        }
        Ok((request, transition))
    }

    /// Requests raised for an order, newest first.
    pub async fn list_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<ApprovalRequest>, ApplicationError> {
        Ok(self.stores.approvals.list_for_order(order_id).await?)
    }

    pub async fn count_for_order(&self, order_id: &OrderId) -> Result<u64, ApplicationError> {
        Ok(self.stores.approvals.count_for_order(order_id).await?)
    }

    /// Writes an applied transition guarded on the state it started from.
    /// When another decision landed first, the stored request is returned
    /// with the transition reported as skipped.
    async fn persist(
        &self,
        request: ApprovalRequest,
        transition: Transition,
    ) -> Result<(ApprovalRequest, Transition), ApplicationError> {
        let Transition::Applied { from, .. } = transition else {
            return Ok((request, transition));
        };
        if self.stores.approvals.save_transition(&request, from).await? {
            return Ok((request, transition));
        }

        let current = self.load_request(&request.id).await?;
        warn!(
            event_name = "approval.request.lost_race",
            request_name = %current.name,
            order_id = %current.order_id,
            state = current.state.as_str(),
            "approval request changed before the decision was written"
        );
        let skipped = Transition::Skipped { state: current.state };
        Ok((current, skipped))
    }

    async fn load_request(&self, id: &ApprovalId) -> Result<ApprovalRequest, ApplicationError> {
        self.stores.approvals.find_by_id(id).await?.ok_or_else(|| ApplicationError::NotFound {
            entity: "approval_request",
            id: id.to_string(),
        })
    }

    async fn load_order(&self, id: &OrderId) -> Result<SaleOrder, ApplicationError> {
        self.stores
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound { entity: "sale_order", id: id.to_string() })
    }
}

fn require_manager(actor: &Actor) -> Result<(), ApplicationError> {
    if actor.has_role(SALES_APPROVAL_MANAGER) {
        return Ok(());
    }
    warn!(
        event_name = "approval.access.denied",
        user_id = %actor.user_id,
        required_role = SALES_APPROVAL_MANAGER,
        "approval decision attempted without the manager role"
    );
    Err(ApplicationError::Forbidden {
        user_id: actor.user_id.to_string(),
        required_role: SALES_APPROVAL_MANAGER.to_string(),
    })
}
