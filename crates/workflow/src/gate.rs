use chrono::Utc;
use tracing::{debug, info, warn};

use salesgate_core::approvals::{
    decide, ApprovalDecision, BlockAction, ConfirmMode, RequestNaming, APPROVAL_THRESHOLD,
};
use salesgate_core::domain::actor::Actor;
use salesgate_core::domain::approval::{ApprovalRequest, ApprovalState, Transition};
use salesgate_core::domain::order::{OrderId, OrderState, SaleOrder};
use salesgate_core::errors::{ApplicationError, DomainError};
use salesgate_db::repositories::OpenRequestInsert;

use crate::approvals::insert_named;
use crate::credit::CreditService;
use crate::stores::Stores;

/// Runs the approval check and then the credit check before moving an
/// order to `sale`. A blocked confirm leaves the order untouched, though an
/// approval request it raised stays stored.
#[derive(Clone)]
pub struct OrderConfirmationGate {
    stores: Stores,
    credit: CreditService,
    naming: RequestNaming,
}

impl OrderConfirmationGate {
    pub fn new(stores: Stores, credit: CreditService, naming: RequestNaming) -> Self {
        Self { stores, credit, naming }
    }

    pub async fn confirm(
        &self,
        order_id: &OrderId,
        actor: &Actor,
        mode: ConfirmMode,
    ) -> Result<SaleOrder, ApplicationError> {
        let mut order = self.stores.orders.find_by_id(order_id).await?.ok_or_else(|| {
            ApplicationError::NotFound { entity: "sale_order", id: order_id.to_string() }
        })?;

        if !order.state.is_pre_confirmation() {
            warn!(
                event_name = "order.confirm.invalid_state",
                order_id = %order.id,
                state = order.state.as_str(),
                "order is not awaiting confirmation"
            );
            return Err(DomainError::InvalidOrderTransition {
                order_id: order.id.clone(),
                from: order.state,
                to: OrderState::Sale,
            }
            .into());
        }

        self.check_approval_on_confirm(&order, actor, mode).await?;
        self.credit.check_credit_on_confirm(&order).await?;

        let from = order.state;
        order.confirm(Utc::now())?;
        if !self.stores.orders.save_confirmation(&order).await? {
            warn!(
                event_name = "order.confirm.lost_race",
                order_id = %order.id,
                "order left the quotation states during confirmation"
            );
            let current =
                self.stores.orders.find_by_id(order_id).await?.map_or(from, |stored| stored.state);
            return Err(DomainError::InvalidOrderTransition {
                order_id: order.id.clone(),
                from: current,
                to: OrderState::Sale,
            }
            .into());
        }

        info!(
            event_name = "order.confirmed",
            order_id = %order.id,
            order_name = %order.name,
            user_id = %actor.user_id,
            bypass_approval = mode == ConfirmMode::BypassApproval,
            "sale order confirmed"
        );
        Ok(order)
    }

    /// Fails with `ApprovalRequired` when a high-value order has no approved
    /// request, after making sure a submitted request exists for it.
    pub async fn check_approval_on_confirm(
        &self,
        order: &SaleOrder,
        actor: &Actor,
        mode: ConfirmMode,
    ) -> Result<(), ApplicationError> {
        let requests = match mode {
            ConfirmMode::BypassApproval => Vec::new(),
            ConfirmMode::Enforce => self.stores.approvals.list_for_order(&order.id).await?,
        };

        let action = match decide(order, mode, &requests) {
            ApprovalDecision::Proceed(reason) => {
                debug!(order_id = %order.id, ?reason, "approval check passed");
                return Ok(());
            }
            ApprovalDecision::Block(action) => action,
        };

        let request = match action {
            BlockAction::SubmitDraft { request_id } | BlockAction::AwaitSubmitted { request_id } => {
                let request = requests
                    .into_iter()
                    .find(|request| request.id == request_id)
                    .ok_or_else(|| {
                        DomainError::InvariantViolation(format!(
                            "approval request `{request_id}` vanished during the approval check"
                        ))
                    })?;
                self.ensure_submitted(request).await?
            }
            BlockAction::CreateSubmitted => {
                let fresh = ApprovalRequest::for_order(
                    order,
                    actor.user_id.clone(),
                    ApprovalState::Submitted,
                    Utc::now(),
                );
                match insert_named(&self.stores, &self.naming, fresh).await? {
                    OpenRequestInsert::Inserted(request) => {
                        info!(
                            event_name = "approval.request.created",
                            order_id = %order.id,
                            request_name = %request.name,
                            user_id = %actor.user_id,
                            "approval request raised by confirmation"
                        );
                        request
                    }
                    OpenRequestInsert::Existing(request) => self.ensure_submitted(request).await?,
                }
            }
        };

        warn!(
            event_name = "order.confirm.approval_required",
            order_id = %order.id,
            request_name = %request.name,
            amount_total = %order.amount_total,
            "order blocked pending approval"
        );
        Err(DomainError::ApprovalRequired {
            order_id: order.id.clone(),
            request_id: request.id,
            request_name: request.name,
            threshold: APPROVAL_THRESHOLD,
        }
        .into())
    }

    async fn ensure_submitted(
        &self,
        mut request: ApprovalRequest,
    ) -> Result<ApprovalRequest, ApplicationError> {
        if let Transition::Applied { from, .. } = request.submit(Utc::now()) {
            if !self.stores.approvals.save_transition(&request, from).await? {
                return self.stores.approvals.find_by_id(&request.id).await?.ok_or_else(|| {
                    ApplicationError::NotFound {
                        entity: "approval_request",
                        id: request.id.to_string(),
                    }
                });
            }
            info!(
                event_name = "approval.request.submitted",
                request_name = %request.name,
                order_id = %request.order_id,
                "draft approval request submitted by confirmation"
            );
        }
        Ok(request)
    }
}
