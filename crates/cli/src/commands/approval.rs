use salesgate_core::domain::approval::ApprovalId;
use salesgate_core::domain::order::OrderId;
use salesgate_db::repositories::OpenRequestInsert;
use salesgate_workflow::ApproveOutcome;
use serde_json::json;

use crate::commands::{to_data, with_application, ActorArgs, CommandResult};

/// Opens a draft request for an order by hand.
pub fn request(order_id: &str, actor: &ActorArgs) -> CommandResult {
    let order_id = OrderId(order_id.to_string());
    let actor = actor.actor();

    with_application("request", |app, correlation_id| async move {
        match app.services.approvals.create_request(&order_id, &actor).await {
            Ok(OpenRequestInsert::Inserted(request)) => CommandResult::success_with_data(
                "request",
                format!("approval request {} created in draft", request.name),
                to_data(&request),
            ),
            Ok(OpenRequestInsert::Existing(request)) => CommandResult::success_with_data(
                "request",
                format!(
                    "order `{order_id}` already has open approval request {} ({})",
                    request.name,
                    request.state.as_str()
                ),
                to_data(&request),
            ),
            Err(error) => CommandResult::from_application_error("request", error, &correlation_id),
        }
    })
}

pub fn submit(request_id: &str, actor: &ActorArgs) -> CommandResult {
    let request_id = ApprovalId(request_id.to_string());
    let actor = actor.actor();

    with_application("submit", |app, correlation_id| async move {
        match app.services.approvals.submit(&request_id, &actor).await {
            Ok((request, transition)) => {
                let message = if transition.applied() {
                    format!("approval request {} submitted", request.name)
                } else {
                    format!(
                        "approval request {} left unchanged in state {}",
                        request.name,
                        request.state.as_str()
                    )
                };
                CommandResult::success_with_data("submit", message, to_data(&request))
            }
            Err(error) => CommandResult::from_application_error("submit", error, &correlation_id),
        }
    })
}

/// Approves a request and reports what happened to its order.
pub fn approve(request_id: &str, actor: &ActorArgs) -> CommandResult {
    let request_id = ApprovalId(request_id.to_string());
    let actor = actor.actor();

    with_application("approve", |app, correlation_id| async move {
        let outcome = match app.services.approvals.approve(&request_id, &actor).await {
            Ok(outcome) => outcome,
            Err(error) => {
                return CommandResult::from_application_error("approve", error, &correlation_id);
            }
        };

        let request = outcome.request();
        let data = json!({
            "outcome": outcome.as_str(),
            "request": request,
        });

        match &outcome {
            ApproveOutcome::Confirmed { order, .. } => CommandResult::success_with_data(
                "approve",
                format!("approval request {} approved; order `{}` confirmed", request.name, order.id),
                Some(data),
            ),
            ApproveOutcome::OrderNotPending { order_state, .. } => {
                CommandResult::success_with_data(
                    "approve",
                    format!(
                        "approval request {} approved; order is already {}",
                        request.name,
                        order_state.as_str()
                    ),
                    Some(data),
                )
            }
            ApproveOutcome::ConfirmationBlocked { error, .. } => {
                CommandResult::failure_with_data(
                    "approve",
                    error.kind(),
                    format!(
                        "approval request {} approved but the order was not confirmed: {error}",
                        request.name
                    ),
                    1,
                    Some(data),
                )
            }
            ApproveOutcome::Skipped { .. } => CommandResult::success_with_data(
                "approve",
                format!(
                    "approval request {} left unchanged in state {}",
                    request.name,
                    request.state.as_str()
                ),
                Some(data),
            ),
        }
    })
}

pub fn reject(request_id: &str, reason: Option<&str>, actor: &ActorArgs) -> CommandResult {
    let request_id = ApprovalId(request_id.to_string());
    let reason = reason.map(str::to_string);
    let actor = actor.actor();

    with_application("reject", |app, correlation_id| async move {
        match app.services.approvals.reject(&request_id, &actor, reason.as_deref()).await {
            Ok((request, transition)) => {
                let message = if transition.applied() {
                    format!("approval request {} rejected", request.name)
                } else {
                    format!(
                        "approval request {} left unchanged in state {}",
                        request.name,
                        request.state.as_str()
                    )
                };
                CommandResult::success_with_data("reject", message, to_data(&request))
            }
            Err(error) => CommandResult::from_application_error("reject", error, &correlation_id),
        }
    })
}
