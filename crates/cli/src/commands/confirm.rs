use salesgate_core::approvals::ConfirmMode;
use salesgate_core::domain::order::OrderId;
use salesgate_core::errors::{ApplicationError, DomainError};
use serde_json::json;

use crate::commands::{to_data, with_application, ActorArgs, CommandResult};

/// Confirms a quotation, raising an approval request when the order needs
/// one. The approval check is never bypassed from here.
pub fn run(order_id: &str, actor: &ActorArgs) -> CommandResult {
    let order_id = OrderId(order_id.to_string());
    let actor = actor.actor();

    with_application("confirm", |app, correlation_id| async move {
        match app.services.gate.confirm(&order_id, &actor, ConfirmMode::Enforce).await {
            Ok(order) => CommandResult::success_with_data(
                "confirm",
                format!("sale order `{}` confirmed", order.id),
                to_data(&order),
            ),
            Err(error) => {
                let data = match &error {
                    ApplicationError::Domain(DomainError::ApprovalRequired {
                        request_id,
                        request_name,
                        ..
                    }) => Some(json!({ "request_id": request_id, "request_name": request_name })),
                    _ => None,
                };
                CommandResult::from_application_error_with_data(
                    "confirm",
                    error,
                    &correlation_id,
                    data,
                )
            }
        }
    })
}
