use salesgate_core::domain::order::OrderId;
use serde_json::json;

use crate::commands::{to_data, with_application, CommandResult};

/// Credit fields of an order, zeros when its customer has no policy.
pub fn order_credit(order_id: &str) -> CommandResult {
    let order_id = OrderId(order_id.to_string());

    with_application("order-credit", |app, correlation_id| async move {
        match app.services.credit.order_credit_view(&order_id).await {
            Ok(view) => CommandResult::success_with_data(
                "order-credit",
                format!(
                    "order `{order_id}`: total due {}, remaining credit {}",
                    view.credit_total_due, view.credit_remaining
                ),
                to_data(&view),
            ),
            Err(error) => {
                CommandResult::from_application_error("order-credit", error, &correlation_id)
            }
        }
    })
}

/// Approval requests raised for an order, newest first.
pub fn approvals(order_id: &str) -> CommandResult {
    let order_id = OrderId(order_id.to_string());

    with_application("approvals", |app, correlation_id| async move {
        let approvals = &app.services.approvals;
        let listed = match approvals.list_for_order(&order_id).await {
            Ok(requests) => requests,
            Err(error) => {
                return CommandResult::from_application_error("approvals", error, &correlation_id);
            }
        };
        let count = match approvals.count_for_order(&order_id).await {
            Ok(count) => count,
            Err(error) => {
                return CommandResult::from_application_error("approvals", error, &correlation_id);
            }
        };

        CommandResult::success_with_data(
            "approvals",
            format!("order `{order_id}` has {count} approval request(s)"),
            Some(json!({ "count": count, "requests": listed })),
        )
    })
}
