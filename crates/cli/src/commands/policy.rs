use rust_decimal::Decimal;
use salesgate_core::domain::credit::CreditPolicyId;
use salesgate_core::domain::currency::CurrencyCode;
use salesgate_core::domain::partner::PartnerId;
use salesgate_core::errors::ApplicationError;
use salesgate_workflow::{CreditPolicyUpdate, CreditService, NewCreditPolicy, PolicyCreditView};

use crate::commands::{to_data, with_application, CommandResult};

#[derive(Debug, Clone)]
pub struct PolicyInput {
    pub partner_id: String,
    pub credit_limit: Decimal,
    pub currency: Option<String>,
    pub note: Option<String>,
}

/// Sets the credit limit of a customer's commercial entity. The active
/// policy is updated in place when there is one; otherwise a new active
/// policy is created on the given partner.
pub fn set(input: PolicyInput) -> CommandResult {
    with_application("policy-set", |app, correlation_id| async move {
        match upsert(&app.services.credit, input).await {
            Ok((view, created)) => {
                let verb = if created { "created" } else { "updated" };
                CommandResult::success_with_data(
                    "policy-set",
                    format!(
                        "credit limit policy `{}` {verb}: limit {} {}, remaining {}",
                        view.policy.id,
                        view.projection.credit_limit,
                        view.projection.currency,
                        view.projection.remaining_credit
                    ),
                    to_data(&view),
                )
            }
            Err(error) => {
                CommandResult::from_application_error("policy-set", error, &correlation_id)
            }
        }
    })
}

async fn upsert(
    credit: &CreditService,
    input: PolicyInput,
) -> Result<(PolicyCreditView, bool), ApplicationError> {
    let partner_id = PartnerId(input.partner_id);
    let currency = input.currency.map(CurrencyCode::new);

    let (policy, created) = match credit.find_active_policy(&partner_id).await? {
        Some(active) => {
            let update = CreditPolicyUpdate {
                partner_id: None,
                credit_limit: Some(input.credit_limit),
                currency,
                note: input.note,
            };
            (credit.update_policy(&active.id, update).await?, false)
        }
        None => {
            let new_policy = NewCreditPolicy {
                partner_id,
                credit_limit: input.credit_limit,
                currency,
                note: input.note,
            };
            (credit.create_policy(new_policy).await?, true)
        }
    };

    Ok((credit.policy_view(&policy.id).await?, created))
}

pub fn activate(policy_id: &str) -> CommandResult {
    toggle("policy-activate", policy_id, true)
}

pub fn deactivate(policy_id: &str) -> CommandResult {
    toggle("policy-deactivate", policy_id, false)
}

fn toggle(command: &'static str, policy_id: &str, active: bool) -> CommandResult {
    let policy_id = CreditPolicyId(policy_id.to_string());

    with_application(command, |app, correlation_id| async move {
        let credit = &app.services.credit;
        let result = if active {
            credit.activate_policy(&policy_id).await
        } else {
            credit.deactivate_policy(&policy_id).await
        };

        match result {
            Ok(policy) => {
                let state = if policy.active { "active" } else { "inactive" };
                CommandResult::success_with_data(
                    command,
                    format!("credit limit policy `{}` is {state}", policy.id),
                    to_data(&policy),
                )
            }
            Err(error) => CommandResult::from_application_error(command, error, &correlation_id),
        }
    })
}

/// Which policy `policy show` reports on.
#[derive(Debug, Clone)]
pub enum PolicySelector {
    Id(String),
    /// The active policy governing this partner's commercial entity.
    Partner(String),
}

pub fn show(selector: PolicySelector) -> CommandResult {
    with_application("policy-show", |app, correlation_id| async move {
        let credit = &app.services.credit;
        let view = match selector {
            PolicySelector::Id(id) => credit.policy_view(&CreditPolicyId(id)).await.map(Some),
            PolicySelector::Partner(partner) => {
                match credit.find_active_policy(&PartnerId(partner)).await {
                    Ok(Some(policy)) => credit.policy_view(&policy.id).await.map(Some),
                    Ok(None) => Ok(None),
                    Err(error) => Err(error),
                }
            }
        };

        match view {
            Ok(Some(view)) => CommandResult::success_with_data(
                "policy-show",
                format!(
                    "credit limit {} {}, total due {}, remaining {}",
                    view.projection.credit_limit,
                    view.projection.currency,
                    view.projection.total_due,
                    view.projection.remaining_credit
                ),
                to_data(&view),
            ),
            Ok(None) => CommandResult::success("policy-show", "no active credit limit policy"),
            Err(error) => {
                CommandResult::from_application_error("policy-show", error, &correlation_id)
            }
        }
    })
}
