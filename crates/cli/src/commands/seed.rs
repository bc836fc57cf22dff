use salesgate_db::fixtures::OrderSeedInfo;
use salesgate_db::DemoDataset;

use crate::commands::{with_application, CommandResult};

pub fn run() -> CommandResult {
    with_application("seed", |app, _correlation_id| async move {
        let seeded = match DemoDataset::load(&app.db_pool).await {
            Ok(seeded) => seeded,
            Err(error) => {
                return CommandResult::failure("seed", "seed_execution", error.to_string(), 5);
            }
        };

        let verification = match DemoDataset::verify(&app.db_pool).await {
            Ok(verification) => verification,
            Err(error) => {
                return CommandResult::failure("seed", "seed_verification", error.to_string(), 6);
            }
        };

        if !verification.all_present {
            return CommandResult::failure(
                "seed",
                "seed_verification",
                verification_failure_message(&verification.checks),
                6,
            );
        }

        CommandResult::success("seed", summary(&seeded.orders_seeded))
    })
}

fn summary(orders: &[OrderSeedInfo]) -> String {
    let lines: Vec<String> = orders
        .iter()
        .map(|order| format!("  - {}: {}", order.order_id, order.description))
        .collect();
    format!("demo dataset loaded with {} sale orders:\n{}", orders.len(), lines.join("\n"))
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "some demo data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("partners", true), ("order-large", false), ("credit-policies", false)];

        assert_eq!(
            verification_failure_message(&checks),
            "seed verification failed for checks: order-large, credit-policies"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("partners", true), ("invoices", true)];

        assert_eq!(verification_failure_message(&checks), "some demo data failed to load");
    }
}
