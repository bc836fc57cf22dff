use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Demo orders and the gate outcome each one is meant to show.
const DEMO_SCENARIOS: &[DemoScenario] = &[
    DemoScenario {
        order_id: "order-small",
        partner_id: "partner-acme-jane",
        state: "draft",
        amount_total: "2500.00",
        description: "Below the approval threshold and within credit",
    },
    DemoScenario {
        order_id: "order-large",
        partner_id: "partner-acme-jane",
        state: "draft",
        amount_total: "12500.00",
        description: "Needs approval, then fits the remaining credit",
    },
    DemoScenario {
        order_id: "order-sent",
        partner_id: "partner-acme",
        state: "sent",
        amount_total: "3000.00",
        description: "Quotation already sent to the customer",
    },
    DemoScenario {
        order_id: "order-globex",
        partner_id: "partner-globex",
        state: "draft",
        amount_total: "4500.00",
        description: "Blocked by the customer's credit limit",
    },
];

const DEMO_PARTNER_IDS: &[&str] =
    &["partner-acme", "partner-acme-billing", "partner-acme-jane", "partner-globex"];

const DEMO_INVOICE_IDS: &[&str] =
    &["inv-acme-001", "inv-acme-002", "inv-acme-003", "inv-acme-004", "inv-globex-001"];

const DEMO_POLICY_IDS: &[&str] = &["policy-acme", "policy-globex"];

/// Deterministic dataset for demos and end-to-end tests: a customer
/// hierarchy with open invoices, one active policy per customer, and one
/// order per gate outcome.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Rows that already exist are left untouched, so
    /// loading twice is harmless.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let orders_seeded = DEMO_SCENARIOS
            .iter()
            .map(|scenario| OrderSeedInfo {
                order_id: scenario.order_id,
                description: scenario.description,
            })
            .collect();

        Ok(SeedResult { orders_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("partners", count_ids(pool, "partner", DEMO_PARTNER_IDS).await?));
        checks.push(("invoices", count_ids(pool, "invoice", DEMO_INVOICE_IDS).await?));
        checks.push((
            "credit-policies",
            count_ids(pool, "credit_limit_policy", DEMO_POLICY_IDS).await?,
        ));

        for scenario in DEMO_SCENARIOS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sale_order
                 WHERE id = ?1 AND partner_id = ?2 AND state = ?3 AND amount_total = ?4)",
            )
            .bind(scenario.order_id)
            .bind(scenario.partner_id)
            .bind(scenario.state)
            .bind(scenario.amount_total)
            .fetch_one(pool)
            .await?;
            checks.push((scenario.order_id, present == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows, including approval requests raised against
    /// the demo orders.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let order_ids: Vec<&str> = DEMO_SCENARIOS.iter().map(|scenario| scenario.order_id).collect();
        let mut tx = pool.begin().await?;

        for (table, column, ids) in [
            ("approval_request", "order_id", order_ids.as_slice()),
            ("sale_order", "id", order_ids.as_slice()),
            ("credit_limit_policy", "id", DEMO_POLICY_IDS),
            ("invoice", "id", DEMO_INVOICE_IDS),
            ("partner", "id", DEMO_PARTNER_IDS),
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE {column} IN {}", sql_array_from_ids(ids)))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<bool, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(usize::try_from(count).is_ok_and(|count| count == ids.len()))
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, Copy)]
struct DemoScenario {
    order_id: &'static str,
    partner_id: &'static str,
    state: &'static str,
    amount_total: &'static str,
    description: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub orders_seeded: Vec<OrderSeedInfo>,
}

#[derive(Debug)]
pub struct OrderSeedInfo {
    pub order_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
