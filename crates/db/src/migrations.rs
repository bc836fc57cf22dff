use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_in_memory;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "partner",
        "sale_order",
        "invoice",
        "credit_limit_policy",
        "approval_request",
        "sequence",
        "idx_partner_parent_id",
        "idx_sale_order_partner_id",
        "idx_invoice_partner_id",
        "idx_credit_limit_policy_partner_id",
        "idx_approval_request_order_id",
        "idx_approval_request_open_per_order",
    ];

    #[tokio::test]
    async fn migrations_create_managed_schema_objects() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type IN ('table', 'index') AND name = ?",
            )
            .bind(name)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "expected schema object `{name}` to exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_in_memory().await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run should be a no-op");
    }
}
