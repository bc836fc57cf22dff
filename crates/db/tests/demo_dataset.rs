use rust_decimal::Decimal;

use salesgate_core::credit::{project, select_active_policy, total_due};
use salesgate_core::domain::order::{OrderId, OrderState};
use salesgate_core::domain::partner::PartnerId;
use salesgate_db::repositories::{
    CreditPolicyRepository, InvoiceRepository, OrderRepository, PartnerRepository,
    SqlCreditPolicyRepository, SqlInvoiceRepository, SqlOrderRepository, SqlPartnerRepository,
};
use salesgate_db::{connect_in_memory, migrations, DbPool, DemoDataset};

async fn seeded() -> DbPool {
    let pool = connect_in_memory().await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoDataset::load(&pool).await.expect("seed");
    pool
}

#[tokio::test]
async fn sub_account_resolves_to_the_company_scope() {
    let pool = seeded().await;
    let partners = SqlPartnerRepository::new(pool);

    let jane = PartnerId("partner-acme-jane".to_string());
    let commercial =
        partners.commercial_partner_of(&jane).await.expect("resolve").expect("has company");
    assert_eq!(commercial.0, "partner-acme");

    let scope = partners.child_of(&commercial).await.expect("scope");
    assert_eq!(scope.len(), 3);
    assert!(scope.contains(&jane));
}

#[tokio::test]
async fn acme_projection_sums_the_whole_hierarchy() {
    let pool = seeded().await;
    let partners = SqlPartnerRepository::new(pool.clone());
    let invoices = SqlInvoiceRepository::new(pool.clone());
    let policies = SqlCreditPolicyRepository::new(pool);

    let scope = partners.child_of(&PartnerId("partner-acme".to_string())).await.expect("scope");
    let outstanding = invoices.list_outstanding_receivables(&scope).await.expect("invoices");
    let due = total_due(&outstanding);
    assert_eq!(due, Decimal::new(6_500, 0));

    let policy = select_active_policy(policies.list_for_partners(&scope).await.expect("policies"))
        .expect("acme has a policy");
    let projection = project(&policy, due);
    assert_eq!(projection.remaining_credit, Decimal::new(13_500, 0));
}

#[tokio::test]
async fn demo_orders_load_in_their_initial_states() {
    let pool = seeded().await;
    let orders = SqlOrderRepository::new(pool);

    let large = orders
        .find_by_id(&OrderId("order-large".to_string()))
        .await
        .expect("find")
        .expect("seeded");
    assert_eq!(large.amount_total, Decimal::new(12_500, 0));
    assert_eq!(large.state, OrderState::Draft);

    let sent = orders
        .find_by_id(&OrderId("order-sent".to_string()))
        .await
        .expect("find")
        .expect("seeded");
    assert_eq!(sent.state, OrderState::Sent);
}
