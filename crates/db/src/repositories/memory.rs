use std::collections::HashMap;

use tokio::sync::RwLock;

use salesgate_core::credit::ensure_single_active;
use salesgate_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalState};
use salesgate_core::domain::credit::{CreditLimitPolicy, CreditPolicyId};
use salesgate_core::domain::invoice::Invoice;
use salesgate_core::domain::order::{OrderId, SaleOrder};
use salesgate_core::domain::partner::{Partner, PartnerHierarchy, PartnerId};

use super::{
    ApprovalRepository, CreditPolicyRepository, InvoiceRepository, OpenRequestInsert,
    OrderRepository, PartnerRepository, RepositoryError, SequenceRepository,
};

#[derive(Default)]
pub struct InMemoryPartnerRepository {
    partners: RwLock<HashMap<String, Partner>>,
}

impl InMemoryPartnerRepository {
    async fn hierarchy(&self) -> PartnerHierarchy {
        let partners = self.partners.read().await;
        PartnerHierarchy::new(partners.values().cloned())
    }
}

#[async_trait::async_trait]
impl PartnerRepository for InMemoryPartnerRepository {
    async fn find_by_id(&self, id: &PartnerId) -> Result<Option<Partner>, RepositoryError> {
        let partners = self.partners.read().await;
        Ok(partners.get(&id.0).cloned())
    }

    async fn save(&self, partner: Partner) -> Result<(), RepositoryError> {
        let mut partners = self.partners.write().await;
        partners.insert(partner.id.0.clone(), partner);
        Ok(())
    }

    async fn commercial_partner_of(
        &self,
        id: &PartnerId,
    ) -> Result<Option<PartnerId>, RepositoryError> {
        Ok(self.hierarchy().await.commercial_partner_of(id))
    }

    async fn child_of(&self, root: &PartnerId) -> Result<Vec<PartnerId>, RepositoryError> {
        Ok(self.hierarchy().await.child_of(root))
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, SaleOrder>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<SaleOrder>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn save(&self, order: SaleOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn save_confirmation(&self, order: &SaleOrder) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id.0) {
            Some(stored) if stored.state.is_pre_confirmation() => {
                stored.state = order.state;
                stored.confirmed_at = order.confirmed_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryInvoiceRepository {
    invoices: RwLock<HashMap<String, Invoice>>,
}

#[async_trait::async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn save(&self, invoice: Invoice) -> Result<(), RepositoryError> {
        let mut invoices = self.invoices.write().await;
        invoices.insert(invoice.id.0.clone(), invoice);
        Ok(())
    }

    async fn list_outstanding_receivables(
        &self,
        partners: &[PartnerId],
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let invoices = self.invoices.read().await;
        let mut outstanding: Vec<Invoice> = invoices
            .values()
            .filter(|invoice| partners.contains(&invoice.partner_id))
            .filter(|invoice| invoice.is_outstanding_receivable())
            .cloned()
            .collect();
        outstanding.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(outstanding)
    }
}

#[derive(Default)]
pub struct InMemoryCreditPolicyRepository {
    policies: RwLock<HashMap<String, CreditLimitPolicy>>,
}

fn newest_first(policies: &mut [CreditLimitPolicy]) {
    policies.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
    });
}

#[async_trait::async_trait]
impl CreditPolicyRepository for InMemoryCreditPolicyRepository {
    async fn find_by_id(
        &self,
        id: &CreditPolicyId,
    ) -> Result<Option<CreditLimitPolicy>, RepositoryError> {
        let policies = self.policies.read().await;
        Ok(policies.get(&id.0).cloned())
    }

    async fn list_for_partners(
        &self,
        partners: &[PartnerId],
    ) -> Result<Vec<CreditLimitPolicy>, RepositoryError> {
        let policies = self.policies.read().await;
        let mut listed: Vec<CreditLimitPolicy> = policies
            .values()
            .filter(|policy| partners.contains(&policy.partner_id))
            .cloned()
            .collect();
        newest_first(&mut listed);
        Ok(listed)
    }

    async fn save_guarded(
        &self,
        policy: CreditLimitPolicy,
        commercial_partner_id: &PartnerId,
        scope: &[PartnerId],
    ) -> Result<(), RepositoryError> {
        // Check and write under one lock.
        let mut policies = self.policies.write().await;
        let in_scope: Vec<CreditLimitPolicy> = policies
            .values()
            .filter(|stored| scope.contains(&stored.partner_id))
            .cloned()
            .collect();
        ensure_single_active(&policy, commercial_partner_id, &in_scope)?;

        let created_at = policies.get(&policy.id.0).map(|stored| stored.created_at);
        let mut policy = policy;
        if let Some(created_at) = created_at {
            policy.created_at = created_at;
        }
        policies.insert(policy.id.0.clone(), policy);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRepository {
    approvals: RwLock<HashMap<String, ApprovalRequest>>,
}

#[async_trait::async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn find_by_id(
        &self,
        id: &ApprovalId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let approvals = self.approvals.read().await;
        Ok(approvals.get(&id.0).cloned())
    }

    async fn list_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let approvals = self.approvals.read().await;
        let mut listed: Vec<ApprovalRequest> =
            approvals.values().filter(|request| &request.order_id == order_id).cloned().collect();
        listed.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.name.cmp(&left.name))
        });
        Ok(listed)
    }

    async fn count_for_order(&self, order_id: &OrderId) -> Result<u64, RepositoryError> {
        let approvals = self.approvals.read().await;
        Ok(approvals.values().filter(|request| &request.order_id == order_id).count() as u64)
    }

    async fn insert_open(
        &self,
        request: ApprovalRequest,
    ) -> Result<OpenRequestInsert, RepositoryError> {
        let mut approvals = self.approvals.write().await;
        if request.state.is_open() {
            let existing = approvals
                .values()
                .find(|stored| stored.order_id == request.order_id && stored.state.is_open());
            if let Some(existing) = existing {
                return Ok(OpenRequestInsert::Existing(existing.clone()));
            }
        }
        approvals.insert(request.id.0.clone(), request.clone());
        Ok(OpenRequestInsert::Inserted(request))
    }

    async fn save_transition(
        &self,
        request: &ApprovalRequest,
        from: ApprovalState,
    ) -> Result<bool, RepositoryError> {
        let mut approvals = self.approvals.write().await;
        match approvals.get_mut(&request.id.0) {
            Some(stored) if stored.state == from => {
                stored.approved_by = request.approved_by.clone();
                stored.state = request.state;
                stored.reject_reason = request.reject_reason.clone();
                stored.updated_at = request.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemorySequenceRepository {
    next: RwLock<HashMap<String, u64>>,
}

#[async_trait::async_trait]
impl SequenceRepository for InMemorySequenceRepository {
    async fn next_value(&self, code: &str) -> Result<u64, RepositoryError> {
        let mut next = self.next.write().await;
        let slot = next.entry(code.to_string()).or_insert(1);
        let value = *slot;
        *slot += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use salesgate_core::domain::actor::UserId;
    use salesgate_core::domain::approval::{ApprovalRequest, ApprovalState};
    use salesgate_core::domain::credit::CreditLimitPolicy;
    use salesgate_core::domain::currency::CurrencyCode;
    use salesgate_core::domain::invoice::{Invoice, InvoiceId, InvoiceState, MoveType};
    use salesgate_core::domain::order::{OrderId, OrderState, SaleOrder};
    use salesgate_core::domain::partner::{Partner, PartnerId};
    use salesgate_core::errors::DomainError;

    use crate::repositories::{
        ApprovalRepository, CreditPolicyRepository, InMemoryApprovalRepository,
        InMemoryCreditPolicyRepository, InMemoryInvoiceRepository, InMemoryPartnerRepository,
        InMemoryOrderRepository, InMemorySequenceRepository, InvoiceRepository, OpenRequestInsert,
        OrderRepository, PartnerRepository, RepositoryError, SequenceRepository,
    };

    fn partner(id: &str, parent: Option<&str>, is_company: bool) -> Partner {
        Partner {
            id: PartnerId(id.to_string()),
            name: id.to_string(),
            parent_id: parent.map(|p| PartnerId(p.to_string())),
            is_company,
        }
    }

    fn big_order() -> SaleOrder {
        SaleOrder {
            id: OrderId("SO-1".to_string()),
            name: "S00001".to_string(),
            partner_id: PartnerId("acme".to_string()),
            currency: CurrencyCode::new("USD"),
            amount_total: Decimal::new(15_000, 0),
            state: OrderState::Draft,
            confirmed_at: None,
        }
    }

    #[tokio::test]
    async fn partner_hierarchy_queries() {
        let repo = InMemoryPartnerRepository::default();
        repo.save(partner("acme", None, true)).await.expect("save");
        repo.save(partner("acme-billing", Some("acme"), false)).await.expect("save");
        repo.save(partner("jane", Some("acme-billing"), false)).await.expect("save");

        let commercial =
            repo.commercial_partner_of(&PartnerId("jane".to_string())).await.expect("resolve");
        assert_eq!(commercial, Some(PartnerId("acme".to_string())));

        let scope = repo.child_of(&PartnerId("acme".to_string())).await.expect("child_of");
        assert_eq!(scope.len(), 3);
    }

    #[tokio::test]
    async fn invoices_filter_to_outstanding_in_scope() {
        let repo = InMemoryInvoiceRepository::default();
        for (id, partner, state, residual) in [
            ("INV-1", "acme", InvoiceState::Posted, 100),
            ("INV-2", "acme", InvoiceState::Draft, 100),
            ("INV-3", "globex", InvoiceState::Posted, 100),
        ] {
            repo.save(Invoice {
                id: InvoiceId(id.to_string()),
                partner_id: PartnerId(partner.to_string()),
                move_type: MoveType::OutInvoice,
                state,
                currency: CurrencyCode::new("USD"),
                amount_residual: Decimal::new(residual, 0),
            })
            .await
            .expect("save");
        }

        let listed = repo
            .list_outstanding_receivables(&[PartnerId("acme".to_string())])
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id.0, "INV-1");
    }

    #[tokio::test]
    async fn credit_policy_guard_matches_sql_behaviour() {
        let repo = InMemoryCreditPolicyRepository::default();
        let acme = PartnerId("acme".to_string());
        let scope = vec![acme.clone(), PartnerId("acme-billing".to_string())];
        let first = CreditLimitPolicy::new(
            acme.clone(),
            Decimal::new(20_000, 0),
            CurrencyCode::new("USD"),
            None,
            Utc::now(),
        );
        repo.save_guarded(first.clone(), &acme, &scope).await.expect("first");

        let second = CreditLimitPolicy::new(
            PartnerId("acme-billing".to_string()),
            Decimal::new(1_000, 0),
            CurrencyCode::new("USD"),
            None,
            Utc::now(),
        );
        let error = repo.save_guarded(second, &acme, &scope).await.expect_err("duplicate");
        assert!(matches!(
            error,
            RepositoryError::Invariant(DomainError::DuplicateActivePolicy { .. })
        ));
        assert_eq!(repo.list_for_partners(&scope).await.expect("list").len(), 1);

        let mut updated = first;
        updated.credit_limit = Decimal::new(25_000, 0);
        repo.save_guarded(updated.clone(), &acme, &scope).await.expect("update in place");
        let stored = repo.find_by_id(&updated.id).await.expect("find").expect("exists");
        assert_eq!(stored.credit_limit, Decimal::new(25_000, 0));
    }

    #[tokio::test]
    async fn approvals_keep_one_open_request_per_order() {
        let repo = InMemoryApprovalRepository::default();
        let order = big_order();
        let first =
            ApprovalRequest::for_order(&order, UserId("rep".to_string()), ApprovalState::Submitted, Utc::now());
        repo.insert_open(first.clone()).await.expect("first");

        let second =
            ApprovalRequest::for_order(&order, UserId("rep".to_string()), ApprovalState::Draft, Utc::now());
        assert_eq!(
            repo.insert_open(second).await.expect("second"),
            OpenRequestInsert::Existing(first.clone())
        );
        assert_eq!(repo.count_for_order(&order.id).await.expect("count"), 1);

        let mut renamed = first.clone();
        renamed.name = "SAR/99999".to_string();
        renamed.approve(&UserId("manager".to_string()), Utc::now());
        assert!(repo.save_transition(&renamed, ApprovalState::Submitted).await.expect("save"));
        let stored = repo.find_by_id(&first.id).await.expect("find").expect("exists");
        assert_eq!(stored.name, first.name);
        assert_eq!(stored.state, ApprovalState::Approved);
        assert_eq!(repo.list_for_order(&order.id).await.expect("list").len(), 1);

        let mut late = first.clone();
        late.reject(&UserId("other".to_string()), Some("no"), Utc::now()).expect("reject");
        assert!(!repo.save_transition(&late, ApprovalState::Submitted).await.expect("stale"));
        let stored = repo.find_by_id(&first.id).await.expect("find").expect("exists");
        assert_eq!(stored.state, ApprovalState::Approved);
    }

    #[tokio::test]
    async fn order_confirmation_only_lands_on_quotations() {
        let repo = InMemoryOrderRepository::default();
        let mut order = big_order();
        repo.save(order.clone()).await.expect("save");

        order.confirm(Utc::now()).expect("confirm");
        assert!(repo.save_confirmation(&order).await.expect("first"));
        assert!(!repo.save_confirmation(&order).await.expect("second"));

        let mut cancelled = big_order();
        cancelled.id = OrderId("SO-2".to_string());
        cancelled.state = OrderState::Cancel;
        repo.save(cancelled.clone()).await.expect("save");
        cancelled.state = OrderState::Sale;
        assert!(!repo.save_confirmation(&cancelled).await.expect("cancelled"));
        let stored = repo.find_by_id(&cancelled.id).await.expect("find").expect("exists");
        assert_eq!(stored.state, OrderState::Cancel);
    }

    #[tokio::test]
    async fn sequences_count_from_one() {
        let repo = InMemorySequenceRepository::default();
        assert_eq!(repo.next_value("sale.approval.request").await.expect("next"), 1);
        assert_eq!(repo.next_value("sale.approval.request").await.expect("next"), 2);
        assert_eq!(repo.next_value("other").await.expect("next"), 1);
    }
}
