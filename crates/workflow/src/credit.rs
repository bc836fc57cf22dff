//! Credit ceiling lookups, projections and policy administration.
//!
//! Every figure is recomputed from a fresh read of policies and invoices;
//! nothing here caches a projection between calls.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use salesgate_core::credit::{self, OrderCreditView};
use salesgate_core::domain::credit::{CreditLimitPolicy, CreditPolicyId, CreditProjection};
use salesgate_core::domain::currency::CurrencyCode;
use salesgate_core::domain::order::{OrderId, SaleOrder};
use salesgate_core::domain::partner::PartnerId;
use salesgate_core::errors::ApplicationError;

use crate::stores::Stores;

#[derive(Clone, Debug)]
pub struct NewCreditPolicy {
    pub partner_id: PartnerId,
    pub credit_limit: Decimal,
    /// Falls back to the company currency.
    pub currency: Option<CurrencyCode>,
    pub note: Option<String>,
}

/// Fields left as `None` keep their stored value.
#[derive(Clone, Debug, Default)]
pub struct CreditPolicyUpdate {
    pub partner_id: Option<PartnerId>,
    pub credit_limit: Option<Decimal>,
    pub currency: Option<CurrencyCode>,
    pub note: Option<String>,
}

/// A stored policy together with its figures at read time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyCreditView {
    pub policy: CreditLimitPolicy,
    pub projection: CreditProjection,
}

/// The commercial entity of a customer and every partner below it.
struct CreditScope {
    commercial_partner_id: PartnerId,
    partners: Vec<PartnerId>,
}

#[derive(Clone)]
pub struct CreditService {
    stores: Stores,
    company_currency: CurrencyCode,
}

impl CreditService {
    pub fn new(stores: Stores, company_currency: CurrencyCode) -> Self {
        Self { stores, company_currency }
    }

    async fn scope_of(&self, partner_id: &PartnerId) -> Result<CreditScope, ApplicationError> {
        let commercial_partner_id = self
            .stores
            .partners
            .commercial_partner_of(partner_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound {
                entity: "partner",
                id: partner_id.to_string(),
            })?;
        let partners = self.stores.partners.child_of(&commercial_partner_id).await?;

        Ok(CreditScope { commercial_partner_id, partners })
    }

    /// Active policy governing `customer`, looked up across its whole
    /// commercial entity.
    pub async fn find_active_policy(
        &self,
        customer: &PartnerId,
    ) -> Result<Option<CreditLimitPolicy>, ApplicationError> {
        let scope = self.scope_of(customer).await?;
        let candidates = self.stores.policies.list_for_partners(&scope.partners).await?;
        Ok(credit::select_active_policy(candidates))
    }

    /// Outstanding receivables of the policy's commercial entity.
    pub async fn compute_total_due(
        &self,
        policy: &CreditLimitPolicy,
    ) -> Result<Decimal, ApplicationError> {
        let scope = self.scope_of(&policy.partner_id).await?;
        let invoices = self.stores.invoices.list_outstanding_receivables(&scope.partners).await?;
        Ok(credit::total_due(&invoices))
    }

    pub async fn projection(
        &self,
        policy: &CreditLimitPolicy,
    ) -> Result<CreditProjection, ApplicationError> {
        let total_due = self.compute_total_due(policy).await?;
        Ok(credit::project(policy, total_due))
    }

    async fn projection_for_customer(
        &self,
        customer: &PartnerId,
    ) -> Result<Option<CreditProjection>, ApplicationError> {
        match self.find_active_policy(customer).await? {
            Some(policy) => Ok(Some(self.projection(&policy).await?)),
            None => Ok(None),
        }
    }

    /// Confirm-time credit gate for `order`.
    pub async fn check_credit_on_confirm(&self, order: &SaleOrder) -> Result<(), ApplicationError> {
        let projection = self.projection_for_customer(&order.partner_id).await?;

        if let Err(error) = credit::check_order(order, projection.as_ref()) {
            warn!(
                event_name = "credit.check.blocked",
                order_id = %order.id,
                partner_id = %order.partner_id,
                error_kind = error.kind(),
                "order blocked by credit control"
            );
            return Err(error.into());
        }

        Ok(())
    }

    pub async fn policy_view(
        &self,
        policy_id: &CreditPolicyId,
    ) -> Result<PolicyCreditView, ApplicationError> {
        let policy = self.load_policy(policy_id).await?;
        let projection = self.projection(&policy).await?;
        Ok(PolicyCreditView { policy, projection })
    }

    pub async fn order_credit_view(
        &self,
        order_id: &OrderId,
    ) -> Result<OrderCreditView, ApplicationError> {
        let order = self.stores.orders.find_by_id(order_id).await?.ok_or_else(|| {
            ApplicationError::NotFound { entity: "sale_order", id: order_id.to_string() }
        })?;
        let projection = self.projection_for_customer(&order.partner_id).await?;
        Ok(OrderCreditView::from_projection(projection.as_ref()))
    }

    pub async fn create_policy(
        &self,
        input: NewCreditPolicy,
    ) -> Result<CreditLimitPolicy, ApplicationError> {
        let currency = input.currency.unwrap_or_else(|| self.company_currency.clone());
        let policy = CreditLimitPolicy::new(
            input.partner_id,
            input.credit_limit,
            currency,
            input.note,
            Utc::now(),
        );
        self.save(policy).await
    }

    pub async fn update_policy(
        &self,
        policy_id: &CreditPolicyId,
        update: CreditPolicyUpdate,
    ) -> Result<CreditLimitPolicy, ApplicationError> {
        let mut policy = self.load_policy(policy_id).await?;
        if let Some(partner_id) = update.partner_id {
            policy.partner_id = partner_id;
        }
        if let Some(credit_limit) = update.credit_limit {
            policy.credit_limit = credit_limit;
        }
        if let Some(currency) = update.currency {
            policy.currency = currency;
        }
        if let Some(note) = update.note {
            policy.note = Some(note);
        }
        policy.updated_at = Utc::now();
        self.save(policy).await
    }

    pub async fn activate_policy(
        &self,
        policy_id: &CreditPolicyId,
    ) -> Result<CreditLimitPolicy, ApplicationError> {
        self.set_active(policy_id, true).await
    }

    /// Retires a policy. It stays stored for history but no longer limits
    /// confirmations.
    pub async fn deactivate_policy(
        &self,
        policy_id: &CreditPolicyId,
    ) -> Result<CreditLimitPolicy, ApplicationError> {
        self.set_active(policy_id, false).await
    }

    async fn set_active(
        &self,
        policy_id: &CreditPolicyId,
        active: bool,
    ) -> Result<CreditLimitPolicy, ApplicationError> {
        let mut policy = self.load_policy(policy_id).await?;
        if policy.active == active {
            return Ok(policy);
        }
        policy.active = active;
        policy.updated_at = Utc::now();
        self.save(policy).await
    }

    async fn load_policy(
        &self,
        policy_id: &CreditPolicyId,
    ) -> Result<CreditLimitPolicy, ApplicationError> {
        self.stores.policies.find_by_id(policy_id).await?.ok_or_else(|| {
            ApplicationError::NotFound { entity: "credit_limit_policy", id: policy_id.to_string() }
        })
    }

    async fn save(&self, policy: CreditLimitPolicy) -> Result<CreditLimitPolicy, ApplicationError> {
        let scope = self.scope_of(&policy.partner_id).await?;
        self.stores
            .policies
            .save_guarded(policy.clone(), &scope.commercial_partner_id, &scope.partners)
            .await?;

        info!(
            event_name = "credit.policy.saved",
            policy_id = %policy.id,
            partner_id = %policy.partner_id,
            commercial_partner_id = %scope.commercial_partner_id,
            active = policy.active,
            "credit limit policy saved"
        );
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use salesgate_core::domain::currency::CurrencyCode;
    use salesgate_core::domain::partner::{Partner, PartnerId};
    use salesgate_core::errors::{ApplicationError, DomainError};

    use super::{CreditPolicyUpdate, CreditService, NewCreditPolicy};
    use crate::stores::Stores;

    async fn service() -> CreditService {
        let stores = Stores::in_memory();
        for (id, parent, is_company) in
            [("acme", None, true), ("acme-billing", Some("acme"), false)]
        {
            stores
                .partners
                .save(Partner {
                    id: PartnerId(id.to_string()),
                    name: id.to_string(),
                    parent_id: parent.map(|p: &str| PartnerId(p.to_string())),
                    is_company,
                })
                .await
                .expect("partner");
        }
        CreditService::new(stores, CurrencyCode::new("eur"))
    }

    fn new_policy(partner: &str, limit: i64) -> NewCreditPolicy {
        NewCreditPolicy {
            partner_id: PartnerId(partner.to_string()),
            credit_limit: Decimal::new(limit, 0),
            currency: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn new_policies_default_to_the_company_currency() {
        let service = service().await;
        let policy = service.create_policy(new_policy("acme", 1_000)).await.expect("create");
        assert_eq!(policy.currency, CurrencyCode::new("EUR"));
        assert!(policy.active);
    }

    #[tokio::test]
    async fn policy_on_sub_account_is_found_from_the_company() {
        let service = service().await;
        let policy = service.create_policy(new_policy("acme-billing", 1_000)).await.expect("create");

        let found = service
            .find_active_policy(&PartnerId("acme".to_string()))
            .await
            .expect("lookup")
            .expect("policy");
        assert_eq!(found.id, policy.id);
    }

    #[tokio::test]
    async fn update_reactivation_goes_through_the_uniqueness_check() {
        let service = service().await;
        let first = service.create_policy(new_policy("acme", 1_000)).await.expect("first");
        service.deactivate_policy(&first.id).await.expect("deactivate");
        service.create_policy(new_policy("acme-billing", 2_000)).await.expect("second");

        let error = service.activate_policy(&first.id).await.expect_err("duplicate");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::DuplicateActivePolicy { .. })
        ));

        let updated = service
            .update_policy(&first.id, CreditPolicyUpdate {
                credit_limit: Some(Decimal::new(5_000, 0)),
                ..CreditPolicyUpdate::default()
            })
            .await
            .expect("inactive policies can still be edited");
        assert_eq!(updated.credit_limit, Decimal::new(5_000, 0));
        assert!(!updated.active);
    }

    #[tokio::test]
    async fn unknown_partner_is_not_found() {
        let service = service().await;
        let error = service
            .find_active_policy(&PartnerId("nobody".to_string()))
            .await
            .expect_err("unknown partner");
        assert!(matches!(error, ApplicationError::NotFound { entity: "partner", .. }));
    }
}
