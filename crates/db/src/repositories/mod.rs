use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use salesgate_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalState};
use salesgate_core::domain::credit::{CreditLimitPolicy, CreditPolicyId};
use salesgate_core::domain::invoice::Invoice;
use salesgate_core::domain::order::{OrderId, SaleOrder};
use salesgate_core::domain::partner::{Partner, PartnerId};
use salesgate_core::errors::{ApplicationError, DomainError};

pub mod approval;
pub mod credit_policy;
pub mod invoice;
pub mod memory;
pub mod order;
pub mod partner;
pub mod sequence;

pub use approval::SqlApprovalRepository;
pub use credit_policy::SqlCreditPolicyRepository;
pub use invoice::SqlInvoiceRepository;
pub use memory::{
    InMemoryApprovalRepository, InMemoryCreditPolicyRepository, InMemoryInvoiceRepository,
    InMemoryOrderRepository, InMemoryPartnerRepository, InMemorySequenceRepository,
};
pub use order::SqlOrderRepository;
pub use partner::SqlPartnerRepository;
pub use sequence::SqlSequenceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Invariant(#[from] DomainError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Invariant(error) => ApplicationError::Domain(error),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// Outcome of inserting a request that must be the only open one for its
/// order.
#[derive(Clone, Debug, PartialEq)]
pub enum OpenRequestInsert {
    Inserted(ApprovalRequest),
    /// Another open request already exists; it is returned unchanged.
    Existing(ApprovalRequest),
}

#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn find_by_id(&self, id: &PartnerId) -> Result<Option<Partner>, RepositoryError>;
    async fn save(&self, partner: Partner) -> Result<(), RepositoryError>;
    async fn commercial_partner_of(
        &self,
        id: &PartnerId,
    ) -> Result<Option<PartnerId>, RepositoryError>;
    /// `root` and all of its transitive descendants.
    async fn child_of(&self, root: &PartnerId) -> Result<Vec<PartnerId>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<SaleOrder>, RepositoryError>;
    async fn save(&self, order: SaleOrder) -> Result<(), RepositoryError>;
    /// Writes the confirmation of `order` only while the stored order is
    /// still in `draft` or `sent`. Returns `false` when another writer
    /// moved it first.
    async fn save_confirmation(&self, order: &SaleOrder) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn save(&self, invoice: Invoice) -> Result<(), RepositoryError>;
    /// Posted customer invoices with a positive residual for any of `partners`.
    async fn list_outstanding_receivables(
        &self,
        partners: &[PartnerId],
    ) -> Result<Vec<Invoice>, RepositoryError>;
}

#[async_trait]
pub trait CreditPolicyRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &CreditPolicyId,
    ) -> Result<Option<CreditLimitPolicy>, RepositoryError>;

    async fn list_for_partners(
        &self,
        partners: &[PartnerId],
    ) -> Result<Vec<CreditLimitPolicy>, RepositoryError>;

    /// Upserts `policy` and, in the same transaction, rejects the write with
    /// [`DomainError::DuplicateActivePolicy`] when another active policy is
    /// attached to any partner in `scope`.
    async fn save_guarded(
        &self,
        policy: CreditLimitPolicy,
        commercial_partner_id: &PartnerId,
        scope: &[PartnerId],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApprovalId)
        -> Result<Option<ApprovalRequest>, RepositoryError>;

    /// All requests for an order, newest first.
    async fn list_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;

    async fn count_for_order(&self, order_id: &OrderId) -> Result<u64, RepositoryError>;

    async fn insert_open(
        &self,
        request: ApprovalRequest,
    ) -> Result<OpenRequestInsert, RepositoryError>;

    /// Persists a state change made from `from`. The write only lands when
    /// the stored request is still in `from`; `false` means another decision
    /// won. `name`, `order_id` and `requested_by` are fixed at insert time
    /// and never rewritten.
    async fn save_transition(
        &self,
        request: &ApprovalRequest,
        from: ApprovalState,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Next number for `code`, starting at 1. Numbers are never reused but
    /// may leave gaps.
    async fn next_value(&self, code: &str) -> Result<u64, RepositoryError>;
}

pub(crate) fn decode_err(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw.trim())
        .map_err(|error| RepositoryError::Decode(format!("{field} `{raw}`: {error}")))
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field} `{raw}`: {error}")))
}

/// `?, ?, ?` for an `IN (...)` clause of `count` bound values.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use salesgate_core::errors::{ApplicationError, DomainError};
    use salesgate_core::domain::partner::PartnerId;

    use super::{parse_decimal, parse_timestamp, placeholders, RepositoryError};

    #[test]
    fn decimals_parse_from_text_columns() {
        assert_eq!(parse_decimal("amount", "12500.00").expect("parse"), Decimal::new(12_500, 0));
        assert!(matches!(parse_decimal("amount", "abc"), Err(RepositoryError::Decode(_))));
    }

    #[test]
    fn timestamps_require_rfc3339() {
        assert!(parse_timestamp("created_at", "2026-01-01T00:00:00+00:00").is_ok());
        assert!(parse_timestamp("created_at", "yesterday").is_err());
    }

    #[test]
    fn placeholder_lists_match_bind_count() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn invariant_errors_surface_as_domain_errors() {
        let error = RepositoryError::from(DomainError::DuplicateActivePolicy {
            commercial_partner_id: PartnerId("acme".to_string()),
        });
        assert!(matches!(ApplicationError::from(error), ApplicationError::Domain(_)));

        let error = RepositoryError::Decode("bad row".to_string());
        assert!(matches!(ApplicationError::from(error), ApplicationError::Persistence(_)));
    }
}
