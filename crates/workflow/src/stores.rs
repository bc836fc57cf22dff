use std::sync::Arc;

use salesgate_db::repositories::{
    ApprovalRepository, CreditPolicyRepository, InMemoryApprovalRepository,
    InMemoryCreditPolicyRepository, InMemoryInvoiceRepository, InMemoryOrderRepository,
    InMemoryPartnerRepository, InMemorySequenceRepository, InvoiceRepository, OrderRepository,
    PartnerRepository, SequenceRepository, SqlApprovalRepository, SqlCreditPolicyRepository,
    SqlInvoiceRepository, SqlOrderRepository, SqlPartnerRepository, SqlSequenceRepository,
};
use salesgate_db::DbPool;

/// Every repository the services read from or write to.
#[derive(Clone)]
pub struct Stores {
    pub partners: Arc<dyn PartnerRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub policies: Arc<dyn CreditPolicyRepository>,
    pub approvals: Arc<dyn ApprovalRepository>,
    pub sequences: Arc<dyn SequenceRepository>,
}

impl Stores {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            partners: Arc::new(SqlPartnerRepository::new(pool.clone())),
            orders: Arc::new(SqlOrderRepository::new(pool.clone())),
            invoices: Arc::new(SqlInvoiceRepository::new(pool.clone())),
            policies: Arc::new(SqlCreditPolicyRepository::new(pool.clone())),
            approvals: Arc::new(SqlApprovalRepository::new(pool.clone())),
            sequences: Arc::new(SqlSequenceRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            partners: Arc::new(InMemoryPartnerRepository::default()),
            orders: Arc::new(InMemoryOrderRepository::default()),
            invoices: Arc::new(InMemoryInvoiceRepository::default()),
            policies: Arc::new(InMemoryCreditPolicyRepository::default()),
            approvals: Arc::new(InMemoryApprovalRepository::default()),
            sequences: Arc::new(InMemorySequenceRepository::default()),
        }
    }
}
