//! Async services that gate order confirmation behind the approval and
//! credit checks. Repositories are injected through [`Stores`], so the same
//! services run against SQLite or the in-memory stores used in tests.

pub mod approvals;
pub mod bootstrap;
pub mod credit;
pub mod gate;
pub mod stores;

pub use approvals::{ApprovalService, ApproveOutcome};
pub use bootstrap::{bootstrap, Application, BootstrapError, Services};
pub use credit::{CreditPolicyUpdate, CreditService, NewCreditPolicy, PolicyCreditView};
pub use gate::OrderConfirmationGate;
pub use stores::Stores;
