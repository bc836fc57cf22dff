pub mod approvals;
pub mod config;
pub mod credit;
pub mod domain;
pub mod errors;

pub use approvals::{
    decide, requires_approval, ApprovalDecision, BlockAction, ConfirmMode, ProceedReason,
    RequestNaming, APPROVAL_THRESHOLD,
};
pub use credit::{CreditBreach, OrderCreditView};
pub use domain::actor::{Actor, UserId, SALES_APPROVAL_MANAGER};
pub use domain::approval::{ApprovalId, ApprovalRequest, ApprovalState, Transition};
pub use domain::credit::{CreditLimitPolicy, CreditPolicyId, CreditProjection};
pub use domain::currency::CurrencyCode;
pub use domain::invoice::{Invoice, InvoiceId, InvoiceState, MoveType};
pub use domain::order::{OrderId, OrderState, SaleOrder};
pub use domain::partner::{Partner, PartnerHierarchy, PartnerId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
