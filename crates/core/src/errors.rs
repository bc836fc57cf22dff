use rust_decimal::Decimal;
use thiserror::Error;

use crate::credit::CreditBreach;
use crate::domain::approval::ApprovalId;
use crate::domain::currency::CurrencyCode;
use crate::domain::order::{OrderId, OrderState};
use crate::domain::partner::PartnerId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("order `{order_id}` cannot move from {from:?} to {to:?}")]
    InvalidOrderTransition { order_id: OrderId, from: OrderState, to: OrderState },
    #[error(
        "only one active credit limit is allowed per customer (commercial entity `{commercial_partner_id}`)"
    )]
    DuplicateActivePolicy { commercial_partner_id: PartnerId },
    #[error(
        "currency mismatch: credit limit is in {policy_currency} but the sale order is in {order_currency}"
    )]
    CurrencyMismatch { policy_currency: CurrencyCode, order_currency: CurrencyCode },
    #[error("{0}")]
    CreditExceeded(CreditBreach),
    #[error(
        "order `{order_id}` requires approval because the total is above {threshold}; approval request {request_name} has been created/submitted"
    )]
    ApprovalRequired {
        order_id: OrderId,
        request_id: ApprovalId,
        request_name: String,
        threshold: Decimal,
    },
    #[error("a reject reason is required before rejecting approval request `{request_id}`")]
    MissingRejectReason { request_id: ApprovalId },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Stable machine-readable class used by interface layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidOrderTransition { .. } => "invalid_order_transition",
            Self::DuplicateActivePolicy { .. } => "validation",
            Self::CurrencyMismatch { .. } => "currency_mismatch",
            Self::CreditExceeded(_) => "credit_exceeded",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::MissingRejectReason { .. } => "missing_reject_reason",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("user `{user_id}` lacks the `{required_role}` role")]
    Forbidden { user_id: String, required_role: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(error) => error.kind(),
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "config_validation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::NotFound { .. } => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::Forbidden { .. } => {
                Self::Forbidden { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
