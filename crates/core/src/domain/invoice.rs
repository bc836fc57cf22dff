use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::currency::CurrencyCode;
use crate::domain::partner::PartnerId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    OutInvoice,
    OutRefund,
    InInvoice,
    InRefund,
}

impl MoveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutInvoice => "out_invoice",
            Self::OutRefund => "out_refund",
            Self::InInvoice => "in_invoice",
            Self::InRefund => "in_refund",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "out_invoice" => Some(Self::OutInvoice),
            "out_refund" => Some(Self::OutRefund),
            "in_invoice" => Some(Self::InInvoice),
            "in_refund" => Some(Self::InRefund),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Draft,
    Posted,
    Cancel,
}

impl InvoiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Posted => "posted",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "posted" => Some(Self::Posted),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub partner_id: PartnerId,
    pub move_type: MoveType,
    pub state: InvoiceState,
    pub currency: CurrencyCode,
    pub amount_residual: Decimal,
}

impl Invoice {
    /// Posted customer invoice with an unpaid balance.
    pub fn is_outstanding_receivable(&self) -> bool {
        self.move_type == MoveType::OutInvoice
            && self.state == InvoiceState::Posted
            && self.amount_residual > Decimal::ZERO
    }
}
