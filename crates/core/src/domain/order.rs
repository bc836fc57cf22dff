use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::currency::CurrencyCode;
use crate::domain::partner::PartnerId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Draft,
    Sent,
    Sale,
    Done,
    Cancel,
}

impl OrderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Sale => "sale",
            Self::Done => "done",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "sale" => Some(Self::Sale),
            "done" => Some(Self::Done),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Quotation states from which `confirm` is allowed.
    pub fn is_pre_confirmation(self) -> bool {
        matches!(self, Self::Draft | Self::Sent)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleOrder {
    pub id: OrderId,
    pub name: String,
    pub partner_id: PartnerId,
    pub currency: CurrencyCode,
    pub amount_total: Decimal,
    pub state: OrderState,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl SaleOrder {
    /// Base confirmation transition. Business gates run before this.
    pub fn confirm(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.state.is_pre_confirmation() {
            return Err(DomainError::InvalidOrderTransition {
                order_id: self.id.clone(),
                from: self.state,
                to: OrderState::Sale,
            });
        }

        self.state = OrderState::Sale;
        self.confirmed_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{OrderId, OrderState, SaleOrder};
    use crate::domain::currency::CurrencyCode;
    use crate::domain::partner::PartnerId;
    use crate::errors::DomainError;

    fn order(state: OrderState) -> SaleOrder {
        SaleOrder {
            id: OrderId("SO-1".to_string()),
            name: "S00001".to_string(),
            partner_id: PartnerId("acme".to_string()),
            currency: CurrencyCode::new("USD"),
            amount_total: Decimal::new(50_000, 2),
            state,
            confirmed_at: None,
        }
    }

    #[test]
    fn draft_and_sent_orders_confirm() {
        for state in [OrderState::Draft, OrderState::Sent] {
            let mut order = order(state);
            order.confirm(Utc::now()).expect("pre-confirmation state should confirm");
            assert_eq!(order.state, OrderState::Sale);
            assert!(order.confirmed_at.is_some());
        }
    }

    #[test]
    fn confirmed_or_cancelled_orders_cannot_confirm_again() {
        for state in [OrderState::Sale, OrderState::Done, OrderState::Cancel] {
            let mut order = order(state);
            let error = order.confirm(Utc::now()).expect_err("should be rejected");
            assert!(matches!(error, DomainError::InvalidOrderTransition { from, .. } if from == state));
            assert_eq!(order.state, state);
        }
    }

    #[test]
    fn state_strings_round_trip() {
        for state in
            [OrderState::Draft, OrderState::Sent, OrderState::Sale, OrderState::Done, OrderState::Cancel]
        {
            assert_eq!(OrderState::parse(state.as_str()), Some(state));
        }
        assert_eq!(OrderState::parse("bogus"), None);
    }
}
