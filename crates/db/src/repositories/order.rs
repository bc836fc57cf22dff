use sqlx::Row;

use salesgate_core::domain::currency::CurrencyCode;
use salesgate_core::domain::order::{OrderId, OrderState, SaleOrder};
use salesgate_core::domain::partner::PartnerId;

use super::{decode_err, parse_decimal, parse_timestamp, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<SaleOrder, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    let partner_id: String = row.try_get("partner_id").map_err(decode_err)?;
    let currency: String = row.try_get("currency").map_err(decode_err)?;
    let amount_total: String = row.try_get("amount_total").map_err(decode_err)?;
    let state: String = row.try_get("state").map_err(decode_err)?;
    let confirmed_at: Option<String> = row.try_get("confirmed_at").map_err(decode_err)?;

    let state = OrderState::parse(&state)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order state `{state}`")))?;

    Ok(SaleOrder {
        id: OrderId(id),
        name,
        partner_id: PartnerId(partner_id),
        currency: CurrencyCode::new(currency),
        amount_total: parse_decimal("amount_total", &amount_total)?,
        state,
        confirmed_at: confirmed_at
            .map(|raw| parse_timestamp("confirmed_at", &raw))
            .transpose()?,
    })
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<SaleOrder>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, partner_id, currency, amount_total, state, confirmed_at
             FROM sale_order WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn save(&self, order: SaleOrder) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sale_order (id, name, partner_id, currency, amount_total, state, confirmed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 partner_id = excluded.partner_id,
                 currency = excluded.currency,
                 amount_total = excluded.amount_total,
                 state = excluded.state,
                 confirmed_at = excluded.confirmed_at",
        )
        .bind(&order.id.0)
        .bind(&order.name)
        .bind(&order.partner_id.0)
        .bind(order.currency.as_str())
        .bind(order.amount_total.to_string())
        .bind(order.state.as_str())
        .bind(order.confirmed_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_confirmation(&self, order: &SaleOrder) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE sale_order SET state = ?, confirmed_at = ?
             WHERE id = ? AND state IN ('draft', 'sent')",
        )
        .bind(order.state.as_str())
        .bind(order.confirmed_at.map(|at| at.to_rfc3339()))
        .bind(&order.id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
