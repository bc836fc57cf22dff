use sqlx::Row;

use salesgate_core::domain::currency::CurrencyCode;
use salesgate_core::domain::invoice::{Invoice, InvoiceId, InvoiceState, MoveType};
use salesgate_core::domain::partner::PartnerId;

use super::{decode_err, parse_decimal, placeholders, InvoiceRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInvoiceRepository {
    pool: DbPool,
}

impl SqlInvoiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_invoice(row: &sqlx::sqlite::SqliteRow) -> Result<Invoice, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let partner_id: String = row.try_get("partner_id").map_err(decode_err)?;
    let move_type: String = row.try_get("move_type").map_err(decode_err)?;
    let state: String = row.try_get("state").map_err(decode_err)?;
    let currency: String = row.try_get("currency").map_err(decode_err)?;
    let amount_residual: String = row.try_get("amount_residual").map_err(decode_err)?;

    Ok(Invoice {
        id: InvoiceId(id),
        partner_id: PartnerId(partner_id),
        move_type: MoveType::parse(&move_type)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown move type `{move_type}`")))?,
        state: InvoiceState::parse(&state)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown invoice state `{state}`")))?,
        currency: CurrencyCode::new(currency),
        amount_residual: parse_decimal("amount_residual", &amount_residual)?,
    })
}

#[async_trait::async_trait]
impl InvoiceRepository for SqlInvoiceRepository {
    async fn save(&self, invoice: Invoice) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO invoice (id, partner_id, move_type, state, currency, amount_residual)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 partner_id = excluded.partner_id,
                 move_type = excluded.move_type,
                 state = excluded.state,
                 currency = excluded.currency,
                 amount_residual = excluded.amount_residual",
        )
        .bind(&invoice.id.0)
        .bind(&invoice.partner_id.0)
        .bind(invoice.move_type.as_str())
        .bind(invoice.state.as_str())
        .bind(invoice.currency.as_str())
        .bind(invoice.amount_residual.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_outstanding_receivables(
        &self,
        partners: &[PartnerId],
    ) -> Result<Vec<Invoice>, RepositoryError> {
        if partners.is_empty() {
            return Ok(Vec::new());
        }

        // Residuals are TEXT, so the positivity filter runs on decoded rows.
        let sql = format!(
            "SELECT id, partner_id, move_type, state, currency, amount_residual
             FROM invoice
             WHERE move_type = 'out_invoice' AND state = 'posted' AND partner_id IN ({})
             ORDER BY id",
            placeholders(partners.len())
        );
        let mut query = sqlx::query(&sql);
        for partner in partners {
            query = query.bind(&partner.0);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let invoices = rows.iter().map(row_to_invoice).collect::<Result<Vec<_>, _>>()?;
        Ok(invoices.into_iter().filter(Invoice::is_outstanding_receivable).collect())
    }
}
