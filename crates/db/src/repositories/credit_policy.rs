use sqlx::Row;

use salesgate_core::credit::ensure_single_active;
use salesgate_core::domain::credit::{CreditLimitPolicy, CreditPolicyId};
use salesgate_core::domain::currency::CurrencyCode;
use salesgate_core::domain::partner::PartnerId;

use super::{
    decode_err, parse_decimal, parse_timestamp, placeholders, CreditPolicyRepository,
    RepositoryError,
};
use crate::DbPool;

const POLICY_COLUMNS: &str =
    "id, partner_id, credit_limit, currency, active, note, created_at, updated_at";

pub struct SqlCreditPolicyRepository {
    pool: DbPool,
}

impl SqlCreditPolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_policy(row: &sqlx::sqlite::SqliteRow) -> Result<CreditLimitPolicy, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let partner_id: String = row.try_get("partner_id").map_err(decode_err)?;
    let credit_limit: String = row.try_get("credit_limit").map_err(decode_err)?;
    let currency: String = row.try_get("currency").map_err(decode_err)?;
    let active: bool = row.try_get("active").map_err(decode_err)?;
    let note: Option<String> = row.try_get("note").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(CreditLimitPolicy {
        id: CreditPolicyId(id),
        partner_id: PartnerId(partner_id),
        credit_limit: parse_decimal("credit_limit", &credit_limit)?,
        currency: CurrencyCode::new(currency),
        active,
        note,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn select_for_partners(count: usize) -> String {
    format!(
        "SELECT {POLICY_COLUMNS} FROM credit_limit_policy
         WHERE partner_id IN ({})
         ORDER BY created_at DESC, id DESC",
        placeholders(count)
    )
}

#[async_trait::async_trait]
impl CreditPolicyRepository for SqlCreditPolicyRepository {
    async fn find_by_id(
        &self,
        id: &CreditPolicyId,
    ) -> Result<Option<CreditLimitPolicy>, RepositoryError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM credit_limit_policy WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_policy).transpose()
    }

    async fn list_for_partners(
        &self,
        partners: &[PartnerId],
    ) -> Result<Vec<CreditLimitPolicy>, RepositoryError> {
        if partners.is_empty() {
            return Ok(Vec::new());
        }

        let sql = select_for_partners(partners.len());
        let mut query = sqlx::query(&sql);
        for partner in partners {
            query = query.bind(&partner.0);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_policy).collect()
    }

    async fn save_guarded(
        &self,
        policy: CreditLimitPolicy,
        commercial_partner_id: &PartnerId,
        scope: &[PartnerId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO credit_limit_policy
                 (id, partner_id, credit_limit, currency, active, note, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 partner_id = excluded.partner_id,
                 credit_limit = excluded.credit_limit,
                 currency = excluded.currency,
                 active = excluded.active,
                 note = excluded.note,
                 updated_at = excluded.updated_at",
        )
        .bind(&policy.id.0)
        .bind(&policy.partner_id.0)
        .bind(policy.credit_limit.to_string())
        .bind(policy.currency.as_str())
        .bind(policy.active)
        .bind(&policy.note)
        .bind(policy.created_at.to_rfc3339())
        .bind(policy.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // The duplicate check reads inside the write transaction, so a
        // concurrent writer either sees this row or waits for the lock.
        if policy.active && !scope.is_empty() {
            let sql = select_for_partners(scope.len());
            let mut query = sqlx::query(&sql);
            for partner in scope {
                query = query.bind(&partner.0);
            }
            let rows = query.fetch_all(&mut *tx).await?;
            let in_scope = rows.iter().map(row_to_policy).collect::<Result<Vec<_>, _>>()?;

            if let Err(error) = ensure_single_active(&policy, commercial_partner_id, &in_scope) {
                tx.rollback().await?;
                return Err(error.into());
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
