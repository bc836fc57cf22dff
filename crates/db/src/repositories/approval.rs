use sqlx::Row;

use salesgate_core::domain::actor::UserId;
use salesgate_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalState};
use salesgate_core::domain::currency::CurrencyCode;
use salesgate_core::domain::order::OrderId;

use super::{
    decode_err, parse_decimal, parse_timestamp, ApprovalRepository, OpenRequestInsert,
    RepositoryError,
};
use crate::DbPool;

const APPROVAL_COLUMNS: &str = "id, name, order_id, requested_by, approved_by, state, \
     reject_reason, currency, total_amount, created_at, updated_at";

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_open_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_request
             WHERE order_id = ? AND state IN ('draft', 'submitted')"
        );
        let row = sqlx::query(&sql).bind(&order_id.0).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_approval).transpose()
    }
}

fn row_to_approval(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    let order_id: String = row.try_get("order_id").map_err(decode_err)?;
    let requested_by: String = row.try_get("requested_by").map_err(decode_err)?;
    let approved_by: Option<String> = row.try_get("approved_by").map_err(decode_err)?;
    let state: String = row.try_get("state").map_err(decode_err)?;
    let reject_reason: Option<String> = row.try_get("reject_reason").map_err(decode_err)?;
    let currency: String = row.try_get("currency").map_err(decode_err)?;
    let total_amount: String = row.try_get("total_amount").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    let state = ApprovalState::parse(&state)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown approval state `{state}`")))?;

    Ok(ApprovalRequest {
        id: ApprovalId(id),
        name,
        order_id: OrderId(order_id),
        requested_by: UserId(requested_by),
        approved_by: approved_by.map(UserId),
        state,
        reject_reason,
        currency: CurrencyCode::new(currency),
        total_amount: parse_decimal("total_amount", &total_amount)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn find_by_id(
        &self,
        id: &ApprovalId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let sql = format!("SELECT {APPROVAL_COLUMNS} FROM approval_request WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_approval).transpose()
    }

    async fn list_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_request
             WHERE order_id = ? ORDER BY created_at DESC, name DESC"
        );
        let rows = sqlx::query(&sql).bind(&order_id.0).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_approval).collect()
    }

    async fn count_for_order(&self, order_id: &OrderId) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM approval_request WHERE order_id = ?")
                .bind(&order_id.0)
                .fetch_one(&self.pool)
                .await?;

        u64::try_from(count).map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    async fn insert_open(
        &self,
        request: ApprovalRequest,
    ) -> Result<OpenRequestInsert, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO approval_request
                 (id, name, order_id, requested_by, approved_by, state, reject_reason,
                  currency, total_amount, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.name)
        .bind(&request.order_id.0)
        .bind(&request.requested_by.0)
        .bind(request.approved_by.as_ref().map(|user| user.0.as_str()))
        .bind(request.state.as_str())
        .bind(&request.reject_reason)
        .bind(request.currency.as_str())
        .bind(request.total_amount.to_string())
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(OpenRequestInsert::Inserted(request)),
            Err(error) if is_unique_violation(&error) && request.state.is_open() => {
                // Lost the race for the order's single open slot.
                match self.find_open_for_order(&request.order_id).await? {
                    Some(existing) => Ok(OpenRequestInsert::Existing(existing)),
                    None => Err(error.into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn save_transition(
        &self,
        request: &ApprovalRequest,
        from: ApprovalState,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE approval_request
             SET approved_by = ?, state = ?, reject_reason = ?, updated_at = ?
             WHERE id = ? AND state = ?",
        )
        .bind(request.approved_by.as_ref().map(|user| user.0.as_str()))
        .bind(request.state.as_str())
        .bind(&request.reject_reason)
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id.0)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use salesgate_core::domain::actor::UserId;
    use salesgate_core::domain::approval::{ApprovalRequest, ApprovalState};
    use salesgate_core::domain::currency::CurrencyCode;
    use salesgate_core::domain::order::{OrderId, OrderState, SaleOrder};
    use salesgate_core::domain::partner::{Partner, PartnerId};

    use super::SqlApprovalRepository;
    use crate::repositories::{
        ApprovalRepository, OpenRequestInsert, OrderRepository, PartnerRepository,
        SqlOrderRepository, SqlPartnerRepository,
    };
    use crate::{connect_in_memory, migrations};

    fn order(id: &str) -> SaleOrder {
        SaleOrder {
            id: OrderId(id.to_string()),
            name: format!("S-{id}"),
            partner_id: PartnerId("acme".to_string()),
            currency: CurrencyCode::new("USD"),
            amount_total: Decimal::new(15_000, 0),
            state: OrderState::Draft,
            confirmed_at: None,
        }
    }

    async fn setup() -> SqlApprovalRepository {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlPartnerRepository::new(pool.clone())
            .save(Partner {
                id: PartnerId("acme".to_string()),
                name: "Acme".to_string(),
                parent_id: None,
                is_company: true,
            })
            .await
            .expect("insert partner");
        let orders = SqlOrderRepository::new(pool.clone());
        for id in ["SO-1", "SO-2"] {
            orders.save(order(id)).await.expect("insert order");
        }
        SqlApprovalRepository::new(pool)
    }

    fn request(order_id: &str, state: ApprovalState, name: &str) -> ApprovalRequest {
        let mut request =
            ApprovalRequest::for_order(&order(order_id), UserId("rep".to_string()), state, Utc::now());
        request.assign_name(name);
        request
    }

    #[tokio::test]
    async fn insert_open_and_find_by_id() {
        let repo = setup().await;
        let submitted = request("SO-1", ApprovalState::Submitted, "SAR/00001");

        let outcome = repo.insert_open(submitted.clone()).await.expect("insert");
        assert_eq!(outcome, OpenRequestInsert::Inserted(submitted.clone()));

        let found = repo.find_by_id(&submitted.id).await.expect("find").expect("should exist");
        assert_eq!(found.name, "SAR/00001");
        assert_eq!(found.state, ApprovalState::Submitted);
        assert_eq!(found.total_amount, Decimal::new(15_000, 0));
    }

    #[tokio::test]
    async fn second_open_request_returns_the_existing_one() {
        let repo = setup().await;
        let first = request("SO-1", ApprovalState::Submitted, "SAR/00001");
        repo.insert_open(first.clone()).await.expect("first");

        let second = request("SO-1", ApprovalState::Draft, "SAR/00002");
        let outcome = repo.insert_open(second).await.expect("second");
        assert_eq!(outcome, OpenRequestInsert::Existing(first));
        assert_eq!(repo.count_for_order(&OrderId("SO-1".to_string())).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn closed_requests_do_not_hold_the_open_slot() {
        let repo = setup().await;
        let mut first = request("SO-1", ApprovalState::Submitted, "SAR/00001");
        repo.insert_open(first.clone()).await.expect("first");

        first.reject(&UserId("manager".to_string()), Some("too risky"), Utc::now()).expect("reject");
        assert!(repo.save_transition(&first, ApprovalState::Submitted).await.expect("save"));

        let second = request("SO-1", ApprovalState::Submitted, "SAR/00002");
        assert!(matches!(
            repo.insert_open(second).await.expect("second"),
            OpenRequestInsert::Inserted(_)
        ));
    }

    #[tokio::test]
    async fn save_never_rewrites_identity_fields() {
        let repo = setup().await;
        let original = request("SO-1", ApprovalState::Submitted, "SAR/00001");
        repo.insert_open(original.clone()).await.expect("insert");

        let mut changed = original.clone();
        changed.name = "SAR/99999".to_string();
        changed.requested_by = UserId("someone-else".to_string());
        changed.approve(&UserId("manager".to_string()), Utc::now());
        assert!(repo.save_transition(&changed, ApprovalState::Submitted).await.expect("save"));

        let found = repo.find_by_id(&original.id).await.expect("find").expect("should exist");
        assert_eq!(found.name, "SAR/00001");
        assert_eq!(found.requested_by, UserId("rep".to_string()));
        assert_eq!(found.state, ApprovalState::Approved);
        assert_eq!(found.approved_by, Some(UserId("manager".to_string())));
    }

    #[tokio::test]
    async fn transition_from_a_stale_state_is_not_written() {
        let repo = setup().await;
        let original = request("SO-1", ApprovalState::Submitted, "SAR/00001");
        repo.insert_open(original.clone()).await.expect("insert");

        let mut approved = original.clone();
        approved.approve(&UserId("first".to_string()), Utc::now());
        let mut rejected = original.clone();
        rejected.reject(&UserId("second".to_string()), Some("no"), Utc::now()).expect("reject");

        assert!(repo.save_transition(&approved, ApprovalState::Submitted).await.expect("approve"));
        assert!(!repo.save_transition(&rejected, ApprovalState::Submitted).await.expect("reject"));

        let found = repo.find_by_id(&original.id).await.expect("find").expect("should exist");
        assert_eq!(found.state, ApprovalState::Approved);
        assert_eq!(found.approved_by, Some(UserId("first".to_string())));
        assert_eq!(found.reject_reason, None);
    }

    #[tokio::test]
    async fn list_for_order_is_newest_first_and_scoped() {
        let repo = setup().await;
        let mut older = request("SO-1", ApprovalState::Rejected, "SAR/00001");
        older.created_at = Utc::now() - Duration::hours(2);
        older.reject_reason = Some("no".to_string());
        repo.insert_open(older.clone()).await.expect("older");
        let newer = request("SO-1", ApprovalState::Submitted, "SAR/00002");
        repo.insert_open(newer.clone()).await.expect("newer");
        repo.insert_open(request("SO-2", ApprovalState::Draft, "SAR/00003"))
            .await
            .expect("other order");

        let listed = repo.list_for_order(&OrderId("SO-1".to_string())).await.expect("list");
        assert_eq!(listed.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec![
            "SAR/00002",
            "SAR/00001"
        ]);
        assert_eq!(repo.count_for_order(&OrderId("SO-2".to_string())).await.expect("count"), 1);
        assert_eq!(repo.count_for_order(&OrderId("SO-3".to_string())).await.expect("count"), 0);
    }
}
