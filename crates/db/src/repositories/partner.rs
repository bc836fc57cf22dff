use sqlx::Row;

use salesgate_core::domain::partner::{Partner, PartnerHierarchy, PartnerId};

use super::{decode_err, PartnerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPartnerRepository {
    pool: DbPool,
}

impl SqlPartnerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_partner(row: &sqlx::sqlite::SqliteRow) -> Result<Partner, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    let parent_id: Option<String> = row.try_get("parent_id").map_err(decode_err)?;
    let is_company: bool = row.try_get("is_company").map_err(decode_err)?;

    Ok(Partner { id: PartnerId(id), name, parent_id: parent_id.map(PartnerId), is_company })
}

#[async_trait::async_trait]
impl PartnerRepository for SqlPartnerRepository {
    async fn find_by_id(&self, id: &PartnerId) -> Result<Option<Partner>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, parent_id, is_company FROM partner WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_partner).transpose()
    }

    async fn save(&self, partner: Partner) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO partner (id, name, parent_id, is_company)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 parent_id = excluded.parent_id,
                 is_company = excluded.is_company",
        )
        .bind(&partner.id.0)
        .bind(&partner.name)
        .bind(partner.parent_id.as_ref().map(|id| id.0.as_str()))
        .bind(partner.is_company)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn commercial_partner_of(
        &self,
        id: &PartnerId,
    ) -> Result<Option<PartnerId>, RepositoryError> {
        // Load the ancestor chain and let the hierarchy pick the company.
        let rows = sqlx::query(
            "WITH RECURSIVE chain(id, name, parent_id, is_company) AS (
                 SELECT id, name, parent_id, is_company FROM partner WHERE id = ?
                 UNION
                 SELECT p.id, p.name, p.parent_id, p.is_company
                 FROM partner p JOIN chain c ON p.id = c.parent_id
             )
             SELECT id, name, parent_id, is_company FROM chain",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let chain = rows.iter().map(row_to_partner).collect::<Result<Vec<_>, _>>()?;
        Ok(PartnerHierarchy::new(chain).commercial_partner_of(id))
    }

    async fn child_of(&self, root: &PartnerId) -> Result<Vec<PartnerId>, RepositoryError> {
        let rows = sqlx::query(
            "WITH RECURSIVE tree(id) AS (
                 SELECT id FROM partner WHERE id = ?
                 UNION
                 SELECT p.id FROM partner p JOIN tree t ON p.parent_id = t.id
             )
             SELECT id FROM tree ORDER BY id",
        )
        .bind(&root.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map(PartnerId).map_err(decode_err))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use salesgate_core::domain::partner::{Partner, PartnerId};

    use super::SqlPartnerRepository;
    use crate::repositories::PartnerRepository;
    use crate::{connect_in_memory, migrations};

    async fn setup() -> SqlPartnerRepository {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlPartnerRepository::new(pool);

        for (id, parent, is_company) in [
            ("acme", None, true),
            ("acme-billing", Some("acme"), false),
            ("acme-billing-jane", Some("acme-billing"), false),
            ("acme-emea", Some("acme"), true),
            ("solo", None, false),
            ("solo-friend", Some("solo"), false),
        ] {
            repo.save(Partner {
                id: PartnerId(id.to_string()),
                name: id.to_string(),
                parent_id: parent.map(|p: &str| PartnerId(p.to_string())),
                is_company,
            })
            .await
            .expect("save partner");
        }
        repo
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let repo = setup().await;
        let found = repo
            .find_by_id(&PartnerId("acme-billing".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.parent_id, Some(PartnerId("acme".to_string())));
        assert!(!found.is_company);
        assert!(repo.find_by_id(&PartnerId("nobody".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn commercial_partner_walks_up_to_company() {
        let repo = setup().await;
        let commercial = repo
            .commercial_partner_of(&PartnerId("acme-billing-jane".to_string()))
            .await
            .expect("resolve");
        assert_eq!(commercial, Some(PartnerId("acme".to_string())));

        let solo = repo
            .commercial_partner_of(&PartnerId("solo-friend".to_string()))
            .await
            .expect("resolve");
        assert_eq!(solo, Some(PartnerId("solo".to_string())));

        let missing =
            repo.commercial_partner_of(&PartnerId("nobody".to_string())).await.expect("resolve");
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn child_of_returns_root_and_descendants() {
        let repo = setup().await;
        let ids = repo.child_of(&PartnerId("acme".to_string())).await.expect("child_of");
        let names: Vec<&str> = ids.iter().map(|id| id.0.as_str()).collect();
        assert_eq!(names, vec!["acme", "acme-billing", "acme-billing-jane", "acme-emea"]);
    }
}
