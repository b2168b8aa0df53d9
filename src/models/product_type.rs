use serde::{Deserialize, Serialize};
#[cfg(feature = "postgres")]
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Product type referenced by products. Read-only from the bulk engine's side.
/// Maps to `catalog_product_types` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(FromRow))]
pub struct ProductType {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

impl ProductType {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: name.into(),
        }
    }
}

#[cfg(feature = "postgres")]
impl ProductType {
    pub async fn find_by_slugs(
        conn: &mut PgConnection,
        slugs: &[String],
    ) -> Result<Vec<ProductType>, sqlx::Error> {
        sqlx::query_as::<_, ProductType>(
            "SELECT id, slug, name FROM catalog_product_types WHERE slug = ANY($1)",
        )
        .bind(slugs)
        .fetch_all(conn)
        .await
    }

    pub async fn persisted_slugs(
        conn: &mut PgConnection,
        bases: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT slug FROM catalog_product_types WHERE slug = ANY($1)",
        )
        .bind(bases)
        .fetch_all(conn)
        .await
    }
}
