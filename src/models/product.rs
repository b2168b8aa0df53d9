use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "postgres")]
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

/// Product, unique by slug across the catalog.
/// Maps to `catalog_products` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(FromRow))]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<Value>,
    pub product_type_slug: String,
    pub category_slug: Option<String>,
    pub rating: Option<f64>,
    pub weight: Option<f64>,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub const TABLE: &'static str = "catalog_products";

    pub const UPDATABLE_COLUMNS: &'static [&'static str] = &[
        "name",
        "description",
        "product_type_slug",
        "category_slug",
        "rating",
        "weight",
        "external_reference",
    ];

    pub fn copy_columns(&mut self, source: &Product, columns: &[&str]) {
        for column in columns {
            match *column {
                "name" => self.name = source.name.clone(),
                "description" => self.description = source.description.clone(),
                "product_type_slug" => self.product_type_slug = source.product_type_slug.clone(),
                "category_slug" => self.category_slug = source.category_slug.clone(),
                "rating" => self.rating = source.rating,
                "weight" => self.weight = source.weight,
                "external_reference" => self.external_reference = source.external_reference.clone(),
                _ => {}
            }
        }
        self.updated_at = source.updated_at;
    }
}

#[cfg(feature = "postgres")]
impl Product {
    const INSERT_COLUMNS: &'static str = "id, slug, name, description, product_type_slug, category_slug, \
         rating, weight, external_reference, created_at, updated_at";

    pub async fn find_by_slugs(
        conn: &mut PgConnection,
        slugs: &[String],
    ) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>("SELECT * FROM catalog_products WHERE slug = ANY($1)")
            .bind(slugs)
            .fetch_all(conn)
            .await
    }

    pub async fn persisted_slugs(
        conn: &mut PgConnection,
        bases: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT slug
            FROM catalog_products
            WHERE slug = ANY($1)
               OR substring(slug from '^(.*)-[0-9]+$') = ANY($1)
            "#,
        )
        .bind(bases)
        .fetch_all(conn)
        .await
    }

    pub async fn insert_many(
        conn: &mut PgConnection,
        products: &[&Product],
    ) -> Result<u64, sqlx::Error> {
        if products.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO catalog_products ({}) ",
            Self::INSERT_COLUMNS
        ));
        builder.push_values(products.iter(), |mut row, product| {
            row.push_bind(product.id)
                .push_bind(product.slug.clone())
                .push_bind(product.name.clone())
                .push_bind(product.description.clone())
                .push_bind(product.product_type_slug.clone())
                .push_bind(product.category_slug.clone())
                .push_bind(product.rating)
                .push_bind(product.weight)
                .push_bind(product.external_reference.clone())
                .push_bind(product.created_at)
                .push_bind(product.updated_at);
        });

        let result = builder.build().execute(conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn update_many(
        conn: &mut PgConnection,
        products: &[&Product],
        columns: &[&str],
    ) -> Result<u64, sqlx::Error> {
        if products.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            UPDATE catalog_products AS t
            SET {}
            FROM UNNEST(
                $1::uuid[], $2::text[], $3::jsonb[], $4::text[], $5::text[],
                $6::float8[], $7::float8[], $8::text[], $9::timestamptz[]
            ) AS u(
                id, name, description, product_type_slug, category_slug,
                rating, weight, external_reference, updated_at
            )
            WHERE t.id = u.id
            "#,
            super::update_set_clause(columns, Self::UPDATABLE_COLUMNS)
        );

        let result = sqlx::query(&sql)
            .bind(products.iter().map(|p| p.id).collect::<Vec<_>>())
            .bind(products.iter().map(|p| p.name.clone()).collect::<Vec<_>>())
            .bind(products.iter().map(|p| p.description.clone()).collect::<Vec<_>>())
            .bind(
                products
                    .iter()
                    .map(|p| p.product_type_slug.clone())
                    .collect::<Vec<_>>(),
            )
            .bind(products.iter().map(|p| p.category_slug.clone()).collect::<Vec<_>>())
            .bind(products.iter().map(|p| p.rating).collect::<Vec<_>>())
            .bind(products.iter().map(|p| p.weight).collect::<Vec<_>>())
            .bind(
                products
                    .iter()
                    .map(|p| p.external_reference.clone())
                    .collect::<Vec<_>>(),
            )
            .bind(products.iter().map(|p| p.updated_at).collect::<Vec<_>>())
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
