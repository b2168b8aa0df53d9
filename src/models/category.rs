use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "postgres")]
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

/// Product category, unique by slug; the tree is expressed through `parent_slug`.
/// Maps to `catalog_categories` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(FromRow))]
pub struct Category {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<Value>,
    pub parent_slug: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub const TABLE: &'static str = "catalog_categories";

    pub const UPDATABLE_COLUMNS: &'static [&'static str] = &[
        "name",
        "description",
        "parent_slug",
        "seo_title",
        "seo_description",
    ];

    pub fn copy_columns(&mut self, source: &Category, columns: &[&str]) {
        for column in columns {
            match *column {
                "name" => self.name = source.name.clone(),
                "description" => self.description = source.description.clone(),
                "parent_slug" => self.parent_slug = source.parent_slug.clone(),
                "seo_title" => self.seo_title = source.seo_title.clone(),
                "seo_description" => self.seo_description = source.seo_description.clone(),
                _ => {}
            }
        }
        self.updated_at = source.updated_at;
    }
}

#[cfg(feature = "postgres")]
impl Category {
    const INSERT_COLUMNS: &'static str =
        "id, slug, name, description, parent_slug, seo_title, seo_description, created_at, updated_at";

    pub async fn find_by_slugs(
        conn: &mut PgConnection,
        slugs: &[String],
    ) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT * FROM catalog_categories WHERE slug = ANY($1)")
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
            FROM catalog_categories
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
        categories: &[&Category],
    ) -> Result<u64, sqlx::Error> {
        if categories.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO catalog_categories ({}) ",
            Self::INSERT_COLUMNS
        ));
        builder.push_values(categories.iter(), |mut row, category| {
            row.push_bind(category.id)
                .push_bind(category.slug.clone())
                .push_bind(category.name.clone())
                .push_bind(category.description.clone())
                .push_bind(category.parent_slug.clone())
                .push_bind(category.seo_title.clone())
                .push_bind(category.seo_description.clone())
                .push_bind(category.created_at)
                .push_bind(category.updated_at);
        });

        let result = builder.build().execute(conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn update_many(
        conn: &mut PgConnection,
        categories: &[&Category],
        columns: &[&str],
    ) -> Result<u64, sqlx::Error> {
        if categories.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            UPDATE catalog_categories AS t
            SET {}
            FROM UNNEST(
                $1::uuid[], $2::text[], $3::jsonb[], $4::text[], $5::text[], $6::text[],
                $7::timestamptz[]
            ) AS u(id, name, description, parent_slug, seo_title, seo_description, updated_at)
            WHERE t.id = u.id
            "#,
            super::update_set_clause(columns, Self::UPDATABLE_COLUMNS)
        );

        let result = sqlx::query(&sql)
            .bind(categories.iter().map(|c| c.id).collect::<Vec<_>>())
            .bind(categories.iter().map(|c| c.name.clone()).collect::<Vec<_>>())
            .bind(categories.iter().map(|c| c.description.clone()).collect::<Vec<_>>())
            .bind(categories.iter().map(|c| c.parent_slug.clone()).collect::<Vec<_>>())
            .bind(categories.iter().map(|c| c.seo_title.clone()).collect::<Vec<_>>())
            .bind(
                categories
                    .iter()
                    .map(|c| c.seo_description.clone())
                    .collect::<Vec<_>>(),
            )
            .bind(categories.iter().map(|c| c.updated_at).collect::<Vec<_>>())
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
