use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "postgres")]
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

/// A choice of an attribute, unique by slug within its attribute.
/// Maps to `catalog_attribute_values` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(FromRow))]
pub struct AttributeValue {
    pub id: Uuid,
    pub attribute_slug: String,
    pub slug: String,
    pub name: String,
    /// Swatch color
    pub value: Option<String>,
    pub file_url: Option<String>,
    pub content_type: Option<String>,
    pub rich_text: Option<Value>,
    pub plain_text: Option<String>,
    pub boolean: Option<bool>,
    pub date_time: Option<DateTime<Utc>>,
    /// `{ref, value, code}` as supplied
    pub additional_fields: Value,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttributeValue {
    pub const TABLE: &'static str = "catalog_attribute_values";

    pub const UPDATABLE_COLUMNS: &'static [&'static str] = &[
        "name",
        "value",
        "file_url",
        "content_type",
        "rich_text",
        "plain_text",
        "boolean",
        "date_time",
        "additional_fields",
        "external_reference",
    ];

    pub fn copy_columns(&mut self, source: &AttributeValue, columns: &[&str]) {
        for column in columns {
            match *column {
                "name" => self.name = source.name.clone(),
                "value" => self.value = source.value.clone(),
                "file_url" => self.file_url = source.file_url.clone(),
                "content_type" => self.content_type = source.content_type.clone(),
                "rich_text" => self.rich_text = source.rich_text.clone(),
                "plain_text" => self.plain_text = source.plain_text.clone(),
                "boolean" => self.boolean = source.boolean,
                "date_time" => self.date_time = source.date_time,
                "additional_fields" => self.additional_fields = source.additional_fields.clone(),
                "external_reference" => self.external_reference = source.external_reference.clone(),
                _ => {}
            }
        }
        self.updated_at = source.updated_at;
    }
}

#[cfg(feature = "postgres")]
impl AttributeValue {
    const SELECT_COLUMNS: &'static str = "id, attribute_slug, slug, name, value, file_url, content_type, \
         rich_text, plain_text, boolean, date_time, additional_fields, external_reference, \
         created_at, updated_at";

    /// Find values by `(attribute_slug, slug)` pairs
    pub async fn find_by_keys(
        conn: &mut PgConnection,
        keys: &[(String, String)],
    ) -> Result<Vec<AttributeValue>, sqlx::Error> {
        let (attribute_slugs, slugs): (Vec<String>, Vec<String>) = keys.iter().cloned().unzip();

        sqlx::query_as::<_, AttributeValue>(
            r#"
            SELECT v.*
            FROM catalog_attribute_values v
            JOIN UNNEST($1::text[], $2::text[]) AS k(attribute_slug, slug)
              ON v.attribute_slug = k.attribute_slug AND v.slug = k.slug
            "#,
        )
        .bind(attribute_slugs)
        .bind(slugs)
        .fetch_all(conn)
        .await
    }

    /// `(attribute_slug, slug)` pairs whose slug equals the base or `<base>-<n>`
    pub async fn persisted_slugs(
        conn: &mut PgConnection,
        bases: &[(String, String)],
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        let (attribute_slugs, base_slugs): (Vec<String>, Vec<String>) =
            bases.iter().cloned().unzip();

        sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT DISTINCT v.attribute_slug, v.slug
            FROM catalog_attribute_values v
            JOIN UNNEST($1::text[], $2::text[]) AS k(attribute_slug, base)
              ON v.attribute_slug = k.attribute_slug
             AND (v.slug = k.base OR substring(v.slug from '^(.*)-[0-9]+$') = k.base)
            "#,
        )
        .bind(attribute_slugs)
        .bind(base_slugs)
        .fetch_all(conn)
        .await
    }

    pub async fn insert_many(
        conn: &mut PgConnection,
        values: &[&AttributeValue],
    ) -> Result<u64, sqlx::Error> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO catalog_attribute_values ({}) ",
            Self::SELECT_COLUMNS
        ));
        builder.push_values(values.iter(), |mut row, value| {
            row.push_bind(value.id)
                .push_bind(value.attribute_slug.clone())
                .push_bind(value.slug.clone())
                .push_bind(value.name.clone())
                .push_bind(value.value.clone())
                .push_bind(value.file_url.clone())
                .push_bind(value.content_type.clone())
                .push_bind(value.rich_text.clone())
                .push_bind(value.plain_text.clone())
                .push_bind(value.boolean)
                .push_bind(value.date_time)
                .push_bind(value.additional_fields.clone())
                .push_bind(value.external_reference.clone())
                .push_bind(value.created_at)
                .push_bind(value.updated_at);
        });

        let result = builder.build().execute(conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn update_many(
        conn: &mut PgConnection,
        values: &[&AttributeValue],
        columns: &[&str],
    ) -> Result<u64, sqlx::Error> {
        if values.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            UPDATE catalog_attribute_values AS t
            SET {}
            FROM UNNEST(
                $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::jsonb[],
                $7::text[], $8::bool[], $9::timestamptz[], $10::jsonb[], $11::text[],
                $12::timestamptz[]
            ) AS u(
                id, name, value, file_url, content_type, rich_text, plain_text, boolean,
                date_time, additional_fields, external_reference, updated_at
            )
            WHERE t.id = u.id
            "#,
            super::update_set_clause(columns, Self::UPDATABLE_COLUMNS)
        );

        let result = sqlx::query(&sql)
            .bind(values.iter().map(|v| v.id).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.name.clone()).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.value.clone()).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.file_url.clone()).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.content_type.clone()).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.rich_text.clone()).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.plain_text.clone()).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.boolean).collect::<Vec<_>>())
            .bind(values.iter().map(|v| v.date_time).collect::<Vec<_>>())
            .bind(
                values
                    .iter()
                    .map(|v| v.additional_fields.clone())
                    .collect::<Vec<_>>(),
            )
            .bind(
                values
                    .iter()
                    .map(|v| v.external_reference.clone())
                    .collect::<Vec<_>>(),
            )
            .bind(values.iter().map(|v| v.updated_at).collect::<Vec<_>>())
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
