use crate::constants::{AttributeEntityType, AttributeInputType, AttributeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "postgres")]
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

/// Catalog attribute, unique by slug across the catalog.
/// Maps to `catalog_attributes` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    pub input_type: AttributeInputType,
    pub entity_type: Option<AttributeEntityType>,
    pub unit: Option<String>,
    pub value_required: bool,
    pub visible_in_storefront: bool,
    pub filterable_in_dashboard: bool,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
#[derive(Debug, FromRow)]
struct AttributeRow {
    id: Uuid,
    slug: String,
    name: String,
    attribute_type: String,
    input_type: String,
    entity_type: Option<String>,
    unit: Option<String>,
    value_required: bool,
    visible_in_storefront: bool,
    filterable_in_dashboard: bool,
    external_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
impl TryFrom<AttributeRow> for Attribute {
    type Error = sqlx::Error;

    fn try_from(row: AttributeRow) -> Result<Self, Self::Error> {
        Ok(Attribute {
            id: row.id,
            slug: row.slug,
            name: row.name,
            attribute_type: row.attribute_type.parse().map_err(decode_error)?,
            input_type: row.input_type.parse().map_err(decode_error)?,
            entity_type: row
                .entity_type
                .map(|value| value.parse())
                .transpose()
                .map_err(decode_error)?,
            unit: row.unit,
            value_required: row.value_required,
            visible_in_storefront: row.visible_in_storefront,
            filterable_in_dashboard: row.filterable_in_dashboard,
            external_reference: row.external_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(feature = "postgres")]
fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

impl Attribute {
    pub const TABLE: &'static str = "catalog_attributes";

    /// Columns a bulk update may overwrite
    pub const UPDATABLE_COLUMNS: &'static [&'static str] = &[
        "name",
        "attribute_type",
        "input_type",
        "entity_type",
        "unit",
        "value_required",
        "visible_in_storefront",
        "filterable_in_dashboard",
        "external_reference",
    ];

    pub fn copy_columns(&mut self, source: &Attribute, columns: &[&str]) {
        for column in columns {
            match *column {
                "name" => self.name = source.name.clone(),
                "attribute_type" => self.attribute_type = source.attribute_type,
                "input_type" => self.input_type = source.input_type,
                "entity_type" => self.entity_type = source.entity_type,
                "unit" => self.unit = source.unit.clone(),
                "value_required" => self.value_required = source.value_required,
                "visible_in_storefront" => self.visible_in_storefront = source.visible_in_storefront,
                "filterable_in_dashboard" => {
                    self.filterable_in_dashboard = source.filterable_in_dashboard
                }
                "external_reference" => self.external_reference = source.external_reference.clone(),
                _ => {}
            }
        }
        self.updated_at = source.updated_at;
    }
}

#[cfg(feature = "postgres")]
impl Attribute {
    const SELECT_COLUMNS: &'static str = "id, slug, name, attribute_type, input_type, entity_type, unit, \
         value_required, visible_in_storefront, filterable_in_dashboard, external_reference, \
         created_at, updated_at";

    /// Find attributes by slug
    pub async fn find_by_slugs(
        conn: &mut PgConnection,
        slugs: &[String],
    ) -> Result<Vec<Attribute>, sqlx::Error> {
        let rows = sqlx::query_as::<_, AttributeRow>(&format!(
            "SELECT {} FROM catalog_attributes WHERE slug = ANY($1)",
            Self::SELECT_COLUMNS
        ))
        .bind(slugs)
        .fetch_all(conn)
        .await?;

        rows.into_iter().map(Attribute::try_from).collect()
    }

    /// Slugs equal to one of `bases` or to `<base>-<n>`
    pub async fn persisted_slugs(
        conn: &mut PgConnection,
        bases: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT slug
            FROM catalog_attributes
            WHERE slug = ANY($1)
               OR substring(slug from '^(.*)-[0-9]+$') = ANY($1)
            "#,
        )
        .bind(bases)
        .fetch_all(conn)
        .await
    }

    /// Insert attributes in one statement
    pub async fn insert_many(
        conn: &mut PgConnection,
        attributes: &[&Attribute],
    ) -> Result<u64, sqlx::Error> {
        if attributes.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO catalog_attributes ({}) ",
            Self::SELECT_COLUMNS
        ));
        builder.push_values(attributes.iter(), |mut row, attribute| {
            row.push_bind(attribute.id)
                .push_bind(attribute.slug.clone())
                .push_bind(attribute.name.clone())
                .push_bind(attribute.attribute_type.as_str())
                .push_bind(attribute.input_type.as_str())
                .push_bind(attribute.entity_type.map(|t| t.as_str()))
                .push_bind(attribute.unit.clone())
                .push_bind(attribute.value_required)
                .push_bind(attribute.visible_in_storefront)
                .push_bind(attribute.filterable_in_dashboard)
                .push_bind(attribute.external_reference.clone())
                .push_bind(attribute.created_at)
                .push_bind(attribute.updated_at);
        });

        let result = builder.build().execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Overwrite `columns` of existing attributes, matched by id
    pub async fn update_many(
        conn: &mut PgConnection,
        attributes: &[&Attribute],
        columns: &[&str],
    ) -> Result<u64, sqlx::Error> {
        if attributes.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            UPDATE catalog_attributes AS t
            SET {}
            FROM UNNEST(
                $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[],
                $7::bool[], $8::bool[], $9::bool[], $10::text[], $11::timestamptz[]
            ) AS u(
                id, name, attribute_type, input_type, entity_type, unit,
                value_required, visible_in_storefront, filterable_in_dashboard,
                external_reference, updated_at
            )
            WHERE t.id = u.id
            "#,
            super::update_set_clause(columns, Self::UPDATABLE_COLUMNS)
        );

        let result = sqlx::query(&sql)
            .bind(attributes.iter().map(|a| a.id).collect::<Vec<_>>())
            .bind(attributes.iter().map(|a| a.name.clone()).collect::<Vec<_>>())
            .bind(
                attributes
                    .iter()
                    .map(|a| a.attribute_type.as_str().to_string())
                    .collect::<Vec<_>>(),
            )
            .bind(
                attributes
                    .iter()
                    .map(|a| a.input_type.as_str().to_string())
                    .collect::<Vec<_>>(),
            )
            .bind(
                attributes
                    .iter()
                    .map(|a| a.entity_type.map(|t| t.as_str().to_string()))
                    .collect::<Vec<_>>(),
            )
            .bind(attributes.iter().map(|a| a.unit.clone()).collect::<Vec<_>>())
            .bind(attributes.iter().map(|a| a.value_required).collect::<Vec<_>>())
            .bind(
                attributes
                    .iter()
                    .map(|a| a.visible_in_storefront)
                    .collect::<Vec<_>>(),
            )
            .bind(
                attributes
                    .iter()
                    .map(|a| a.filterable_in_dashboard)
                    .collect::<Vec<_>>(),
            )
            .bind(
                attributes
                    .iter()
                    .map(|a| a.external_reference.clone())
                    .collect::<Vec<_>>(),
            )
            .bind(attributes.iter().map(|a| a.updated_at).collect::<Vec<_>>())
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
