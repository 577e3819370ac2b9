//! Schema catalogue: introspects the live Postgres schema (tables, columns,
//! foreign keys) and caches the result in memory so the planner and
//! embedding index don't re-query `information_schema` on every request.

use std::sync::RwLock;

use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// One column in a table, as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// One foreign-key relationship between two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    /// Whether `from_column` carries a btree index — the planner's cost
    /// model applies an index-scan discount only when this is true.
    pub indexed: bool,
}

/// A full snapshot of the introspected schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    pub tables: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl SchemaSnapshot {
    #[must_use]
    pub fn columns_for(&self, table: &str) -> Vec<&ColumnInfo> {
        let prefix = format!("{table}.");
        self.columns
            .iter()
            .filter(|c| c.name.starts_with(&prefix))
            .collect()
    }

    #[must_use]
    pub fn foreign_keys_for(&self, table: &str) -> Vec<&ForeignKeyInfo> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.from_table == table || fk.to_table == table)
            .collect()
    }
}

/// Introspects `information_schema` for base tables, columns (qualified as
/// `table.column`), and foreign-key relationships, noting which FK columns
/// are covered by an index.
///
/// # Errors
///
/// Returns [`CatalogError::Sqlx`] if any introspection query fails.
pub async fn introspect_schema(pool: &PgPool) -> Result<SchemaSnapshot, CatalogError> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .fetch_all(pool)
    .await?;

    let column_rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT table_name, column_name, data_type, is_nullable \
         FROM information_schema.columns \
         WHERE table_schema = 'public' \
         ORDER BY table_name, ordinal_position",
    )
    .fetch_all(pool)
    .await?;

    let columns = column_rows
        .into_iter()
        .map(|(table, name, data_type, is_nullable)| ColumnInfo {
            name: format!("{table}.{name}"),
            data_type,
            is_nullable: is_nullable == "YES",
        })
        .collect();

    let fk_rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT \
             tc.table_name AS from_table, \
             kcu.column_name AS from_column, \
             ccu.table_name AS to_table, \
             ccu.column_name AS to_column \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
             ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
         WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = 'public'",
    )
    .fetch_all(pool)
    .await?;

    let indexed_columns: Vec<(String, String)> = sqlx::query_as(
        "SELECT t.relname AS table_name, a.attname AS column_name \
         FROM pg_index ix \
         JOIN pg_class t ON t.oid = ix.indrelid \
         JOIN pg_class i ON i.oid = ix.indexrelid \
         JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
         JOIN pg_namespace n ON n.oid = t.relnamespace \
         WHERE n.nspname = 'public'",
    )
    .fetch_all(pool)
    .await?;

    let foreign_keys = fk_rows
        .into_iter()
        .map(|(from_table, from_column, to_table, to_column)| {
            let indexed = indexed_columns
                .iter()
                .any(|(t, c)| *t == from_table && *c == from_column);
            ForeignKeyInfo {
                from_table,
                from_column,
                to_table,
                to_column,
                indexed,
            }
        })
        .collect();

    debug!(table_count = tables.len(), "introspected schema");

    Ok(SchemaSnapshot {
        tables,
        columns,
        foreign_keys,
    })
}

/// In-memory cache over [`introspect_schema`], so repeated planner/embedding
/// lookups don't re-hit `information_schema` on every call.
pub struct SchemaCatalog {
    pool: PgPool,
    snapshot: RwLock<Option<SchemaSnapshot>>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            snapshot: RwLock::new(None),
        }
    }

    /// Returns the cached snapshot, introspecting the schema on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlx`] if introspection is needed and fails.
    pub async fn get(&self) -> Result<SchemaSnapshot, CatalogError> {
        if let Some(snap) = self.snapshot.read().unwrap().clone() {
            return Ok(snap);
        }
        self.refresh().await
    }

    /// Forces re-introspection and replaces the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlx`] if introspection fails.
    pub async fn refresh(&self) -> Result<SchemaSnapshot, CatalogError> {
        let snap = introspect_schema(&self.pool).await?;
        *self.snapshot.write().unwrap() = Some(snap.clone());
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_for_filters_by_qualified_prefix() {
        let snap = SchemaSnapshot {
            tables: vec!["products".into(), "platforms".into()],
            columns: vec![
                ColumnInfo {
                    name: "products.id".into(),
                    data_type: "bigint".into(),
                    is_nullable: false,
                },
                ColumnInfo {
                    name: "platforms.id".into(),
                    data_type: "bigint".into(),
                    is_nullable: false,
                },
            ],
            foreign_keys: vec![],
        };

        let cols = snap.columns_for("products");
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].name, "products.id");
    }

    #[test]
    fn foreign_keys_for_matches_either_side() {
        let snap = SchemaSnapshot {
            tables: vec![],
            columns: vec![],
            foreign_keys: vec![ForeignKeyInfo {
                from_table: "current_prices".into(),
                from_column: "product_id".into(),
                to_table: "products".into(),
                to_column: "id".into(),
                indexed: true,
            }],
        };

        assert_eq!(snap.foreign_keys_for("products").len(), 1);
        assert_eq!(snap.foreign_keys_for("current_prices").len(), 1);
        assert_eq!(snap.foreign_keys_for("discounts").len(), 0);
    }
}
