// src/store/dimension.rs
use anyhow::{anyhow, Context, Result};
use sqlx::{Any, AnyConnection};
use tracing::{debug, trace};

use super::{SECTIONS, SPECIALITIES};

/// A natural key of a deduplicated lookup table.
///
/// The table must carry a UNIQUE constraint over `COLUMNS` and an integer
/// surrogate `id`.
pub trait DimensionKey {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Values in `COLUMNS` order.
    fn values(&self) -> Vec<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecialityKey {
    pub palier: String,
    pub specialite: String,
}

impl SpecialityKey {
    /// Absent cells become empty strings so the UNIQUE constraint still applies.
    pub fn new(palier: Option<&str>, specialite: Option<&str>) -> Self {
        Self {
            palier: palier.unwrap_or_default().to_string(),
            specialite: specialite.unwrap_or_default().to_string(),
        }
    }
}

impl DimensionKey for SpecialityKey {
    const TABLE: &'static str = SPECIALITIES;
    const COLUMNS: &'static [&'static str] = &["palier", "specialite"];

    fn values(&self) -> Vec<&str> {
        vec![self.palier.as_str(), self.specialite.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionKey {
    pub section_name: String,
}

impl SectionKey {
    pub fn new(section_name: Option<&str>) -> Self {
        Self {
            section_name: section_name.unwrap_or_default().to_string(),
        }
    }
}

impl DimensionKey for SectionKey {
    const TABLE: &'static str = SECTIONS;
    const COLUMNS: &'static [&'static str] = &["section_name"];

    fn values(&self) -> Vec<&str> {
        vec![self.section_name.as_str()]
    }
}

fn select_sql<K: DimensionKey>() -> String {
    let filter = K::COLUMNS
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!("SELECT id FROM {} WHERE {}", K::TABLE, filter)
}

fn insert_sql<K: DimensionKey>() -> String {
    let placeholders = vec!["?"; K::COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        K::TABLE,
        K::COLUMNS.join(", "),
        placeholders
    )
}

async fn lookup<K: DimensionKey>(conn: &mut AnyConnection, key: &K) -> Result<Option<i64>> {
    let sql = select_sql::<K>();
    let mut query = sqlx::query_scalar::<Any, i64>(&sql);
    for v in key.values() {
        query = query.bind(v);
    }
    query
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("looking up {}", K::TABLE))
}

/// Id of the row matching `key`, inserting it first if needed.
///
/// The id is always read back by natural key, never from the insert result.
/// A unique violation on insert means another writer got there first, so the
/// row is looked up again instead of failing.
pub async fn resolve<K: DimensionKey + std::fmt::Debug>(
    conn: &mut AnyConnection,
    key: &K,
) -> Result<i64> {
    if let Some(id) = lookup(conn, key).await? {
        trace!(table = K::TABLE, id, ?key, "dimension hit");
        return Ok(id);
    }

    let sql = insert_sql::<K>();
    let mut insert = sqlx::query::<Any>(&sql);
    for v in key.values() {
        insert = insert.bind(v);
    }

    match insert.execute(&mut *conn).await {
        Ok(_) => {
            let id = lookup(conn, key)
                .await?
                .ok_or_else(|| anyhow!("{} row missing after insert", K::TABLE))?;
            debug!(table = K::TABLE, id, ?key, "dimension created");
            Ok(id)
        }
        Err(e)
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()) =>
        {
            lookup(conn, key)
                .await?
                .ok_or_else(|| anyhow!("{} row vanished after unique violation", K::TABLE))
        }
        Err(e) => Err(e).with_context(|| format!("inserting into {}", K::TABLE)),
    }
}
