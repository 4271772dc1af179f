// src/store/mod.rs

use anyhow::{Context, Result};
use sqlx::{any::AnyQueryResult, Any, AnyConnection, Connection};
use tracing::info;

pub mod dimension;
pub mod student;

pub use dimension::{resolve, DimensionKey, SectionKey, SpecialityKey};
pub use student::{insert_student, NewStudent};

pub const SPECIALITIES: &str = "specialities";
pub const SECTIONS: &str = "sections";
pub const STUDENTS: &str = "students";

const MYSQL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS specialities (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        palier VARCHAR(191) NOT NULL,
        specialite VARCHAR(191) NOT NULL,
        UNIQUE KEY uq_specialities_key (palier, specialite)
    )",
    "CREATE TABLE IF NOT EXISTS sections (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        section_name VARCHAR(191) NOT NULL,
        UNIQUE KEY uq_sections_key (section_name)
    )",
    "CREATE TABLE IF NOT EXISTS students (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        matricule VARCHAR(64),
        nom VARCHAR(255),
        prenom VARCHAR(255),
        etat VARCHAR(64),
        groupe_td VARCHAR(64),
        speciality_id BIGINT NOT NULL,
        section_id BIGINT NOT NULL,
        number VARCHAR(32),
        email VARCHAR(255),
        email_alt VARCHAR(255),
        FOREIGN KEY (speciality_id) REFERENCES specialities(id),
        FOREIGN KEY (section_id) REFERENCES sections(id)
    )",
];

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS specialities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        palier TEXT NOT NULL,
        specialite TEXT NOT NULL,
        UNIQUE (palier, specialite)
    )",
    "CREATE TABLE IF NOT EXISTS sections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        section_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        matricule TEXT,
        nom TEXT,
        prenom TEXT,
        etat TEXT,
        groupe_td TEXT,
        speciality_id INTEGER NOT NULL REFERENCES specialities(id),
        section_id INTEGER NOT NULL REFERENCES sections(id),
        number TEXT,
        email TEXT,
        email_alt TEXT
    )",
];

/// The one database connection a run works through.
///
/// Components borrow it (or a transaction opened on it); nothing holds a
/// connection of its own.
pub struct Session {
    conn: AnyConnection,
}

impl Session {
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url)
            .await
            .context("connecting to database")?;
        info!(backend = conn.backend_name(), "database connected");
        Ok(Self { conn })
    }

    pub fn conn(&mut self) -> &mut AnyConnection {
        &mut self.conn
    }

    /// Create the dimension and student tables when missing.
    pub async fn ensure_schema(&mut self) -> Result<()> {
        let ddl = if self.conn.backend_name().eq_ignore_ascii_case("mysql") {
            MYSQL_SCHEMA
        } else {
            SQLITE_SCHEMA
        };
        for stmt in ddl {
            sqlx::query(*stmt)
                .execute(&mut self.conn)
                .await
                .context("creating schema")?;
        }
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await.context("closing database session")
    }
}

/// Surrogate id of the row `done` just inserted.
///
/// The `Any` driver only reports it for MySQL; SQLite is asked for
/// `last_insert_rowid()` on the same connection.
pub(crate) async fn inserted_id(conn: &mut AnyConnection, done: &AnyQueryResult) -> Result<i64> {
    if let Some(id) = done.last_insert_id() {
        return Ok(id);
    }
    if !conn.backend_name().eq_ignore_ascii_case("sqlite") {
        anyhow::bail!("{} did not report the inserted id", conn.backend_name());
    }
    sqlx::query_scalar::<Any, i64>("SELECT last_insert_rowid()")
        .fetch_one(&mut *conn)
        .await
        .context("reading last_insert_rowid")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Fresh in-memory SQLite session with the schema in place.
    pub async fn memory_session() -> Session {
        let mut session = Session::connect("sqlite::memory:")
            .await
            .expect("in-memory database");
        session.ensure_schema().await.expect("schema");
        session
    }

    pub async fn count(session: &mut Session, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(session.conn())
            .await
            .expect("count rows")
    }
}
