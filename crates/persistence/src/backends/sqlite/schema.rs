//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::MigrationError {
            message: format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
        }));
    }

    Ok(())
}

fn internal(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| internal(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| internal(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    // A collection exists while it has a row here, even with no documents.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections (
            db TEXT NOT NULL,
            coll TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (db, coll)
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create collections table: {}", e)))?;

    // id holds the canonical JSON text of the _id value; data the whole document.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            db TEXT NOT NULL,
            coll TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (db, coll, id)
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create documents table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS indexes (
            db TEXT NOT NULL,
            coll TEXT NOT NULL,
            name TEXT NOT NULL,
            spec TEXT NOT NULL,
            PRIMARY KEY (db, coll, name)
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create indexes table: {}", e)))?;

    Ok(())
}
