//! DocumentStore implementation for SQLite.
//!
//! Documents are stored whole as JSON text. Filters, sorting and unique index
//! checks are evaluated in process over the documents of one collection; an
//! exact `_id` equality is answered by primary key lookup. Every write runs in
//! an immediate transaction so its check and its write cannot interleave with
//! another writer.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use uuid::Uuid;

use crate::core::{DocumentStore, FindOptions, IndexSpec, ServerInfo, UpdateOutcome, WriteModel};
use crate::error::{BackendError, ErrorCode, StorageError, StorageResult};
use crate::query::{Condition, Filter, Update, compare_documents, lookup, values_equal};
use crate::types::{BulkItemError, BulkWriteResult, Document, ID_FIELD};

use super::SqliteStore;

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

/// Canonical text of an id value, used as the primary key column.
///
/// Numerically equal ids share a key: `7` and `7.0` address one document.
fn id_key(id: &Value) -> StorageResult<String> {
    serde_json::to_string(&canonical_id(id)).map_err(|e| serialization_error(e.to_string()))
}

/// Rewrites whole floats as integers, recursively.
fn canonical_id(id: &Value) -> Value {
    match id {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => id.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonical_id).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), canonical_id(v)))
                .collect(),
        ),
        _ => id.clone(),
    }
}

fn document_id(doc: &Document) -> StorageResult<&Value> {
    doc.get(ID_FIELD)
        .ok_or_else(|| serialization_error("stored document has no _id".to_string()))
}

fn generate_id() -> Value {
    Value::String(Uuid::new_v4().simple().to_string())
}

/// Returns the `_id` an equality filter pins, if any.
fn exact_id(filter: &Filter) -> Option<&Value> {
    match filter {
        Filter::Field {
            path,
            condition: Condition::Eq(value),
        } if path == ID_FIELD => Some(value),
        Filter::And(items) => items.iter().find_map(exact_id),
        _ => None,
    }
}

/// Builds the document an upsert starts from: the filter's equality clauses.
fn upsert_seed(filter: &Filter) -> StorageResult<Document> {
    fn collect(filter: &Filter, update: Update) -> Update {
        match filter {
            Filter::Field {
                path,
                condition: Condition::Eq(value),
            } => update.set(path.clone(), value.clone()),
            Filter::And(items) => items.iter().fold(update, |u, f| collect(f, u)),
            _ => update,
        }
    }

    let mut seed = Document::new();
    collect(filter, Update::default()).apply(&mut seed)?;
    Ok(seed)
}

fn parse_document(data: &str) -> StorageResult<Document> {
    serde_json::from_str(data).map_err(|e| serialization_error(e.to_string()))
}

fn ensure_collection(conn: &Connection, db: &str, coll: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO collections (db, coll, created_at) VALUES (?1, ?2, ?3)",
        params![db, coll, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn load_all(conn: &Connection, db: &str, coll: &str) -> StorageResult<Vec<Document>> {
    let mut stmt =
        conn.prepare_cached("SELECT data FROM documents WHERE db = ?1 AND coll = ?2 ORDER BY rowid")?;
    let rows = stmt.query_map(params![db, coll], |row| row.get::<_, String>(0))?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(parse_document(&row?)?);
    }
    Ok(docs)
}

fn load_matching(
    conn: &Connection,
    db: &str,
    coll: &str,
    filter: &Filter,
) -> StorageResult<Vec<Document>> {
    if let Some(id) = exact_id(filter) {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE db = ?1 AND coll = ?2 AND id = ?3",
                params![db, coll, id_key(id)?],
                |row| row.get(0),
            )
            .optional()?;
        return match data {
            Some(data) => {
                let doc = parse_document(&data)?;
                Ok(if filter.matches(&doc) { vec![doc] } else { Vec::new() })
            }
            None => Ok(Vec::new()),
        };
    }

    Ok(load_all(conn, db, coll)?
        .into_iter()
        .filter(|doc| filter.matches(doc))
        .collect())
}

fn load_indexes(conn: &Connection, db: &str, coll: &str) -> StorageResult<Vec<IndexSpec>> {
    let mut stmt =
        conn.prepare_cached("SELECT spec FROM indexes WHERE db = ?1 AND coll = ?2 ORDER BY rowid")?;
    let rows = stmt.query_map(params![db, coll], |row| row.get::<_, String>(0))?;

    let mut specs = Vec::new();
    for row in rows {
        specs.push(serde_json::from_str(&row?).map_err(|e| serialization_error(e.to_string()))?);
    }
    Ok(specs)
}

/// Values of the indexed fields, or `None` when a sparse index skips the document.
fn index_key(spec: &IndexSpec, doc: &Document) -> Option<Vec<Value>> {
    let values: Vec<Option<&Value>> = spec.fields().map(|f| lookup(doc, f)).collect();
    if spec.sparse && values.iter().all(Option::is_none) {
        return None;
    }
    Some(values.into_iter().map(|v| v.cloned().unwrap_or(Value::Null)).collect())
}

fn same_key(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

fn duplicate_key(db: &str, coll: &str, index: &str, key: &[Value]) -> StorageError {
    StorageError::coded(
        ErrorCode::DUPLICATE_KEY,
        format!(
            "E11000 duplicate key error collection: {}.{} index: {} dup key: {}",
            db,
            coll,
            index,
            Value::Array(key.to_vec())
        ),
    )
}

/// Rejects `doc` if it collides with another document on a unique index.
fn check_unique(conn: &Connection, db: &str, coll: &str, doc: &Document) -> StorageResult<()> {
    let unique: Vec<IndexSpec> = load_indexes(conn, db, coll)?
        .into_iter()
        .filter(|spec| spec.unique)
        .collect();
    if unique.is_empty() {
        return Ok(());
    }

    let id = document_id(doc)?;
    let others = load_all(conn, db, coll)?;
    for spec in &unique {
        let Some(key) = index_key(spec, doc) else {
            continue;
        };
        let collides = others
            .iter()
            .filter(|other| other.get(ID_FIELD).is_none_or(|other_id| !values_equal(other_id, id)))
            .filter_map(|other| index_key(spec, other))
            .any(|other_key| same_key(&key, &other_key));
        if collides {
            return Err(duplicate_key(db, coll, &spec.name, &key));
        }
    }
    Ok(())
}

/// Returns `doc` with `_id` set to `id` as its first field.
fn with_leading_id(id: Value, doc: Document) -> Document {
    let mut out = Document::new();
    out.insert(ID_FIELD.to_string(), id);
    out.extend(doc.into_iter().filter(|(k, _)| k != ID_FIELD));
    out
}

fn insert_document(conn: &Connection, db: &str, coll: &str, mut doc: Document) -> StorageResult<Value> {
    let id = match doc.get(ID_FIELD) {
        Some(id) => id.clone(),
        None => {
            let id = generate_id();
            doc = with_leading_id(id.clone(), doc);
            id
        }
    };

    ensure_collection(conn, db, coll)?;
    check_unique(conn, db, coll, &doc)?;
    let data = serde_json::to_string(&doc)?;
    conn.execute(
        "INSERT INTO documents (db, coll, id, data) VALUES (?1, ?2, ?3, ?4)",
        params![db, coll, id_key(&id)?, data],
    )?;
    Ok(id)
}

fn write_document(conn: &Connection, db: &str, coll: &str, doc: &Document) -> StorageResult<()> {
    check_unique(conn, db, coll, doc)?;
    let data = serde_json::to_string(doc)?;
    conn.execute(
        "UPDATE documents SET data = ?4 WHERE db = ?1 AND coll = ?2 AND id = ?3",
        params![db, coll, id_key(document_id(doc)?)?, data],
    )?;
    Ok(())
}

fn remove_document(conn: &Connection, db: &str, coll: &str, doc: &Document) -> StorageResult<u64> {
    let removed = conn.execute(
        "DELETE FROM documents WHERE db = ?1 AND coll = ?2 AND id = ?3",
        params![db, coll, id_key(document_id(doc)?)?],
    )?;
    Ok(removed as u64)
}

fn replace_one(
    conn: &Connection,
    db: &str,
    coll: &str,
    filter: &Filter,
    replacement: Document,
    upsert: bool,
) -> StorageResult<(Option<Document>, Option<Value>)> {
    match load_matching(conn, db, coll, filter)?.into_iter().next() {
        Some(old) => {
            let replacement = with_leading_id(document_id(&old)?.clone(), replacement);
            write_document(conn, db, coll, &replacement)?;
            Ok((Some(old), None))
        }
        None if upsert => {
            let replacement = match (replacement.contains_key(ID_FIELD), exact_id(filter)) {
                (false, Some(id)) => with_leading_id(id.clone(), replacement),
                _ => replacement,
            };
            let id = insert_document(conn, db, coll, replacement)?;
            Ok((None, Some(id)))
        }
        None => Ok((None, None)),
    }
}

fn update_matching(
    conn: &Connection,
    db: &str,
    coll: &str,
    filter: &Filter,
    update: &Update,
    upsert: bool,
    multi: bool,
) -> StorageResult<UpdateOutcome> {
    let mut matching = load_matching(conn, db, coll, filter)?;
    if !multi {
        matching.truncate(1);
    }

    if matching.is_empty() {
        if !upsert {
            return Ok(UpdateOutcome::default());
        }
        let mut seed = upsert_seed(filter)?;
        update.apply(&mut seed)?;
        let id = insert_document(conn, db, coll, seed)?;
        return Ok(UpdateOutcome {
            upserted_id: Some(id),
            ..Default::default()
        });
    }

    let mut outcome = UpdateOutcome::default();
    for old in matching {
        outcome.matched += 1;
        let mut updated = old.clone();
        update.apply(&mut updated)?;
        if updated != old {
            write_document(conn, db, coll, &updated)?;
            outcome.modified += 1;
        }
    }
    Ok(outcome)
}

fn delete_matching(
    conn: &Connection,
    db: &str,
    coll: &str,
    filter: &Filter,
    multi: bool,
) -> StorageResult<u64> {
    let mut matching = load_matching(conn, db, coll, filter)?;
    if !multi {
        matching.truncate(1);
    }
    let mut deleted = 0;
    for doc in &matching {
        deleted += remove_document(conn, db, coll, doc)?;
    }
    Ok(deleted)
}

fn apply_model(
    conn: &Connection,
    db: &str,
    coll: &str,
    model: WriteModel,
    result: &mut BulkWriteResult,
) -> StorageResult<()> {
    match model {
        WriteModel::InsertOne { document } => {
            let id = insert_document(conn, db, coll, document)?;
            result.inserted += 1;
            result.upserted_ids.push(id);
        }
        WriteModel::ReplaceOne {
            filter,
            replacement,
            upsert,
        } => {
            let (old, upserted) = replace_one(conn, db, coll, &filter, replacement, upsert)?;
            if old.is_some() {
                result.matched += 1;
                result.modified += 1;
            }
            result.upserted_ids.extend(upserted);
        }
        WriteModel::UpdateOne {
            filter,
            update,
            upsert,
        } => {
            let outcome = update_matching(conn, db, coll, &filter, &update, upsert, false)?;
            result.matched += outcome.matched;
            result.modified += outcome.modified;
            result.upserted_ids.extend(outcome.upserted_id);
        }
        WriteModel::UpdateMany { filter, update } => {
            let outcome = update_matching(conn, db, coll, &filter, &update, false, true)?;
            result.matched += outcome.matched;
            result.modified += outcome.modified;
        }
        WriteModel::DeleteOne { filter } => {
            result.deleted += delete_matching(conn, db, coll, &filter, false)?;
        }
        WriteModel::DeleteMany { filter } => {
            result.deleted += delete_matching(conn, db, coll, &filter, true)?;
        }
    }
    Ok(())
}

impl SqliteStore {
    /// Runs `f` inside an immediate transaction on one pooled connection.
    fn write_tx<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn server_info(&self) -> StorageResult<ServerInfo> {
        let conn = self.get_connection()?;
        let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
        Ok(ServerInfo {
            name: "SQLite".to_string(),
            version,
        })
    }

    async fn list_databases(&self) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare_cached("SELECT DISTINCT db FROM collections ORDER BY db")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    async fn list_collections(&self, db: &str) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        let mut stmt =
            conn.prepare_cached("SELECT coll FROM collections WHERE db = ?1 ORDER BY coll")?;
        let names = stmt
            .query_map([db], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    async fn collection_exists(&self, db: &str, coll: &str) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM collections WHERE db = ?1 AND coll = ?2",
                params![db, coll],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn find(
        &self,
        db: &str,
        coll: &str,
        options: &FindOptions,
    ) -> StorageResult<Vec<Document>> {
        let conn = self.get_connection()?;
        let mut docs = load_matching(&conn, db, coll, &options.filter)?;
        if !options.sort.is_empty() {
            docs.sort_by(|a, b| compare_documents(a, b, &options.sort));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, db: &str, coll: &str, filter: &Filter) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        if filter.is_empty() {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE db = ?1 AND coll = ?2",
                params![db, coll],
                |row| row.get(0),
            )?;
            return Ok(count as u64);
        }
        Ok(load_matching(&conn, db, coll, filter)?.len() as u64)
    }

    async fn insert_one(&self, db: &str, coll: &str, document: Document) -> StorageResult<Value> {
        self.write_tx(|conn| insert_document(conn, db, coll, document))
    }

    async fn find_one_and_replace(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> StorageResult<Option<Document>> {
        let (old, _) =
            self.write_tx(|conn| replace_one(conn, db, coll, filter, replacement, upsert))?;
        Ok(old)
    }

    async fn update_one(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StorageResult<UpdateOutcome> {
        self.write_tx(|conn| update_matching(conn, db, coll, filter, update, upsert, false))
    }

    async fn update_many(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        update: &Update,
    ) -> StorageResult<UpdateOutcome> {
        self.write_tx(|conn| update_matching(conn, db, coll, filter, update, false, true))
    }

    async fn delete_one(&self, db: &str, coll: &str, filter: &Filter) -> StorageResult<u64> {
        self.write_tx(|conn| delete_matching(conn, db, coll, filter, false))
    }

    async fn delete_many(&self, db: &str, coll: &str, filter: &Filter) -> StorageResult<u64> {
        self.write_tx(|conn| delete_matching(conn, db, coll, filter, true))
    }

    async fn bulk_write(
        &self,
        db: &str,
        coll: &str,
        models: Vec<WriteModel>,
        ordered: bool,
    ) -> StorageResult<BulkWriteResult> {
        self.write_tx(|conn| {
            let mut result = BulkWriteResult::default();
            for (index, model) in models.into_iter().enumerate() {
                match apply_model(conn, db, coll, model, &mut result) {
                    Ok(()) => {}
                    // per-item failures; infrastructure errors abort the batch
                    Err(e) if e.code().is_some() || matches!(e, StorageError::Query(_)) => {
                        result.errors.push(BulkItemError {
                            index,
                            code: e.code().unwrap_or(ErrorCode::INTERNAL),
                            message: e.to_string(),
                        });
                        if ordered {
                            break;
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(result)
        })
    }

    async fn drop_collection(&self, db: &str, coll: &str) -> StorageResult<()> {
        self.write_tx(|conn| {
            conn.execute(
                "DELETE FROM documents WHERE db = ?1 AND coll = ?2",
                params![db, coll],
            )?;
            conn.execute(
                "DELETE FROM indexes WHERE db = ?1 AND coll = ?2",
                params![db, coll],
            )?;
            conn.execute(
                "DELETE FROM collections WHERE db = ?1 AND coll = ?2",
                params![db, coll],
            )?;
            Ok(())
        })
    }

    async fn create_index(&self, db: &str, coll: &str, spec: &IndexSpec) -> StorageResult<()> {
        self.write_tx(|conn| {
            ensure_collection(conn, db, coll)?;

            if spec.unique {
                let docs = load_all(conn, db, coll)?;
                let mut seen: Vec<Vec<Value>> = Vec::new();
                for key in docs.iter().filter_map(|doc| index_key(spec, doc)) {
                    if seen.iter().any(|s| same_key(s, &key)) {
                        return Err(duplicate_key(db, coll, &spec.name, &key));
                    }
                    seen.push(key);
                }
            }

            let data = serde_json::to_string(spec)?;
            conn.execute(
                "INSERT OR REPLACE INTO indexes (db, coll, name, spec) VALUES (?1, ?2, ?3, ?4)",
                params![db, coll, spec.name, data],
            )?;
            Ok(())
        })
    }

    async fn list_indexes(&self, db: &str, coll: &str) -> StorageResult<Vec<IndexSpec>> {
        let conn = self.get_connection()?;
        let mut specs = vec![IndexSpec::id_index()];
        specs.extend(load_indexes(&conn, db, coll)?);
        Ok(specs)
    }

    async fn drop_index(&self, db: &str, coll: &str, name: &str) -> StorageResult<bool> {
        self.write_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM indexes WHERE db = ?1 AND coll = ?2 AND name = ?3",
                params![db, coll, name],
            )?;
            Ok(removed > 0)
        })
    }
}
