use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cw_core::error::AppError;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use super::similarity::{cosine_distance, decode_vector, encode_vector, l2_norm};
use super::{IndexStatus, QueryResult, VectorEntry, VectorStore};
use crate::embeddings::Embedder;

pub const DB_FILE_NAME: &str = "vectors.sqlite";

const MIGRATION_0001: (&str, &str) = (
    "0001_vector_store.sql",
    r#"
    CREATE TABLE entries (
      seq INTEGER PRIMARY KEY AUTOINCREMENT,
      id TEXT NOT NULL UNIQUE,
      document TEXT NOT NULL,
      metadata_json TEXT NOT NULL,
      text_sha256 TEXT NOT NULL,
      embedding BLOB NOT NULL
    );
    CREATE TABLE embedding_cache (
      model TEXT NOT NULL,
      text_sha256 TEXT NOT NULL,
      embedding BLOB NOT NULL,
      PRIMARY KEY (model, text_sha256)
    );
    CREATE TABLE index_meta (
      key TEXT PRIMARY KEY NOT NULL,
      value TEXT NOT NULL
    );
    "#,
);

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001]
}

fn sql_err(code: &'static str, message: &'static str) -> impl FnOnce(rusqlite::Error) -> AppError {
    move |e| AppError::new(code, message).with_details(e.to_string())
}

pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    conn.execute_batch(
        r#"
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(sql_err(
        "VECTOR_STORE_MIGRATION_FAILED",
        "Failed to ensure migrations table exists",
    ))?;

    let applied: HashSet<String> = {
        let mut stmt = conn
            .prepare("SELECT name FROM _migrations")
            .map_err(sql_err("VECTOR_STORE_MIGRATION_FAILED", "Failed to query applied migrations"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_err("VECTOR_STORE_MIGRATION_FAILED", "Failed to read applied migrations"))?;
        let set = rows
            .collect::<Result<HashSet<String>, _>>()
            .map_err(sql_err("VECTOR_STORE_MIGRATION_FAILED", "Failed to read applied migration row"))?;
        set
    };

    for (name, sql) in migrations() {
        if applied.contains(name) {
            continue;
        }
        let tx = conn
            .transaction()
            .map_err(sql_err("VECTOR_STORE_MIGRATION_FAILED", "Failed to start migration transaction"))?;
        tx.execute_batch(sql).map_err(|e| {
            AppError::new("VECTOR_STORE_MIGRATION_FAILED", format!("Migration {name} failed"))
                .with_details(e.to_string())
        })?;
        tx.execute(
            "INSERT INTO _migrations(name, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ','now'))",
            [name],
        )
        .map_err(sql_err("VECTOR_STORE_MIGRATION_FAILED", "Failed to record migration"))?;
        tx.commit()
            .map_err(sql_err("VECTOR_STORE_MIGRATION_FAILED", "Failed to commit migration transaction"))?;
    }
    Ok(())
}

struct EmbeddedEntry<'e> {
    entry: &'e VectorEntry,
    sha: String,
    vector: Vec<f32>,
}

struct StoredEntry {
    id: String,
    document: String,
    metadata: BTreeMap<String, String>,
    embedding: Vec<f32>,
    norm: f32,
}

/// Vector store persisted in SQLite. Documents are embedded on insert; embeddings are cached
/// per `(model, sha256(text))` so a rebuild over unchanged text does not call the embedder.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    embedder: Box<dyn Embedder>,
    model: String,
}

impl SqliteVectorStore {
    pub fn open(dir: &Path, embedder: Box<dyn Embedder>, model: &str) -> Result<Self, AppError> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new("VECTOR_STORE_OPEN_FAILED", "Failed to create vector store directory")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
        let path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&path).map_err(|e| {
            AppError::new("VECTOR_STORE_OPEN_FAILED", "Failed to open vector store database")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_connection(conn, embedder, model)
    }

    pub fn open_in_memory(embedder: Box<dyn Embedder>, model: &str) -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(sql_err(
            "VECTOR_STORE_OPEN_FAILED",
            "Failed to open in-memory vector store",
        ))?;
        Self::from_connection(conn, embedder, model)
    }

    fn from_connection(
        mut conn: Connection,
        embedder: Box<dyn Embedder>,
        model: &str,
    ) -> Result<Self, AppError> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            model: model.to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |r| r.get(0))
            .map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to count entries"))?;
        let model = read_meta(&conn, "model")?;
        let dims = read_meta(&conn, "dims")?.and_then(|d| d.parse::<u32>().ok());
        let updated_at = read_meta(&conn, "updated_at")?;
        Ok(IndexStatus {
            chunk_count: count.max(0) as u32,
            model,
            dims,
            updated_at,
        })
    }

    fn cached_or_embed(&self, tx: &Transaction<'_>, text: &str, sha: &str) -> Result<(Vec<f32>, bool), AppError> {
        let cached: Option<Vec<u8>> = tx
            .query_row(
                "SELECT embedding FROM embedding_cache WHERE model = ?1 AND text_sha256 = ?2",
                params![self.model, sha],
                |r| r.get(0),
            )
            .optional()
            .map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to read embedding cache"))?;
        if let Some(bytes) = cached {
            return Ok((decode_vector(&bytes), false));
        }

        let v = self.embedder.embed(&self.model, text)?;
        tx.execute(
            "INSERT OR REPLACE INTO embedding_cache(model, text_sha256, embedding) VALUES (?1, ?2, ?3)",
            params![self.model, sha, encode_vector(&v)],
        )
        .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to write embedding cache"))?;
        Ok((v, true))
    }

    /// Resolve a vector for every entry, checking that all share one dimension.
    fn embed_entries<'e>(
        &self,
        tx: &Transaction<'_>,
        entries: &'e [VectorEntry],
        known_dims: Option<usize>,
    ) -> Result<Vec<EmbeddedEntry<'e>>, AppError> {
        let mut dims = known_dims;
        let mut fresh = 0usize;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let sha = hex::encode(Sha256::digest(entry.document.as_bytes()));
            let (vector, was_fresh) = self.cached_or_embed(tx, &entry.document, &sha)?;
            if was_fresh {
                fresh += 1;
            }
            match dims {
                Some(d) if d != vector.len() => {
                    return Err(AppError::new(
                        "VECTOR_STORE_WRITE_FAILED",
                        "Embedding dimension mismatch across entries",
                    )
                    .with_details(format!("expected={}; got={}; id={}", d, vector.len(), entry.id)));
                }
                Some(_) => {}
                None => dims = Some(vector.len()),
            }
            out.push(EmbeddedEntry { entry, sha, vector });
        }
        debug!(entries = entries.len(), fresh, "resolved embeddings");
        Ok(out)
    }

    fn finish_write(&self, tx: Transaction<'_>, embedded: &[EmbeddedEntry<'_>]) -> Result<(), AppError> {
        write_meta(&tx, "model", &self.model)?;
        if let Some(first) = embedded.first() {
            write_meta(&tx, "dims", &first.vector.len().to_string())?;
        }
        write_meta(&tx, "updated_at", &now_rfc3339_utc()?)?;
        tx.commit()
            .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to commit write transaction"))
    }

    fn load_entries(&self) -> Result<Vec<StoredEntry>, AppError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id, document, metadata_json, embedding FROM entries ORDER BY seq ASC")
            .map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to prepare entry scan"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to scan entries"))?;

        let mut out = Vec::new();
        for r in rows {
            let (id, document, metadata_json, blob) =
                r.map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to read entry row"))?;
            let metadata: BTreeMap<String, String> =
                serde_json::from_str(&metadata_json).map_err(|e| {
                    AppError::new("VECTOR_STORE_QUERY_FAILED", "Failed to decode entry metadata")
                        .with_details(format!("id={id}; err={e}"))
                })?;
            let embedding = decode_vector(&blob);
            let norm = l2_norm(&embedding);
            out.push(StoredEntry {
                id,
                document,
                metadata,
                embedding,
                norm,
            });
        }
        Ok(out)
    }
}

impl VectorStore for SqliteVectorStore {
    fn reset(&self) -> Result<(), AppError> {
        let conn = self.lock();
        conn.execute_batch("DELETE FROM entries; DELETE FROM index_meta;")
            .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to clear vector store"))?;
        Ok(())
    }

    fn add(&self, entries: &[VectorEntry]) -> Result<(), AppError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to start write transaction"))?;
        let known_dims = read_meta(&tx, "dims")?.and_then(|d| d.parse().ok());
        let embedded = self.embed_entries(&tx, entries, known_dims)?;
        insert_entries(&tx, &embedded)?;
        self.finish_write(tx, &embedded)?;
        debug!(entries = entries.len(), "added entries to vector store");
        Ok(())
    }

    fn replace_all(&self, entries: &[VectorEntry]) -> Result<(), AppError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to start write transaction"))?;
        // Embed before touching the old rows; any error drops the transaction and rolls back.
        let embedded = self.embed_entries(&tx, entries, None)?;
        tx.execute_batch("DELETE FROM entries; DELETE FROM index_meta;")
            .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to clear vector store"))?;
        insert_entries(&tx, &embedded)?;
        self.finish_write(tx, &embedded)?;
        debug!(entries = entries.len(), "replaced vector store contents");
        Ok(())
    }

    fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResult, AppError> {
        let stored = self.load_entries()?;
        let mut out = QueryResult::default();

        for q in query_texts {
            let qv = self.embedder.embed(&self.model, q)?;
            let qnorm = l2_norm(&qv);

            let mut hits: Vec<(usize, f32)> = Vec::new();
            if qnorm > 0.0 {
                for (i, e) in stored.iter().enumerate() {
                    if e.embedding.len() != qv.len() {
                        return Err(AppError::new(
                            "VECTOR_STORE_QUERY_FAILED",
                            "Query embedding dims do not match stored dims",
                        )
                        .with_details(format!(
                            "id={}; stored={}; query={}",
                            e.id,
                            e.embedding.len(),
                            qv.len()
                        )));
                    }
                    if e.norm == 0.0 {
                        continue;
                    }
                    hits.push((i, cosine_distance(&qv, &e.embedding, qnorm, e.norm)));
                }
            }
            // Stable sort: equal distances keep insertion order.
            hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            hits.truncate(n_results);

            out.ids.push(hits.iter().map(|(i, _)| stored[*i].id.clone()).collect());
            out.documents
                .push(hits.iter().map(|(i, _)| stored[*i].document.clone()).collect());
            out.metadatas
                .push(hits.iter().map(|(i, _)| stored[*i].metadata.clone()).collect());
            out.distances.push(hits.iter().map(|(_, d)| *d).collect());
        }
        Ok(out)
    }

    fn count(&self) -> Result<usize, AppError> {
        let conn = self.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |r| r.get(0))
            .map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to count entries"))?;
        Ok(n.max(0) as usize)
    }
}

fn insert_entries(tx: &Transaction<'_>, embedded: &[EmbeddedEntry<'_>]) -> Result<(), AppError> {
    for e in embedded {
        let metadata_json = serde_json::to_string(&e.entry.metadata).map_err(|err| {
            AppError::new("VECTOR_STORE_WRITE_FAILED", "Failed to encode entry metadata")
                .with_details(err.to_string())
        })?;
        tx.execute(
            "INSERT INTO entries(id, document, metadata_json, text_sha256, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![e.entry.id, e.entry.document, metadata_json, e.sha, encode_vector(&e.vector)],
        )
        .map_err(|err| {
            AppError::new("VECTOR_STORE_WRITE_FAILED", "Failed to insert entry")
                .with_details(format!("id={}; err={}", e.entry.id, err))
        })?;
    }
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    conn.query_row("SELECT value FROM index_meta WHERE key = ?1", [key], |r| r.get(0))
        .optional()
        .map_err(sql_err("VECTOR_STORE_QUERY_FAILED", "Failed to read index metadata"))
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT OR REPLACE INTO index_meta(key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(sql_err("VECTOR_STORE_WRITE_FAILED", "Failed to write index metadata"))?;
    Ok(())
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("VECTOR_STORE_WRITE_FAILED", "Failed to format time").with_details(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LenEmbedder;

    impl Embedder for LenEmbedder {
        fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
            Ok(vec![input.len() as f32, 1.0])
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn).expect("migrate");
        migrate(&mut conn).expect("migrate again");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn empty_store_reports_not_indexed() {
        let store = SqliteVectorStore::open_in_memory(Box::new(LenEmbedder), "mock").expect("open");
        let st = store.status().expect("status");
        assert_eq!(st.chunk_count, 0);
        assert_eq!(st.model, None);
        assert_eq!(st.dims, None);
    }

    struct RefusingEmbedder;

    impl Embedder for RefusingEmbedder {
        fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
            if input.starts_with("bad") {
                return Err(AppError::new("EMBEDDINGS_FAILED", "refused"));
            }
            Ok(vec![input.len() as f32, 1.0])
        }
    }

    fn entry(id: &str, document: &str) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            document: document.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn replace_all_rolls_back_when_any_embedding_fails() {
        let store = SqliteVectorStore::open_in_memory(Box::new(RefusingEmbedder), "mock").expect("open");
        store
            .replace_all(&[entry("a-0", "alpha"), entry("b-0", "beta")])
            .expect("replace");
        let before = store.status().expect("status");

        let err = store
            .replace_all(&[entry("a-0", "alpha"), entry("b-0", "bad beta")])
            .unwrap_err();
        assert_eq!(err.code, "EMBEDDINGS_FAILED");
        assert_eq!(store.count().expect("count"), 2);
        assert_eq!(store.status().expect("status"), before);
    }

    #[test]
    fn replace_all_rolls_back_on_duplicate_ids() {
        let store = SqliteVectorStore::open_in_memory(Box::new(LenEmbedder), "mock").expect("open");
        store.replace_all(&[entry("a-0", "alpha")]).expect("replace");

        let err = store
            .replace_all(&[entry("x-0", "one"), entry("x-0", "two")])
            .unwrap_err();
        assert_eq!(err.code, "VECTOR_STORE_WRITE_FAILED");
        let res = store.query(&["alpha"], 5).expect("query");
        assert_eq!(res.ids, vec![vec!["a-0".to_string()]]);
    }

    #[test]
    fn reset_clears_entries_and_status() {
        let store = SqliteVectorStore::open_in_memory(Box::new(LenEmbedder), "mock").expect("open");
        store.add(&[entry("a-0", "alpha")]).expect("add");
        store.reset().expect("reset");
        assert_eq!(store.count().expect("count"), 0);
        assert_eq!(store.status().expect("status").model, None);
    }
}
