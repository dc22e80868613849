//! SQLite-backed chunk metadata store.
//!
//! One WAL-mode database file holds every chunk record, keyed by the
//! content-derived id, with secondary indexes on file, kind, language, name
//! and vector slot. Vectors themselves live in the ANN index; the store only
//! records which slot a chunk occupies.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use tokio::task::spawn_blocking;

use crate::error::Result;
use crate::error::RetrievalErr;
use crate::types::Chunk;
use crate::types::SearchFilter;

/// Aggregate counts for `index status`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub total_chunks: i64,
    pub total_files: i64,
    pub by_kind: Vec<(String, i64)>,
    pub by_language: Vec<(String, i64)>,
}

/// Chunk metadata store.
pub struct ChunkStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl ChunkStore {
    /// Open or create the database and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RetrievalErr::StoreOpen {
                path: db_path.to_path_buf(),
                cause: format!("failed to create data dir: {e}"),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| RetrievalErr::StoreOpen {
            path: db_path.to_path_buf(),
            cause: e.to_string(),
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -4000;",
        )
        .map_err(|e| RetrievalErr::StoreOpen {
            path: db_path.to_path_buf(),
            cause: format!("pragma init failed: {e}"),
        })?;

        Self::init_schema(&conn, db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: db_path.to_path_buf(),
        })
    }

    fn init_schema(conn: &Connection, path: &Path) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                file TEXT NOT NULL,
                language TEXT NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                signature TEXT NOT NULL,
                parent_name TEXT,
                parent_id TEXT,
                content TEXT NOT NULL,
                start_line INTEGER NOT NULL CHECK (start_line >= 1),
                end_line INTEGER NOT NULL CHECK (end_line >= start_line),
                content_hash TEXT NOT NULL,
                file_hash TEXT NOT NULL DEFAULT '',
                indexed_at INTEGER NOT NULL DEFAULT 0,
                vector_slot INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file);
            CREATE INDEX IF NOT EXISTS idx_chunks_kind ON chunks(kind);
            CREATE INDEX IF NOT EXISTS idx_chunks_language ON chunks(language);
            CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name);
            CREATE INDEX IF NOT EXISTS idx_chunks_slot ON chunks(vector_slot);",
        )
        .map_err(|e| RetrievalErr::StoreOpen {
            path: path.to_path_buf(),
            cause: format!("schema init failed: {e}"),
        })?;
        Ok(())
    }

    /// Run a closure against the connection on the blocking pool.
    async fn query<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();

        spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| RetrievalErr::SqliteFailed {
                operation: "lock connection".to_string(),
                cause: "mutex poisoned".to_string(),
            })?;
            f(&guard)
        })
        .await
        .map_err(|e| RetrievalErr::SqliteFailed {
            operation: format!("spawn_blocking for {}", path.display()),
            cause: e.to_string(),
        })?
    }

    /// Upsert a single chunk. Reinserting the same id replaces the row.
    pub async fn insert(&self, chunk: Chunk, slot: i64, file_hash: String) -> Result<()> {
        self.query(move |conn| insert_row(conn, &chunk, Some(slot), &file_hash))
            .await
    }

    /// Upsert a batch in one transaction; any row failure rolls back all.
    ///
    /// `slots[i]` pairs with `chunks[i]`. This is the only multi-row write
    /// path during a build; single-row paths exist for the watcher.
    pub async fn insert_batch(
        &self,
        chunks: Vec<Chunk>,
        slots: Vec<i64>,
        file_hash: String,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != slots.len() {
            return Err(RetrievalErr::SqliteFailed {
                operation: "insert batch".to_string(),
                cause: format!("{} chunks with {} slots", chunks.len(), slots.len()),
            });
        }

        self.query(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "begin transaction".to_string(),
                    cause: e.to_string(),
                })?;

            for (chunk, slot) in chunks.iter().zip(&slots) {
                insert_row(&tx, chunk, Some(*slot), &file_hash)?;
            }

            tx.commit().map_err(|e| RetrievalErr::SqliteFailed {
                operation: "commit batch".to_string(),
                cause: e.to_string(),
            })?;
            Ok(())
        })
        .await
    }

    /// Fetch one chunk by id.
    pub async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let id = id.to_string();
        self.query(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM chunks WHERE id = ?1"),
                params![id],
                row_to_chunk,
            )
            .optional()
            .map_err(|e| RetrievalErr::SqliteFailed {
                operation: "get chunk".to_string(),
                cause: e.to_string(),
            })
        })
        .await
    }

    /// Fetch the chunk occupying a vector slot.
    pub async fn get_by_slot(&self, slot: i64) -> Result<Option<Chunk>> {
        self.query(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM chunks WHERE vector_slot = ?1"),
                params![slot],
                row_to_chunk,
            )
            .optional()
            .map_err(|e| RetrievalErr::SqliteFailed {
                operation: "get chunk by slot".to_string(),
                cause: e.to_string(),
            })
        })
        .await
    }

    /// All chunks of a file, ordered by start line.
    pub async fn get_by_file(&self, file: &str) -> Result<Vec<Chunk>> {
        let file = file.to_string();
        self.query(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM chunks WHERE file = ?1 ORDER BY start_line ASC"
                ))
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "prepare get_by_file".to_string(),
                    cause: e.to_string(),
                })?;
            let rows = stmt
                .query_map(params![file], row_to_chunk)
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "get chunks by file".to_string(),
                    cause: e.to_string(),
                })?;
            collect_rows(rows)
        })
        .await
    }

    /// Delete all chunks of a file, returning the freed vector slots so the
    /// caller can tombstone them.
    pub async fn delete_by_file(&self, file: &str) -> Result<Vec<i64>> {
        let file = file.to_string();
        self.query(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "begin delete_by_file".to_string(),
                    cause: e.to_string(),
                })?;

            let mut slots = Vec::new();
            {
                let mut stmt = tx
                    .prepare(
                        "SELECT vector_slot FROM chunks
                         WHERE file = ?1 AND vector_slot IS NOT NULL",
                    )
                    .map_err(|e| RetrievalErr::SqliteFailed {
                        operation: "prepare freed slots".to_string(),
                        cause: e.to_string(),
                    })?;
                let rows = stmt
                    .query_map(params![file], |row| row.get::<_, i64>(0))
                    .map_err(|e| RetrievalErr::SqliteFailed {
                        operation: "read freed slots".to_string(),
                        cause: e.to_string(),
                    })?;
                for row in rows {
                    slots.push(row.map_err(|e| RetrievalErr::SqliteFailed {
                        operation: "read freed slot".to_string(),
                        cause: e.to_string(),
                    })?);
                }
            }

            tx.execute("DELETE FROM chunks WHERE file = ?1", params![file])
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "delete chunks by file".to_string(),
                    cause: e.to_string(),
                })?;

            tx.commit().map_err(|e| RetrievalErr::SqliteFailed {
                operation: "commit delete_by_file".to_string(),
                cause: e.to_string(),
            })?;

            Ok(slots)
        })
        .await
    }

    /// Materialize the slot set matching a filter.
    ///
    /// Glob `*` widens to SQL `LIKE %`; kind and language membership combine
    /// with AND.
    pub async fn filtered_slots(&self, filter: &SearchFilter) -> Result<HashSet<i64>> {
        let filter = filter.clone();
        self.query(move |conn| {
            let mut sql =
                String::from("SELECT vector_slot FROM chunks WHERE vector_slot IS NOT NULL");
            let mut args: Vec<String> = Vec::new();

            if let Some(glob) = &filter.file_glob {
                args.push(glob.replace('*', "%"));
                sql.push_str(&format!(" AND file LIKE ?{}", args.len()));
            }
            if !filter.kinds.is_empty() {
                let placeholders = placeholder_list(args.len(), filter.kinds.len());
                sql.push_str(&format!(" AND kind IN ({placeholders})"));
                args.extend(filter.kinds.iter().map(|k| k.as_str().to_string()));
            }
            if !filter.languages.is_empty() {
                let placeholders = placeholder_list(args.len(), filter.languages.len());
                sql.push_str(&format!(" AND language IN ({placeholders})"));
                args.extend(filter.languages.iter().map(|l| l.as_str().to_string()));
            }

            let mut stmt = stmt_or_fail(conn, &sql, "prepare filtered_slots")?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), |row| row.get::<_, i64>(0))
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "filtered slots".to_string(),
                    cause: e.to_string(),
                })?;

            let mut slots = HashSet::new();
            for row in rows {
                slots.insert(row.map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "read filtered slot".to_string(),
                    cause: e.to_string(),
                })?);
            }
            Ok(slots)
        })
        .await
    }

    /// Distinct indexed files.
    pub async fn files(&self) -> Result<Vec<String>> {
        self.query(|conn| {
            let mut stmt = stmt_or_fail(
                conn,
                "SELECT DISTINCT file FROM chunks ORDER BY file",
                "prepare files",
            )?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "list files".to_string(),
                    cause: e.to_string(),
                })?;
            let mut files = Vec::new();
            for row in rows {
                files.push(row.map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "read file".to_string(),
                    cause: e.to_string(),
                })?);
            }
            Ok(files)
        })
        .await
    }

    /// Total chunk count.
    pub async fn count(&self) -> Result<i64> {
        self.query(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "count chunks".to_string(),
                    cause: e.to_string(),
                })
        })
        .await
    }

    /// Chunk count for one file.
    pub async fn count_by_file(&self, file: &str) -> Result<i64> {
        let file = file.to_string();
        self.query(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE file = ?1",
                params![file],
                |r| r.get(0),
            )
            .map_err(|e| RetrievalErr::SqliteFailed {
                operation: "count chunks by file".to_string(),
                cause: e.to_string(),
            })
        })
        .await
    }

    /// Stored whole-file content hash, for incremental change detection.
    pub async fn file_hash(&self, file: &str) -> Result<Option<String>> {
        let file = file.to_string();
        self.query(move |conn| {
            conn.query_row(
                "SELECT file_hash FROM chunks WHERE file = ?1 LIMIT 1",
                params![file],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| RetrievalErr::SqliteFailed {
                operation: "get file hash".to_string(),
                cause: e.to_string(),
            })
        })
        .await
    }

    /// Totals plus grouped counts by kind and by language.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.query(|conn| {
            let total_chunks: i64 = conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "stats total".to_string(),
                    cause: e.to_string(),
                })?;
            let total_files: i64 = conn
                .query_row("SELECT COUNT(DISTINCT file) FROM chunks", [], |r| r.get(0))
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "stats files".to_string(),
                    cause: e.to_string(),
                })?;

            let by_kind = grouped_counts(conn, "kind")?;
            let by_language = grouped_counts(conn, "language")?;

            Ok(StoreStats {
                total_chunks,
                total_files,
                by_kind,
                by_language,
            })
        })
        .await
    }

    /// Flush the write-ahead log into the main database file.
    pub async fn checkpoint(&self) -> Result<()> {
        self.query(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "wal checkpoint".to_string(),
                    cause: e.to_string(),
                })
        })
        .await
    }

    /// Ask SQLite to release pooled memory back to the allocator.
    pub async fn shrink_memory(&self) -> Result<()> {
        self.query(|conn| {
            conn.execute_batch("PRAGMA shrink_memory;").map_err(|e| {
                RetrievalErr::SqliteFailed {
                    operation: "shrink memory".to_string(),
                    cause: e.to_string(),
                }
            })
        })
        .await
    }

    /// Remove every chunk (force rebuild, `index clear`).
    pub async fn clear(&self) -> Result<()> {
        self.query(|conn| {
            conn.execute("DELETE FROM chunks", [])
                .map_err(|e| RetrievalErr::SqliteFailed {
                    operation: "clear chunks".to_string(),
                    cause: e.to_string(),
                })?;
            Ok(())
        })
        .await
    }
}

const COLUMNS: &str = "id, file, language, kind, name, signature, parent_name, parent_id, \
                       content, start_line, end_line, content_hash, vector_slot";

fn insert_row(
    conn: &Connection,
    chunk: &Chunk,
    slot: Option<i64>,
    file_hash: &str,
) -> Result<()> {
    conn.prepare_cached(
        "INSERT OR REPLACE INTO chunks
         (id, file, language, kind, name, signature, parent_name, parent_id,
          content, start_line, end_line, content_hash, file_hash, indexed_at,
          vector_slot)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            chunk.id,
            chunk.file,
            chunk.language.as_str(),
            chunk.kind.as_str(),
            chunk.name,
            chunk.signature,
            chunk.parent_name,
            chunk.parent_id,
            chunk.content,
            chunk.start_line,
            chunk.end_line,
            chunk.content_hash,
            file_hash,
            chrono::Utc::now().timestamp(),
            slot.or(chunk.vector_slot),
        ])
    })
    .map_err(|e| RetrievalErr::SqliteFailed {
        operation: "insert chunk".to_string(),
        cause: e.to_string(),
    })?;
    Ok(())
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let language: String = row.get(2)?;
    let kind: String = row.get(3)?;
    Ok(Chunk {
        id: row.get(0)?,
        file: row.get(1)?,
        language: language.parse().unwrap_or(crate::types::Language::Unknown),
        kind: kind.parse().unwrap_or(crate::types::ChunkKind::Block),
        name: row.get(4)?,
        signature: row.get(5)?,
        parent_name: row.get(6)?,
        parent_id: row.get(7)?,
        content: row.get(8)?,
        start_line: row.get(9)?,
        end_line: row.get(10)?,
        content_hash: row.get(11)?,
        vector_slot: row.get(12)?,
    })
}

fn collect_rows(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row) -> rusqlite::Result<Chunk>>,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for row in rows {
        chunks.push(row.map_err(|e| RetrievalErr::SqliteFailed {
            operation: "read chunk row".to_string(),
            cause: e.to_string(),
        })?);
    }
    Ok(chunks)
}

fn stmt_or_fail<'a>(
    conn: &'a Connection,
    sql: &str,
    operation: &str,
) -> Result<rusqlite::Statement<'a>> {
    conn.prepare(sql).map_err(|e| RetrievalErr::SqliteFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    })
}

fn grouped_counts(conn: &Connection, column: &str) -> Result<Vec<(String, i64)>> {
    // `column` is one of two compile-time literals, never user input.
    let sql = format!(
        "SELECT {column}, COUNT(*) FROM chunks GROUP BY {column} ORDER BY COUNT(*) DESC"
    );
    let mut stmt = stmt_or_fail(conn, &sql, "prepare grouped counts")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| RetrievalErr::SqliteFailed {
            operation: "grouped counts".to_string(),
            cause: e.to_string(),
        })?;
    let mut counts = Vec::new();
    for row in rows {
        counts.push(row.map_err(|e| RetrievalErr::SqliteFailed {
            operation: "read grouped count".to_string(),
            cause: e.to_string(),
        })?);
    }
    Ok(counts)
}

/// `?N, ?N+1, …` placeholder list starting after `offset` bound args.
fn placeholder_list(offset: usize, count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", offset + i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "chunk_store.test.rs"]
mod tests;
