//! SQLite-backed `Store`.
//!
//! Uses separate reader/writer connections behind `Mutex`es for interior
//! mutability: every method takes `&self`, so `Store` is `Send + Sync` and
//! callers hold it behind a plain `Arc<Store>` rather than `Arc<Mutex<Store>>`.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{CortexError, Result, StorageError};
use crate::memory::{
    AccessLogEntry, Agent, Category, Evidence, ExtractionLogEntry, Layer, LifecycleLogEntry,
    Memory, MemoryPatch, NewMemory, Predicate, Relation,
};

use super::migrations;

/// Max hops walked in either direction when reconstructing a version chain
/// (spec §9 "bidirectional BFS bounded at 50 hops").
const VERSION_CHAIN_MAX_HOPS: usize = 50;

pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Store {
    fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;",
        )
    }

    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "cortex", "memory")
                    .ok_or_else(|| CortexError::internal("could not determine data directory"))?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir).map_err(StorageError::Io)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("brain.db")
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }

        let writer_conn = Connection::open(&path).map_err(StorageError::Sqlite)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn).map_err(StorageError::Sqlite)?;
        migrations::apply_migrations(&writer_conn)
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        let reader_conn = Connection::open(&path).map_err(StorageError::Sqlite)?;
        Self::configure_connection(&reader_conn).map_err(StorageError::Sqlite)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Some(path.to_path_buf()))
    }

    fn writer(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.writer.lock().expect("writer connection lock poisoned")
    }

    fn reader(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.reader.lock().expect("reader connection lock poisoned")
    }

    // ========================================================================
    // MEMORIES
    // ========================================================================

    pub fn insert_memory(&self, new: NewMemory) -> Result<Memory> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(&new.metadata).map_err(StorageError::Serde)?;

        let conn = self.writer();
        conn.execute(
            "INSERT INTO memories
                (id, layer, category, content, source, agent_id, importance, confidence,
                 decay_score, access_count, last_accessed, created_at, updated_at,
                 expires_at, superseded_by, is_pinned, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1.0, 0, NULL, ?9, ?9, ?10, NULL, ?11, ?12)",
            params![
                id,
                new.layer.as_str(),
                new.category.as_str(),
                new.content,
                new.source,
                new.agent_id,
                new.importance,
                new.confidence,
                now.to_rfc3339(),
                new.expires_at.map(|d| d.to_rfc3339()),
                new.is_pinned as i64,
                metadata_json,
            ],
        )
        .map_err(StorageError::Sqlite)?;

        self.get_memory_locked(&conn, &id)?
            .ok_or_else(|| CortexError::internal("memory vanished immediately after insert"))
    }

    pub fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.reader();
        self.get_memory_locked(&conn, id)
    }

    fn get_memory_locked(&self, conn: &Connection, id: &str) -> Result<Option<Memory>> {
        conn.query_row(
            "SELECT id, layer, category, content, source, agent_id, importance, confidence,
                    decay_score, access_count, last_accessed, created_at, updated_at,
                    expires_at, superseded_by, is_pinned, metadata
             FROM memories WHERE id = ?1",
            params![id],
            row_to_memory,
        )
        .optional()
        .map_err(|e| StorageError::Sqlite(e).into())
    }

    /// Fetch memories active for an agent (spec §3.1: not superseded, not
    /// expired), optionally filtered by layer/category, ordered newest-first.
    pub fn list_active_memories(
        &self,
        agent_id: &str,
        layers: Option<&[Layer]>,
        limit: i64,
    ) -> Result<Vec<Memory>> {
        let conn = self.reader();
        let now = Utc::now().to_rfc3339();

        let layer_filter = layers
            .map(|ls| {
                ls.iter()
                    .map(|l| format!("'{}'", l.as_str()))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .filter(|s| !s.is_empty());

        let sql = format!(
            "SELECT id, layer, category, content, source, agent_id, importance, confidence,
                    decay_score, access_count, last_accessed, created_at, updated_at,
                    expires_at, superseded_by, is_pinned, metadata
             FROM memories
             WHERE agent_id = ?1 AND superseded_by IS NULL
               AND (expires_at IS NULL OR expires_at > ?2)
               {}
             ORDER BY created_at DESC
             LIMIT ?3",
            layer_filter
                .map(|f| format!("AND layer IN ({f})"))
                .unwrap_or_default()
        );

        let mut stmt = conn.prepare(&sql).map_err(StorageError::Sqlite)?;
        let rows = stmt
            .query_map(params![agent_id, now, limit], row_to_memory)
            .map_err(StorageError::Sqlite)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StorageError::Sqlite(e).into())
    }

    pub fn update_memory(&self, id: &str, patch: MemoryPatch) -> Result<Memory> {
        let conn = self.writer();
        let now = Utc::now().to_rfc3339();

        let mut sets = vec!["updated_at = ?1".to_string()];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

        macro_rules! push {
            ($col:literal, $val:expr) => {{
                sets.push(format!("{} = ?{}", $col, values.len() + 1));
                values.push(Box::new($val));
            }};
        }

        if let Some(v) = patch.importance {
            push!("importance", v);
        }
        if let Some(v) = patch.confidence {
            push!("confidence", v);
        }
        if let Some(v) = patch.decay_score {
            push!("decay_score", v);
        }
        if let Some(v) = patch.layer {
            push!("layer", v.as_str().to_string());
        }
        if let Some(v) = patch.expires_at {
            push!("expires_at", v.map(|d| d.to_rfc3339()));
        }
        if let Some(v) = patch.superseded_by {
            push!("superseded_by", v);
        }
        if let Some(v) = patch.metadata {
            push!(
                "metadata",
                serde_json::to_string(&v).map_err(StorageError::Serde)?
            );
        }

        let id_placeholder = values.len() + 1;
        values.push(Box::new(id.to_string()));

        let sql = format!(
            "UPDATE memories SET {} WHERE id = ?{id_placeholder}",
            sets.join(", ")
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        let changed = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(StorageError::Sqlite)?;

        if changed == 0 {
            return Err(CortexError::not_found(format!("memory {id} not found")));
        }

        self.get_memory_locked(&conn, id)?
            .ok_or_else(|| CortexError::internal("memory vanished immediately after update"))
    }

    pub fn delete_memory(&self, id: &str) -> Result<()> {
        let conn = self.writer();
        conn.execute("DELETE FROM memories WHERE id = ?1", params![id])
            .map_err(StorageError::Sqlite)?;
        Ok(())
    }

    /// Full-text search over active memories via FTS5 (spec §4.1, §4.4 step 1).
    /// `query` must already be sanitized for FTS5 syntax.
    pub fn search_fulltext(
        &self,
        query: &str,
        agent_id: &str,
        limit: i64,
    ) -> Result<Vec<(Memory, i64)>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.reader();
        let now = Utc::now().to_rfc3339();

        let mut stmt = conn
            .prepare(
                "SELECT m.id, m.layer, m.category, m.content, m.source, m.agent_id,
                        m.importance, m.confidence, m.decay_score, m.access_count,
                        m.last_accessed, m.created_at, m.updated_at, m.expires_at,
                        m.superseded_by, m.is_pinned, m.metadata, f.rank
                 FROM memories_fts f
                 JOIN memories m ON m.rowid = f.rowid
                 WHERE f.memories_fts MATCH ?1
                   AND m.agent_id = ?2
                   AND m.superseded_by IS NULL
                   AND (m.expires_at IS NULL OR m.expires_at > ?3)
                 ORDER BY f.rank
                 LIMIT ?4",
            )
            .map_err(StorageError::Sqlite)?;

        let rows = stmt
            .query_map(params![query, agent_id, now, limit], |row| {
                let memory = row_to_memory(row)?;
                // FTS5 rank is negative (more negative = more relevant); expose
                // a plain 0-based position instead since callers only need
                // ordering, produced by the query itself.
                Ok((memory, 0i64))
            })
            .map_err(StorageError::Sqlite)?;

        let mut results: Vec<(Memory, i64)> = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StorageError::Sqlite(e))?;
        for (rank, (_, r)) in results.iter_mut().enumerate() {
            *r = rank as i64;
        }
        Ok(results)
    }

    /// Record a recall/bump touch and increment the memory's access stats
    /// (spec §4.4 step 7, §4.7 step 5). Best-effort: callers swallow errors.
    pub fn bump_access(&self, memory_id: &str, agent_id: &str, context: &str) -> Result<()> {
        let conn = self.writer();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE memories SET access_count = access_count + 1, last_accessed = ?1 WHERE id = ?2",
            params![now, memory_id],
        )
        .map_err(StorageError::Sqlite)?;

        conn.execute(
            "INSERT INTO access_log (memory_id, agent_id, accessed_at, context) VALUES (?1, ?2, ?3, ?4)",
            params![memory_id, agent_id, now, context],
        )
        .map_err(StorageError::Sqlite)?;

        Ok(())
    }

    /// Reconstruct the full version chain containing `id` (spec §3.1, §9):
    /// walk `superseded_by` forward and the reverse edge backward, each
    /// bounded at `VERSION_CHAIN_MAX_HOPS` hops, oldest first.
    pub fn get_memory_version_chain(&self, id: &str) -> Result<Vec<Memory>> {
        let conn = self.reader();
        let mut chain = VecDeque::new();
        let mut seen = HashSet::new();

        let Some(start) = self.get_memory_locked(&conn, id)? else {
            return Ok(Vec::new());
        };
        seen.insert(start.id.clone());
        chain.push_back(start.clone());

        // Walk backward (who points to this one via superseded_by).
        let mut cursor = start.id.clone();
        for _ in 0..VERSION_CHAIN_MAX_HOPS {
            let predecessor: Option<Memory> = conn
                .query_row(
                    "SELECT id, layer, category, content, source, agent_id, importance, confidence,
                            decay_score, access_count, last_accessed, created_at, updated_at,
                            expires_at, superseded_by, is_pinned, metadata
                     FROM memories WHERE superseded_by = ?1",
                    params![cursor],
                    row_to_memory,
                )
                .optional()
                .map_err(StorageError::Sqlite)?;
            match predecessor {
                Some(m) if seen.insert(m.id.clone()) => {
                    cursor = m.id.clone();
                    chain.push_front(m);
                }
                _ => break,
            }
        }

        // Walk forward (superseded_by chain).
        let mut cursor = start.superseded_by.clone();
        for _ in 0..VERSION_CHAIN_MAX_HOPS {
            let Some(next_id) = cursor else { break };
            if !seen.insert(next_id.clone()) {
                break;
            }
            let Some(next) = self.get_memory_locked(&conn, &next_id)? else {
                break;
            };
            cursor = next.superseded_by.clone();
            chain.push_back(next);
        }

        Ok(chain.into_iter().collect())
    }

    // ========================================================================
    // RELATIONS
    // ========================================================================

    /// Upsert a relation with EMA-smoothed confidence (spec §4.6). `source_memory_id`
    /// is written only if the existing row's was null; `expired`, when `Some`,
    /// overwrites the stored flag regardless of the previous value.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_relation(
        &self,
        agent_id: &str,
        subject: &str,
        predicate: Predicate,
        object: &str,
        raw_confidence: f64,
        source: &str,
        source_memory_id: Option<&str>,
        expired: Option<bool>,
    ) -> Result<Relation> {
        let conn = self.writer();
        let now = Utc::now();

        let existing: Option<(String, f64, i64, Option<String>)> = conn
            .query_row(
                "SELECT id, confidence, extraction_count, source_memory_id FROM relations
                 WHERE agent_id = ?1 AND subject = ?2 AND predicate = ?3 AND object = ?4",
                params![agent_id, subject, predicate.as_str(), object],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(StorageError::Sqlite)?;

        let relation_id = if let Some((id, prev_confidence, prev_count, prev_source_memory_id)) = existing {
            let new_confidence = Relation::ema_confidence(prev_confidence, raw_confidence);
            let new_source_memory_id = prev_source_memory_id.or_else(|| source_memory_id.map(str::to_string));
            conn.execute(
                "UPDATE relations SET confidence = ?1, extraction_count = ?2, updated_at = ?3,
                    source_memory_id = ?4,
                    expired = COALESCE(?5, expired)
                 WHERE id = ?6",
                params![
                    new_confidence,
                    prev_count + 1,
                    now.to_rfc3339(),
                    new_source_memory_id,
                    expired.map(|e| e as i64),
                    id,
                ],
            )
            .map_err(StorageError::Sqlite)?;
            id
        } else {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO relations
                    (id, agent_id, subject, predicate, object, confidence, source_memory_id,
                     source, extraction_count, expired, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?10)",
                params![
                    id,
                    agent_id,
                    subject,
                    predicate.as_str(),
                    object,
                    raw_confidence,
                    source_memory_id,
                    source,
                    expired.unwrap_or(false) as i64,
                    now.to_rfc3339(),
                ],
            )
            .map_err(StorageError::Sqlite)?;
            id
        };

        if let Some(memory_id) = source_memory_id {
            conn.execute(
                "INSERT INTO relation_evidence (relation_id, memory_id, extracted_at, raw_confidence)
                 VALUES (?1, ?2, ?3, ?4)",
                params![relation_id, memory_id, now.to_rfc3339(), raw_confidence],
            )
            .map_err(StorageError::Sqlite)?;
        }

        self.get_relation_locked(&conn, &relation_id)?
            .ok_or_else(|| CortexError::internal("relation vanished immediately after upsert"))
    }

    #[allow(clippy::type_complexity)]
    fn get_relation_locked(&self, conn: &Connection, id: &str) -> Result<Option<Relation>> {
        let relation: Option<(
            String,
            String,
            String,
            String,
            String,
            f64,
            Option<String>,
            String,
            i64,
            bool,
            String,
            String,
        )> = conn
            .query_row(
                "SELECT id, agent_id, subject, predicate, object, confidence,
                        source_memory_id, source, extraction_count, expired, created_at, updated_at
                 FROM relations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                        row.get(11)?,
                    ))
                },
            )
            .optional()
            .map_err(StorageError::Sqlite)?;

        let Some((
            id,
            agent_id,
            subject,
            predicate,
            object,
            confidence,
            source_memory_id,
            source,
            count,
            expired,
            created_at,
            updated_at,
        )) = relation
        else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(
                "SELECT memory_id, extracted_at, raw_confidence FROM relation_evidence
                 WHERE relation_id = ?1 ORDER BY extracted_at ASC",
            )
            .map_err(StorageError::Sqlite)?;
        let evidence = stmt
            .query_map(params![id], |row| {
                Ok(Evidence {
                    memory_id: row.get(0)?,
                    extracted_at: parse_timestamp(&row.get::<_, String>(1)?)?,
                    raw_confidence: row.get(2)?,
                })
            })
            .map_err(StorageError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::Sqlite)?;

        Ok(Some(Relation {
            id,
            agent_id,
            subject,
            predicate: Predicate::parse(&predicate)
                .ok_or_else(|| StorageError::Migration(format!("bad predicate: {predicate}")))?,
            object,
            confidence,
            source_memory_id,
            source,
            extraction_count: count,
            expired,
            evidence,
            created_at: parse_timestamp(&created_at).map_err(StorageError::Sqlite)?,
            updated_at: parse_timestamp(&updated_at).map_err(StorageError::Sqlite)?,
        }))
    }

    pub fn list_relations(&self, agent_id: &str, limit: i64) -> Result<Vec<Relation>> {
        let conn = self.reader();
        let mut stmt = conn
            .prepare(
                "SELECT id FROM relations WHERE agent_id = ?1 ORDER BY updated_at DESC LIMIT ?2",
            )
            .map_err(StorageError::Sqlite)?;
        let ids: Vec<String> = stmt
            .query_map(params![agent_id, limit], |row| row.get(0))
            .map_err(StorageError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::Sqlite)?;
        drop(stmt);

        ids.into_iter()
            .filter_map(|id| self.get_relation_locked(&conn, &id).transpose())
            .collect()
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    pub fn ensure_agent(&self, agent_id: &str) -> Result<Agent> {
        let conn = self.writer();
        let now = Utc::now();
        conn.execute(
            "INSERT OR IGNORE INTO agents (id, display_name, created_at, profile, profile_updated_at)
             VALUES (?1, NULL, ?2, NULL, NULL)",
            params![agent_id, now.to_rfc3339()],
        )
        .map_err(StorageError::Sqlite)?;

        self.get_agent_locked(&conn, agent_id)?
            .ok_or_else(|| CortexError::internal("agent vanished immediately after insert"))
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        let conn = self.reader();
        self.get_agent_locked(&conn, agent_id)
    }

    fn get_agent_locked(&self, conn: &Connection, agent_id: &str) -> Result<Option<Agent>> {
        conn.query_row(
            "SELECT id, display_name, created_at, profile, profile_updated_at FROM agents WHERE id = ?1",
            params![agent_id],
            |row| {
                let profile_text: Option<String> = row.get(3)?;
                let updated_text: Option<String> = row.get(4)?;
                Ok(Agent {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    created_at: parse_timestamp(&row.get::<_, String>(2)?)?,
                    profile: profile_text
                        .map(|t| serde_json::from_str(&t))
                        .transpose()
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        ))?,
                    profile_updated_at: updated_text.map(|t| parse_timestamp(&t)).transpose()?,
                })
            },
        )
        .optional()
        .map_err(|e| StorageError::Sqlite(e).into())
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let conn = self.reader();
        let mut stmt = conn
            .prepare("SELECT id FROM agents ORDER BY created_at ASC")
            .map_err(StorageError::Sqlite)?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(StorageError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::Sqlite)?;
        drop(stmt);

        ids.into_iter()
            .filter_map(|id| self.get_agent_locked(&conn, &id).transpose())
            .collect()
    }

    pub fn update_agent_profile(&self, agent_id: &str, profile: serde_json::Value) -> Result<()> {
        let conn = self.writer();
        let now = Utc::now().to_rfc3339();
        let profile_json = serde_json::to_string(&profile).map_err(StorageError::Serde)?;
        conn.execute(
            "UPDATE agents SET profile = ?1, profile_updated_at = ?2 WHERE id = ?3",
            params![profile_json, now, agent_id],
        )
        .map_err(StorageError::Sqlite)?;
        Ok(())
    }

    // ========================================================================
    // LOGS
    // ========================================================================

    pub fn append_lifecycle_log(
        &self,
        memory_id: &str,
        agent_id: &str,
        action: &str,
        detail: Option<serde_json::Value>,
    ) -> Result<()> {
        let conn = self.writer();
        let detail_json = detail.map(|d| serde_json::to_string(&d)).transpose().map_err(StorageError::Serde)?;
        conn.execute(
            "INSERT INTO lifecycle_log (memory_id, agent_id, action, detail, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![memory_id, agent_id, action, detail_json, Utc::now().to_rfc3339()],
        )
        .map_err(StorageError::Sqlite)?;
        Ok(())
    }

    pub fn list_lifecycle_log(&self, agent_id: &str, limit: i64) -> Result<Vec<LifecycleLogEntry>> {
        let conn = self.reader();
        let mut stmt = conn
            .prepare(
                "SELECT id, memory_id, agent_id, action, detail, occurred_at
                 FROM lifecycle_log WHERE agent_id = ?1 ORDER BY occurred_at DESC LIMIT ?2",
            )
            .map_err(StorageError::Sqlite)?;
        let rows = stmt
            .query_map(params![agent_id, limit], |row| {
                let detail_text: Option<String> = row.get(4)?;
                Ok(LifecycleLogEntry {
                    id: row.get(0)?,
                    memory_id: row.get(1)?,
                    agent_id: row.get(2)?,
                    action: row.get(3)?,
                    detail: detail_text.map(|t| serde_json::from_str(&t)).transpose().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
                    })?,
                    occurred_at: parse_timestamp(&row.get::<_, String>(5)?)?,
                })
            })
            .map_err(StorageError::Sqlite)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StorageError::Sqlite(e).into())
    }

    pub fn append_extraction_log(
        &self,
        agent_id: &str,
        channel: &str,
        memory_id: Option<&str>,
        category: &str,
        source: &str,
        raw_confidence: f64,
    ) -> Result<()> {
        let conn = self.writer();
        conn.execute(
            "INSERT INTO extraction_log (agent_id, channel, memory_id, category, source, raw_confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![agent_id, channel, memory_id, category, source, raw_confidence, Utc::now().to_rfc3339()],
        )
        .map_err(StorageError::Sqlite)?;
        Ok(())
    }

    pub fn list_extraction_log(&self, agent_id: &str, limit: i64) -> Result<Vec<ExtractionLogEntry>> {
        let conn = self.reader();
        let mut stmt = conn
            .prepare(
                "SELECT id, agent_id, channel, memory_id, category, source, raw_confidence, created_at
                 FROM extraction_log WHERE agent_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(StorageError::Sqlite)?;
        let rows = stmt
            .query_map(params![agent_id, limit], |row| {
                Ok(ExtractionLogEntry {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    channel: row.get(2)?,
                    memory_id: row.get(3)?,
                    category: row.get(4)?,
                    source: row.get(5)?,
                    raw_confidence: row.get(6)?,
                    created_at: parse_timestamp(&row.get::<_, String>(7)?)?,
                })
            })
            .map_err(StorageError::Sqlite)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StorageError::Sqlite(e).into())
    }

    pub fn list_access_log(&self, memory_id: &str, limit: i64) -> Result<Vec<AccessLogEntry>> {
        let conn = self.reader();
        let mut stmt = conn
            .prepare(
                "SELECT id, memory_id, agent_id, accessed_at, context
                 FROM access_log WHERE memory_id = ?1 ORDER BY accessed_at DESC LIMIT ?2",
            )
            .map_err(StorageError::Sqlite)?;
        let rows = stmt
            .query_map(params![memory_id, limit], |row| {
                Ok(AccessLogEntry {
                    id: row.get(0)?,
                    memory_id: row.get(1)?,
                    agent_id: row.get(2)?,
                    accessed_at: parse_timestamp(&row.get::<_, String>(3)?)?,
                    context: row.get(4)?,
                })
            })
            .map_err(StorageError::Sqlite)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StorageError::Sqlite(e).into())
    }

    // ========================================================================
    // STATS
    // ========================================================================

    pub fn stats(&self) -> Result<Stats> {
        let conn = self.reader();
        let total_memories: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))
            .map_err(StorageError::Sqlite)?;
        let active_memories: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE superseded_by IS NULL",
                [],
                |r| r.get(0),
            )
            .map_err(StorageError::Sqlite)?;
        let total_relations: i64 = conn
            .query_row("SELECT COUNT(*) FROM relations", [], |r| r.get(0))
            .map_err(StorageError::Sqlite)?;
        let total_agents: i64 = conn
            .query_row("SELECT COUNT(*) FROM agents", [], |r| r.get(0))
            .map_err(StorageError::Sqlite)?;

        Ok(Stats {
            total_memories,
            active_memories,
            total_relations,
            total_agents,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_memories: i64,
    pub active_memories: i64,
    pub total_relations: i64,
    pub total_agents: i64,
}

fn parse_timestamp(text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
    let layer_text: String = row.get(1)?;
    let category_text: String = row.get(2)?;
    let last_accessed: Option<String> = row.get(10)?;
    let expires_at: Option<String> = row.get(13)?;
    let metadata_text: String = row.get(16)?;

    Ok(Memory {
        id: row.get(0)?,
        layer: Layer::parse(&layer_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown layer: {layer_text}").into(),
            )
        })?,
        category: Category::parse(&category_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown category: {category_text}").into(),
            )
        })?,
        content: row.get(3)?,
        source: row.get(4)?,
        agent_id: row.get(5)?,
        importance: row.get(6)?,
        confidence: row.get(7)?,
        decay_score: row.get(8)?,
        access_count: row.get(9)?,
        last_accessed: last_accessed.map(|t| parse_timestamp(&t)).transpose()?,
        created_at: parse_timestamp(&row.get::<_, String>(11)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(12)?)?,
        expires_at: expires_at.map(|t| parse_timestamp(&t)).transpose()?,
        superseded_by: row.get(14)?,
        is_pinned: row.get::<_, i64>(15)? != 0,
        metadata: serde_json::from_str(&metadata_text).unwrap_or(serde_json::Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Category;

    fn new_memory(content: &str, layer: Layer, importance: f64) -> NewMemory {
        NewMemory {
            layer,
            category: Category::Fact,
            content: content.to_string(),
            source: "test".to_string(),
            agent_id: "default".to_string(),
            importance,
            confidence: 0.8,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        }
    }

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(Some(dir.path().join("test.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn insert_and_get_round_trips() {
        let (store, _dir) = temp_store();
        let m = store.insert_memory(new_memory("hello world", Layer::Core, 0.9)).unwrap();
        let fetched = store.get_memory(&m.id).unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.layer, Layer::Core);
    }

    #[test]
    fn fulltext_search_finds_inserted_content() {
        let (store, _dir) = temp_store();
        store.insert_memory(new_memory("the sky is blue today", Layer::Core, 0.5)).unwrap();
        store.insert_memory(new_memory("completely unrelated content", Layer::Core, 0.5)).unwrap();

        let results = store.search_fulltext("sky", "default", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].0.content.contains("sky"));
    }

    #[test]
    fn bump_access_increments_count_and_logs() {
        let (store, _dir) = temp_store();
        let m = store.insert_memory(new_memory("x", Layer::Core, 0.5)).unwrap();
        store.bump_access(&m.id, "default", "gate").unwrap();
        store.bump_access(&m.id, "default", "gate").unwrap();

        let fetched = store.get_memory(&m.id).unwrap().unwrap();
        assert_eq!(fetched.access_count, 2);
        assert!(fetched.last_accessed.is_some());

        let log = store.list_access_log(&m.id, 10).unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn update_memory_applies_patch() {
        let (store, _dir) = temp_store();
        let m = store.insert_memory(new_memory("x", Layer::Working, 0.5)).unwrap();

        let updated = store
            .update_memory(
                &m.id,
                MemoryPatch {
                    importance: Some(0.95),
                    layer: Some(Layer::Core),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.importance, 0.95);
        assert_eq!(updated.layer, Layer::Core);
    }

    #[test]
    fn version_chain_walks_both_directions() {
        let (store, _dir) = temp_store();
        let v1 = store.insert_memory(new_memory("v1", Layer::Core, 0.5)).unwrap();
        let v2 = store.insert_memory(new_memory("v2", Layer::Core, 0.5)).unwrap();
        let v3 = store.insert_memory(new_memory("v3", Layer::Core, 0.5)).unwrap();

        store
            .update_memory(&v1.id, MemoryPatch { superseded_by: Some(Some(v2.id.clone())), ..Default::default() })
            .unwrap();
        store
            .update_memory(&v2.id, MemoryPatch { superseded_by: Some(Some(v3.id.clone())), ..Default::default() })
            .unwrap();

        let chain = store.get_memory_version_chain(&v2.id).unwrap();
        let ids: Vec<_> = chain.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![v1.id, v2.id, v3.id]);
    }

    #[test]
    fn relation_upsert_applies_ema() {
        let (store, _dir) = temp_store();
        let r1 = store
            .upsert_relation("default", "Harry", Predicate::LivesIn, "东京", 1.0, "sieve:deep", None, None)
            .unwrap();
        assert_eq!(r1.confidence, 1.0);
        assert_eq!(r1.extraction_count, 1);

        let r2 = store
            .upsert_relation("default", "Harry", Predicate::LivesIn, "东京", 0.0, "sieve:deep", None, None)
            .unwrap();
        assert_eq!(r2.extraction_count, 2);
        assert!((r2.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn relation_source_memory_id_is_write_once() {
        let (store, _dir) = temp_store();
        let r1 = store
            .upsert_relation(
                "default", "Harry", Predicate::LivesIn, "东京", 0.8, "sieve:deep", Some("mem-1"), None,
            )
            .unwrap();
        assert_eq!(r1.source_memory_id, Some("mem-1".to_string()));

        let r2 = store
            .upsert_relation(
                "default", "Harry", Predicate::LivesIn, "东京", 0.9, "sieve:deep", Some("mem-2"), None,
            )
            .unwrap();
        assert_eq!(r2.source_memory_id, Some("mem-1".to_string()), "first writer wins");
    }

    #[test]
    fn relation_expired_overwrites_only_when_present() {
        let (store, _dir) = temp_store();
        let r1 = store
            .upsert_relation(
                "default", "Harry", Predicate::Uses, "Nginx", 0.8, "sieve:deep", None, Some(true),
            )
            .unwrap();
        assert!(r1.expired);

        let r2 = store
            .upsert_relation(
                "default", "Harry", Predicate::Uses, "Nginx", 0.8, "sieve:deep", None, None,
            )
            .unwrap();
        assert!(r2.expired, "omitted expired must not reset the flag");
    }

    #[test]
    fn ensure_agent_is_idempotent() {
        let (store, _dir) = temp_store();
        let a1 = store.ensure_agent("default").unwrap();
        let a2 = store.ensure_agent("default").unwrap();
        assert_eq!(a1.created_at, a2.created_at);
    }
}
