//! SQLite 队列状态存储
//!
//! 每个任务一行，队列以 JSON 字符串数组保存，时间戳为 RFC3339 文本；写入按主键 upsert，created_at 仅首次写入。
//! 每个写操作都是单条语句，读-改-写在连接锁内完成。

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::{checked_position, QueueAdvance, QueueState, QueueStateStore};
use crate::steering::error::StoreError;
use crate::steering::types::Mode;

/// 持久化队列状态存储
pub struct SqliteQueueStateStore {
    /// 关闭后为 None，所有操作返回 NoDatabase
    db: Mutex<Option<Connection>>,
}

impl SqliteQueueStateStore {
    /// 打开（必要时创建）数据库文件并建表
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(db_path)?)
    }

    /// 内存数据库，进程退出即丢失
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_tables(&conn)?;
        Ok(Self {
            db: Mutex::new(Some(conn)),
        })
    }

    /// 释放数据库句柄
    pub async fn close(&self) {
        self.db.lock().await.take();
    }
}

fn init_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS queue_states (
            task_id TEXT PRIMARY KEY,
            queue TEXT NOT NULL,
            current_index INTEGER NOT NULL DEFAULT 0 CHECK (current_index >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn encode_queue(queue: &[Mode]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(queue)?)
}

/// 未知模式名按 progress 读出
fn decode_queue(raw: &str) -> Result<Vec<Mode>, StoreError> {
    let names: Vec<String> = serde_json::from_str(raw)?;
    Ok(names.iter().map(|name| Mode::normalize(name)).collect())
}

fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn load_state(conn: &Connection, task_id: &str) -> Result<Option<QueueState>, StoreError> {
    let row = conn
        .query_row(
            "SELECT queue, current_index, created_at, updated_at
             FROM queue_states WHERE task_id = ?1",
            params![task_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((queue_json, current_index, created_at, updated_at)) = row else {
        return Ok(None);
    };
    let queue = decode_queue(&queue_json)?;
    let current_index = usize::try_from(current_index)
        .unwrap_or_default()
        .min(queue.len());

    Ok(Some(QueueState {
        task_id: task_id.to_string(),
        queue,
        current_index,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    }))
}

fn write_position(conn: &Connection, state: &QueueState) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE queue_states SET current_index = ?1, updated_at = ?2 WHERE task_id = ?3",
        params![
            state.current_index as i64,
            encode_time(&state.updated_at),
            state.task_id
        ],
    )?)
}

#[async_trait]
impl QueueStateStore for SqliteQueueStateStore {
    async fn get(&self, task_id: &str) -> Result<Option<QueueState>, StoreError> {
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        load_state(conn, task_id)
    }

    async fn save(&self, state: &QueueState) -> Result<(), StoreError> {
        state.validate()?;
        let queue_json = encode_queue(&state.queue)?;
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        conn.execute(
            "INSERT INTO queue_states (task_id, queue, current_index, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(task_id) DO UPDATE SET
                queue = excluded.queue,
                current_index = excluded.current_index,
                updated_at = excluded.updated_at",
            params![
                state.task_id,
                queue_json,
                state.current_index as i64,
                encode_time(&state.created_at),
                encode_time(&state.updated_at)
            ],
        )?;
        Ok(())
    }

    async fn insert_if_absent(&self, state: &QueueState) -> Result<bool, StoreError> {
        state.validate()?;
        let queue_json = encode_queue(&state.queue)?;
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        let inserted = conn.execute(
            "INSERT INTO queue_states (task_id, queue, current_index, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(task_id) DO NOTHING",
            params![
                state.task_id,
                queue_json,
                state.current_index as i64,
                encode_time(&state.created_at),
                encode_time(&state.updated_at)
            ],
        )?;
        Ok(inserted > 0)
    }

    async fn delete(&self, task_id: &str) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        conn.execute("DELETE FROM queue_states WHERE task_id = ?1", params![task_id])?;
        Ok(())
    }

    async fn reset_position(&self, task_id: &str) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        let Some(mut state) = load_state(conn, task_id)? else {
            tracing::debug!(task_id, "reset_position on missing queue state ignored");
            return Ok(());
        };
        state.current_index = 0;
        state.touch();
        write_position(conn, &state)?;
        Ok(())
    }

    async fn set_position(&self, task_id: &str, position: i64) -> Result<(), StoreError> {
        if position < 0 {
            return Err(StoreError::InvalidPosition {
                task_id: task_id.to_string(),
                position,
            });
        }
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        let mut state =
            load_state(conn, task_id)?.ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        state.current_index = checked_position(&state, position)?;
        state.touch();
        if write_position(conn, &state)? == 0 {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        Ok(())
    }

    async fn advance(&self, task_id: &str) -> Result<Option<QueueAdvance>, StoreError> {
        let db = self.db.lock().await;
        let conn = db.as_ref().ok_or(StoreError::NoDatabase)?;
        let Some(mut state) = load_state(conn, task_id)? else {
            return Ok(None);
        };
        let executed = state.advance();
        if executed.is_some() {
            write_position(conn, &state)?;
        }
        Ok(Some(QueueAdvance { executed, state }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(task_id: &str) -> QueueState {
        QueueState::new(task_id, vec![Mode::Refactor, Mode::Ux, Mode::Test])
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        let state = sample("t1");
        store.save(&state).await.unwrap();

        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.queue, vec![Mode::Refactor, Mode::Ux, Mode::Test]);
        assert_eq!(loaded.current_index, 0);
        assert_eq!(loaded.created_at, state.created_at);
        assert_eq!(loaded.updated_at, state.updated_at);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("steering.db");

        let store = SqliteQueueStateStore::open(&db_path).unwrap();
        store.save(&sample("t1")).await.unwrap();
        store.advance("t1").await.unwrap();
        store.close().await;

        let reopened = SqliteQueueStateStore::open(&db_path).unwrap();
        let loaded = reopened.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.current_index, 1);
        assert_eq!(loaded.current_mode(), Some(Mode::Ux));
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        let state = sample("t1");
        store.save(&state).await.unwrap();

        let mut update = state.clone();
        update.created_at = state.created_at + chrono::Duration::days(1);
        update.current_index = 2;
        update.touch();
        store.save(&update).await.unwrap();

        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.created_at, state.created_at);
        assert_eq!(loaded.current_index, 2);
    }

    #[tokio::test]
    async fn test_unknown_mode_reads_as_progress() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteQueueStateStore::from_connection(conn).unwrap();
        {
            let db = store.db.lock().await;
            db.as_ref()
                .unwrap()
                .execute(
                    "INSERT INTO queue_states VALUES ('t1', '[\"ux\",\"legacy\"]', 0, ?1, ?1)",
                    params![Utc::now().to_rfc3339()],
                )
                .unwrap();
        }
        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.queue, vec![Mode::Ux, Mode::Progress]);
    }

    #[tokio::test]
    async fn test_positions() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        store.save(&sample("t1")).await.unwrap();

        store.set_position("t1", 3).await.unwrap();
        assert!(store.get("t1").await.unwrap().unwrap().is_exhausted());

        assert!(matches!(
            store.set_position("t1", -1).await,
            Err(StoreError::InvalidPosition { .. })
        ));
        assert_eq!(store.get("t1").await.unwrap().unwrap().current_index, 3);
        assert!(matches!(
            store.set_position("missing", 1).await,
            Err(StoreError::NotFound(_))
        ));

        store.reset_position("t1").await.unwrap();
        assert_eq!(store.get("t1").await.unwrap().unwrap().current_index, 0);
        store.reset_position("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_advance_stops_at_end() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        store
            .save(&QueueState::new("t1", vec![Mode::Test]))
            .await
            .unwrap();

        let first = store.advance("t1").await.unwrap().unwrap();
        assert_eq!(first.executed, Some(Mode::Test));
        assert!(first.state.is_exhausted());

        let second = store.advance("t1").await.unwrap().unwrap();
        assert_eq!(second.executed, None);
        assert_eq!(second.state.current_index, 1);

        assert!(store.advance("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        store.save(&sample("t1")).await.unwrap();
        store.delete("t1").await.unwrap();
        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_handle_fails_every_operation() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        store.close().await;

        assert!(matches!(store.get("t1").await, Err(StoreError::NoDatabase)));
        assert!(matches!(
            store.save(&sample("t1")).await,
            Err(StoreError::NoDatabase)
        ));
        assert!(matches!(store.delete("t1").await, Err(StoreError::NoDatabase)));
        assert!(matches!(
            store.reset_position("t1").await,
            Err(StoreError::NoDatabase)
        ));
        assert!(matches!(
            store.set_position("t1", 0).await,
            Err(StoreError::NoDatabase)
        ));
        assert!(matches!(store.advance("t1").await, Err(StoreError::NoDatabase)));
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_advanced_cursor() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        assert!(store.insert_if_absent(&sample("t1")).await.unwrap());
        store.advance("t1").await.unwrap();

        let fresh = QueueState::new("t1", vec![Mode::Progress]);
        assert!(!store.insert_if_absent(&fresh).await.unwrap());

        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.current_index, 1);
        assert_eq!(loaded.queue, vec![Mode::Refactor, Mode::Ux, Mode::Test]);
    }

    #[tokio::test]
    async fn test_timestamps_stored_as_rfc3339() {
        let store = SqliteQueueStateStore::open_in_memory().unwrap();
        let state = sample("t1");
        store.save(&state).await.unwrap();

        let (created_at, updated_at): (String, String) = {
            let db = store.db.lock().await;
            db.as_ref()
                .unwrap()
                .query_row(
                    "SELECT created_at, updated_at FROM queue_states WHERE task_id = 't1'",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .unwrap()
        };
        assert_eq!(created_at, state.created_at.to_rfc3339());
        assert!(updated_at.contains('T'));
        assert!(DateTime::parse_from_rfc3339(&updated_at).is_ok());
    }

    #[test]
    fn test_open_reports_unusable_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let result = SqliteQueueStateStore::open(blocker.join("steering.db"));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
