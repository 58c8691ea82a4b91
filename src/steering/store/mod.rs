//! 队列状态存储抽象层
//!
//! 以 task_id 为键保存队列策略的模式列表与游标，支持内存和 SQLite 两种实现。

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::types::Mode;
use crate::config::{StoreBackend, StoreSection};

pub use memory::MemoryQueueStateStore;
pub use sqlite::SqliteQueueStateStore;

/// 单个任务的队列状态
///
/// `queue` 创建后不可变；`current_index == queue.len()` 表示已耗尽。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub task_id: String,
    pub queue: Vec<Mode>,
    pub current_index: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueState {
    pub fn new(task_id: impl Into<String>, queue: Vec<Mode>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            queue,
            current_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 当前模式；已耗尽时为 None
    pub fn current_mode(&self) -> Option<Mode> {
        self.queue.get(self.current_index).copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.queue.len()
    }

    /// 含当前项在内的剩余数量
    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.current_index)
    }

    /// 当前项之后的模式
    pub fn upcoming(&self) -> &[Mode] {
        self.queue.get(self.current_index + 1..).unwrap_or(&[])
    }

    /// 游标前进一步（已耗尽时不动），返回刚执行的模式
    pub fn advance(&mut self) -> Option<Mode> {
        let executed = self.current_mode();
        if executed.is_some() {
            self.current_index += 1;
            self.touch();
        }
        executed
    }

    /// 更新 updated_at，保证单调不减
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }

    /// 写入前校验：队列非空、游标不越界
    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.queue.is_empty() {
            return Err(StoreError::EmptyQueue(self.task_id.clone()));
        }
        if self.current_index > self.queue.len() {
            return Err(StoreError::InvalidPosition {
                task_id: self.task_id.clone(),
                position: self.current_index as i64,
            });
        }
        Ok(())
    }
}

/// 一次原子前进的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAdvance {
    /// 前进前的当前模式（前进前已耗尽则为 None）
    pub executed: Option<Mode>,
    /// 前进后的状态
    pub state: QueueState,
}

/// 队列状态存储接口
#[async_trait]
pub trait QueueStateStore: Send + Sync {
    /// 读取状态；不存在返回 Ok(None)
    async fn get(&self, task_id: &str) -> Result<Option<QueueState>, StoreError>;

    /// 按主键 upsert
    async fn save(&self, state: &QueueState) -> Result<(), StoreError>;

    /// 仅在该任务尚无状态时写入，已有行保持不变；返回是否写入
    async fn insert_if_absent(&self, state: &QueueState) -> Result<bool, StoreError>;

    /// 删除状态；不存在不是错误
    async fn delete(&self, task_id: &str) -> Result<(), StoreError>;

    /// 游标归零；不存在时静默忽略
    async fn reset_position(&self, task_id: &str) -> Result<(), StoreError>;

    /// 设置游标到指定位置；负数、越界或不存在时报错
    async fn set_position(&self, task_id: &str, position: i64) -> Result<(), StoreError>;

    /// 读取-前进-写回，整体在存储的互斥纪律下完成；不存在返回 Ok(None)
    async fn advance(&self, task_id: &str) -> Result<Option<QueueAdvance>, StoreError>;
}

/// 校验 set_position 的目标位置
pub(crate) fn checked_position(
    state: &QueueState,
    position: i64,
) -> Result<usize, StoreError> {
    usize::try_from(position)
        .ok()
        .filter(|p| *p <= state.queue.len())
        .ok_or_else(|| StoreError::InvalidPosition {
            task_id: state.task_id.clone(),
            position,
        })
}

/// 创建队列状态存储
///
/// 配置为 sqlite 且能打开数据库时使用持久化存储；否则使用内存存储
pub fn create_queue_state_store(config: &StoreSection) -> Arc<dyn QueueStateStore> {
    if config.backend == StoreBackend::Sqlite {
        match SqliteQueueStateStore::open(&config.db_path) {
            Ok(store) => {
                tracing::info!("Using SQLite queue state store: {:?}", config.db_path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open queue state database, falling back to memory: {}",
                    e
                );
            }
        }
    }

    tracing::info!("Using in-memory queue state store");
    Arc::new(MemoryQueueStateStore::new())
}
