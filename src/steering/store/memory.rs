//! 内存队列状态存储
//!
//! 读写都复制一份，调用方持有的句柄无法修改已存储的行。

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{checked_position, QueueAdvance, QueueState, QueueStateStore};
use crate::steering::error::StoreError;

/// 进程内存储，重启即丢失
#[derive(Debug, Default)]
pub struct MemoryQueueStateStore {
    states: RwLock<HashMap<String, QueueState>>,
}

impl MemoryQueueStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的任务数
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl QueueStateStore for MemoryQueueStateStore {
    async fn get(&self, task_id: &str) -> Result<Option<QueueState>, StoreError> {
        Ok(self.states.read().await.get(task_id).cloned())
    }

    async fn save(&self, state: &QueueState) -> Result<(), StoreError> {
        state.validate()?;
        let copy = state.clone();
        let mut states = self.states.write().await;
        let stored = match states.get(&copy.task_id) {
            // created_at 以首次写入为准
            Some(existing) => QueueState {
                created_at: existing.created_at,
                ..copy
            },
            None => copy,
        };
        states.insert(stored.task_id.clone(), stored);
        Ok(())
    }

    async fn insert_if_absent(&self, state: &QueueState) -> Result<bool, StoreError> {
        state.validate()?;
        let mut states = self.states.write().await;
        match states.entry(state.task_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(state.clone());
                Ok(true)
            }
        }
    }

    async fn delete(&self, task_id: &str) -> Result<(), StoreError> {
        self.states.write().await.remove(task_id);
        Ok(())
    }

    async fn reset_position(&self, task_id: &str) -> Result<(), StoreError> {
        if let Some(state) = self.states.write().await.get_mut(task_id) {
            state.current_index = 0;
            state.touch();
        }
        Ok(())
    }

    async fn set_position(&self, task_id: &str, position: i64) -> Result<(), StoreError> {
        let mut states = self.states.write().await;
        let state = states
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        state.current_index = checked_position(state, position)?;
        state.touch();
        Ok(())
    }

    async fn advance(&self, task_id: &str) -> Result<Option<QueueAdvance>, StoreError> {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(task_id) else {
            return Ok(None);
        };
        let executed = state.advance();
        Ok(Some(QueueAdvance {
            executed,
            state: state.clone(),
        }))
    }
}
