//! 转向错误类型
//!
//! 配置错误、持久化错误、协作方错误、契约违反、取消。队列状态缺失不是错误，
//! 由队列策略以 `no_queue_state` 决策上报。

use thiserror::Error;

/// 协作方（Prompt 增强器、profile 集成）返回的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 队列状态存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库句柄缺失（已关闭）
    #[error("Queue state database is not available")]
    NoDatabase,

    #[error("Queue state not found for task {0}")]
    NotFound(String),

    #[error("Invalid queue position {position} for task {task_id}")]
    InvalidPosition { task_id: String, position: i64 },

    #[error("Queue state for task {0} is empty")]
    EmptyQueue(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Queue state database IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Provider / Registry / Controller 对外暴露的错误
#[derive(Error, Debug)]
pub enum SteeringError {
    /// 队列配置规范化后为空
    #[error("Steering queue for task {0} is empty")]
    EmptyQueue(String),

    #[error("Unknown steering strategy: {0}")]
    UnknownStrategy(String),

    #[error("Queue state store error: {0}")]
    Store(#[from] StoreError),

    #[error("{context}: {source}")]
    Collaborator {
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// 任务缺少 Provider 需要的字段（如空白 id）
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Steering call cancelled")]
    Cancelled,
}

impl SteeringError {
    /// 包装协作方返回的 anyhow 错误
    pub fn collaborator(context: &'static str, err: anyhow::Error) -> Self {
        SteeringError::Collaborator {
            context,
            source: err.into(),
        }
    }
}

pub type SteeringResult<T> = Result<T, SteeringError>;
