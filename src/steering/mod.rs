//! 转向控制器：为每个任务决定运行模式、注入的提示片段，以及执行后是否重新入队
//!
//! - **types**: 模式 / 策略 / 决策原因等封闭词汇，任务与决策值类型
//! - **store**: 队列状态存储（内存 / SQLite）
//! - **enhancer**: 模式段落生成接口与实现
//! - **integration**: Auto-Steer profile 集成接口（外部注入）
//! - **none / manual / queue / profile**: 四种策略 Provider
//! - **registry**: 策略选择与 Provider 查找
//! - **controller**: 面向队列处理器的入口

pub mod controller;
pub mod enhancer;
pub mod error;
pub mod integration;
pub mod manual;
pub mod none;
pub mod profile;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod store;
pub mod types;

pub use controller::{PreparedRun, SteeringController, SteeringOutcome};
pub use enhancer::{FilePromptEnhancer, PromptEnhancer, StaticPromptEnhancer};
pub use error::{BoxError, SteeringError, SteeringResult, StoreError};
pub use integration::{ExecutionOrchestrator, ProfileIntegration};
pub use manual::ManualProvider;
pub use none::NoneProvider;
pub use profile::ProfileProvider;
pub use provider::SteeringProvider;
pub use queue::QueueProvider;
pub use registry::{select_strategy, StrategyRegistry};
pub use store::{
    create_queue_state_store, MemoryQueueStateStore, QueueAdvance, QueueState, QueueStateStore,
    SqliteQueueStateStore,
};
pub use types::{
    DecisionReason, Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy,
};
