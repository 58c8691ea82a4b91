//! Auto-Steer profile 集成接口
//!
//! profile 引擎（阶段、停止条件、指标）由外部实现并注入，核心只依赖这两个 trait，
//! 以避免与队列处理器形成循环依赖。

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Mode, SteeringTask};

/// profile 执行编排器：按任务 id 管理 profile 执行状态
#[async_trait]
pub trait ExecutionOrchestrator: Send + Sync {
    /// 当前阶段的增强提示；空字符串表示无内容
    async fn enhanced_prompt(&self, task_id: &str) -> anyhow::Result<String>;

    async fn current_mode(&self, task_id: &str) -> anyhow::Result<Option<Mode>>;

    /// 删除执行状态；不存在不是错误
    async fn delete_execution_state(&self, task_id: &str) -> anyhow::Result<()>;
}

/// profile 集成
#[async_trait]
pub trait ProfileIntegration: Send + Sync {
    async fn initialize_auto_steer(
        &self,
        task: &SteeringTask,
        scenario_name: &str,
    ) -> anyhow::Result<()>;

    /// 是否应继续执行该任务（false 表示 profile 已完成）
    async fn should_continue_task(
        &self,
        task: &SteeringTask,
        scenario_name: &str,
    ) -> anyhow::Result<bool>;

    async fn current_mode(&self, task: &SteeringTask) -> anyhow::Result<Option<Mode>>;

    /// 在基础提示词上叠加 profile 内容
    async fn enhance_prompt(
        &self,
        task: &SteeringTask,
        base_prompt: &str,
    ) -> anyhow::Result<String>;

    /// 无可用编排器时返回 None
    fn execution_orchestrator(&self) -> Option<Arc<dyn ExecutionOrchestrator>>;
}
