//! 转向策略 Provider 接口
//!
//! 每个策略实现同一组生命周期操作：initialize 一次，每次执行前 enhance_prompt，
//! 执行后 after_execution，任务删除或重新激活时 reset。

use async_trait::async_trait;

use super::enhancer::PromptEnhancer;
use super::error::{SteeringError, SteeringResult};
use super::types::{Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy};

/// 转向策略 Provider
#[async_trait]
pub trait SteeringProvider: Send + Sync {
    /// 该 Provider 负责的策略
    fn strategy(&self) -> Strategy;

    /// 执行前用于上报的当前模式；无模式时为 None
    async fn current_mode(&self, task: &SteeringTask) -> SteeringResult<Option<Mode>>;

    /// 每次执行前注入的提示片段；None 表示无需注入
    async fn enhance_prompt(&self, task: &SteeringTask)
        -> SteeringResult<Option<PromptEnhancement>>;

    /// 执行完成后的决策
    async fn after_execution(
        &self,
        task: &SteeringTask,
        scenario_name: &str,
    ) -> SteeringResult<SteeringDecision>;

    /// 首次执行前调用；重复调用无额外效果
    async fn initialize(&self, task: &SteeringTask) -> SteeringResult<()>;

    /// 清理该任务的策略状态；未知任务不是错误
    async fn reset(&self, task_id: &str) -> SteeringResult<()>;
}

/// 向增强器请求模式段落：增强器缺失或段落空白时为 None
pub(crate) async fn fetch_mode_section(
    enhancer: Option<&dyn PromptEnhancer>,
    mode: Mode,
) -> SteeringResult<Option<String>> {
    let Some(enhancer) = enhancer else {
        return Ok(None);
    };
    let section = enhancer
        .mode_section(mode)
        .await
        .map_err(|e| SteeringError::collaborator("prompt enhancer failed", e))?;
    Ok(Some(section).filter(|s| !s.trim().is_empty()))
}
