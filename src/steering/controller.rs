//! 转向控制器：队列处理器面向的入口
//!
//! 每次执行前 `prepare`（选择 Provider、初始化、取当前模式与提示片段），
//! 执行后 `complete`（取得决策并与任务的 auto-requeue 标志合并）。
//! 调用方传入的取消令牌在协作方调用期间生效，取消后不会写入部分状态。

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::{SteeringError, SteeringResult};
use super::provider::SteeringProvider;
use super::registry::{select_strategy, StrategyRegistry};
use super::types::{Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy};

/// 执行前准备结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedRun {
    pub strategy: Strategy,
    pub mode: Option<Mode>,
    pub enhancement: Option<PromptEnhancement>,
}

/// 执行后结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SteeringOutcome {
    pub strategy: Strategy,
    pub decision: SteeringDecision,
    /// decision.should_requeue && task.processor_auto_requeue
    pub requeue: bool,
}

pub struct SteeringController {
    registry: Arc<StrategyRegistry>,
}

impl SteeringController {
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    fn provider(&self, task: &SteeringTask) -> SteeringResult<Arc<dyn SteeringProvider>> {
        self.registry.provider_for(task).ok_or_else(|| {
            SteeringError::UnknownStrategy(select_strategy(task).as_str().to_string())
        })
    }

    /// 执行前：初始化（幂等）、当前模式、提示片段
    pub async fn prepare(
        &self,
        task: &SteeringTask,
        cancel: &CancellationToken,
    ) -> SteeringResult<PreparedRun> {
        let provider = self.provider(task)?;
        let strategy = provider.strategy();

        cancellable(cancel, provider.initialize(task)).await?;
        let mode = cancellable(cancel, provider.current_mode(task)).await?;
        let enhancement = cancellable(cancel, provider.enhance_prompt(task)).await?;

        tracing::debug!(
            task_id = %task.id,
            strategy = %strategy,
            mode = ?mode,
            source = enhancement.as_ref().map(|e| e.source.as_str()),
            "Steering prepared"
        );
        Ok(PreparedRun {
            strategy,
            mode,
            enhancement,
        })
    }

    /// 执行后：取得决策并合并 auto-requeue
    pub async fn complete(
        &self,
        task: &SteeringTask,
        scenario_name: &str,
        cancel: &CancellationToken,
    ) -> SteeringResult<SteeringOutcome> {
        let provider = self.provider(task)?;
        let strategy = provider.strategy();
        let decision = cancellable(cancel, provider.after_execution(task, scenario_name)).await?;
        let requeue = decision.should_requeue && task.processor_auto_requeue;

        tracing::info!(
            task_id = %task.id,
            strategy = %strategy,
            mode = ?decision.mode,
            reason = %decision.reason,
            exhausted = decision.exhausted,
            requeue,
            "Steering decision"
        );
        Ok(SteeringOutcome {
            strategy,
            decision,
            requeue,
        })
    }

    /// 任务删除或重新激活时清理所有策略的状态
    pub async fn reset(&self, task_id: &str) -> SteeringResult<()> {
        for provider in self.registry.providers() {
            provider.reset(task_id).await?;
        }
        Ok(())
    }
}

/// 取消优先：令牌已取消时不再轮询协作方调用
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = SteeringResult<T>>,
) -> SteeringResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SteeringError::Cancelled),
        result = fut => result,
    }
}
