//! manual 策略：任务携带一个固定模式，重复执行直到处理器停止它

use std::sync::Arc;

use async_trait::async_trait;

use super::enhancer::PromptEnhancer;
use super::error::SteeringResult;
use super::provider::{fetch_mode_section, SteeringProvider};
use super::types::{
    DecisionReason, Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy,
};

pub struct ManualProvider {
    enhancer: Option<Arc<dyn PromptEnhancer>>,
}

impl ManualProvider {
    pub fn new(enhancer: Option<Arc<dyn PromptEnhancer>>) -> Self {
        Self { enhancer }
    }

    /// 任务的手动模式；无效值回落到 progress
    fn mode_of(task: &SteeringTask) -> Mode {
        let raw = task.steer_mode.as_deref().unwrap_or_default();
        let mode = Mode::normalize(raw);
        if Mode::parse(raw).is_none() && !raw.trim().is_empty() {
            tracing::debug!(
                task_id = %task.id,
                steer_mode = raw,
                "Unknown steer mode, falling back to progress"
            );
        }
        mode
    }
}

#[async_trait]
impl SteeringProvider for ManualProvider {
    fn strategy(&self) -> Strategy {
        Strategy::Manual
    }

    async fn current_mode(&self, task: &SteeringTask) -> SteeringResult<Option<Mode>> {
        Ok(Some(Self::mode_of(task)))
    }

    async fn enhance_prompt(
        &self,
        task: &SteeringTask,
    ) -> SteeringResult<Option<PromptEnhancement>> {
        let mode = Self::mode_of(task);
        let section = fetch_mode_section(self.enhancer.as_deref(), mode).await?;
        Ok(section.and_then(|s| PromptEnhancement::new(s, format!("manual:{}", mode))))
    }

    async fn after_execution(
        &self,
        task: &SteeringTask,
        _scenario_name: &str,
    ) -> SteeringResult<SteeringDecision> {
        Ok(SteeringDecision::continues(
            Some(Self::mode_of(task)),
            DecisionReason::ManualModeContinues,
        ))
    }

    async fn initialize(&self, _task: &SteeringTask) -> SteeringResult<()> {
        Ok(())
    }

    async fn reset(&self, _task_id: &str) -> SteeringResult<()> {
        Ok(())
    }
}
