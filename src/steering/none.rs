//! none 策略：任务没有任何转向配置，固定 progress 模式

use std::sync::Arc;

use async_trait::async_trait;

use super::enhancer::PromptEnhancer;
use super::error::SteeringResult;
use super::provider::{fetch_mode_section, SteeringProvider};
use super::types::{
    DecisionReason, Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy,
};

/// 默认 Provider；是否真正重新入队由处理器的 auto-requeue 决定
pub struct NoneProvider {
    enhancer: Option<Arc<dyn PromptEnhancer>>,
}

impl NoneProvider {
    pub fn new(enhancer: Option<Arc<dyn PromptEnhancer>>) -> Self {
        Self { enhancer }
    }
}

#[async_trait]
impl SteeringProvider for NoneProvider {
    fn strategy(&self) -> Strategy {
        Strategy::None
    }

    async fn current_mode(&self, _task: &SteeringTask) -> SteeringResult<Option<Mode>> {
        Ok(Some(Mode::Progress))
    }

    async fn enhance_prompt(
        &self,
        _task: &SteeringTask,
    ) -> SteeringResult<Option<PromptEnhancement>> {
        let section = fetch_mode_section(self.enhancer.as_deref(), Mode::Progress).await?;
        Ok(section.and_then(|s| PromptEnhancement::new(s, "none:progress")))
    }

    async fn after_execution(
        &self,
        _task: &SteeringTask,
        _scenario_name: &str,
    ) -> SteeringResult<SteeringDecision> {
        Ok(SteeringDecision::continues(
            Some(Mode::Progress),
            DecisionReason::NoneStrategyContinues,
        ))
    }

    async fn initialize(&self, _task: &SteeringTask) -> SteeringResult<()> {
        Ok(())
    }

    async fn reset(&self, _task_id: &str) -> SteeringResult<()> {
        Ok(())
    }
}
