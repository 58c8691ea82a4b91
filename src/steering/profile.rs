//! profile 策略：委托给外部 Auto-Steer profile 集成
//!
//! 阶段、停止条件与指标都由集成负责，这里只做路由与结果整形。

use std::sync::Arc;

use async_trait::async_trait;

use super::error::{SteeringError, SteeringResult};
use super::integration::ProfileIntegration;
use super::provider::SteeringProvider;
use super::types::{
    DecisionReason, Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy,
};

pub struct ProfileProvider {
    integration: Option<Arc<dyn ProfileIntegration>>,
}

impl ProfileProvider {
    pub fn new(integration: Option<Arc<dyn ProfileIntegration>>) -> Self {
        Self { integration }
    }
}

#[async_trait]
impl SteeringProvider for ProfileProvider {
    fn strategy(&self) -> Strategy {
        Strategy::Profile
    }

    async fn current_mode(&self, task: &SteeringTask) -> SteeringResult<Option<Mode>> {
        let Some(integration) = self.integration.as_deref() else {
            return Ok(None);
        };
        match integration.current_mode(task).await {
            Ok(mode) => Ok(mode),
            Err(e) => {
                tracing::warn!(task_id = %task.id, "Profile current mode unavailable: {:#}", e);
                Ok(None)
            }
        }
    }

    async fn enhance_prompt(
        &self,
        task: &SteeringTask,
    ) -> SteeringResult<Option<PromptEnhancement>> {
        let Some(orchestrator) = self
            .integration
            .as_deref()
            .and_then(|i| i.execution_orchestrator())
        else {
            return Ok(None);
        };

        let section = orchestrator
            .enhanced_prompt(&task.id)
            .await
            .map_err(|e| SteeringError::collaborator("profile orchestrator prompt failed", e))?;
        if section.trim().is_empty() {
            return Ok(None);
        }

        let source = match orchestrator.current_mode(&task.id).await {
            Ok(Some(mode)) => format!("profile:{}", mode),
            Ok(None) => "profile".to_string(),
            Err(e) => {
                tracing::debug!(task_id = %task.id, "Profile mode lookup failed: {:#}", e);
                "profile".to_string()
            }
        };
        Ok(PromptEnhancement::new(section, source))
    }

    async fn after_execution(
        &self,
        task: &SteeringTask,
        scenario_name: &str,
    ) -> SteeringResult<SteeringDecision> {
        let Some(integration) = self.integration.as_deref() else {
            return Ok(SteeringDecision::exhausted(None, DecisionReason::NoIntegration));
        };

        let should_continue = integration
            .should_continue_task(task, scenario_name)
            .await
            .map_err(|e| SteeringError::collaborator("profile continuation check failed", e))?;
        let mode = self.current_mode(task).await?;

        if should_continue {
            Ok(SteeringDecision::continues(mode, DecisionReason::ProfileContinues))
        } else {
            tracing::info!(task_id = %task.id, scenario = scenario_name, "Auto-steer profile completed");
            Ok(SteeringDecision::exhausted(mode, DecisionReason::ProfileCompleted))
        }
    }

    async fn initialize(&self, task: &SteeringTask) -> SteeringResult<()> {
        let Some(integration) = self.integration.as_deref() else {
            return Ok(());
        };
        let scenario_name = task.scenario_name();
        integration
            .initialize_auto_steer(task, &scenario_name)
            .await
            .map_err(|e| SteeringError::collaborator("profile initialization failed", e))
    }

    async fn reset(&self, task_id: &str) -> SteeringResult<()> {
        let Some(orchestrator) = self
            .integration
            .as_deref()
            .and_then(|i| i.execution_orchestrator())
        else {
            return Ok(());
        };
        orchestrator
            .delete_execution_state(task_id)
            .await
            .map_err(|e| SteeringError::collaborator("profile state deletion failed", e))
    }
}
