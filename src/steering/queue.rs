//! queue 策略：按顺序每个模式执行一次，每次成功执行后前进，最后一项之后耗尽
//!
//! 队列在首次 initialize 时从任务配置固化到存储，之后以存储为准；
//! 修改任务的 steering_queue 不会影响已有状态。

use std::sync::Arc;

use async_trait::async_trait;

use super::enhancer::PromptEnhancer;
use super::error::{SteeringError, SteeringResult};
use super::provider::{fetch_mode_section, SteeringProvider};
use super::store::{QueueState, QueueStateStore};
use super::types::{
    DecisionReason, Mode, PromptEnhancement, SteeringDecision, SteeringTask, Strategy,
};

/// 进度块中最多列出的后续模式数
const UPCOMING_LIMIT: usize = 3;

pub struct QueueProvider {
    store: Option<Arc<dyn QueueStateStore>>,
    enhancer: Option<Arc<dyn PromptEnhancer>>,
}

impl QueueProvider {
    pub fn new(
        store: Option<Arc<dyn QueueStateStore>>,
        enhancer: Option<Arc<dyn PromptEnhancer>>,
    ) -> Self {
        Self { store, enhancer }
    }

    async fn load(
        store: &dyn QueueStateStore,
        task_id: &str,
    ) -> SteeringResult<Option<QueueState>> {
        Ok(store.get(task_id).await?)
    }

    /// 规范化任务的队列配置；未知模式回落到 progress
    fn normalize_queue(task: &SteeringTask) -> Vec<Mode> {
        task.queue_entries()
            .iter()
            .map(|entry| {
                Mode::parse(entry).unwrap_or_else(|| {
                    tracing::warn!(
                        task_id = %task.id,
                        entry = %entry,
                        "Unknown mode in steering queue, using progress"
                    );
                    Mode::Progress
                })
            })
            .collect()
    }
}

/// 附加在模式段落之后的队列进度块
pub fn render_progress(state: &QueueState) -> String {
    let Some(mode) = state.current_mode() else {
        return String::new();
    };
    let total = state.queue.len();
    let remaining = state.remaining();

    let mut block = String::from("\n\n---\n\n## Queue Progress\n\n");
    block.push_str(&format!("Position: {}/{}\n", state.current_index + 1, total));
    block.push_str(&format!("Current Focus: {}\n", mode));

    if remaining > 1 {
        block.push_str(&format!(
            "Remaining: {} more items after this\n\nUpcoming:\n",
            remaining - 1
        ));
        let upcoming = state.upcoming();
        for next in upcoming.iter().take(UPCOMING_LIMIT) {
            block.push_str(&format!("- {}\n", next));
        }
        let extra = upcoming.len().saturating_sub(UPCOMING_LIMIT);
        if extra > 0 {
            block.push_str(&format!("- ... and {} more\n", extra));
        }
    }
    block
}

#[async_trait]
impl SteeringProvider for QueueProvider {
    fn strategy(&self) -> Strategy {
        Strategy::Queue
    }

    async fn current_mode(&self, task: &SteeringTask) -> SteeringResult<Option<Mode>> {
        let Some(store) = self.store.as_deref() else {
            return Ok(None);
        };
        let state = Self::load(store, &task.id).await?;
        Ok(state.and_then(|s| s.current_mode()))
    }

    async fn enhance_prompt(
        &self,
        task: &SteeringTask,
    ) -> SteeringResult<Option<PromptEnhancement>> {
        let (Some(store), Some(_)) = (self.store.as_deref(), self.enhancer.as_ref()) else {
            return Ok(None);
        };

        let state = match Self::load(store, &task.id).await? {
            Some(state) => state,
            None => {
                self.initialize(task).await?;
                match Self::load(store, &task.id).await? {
                    Some(state) => state,
                    None => return Ok(None),
                }
            }
        };

        let Some(mode) = state.current_mode() else {
            tracing::debug!(task_id = %task.id, "Queue exhausted, no prompt enhancement");
            return Ok(None);
        };

        let section = fetch_mode_section(self.enhancer.as_deref(), mode)
            .await?
            .unwrap_or_default();
        let source = format!(
            "queue:{}[{}/{}]",
            mode,
            state.current_index + 1,
            state.queue.len()
        );
        Ok(PromptEnhancement::new(
            format!("{}{}", section, render_progress(&state)),
            source,
        ))
    }

    async fn after_execution(
        &self,
        task: &SteeringTask,
        _scenario_name: &str,
    ) -> SteeringResult<SteeringDecision> {
        let Some(store) = self.store.as_deref() else {
            return Ok(SteeringDecision::exhausted(None, DecisionReason::NoStateRepo));
        };
        if task.id.trim().is_empty() {
            return Err(SteeringError::InvalidTask("task id is blank".to_string()));
        }

        let Some(advance) = store.advance(&task.id).await? else {
            tracing::warn!(task_id = %task.id, "No queue state found after execution");
            return Ok(SteeringDecision::exhausted(None, DecisionReason::NoQueueState));
        };

        let state = &advance.state;
        if state.is_exhausted() {
            tracing::info!(
                task_id = %task.id,
                total = state.queue.len(),
                "Steering queue exhausted"
            );
            return Ok(SteeringDecision::exhausted(
                advance.executed,
                DecisionReason::QueueExhausted,
            ));
        }

        let reason = DecisionReason::QueueAdvance {
            position: state.current_index + 1,
            total: state.queue.len(),
        };
        tracing::debug!(task_id = %task.id, reason = %reason, "Steering queue advanced");
        Ok(SteeringDecision::continues(state.current_mode(), reason))
    }

    async fn initialize(&self, task: &SteeringTask) -> SteeringResult<()> {
        let Some(store) = self.store.as_deref() else {
            return Ok(());
        };
        if task.id.trim().is_empty() {
            return Err(SteeringError::InvalidTask("task id is blank".to_string()));
        }
        if Self::load(store, &task.id).await?.is_some() {
            return Ok(());
        }

        let queue = Self::normalize_queue(task);
        if queue.is_empty() {
            return Err(SteeringError::EmptyQueue(task.id.clone()));
        }

        // 并发初始化时先写入者胜出，不覆盖已前进的游标
        let state = QueueState::new(task.id.clone(), queue);
        if store.insert_if_absent(&state).await? {
            tracing::info!(
                task_id = %task.id,
                queue = ?state.queue,
                "Steering queue initialized"
            );
        } else {
            tracing::debug!(task_id = %task.id, "Queue state created concurrently, keeping it");
        }
        Ok(())
    }

    async fn reset(&self, task_id: &str) -> SteeringResult<()> {
        if let Some(store) = self.store.as_deref() {
            store.delete(task_id).await?;
            tracing::info!(task_id, "Steering queue state reset");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steering::enhancer::StaticPromptEnhancer;
    use crate::steering::error::StoreError;
    use crate::steering::store::{MemoryQueueStateStore, QueueAdvance};

    fn provider_with(store: Arc<MemoryQueueStateStore>) -> QueueProvider {
        let enhancer = StaticPromptEnhancer::new().with_section(Mode::Progress, "## Progress Mode");
        QueueProvider::new(Some(store), Some(Arc::new(enhancer)))
    }

    fn task(queue: &[&str]) -> SteeringTask {
        SteeringTask::new("t3").with_steering_queue(queue.iter().copied())
    }

    #[tokio::test]
    async fn test_initialize_normalizes_and_is_idempotent() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store.clone());
        let task = task(&[" Progress", "", "UX ", "bogus"]);

        provider.initialize(&task).await.unwrap();
        provider.initialize(&task).await.unwrap();

        let state = store.get("t3").await.unwrap().unwrap();
        assert_eq!(state.queue, vec![Mode::Progress, Mode::Ux, Mode::Progress]);
        assert_eq!(state.current_index, 0);
    }

    /// 读取总是返回 None，模拟另一 worker 在检查之后才写入
    struct StaleReadStore(MemoryQueueStateStore);

    #[async_trait]
    impl QueueStateStore for StaleReadStore {
        async fn get(&self, _task_id: &str) -> Result<Option<QueueState>, StoreError> {
            Ok(None)
        }
        async fn save(&self, state: &QueueState) -> Result<(), StoreError> {
            self.0.save(state).await
        }
        async fn insert_if_absent(&self, state: &QueueState) -> Result<bool, StoreError> {
            self.0.insert_if_absent(state).await
        }
        async fn delete(&self, task_id: &str) -> Result<(), StoreError> {
            self.0.delete(task_id).await
        }
        async fn reset_position(&self, task_id: &str) -> Result<(), StoreError> {
            self.0.reset_position(task_id).await
        }
        async fn set_position(&self, task_id: &str, position: i64) -> Result<(), StoreError> {
            self.0.set_position(task_id, position).await
        }
        async fn advance(&self, task_id: &str) -> Result<Option<QueueAdvance>, StoreError> {
            self.0.advance(task_id).await
        }
    }

    #[tokio::test]
    async fn test_late_initialize_does_not_rewind_cursor() {
        let store = Arc::new(StaleReadStore(MemoryQueueStateStore::new()));
        let provider = QueueProvider::new(Some(store.clone()), None);
        let task = task(&["progress", "ux", "test"]);

        provider.initialize(&task).await.unwrap();
        let decision = provider.after_execution(&task, "").await.unwrap();
        assert_eq!(decision.reason.to_string(), "queue_advance_2/3");

        // 检查看不到已有状态，写入仍不能把游标拨回 0
        provider.initialize(&task).await.unwrap();
        let state = store.0.get("t3").await.unwrap().unwrap();
        assert_eq!(state.current_index, 1);
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_queue() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store.clone());

        let err = provider.initialize(&task(&["  ", ""])).await.unwrap_err();
        assert!(matches!(err, SteeringError::EmptyQueue(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_existing_state_wins_over_task_config() {
        let store = Arc::new(MemoryQueueStateStore::new());
        store
            .save(&QueueState::new("t3", vec![Mode::Refactor]))
            .await
            .unwrap();
        let provider = provider_with(store.clone());

        provider
            .initialize(&task(&["progress", "ux", "test"]))
            .await
            .unwrap();
        let state = store.get("t3").await.unwrap().unwrap();
        assert_eq!(state.queue, vec![Mode::Refactor]);
    }

    #[tokio::test]
    async fn test_full_traversal() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store.clone());
        let task = task(&["progress", "ux", "test"]);
        provider.initialize(&task).await.unwrap();

        let first = provider.after_execution(&task, "demo").await.unwrap();
        assert_eq!(first.mode, Some(Mode::Ux));
        assert!(first.should_requeue);
        assert_eq!(first.reason.to_string(), "queue_advance_2/3");

        let second = provider.after_execution(&task, "demo").await.unwrap();
        assert_eq!(second.mode, Some(Mode::Test));
        assert_eq!(second.reason.to_string(), "queue_advance_3/3");

        let third = provider.after_execution(&task, "demo").await.unwrap();
        assert_eq!(third.mode, Some(Mode::Test));
        assert!(!third.should_requeue);
        assert!(third.exhausted);
        assert_eq!(third.reason, DecisionReason::QueueExhausted);

        assert_eq!(provider.current_mode(&task).await.unwrap(), None);
        assert!(provider.enhance_prompt(&task).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_item_queue_exhausts_immediately() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store);
        let task = task(&["security"]);
        provider.initialize(&task).await.unwrap();

        let decision = provider.after_execution(&task, "").await.unwrap();
        assert!(decision.exhausted);
        assert_eq!(decision.mode, Some(Mode::Security));
    }

    #[tokio::test]
    async fn test_prompt_includes_progress_block() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store);
        // 未初始化时自动初始化
        let task = task(&["progress", "ux", "test"]);

        let enhancement = provider.enhance_prompt(&task).await.unwrap().unwrap();
        assert_eq!(enhancement.source, "queue:progress[1/3]");
        assert!(enhancement.section.starts_with("## Progress Mode"));
        assert!(enhancement.section.contains("Queue Progress"));
        assert!(enhancement.section.contains("Position: 1/3"));
        assert!(enhancement.section.contains("Current Focus: progress"));
        assert!(enhancement.section.contains("Remaining: 2 more items after this"));
        assert!(enhancement.section.contains("Upcoming:\n- ux\n- test\n"));
    }

    #[tokio::test]
    async fn test_progress_block_truncates_long_queues() {
        let state = QueueState::new(
            "t",
            vec![
                Mode::Progress,
                Mode::Ux,
                Mode::Test,
                Mode::Refactor,
                Mode::Polish,
                Mode::Security,
            ],
        );
        let block = render_progress(&state);
        assert!(block.contains("Remaining: 5 more items after this"));
        assert!(block.contains("- refactor\n"));
        assert!(!block.contains("- polish\n"));
        assert!(block.contains("... and 2 more"));

        let mut last = state.clone();
        last.current_index = 5;
        let block = render_progress(&last);
        assert!(block.contains("Position: 6/6"));
        assert!(!block.contains("Upcoming"));
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        let task = task(&["progress"]);

        let no_store = QueueProvider::new(None, Some(Arc::new(StaticPromptEnhancer::builtin())));
        assert!(no_store.enhance_prompt(&task).await.unwrap().is_none());
        assert_eq!(no_store.current_mode(&task).await.unwrap(), None);
        let decision = no_store.after_execution(&task, "").await.unwrap();
        assert!(decision.exhausted);
        assert_eq!(decision.reason, DecisionReason::NoStateRepo);

        let store = Arc::new(MemoryQueueStateStore::new());
        let no_enhancer = QueueProvider::new(Some(store.clone()), None);
        assert!(no_enhancer.enhance_prompt(&task).await.unwrap().is_none());
        // 未自动初始化
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_state_is_a_decision() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store);

        let decision = provider
            .after_execution(&task(&["progress"]), "")
            .await
            .unwrap();
        assert!(decision.exhausted);
        assert!(!decision.should_requeue);
        assert_eq!(decision.reason, DecisionReason::NoQueueState);
    }

    #[tokio::test]
    async fn test_reset_deletes_state() {
        let store = Arc::new(MemoryQueueStateStore::new());
        let provider = provider_with(store.clone());
        let task = task(&["progress", "ux"]);
        provider.initialize(&task).await.unwrap();
        provider.after_execution(&task, "").await.unwrap();

        provider.reset("t3").await.unwrap();
        assert!(store.get("t3").await.unwrap().is_none());
        provider.reset("unknown").await.unwrap();
    }

    #[tokio::test]
    async fn test_n_runs_exhaust_exactly_at_n() {
        for n in 1..=5 {
            let store = Arc::new(MemoryQueueStateStore::new());
            let provider = provider_with(store);
            let entries: Vec<&str> = Mode::ALL.iter().take(n).map(|m| m.as_str()).collect();
            let task = task(&entries);
            provider.initialize(&task).await.unwrap();

            for run in 1..=n {
                let decision = provider.after_execution(&task, "").await.unwrap();
                assert_eq!(decision.exhausted, run == n, "queue of {} at run {}", n, run);
            }
        }
    }
}
