//! 策略注册表：按固定优先级把任务映射到唯一的 Provider
//!
//! 优先级（高到低）：profile id → 非空队列 → 手动模式 → none。
//! 进程内构造一次并注册全部四个 Provider；`register` 主要用于测试替换。

use std::collections::HashMap;
use std::sync::Arc;

use super::enhancer::PromptEnhancer;
use super::error::{SteeringError, SteeringResult};
use super::integration::ProfileIntegration;
use super::manual::ManualProvider;
use super::none::NoneProvider;
use super::profile::ProfileProvider;
use super::provider::SteeringProvider;
use super::queue::QueueProvider;
use super::store::QueueStateStore;
use super::types::{SteeringTask, Strategy};

/// 由任务配置推导策略
pub fn select_strategy(task: &SteeringTask) -> Strategy {
    if task.profile_id().is_some() {
        Strategy::Profile
    } else if !task.queue_entries().is_empty() {
        Strategy::Queue
    } else if task.manual_mode().is_some() {
        Strategy::Manual
    } else {
        Strategy::None
    }
}

#[derive(Default)]
pub struct StrategyRegistry {
    providers: HashMap<Strategy, Arc<dyn SteeringProvider>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生产用注册表：四个 Provider 共享同一组协作方
    pub fn with_defaults(
        store: Option<Arc<dyn QueueStateStore>>,
        enhancer: Option<Arc<dyn PromptEnhancer>>,
        integration: Option<Arc<dyn ProfileIntegration>>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoneProvider::new(enhancer.clone())));
        registry.register(Arc::new(ManualProvider::new(enhancer.clone())));
        registry.register(Arc::new(QueueProvider::new(store, enhancer)));
        registry.register(Arc::new(ProfileProvider::new(integration)));
        registry
    }

    /// 注册（或替换）Provider，按其 `strategy()` 归类
    pub fn register(&mut self, provider: Arc<dyn SteeringProvider>) {
        let strategy = provider.strategy();
        if self.providers.insert(strategy, provider).is_some() {
            tracing::debug!(strategy = %strategy, "Replaced steering provider");
        }
    }

    /// 按策略查找；未注册时回落到 none，none 也缺失时返回 None
    pub fn get(&self, strategy: Strategy) -> Option<Arc<dyn SteeringProvider>> {
        self.providers
            .get(&strategy)
            .or_else(|| {
                tracing::warn!(strategy = %strategy, "No provider registered, using none");
                self.providers.get(&Strategy::None)
            })
            .cloned()
    }

    /// 按名称查找（如命令行参数）；名称不在策略集合内时报错
    pub fn get_by_name(&self, name: &str) -> SteeringResult<Option<Arc<dyn SteeringProvider>>> {
        let strategy = Strategy::parse(name)
            .ok_or_else(|| SteeringError::UnknownStrategy(name.trim().to_string()))?;
        Ok(self.get(strategy))
    }

    /// 为任务选择 Provider
    pub fn provider_for(&self, task: &SteeringTask) -> Option<Arc<dyn SteeringProvider>> {
        let strategy = select_strategy(task);
        tracing::debug!(task_id = %task.id, strategy = %strategy, "Selected steering strategy");
        self.get(strategy)
    }

    /// 已注册的 Provider（按策略顺序）
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn SteeringProvider>> + '_ {
        Strategy::ALL
            .into_iter()
            .filter_map(move |strategy| self.providers.get(&strategy))
    }
}
