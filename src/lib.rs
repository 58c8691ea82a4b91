//! Steer - Agent 任务转向控制器
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **observability**: 日志初始化
//! - **steering**: 策略、队列状态存储、注册表与控制器

pub mod config;
pub mod observability;
pub mod steering;

pub use steering::{SteeringController, SteeringTask, StrategyRegistry};
