//! 转向词汇表：模式、策略、决策原因，以及 Provider 之间传递的值类型
//!
//! 所有进入核心的字符串都先 trim + 小写再比较；持久化与日志使用小写拼写。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent 单次执行的工作模式（封闭集合）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Progress,
    Ux,
    Refactor,
    Test,
    Explore,
    Polish,
    Integration,
    Performance,
    Security,
}

impl Mode {
    pub const ALL: [Mode; 9] = [
        Mode::Progress,
        Mode::Ux,
        Mode::Refactor,
        Mode::Test,
        Mode::Explore,
        Mode::Polish,
        Mode::Integration,
        Mode::Performance,
        Mode::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Progress => "progress",
            Mode::Ux => "ux",
            Mode::Refactor => "refactor",
            Mode::Test => "test",
            Mode::Explore => "explore",
            Mode::Polish => "polish",
            Mode::Integration => "integration",
            Mode::Performance => "performance",
            Mode::Security => "security",
        }
    }

    /// 严格解析：trim + 小写后必须命中封闭集合，否则 None
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == normalized)
    }

    /// 宽松解析：无效或空值回落到 progress
    pub fn normalize(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 转向策略：由任务配置推导，从不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    None,
    Manual,
    Queue,
    Profile,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::None,
        Strategy::Manual,
        Strategy::Queue,
        Strategy::Profile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::None => "none",
            Strategy::Manual => "manual",
            Strategy::Queue => "queue",
            Strategy::Profile => "profile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == normalized)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 决策原因（封闭集合），供日志与遥测使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    NoneStrategyContinues,
    ManualModeContinues,
    /// 队列前进后的新位置（1 起始）与队列长度
    QueueAdvance { position: usize, total: usize },
    QueueExhausted,
    NoStateRepo,
    NoQueueState,
    ProfileContinues,
    ProfileCompleted,
    NoIntegration,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::NoneStrategyContinues => f.write_str("none_strategy_continues"),
            DecisionReason::ManualModeContinues => f.write_str("manual_mode_continues"),
            DecisionReason::QueueAdvance { position, total } => {
                write!(f, "queue_advance_{}/{}", position, total)
            }
            DecisionReason::QueueExhausted => f.write_str("queue_exhausted"),
            DecisionReason::NoStateRepo => f.write_str("no_state_repo"),
            DecisionReason::NoQueueState => f.write_str("no_queue_state"),
            DecisionReason::ProfileContinues => f.write_str("profile_continues"),
            DecisionReason::ProfileCompleted => f.write_str("profile_completed"),
            DecisionReason::NoIntegration => f.write_str("no_integration"),
        }
    }
}

impl Serialize for DecisionReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 执行后决策：交给队列处理器，与任务的 auto-requeue 标志做逻辑与
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SteeringDecision {
    /// 刚执行的模式，或队列前进后的下一个模式（见队列策略）
    pub mode: Option<Mode>,
    pub should_requeue: bool,
    /// 为 true 时 should_requeue 必为 false
    pub exhausted: bool,
    pub reason: DecisionReason,
}

impl SteeringDecision {
    /// 继续：需要重新入队
    pub fn continues(mode: Option<Mode>, reason: DecisionReason) -> Self {
        Self {
            mode,
            should_requeue: true,
            exhausted: false,
            reason,
        }
    }

    /// 终止：已耗尽，不再入队
    pub fn exhausted(mode: Option<Mode>, reason: DecisionReason) -> Self {
        Self {
            mode,
            should_requeue: false,
            exhausted: true,
            reason,
        }
    }
}

/// 注入 Agent 提示词的片段及其来源标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEnhancement {
    pub section: String,
    /// 如 `manual:ux`、`queue:test[2/3]`、`profile:refactor`、`none:progress`
    pub source: String,
}

impl PromptEnhancement {
    /// 空白片段视为无内容，返回 None
    pub fn new(section: impl Into<String>, source: impl Into<String>) -> Option<Self> {
        let section = section.into();
        if section.trim().is_empty() {
            return None;
        }
        Some(Self {
            section,
            source: source.into(),
        })
    }
}

/// 核心读取的任务字段（任务本身由外部队列处理器拥有）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SteeringTask {
    pub id: String,
    pub steer_mode: Option<String>,
    pub steering_queue: Option<Vec<String>>,
    pub auto_steer_profile_id: Option<String>,
    pub target: Option<String>,
    pub targets: Vec<String>,
    pub processor_auto_requeue: bool,
}

impl SteeringTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_steer_mode(mut self, mode: impl Into<String>) -> Self {
        self.steer_mode = Some(mode.into());
        self
    }

    pub fn with_steering_queue<I, S>(mut self, queue: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steering_queue = Some(queue.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.auto_steer_profile_id = Some(profile_id.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_auto_requeue(mut self, auto_requeue: bool) -> Self {
        self.processor_auto_requeue = auto_requeue;
        self
    }

    /// 非空白的 profile id
    pub fn profile_id(&self) -> Option<&str> {
        non_blank(self.auto_steer_profile_id.as_deref())
    }

    /// 非空白的手动模式原文
    pub fn manual_mode(&self) -> Option<&str> {
        non_blank(self.steer_mode.as_deref())
    }

    /// 队列配置中的非空白项（未做模式校验）
    pub fn queue_entries(&self) -> Vec<String> {
        self.steering_queue
            .iter()
            .flatten()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// 传给 profile 集成的场景名：target 优先，其次 targets[0]
    pub fn scenario_name(&self) -> String {
        non_blank(self.target.as_deref())
            .or_else(|| self.targets.first().map(|t| t.trim()))
            .unwrap_or_default()
            .to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
