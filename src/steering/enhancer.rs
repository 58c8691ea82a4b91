//! Prompt 增强器：为给定模式生成注入 Agent 提示词的「模式段落」
//!
//! 核心只调用 `mode_section`；空白文本表示该模式没有内容。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use super::types::Mode;

/// Prompt 增强器接口
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    /// 生成模式段落；空字符串表示无内容
    async fn mode_section(&self, mode: Mode) -> anyhow::Result<String>;
}

/// 从目录读取 `<mode>.md` 作为模式段落；文件不存在时返回空
#[derive(Debug, Clone)]
pub struct FilePromptEnhancer {
    modes_dir: PathBuf,
}

impl FilePromptEnhancer {
    pub fn new(modes_dir: impl AsRef<Path>) -> Self {
        Self {
            modes_dir: modes_dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, mode: Mode) -> PathBuf {
        self.modes_dir.join(format!("{}.md", mode.as_str()))
    }
}

#[async_trait]
impl PromptEnhancer for FilePromptEnhancer {
    async fn mode_section(&self, mode: Mode) -> anyhow::Result<String> {
        let path = self.path_for(mode);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(mode = %mode, "No prompt file for mode: {:?}", path);
                Ok(String::new())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read mode prompt {:?}", path)),
        }
    }
}

/// 内存中的模式段落表
#[derive(Debug, Clone, Default)]
pub struct StaticPromptEnhancer {
    sections: HashMap<Mode, String>,
}

impl StaticPromptEnhancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, mode: Mode, section: impl Into<String>) -> Self {
        self.sections.insert(mode, section.into());
        self
    }

    /// 内置的简短指引，未配置 prompt 目录时使用
    pub fn builtin() -> Self {
        Mode::ALL.into_iter().fold(Self::new(), |enhancer, mode| {
            enhancer.with_section(mode, builtin_section(mode))
        })
    }
}

#[async_trait]
impl PromptEnhancer for StaticPromptEnhancer {
    async fn mode_section(&self, mode: Mode) -> anyhow::Result<String> {
        Ok(self.sections.get(&mode).cloned().unwrap_or_default())
    }
}

fn builtin_section(mode: Mode) -> String {
    let focus = match mode {
        Mode::Progress => "Advance the task toward its acceptance criteria; prefer shipping working increments.",
        Mode::Ux => "Improve user-facing flows, accessibility and visual consistency.",
        Mode::Refactor => "Restructure existing code for clarity without changing behavior.",
        Mode::Test => "Add or repair tests and raise confidence in existing behavior.",
        Mode::Explore => "Investigate the codebase and record findings before changing anything.",
        Mode::Polish => "Fix rough edges: error messages, naming, small inconsistencies.",
        Mode::Integration => "Wire components together and verify end-to-end paths.",
        Mode::Performance => "Measure, then remove the most significant bottlenecks.",
        Mode::Security => "Review inputs, secrets and permissions; fix concrete weaknesses.",
    };
    format!("## Steering Focus: {}\n\n{}\n", mode.as_str(), focus)
}
