//! 任务定义
//!
//! 调用方提交的生成任务及其约束。

use super::provider::Capability;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务约束
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConstraints {
    /// 最大输出 tokens
    pub max_output_tokens: u32,
    /// 采样温度
    pub temperature: f32,
    /// 任务总截止时长（毫秒）
    pub deadline_ms: u64,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: 0.7,
            deadline_ms: 120_000,
        }
    }
}

/// 生成任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务 ID
    pub id: String,
    /// 任务类型标签
    pub task_type: Capability,
    /// 提示词
    pub prompt: String,
    /// 约束
    pub constraints: TaskConstraints,
    /// 指定模型（strategy=specific 时使用）
    pub pinned_model: Option<String>,
}

impl Task {
    /// 创建新任务
    pub fn new(task_type: Capability, prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type,
            prompt: prompt.to_string(),
            constraints: TaskConstraints::default(),
            pinned_model: None,
        }
    }

    /// 设置约束
    pub fn with_constraints(mut self, constraints: TaskConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// 设置最大输出 tokens
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.constraints.max_output_tokens = tokens;
        self
    }

    /// 设置截止时长（毫秒）
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.constraints.deadline_ms = deadline_ms;
        self
    }

    /// 设置采样温度
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.constraints.temperature = temperature;
        self
    }

    /// 指定模型
    pub fn with_pinned_model(mut self, model_id: &str) -> Self {
        self.pinned_model = Some(model_id.to_string());
        self
    }

    /// 估算提示词的输入 tokens（约 4 字符/token）
    pub fn estimated_input_tokens(&self) -> u32 {
        ((self.prompt.chars().count() / 4).max(1)) as u32
    }
}
