//! 选择策略 trait 和注册表
//!
//! 策略对候选池做确定性排序，排序结果就是降级链。策略本身是纯函数：
//! 相同的 (任务, 策略, 候选池快照) 必然产生相同的链。

use crate::models::{ModelDescriptor, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// 策略错误
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("没有可用的模型")]
    NoAvailableModels,

    #[error("策略不存在: {0}")]
    StrategyNotFound(String),

    #[error("指定模型不可用: {model_id}: {detail}")]
    PinnedModelUnavailable { model_id: String, detail: String },

    #[error("选择失败: {0}")]
    SelectionFailed(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;

/// 策略类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum StrategyKind {
    /// 质量优先
    Quality,
    /// 成本优先
    Cost,
    /// 速度优先
    Speed,
    /// 均衡
    #[default]
    Balanced,
    /// 指定模型，不降级
    Specific,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Quality => "quality",
            StrategyKind::Cost => "cost",
            StrategyKind::Speed => "speed",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Specific => "specific",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quality" => Some(StrategyKind::Quality),
            "cost" => Some(StrategyKind::Cost),
            "speed" => Some(StrategyKind::Speed),
            "balanced" => Some(StrategyKind::Balanced),
            "specific" => Some(StrategyKind::Specific),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 均衡策略的权重配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalancedWeights {
    pub quality: f64,
    pub cost: f64,
    pub speed: f64,
}

impl Default for BalancedWeights {
    fn default() -> Self {
        // 默认三等分
        Self {
            quality: 1.0 / 3.0,
            cost: 1.0 / 3.0,
            speed: 1.0 / 3.0,
        }
    }
}

impl BalancedWeights {
    pub fn new(quality: f64, cost: f64, speed: f64) -> Self {
        Self {
            quality,
            cost,
            speed,
        }
        .normalized()
    }

    /// 归一化，使三项权重之和为 1
    pub fn normalized(self) -> Self {
        let sum = self.quality + self.cost + self.speed;
        if sum <= 0.0 {
            return Self::default();
        }
        Self {
            quality: self.quality / sum,
            cost: self.cost / sum,
            speed: self.speed / sum,
        }
    }
}

/// 策略排序结果
///
/// `models` 的整体顺序就是降级链：首位是首选，其余为备选。
#[derive(Debug, Clone)]
pub struct ChainOrdering {
    /// 排好序的候选
    pub models: Vec<ModelDescriptor>,
    /// 排序原因
    pub reason: String,
}

/// 选择策略 trait
///
/// 实现必须是纯函数：不读取隐藏状态，不引入随机性。
pub trait SelectionStrategy: Send + Sync {
    /// 策略 ID
    fn id(&self) -> &str;

    /// 策略显示名称
    fn display_name(&self) -> &str;

    /// 策略描述
    fn description(&self) -> &str {
        ""
    }

    /// 对候选池排序，产出降级链
    fn order(&self, pool: &[ModelDescriptor], task: &Task) -> StrategyResult<ChainOrdering>;
}

/// 策略注册表
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn SelectionStrategy>>,
    default_strategy: String,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
            default_strategy: StrategyKind::Balanced.as_str().to_string(),
        }
    }

    /// 注册策略
    pub fn register(&mut self, strategy: Arc<dyn SelectionStrategy>) {
        let id = strategy.id().to_string();
        tracing::debug!("[Strategy] 注册策略: {} ({})", id, strategy.display_name());
        self.strategies.insert(id, strategy);
    }

    /// 获取策略
    pub fn get(&self, id: &str) -> Option<Arc<dyn SelectionStrategy>> {
        self.strategies.get(id).cloned()
    }

    /// 获取默认策略
    pub fn get_default(&self) -> Option<Arc<dyn SelectionStrategy>> {
        self.get(&self.default_strategy)
    }

    /// 设置默认策略
    pub fn set_default(&mut self, id: &str) -> StrategyResult<()> {
        if self.strategies.contains_key(id) {
            self.default_strategy = id.to_string();
            Ok(())
        } else {
            Err(StrategyError::StrategyNotFound(id.to_string()))
        }
    }

    /// 所有已注册的策略 ID
    pub fn list_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.strategies.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
