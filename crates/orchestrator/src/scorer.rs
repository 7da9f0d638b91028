//! 评分器
//!
//! 共识评分没有固定算法，评分器以注入函数的形式插拔。内置一个
//! 加权启发式评分器作为注册表默认项。

use modelcast_core::models::{CandidateResult, Task};
use std::collections::HashMap;
use std::sync::Arc;

/// 评分器 trait
///
/// 分数越高越好；实现必须是确定性的。
pub trait Scorer: Send + Sync {
    /// 评分器 ID
    fn id(&self) -> &str;

    /// 给一个成功候选打分
    fn score(&self, task: &Task, candidate: &CandidateResult) -> f64;
}

/// 加权启发式评分器
///
/// 完成度（输出量相对任务上限）、效率（延迟越低越好）、实质内容
/// 三项加权。
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub const ID: &'static str = "heuristic";

    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for HeuristicScorer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn score(&self, task: &Task, candidate: &CandidateResult) -> f64 {
        let max_output = task.constraints.max_output_tokens.max(1) as f64;
        let completeness = (candidate.usage.output_tokens as f64 / max_output).min(1.0);
        let efficiency = 1.0 / (1.0 + candidate.latency_ms as f64 / 1_000.0);
        let substance = if candidate.content.trim().is_empty() {
            0.0
        } else {
            (candidate.content.chars().count() as f64 / 200.0).min(1.0)
        };

        completeness * 0.4 + efficiency * 0.3 + substance * 0.3
    }
}

/// 闭包评分器
///
/// 调用方注入任意评分函数。
pub struct FnScorer {
    id: String,
    func: Box<dyn Fn(&Task, &CandidateResult) -> f64 + Send + Sync>,
}

impl FnScorer {
    pub fn new(
        id: &str,
        func: impl Fn(&Task, &CandidateResult) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.to_string(),
            func: Box::new(func),
        }
    }
}

impl Scorer for FnScorer {
    fn id(&self) -> &str {
        &self.id
    }

    fn score(&self, task: &Task, candidate: &CandidateResult) -> f64 {
        (self.func)(task, candidate)
    }
}

/// 评分器注册表
pub struct ScorerRegistry {
    scorers: HashMap<String, Arc<dyn Scorer>>,
    default_scorer: String,
}

impl ScorerRegistry {
    pub fn new() -> Self {
        Self {
            scorers: HashMap::new(),
            default_scorer: HeuristicScorer::ID.to_string(),
        }
    }

    /// 创建带内置评分器的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HeuristicScorer::new()));
        registry
    }

    pub fn register(&mut self, scorer: Arc<dyn Scorer>) {
        tracing::debug!("[Scorer] 注册评分器: {}", scorer.id());
        self.scorers.insert(scorer.id().to_string(), scorer);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Scorer>> {
        self.scorers.get(id).cloned()
    }

    pub fn get_default(&self) -> Option<Arc<dyn Scorer>> {
        self.get(&self.default_scorer)
    }

    pub fn set_default(&mut self, id: &str) -> bool {
        if self.scorers.contains_key(id) {
            self.default_scorer = id.to_string();
            true
        } else {
            false
        }
    }
}

impl Default for ScorerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcast_core::models::{Capability, TokenUsage};

    fn candidate(content: &str, output_tokens: u32, latency_ms: u64) -> CandidateResult {
        CandidateResult {
            model_id: "m1".to_string(),
            provider_id: "p1".to_string(),
            content: content.to_string(),
            usage: TokenUsage::new(10, output_tokens),
            latency_ms,
        }
    }

    #[test]
    fn test_heuristic_prefers_substance_over_empty() {
        let scorer = HeuristicScorer::new();
        let task = Task::new(Capability::Chat, "你好");

        let full = scorer.score(&task, &candidate("这是一段完整的回答", 100, 500));
        let empty = scorer.score(&task, &candidate("", 0, 500));
        assert!(full > empty);
    }

    #[test]
    fn test_heuristic_prefers_lower_latency() {
        let scorer = HeuristicScorer::new();
        let task = Task::new(Capability::Chat, "你好");

        let fast = scorer.score(&task, &candidate("回答", 50, 100));
        let slow = scorer.score(&task, &candidate("回答", 50, 10_000));
        assert!(fast > slow);
    }

    #[test]
    fn test_fn_scorer() {
        let scorer = FnScorer::new("length", |_task, c| c.content.chars().count() as f64);
        let task = Task::new(Capability::Chat, "你好");
        assert_eq!(scorer.score(&task, &candidate("四个字呀", 1, 0)), 4.0);
    }

    #[test]
    fn test_registry_default() {
        let registry = ScorerRegistry::with_builtins();
        assert!(registry.get_default().is_some());
        assert_eq!(registry.get_default().unwrap().id(), HeuristicScorer::ID);
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn test_registry_set_default() {
        let mut registry = ScorerRegistry::with_builtins();
        registry.register(Arc::new(FnScorer::new("custom", |_, _| 1.0)));
        assert!(registry.set_default("custom"));
        assert_eq!(registry.get_default().unwrap().id(), "custom");
        assert!(!registry.set_default("ghost"));
    }
}
