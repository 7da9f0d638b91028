//! Provider 与模型注册表
//!
//! 维护后端目录与每个 Provider 的熔断健康状态。`report_outcome` 是
//! 健康状态唯一的变更入口，基于 DashMap 分段锁保证并发安全。

mod breaker;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};

use crate::errors::{OrchestrateError, OrchestrateResult};
use crate::models::{Capability, ModelDescriptor, ProviderDescriptor, RateQuota};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 模型注册表
pub struct ModelRegistry {
    /// 已注册的 Provider
    providers: DashMap<String, ProviderDescriptor>,
    /// 已注册的模型
    models: RwLock<Vec<ModelDescriptor>>,
    /// 每个 Provider 的熔断器
    breakers: DashMap<String, CircuitBreaker>,
    /// 新 Provider 的熔断器配置
    breaker_config: BreakerConfig,
}

impl ModelRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self::with_breaker_config(BreakerConfig::default())
    }

    /// 使用指定熔断配置创建
    pub fn with_breaker_config(config: BreakerConfig) -> Self {
        Self {
            providers: DashMap::new(),
            models: RwLock::new(Vec::new()),
            breakers: DashMap::new(),
            breaker_config: config,
        }
    }

    /// 注册 Provider
    pub fn register_provider(&self, provider: ProviderDescriptor) {
        tracing::info!(
            "[Registry] 注册 Provider: {} (能力 {} 项)",
            provider.id,
            provider.capabilities.len()
        );
        self.breakers
            .entry(provider.id.clone())
            .or_insert_with(|| CircuitBreaker::new(self.breaker_config));
        self.providers.insert(provider.id.clone(), provider);
    }

    /// 注册模型
    ///
    /// 所属 Provider 必须已注册。
    pub fn register_model(&self, model: ModelDescriptor) -> OrchestrateResult<()> {
        if !self.providers.contains_key(&model.provider_id) {
            return Err(OrchestrateError::UnknownProvider {
                provider_id: model.provider_id.clone(),
            });
        }
        tracing::info!(
            "[Registry] 注册模型: {} (provider={})",
            model.id,
            model.provider_id
        );
        let mut models = self.models.write();
        models.retain(|m| m.id != model.id);
        models.push(model);
        Ok(())
    }

    /// 按 ID 查询模型
    pub fn model(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.models.read().iter().find(|m| m.id == model_id).cloned()
    }

    /// 按 ID 查询 Provider
    pub fn provider(&self, provider_id: &str) -> Option<ProviderDescriptor> {
        self.providers.get(provider_id).map(|p| p.value().clone())
    }

    /// 查询 Provider 的限流配额
    pub fn quota(&self, provider_id: &str) -> Option<RateQuota> {
        self.providers.get(provider_id).map(|p| p.value().quota)
    }

    /// 查询某个 Provider 下的所有模型
    pub fn models_for_provider(&self, provider_id: &str) -> Vec<ModelDescriptor> {
        self.models
            .read()
            .iter()
            .filter(|m| m.provider_id == provider_id)
            .cloned()
            .collect()
    }

    /// 查询匹配任务能力标签的候选模型
    ///
    /// 熔断中（OPEN 且冷却未结束）的 Provider 会被整体排除，而不是
    /// 降低优先级。结果按模型 ID 排序，保证确定性的基准顺序。
    pub fn eligible_models(&self, capability: Capability) -> Vec<ModelDescriptor> {
        let mut eligible: Vec<ModelDescriptor> = self
            .models
            .read()
            .iter()
            .filter(|m| m.supports(capability))
            .filter(|m| self.provider_allows(&m.provider_id))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| a.id.cmp(&b.id));
        eligible
    }

    /// Provider 当前是否放行（熔断视角）
    pub fn provider_allows(&self, provider_id: &str) -> bool {
        match self.breakers.get_mut(provider_id) {
            Some(mut breaker) => breaker.allows_traffic(),
            None => false,
        }
    }

    /// 发起调用前占用熔断名额
    ///
    /// HALF_OPEN 状态下只会放行一次试探调用；占用失败表示该 Provider
    /// 当前不应被调用。
    pub fn try_acquire(&self, provider_id: &str) -> bool {
        match self.breakers.get_mut(provider_id) {
            Some(mut breaker) => breaker.try_acquire(),
            None => false,
        }
    }

    /// 归还未产生结果的试探名额（调用被取消时）
    pub fn release_probe(&self, provider_id: &str) {
        if let Some(mut breaker) = self.breakers.get_mut(provider_id) {
            breaker.release_probe();
        }
    }

    /// 上报调用结局
    ///
    /// 健康状态唯一的变更入口；并发调用安全。
    pub fn report_outcome(&self, model_id: &str, success: bool) -> OrchestrateResult<()> {
        let model = self
            .model(model_id)
            .ok_or_else(|| OrchestrateError::UnknownModel {
                model_id: model_id.to_string(),
            })?;
        let mut breaker = self.breakers.get_mut(&model.provider_id).ok_or_else(|| {
            OrchestrateError::UnknownProvider {
                provider_id: model.provider_id.clone(),
            }
        })?;
        if success {
            breaker.record_success();
        } else {
            breaker.record_failure();
        }
        tracing::debug!(
            "[Registry] 上报结局: model={} provider={} success={} state={}",
            model_id,
            model.provider_id,
            success,
            breaker.state()
        );
        Ok(())
    }

    /// 查询 Provider 的熔断状态
    pub fn breaker_state(&self, provider_id: &str) -> Option<CircuitState> {
        self.breakers.get(provider_id).map(|b| b.state())
    }

    /// 所有 Provider 的熔断状态快照
    pub fn breaker_snapshot(&self) -> HashMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// 已注册模型总数
    pub fn model_count(&self) -> usize {
        self.models.read().len()
    }

    /// 已注册 Provider 总数
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
