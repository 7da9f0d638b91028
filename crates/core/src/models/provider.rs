//! Provider 和模型描述符
//!
//! 定义注册到系统中的后端 Provider 与模型的静态元数据。

use serde::{Deserialize, Serialize};

/// 任务能力标签
///
/// Provider/模型声明自己支持的任务类型，路由时按标签过滤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 对话/聊天
    Chat,
    /// 代码生成
    CodeGeneration,
    /// 分析/推理
    Analysis,
    /// 写作/创意
    Writing,
    /// 翻译
    Translation,
    /// 摘要
    Summarization,
    /// 视觉理解
    Vision,
}

impl Capability {
    /// 获取能力标签的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Capability::Chat => "对话",
            Capability::CodeGeneration => "代码生成",
            Capability::Analysis => "分析",
            Capability::Writing => "写作",
            Capability::Translation => "翻译",
            Capability::Summarization => "摘要",
            Capability::Vision => "视觉",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::CodeGeneration => "code_generation",
            Capability::Analysis => "analysis",
            Capability::Writing => "writing",
            Capability::Translation => "translation",
            Capability::Summarization => "summarization",
            Capability::Vision => "vision",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 质量等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum QualityTier {
    /// 基础能力，适合简单任务
    Basic,
    /// 均衡选择，适合大多数任务
    #[default]
    Standard,
    /// 较强能力
    Premium,
    /// 最强能力，适合复杂任务
    Flagship,
}

impl QualityTier {
    /// 获取等级的数值（用于排序，越大越强）
    pub fn level(&self) -> u8 {
        match self {
            QualityTier::Basic => 1,
            QualityTier::Standard => 2,
            QualityTier::Premium => 3,
            QualityTier::Flagship => 4,
        }
    }
}

/// 速度等级
///
/// 数值越小响应越快。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SpeedTier {
    /// 最快
    Fast,
    #[default]
    Medium,
    /// 最慢
    Slow,
}

impl SpeedTier {
    /// 获取等级的数值（用于排序，越小越快）
    pub fn level(&self) -> u8 {
        match self {
            SpeedTier::Fast => 1,
            SpeedTier::Medium => 2,
            SpeedTier::Slow => 3,
        }
    }
}

/// Provider 的限流配额
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateQuota {
    /// 每个窗口允许的最大请求数
    pub max_requests: u32,
    /// 窗口时长（毫秒）
    pub window_ms: u64,
}

impl Default for RateQuota {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
        }
    }
}

/// Provider 描述符
///
/// 启动时注册一次，之后静态元数据不变；健康状态由注册表单独维护。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider ID
    pub id: String,
    /// 凭证引用（交给外部凭证存储解析，内容不落地）
    pub credential_ref: String,
    /// 声明支持的能力标签
    pub capabilities: Vec<Capability>,
    /// 限流配额
    pub quota: RateQuota,
}

impl ProviderDescriptor {
    /// 创建新的 Provider 描述符
    pub fn new(id: &str, credential_ref: &str) -> Self {
        Self {
            id: id.to_string(),
            credential_ref: credential_ref.to_string(),
            capabilities: Vec::new(),
            quota: RateQuota::default(),
        }
    }

    /// 添加能力标签
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// 设置限流配额
    pub fn with_quota(mut self, max_requests: u32, window_ms: u64) -> Self {
        self.quota = RateQuota {
            max_requests,
            window_ms,
        };
        self
    }
}

/// 模型描述符
///
/// 注册后不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// 模型 ID
    pub id: String,
    /// 所属 Provider ID
    pub provider_id: String,
    /// 上下文窗口大小（tokens）
    pub context_window: u32,
    /// 输入价格（每 1M tokens，USD）
    pub input_cost_per_million: f64,
    /// 输出价格（每 1M tokens，USD）
    pub output_cost_per_million: f64,
    /// 能力标签
    pub capabilities: Vec<Capability>,
    /// 质量等级
    pub quality_tier: QualityTier,
    /// 速度等级
    pub speed_tier: SpeedTier,
}

impl ModelDescriptor {
    /// 创建新的模型描述符
    pub fn new(id: &str, provider_id: &str) -> Self {
        Self {
            id: id.to_string(),
            provider_id: provider_id.to_string(),
            context_window: 128_000,
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
            capabilities: Vec::new(),
            quality_tier: QualityTier::default(),
            speed_tier: SpeedTier::default(),
        }
    }

    /// 设置上下文窗口
    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = tokens;
        self
    }

    /// 设置价格（每 1M tokens）
    pub fn with_pricing(mut self, input_per_million: f64, output_per_million: f64) -> Self {
        self.input_cost_per_million = input_per_million;
        self.output_cost_per_million = output_per_million;
        self
    }

    /// 添加能力标签
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// 设置质量等级
    pub fn with_quality(mut self, tier: QualityTier) -> Self {
        self.quality_tier = tier;
        self
    }

    /// 设置速度等级
    pub fn with_speed(mut self, tier: SpeedTier) -> Self {
        self.speed_tier = tier;
        self
    }

    /// 是否支持指定能力
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// 估算一次调用的成本（USD）
    pub fn estimated_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input + output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_levels() {
        assert!(QualityTier::Flagship.level() > QualityTier::Standard.level());
        assert!(QualityTier::Standard.level() > QualityTier::Basic.level());
        assert!(SpeedTier::Fast.level() < SpeedTier::Slow.level());
    }

    #[test]
    fn test_provider_builder() {
        let provider = ProviderDescriptor::new("anthropic", "ANTHROPIC_API_KEY")
            .with_capability(Capability::Chat)
            .with_capability(Capability::Chat)
            .with_quota(30, 60_000);

        assert_eq!(provider.capabilities.len(), 1);
        assert_eq!(provider.quota.max_requests, 30);
    }

    #[test]
    fn test_estimated_cost() {
        let model = ModelDescriptor::new("claude-sonnet", "anthropic").with_pricing(3.0, 15.0);

        // 1M 输入 + 1M 输出 = 18 USD
        let cost = model.estimated_cost(1_000_000, 1_000_000);
        assert!((cost - 18.0).abs() < f64::EPSILON);

        // 零 tokens 成本为零
        assert_eq!(model.estimated_cost(0, 0), 0.0);
    }

    #[test]
    fn test_supports_capability() {
        let model =
            ModelDescriptor::new("m", "p").with_capability(Capability::CodeGeneration);
        assert!(model.supports(Capability::CodeGeneration));
        assert!(!model.supports(Capability::Vision));
    }
}
