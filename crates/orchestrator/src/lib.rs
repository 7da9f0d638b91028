//! modelcast 编排模块
//!
//! ## 模块结构
//!
//! - `config` - 编排配置
//! - `dispatcher` - 降级链调度引擎
//! - `tournament` - 锦标赛共识评估器
//! - `streaming` - 流式会话管理
//! - `scorer` - 可插拔评分器
//! - `orchestrator` - 统一编排接口

mod attempt;
pub mod config;
pub mod dispatcher;
pub mod orchestrator;
pub mod scorer;
pub mod streaming;
pub mod tournament;

pub use config::OrchestratorConfig;
pub use dispatcher::DispatchEngine;
pub use orchestrator::ModelOrchestrator;
pub use scorer::{FnScorer, HeuristicScorer, Scorer, ScorerRegistry};
pub use streaming::{StreamEvent, StreamHandle, StreamManager};
pub use tournament::TournamentEvaluator;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
