//! Provider 适配层
//!
//! ## 模块结构
//!
//! - `adapter` - 统一的调用/流式接口与错误分类
//! - `credential` - 凭证引用解析
//! - `http` - OpenAI 兼容的 HTTP 适配器
//! - `mock` - 脚本化适配器（测试用）

pub mod adapter;
pub mod credential;
pub mod http;
pub mod mock;

pub use adapter::{
    AdapterError, AdapterStream, ProviderAdapter, ProviderRequest, ProviderResponse, StreamDelta,
};
pub use credential::{AuthToken, CredentialError, CredentialStore, EnvCredentialStore};
pub use http::OpenAiCompatAdapter;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
