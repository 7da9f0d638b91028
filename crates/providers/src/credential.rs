//! 凭证解析
//!
//! Provider 描述符里只存凭证引用，真正的令牌由外部凭证存储按引用
//! 解析，内容对本系统不透明。

use std::collections::HashMap;
use thiserror::Error;

/// 凭证错误
#[derive(Error, Debug, Clone)]
pub enum CredentialError {
    #[error("凭证未找到: {credential_ref}")]
    NotFound { credential_ref: String },
}

/// 不透明的鉴权令牌
///
/// Debug 输出做了脱敏，避免令牌进日志。
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 取出令牌内容（仅在拼装请求头时使用）
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

/// 凭证存储
pub trait CredentialStore: Send + Sync {
    /// 按引用解析令牌
    fn resolve(&self, credential_ref: &str) -> Result<AuthToken, CredentialError>;
}

/// 从环境变量解析凭证
///
/// 凭证引用即环境变量名，例如 `ANTHROPIC_API_KEY`。
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn resolve(&self, credential_ref: &str) -> Result<AuthToken, CredentialError> {
        std::env::var(credential_ref)
            .map(AuthToken::new)
            .map_err(|_| CredentialError::NotFound {
                credential_ref: credential_ref.to_string(),
            })
    }
}

/// 静态凭证存储（测试用）
#[derive(Default)]
pub struct StaticCredentialStore {
    tokens: HashMap<String, String>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, credential_ref: &str, token: &str) -> Self {
        self.tokens
            .insert(credential_ref.to_string(), token.to_string());
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn resolve(&self, credential_ref: &str) -> Result<AuthToken, CredentialError> {
        self.tokens
            .get(credential_ref)
            .map(|t| AuthToken::new(t.clone()))
            .ok_or_else(|| CredentialError::NotFound {
                credential_ref: credential_ref.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_store() {
        let store = StaticCredentialStore::new().with_token("KEY_REF", "sk-test");
        let token = store.resolve("KEY_REF").unwrap();
        assert_eq!(token.expose(), "sk-test");

        assert!(matches!(
            store.resolve("MISSING"),
            Err(CredentialError::NotFound { .. })
        ));
    }

    #[test]
    fn test_auth_token_debug_redacted() {
        let token = AuthToken::new("sk-secret");
        assert_eq!(format!("{token:?}"), "AuthToken(***)");
    }
}
