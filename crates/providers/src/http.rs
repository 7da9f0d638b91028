//! OpenAI 兼容的 HTTP 适配器
//!
//! 大多数厂商端点都暴露 chat/completions 兼容层，这里用一个适配器
//! 统一覆盖；鉴权令牌通过凭证存储按引用解析。

use crate::adapter::{
    AdapterError, AdapterStream, ProviderAdapter, ProviderRequest, ProviderResponse, StreamDelta,
};
use crate::credential::CredentialStore;
use async_trait::async_trait;
use futures::StreamExt;
use modelcast_core::models::{FinishReason, TokenUsage};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// OpenAI 兼容适配器
pub struct OpenAiCompatAdapter {
    provider_id: String,
    base_url: String,
    credential_ref: String,
    credentials: Arc<dyn CredentialStore>,
    client: reqwest::Client,
}

impl OpenAiCompatAdapter {
    pub fn new(
        provider_id: &str,
        base_url: &str,
        credential_ref: &str,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AdapterError::terminal(format!("创建 HTTP 客户端失败: {e}")))?;
        Ok(Self {
            provider_id: provider_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential_ref: credential_ref.to_string(),
            credentials,
            client,
        })
    }

    fn endpoint(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.base_url)
        } else {
            format!("{}/v1/chat/completions", self.base_url)
        }
    }

    fn bearer(&self) -> Result<String, AdapterError> {
        let token = self
            .credentials
            .resolve(&self.credential_ref)
            .map_err(|e| AdapterError::terminal(format!("凭证解析失败: {e}")))?;
        Ok(format!("Bearer {}", token.expose()))
    }

    fn body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        json!({
            "model": request.model_id,
            "messages": [{"role": "user", "content": request.prompt}],
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }

    async fn send(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        tracing::debug!(
            "[OpenAiCompat] POST {} model={} stream={}",
            self.endpoint(),
            request.model_id,
            stream
        );
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", self.bearer()?)
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&self.body(request, stream))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::transient(format!("请求超时: {e}"))
                } else {
                    AdapterError::transient(format!("请求失败: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取响应体".to_string());
            return Err(AdapterError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn id(&self) -> &str {
        &self.provider_id
    }

    async fn call(
        &self,
        request: ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, AdapterError> {
        let response = self.send(&request, timeout, false).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::transient(format!("解析响应失败: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::transient("响应中没有 choices"))?;

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: body
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default(),
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        timeout: Duration,
    ) -> Result<AdapterStream, AdapterError> {
        let response = self.send(&request, timeout, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            let mut usage: Option<TokenUsage> = None;
            let mut finished = false;

            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AdapterError::transient(format!("读取流失败: {e}")));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE 按行分帧，保留未完结的尾行
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        finished = true;
                        break 'outer;
                    }

                    let parsed: ChatChunk = match serde_json::from_str(data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            yield Err(AdapterError::transient(format!("解析流帧失败: {e}")));
                            return;
                        }
                    };
                    if let Some(u) = parsed.usage {
                        usage = Some(TokenUsage::new(u.prompt_tokens, u.completion_tokens));
                    }
                    if let Some(choice) = parsed.choices.into_iter().next() {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() {
                                yield Ok(StreamDelta::chunk(content));
                            }
                        }
                        if choice.finish_reason.is_some() {
                            finished = true;
                            break 'outer;
                        }
                    }
                }
            }

            if finished {
                yield Ok(StreamDelta::finished(
                    usage.unwrap_or_default(),
                    FinishReason::Stop,
                ));
            } else {
                yield Err(AdapterError::transient("上游流提前结束"));
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// ============================================================================
// 响应类型
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}
