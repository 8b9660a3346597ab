//! PostgREST 风格的 HTTP 远端存储
//!
//! - 读取: `GET /rest/v1/{table}?user_id=eq.{id}&language=eq.{lang}`
//! - 写入: `POST /rest/v1/{table}?on_conflict={keys}`，`Prefer: resolution=merge-duplicates`
//! - 删除: `DELETE /rest/v1/{table}?user_id=eq.{id}&language=eq.{lang}[&{key}=eq.{value}]`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::{EntityKind, RemoteError, RemoteResult, RemoteScope, RemoteStore};

/// HTTP 远端配置
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// 服务基础 URL，如 `https://project.example.co`
    pub base_url: String,
    /// 匿名/服务 API key，同时作为 `apikey` 头和默认 bearer token
    pub api_key: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

pub struct RestRemoteStore {
    config: RestConfig,
    client: Client,
    access_token: Option<String>,
}

impl RestRemoteStore {
    pub fn new(config: RestConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            access_token: None,
        })
    }

    /// 使用登录用户的 access token 代替 API key 作为 bearer
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            kind.table()
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
    }
}

/// 行过滤条件
fn eq_filters(scope: &RemoteScope, kind: EntityKind, natural_key: Option<&str>) -> Vec<(String, String)> {
    let mut filters = vec![
        ("user_id".to_string(), format!("eq.{}", scope.identity)),
        ("language".to_string(), format!("eq.{}", scope.language)),
    ];
    if let (Some(column), Some(value)) = (kind.key_column(), natural_key) {
        filters.push((column.to_string(), format!("eq.{}", value)));
    }
    filters
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

fn network_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn fetch_all(&self, scope: &RemoteScope, kind: EntityKind) -> RemoteResult<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(kind))
            .query(&[("select", "*")])
            .query(&eq_filters(scope, kind, None));

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn upsert(
        &self,
        _scope: &RemoteScope,
        kind: EntityKind,
        _natural_key: &str,
        row: Value,
    ) -> RemoteResult<()> {
        let request = self
            .client
            .post(self.table_url(kind))
            .query(&[("on_conflict", kind.conflict_target())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, scope: &RemoteScope, kind: EntityKind, natural_key: &str) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.table_url(kind))
            .query(&eq_filters(scope, kind, Some(natural_key)));

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_all(&self, scope: &RemoteScope, kind: EntityKind) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.table_url(kind))
            .query(&eq_filters(scope, kind, None));

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response).await?;
        Ok(())
    }
}
