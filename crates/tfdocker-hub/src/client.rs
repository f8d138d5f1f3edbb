//! Docker Hub API クライアント
//!
//! Hub v2 REST API の薄いラッパー。リクエストには Bearer トークンとして
//! パーソナルアクセストークンか `/users/login` が返す JWT を付ける。

use crate::error::{HubError, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://hub.docker.com/v2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 一覧エンドポイントを辿るときのページサイズ
pub const PAGE_SIZE: u32 = 100;

/// 一覧エンドポイントの 1 ページ
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<T>,
}

/// Docker Hub API クライアント
#[derive(Debug, Clone)]
pub struct HubClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    username: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl HubClient {
    /// 公開 Hub 向けの未認証クライアントを作成
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// 別の API ルートに向けたクライアントを作成
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| HubError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(HubError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: None,
            username: None,
        })
    }

    /// パーソナルアクセストークンを Bearer 認証に使う
    pub fn with_token(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.token = Some(token.into());
        self
    }

    /// ユーザー名とパスワードをセッショントークンに交換する
    pub async fn login(mut self, username: &str, password: &str) -> Result<Self> {
        let url = self.url(&["users", "login"])?;
        tracing::debug!("Logging in to Docker Hub as {}", username);

        let response = self
            .client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::AuthenticationFailed(format!("{} - {}", status, body)));
        }

        let login: LoginResponse = response.json().await?;
        self.token = Some(login.token);
        self.username = Some(username.to_string());
        Ok(self)
    }

    /// 認証済みのユーザー名
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// パスセグメントから URL を組み立てる。各セグメントはパーセントエスケープする
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HubError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn page_url(&self, segments: &[&str], page: u32, page_size: u32) -> Result<Url> {
        let mut url = self.url(segments)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::Api { status, body });
        }
        Ok(response)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;
        let response = self.execute(self.client.get(url)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// JSON ボディを送り応答をデコードする。204 と空ボディは `T::default()`
    pub(crate) async fn send<B, T>(&self, method: Method, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let url = self.url(segments)?;
        let response = self
            .execute(self.client.request(method, url).json(body))
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(T::default());
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 応答ボディを使わないリクエストを送る
    pub(crate) async fn send_empty<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, segments: &[&str]) -> Result<()> {
        self.send_empty::<()>(Method::DELETE, segments, None).await
    }

    /// 一覧エンドポイントの 1 ページを取得
    pub async fn page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        page: u32,
        page_size: u32,
    ) -> Result<Page<T>> {
        let url = self.page_url(segments, page, page_size)?;
        let response = self.execute(self.client.get(url)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `count` 件読むか空のページが返るまで一覧エンドポイントを辿る
    pub(crate) async fn list_all<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_number = 1;

        loop {
            let page: Page<T> = self.page(segments, page_number, PAGE_SIZE).await?;
            if page.results.is_empty() {
                break;
            }
            items.extend(page.results);
            if items.len() as u64 >= page.count {
                break;
            }
            page_number += 1;
        }

        tracing::debug!("Listed {} items from /{}", items.len(), segments.join("/"));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_segments_are_escaped() {
        let client = HubClient::new().unwrap();
        let url = client.url(&["orgs", "acme", "groups", "dev ops"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hub.docker.com/v2/orgs/acme/groups/dev%20ops"
        );
    }

    #[test]
    fn test_url_with_trailing_slash_base() {
        let client = HubClient::with_base_url("http://localhost:8080/v2/").unwrap();
        let url = client.url(&["repositories", "acme"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v2/repositories/acme");
    }

    #[test]
    fn test_page_of_type_without_default() {
        #[derive(Debug, Deserialize)]
        struct Tag {
            name: String,
        }

        let page: Page<Tag> =
            serde_json::from_str(r#"{"count": 1, "results": [{"name": "v1"}]}"#).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].name, "v1");

        let empty: Page<Tag> = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }

    #[test]
    fn test_page_url() {
        let client = HubClient::new().unwrap();
        let url = client.page_url(&["access-tokens"], 2, 100).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hub.docker.com/v2/access-tokens?page=2&page_size=100"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HubClient::with_base_url("not a url"),
            Err(HubError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_with_token() {
        let client = HubClient::new().unwrap();
        assert!(!client.is_authenticated());

        let client = client.with_token("alice", "dckr_pat_x");
        assert!(client.is_authenticated());
        assert_eq!(client.username(), Some("alice"));
    }
}
