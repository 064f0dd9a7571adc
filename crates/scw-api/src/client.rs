//! Scaleway HTTP client
//!
//! Authenticates with the `X-Auth-Token` header. Every call runs inside the
//! caller's [`Context`], so cancellation or an expired deadline drops the
//! in-flight request.

use crate::error::{ApiError, ErrorBody, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use scw_core::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

const AUTH_HEADER: &str = "X-Auth-Token";
const PAGE_SIZE: u32 = 100;

/// Connection settings for [`ScwClient`]
#[derive(Clone)]
pub struct ClientConfig {
    pub access_key: String,
    pub secret_key: String,
    pub api_url: String,
    pub user_agent: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"(sensitive value)")
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Shared, cheaply cloneable API client
#[derive(Clone)]
pub struct ScwClient {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl fmt::Debug for ScwClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScwClient")
            .field("base_url", &self.base_url)
            .field("access_key", &self.access_key)
            .finish()
    }
}

impl ScwClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut token = HeaderValue::from_str(&config.secret_key)
            .map_err(|_| ApiError::InvalidConfig("secret key is not a valid header value".into()))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            access_key: config.access_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let req = self.http.get(self.url(path)).query(query);
        let body = self.send(ctx, req, Method::GET, path).await?;
        decode(path, &body)
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.http.post(self.url(path)).json(body);
        let body = self.send(ctx, req, Method::POST, path).await?;
        decode(path, &body)
    }

    pub(crate) async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.http.patch(self.url(path)).json(body);
        let body = self.send(ctx, req, Method::PATCH, path).await?;
        decode(path, &body)
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.http.put(self.url(path)).json(body);
        let body = self.send(ctx, req, Method::PUT, path).await?;
        decode(path, &body)
    }

    /// POST whose reply body is discarded
    pub(crate) async fn post_empty<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let req = self.http.post(self.url(path)).json(body);
        self.send(ctx, req, Method::POST, path).await.map(|_| ())
    }

    pub(crate) async fn delete(
        &self,
        ctx: &Context,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<()> {
        let req = self.http.delete(self.url(path)).query(query);
        self.send(ctx, req, Method::DELETE, path).await.map(|_| ())
    }

    /// Follow `page` until `total_count` items were collected
    pub(crate) async fn list_all<P, T>(
        &self,
        ctx: &Context,
        path: &str,
        query: &[(&str, String)],
        extract: impl Fn(P) -> (Vec<T>, u64),
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let mut out = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut q = query.to_vec();
            q.push(("page", page.to_string()));
            q.push(("page_size", PAGE_SIZE.to_string()));
            let (items, total) = extract(self.get::<P>(ctx, path, &q).await?);
            let fetched = items.len();
            out.extend(items);
            if fetched == 0 || out.len() as u64 >= total {
                return Ok(out);
            }
            page += 1;
        }
    }

    async fn send(
        &self,
        ctx: &Context,
        req: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<String> {
        tracing::debug!(%method, path, "scaleway api request");
        let response = ctx.run(req.send()).await??;
        let status = response.status();
        let text = ctx.run(response.text()).await??;
        tracing::debug!(%method, path, status = status.as_u16(), "scaleway api response");

        if status.is_success() {
            return Ok(text);
        }
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = if body.message.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body.message
        };
        Err(ApiError::Http {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            error_type: body.error_type,
            message,
            resource: body.resource,
        })
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T> {
    // Empty replies decode as `{}` so unit-like response structs still work
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret() {
        let config = ClientConfig {
            access_key: "SCWXXXXXXXXXXXXXXXXX".into(),
            secret_key: "11111111-1111-4111-8111-111111111111".into(),
            api_url: "https://api.scaleway.com/".into(),
            user_agent: "test".into(),
        };
        assert!(!format!("{config:?}").contains("11111111"));
        let client = ScwClient::new(config).unwrap();
        assert_eq!(client.base_url(), "https://api.scaleway.com");
    }

    #[test]
    fn test_invalid_secret() {
        let config = ClientConfig {
            access_key: String::new(),
            secret_key: "line\nbreak".into(),
            api_url: String::new(),
            user_agent: String::new(),
        };
        assert!(matches!(
            ScwClient::new(config),
            Err(ApiError::InvalidConfig(_))
        ));
    }
}
