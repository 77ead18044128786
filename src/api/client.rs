use std::borrow::Borrow;

use reqwest::{Method, StatusCode};
use snafu::prelude::*;

use super::error::variant::*;
use super::types::*;
use super::Result;

static DEFAULT_BASE_URL: &str = "https://www.kaiheila.cn/api/v3";

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Kaiheila HTTP API Client
#[derive(Debug, Clone)]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    compress: bool,
}

impl Client {
    fn new<S: AsRef<str> + ?Sized>(auth_type: &'static str, token: &S) -> Result<Self> {
        let token = token.as_ref();
        let auth_header_value = format!("{} {}", auth_type, token)
            .parse()
            .map_err(|_| TokenInvalid.build())?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, auth_header_value);

        let client = reqwest::Client::builder()
            .gzip(true)
            .deflate(true)
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .build()
            .context(ClientCreateFailed)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            compress: true,
        })
    }

    /// create a new api client using bot token
    pub fn new_from_bot_token<S: AsRef<str> + ?Sized>(token: &S) -> Result<Self> {
        Self::new("Bot", token)
    }

    /// create a new api client using oauth2 token
    pub fn new_from_oauth2_token<S: AsRef<str> + ?Sized>(token: &S) -> Result<Self> {
        Self::new("Bearer", token)
    }

    /// use another api endpoint, for proxies or test servers
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// ask gateway to compress frames or not, default is true
    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// api endpoint this client calls
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<R, P, Q, K, V>(&self, path: &P, query: Q) -> Result<R>
    where
        P: AsRef<str> + ?Sized,
        Q: IntoIterator,
        Q::Item: Borrow<(K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path.as_ref());
        let mut req = self.client.get(&url);

        for q in query.into_iter() {
            let (k, v) = q.borrow();
            req = req.query(&[(k.as_ref(), v.as_ref())]);
        }

        let req = req.build().context(BuildRequestFailed)?;

        log::trace!("GET {}", req.url());

        let resp = self
            .client
            .execute(req)
            .await
            .with_context(|_| RequestFailed {
                method: Method::GET,
                url: &url,
            })?;

        ensure!(
            resp.status() == StatusCode::OK,
            HTTPStatusNotOK {
                method: Method::GET,
                url: &url,
                status_code: resp.status()
            }
        );

        let body = resp.bytes().await.with_context(|_| RequestFailed {
            method: Method::GET,
            url: &url,
        })?;

        let result: Response<R> =
            serde_json::from_slice(&body).with_context(|_| ParseBodyFailed { body })?;

        ensure!(
            result.code == 0,
            CodeNotZero {
                code: result.code,
                message: result.message
            }
        );

        Ok(result.data)
    }

    /// Call /gateway/index, get gateway url
    pub async fn gateway_url(&self) -> Result<String> {
        let compress = if self.compress { "1" } else { "0" };
        let data: GatewayIndexData = self.get("/gateway/index", &[("compress", compress)]).await?;
        Ok(data.url)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Error;

    #[test]
    fn test_invalid_token() {
        let err = Client::new_from_bot_token("bad\ntoken").unwrap_err();

        assert!(matches!(err, Error::TokenInvalid));
    }

    #[test]
    fn test_base_url() {
        let client = Client::new_from_oauth2_token("token")
            .unwrap()
            .with_base_url("http://127.0.0.1:8080/api/v3/");

        assert_eq!(client.base_url(), "http://127.0.0.1:8080/api/v3");
    }
}
