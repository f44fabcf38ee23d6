//! The network capability every stage talks through.
//!
//! [`HttpTransport`] is the real implementation: two reqwest clients sharing
//! one cookie jar. Only one of them follows redirects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether a GET may follow redirects on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    Manual,
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    /// URL the response came from, after any followed redirects.
    pub url: String,
    /// Raw `Location` header, if any.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, redirects: Redirects) -> Result<Reply>;

    /// POSTs an already encoded form body. Redirects are never followed.
    async fn post_form(&self, url: &str, body: String) -> Result<Reply>;

    /// GETs `url` following redirects and reports only the status; the body
    /// is discarded unread.
    async fn status(&self, url: &str) -> Result<StatusCode>;
}

/// reqwest-backed transport with a shared cookie jar.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    follow: Client,
    manual: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let jar = Arc::new(Jar::default());

        let follow = base_builder(Arc::clone(&jar), timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        let manual = base_builder(jar, timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { follow, manual })
    }

    fn client(&self, redirects: Redirects) -> &Client {
        match redirects {
            Redirects::Follow => &self.follow,
            Redirects::Manual => &self.manual,
        }
    }
}

fn base_builder(jar: Arc<Jar>, timeout: Duration) -> ClientBuilder {
    Client::builder()
        .cookie_provider(jar)
        .connect_timeout(timeout)
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
}

fn http_error(url: &str) -> impl FnOnce(reqwest::Error) -> Error + '_ {
    move |source| Error::Http {
        url: url.to_string(),
        source,
    }
}

async fn read_reply(url: &str, response: reqwest::Response) -> Result<Reply> {
    let status = response.status();
    let final_url = response.url().to_string();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await.map_err(http_error(url))?.to_vec();

    debug!(%status, url = %final_url, bytes = body.len(), "received response");

    Ok(Reply {
        status,
        url: final_url,
        location,
        body,
    })
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str, redirects: Redirects) -> Result<Reply> {
        let response = self
            .client(redirects)
            .get(url)
            .send()
            .await
            .map_err(http_error(url))?;
        read_reply(url, response).await
    }

    #[instrument(level = "debug", skip(self, body))]
    async fn post_form(&self, url: &str, body: String) -> Result<Reply> {
        let response = self
            .manual
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(http_error(url))?;
        read_reply(url, response).await
    }

    async fn status(&self, url: &str) -> Result<StatusCode> {
        let response = self.follow.get(url).send().await.map_err(http_error(url))?;
        Ok(response.status())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &str, redirects: Redirects) -> Result<Reply> {
        (**self).get(url, redirects).await
    }

    async fn post_form(&self, url: &str, body: String) -> Result<Reply> {
        (**self).post_form(url, body).await
    }

    async fn status(&self, url: &str) -> Result<StatusCode> {
        (**self).status(url).await
    }
}
