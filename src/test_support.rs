use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::address::{CollectionId, Endpoint, Tier};
use crate::auth::Credentials;
use crate::error::Result;
use crate::session::Session;
use crate::transport::{Redirects, Reply, Transport};

pub const BOOK: &str = "KLB-0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub redirects: Redirects,
    pub body: Option<String>,
}

type Responder = Box<dyn Fn(&Recorded) -> Reply + Send + Sync>;

/// In-memory transport that answers from a closure and records every call.
pub struct FakeTransport {
    respond: Responder,
    log: Mutex<Vec<Recorded>>,
}

impl FakeTransport {
    pub fn new(respond: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            log: Mutex::new(Vec::new()),
        }
    }

    /// A book with pages `0..count`. Pages listed in `missing` still answer
    /// existence probes but 404 at every other tier. Each page body is
    /// unique to its index and tier.
    pub fn book(count: u32, missing: &[u32]) -> Self {
        Self::book_with(count, missing, |index, file| {
            format!("page {index} {file}").into_bytes()
        })
    }

    pub fn book_with(
        count: u32,
        missing: &[u32],
        body: impl Fn(u32, &str) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        let prefix = format!("{}/{}/content/pages/page_", Endpoint::default().base(), BOOK);
        let missing: HashSet<u32> = missing.iter().copied().collect();
        let probe_file = format!("{}.png", Tier::PROBE);

        Self::new(move |request| {
            let page = request
                .url
                .strip_prefix(&prefix)
                .and_then(|rest| rest.split_once('/'))
                .and_then(|(index, file)| Some((index.parse::<u32>().ok()?, file)));

            match page {
                Some((index, file))
                    if index < count && (file == probe_file || !missing.contains(&index)) =>
                {
                    reply(StatusCode::OK, body(index, file))
                }
                _ => reply(StatusCode::NOT_FOUND, Vec::new()),
            }
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn page_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url)
            .filter(|url| url.contains("/content/pages/"))
            .collect()
    }

    /// Answers without recording the request.
    pub fn respond_to(&self, request: &Recorded) -> Reply {
        (self.respond)(request)
    }

    fn record(&self, recorded: Recorded) -> Reply {
        let reply = self.respond_to(&recorded);
        self.log.lock().unwrap().push(recorded);
        reply
    }
}

impl fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTransport")
            .field("requests", &self.requests().len())
            .finish()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str, redirects: Redirects) -> Result<Reply> {
        Ok(self.record(Recorded {
            method: "GET",
            url: url.to_string(),
            redirects,
            body: None,
        }))
    }

    async fn post_form(&self, url: &str, body: String) -> Result<Reply> {
        Ok(self.record(Recorded {
            method: "POST",
            url: url.to_string(),
            redirects: Redirects::Manual,
            body: Some(body),
        }))
    }

    async fn status(&self, url: &str) -> Result<StatusCode> {
        Ok(self
            .record(Recorded {
                method: "GET",
                url: url.to_string(),
                redirects: Redirects::Follow,
                body: None,
            })
            .status)
    }
}

pub fn reply(status: StatusCode, body: Vec<u8>) -> Reply {
    Reply {
        status,
        url: String::new(),
        location: None,
        body,
    }
}

pub fn book_id() -> CollectionId {
    BOOK.parse().unwrap()
}

pub fn credentials() -> Credentials {
    Credentials::new("reader", "s3cret&pass")
}

pub fn session(transport: FakeTransport) -> Session<FakeTransport> {
    Session::new(transport, Endpoint::default())
}
