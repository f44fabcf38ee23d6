//! Where things live on the content endpoint.
//!
//! Page addresses are derived from the book id, the page index and the
//! resolution tier alone, so the same inputs always give the same URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "https://bridge.klett.de";

const LOGIN_ENTRY_PATH: &str = "oauth2/authorization/keycloak-ekv";

/// Image quality variant of a page, named after the server's scale factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    Low,
    Medium,
    #[default]
    High,
}

impl Tier {
    /// Cheapest variant, used for existence probes.
    pub const PROBE: Tier = Tier::Low;

    pub fn scale(self) -> u8 {
        match self {
            Tier::Low => 1,
            Tier::Medium => 2,
            Tier::High => 4,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(scale: u8) -> std::result::Result<Self, Self::Error> {
        match scale {
            1 => Ok(Tier::Low),
            2 => Ok(Tier::Medium),
            4 => Ok(Tier::High),
            other => Err(format!("resolution must be 1, 2 or 4 (got {other})")),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.scale()
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let scale = s
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("resolution must be 1, 2 or 4 (got {s:?})"))?;
        Tier::try_from(scale)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scale{}", self.scale())
    }
}

/// Identifier of one book on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId(String);

impl CollectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CollectionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim();
        if id.is_empty() {
            return Err(Error::Config("book id must not be empty".to_string()));
        }
        if id.contains(['/', '?', '#']) || id.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "book id {id:?} must not contain '/', '?', '#' or whitespace"
            )));
        }
        Ok(Self(id.to_string()))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base URL of the content endpoint and identity provider entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    pub fn new(host: &str) -> Result<Self> {
        let url = Url::parse(host)
            .map_err(|e| Error::Config(format!("invalid host {host:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "host {host:?} must be an http(s) URL"
            )));
        }

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn login_entry(&self) -> String {
        format!("{}/{}", self.base, LOGIN_ENTRY_PATH)
    }

    pub fn page(&self, collection: &CollectionId, index: u32, tier: Tier) -> String {
        format!(
            "{}/{}/content/pages/page_{}/{}.png",
            self.base, collection, index, tier
        )
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            base: DEFAULT_HOST.to_string(),
        }
    }
}
