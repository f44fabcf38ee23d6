//! Sequential, fail-fast download of a page range.

use tracing::{debug, info};

use crate::address::{CollectionId, Tier};
use crate::error::{Error, FetchCause, Result};
use crate::range::PageRange;
use crate::session::Session;
use crate::transport::Transport;

/// One downloaded page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedPage {
    pub index: u32,
    pub data: Vec<u8>,
}

/// Reported after each page has been retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub page: u32,
    pub done: u32,
    pub total: u32,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        f64::from(self.done) / f64::from(self.total)
    }
}

/// Fetches every page of `range` in ascending order.
///
/// Stops at the first page that cannot be retrieved; no later page is
/// requested and nothing retrieved so far is returned.
pub async fn retrieve<T, F>(
    session: &Session<T>,
    collection: &CollectionId,
    range: PageRange,
    tier: Tier,
    mut on_progress: F,
) -> Result<Vec<RetrievedPage>>
where
    T: Transport,
    F: FnMut(Progress),
{
    let total = range.page_count();
    let mut pages = Vec::with_capacity(total as usize);

    info!(
        "Downloading pages {}..={} at {}...",
        range.first(),
        range.last(),
        tier
    );

    for index in range.indices() {
        let reply = session
            .fetch_page(collection, index, tier)
            .await
            .map_err(|e| Error::Fetch {
                page: index,
                cause: FetchCause::Transport(Box::new(e)),
            })?;

        if !reply.status.is_success() {
            return Err(Error::Fetch {
                page: index,
                cause: FetchCause::Status(reply.status),
            });
        }

        debug!(page = index, bytes = reply.body.len(), "retrieved page");
        pages.push(RetrievedPage {
            index,
            data: reply.body,
        });

        on_progress(Progress {
            page: index,
            done: index - range.first() + 1,
            total,
        });
    }

    Ok(pages)
}
