use tracing::debug;

use crate::address::{CollectionId, Endpoint, Tier};
use crate::error::Result;
use crate::transport::{HttpTransport, Redirects, Reply, Transport};

/// An authenticated connection to the content endpoint.
///
/// Only [`crate::auth::authenticate`] hands these out. The session owns its
/// transport (and with it the provider's cookies) until [`Session::close`].
#[derive(Debug)]
pub struct Session<T = HttpTransport> {
    transport: T,
    endpoint: Endpoint,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(transport: T, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// Probes the cheapest variant of a page.
    pub async fn page_exists(&self, collection: &CollectionId, index: u32) -> Result<bool> {
        let url = self.endpoint.page(collection, index, Tier::PROBE);
        let status = self.transport.status(&url).await?;
        debug!(page = index, %status, "probed page");
        Ok(status.is_success())
    }

    pub async fn fetch_page(
        &self,
        collection: &CollectionId,
        index: u32,
        tier: Tier,
    ) -> Result<Reply> {
        let url = self.endpoint.page(collection, index, tier);
        self.transport.get(&url, Redirects::Follow).await
    }

    /// Ends the session, dropping the transport and its cookies.
    pub fn close(self) {
        debug!(host = self.endpoint.base(), "closing session");
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}
