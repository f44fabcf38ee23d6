//! Finding how many pages a book has without a listing endpoint.
//!
//! Pages are numbered `0..count` with no gaps, so existence is monotone in
//! the index. The search walks forward in coarse steps from the last index
//! known to exist, backs off to that index on the first miss, shrinks the
//! step and repeats until it has walked with a step of one.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::address::CollectionId;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

pub const DEFAULT_INITIAL_STEP: u32 = 100;
pub const DEFAULT_DIVISOR: u32 = 4;

/// Answers whether the resource at `index` exists.
#[async_trait]
pub trait ExistenceOracle: Send {
    async fn exists(&mut self, index: u32) -> Result<bool>;
}

/// Step sizes of the boundary search.
///
/// These only trade probe count against overshoot; any `initial_step > 0`
/// and `divisor > 1` yields the exact count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTuning {
    initial_step: u32,
    divisor: u32,
}

impl DiscoveryTuning {
    pub fn new(initial_step: u32, divisor: u32) -> Result<Self> {
        if initial_step == 0 {
            return Err(Error::InvalidTuning(
                "initial probe step must be at least 1".to_string(),
            ));
        }
        if divisor < 2 {
            return Err(Error::InvalidTuning(format!(
                "probe step divisor must be at least 2 (got {divisor})"
            )));
        }
        Ok(Self {
            initial_step,
            divisor,
        })
    }

    pub fn initial_step(&self) -> u32 {
        self.initial_step
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Step for the round after one walked with `step`, or `None` once the
    /// unit step has been walked.
    fn next_step(&self, step: u32) -> Option<u32> {
        if step <= 1 {
            None
        } else {
            Some((step / self.divisor).max(1))
        }
    }
}

impl Default for DiscoveryTuning {
    fn default() -> Self {
        Self {
            initial_step: DEFAULT_INITIAL_STEP,
            divisor: DEFAULT_DIVISOR,
        }
    }
}

/// Returns the smallest index that does not exist.
///
/// Index 0 is probed exactly once; if it is missing the result is 0 and no
/// other probe is made. Indices past `u32::MAX` count as missing.
pub async fn discover_boundary<O>(oracle: &mut O, tuning: DiscoveryTuning) -> Result<u32>
where
    O: ExistenceOracle + ?Sized,
{
    debug!(
        step = tuning.initial_step(),
        divisor = tuning.divisor(),
        "starting page count search"
    );
    if !oracle.exists(0).await? {
        return Ok(0);
    }

    let mut last = 0u32;
    let mut step = Some(tuning.initial_step);
    let mut round = 0u32;

    while let Some(delta) = step {
        while let Some(next) = last.checked_add(delta) {
            if !oracle.exists(next).await? {
                break;
            }
            last = next;
        }

        round += 1;
        debug!(round, step = delta, last_existing = last, "discovery round done");
        step = tuning.next_step(delta);
    }

    Ok(last.saturating_add(1))
}

/// Probes pages of one book through an authenticated session.
pub struct PageOracle<'a, T> {
    session: &'a Session<T>,
    collection: &'a CollectionId,
    probes: u32,
}

impl<'a, T: Transport> PageOracle<'a, T> {
    pub fn new(session: &'a Session<T>, collection: &'a CollectionId) -> Self {
        Self {
            session,
            collection,
            probes: 0,
        }
    }

    pub fn probes(&self) -> u32 {
        self.probes
    }
}

#[async_trait]
impl<T: Transport> ExistenceOracle for PageOracle<'_, T> {
    async fn exists(&mut self, index: u32) -> Result<bool> {
        self.probes += 1;
        self.session.page_exists(self.collection, index).await
    }
}

/// Counts the pages of `collection`.
///
/// Fails with [`Error::InvalidCollection`] when page 0 does not exist.
pub async fn discover_count<T: Transport>(
    session: &Session<T>,
    collection: &CollectionId,
    tuning: DiscoveryTuning,
) -> Result<u32> {
    info!("Getting number of pages...");

    let mut oracle = PageOracle::new(session, collection);
    let count = discover_boundary(&mut oracle, tuning).await?;

    if count == 0 {
        return Err(Error::InvalidCollection {
            collection: collection.to_string(),
        });
    }

    info!("Found {} pages ({} probes).", count, oracle.probes());
    Ok(count)
}
