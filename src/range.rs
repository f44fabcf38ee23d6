use std::ops::RangeInclusive;

use crate::error::{Error, Result};

/// An inclusive, validated range of existing page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    first: u32,
    last: u32,
}

impl PageRange {
    /// Validates `first..=last` against a book of `count` pages.
    ///
    /// Page `count` is known not to exist, so `last` must be below it.
    pub fn new(first: u32, last: u32, count: u32) -> Result<Self> {
        if first > last || last >= count {
            return Err(Error::InvalidRange { first, last, count });
        }
        Ok(Self { first, last })
    }

    /// Fills in the defaults: the first page and the last existing page.
    pub fn with_defaults(first: Option<u32>, last: Option<u32>, count: u32) -> Result<Self> {
        let first = first.unwrap_or(0);
        let last = last.unwrap_or_else(|| count.saturating_sub(1));
        Self::new(first, last, count)
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn last(&self) -> u32 {
        self.last
    }

    pub fn page_count(&self) -> u32 {
        self.last - self.first + 1
    }

    pub fn indices(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ranges_inside_the_book() {
        let range = PageRange::new(2, 4, 5).unwrap();
        assert_eq!(range.page_count(), 3);
        assert_eq!(range.indices().collect::<Vec<_>>(), vec![2, 3, 4]);

        let single = PageRange::new(0, 0, 1).unwrap();
        assert_eq!(single.page_count(), 1);
    }

    #[test]
    fn rejects_reversed_range() {
        let err = PageRange::new(4, 2, 10).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { first: 4, last: 2, count: 10 }));
    }

    #[test]
    fn rejects_pages_past_the_end() {
        assert!(PageRange::new(0, 5, 5).is_err());
        assert!(PageRange::new(0, 6, 5).is_err());
        assert!(PageRange::new(0, 0, 0).is_err());
    }

    #[test]
    fn defaults_cover_the_whole_book() {
        let range = PageRange::with_defaults(None, None, 120).unwrap();
        assert_eq!((range.first(), range.last()), (0, 119));

        let tail = PageRange::with_defaults(Some(100), None, 120).unwrap();
        assert_eq!((tail.first(), tail.last()), (100, 119));

        assert!(PageRange::with_defaults(Some(130), None, 120).is_err());
        assert!(PageRange::with_defaults(None, None, 0).is_err());
    }
}
