//! Page boundaries derived from an access-filtered count.
//!
//! Pages are 1-based. A requested page of 0 is treated as page 1, an empty
//! result still has one (empty) page, and a page past the end is an empty
//! listing rather than an error.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of pages needed for `count` entries of `size` per page.
///
/// Zero entries still yield one page.
pub fn count_max_page(count: u64, size: u32) -> u64 {
    if size == 0 || count == 0 {
        return 1;
    }
    count.div_ceil(u64::from(size))
}

/// Offset of the first entry on `page`.
pub fn start_entry(page: u32, size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(size)
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Create a request; `size` must be positive and `page` 0 becomes 1.
    pub fn new(page: u32, size: u32) -> Result<Self, ValidationError> {
        if size == 0 {
            return Err(ValidationError::InvalidPageSize);
        }
        Ok(Self {
            page: page.max(1),
            size,
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row limit to pass to a listing.
    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }

    /// Row offset to pass to a listing.
    pub fn offset(&self) -> u64 {
        start_entry(self.page, self.size)
    }
}

/// One page of entries plus the counters a caller needs to render paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView<T> {
    pub entries: Vec<T>,
    pub count: u64,
    pub page: u32,
    pub max_page: u64,
    pub size: u32,
}

impl<T> PageView<T> {
    pub fn new(entries: Vec<T>, count: u64, request: PageRequest) -> Self {
        Self {
            entries,
            count,
            page: request.page(),
            max_page: count_max_page(count, request.size()),
            size: request.size(),
        }
    }

    /// Whether the requested page lies past the last page.
    pub fn is_past_end(&self) -> bool {
        u64::from(self.page) > self.max_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_max_page() {
        assert_eq!(count_max_page(25, 10), 3);
        assert_eq!(count_max_page(30, 10), 3);
        assert_eq!(count_max_page(31, 10), 4);
        assert_eq!(count_max_page(0, 10), 1);
        assert_eq!(count_max_page(1, 10), 1);
    }

    #[test]
    fn test_start_entry_normalizes_page_zero() {
        assert_eq!(start_entry(0, 10), 0);
        assert_eq!(start_entry(1, 10), 0);
        assert_eq!(start_entry(4, 10), 30);
    }

    #[test]
    fn test_request_rejects_zero_size() {
        assert!(matches!(
            PageRequest::new(1, 0),
            Err(ValidationError::InvalidPageSize)
        ));
        let req = PageRequest::new(0, 5).unwrap();
        assert_eq!(req.page(), 1);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_page_past_end() {
        let req = PageRequest::new(4, 10).unwrap();
        let view: PageView<u8> = PageView::new(Vec::new(), 25, req);
        assert_eq!(view.max_page, 3);
        assert!(view.is_past_end());
    }

    proptest! {
        #[test]
        fn last_page_holds_the_last_entry(count in 1u64..10_000, size in 1u32..200) {
            let max_page = count_max_page(count, size);
            let last_offset = start_entry(max_page as u32, size);
            prop_assert!(last_offset < count);
            prop_assert!(last_offset + u64::from(size) >= count);
        }
    }
}
