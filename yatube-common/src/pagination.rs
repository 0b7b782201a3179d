//! Fixed-size pagination over a counted collection.
//!
//! The database counts the matching rows first, then [`Paginator::page`] turns
//! the raw `page` query parameter into a [`PageRequest`] that says which slice
//! to fetch. Out-of-range numbers clamp to the nearest valid page.

use std::num::IntErrorKind;

/// Records shown per page on every paginated listing.
pub const PAGE_SIZE: u32 = 10;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    count: u64,
    per_page: u32,
}

/// A resolved page number together with the slice of records it covers.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageRequest {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
}

impl Paginator {
    #[must_use]
    pub fn new(count: u64, per_page: u32) -> Self {
        assert!(per_page > 0, "per_page must be positive");
        Self { count, per_page }
    }

    /// Number of pages; an empty collection still has one (empty) page.
    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.count.div_ceil(u64::from(self.per_page)).max(1)
    }

    /// Resolves a raw page parameter. Missing or non-numeric values select page 1.
    #[must_use]
    pub fn page(self, raw: Option<&str>) -> PageRequest {
        let requested = raw.map_or(1, |raw| parse_page_number(raw.trim()));
        self.page_number(requested)
    }

    #[must_use]
    pub fn page_number(self, requested: i64) -> PageRequest {
        let num_pages = self.num_pages();
        let number = u64::try_from(requested).unwrap_or(0).clamp(1, num_pages);

        PageRequest {
            number,
            num_pages,
            count: self.count,
            limit: self.per_page,
            offset: (number - 1) * u64::from(self.per_page),
        }
    }
}

/// Integers too large for `i64` saturate so they still clamp to the first or last page.
fn parse_page_number(raw: &str) -> i64 {
    match raw.parse::<i64>() {
        Ok(number) => number,
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => 1,
        },
    }
}

impl PageRequest {
    #[must_use]
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
        }
    }
}

impl<T> Page<T> {
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1).max(1)
    }

    #[must_use]
    pub fn next_page_number(&self) -> u64 {
        (self.number + 1).min(self.num_pages)
    }

    #[must_use]
    pub fn page_numbers(&self) -> std::ops::RangeInclusive<u64> {
        1..=self.num_pages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
