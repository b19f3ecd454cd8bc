//! Page-range codec for the `page` field of an entry.
//!
//! The canonical text form is `P.<start>` for a single page and
//! `P.<start>-<end>` for a range. The editor exposes two independent
//! pickers, so both bounds can be set in either order; the clamp rules in
//! [`PageRange::set_start`] and [`PageRange::set_end`] keep the range from
//! ever being reversed.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Lowest page offered by the pickers.
pub const FIRST_PAGE: u32 = 1;
/// Highest page offered by the pickers.
pub const LAST_PAGE: u32 = 200;

/// Pages a picker should offer.
pub fn selectable_pages() -> RangeInclusive<u32> {
    FIRST_PAGE..=LAST_PAGE
}

const PREFIX: &str = "P.";

/// A decoded page range. `None` means the bound is unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRange {
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl PageRange {
    pub fn new(start: Option<u32>, end: Option<u32>) -> Self {
        Self { start, end }
    }

    pub fn single(page: u32) -> Self {
        Self::new(Some(page), Some(page))
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Parse a page string. Unparseable text decodes to an empty range.
    pub fn decode(text: &str) -> Self {
        let rest = strip_prefix_ignore_case(text, PREFIX)
            .unwrap_or(text)
            .trim();

        if rest.contains('-') {
            let mut parts = rest.split('-');
            let start = parts.next().and_then(parse_page);
            let end = parts.next().and_then(parse_page);
            Self::new(start, end)
        } else {
            let page = parse_page(rest);
            Self::new(page, page)
        }
    }

    /// Render the canonical text form.
    pub fn encode(&self) -> String {
        match (self.start, self.end) {
            (None, None) => String::new(),
            (Some(start), Some(end)) if start == end => format!("{}{}", PREFIX, start),
            (start, end) => format!("{}{}-{}", PREFIX, render(start), render(end)),
        }
    }

    /// Move the start bound. An unset end follows the new start, and an end
    /// before the new start is pulled up to it.
    pub fn set_start(self, start: u32) -> Self {
        let end = match self.end {
            Some(end) if end >= start => end,
            _ => start,
        };
        Self::new(Some(start), Some(end))
    }

    /// Move the end bound. An unset start follows the new end, and a start
    /// after the new end is pulled down to it.
    pub fn set_end(self, end: u32) -> Self {
        let start = match self.start {
            Some(start) if start <= end => start,
            _ => end,
        };
        Self::new(Some(start), Some(end))
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PageRange {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::decode(s))
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Leading-integer parse: optional whitespace and `+`, then digits; any
/// trailing text is ignored. Zero counts as unset. A digit run too large
/// for `u32` also reads as unset; such pages are far outside
/// [`selectable_pages`].
fn parse_page(segment: &str) -> Option<u32> {
    let trimmed = segment.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits_len = unsigned
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(unsigned.len());

    unsigned[..digits_len]
        .parse::<u32>()
        .ok()
        .filter(|page| *page != 0)
}

fn render(bound: Option<u32>) -> String {
    bound.map(|page| page.to_string()).unwrap_or_default()
}
