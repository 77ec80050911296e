// src/services/listing.rs

//! Listing page parser.
//!
//! Turns one page of the event listing into event stubs using the CSS
//! selectors from the site configuration.

use scraper::{ElementRef, Selector};
use url::Url;

use crate::error::Result;
use crate::models::{EventStub, SiteConfig};
use crate::services::html::{element_text, parse_document, parse_selector};
use crate::utils::resolve_url;

/// Parser for listing pages.
pub struct ListingParser {
    row_sel: Selector,
    date_sel: Selector,
    link_sel: Selector,
}

impl ListingParser {
    /// Compile the listing selectors from the site configuration.
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            row_sel: parse_selector(&site.row_selector)?,
            date_sel: parse_selector(&site.listing_date_selector)?,
            link_sel: parse_selector(&site.listing_link_selector)?,
        })
    }

    /// Extract every event stub on a page.
    ///
    /// A page without event blocks yields an empty list; only a body that is
    /// not markup at all is an error.
    pub fn parse(&self, html: &str, page_url: &str) -> Result<Vec<EventStub>> {
        let document = parse_document(html, page_url)?;
        let base_url = Url::parse(page_url)?;

        let stubs = document
            .select(&self.row_sel)
            .filter_map(|row| self.parse_row(row, &base_url))
            .collect();
        Ok(stubs)
    }

    fn parse_row(&self, row: ElementRef<'_>, base_url: &Url) -> Option<EventStub> {
        let link = row.select(&self.link_sel).next()?;
        let href = link.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }

        let name = element_text(link);
        if name.is_empty() {
            return None;
        }

        let listing_date = row
            .select(&self.date_sel)
            .next()
            .map(element_text)
            .unwrap_or_default();

        Some(EventStub {
            name,
            detail_url: resolve_url(base_url, href),
            listing_date,
        })
    }
}
