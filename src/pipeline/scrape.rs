// src/pipeline/scrape.rs

//! Scrape pipeline: listing pages, detail pages, grouping, reconciliation.

use crate::error::{AppError, Result};
use crate::models::{Config, EventRecord, EventStub, Occurrence, SiteConfig};
use crate::services::{DetailParser, Fetcher, ListingParser, RequestClass, Transport};
use crate::storage::EventStore;
use crate::utils::clean_text;
use crate::utils::dates::parse_date;
use crate::utils::log::{header, step, sub_item, summary};

use super::group::group;
use super::reconcile::reconcile;

/// How a scrape run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// All listing pages were read; some events may have been skipped
    Completed,
    /// A listing page failed or no page listed any event
    Aborted { reason: String },
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub pages_fetched: usize,
    pub stubs_found: usize,
    /// Detail pages turned into records
    pub events_extracted: usize,
    /// Events after grouping
    pub events_grouped: usize,
    /// Stubs that produced no record
    pub events_skipped: usize,
    pub parse_warnings: usize,
    /// Records whose selection came from the previous sheet
    pub selections_carried: usize,
}

/// Outcome of [`Scraper::run`].
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub status: RunStatus,
    /// Grouped records, not yet reconciled
    pub records: Vec<EventRecord>,
    pub stats: ScrapeStats,
}

/// Drives the fetcher and both parsers over the paginated listing.
pub struct Scraper<T> {
    fetcher: Fetcher<T>,
    listing: ListingParser,
    detail: DetailParser,
    site: SiteConfig,
}

impl<T: Transport> Scraper<T> {
    pub fn new(fetcher: Fetcher<T>, site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            listing: ListingParser::new(site)?,
            detail: DetailParser::new(site)?,
            site: site.clone(),
        })
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Scrape every listing page and its events.
    ///
    /// A failed detail page skips that event. A failed listing page, or a
    /// first page without events, aborts the run. Empty later pages are
    /// passed over and the remaining pages still read.
    pub async fn run(&mut self) -> ScrapeRun {
        let mut stats = ScrapeStats::default();
        let mut records = Vec::new();

        for page in 1..=self.site.total_pages {
            let stubs = match self.listing_page(page).await {
                Ok(stubs) => stubs,
                Err(e) => {
                    log::error!("Listing page {page} failed: {e}");
                    return aborted(e.to_string(), records, stats);
                }
            };
            stats.pages_fetched += 1;
            stats.stubs_found += stubs.len();

            if stubs.is_empty() {
                if page == 1 {
                    return aborted("first listing page lists no events".to_string(), records, stats);
                }
                log::info!("Listing page {page} lists no events");
                continue;
            }
            log::info!("Listing page {page}: {} events", stubs.len());

            for stub in &stubs {
                match self.event(stub, &mut stats).await {
                    Some(record) => {
                        stats.events_extracted += 1;
                        records.push(record);
                    }
                    None => stats.events_skipped += 1,
                }
            }
        }

        let records = group(records);
        stats.events_grouped = records.len();
        ScrapeRun {
            status: RunStatus::Completed,
            records,
            stats,
        }
    }

    async fn listing_page(&mut self, page: u32) -> Result<Vec<EventStub>> {
        let url = self.site.page_url(page)?;
        let body = self.fetcher.fetch(&url, RequestClass::Listing).await?;
        self.listing.parse(&body, &url)
    }

    /// Fetch and parse one event; `None` when it has to be skipped.
    async fn event(&mut self, stub: &EventStub, stats: &mut ScrapeStats) -> Option<EventRecord> {
        let body = match self.fetcher.fetch(&stub.detail_url, RequestClass::Detail).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Skipping '{}': {e}", stub.name);
                return None;
            }
        };

        let parsed = match self.detail.parse(&body, &stub.detail_url) {
            Ok(parsed) => parsed,
            Err(e) => {
                stats.parse_warnings += 1;
                log::warn!("Skipping '{}': {e}", stub.name);
                return None;
            }
        };

        stats.parse_warnings += parsed.warnings.len();
        for warning in &parsed.warnings {
            log::warn!("{warning}");
        }

        let mut record = parsed.record;
        if record.occurrences.is_empty() {
            if let Some(date) = parse_date(&stub.listing_date) {
                log::debug!("'{}': using listing date {}", record.name, stub.listing_date);
                record
                    .occurrences
                    .push(Occurrence::new(date, clean_text(&parsed.time_text)));
            }
        }
        if record.occurrences.is_empty() {
            log::warn!("Skipping '{}': no parseable date ({})", record.name, record.detail_url);
            return None;
        }
        log::debug!("{}", record.format("{name} | {dates} | {signup}"));
        Some(record)
    }
}

fn aborted(reason: String, records: Vec<EventRecord>, stats: ScrapeStats) -> ScrapeRun {
    ScrapeRun {
        status: RunStatus::Aborted { reason },
        records,
        stats,
    }
}

/// Run the scrape and replace the sheet.
///
/// Selections from the previous sheet are carried forward by detail URL. An
/// aborted run returns [`AppError::Aborted`] and leaves the sheet untouched.
pub async fn run_scrape<T: Transport>(
    config: &Config,
    fetcher: Fetcher<T>,
    store: &dyn EventStore,
) -> Result<ScrapeStats> {
    header("Familienpass Scrape");

    step(1, 3, "Load - Reading previous sheet");
    let prior = store.load().await?;
    sub_item(&format!("{} previous events", prior.len()));

    step(2, 3, "Scrape - Fetching listing and event pages");
    let mut scraper = Scraper::new(fetcher, &config.site)?;
    let run = scraper.run().await;
    let fetch_stats = scraper.fetcher().stats();
    sub_item(&format!(
        "{} requests, {} retries, {} failures",
        fetch_stats.requests, fetch_stats.retries, fetch_stats.failures
    ));

    let mut stats = run.stats;
    if let RunStatus::Aborted { reason } = run.status {
        log_summary("Scrape aborted, sheet left unchanged", &stats);
        return Err(AppError::Aborted(reason));
    }

    step(3, 3, "Save - Writing sheet");
    let records = reconcile(run.records, &prior);
    stats.selections_carried = records.iter().filter(|r| r.selected).count();
    store.save(&records).await?;

    log_summary("Scrape complete", &stats);
    Ok(stats)
}

fn log_summary(title: &str, stats: &ScrapeStats) {
    summary(
        title,
        &[
            ("Pages fetched", stats.pages_fetched.to_string()),
            ("Events listed", stats.stubs_found.to_string()),
            ("Events extracted", stats.events_extracted.to_string()),
            ("Events after grouping", stats.events_grouped.to_string()),
            ("Events skipped", stats.events_skipped.to_string()),
            ("Parse warnings", stats.parse_warnings.to_string()),
            ("Selections carried", stats.selections_carried.to_string()),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupKind;
    use crate::services::testing::{MockTransport, Reply};
    use crate::services::{DelayPolicy, RetryPolicy};
    use crate::storage::CsvSheet;
    use chrono::NaiveDate;

    const BASE: &str = "https://familienpass.test/events/";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.site.base_url = BASE.to_string();
        config.site.total_pages = 3;
        config
    }

    fn listing(rows: &[(&str, &str, &str)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(date, href, name)| {
                format!(r#"<tr><td>{date}</td><td><a href="{href}">{name}</a></td></tr>"#)
            })
            .collect();
        format!(
            r#"<html><body><table class="events-table"><tr><th>Datum</th><th>Veranstaltung</th></tr>{rows}</table></body></html>"#
        )
    }

    fn detail(name: &str, fields: &str) -> String {
        format!("<html><body><h2>{name}</h2>{fields}</body></html>")
    }

    fn fetcher(transport: MockTransport) -> Fetcher<MockTransport> {
        Fetcher::new(transport, RetryPolicy::immediate(1), DelayPolicy::none())
    }

    fn site() -> MockTransport {
        MockTransport::new()
            .page(
                BASE,
                &listing(&[
                    ("Sa, 02.03.2024", "/event/1", "Zirkus"),
                    ("Sa, 09.03.2024", "/event/1", "Zirkus"),
                    ("So, 03.03.2024", "/event/2", "Kino"),
                    ("Mo, 04.03.2024", "/event/3", "Kaputt"),
                    ("Di, 05.03.2024", "/event/4", "Namenlos"),
                ]),
            )
            .page(
                &format!("{BASE}?pno=2"),
                &listing(&[
                    ("06.04.2024", "/event/5", "Töpfern"),
                    ("", "/event/6", "Rätsel"),
                ]),
            )
            .page(
                &format!("{BASE}?pno=3"),
                "<html><body><p>Keine weiteren Veranstaltungen.</p></body></html>",
            )
            .page(
                "https://familienpass.test/event/1",
                &detail(
                    "Zirkus",
                    "<h3>Datum</h3><ul><li>02.03.2024</li><li>09.03.2024</li></ul>\
                     <h3>Uhrzeit</h3><p>10 Uhr</p>\
                     <h3>Anmeldebeginn</h3><p>Verlosungszeitraum: 01.02.2024 bis 15.02.2024</p>",
                ),
            )
            .page(
                "https://familienpass.test/event/2",
                &detail(
                    "Kino",
                    "<h3>Datum</h3><p>03.03.2024</p>\
                     <h3>Anmeldung</h3><p>Anmeldung direkt beim Veranstalter.</p>",
                ),
            )
            .reply(
                "https://familienpass.test/event/3",
                Reply::Status(503, String::new()),
            )
            .page(
                "https://familienpass.test/event/4",
                "<html><body><h3>Datum</h3><p>05.03.2024</p></body></html>",
            )
            .page(
                "https://familienpass.test/event/5",
                &detail("Töpfern", "<h3>Uhrzeit</h3><p>15 Uhr</p>"),
            )
            .page(
                "https://familienpass.test/event/6",
                &detail("Rätsel", "<h3>Treffpunkt</h3><p>Rathaus</p>"),
            )
    }

    #[tokio::test]
    async fn test_run_collects_groups_and_skips() {
        let mut scraper = Scraper::new(fetcher(site()), &config().site).unwrap();
        let run = scraper.run().await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(
            run.stats,
            ScrapeStats {
                pages_fetched: 3,
                stubs_found: 7,
                events_extracted: 4,
                events_grouped: 3,
                events_skipped: 3,
                parse_warnings: 1,
                selections_carried: 0,
            }
        );

        let names: Vec<_> = run.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Zirkus", "Kino", "Töpfern"]);

        let zirkus = &run.records[0];
        assert_eq!(
            zirkus.occurrences,
            vec![
                Occurrence::new(ymd(2024, 3, 2), "10 Uhr"),
                Occurrence::new(ymd(2024, 3, 9), "10 Uhr"),
            ]
        );
        assert_eq!(zirkus.signup.kind, SignupKind::WindowDates);
        assert_eq!(run.records[1].signup.kind, SignupKind::DirectWithOrganizer);
        assert_eq!(
            run.records[2].occurrences,
            vec![Occurrence::new(ymd(2024, 4, 6), "15 Uhr")]
        );
    }

    #[tokio::test]
    async fn test_run_scrape_carries_selection_and_writes_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = CsvSheet::new(dir.path().join("events.csv"));

        let mut kino = EventRecord::new("Kino", "https://familienpass.test/event/2");
        kino.selected = true;
        let mut gone = EventRecord::new("Alt", "https://familienpass.test/event/99");
        gone.selected = true;
        sheet.save(&[kino, gone]).await.unwrap();

        let stats = run_scrape(&config(), fetcher(site()), &sheet).await.unwrap();
        assert_eq!(stats.selections_carried, 1);

        let saved = sheet.load().await.unwrap();
        let selected: Vec<_> = saved
            .iter()
            .map(|r| (r.detail_url.as_str(), r.selected))
            .collect();
        assert_eq!(
            selected,
            vec![
                ("https://familienpass.test/event/1", false),
                ("https://familienpass.test/event/2", true),
                ("https://familienpass.test/event/5", false),
            ]
        );
        assert_eq!(saved[0].occurrences.len(), 2);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_and_keeps_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(&path, "Selected,Event Name\n").unwrap();
        let sheet = CsvSheet::new(&path);

        let transport = MockTransport::new()
            .page(BASE, &listing(&[("02.03.2024", "/event/2", "Kino")]))
            .page(
                "https://familienpass.test/event/2",
                &detail("Kino", "<h3>Datum</h3><p>03.03.2024</p>"),
            )
            .reply(&format!("{BASE}?pno=2"), Reply::Fail("connection reset".into()));

        let err = run_scrape(&config(), fetcher(transport), &sheet)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Aborted(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Selected,Event Name\n");
    }

    #[tokio::test]
    async fn test_empty_first_page_aborts() {
        let transport = MockTransport::new().page(BASE, "<html><body></body></html>");
        let mut scraper = Scraper::new(fetcher(transport), &config().site).unwrap();
        let run = scraper.run().await;
        assert!(matches!(run.status, RunStatus::Aborted { .. }));
        assert_eq!(run.stats.pages_fetched, 1);
        assert!(run.records.is_empty());
    }

    #[tokio::test]
    async fn test_empty_middle_page_does_not_stop_pagination() {
        let transport = MockTransport::new()
            .page(BASE, &listing(&[("02.03.2024", "/event/1", "A")]))
            .page(&format!("{BASE}?pno=2"), "<html><body></body></html>")
            .page(
                &format!("{BASE}?pno=3"),
                &listing(&[("04.03.2024", "/event/3", "C")]),
            )
            .page(
                "https://familienpass.test/event/1",
                &detail("A", "<h3>Datum</h3><p>02.03.2024</p>"),
            )
            .page(
                "https://familienpass.test/event/3",
                &detail("C", "<h3>Datum</h3><p>04.03.2024</p>"),
            );
        let mut scraper = Scraper::new(fetcher(transport), &config().site).unwrap();
        let run = scraper.run().await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.stats.pages_fetched, 3);
        let names: Vec<_> = run.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(scraper
            .fetcher()
            .transport()
            .hits()
            .contains(&format!("{BASE}?pno=3")));
    }
}
