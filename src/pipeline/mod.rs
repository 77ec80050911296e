//! Pipeline entry points for scraper operations.
//!
//! - `run_scrape`: Fetch all events and replace the sheet, keeping selections
//! - `run_calendar`: Export sign-up windows of selected events as `.ics`
//! - `run_reminders`: Create sign-up reminders for selected events

pub mod calendar;
pub mod group;
pub mod reconcile;
pub mod reminders;
pub mod scrape;

pub use calendar::{CalendarEntry, SkipReason, Skipped, build_calendar, run_calendar, to_ics};
pub use group::group;
pub use reconcile::reconcile;
pub use reminders::{
    AppleReminders, DryRun, Reminder, ReminderSink, TodoFile, build_notes, collect_reminders,
    run_reminders,
};
pub use scrape::{RunStatus, ScrapeRun, ScrapeStats, Scraper, run_scrape};
