// src/utils/log.rs

//! Console presentation helpers on top of the `log` facade.
//!
//! Banners, numbered steps and end-of-run summaries all go through
//! `log::info!` so they honor the level configured by the binary.

const RULE_WIDTH: usize = 50;

/// Log a header framed by double rules.
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {step_num}/{total}] {message}");
}

/// Log a sub-item (indented).
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    for line in summary_lines(title, items) {
        log::info!("{line}");
    }
}

fn summary_lines(title: &str, items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    std::iter::once(format!("[SUMMARY] {title}"))
        .chain(
            items
                .iter()
                .map(|(key, value)| format!("    {key:<width$} : {value}")),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines_align_keys() {
        let lines = summary_lines(
            "Scrape",
            &[("Events", "12".to_string()), ("Skipped", "1".to_string())],
        );
        assert_eq!(
            lines,
            vec![
                "[SUMMARY] Scrape".to_string(),
                "    Events  : 12".to_string(),
                "    Skipped : 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_summary_lines_without_items() {
        assert_eq!(summary_lines("Empty", &[]), vec!["[SUMMARY] Empty"]);
    }
}
