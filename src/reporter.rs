use chrono::{Local, LocalResult, TimeZone};

/// One line of the end-of-cycle summary table. Always one row per account,
/// regardless of outcome.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub label: String,
    pub score: Option<u64>,
    pub status: String,
    /// Next eligible run in epoch millis; 0 when unknown (failed cycles).
    pub next_run_ms: u64,
}

/// Render the per-account summary for a completed pass to stdout.
pub fn print_summary(rows: &[SummaryRow]) {
    println!();
    println!("{:<10} {:>8}  {:<22} {}", "ACCOUNT", "SCORE", "STATUS", "NEXT RUN");
    for row in rows {
        let score = row
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:>8}  {:<22} {}",
            row.label,
            score,
            row.status,
            format_next_run(row.next_run_ms)
        );
    }
    println!();
}

fn format_next_run(ms: u64) -> String {
    if ms == 0 {
        return "-".to_string();
    }
    match Local.timestamp_millis_opt(ms as i64) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => "-".to_string(),
    }
}
