use crate::model::PromptSummary;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub prompts_tested: usize,
    pub avg_appearance_percent: f64,
    pub avg_sentiment: f64,
    pub last_audit: Option<DateTime<Utc>>,
}

pub fn dashboard_stats(rows: &[PromptSummary]) -> DashboardStats {
    let n = rows.len();
    let mean = |f: fn(&PromptSummary) -> f64| {
        if n == 0 {
            0.0
        } else {
            rows.iter().map(f).sum::<f64>() / n as f64
        }
    };
    DashboardStats {
        prompts_tested: n,
        avg_appearance_percent: mean(|r| r.appearance_percent),
        avg_sentiment: mean(|r| r.avg_sentiment),
        last_audit: rows.iter().map(|r| r.timestamp).max(),
    }
}

/// Rows whose prompt text contains `search`, ignoring case.
pub fn filter_rows<'a>(rows: &'a [PromptSummary], search: Option<&str>) -> Vec<&'a PromptSummary> {
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    rows.iter()
        .filter(|r| match &needle {
            Some(n) => r.prompt_text.to_lowercase().contains(n),
            None => true,
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

pub fn render_summary(client_name: &str, rows: &[&PromptSummary]) -> String {
    let owned: Vec<PromptSummary> = rows.iter().map(|r| (*r).clone()).collect();
    let stats = dashboard_stats(&owned);
    let mut out = String::new();

    let _ = writeln!(out, "\nAI visibility for {}", client_name);
    let _ = writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let _ = writeln!(out, "Prompts tested:      {}", stats.prompts_tested);
    let _ = writeln!(out, "Avg appearance:      {:.1}%", stats.avg_appearance_percent);
    let _ = writeln!(out, "Avg sentiment:       {:+.2}", stats.avg_sentiment);
    let last = stats
        .last_audit
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".into());
    let _ = writeln!(out, "Last audit:          {}", last);

    if rows.is_empty() {
        let _ = writeln!(out, "\nNo results yet. Run `geoscope run --client \"{}\"`.", client_name);
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>5}  {:<48} {:>7} {:>8} {:>9} {:>5}",
        "ID", "PROMPT", "SEEN", "POSITION", "SENTIMENT", "RUNS"
    );
    for r in rows {
        let icon = if r.appearances > 0 { "✅" } else { "❌" };
        let position = r
            .avg_position
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:>5}  {:<48} {} {:>4.0}% {:>8} {:>+9.2} {:>2}/{}",
            r.prompt_id,
            truncate(&r.prompt_text, 45),
            icon,
            r.appearance_percent,
            position,
            r.avg_sentiment,
            r.runs_completed,
            r.runs_requested
        );
    }
    out
}

pub fn print_summary(client_name: &str, rows: &[&PromptSummary]) {
    eprint!("{}", render_summary(client_name, rows));
}

pub fn render_responses(summary: &PromptSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n#{} {}", summary.prompt_id, summary.prompt_text);
    let parts = summary.raw_responses.split();
    if parts.is_empty() {
        let _ = writeln!(out, "    (no completed responses)");
    }
    for (i, text) in parts.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i + 1, text.trim());
    }
    out
}

pub fn print_responses(summary: &PromptSummary) {
    eprint!("{}", render_responses(summary));
}
