//! Terminal output for the `analyze` subcommand
//!
//! Provides a spinner while a job runs and a styled summary of the counter
//! afterwards.

use crate::counter::Counter;
use crate::job::JobOutcome;
use console::style;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while records are being counted
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Share of `part` in `total` as a percentage
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn section(title: &str) {
    println!();
    println!("{}", style(title).cyan().bold());
    println!("{}", style("─".repeat(60)).dim());
}

/// Print a header at the start of an analysis
pub fn print_header(input: &str, instance: &str, destination: &str) {
    println!();
    println!(
        "{} {}",
        style("rdb-memaudit").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("  {} {}", style("Records:").bold(), input);
    println!("  {} {}", style("Instance:").bold(), instance);
    println!("  {} {}", style("Output:").bold(), destination);
    println!();
}

/// Print the outcome of a job followed by its report
pub fn print_summary(outcome: &JobOutcome, exported: bool, top: usize) {
    let counter = &outcome.counter;
    let totals = counter.type_report();

    println!();
    println!("{}", style("Analysis Complete").green().bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  {} {}", style("Keys:").bold(), format_number(totals.total_num));
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(totals.total_bytes, DECIMAL)
    );
    println!(
        "  {} {:.1}s",
        style("Duration:").bold(),
        outcome.duration.as_secs_f64()
    );
    if let Err(reason) = &outcome.source {
        println!("  {} {}", style("Input:").yellow().bold(), reason);
    }
    if exported {
        println!(
            "  {} {} datasets under '{}'",
            style("Exported:").bold(),
            outcome.export.writes,
            outcome.instance
        );
    }

    print_report(counter, top);
    println!();
}

/// Print the four views of a finalized counter, `top` rows each
pub fn print_report(counter: &Counter, top: usize) {
    let totals = counter.type_report();

    section("Largest Keys");
    for entry in counter.largest_records(top) {
        let record = &entry.record;
        println!(
            "  {:>4}. {:>10}  {:<8} {} {}",
            entry.rank,
            format_size(record.bytes, DECIMAL),
            record.value_type,
            record.key,
            style(format!("({} elements)", format_number(record.num_of_elem))).dim(),
        );
    }

    section("Largest Key Prefixes");
    for prefix in counter.largest_prefixes().into_iter().take(top) {
        println!(
            "  {:>10}  {:<8} {} {}",
            format_size(prefix.bytes, DECIMAL),
            prefix.pair.value_type,
            prefix.pair.key,
            style(format!("({} keys)", format_number(prefix.num))).dim(),
        );
    }

    section("Types");
    let mut types = totals.types;
    types.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.value_type.cmp(&b.value_type)));
    for t in types {
        println!(
            "  {:<8} {:>10} {:>6.1}%  {} keys",
            t.value_type,
            format_size(t.bytes, DECIMAL),
            percent(t.bytes, totals.total_bytes),
            format_number(t.num),
        );
    }

    section("Element Count Tiers");
    let mut tiers = counter.length_tier_report();
    tiers.sort_by(|a, b| {
        a.pair
            .value_type
            .cmp(&b.pair.value_type)
            .then_with(|| tier_value(&a.pair.key).cmp(&tier_value(&b.pair.key)))
    });
    for tier in tiers {
        println!(
            "  {:<8} > {:<10} {:>10}  {} keys",
            tier.pair.value_type,
            format_number(tier_value(&tier.pair.key)),
            format_size(tier.bytes, DECIMAL),
            format_number(tier.num),
        );
    }
}

fn tier_value(label: &str) -> u64 {
    label.parse().unwrap_or(0)
}
