//! TUI rendering traits for econcal types.
//!
//! Extension traits that add colored terminal rendering to econcal-core
//! types using owo_colors.

use econcal_core::Event;
use econcal_core::Impact;
use econcal_core::ingest::{Classification, ClassifiedRecord, IngestCounts, ValidationIssue};
use econcal_core::matcher::FieldDifference;
use econcal_core::timing::EventTiming;
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Impact {
    fn render(&self) -> String {
        let label = self.as_str();
        match self {
            Impact::High => label.red().to_string(),
            Impact::Moderate => label.yellow().to_string(),
            Impact::Low => label.green().to_string(),
            _ => label.dimmed().to_string(),
        }
    }
}

impl Render for EventTiming {
    fn render(&self) -> String {
        let label = format!("{:<4}", self.to_string());
        match self {
            EventTiming::Now => label.green().bold().to_string(),
            EventTiming::Next => label.cyan().to_string(),
            EventTiming::Past => label.dimmed().to_string(),
        }
    }
}

impl Render for ClassifiedRecord {
    fn render(&self) -> String {
        let time = self.event.datetime_utc.format("%Y-%m-%d %H:%M UTC").to_string();

        match &self.classification {
            Classification::New { lookup_failed } => {
                let mut line = format!("{} {} {}", "+".green(), self.event.to_string().green(), time.dimmed());
                if *lookup_failed {
                    line.push_str(&format!(" {}", "(lookup failed)".yellow()));
                }
                line
            }
            Classification::Matched {
                matched_event_id,
                matched_event_name,
                similarity_score,
            } => format!(
                "{} {} {} {}",
                "=".yellow(),
                self.event.to_string().yellow(),
                time.dimmed(),
                format!("≈ {matched_event_name} [{matched_event_id}] {similarity_score:.2}").dimmed()
            ),
        }
    }
}

impl Render for FieldDifference {
    fn render(&self) -> String {
        let matched = self.matched_value.as_deref().unwrap_or("(none)");
        let incoming = self.incoming_value.as_deref().unwrap_or("(none)");

        if self.is_different {
            format!("{}: {} → {}", self.field.dimmed(), matched.red(), incoming.green())
        } else {
            format!("{}: {}", self.field.dimmed(), matched.dimmed())
        }
    }
}

impl Render for ValidationIssue {
    fn render(&self) -> String {
        let name = self.name.as_deref().unwrap_or("(unnamed)");
        format!(
            "{} #{} {}: {}",
            "!".red(),
            self.index,
            name,
            self.errors.join("; ").red()
        )
    }
}

impl Render for IngestCounts {
    fn render(&self) -> String {
        let errors = if self.errors > 0 {
            format!("{} errors", self.errors).red().to_string()
        } else {
            format!("{} errors", self.errors)
        };
        format!(
            "{} created, {} merged, {} skipped, {}",
            self.created.green(),
            self.merged.yellow(),
            self.skipped,
            errors
        )
    }
}

/// One event line: marker, local time, currency, name, impact and metrics.
pub fn render_event_line(event: &Event, timing: EventTiming, time: &str) -> String {
    let currency = event.currency.as_deref().unwrap_or("---");
    let mut line = format!(
        "  {} {:>5} {} {} {}",
        timing.render(),
        time,
        currency.bold(),
        event.name,
        format!("[{}]", event.impact.render()).dimmed()
    );

    let metrics: Vec<String> = [
        ("A", &event.actual),
        ("F", &event.forecast),
        ("P", &event.previous),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
    .collect();

    if !metrics.is_empty() {
        line.push_str(&format!(" {}", metrics.join("  ").dimmed()));
    }
    line
}

/// Threshold for compact view (show counts instead of individual records)
pub const COMPACT_THRESHOLD: usize = 10;

/// Render classified records, collapsing to counts when there are many and
/// verbose is off.
pub fn render_classified(records: &[ClassifiedRecord], verbose: bool) -> Vec<String> {
    if verbose || records.len() <= COMPACT_THRESHOLD {
        return records.iter().map(|r| format!("   {}", r.render())).collect();
    }

    let new = records.iter().filter(|r| r.classification.is_new()).count();
    let matched = records.len() - new;
    let mut lines = Vec::new();
    if new > 0 {
        lines.push(format!("   {} {}", "+".green(), format!("({new} new {})", pluralize("event", new)).green()));
    }
    if matched > 0 {
        lines.push(format!(
            "   {} {}",
            "=".yellow(),
            format!("({matched} matched {})", pluralize("event", matched)).yellow()
        ));
    }
    lines
}

pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
