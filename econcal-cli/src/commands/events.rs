use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use econcal_core::PersistenceService;
use econcal_core::constants::NOW_WINDOW;
use econcal_core::date_range::{DateRange, parse_date};
use econcal_core::store::{EventStore, QueryFilters};
use econcal_core::timing::EventTiming;
use econcal_core::{Event, Impact};
use owo_colors::OwoColorize;

use super::{backend, load_config, timezone};
use crate::render::render_event_line;
use crate::utils::tui::create_spinner;

pub async fn run(
    from: Option<&str>,
    to: Option<&str>,
    impacts: &[String],
    currencies: &[String],
) -> Result<()> {
    let config = load_config()?;
    let backend = backend(&config)?;
    let tz = timezone(&config)?;
    let today = Utc::now().with_timezone(&tz).date_naive();

    let from = from.map(resolve_date).transpose()?;
    let to = to.map(resolve_date).transpose()?;
    let range = DateRange::from_args(from.as_deref(), to.as_deref(), today)?;
    let filters = QueryFilters::new()
        .impacts(parse_impacts(impacts)?)
        .currencies(currencies);

    // Range days are local to `tz`; the store buckets by UTC day.
    let (first, last) = range.local_bounds(tz);
    let utc_days = range.utc_days(tz);

    let spinner = create_spinner(format!("{} → {}", range.start, range.end));
    let fetched = backend.list_events(first, last).await;
    spinner.finish_and_clear();
    let fetched = fetched.context("Could not fetch events")?;

    let mut store = EventStore::with_cache_ttl(config.cache_ttl()?);
    store.on_timezone_change(tz);
    store.init(fetched, backend.name());

    let events = within(store.query_events(utc_days.start, utc_days.end, &filters), first, last);
    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    print_by_day(&events, tz, today);
    Ok(())
}

/// Keep events scheduled inside `[first, last]`.
fn within<'a>(events: Vec<&'a Event>, first: DateTime<Utc>, last: DateTime<Utc>) -> Vec<&'a Event> {
    events
        .into_iter()
        .filter(|event| event.datetime_utc >= first && event.datetime_utc <= last)
        .collect()
}

/// Accept YYYY-MM-DD or natural language ("next friday").
fn resolve_date(input: &str) -> Result<String> {
    if let Ok(date) = parse_date(input) {
        return Ok(date.to_string());
    }

    let dt = fuzzydate::parse(input)
        .map_err(|_| anyhow::anyhow!("Could not parse date: \"{}\"", input))?;
    Ok(dt.date().format("%Y-%m-%d").to_string())
}

fn parse_impacts(labels: &[String]) -> Result<Vec<Impact>> {
    labels
        .iter()
        .map(|label| {
            let impact = Impact::parse(label);
            if impact == Impact::Unresolved && !label.eq_ignore_ascii_case("unresolved") {
                let known: Vec<_> = Impact::ALL.iter().map(|i| i.as_str()).collect();
                anyhow::bail!("Unknown impact '{}'. Known: {}", label, known.join(", "));
            }
            Ok(impact)
        })
        .collect()
}

/// Events arrive in UTC date order; regroup them by local day.
fn print_by_day(events: &[&Event], tz: Tz, today: NaiveDate) {
    let now = Utc::now();
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.datetime_utc.cmp(&b.datetime_utc).then_with(|| a.id.cmp(&b.id)));

    let mut current_date: Option<NaiveDate> = None;

    for event in sorted {
        let local = event.datetime_utc.with_timezone(&tz);
        let date = local.date_naive();

        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(date, today).bold());
            current_date = Some(date);
        }

        let timing = EventTiming::classify(event.datetime_utc, now, NOW_WINDOW);
        let time = local.format("%H:%M").to_string();
        println!("{}", render_event_line(event, timing, &time));
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_date_label() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
        assert_eq!(format_date_label(today, today), "Today");
        assert_eq!(format_date_label(today.succ_opt().unwrap(), today), "Tomorrow");
        assert_eq!(
            format_date_label(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(), today),
            "Wed Mar 4"
        );
    }

    #[test]
    fn test_local_range_excludes_neighbouring_local_days() {
        let tz = chrono_tz::America::New_York;
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        )
        .unwrap();
        let (first, last) = range.local_bounds(tz);

        let at = |day: u32, h: u32, m: u32| Utc.with_ymd_and_hms(2026, 1, day, h, m, 0).unwrap();
        // 23:30 on the 9th and 00:30 on the 11th in New York are outside;
        // 23:30 on the 10th (04:30Z on the 11th) is inside.
        let before = Event::new("1", "Late Release", at(10, 4, 30));
        let inside = Event::new("2", "Evening Release", at(11, 4, 30));
        let after = Event::new("3", "Early Release", at(11, 5, 30));

        let kept = within(vec![&before, &inside, &after], first, last);
        assert_eq!(kept.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["2"]);
    }

    #[test]
    fn test_parse_impacts() {
        let parsed = parse_impacts(&["high".to_string(), "Non-Economic".to_string()]).unwrap();
        assert_eq!(parsed, [Impact::High, Impact::NonEconomic]);
        assert!(parse_impacts(&["extreme".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_date_passes_iso_through() {
        assert_eq!(resolve_date("2026-01-09").unwrap(), "2026-01-09");
    }
}
