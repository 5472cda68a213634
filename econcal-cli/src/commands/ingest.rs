use std::path::PathBuf;

use anyhow::{Context, Result};
use econcal_core::PersistenceService;
use econcal_core::error::EconCalError;
use econcal_core::ingest::{Cancellation, ClassifiedRecord, Classification, Ingestor, Payload, Selection};
use econcal_core::matcher::{Matcher, compare_fields};
use econcal_core::remote::Backend;
use owo_colors::OwoColorize;
use tracing::warn;

use super::{backend, load_config};
use crate::render::{Render, pluralize, render_classified};
use crate::utils::tui::{create_progress_bar, create_spinner};

pub struct IngestArgs {
    pub file: PathBuf,
    pub source: Option<String>,
    pub batch_size: Option<usize>,
    pub new_only: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

pub async fn run(args: IngestArgs) -> Result<()> {
    let config = load_config()?;
    let backend = backend(&config)?;

    let payload = Payload::from_file(&args.file)
        .with_context(|| format!("Could not read {}", args.file.display()))?;

    if payload.is_empty() {
        println!("{}", "No events in payload".dimmed());
        return Ok(());
    }

    println!(
        "📥 {} ({} {})",
        args.file.display(),
        payload.records.len() + payload.issues.len(),
        pluralize("record", payload.records.len() + payload.issues.len())
    );

    if !payload.issues.is_empty() {
        println!("   {}", "Invalid records (skipped):".dimmed());
        for issue in &payload.issues {
            println!("   {}", issue.render());
        }
    }

    let mut ingestor = Ingestor::new(&backend)
        .with_matcher(Matcher::new(config.matcher_config()?))
        .with_max_batch_size(args.batch_size.unwrap_or(config.max_batch_size));
    if let Some(source) = &args.source {
        ingestor = ingestor.with_source(source);
    }

    let spinner = create_spinner("Matching".to_string());
    let classified = ingestor
        .classify(&payload.records, |done, total| {
            spinner.set_message(format!("Matching {done}/{total}"));
        })
        .await;
    spinner.finish_and_clear();

    for line in render_classified(&classified, args.verbose) {
        println!("{line}");
    }
    if args.verbose {
        print_field_differences(&backend, &classified).await;
    }

    if args.dry_run {
        println!("\n{}", "Dry run, nothing submitted".dimmed());
        return Ok(());
    }

    let selection = if args.new_only {
        Selection::NewOnly
    } else {
        Selection::All
    };
    let selected = selection.apply(&classified);
    if selected.is_empty() {
        println!("\n{}", "Nothing to submit".dimmed());
        return Ok(());
    }

    let cancel = Cancellation::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current batch");
            ctrl_c.cancel();
        }
    });

    let total_batches = selected.len().div_ceil(ingestor.max_batch_size());
    let bar = create_progress_bar("Submitting".to_string(), total_batches as u64);
    let result = ingestor
        .submit(selected, &cancel, |progress| {
            bar.set_position(progress.batches_completed as u64);
        })
        .await;
    bar.finish_and_clear();

    match result {
        Ok(report) => {
            println!("\nSubmitted {}", report.counts.render());
            if report.cancelled {
                println!(
                    "{}",
                    format!(
                        "Cancelled after {}/{} batches",
                        report.batches_completed, report.total_batches
                    )
                    .yellow()
                );
            }
            Ok(())
        }
        Err(EconCalError::Submission {
            counts,
            batches_completed,
            source,
        }) => {
            println!(
                "\nSubmitted {} before failing",
                counts.render()
            );
            anyhow::bail!(
                "Batch {} of {} failed: {}",
                batches_completed + 1,
                total_batches,
                source
            )
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch each matched event and show how the incoming record differs from it.
async fn print_field_differences(backend: &Backend, classified: &[ClassifiedRecord]) {
    for record in classified {
        let Classification::Matched {
            matched_event_id, ..
        } = &record.classification
        else {
            continue;
        };

        match backend.fetch_event(matched_event_id).await {
            Ok(Some(matched)) => {
                println!("   {}", record.event.to_string().bold());
                for diff in compare_fields(&record.event, &matched) {
                    println!("      {}", diff.render());
                }
            }
            Ok(None) => println!(
                "   {}",
                format!("{matched_event_id} no longer exists").dimmed()
            ),
            Err(e) => println!("   {}", e.to_string().red()),
        }
    }
}
