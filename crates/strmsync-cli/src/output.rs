use strmsync_sync::report::{CleanupSkip, DeletionReport, PairOutcome, PairReport, SyncMode, SyncReport};
use strmsync_sync::GateDecision;

/// Failures listed per pair in human output
const MAX_LISTED_FAILURES: usize = 10;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

// ============================================================================
// Sync reports
// ============================================================================

/// Prints a finished run in the selected format
pub fn print_report(format: OutputFormat, report: &SyncReport) {
    let formatter = get_formatter(matches!(format, OutputFormat::Json));

    if matches!(format, OutputFormat::Json) {
        match serde_json::to_value(report) {
            Ok(json) => formatter.print_json(&json),
            Err(e) => formatter.error(&format!("Failed to serialize report: {}", e)),
        }
        return;
    }

    let mode = match report.mode {
        SyncMode::Full => "Full sync",
        SyncMode::Incremental => "Incremental sync",
    };
    let totals = report.totals();
    if report.has_failures() {
        formatter.warn(&format!(
            "{} finished in {} with {} failure{}",
            mode,
            format_duration(report.duration_ms),
            totals.failed,
            plural(totals.failed)
        ));
    } else {
        formatter.success(&format!(
            "{} completed in {}",
            mode,
            format_duration(report.duration_ms)
        ));
    }

    for pair in &report.pairs {
        print_pair(formatter.as_ref(), pair);
    }
}

fn print_pair(formatter: &dyn OutputFormatter, pair: &PairReport) {
    formatter.info("");
    match &pair.outcome {
        PairOutcome::Completed => formatter.info(&pair.pair),
        PairOutcome::RootNotFound => {
            formatter.warn(&format!("{}: remote root not found, skipped", pair.pair));
            return;
        }
        PairOutcome::Rejected(reason) => {
            formatter.warn(&format!("{}: {}", pair.pair, reason));
            return;
        }
    }

    for (label, count) in [
        ("Created:  ", pair.created),
        ("Updated:  ", pair.updated),
        ("Unchanged:", pair.unchanged),
        ("Skipped:  ", pair.skipped),
        ("Failed:   ", pair.failed),
    ] {
        if count > 0 {
            formatter.info(&format!("  {} {}", label, count));
        }
    }
    if let Some(stats) = &pair.enumeration {
        formatter.info(&format!(
            "  Listed:    {} director{}, {} file{} in {} page{}",
            stats.directories,
            if stats.directories == 1 { "y" } else { "ies" },
            stats.files,
            plural(stats.files),
            stats.pages,
            plural(stats.pages)
        ));
    }

    match (&pair.cleanup_skipped, &pair.deletion) {
        (Some(CleanupSkip::Disabled), _) | (None, None) => {}
        (Some(CleanupSkip::GenerationFailures), _) => {
            formatter.info("  Cleanup:   skipped, placeholder generation failed")
        }
        (Some(CleanupSkip::EmptyLocalTree), _) => {
            formatter.info("  Cleanup:   skipped, no local placeholders")
        }
        (None, Some(deletion)) => print_deletion(formatter, deletion),
    }

    for failure in pair.failures.iter().take(MAX_LISTED_FAILURES) {
        formatter.info(&format!("    - {}: {}", failure.path, failure.reason));
    }
    if pair.failures.len() > MAX_LISTED_FAILURES {
        formatter.info(&format!(
            "    ... and {} more",
            pair.failures.len() - MAX_LISTED_FAILURES
        ));
    }
}

fn print_deletion(formatter: &dyn OutputFormatter, deletion: &DeletionReport) {
    formatter.info(&format!(
        "  Orphans:   {} of {} placeholder{}",
        deletion.candidates,
        deletion.corpus,
        plural(deletion.corpus)
    ));

    match &deletion.decision {
        None => {
            formatter.info("  Cleanup:   dry run, nothing removed");
            for path in &deletion.sample {
                formatter.info(&format!("    would remove {}", path));
            }
        }
        Some(GateDecision::Approved { .. }) => {
            formatter.info(&format!(
                "  Removed:   {} placeholder{}, {} related file{}, {} director{}",
                deletion.removed,
                plural(deletion.removed),
                deletion.related_removed,
                plural(deletion.related_removed),
                deletion.dirs_removed,
                if deletion.dirs_removed == 1 { "y" } else { "ies" }
            ));
        }
        Some(GateDecision::Deferred {
            ratio_percent,
            recorded,
        }) => {
            formatter.warn(&format!(
                "Deletion of {:.1}% deferred, {} consecutive observation{} so far",
                ratio_percent,
                recorded,
                if *recorded == 1 { "" } else { "s" }
            ));
        }
        Some(GateDecision::Rejected {
            ratio_percent,
            cv_percent,
        }) => {
            formatter.warn(&format!(
                "Deletion of {:.1}% rejected, candidate counts unstable (CV {:.1}%)",
                ratio_percent, cv_percent
            ));
        }
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
