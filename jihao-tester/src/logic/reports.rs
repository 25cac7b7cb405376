use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use jihao_game::ValidationIssue;

use super::{RunRecord, StrategyAggregate};

#[derive(Serialize)]
struct JsonReport<'a> {
    validation_issues: Vec<String>,
    aggregates: &'a [StrategyAggregate],
    runs: &'a [RunRecord],
}

fn format_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "-".to_string();
    }
    counts
        .iter()
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_shares(shares: &BTreeMap<String, f64>) -> String {
    if shares.is_empty() {
        return "-".to_string();
    }
    shares
        .iter()
        .map(|(key, share)| format!("{key}={:.0}%", share * 100.0))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn generate_console_report<W: Write + ?Sized>(
    writer: &mut W,
    issues: &[ValidationIssue],
    aggregates: &[StrategyAggregate],
    total_duration: Duration,
) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "📊 Simulation Summary".bright_cyan().bold())?;
    writeln!(writer, "{}", "=====================".cyan())?;

    if issues.is_empty() {
        writeln!(writer, "Content: {}", "valid".green())?;
    } else {
        writeln!(writer, "Content: {} issue(s)", issues.len().to_string().red())?;
        for issue in issues {
            writeln!(writer, "  • {}", issue.to_string().red())?;
        }
    }
    writeln!(writer, "Total time: {total_duration:?}")?;
    writeln!(writer)?;

    for aggregate in aggregates {
        let status = if aggregate.violations == 0 {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(writer, "{} {}", status, aggregate.strategy.label().bold())?;
        writeln!(writer, "   Runs: {}", aggregate.runs)?;
        writeln!(
            writer,
            "   Turns: {:.1} ± {:.1}",
            aggregate.mean_turns, aggregate.std_turns
        )?;
        writeln!(writer, "   Final score: {:.1}", aggregate.mean_score)?;
        writeln!(writer, "   Status: {}", format_counts(&aggregate.statuses))?;
        writeln!(writer, "   Endings: {}", format_counts(&aggregate.ending_types))?;
        writeln!(writer, "   Reasons: {}", format_counts(&aggregate.reasons))?;
        writeln!(writer, "   Distinct endings: {}", aggregate.distinct_endings)?;
        writeln!(
            writer,
            "   Scene picks: {} ({} relaxed)",
            aggregate.selection_picks, aggregate.relaxed_picks
        )?;
        if aggregate.violations > 0 {
            writeln!(
                writer,
                "   Violations: {}",
                aggregate.violations.to_string().red()
            )?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(
    writer: &mut W,
    issues: &[ValidationIssue],
    aggregates: &[StrategyAggregate],
    runs: &[RunRecord],
) -> Result<()> {
    let report = JsonReport {
        validation_issues: issues.iter().map(ToString::to_string).collect(),
        aggregates,
        runs,
    };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    writer: &mut W,
    issues: &[ValidationIssue],
    aggregates: &[StrategyAggregate],
) -> Result<()> {
    writeln!(writer, "# Jihao Simulation Results\n")?;

    writeln!(writer, "## Content\n")?;
    if issues.is_empty() {
        writeln!(writer, "No validation issues.\n")?;
    } else {
        for issue in issues {
            writeln!(writer, "- {issue}")?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "## Strategies\n")?;
    if aggregates.is_empty() {
        writeln!(writer, "_No runs executed._")?;
        return Ok(());
    }
    writeln!(
        writer,
        "| Strategy | Runs | Turns (mean ± sd) | Score | Endings | Reasons | Distinct | Violations |"
    )?;
    writeln!(writer, "|---|---|---|---|---|---|---|---|")?;
    for aggregate in aggregates {
        writeln!(
            writer,
            "| {} | {} | {:.1} ± {:.1} | {:.1} | {} | {} | {} | {} |",
            aggregate.strategy,
            aggregate.runs,
            aggregate.mean_turns,
            aggregate.std_turns,
            aggregate.mean_score,
            format_counts(&aggregate.ending_types),
            format_counts(&aggregate.reasons),
            aggregate.distinct_endings,
            aggregate.violations
        )?;
    }

    writeln!(writer, "\n## Scene Selection\n")?;
    writeln!(writer, "| Strategy | Picks | Relaxed | Category weight share |")?;
    writeln!(writer, "|---|---|---|---|")?;
    for aggregate in aggregates {
        writeln!(
            writer,
            "| {} | {} | {} | {} |",
            aggregate.strategy,
            aggregate.selection_picks,
            aggregate.relaxed_picks,
            format_shares(&aggregate.category_weight_share)
        )?;
    }
    Ok(())
}

pub fn generate_csv_report<W: Write + ?Sized>(writer: &mut W, runs: &[RunRecord]) -> Result<()> {
    writeln!(
        writer,
        "strategy,seed,turns,status,reason,ending,ending_type,rarity,academic_standing,digital_safety,wealth,billiards_skill,sanity,score,minigames,violations"
    )?;
    for run in runs {
        let stats = run.final_stats;
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{:.2},{},{}",
            run.strategy,
            run.seed,
            run.turns,
            run.status.label(),
            run.reason.map_or("", |reason| reason.as_str()),
            run.ending_id.as_deref().unwrap_or(""),
            run.ending_type.map_or("", |kind| kind.as_str()),
            run.ending_rarity.map_or("", |rarity| rarity.as_str()),
            stats.academic_standing,
            stats.digital_safety,
            stats.wealth,
            stats.billiards_skill,
            stats.sanity,
            run.final_score,
            run.minigames_played,
            run.violations.len()
        )?;
    }
    Ok(())
}
