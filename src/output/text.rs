//! Human-readable text output

use super::Report;
use crate::coordinator::RunPlan;
use crate::util::time::{format_bandwidth_mib, format_latency_ns};
use std::fmt::Write;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Render the report as a plain-text summary
///
/// Shows, for each target:
/// - Average read and write latency
/// - Read and write bandwidth
/// - Min and max per-worker write latency
///
/// followed by the combined figures and any caveats.
pub fn render(report: &Report) -> String {
    let mut out = String::new();

    // Writes into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                    TEST RESULTS")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;

    writeln!(out, "Host:         {}", report.host)?;
    writeln!(out, "Started:      {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "Elapsed Time: {:.3}s", report.elapsed_secs)?;
    writeln!(out, "Engine:       {} ({})", report.engine, report.clock)?;
    writeln!(out, "Block size:   {}", format_bytes(report.block_size))?;
    writeln!(
        out,
        "Target size:  {} ({} blocks per worker)",
        format_bytes(report.target_size),
        format_number(report.blocks_per_worker)
    )?;
    if report.workers == report.requested_workers {
        writeln!(out, "Workers:      {} per target", report.workers)?;
    } else {
        writeln!(
            out,
            "Workers:      {} per target (requested {})",
            report.workers, report.requested_workers
        )?;
    }
    writeln!(out, "Termination:  {}", report.termination)?;

    for target in &report.targets {
        writeln!(out)?;
        writeln!(out, "Device = {}", target.device)?;
        writeln!(
            out,
            "  Operations:        {} writes, {} reads",
            format_number(target.writes),
            format_number(target.reads)
        )?;
        writeln!(
            out,
            "  avg_read_latency:  {}",
            format_latency_ns(target.avg_read_latency_ns)
        )?;
        writeln!(
            out,
            "  Read BW:           {}",
            format_bandwidth_mib(target.read_bandwidth_mib_s)
        )?;
        writeln!(
            out,
            "  avg_write_latency: {}",
            format_latency_ns(target.avg_write_latency_ns)
        )?;
        writeln!(
            out,
            "  Write BW:          {}",
            format_bandwidth_mib(target.write_bandwidth_mib_s)
        )?;
        writeln!(
            out,
            "  Write latency:     min {} / max {}",
            format_latency_ns(target.min_write_latency_ns),
            format_latency_ns(target.max_write_latency_ns)
        )?;
    }

    if report.targets.len() > 1 {
        let combined = &report.combined;
        writeln!(out)?;
        writeln!(out, "Combined:")?;
        writeln!(
            out,
            "  Write BW:          {}",
            format_bandwidth_mib(combined.write_bandwidth_mib_s)
        )?;
        writeln!(
            out,
            "  Read BW:           {}",
            format_bandwidth_mib(combined.read_bandwidth_mib_s)
        )?;
        writeln!(
            out,
            "  Write latency:     min {} / max {} / avg {}",
            format_latency_ns(combined.min_write_latency_ns),
            format_latency_ns(combined.max_write_latency_ns),
            format_latency_ns(combined.avg_write_latency_ns)
        )?;
        writeln!(
            out,
            "  avg_read_latency:  {}",
            format_latency_ns(combined.avg_read_latency_ns)
        )?;
    }

    if !report.caveats.is_empty() {
        writeln!(out)?;
        writeln!(out, "Caveats:")?;
        for caveat in &report.caveats {
            writeln!(out, "  - {}", caveat)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    Ok(())
}

/// Render what a run would do, for `--dry-run`
pub fn render_plan(plan: &RunPlan) -> String {
    let mut out = String::new();
    let _ = write_plan(&mut out, plan);
    out
}

fn write_plan(out: &mut String, plan: &RunPlan) -> std::fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                    RUN PLAN")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(
        out,
        "Engine:       {} ({}, {}ns resolution)",
        plan.engine, plan.clock, plan.clock_resolution_ns
    )?;
    writeln!(out, "Block size:   {}", format_bytes(plan.block_size))?;
    writeln!(
        out,
        "Target size:  {} ({} blocks, {} per worker)",
        format_bytes(plan.target_size),
        format_number(plan.total_blocks),
        format_number(plan.blocks_per_worker)
    )?;
    writeln!(
        out,
        "Workers:      {} per target (requested {})",
        plan.workers, plan.requested_workers
    )?;
    writeln!(out, "Termination:  {}", plan.termination)?;

    writeln!(out)?;
    writeln!(out, "Targets:")?;
    for (path, kind) in &plan.targets {
        writeln!(out, "  {} ({})", path.display(), kind)?;
    }

    writeln!(out)?;
    writeln!(out, "Units: {}", plan.units.len())?;
    for unit in &plan.units {
        writeln!(
            out,
            "  [{}] target {} worker {} blocks {}",
            unit.slot, unit.target_index, unit.worker_index, unit.partition
        )?;
    }

    if !plan.caveats.is_empty() {
        writeln!(out)?;
        writeln!(out, "Caveats:")?;
        for caveat in &plan.caveats {
            writeln!(out, "  - {}", caveat)?;
        }
    }

    writeln!(out, "{}", RULE)?;
    Ok(())
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

/// Format bytes with appropriate units
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
