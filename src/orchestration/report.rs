//! Console summary of a finished run

use crate::core::model::{RunReport, StepOutcome};

/// Print the per-target summary block
pub fn print_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(60));
    println!(
        "📊 Release Summary: {} {} ({})",
        report.package_name, report.version, report.mode
    );
    println!("{}", "=".repeat(60));

    for line in summary_lines(report) {
        println!("{}", line);
    }

    if let Some(halt) = &report.halted_at {
        match halt.step {
            Some(step) => println!("\n🛑 Halted at {} {}", halt.target, step),
            None => println!("\n🛑 Halted at {}", halt.target),
        }
    }
    if !report.not_started.is_empty() {
        let names: Vec<&str> = report.not_started.iter().map(|t| t.as_str()).collect();
        println!("⏭️  Not started: {}", names.join(", "));
    }

    let status = match report.exit_code() {
        0 => "✅ SUCCESS",
        3 => "❔ UNKNOWN",
        _ => "❌ FAILED",
    };
    println!("\n{}", "=".repeat(60));
    println!("Overall Status: {}", status);
    println!("{}\n", "=".repeat(60));
}

/// One line per recorded step or dispatch
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let steps = report.steps.iter().map(|r| {
        format!(
            "{} {:<13} {:<7} {} ({}ms)",
            r.outcome.symbol(),
            r.target.as_str(),
            r.step.as_str(),
            r.message,
            r.duration_ms
        )
    });

    let dispatches = report.dispatches.iter().map(|d| {
        let mut line = format!(
            "{} {:<13} {:<7} {}",
            d.outcome.symbol(),
            d.target.as_str(),
            "remote",
            d.message
        );
        if let Some(url) = &d.run_url {
            line.push_str(&format!("\n   {}", url));
        }
        if d.outcome == StepOutcome::Unknown {
            line.push_str("\n   status unknown; the run may still complete");
        }
        line
    });

    steps.chain(dispatches).collect()
}
