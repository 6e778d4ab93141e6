use colored::Colorize;

use robogen_core::{PipelineConfig, PipelineResult};

use crate::execute::ExecutionReport;

const RULE_WIDTH: usize = 80;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn print_run_header(
    request: &str,
    generator_model: &str,
    evaluator_model: &str,
    config: &PipelineConfig,
    optimize: bool,
) {
    eprintln!("{} {}", "Generating code for:".bold(), request);
    eprintln!("  Generator model:  {}", generator_model);
    eprintln!("  Evaluator model:  {}", evaluator_model);
    if optimize {
        eprintln!("  Max iterations:   {}", config.max_iterations);
    } else {
        eprintln!("  Optimization:     {}", "disabled".dimmed());
    }
    eprintln!("  Threshold:        {}", config.evaluation_threshold);
    eprintln!("{}", "Please wait, this may take a minute...".dimmed());
}

pub fn print_progress(status: &str) {
    eprintln!("  {} {}", "->".bright_cyan(), status);
}

/// Evaluation details on failure, then the run summary, which ends with the final code
fn render_result(result: &PipelineResult, threshold: f64) -> String {
    let mut out = format!("\n{}\n", rule());
    if let Some(evaluation) = &result.evaluation_result {
        if !result.success {
            out.push_str(&evaluation.summary());
            out.push_str("\n\n");
        }
    }
    out.push_str(&result.summary(threshold));
    out.push_str(&rule());
    out
}

pub fn print_result(result: &PipelineResult, threshold: f64) {
    println!("{}", render_result(result, threshold));

    let status = if result.success {
        format!("✓ Score {:.1} meets threshold {:.1}", result.final_score, threshold)
            .bright_green()
            .bold()
    } else if result.has_code() {
        format!(
            "→ Score {:.1} below threshold {:.1}, review before running",
            result.final_score, threshold
        )
        .bright_yellow()
        .bold()
    } else {
        "✗ No code was generated".bright_red().bold()
    };
    eprintln!("{}", status);
}

pub fn print_execution(report: &ExecutionReport) {
    if !report.stdout.is_empty() {
        println!();
        println!("Execution output:");
        println!("{}", report.stdout.trim_end());
    }
    if !report.stderr.is_empty() {
        eprintln!();
        eprintln!("Execution errors:");
        eprintln!("{}", report.stderr.trim_end());
    }

    eprintln!();
    if let Some(error) = &report.error {
        eprintln!("{}", format!("Execution failed: {}", error).bright_red());
    } else if report.success {
        eprintln!("{}", "Code executed successfully.".bright_green());
    } else if report.timed_out {
        eprintln!("{}", "Execution timed out.".bright_red());
    } else {
        match report.exit_code {
            Some(code) => eprintln!(
                "{}",
                format!("Execution failed with exit code {}.", code).bright_red()
            ),
            None => eprintln!("{}", "Execution was terminated by a signal.".bright_red()),
        }
    }
}
