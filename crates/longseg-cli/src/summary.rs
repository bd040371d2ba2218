use console::Style;
use longseg_core::pipeline::{PipelineConfig, RunSummary, SubjectOutcome, SubjectStatus};
use longseg_core::spacing::NormalizeMode;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    path: Style,
    ok: Style,
    skip: Style,
    fail: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            path: Style::new().underlined(),
            ok: Style::new().green(),
            skip: Style::new().yellow(),
            fail: Style::new().red().bold(),
        }
    }
}

pub fn print_run_header(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Longseg Pipeline"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Derivatives"),
        s.path.apply_to(config.derivatives_dir().display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Workers"),
        s.value.apply_to(config.workers)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Spacing"),
        s.value.apply_to(match config.normalize {
            NormalizeMode::Off => "off",
            NormalizeMode::Baseline => "baseline-derived",
            NormalizeMode::Fixed => "fixed targets",
        })
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scratch"),
        s.value
            .apply_to(if config.remove_scratch { "removed" } else { "kept" })
    );
    println!();
}

pub fn print_outcomes(outcomes: &[SubjectOutcome]) {
    let s = Styles::new();
    let summary = RunSummary::tally(outcomes);

    println!();
    println!(
        "  {:<14}{} completed, {} skipped, {} failed (of {})",
        s.label.apply_to("Summary"),
        s.ok.apply_to(summary.completed),
        s.skip.apply_to(summary.skipped),
        s.fail.apply_to(summary.failed),
        summary.total()
    );

    for outcome in outcomes {
        match &outcome.status {
            SubjectStatus::Completed { .. } => {}
            SubjectStatus::Skipped(reason) => {
                println!(
                    "    {} sub-{}: {}",
                    s.skip.apply_to("skip"),
                    outcome.subject,
                    reason
                );
            }
            SubjectStatus::Failed(cause) => {
                println!(
                    "    {} sub-{}: {}",
                    s.fail.apply_to("FAIL"),
                    outcome.subject,
                    cause
                );
            }
        }
    }
    println!();
}
