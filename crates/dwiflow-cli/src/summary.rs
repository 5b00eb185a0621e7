use console::Style;
use dwiflow_core::context::DiagnosticLevel;
use dwiflow_core::layout::SessionLayout;
use dwiflow_core::pipeline::config::PipelineConfig;
use dwiflow_core::pipeline::{RunOutcome, RunReport};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    failure: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            failure: Style::new().red().bold(),
        }
    }
}

pub fn print_pipeline_summary(config: &PipelineConfig) {
    let s = Styles::new();
    let layout = SessionLayout::new(&config.bids_root, &config.subject, &config.session);

    println!();
    println!("  {}", s.title.apply_to("DWI Pipeline"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(12)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Session"),
        s.path.apply_to(layout.session_dir().display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Results"),
        s.path.apply_to(layout.results_dir().display())
    );
    println!();

    println!("  {}", s.header.apply_to("Preprocessing"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Correction"),
        s.method.apply_to(config.distortion_correction)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Field"),
        s.value.apply_to(if config.partial_brain {
            "partial brain"
        } else {
            "whole brain"
        })
    );
    println!();

    if config.partial_brain {
        println!("  {}", s.header.apply_to("Tractography"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Streamlines"),
            s.value.apply_to(config.tractography.streamlines)
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Min length"),
            s.value.apply_to(format!("{} mm", config.tractography.min_length_mm))
        );
        println!();
    }

    if config.segmentation.enabled {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Segmentation"),
            s.method.apply_to("TractSeg")
        );
    } else {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Segmentation"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}

pub fn print_run_report(report: &RunReport) {
    let s = Styles::new();

    println!("  {}", s.header.apply_to("Stages"));
    for (i, stage) in report.stages.iter().enumerate() {
        println!("    {}. {}", s.label.apply_to(i + 1), s.value.apply_to(stage));
    }
    println!();

    let warnings: Vec<_> = report
        .diagnostics
        .with_level(DiagnosticLevel::Warning)
        .collect();
    if !warnings.is_empty() {
        println!("  {}", s.header.apply_to("Warnings"));
        for record in warnings {
            println!(
                "    {} {}",
                s.label.apply_to(format!("[{}]", record.stage)),
                s.disabled.apply_to(&record.message)
            );
        }
        println!();
    }

    match &report.outcome {
        RunOutcome::Completed(output) => {
            println!("  {}", s.header.apply_to("Results"));
            println!(
                "    {:<12}{}",
                s.label.apply_to("Shells"),
                s.value.apply_to(output.shell)
            );
            let rows = [
                ("DWI", Some(&output.preprocessed_dwi)),
                ("FOD", Some(&output.wm_fod)),
                ("Peaks", Some(&output.peaks)),
                ("Tracks", output.tractogram.as_ref()),
                ("Anatomical", output.anatomical.as_ref()),
                ("Auxiliary", output.auxiliary.as_ref()),
                ("TractSeg", output.segmentation_dir.as_ref()),
            ];
            for (label, path) in rows {
                if let Some(path) = path {
                    println!(
                        "    {:<12}{}",
                        s.label.apply_to(label),
                        s.path.apply_to(path.display())
                    );
                }
            }
        }
        RunOutcome::Failed { stage, error } => {
            println!(
                "  {} {}",
                s.failure.apply_to("Failed during"),
                s.value.apply_to(stage)
            );
            println!("    {}", error);
        }
    }
    println!();
}
