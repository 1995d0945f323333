use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use td_app::{
    AppError, AppResult, ExportFormat, MonotonicClock, Playback, RunOptions, RunProgressEvent,
    RunRequest, RunResponse, RunStage, query, run_service, scenario_service,
};

#[derive(Parser)]
#[command(name = "td-cli")]
#[command(about = "TankDrain CLI - gravity drain simulation for tanks", long_about = None)]
struct Cli {
    /// Print wall-clock timings of each run phase
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate scenario file syntax and values
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// List scenarios (built-in presets unless a file is given)
    Scenarios {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Calibrate and run one scenario
    Run {
        /// Scenario ID
        scenario_id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Wall-clock budget for the outlet search, in seconds
        #[arg(long)]
        budget_s: Option<f64>,
    },
    /// Run every scenario in parallel
    RunAll {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Export the height series of a scenario run
    Export {
        /// Scenario ID
        scenario_id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Output format: csv or json
        #[arg(long, default_value = "csv")]
        format: String,
        /// Output file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Play a scenario run back in the terminal
    Play {
        /// Scenario ID
        scenario_id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Simulated seconds per wall-clock second
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Frames per second
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.timing {
        td_core::timing::enable_timing();
    }

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Scenarios { file } => cmd_scenarios(file.as_deref()),
        Commands::Run {
            scenario_id,
            file,
            budget_s,
        } => cmd_run(&scenario_id, file.as_deref(), budget_s),
        Commands::RunAll { file } => cmd_run_all(file.as_deref()),
        Commands::Export {
            scenario_id,
            file,
            format,
            output,
        } => cmd_export(&scenario_id, file.as_deref(), &format, output.as_deref()),
        Commands::Play {
            scenario_id,
            file,
            speed,
            fps,
        } => cmd_play(&scenario_id, file.as_deref(), speed, fps),
    }
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenarios: {}", scenario_path.display());
    let file = scenario_service::load_scenarios(scenario_path)?;
    scenario_service::validate_scenarios(&file)?;
    println!("✓ {} scenario(s) valid", file.scenarios.len());
    Ok(())
}

fn cmd_scenarios(file: Option<&Path>) -> AppResult<()> {
    let scenarios = scenario_service::load_or_presets(file)?;
    let summaries = scenario_service::list_scenarios(&scenarios);

    if summaries.is_empty() {
        println!("No scenarios found");
    } else {
        println!("Scenarios in '{}':", scenarios.name);
        for s in summaries {
            println!(
                "  {} - {} ({}, h0={:.2} m, T={:.1} s, sizing={})",
                s.id, s.name, s.geometry, s.initial_height_m, s.span_s, s.strategy
            );
        }
    }
    Ok(())
}

fn execute(
    scenario_id: &str,
    file: Option<&Path>,
    options: RunOptions,
    show_progress: bool,
) -> AppResult<RunResponse> {
    let scenarios = scenario_service::load_or_presets(file)?;
    let scenario = scenario_service::get_scenario(&scenarios, scenario_id)?;
    let request = RunRequest { scenario, options };

    if !show_progress {
        return run_service::run_scenario(&request);
    }

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = run_service::run_scenario_with_progress(
        &request,
        Some(&mut |event| {
            let emit_now =
                last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();
    Ok(response)
}

fn cmd_run(scenario_id: &str, file: Option<&Path>, budget_s: Option<f64>) -> AppResult<()> {
    println!("Running scenario: {}", scenario_id);
    let calibration_budget = budget_s
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| AppError::InvalidInput(format!("Invalid budget: {}", e)))
        })
        .transpose()?;
    let options = RunOptions { calibration_budget };
    let response = execute(scenario_id, file, options, true)?;
    print_run_report(&response);
    if let Some(summary) = timing_summary(&response.timing, td_core::timing::is_enabled()) {
        print!("{}", summary);
    }
    Ok(())
}

fn cmd_run_all(file: Option<&Path>) -> AppResult<()> {
    let scenarios = scenario_service::load_or_presets(file)?;
    println!("Running {} scenario(s) in parallel", scenarios.scenarios.len());

    let results = run_service::run_batch(&scenarios.scenarios, &RunOptions::default());
    let mut failures = 0;
    for (id, result) in results {
        match result {
            Ok(response) => print_run_report(&response),
            Err(err) => {
                failures += 1;
                println!("✗ {}: {}", id, err);
            }
        }
    }
    batch_outcome(failures)
}

fn batch_outcome(failures: usize) -> AppResult<()> {
    if failures > 0 {
        return Err(AppError::Simulation(format!(
            "{} scenario(s) failed",
            failures
        )));
    }
    Ok(())
}

fn cmd_export(
    scenario_id: &str,
    file: Option<&Path>,
    format: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let format: ExportFormat = format.parse()?;
    let response = execute(scenario_id, file, RunOptions::default(), false)?;

    // Write to file or stdout
    if let Some(path) = output {
        let mut out = std::fs::File::create(path)?;
        query::export_series(&response, format, &mut out)?;
        println!(
            "✓ Exported {} samples to {}",
            response.trajectory.len(),
            path.display()
        );
    } else {
        let stdout = io::stdout();
        query::export_series(&response, format, &mut stdout.lock())?;
    }

    Ok(())
}

fn cmd_play(scenario_id: &str, file: Option<&Path>, speed: f64, fps: f64) -> AppResult<()> {
    let response = execute(scenario_id, file, RunOptions::default(), true)?;
    print_run_report(&response);
    println!();

    let playback = Playback::for_run(&response, MonotonicClock::new(speed)?).with_fps(fps)?;
    loop {
        let frame = playback.frame();
        let width = 40usize;
        let filled = ((frame.fill_percent / 100.0 * width as f64).round() as usize).min(width);
        print!(
            "\r[{}{}] h={:>6.3} m  V={:>8.3} m³  {:>5.1}%  t={:>6.2}/{:.2}s",
            "#".repeat(filled),
            "-".repeat(width - filled),
            frame.height_m,
            frame.volume_m3,
            frame.fill_percent,
            frame.elapsed_s.min(playback.span_s()),
            playback.span_s()
        );
        let _ = io::stdout().flush();
        if frame.finished {
            break;
        }
        std::thread::sleep(playback.tick());
    }
    println!();
    Ok(())
}

fn print_run_report(response: &RunResponse) {
    let summary = query::get_run_summary(response);
    let report = &response.report;
    let mark = if summary.accepted { "✓" } else { "!" };

    println!(
        "{} {} ({} tank, sizing={})",
        mark,
        response.scenario_id,
        response.geometry.label(),
        report.strategy.label()
    );
    println!("  Outlet area:  {:.6} m²", summary.outlet_area_m2);
    println!("  Final height: {:.4} m", summary.final_height_m);
    match summary.drain_time_s {
        Some(t) => println!("  Drain time:   {:.2} s", t),
        None => println!("  Drain time:   not drained within {:.1} s", summary.span_s),
    }
    println!("  Iterations:   {}", report.iterations);
    if report.escalated {
        println!("  Correction escalated");
    }
    println!("  Samples:      {}", summary.sample_count);
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} {}  elapsed={:.2}s",
        spinner[spin_idx],
        event.stage.label(),
        event.elapsed_wall_s
    );
    if let (RunStage::Calibrating, Some(c)) = (event.stage, &event.calibration) {
        line.push_str(&format!(
            "  iter={}  a={:.5} m²  h_end={:.3} m",
            c.iteration, c.outlet_area_m2, c.final_height_m
        ));
    } else if let Some(msg) = &event.message {
        line.push_str(&format!("  {}", msg));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}

/// Timing block for `run`, or `None` unless timing output is enabled.
fn timing_summary(timing: &td_app::RunTimingSummary, enabled: bool) -> Option<String> {
    if !enabled {
        return None;
    }
    let total = timing.total_time_s.max(1.0e-12);
    let calibrate_pct = 100.0 * timing.calibrate_time_s / total;
    let integrate_pct = 100.0 * timing.integrate_time_s / total;

    let mut out = String::from("\nTiming summary:\n");
    out.push_str(&format!(
        "  Calibrate: {:.3}s ({:.1}%)\n",
        timing.calibrate_time_s, calibrate_pct
    ));
    out.push_str(&format!(
        "  Integrate: {:.3}s ({:.1}%)\n",
        timing.integrate_time_s, integrate_pct
    ));
    out.push_str(&format!("  Total:     {:.3}s\n", timing.total_time_s));
    out.push_str(&format!(
        "  Calibration: {} run(s), {} rhs calls\n",
        timing.calibration_iterations, timing.calibration_rhs_calls
    ));
    out.push_str(&format!(
        "  Production:  {} accepted / {} rejected steps, {} rhs calls\n",
        timing.accepted_steps, timing.rejected_steps, timing.rhs_calls
    ));
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_with_failures_is_an_error() {
        assert!(batch_outcome(0).is_ok());
        let err = batch_outcome(2).unwrap_err();
        assert!(matches!(err, AppError::Simulation(_)));
        assert!(err.to_string().contains("2 scenario(s) failed"));
    }

    #[test]
    fn timing_summary_only_when_enabled() {
        let timing = td_app::RunTimingSummary {
            calibrate_time_s: 0.3,
            integrate_time_s: 0.1,
            total_time_s: 0.5,
            ..Default::default()
        };
        assert!(timing_summary(&timing, false).is_none());
        let text = timing_summary(&timing, true).unwrap();
        assert!(text.contains("Timing summary"));
        assert!(text.contains("Calibrate: 0.300s (60.0%)"));
    }

    #[test]
    fn cli_parses_global_timing_flag() {
        let cli = Cli::try_parse_from(["td-cli", "run", "cone", "--timing"]).unwrap();
        assert!(cli.timing);
        assert!(matches!(cli.command, Commands::Run { .. }));
    }
}
