use std::path::PathBuf;

use admittance::config::AppConfig;
use admittance::error::AppError;
use admittance::telemetry;
use admittance::workflows::admittance::{
    AdmissionSummary, MarkLog, MarkState, OpeningAdmittance,
};
use admittance::workflows::sheets::{
    export_marks, export_rosters, export_waiting_list, CsvDirectorySink, CsvDirectorySource,
    OpeningWorkbook,
};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "opening-admittance",
    about = "Deduplicate opening registrations and draw timeslot spots by lottery",
    version
)]
struct Cli {
    /// Directory holding the input sheets (overrides ADMITTANCE_INPUT_DIR)
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    /// Directory receiving the result sheets (overrides ADMITTANCE_OUTPUT_DIR)
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deduplicate and mark registrations without admitting anyone
    Preprocess(ReportArgs),
    /// Preprocess, then fill every timeslot by lottery
    Admit(AdmitArgs),
}

#[derive(Args, Debug, Default)]
struct ReportArgs {
    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Default)]
struct AdmitArgs {
    /// Seed for the lottery (overrides ADMITTANCE_SEED)
    #[arg(long)]
    seed: Option<u64>,
    #[command(flatten)]
    report: ReportArgs,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    if let Some(input) = cli.input {
        config.storage.input_dir = input;
    }
    if let Some(output) = cli.output {
        config.storage.output_dir = output;
    }

    match cli.command {
        Command::Preprocess(args) => run_preprocess(&config, args),
        Command::Admit(args) => run_admit(&config, args),
    }
}

fn load_opening(config: &AppConfig) -> Result<(OpeningAdmittance, OpeningWorkbook), AppError> {
    let source = CsvDirectorySource::new(&config.storage.input_dir);
    let mut workbook = OpeningWorkbook::load(&source, &config.sheets)?;
    let opening = OpeningAdmittance::new(
        workbook.timeslots.drain(..),
        std::mem::take(&mut workbook.references),
        config.admittance.marking_rules(),
    )?;
    Ok((opening, workbook))
}

fn run_preprocess(config: &AppConfig, args: ReportArgs) -> Result<(), AppError> {
    let (mut opening, workbook) = load_opening(config)?;
    let outcome = opening.preprocess(workbook.registrations);

    let mut sink = CsvDirectorySink::new(&config.storage.output_dir);
    export_marks(&mut sink, &outcome.marks)?;

    let summary = opening.summarize(&outcome.candidates, &outcome.marks, &[]);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_summary("Preprocessing", &summary, false);
        render_pending(&outcome.marks);
    }
    Ok(())
}

fn run_admit(config: &AppConfig, args: AdmitArgs) -> Result<(), AppError> {
    let (mut opening, workbook) = load_opening(config)?;

    let seed = args.seed.or(config.admittance.seed);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    info!(seeded = seed.is_some(), "starting admission");

    let outcome = opening.auto_admit(workbook.registrations, &mut rng);

    let mut sink = CsvDirectorySink::new(&config.storage.output_dir);
    export_rosters(&mut sink, opening.timeslots())?;
    export_waiting_list(&mut sink, &outcome.waiting_list)?;
    export_marks(&mut sink, &outcome.marks)?;

    let summary = opening.summarize(&outcome.candidates, &outcome.marks, &outcome.waiting_list);
    if args.report.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_summary("Admission", &summary, true);
        render_pending(&outcome.marks);
    }
    Ok(())
}

fn render_summary(title: &str, summary: &AdmissionSummary, admitted: bool) {
    println!("{title} summary");
    println!(
        "Candidates: {} ({} people marked, {} banned)",
        summary.candidates, summary.marked_people, summary.banned
    );
    println!(
        "Marks: {} done, {} unconfirmed, {} people need confirmation",
        summary.done_marks, summary.unconfirmed_marks, summary.need_confirmation
    );

    println!("\nTimeslots");
    for timeslot in &summary.timeslots {
        let capacity = timeslot
            .capacity
            .map(|capacity| capacity.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        if admitted {
            println!(
                "- {}: {}/{} admitted, {} excluded",
                timeslot.name, timeslot.admitted, capacity, timeslot.excluded
            );
        } else {
            println!(
                "- {}: capacity {}, {} excluded",
                timeslot.name, capacity, timeslot.excluded
            );
        }
    }

    if admitted {
        println!("\nWaiting list: {}", summary.waiting_list);
    }
}

fn render_pending(marks: &MarkLog) {
    let mut pending = marks.needing_confirmation().peekable();
    if pending.peek().is_none() {
        println!("\nNeeds confirmation: none");
        return;
    }

    println!("\nNeeds confirmation");
    for person in pending {
        println!("- {person}");
        for mark in marks
            .marks_for(person)
            .iter()
            .filter(|mark| mark.state == MarkState::NeedConfirmation)
        {
            println!("    {mark}");
        }
    }
}
