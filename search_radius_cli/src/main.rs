use std::fs::File;
use std::io::{self, Read, Write};
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use plotters::prelude::*;
use rayon::prelude::*;
use search_radius::{
    draw_radius, list_tables, CorrectionFactors, EstimateBreakdown, EstimateResult, Estimator,
    GlyphTextBackend, RadiusError, Subject,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Missing-person search radius estimator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the search radius for one subject and draw the radius map
    Estimate(EstimateArgs),
    /// Estimate every row of a CSV file (columns: age,gender,duration_h)
    Batch(BatchArgs),
    /// Print the speed and mobility tables
    Tables(TablesArgs),
}

#[derive(Args, Debug, Default)]
struct FactorArgs {
    /// JSON file with correction factors (weather, terrain, health, mental)
    #[arg(long, value_hint = ValueHint::FilePath)]
    factors: Option<PathBuf>,

    /// Weather multiplier on travel speeds
    #[arg(long)]
    weather: Option<f64>,

    /// Terrain multiplier on travel speeds
    #[arg(long)]
    terrain: Option<f64>,

    /// Health multiplier on travel speeds
    #[arg(long)]
    health: Option<f64>,

    /// Mental-state multiplier on the walking mobility ratio
    #[arg(long)]
    mental: Option<f64>,
}

#[derive(Parser, Debug)]
struct EstimateArgs {
    /// Age in whole years
    #[arg(long, allow_negative_numbers = true)]
    age: i64,

    /// Gender (M or F)
    #[arg(long)]
    gender: String,

    /// Hours since the subject was last seen
    #[arg(long, allow_negative_numbers = true)]
    duration: f64,

    #[command(flatten)]
    factors: FactorArgs,

    /// Print the result as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Output PNG radius map
    #[arg(long, default_value = "radius.png", value_hint = ValueHint::FilePath)]
    png: PathBuf,

    /// Output SVG radius map
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Map width in pixels
    #[arg(long, default_value_t = 400, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Map height in pixels
    #[arg(long, default_value_t = 400, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Disable map rendering
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Input CSV (`-` for stdin)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    #[command(flatten)]
    factors: FactorArgs,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct TablesArgs {
    /// Print the tables as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Estimate(args) if args.verbose => "debug",
        Command::Batch(args) if args.verbose => "debug",
        _ => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Estimate(args) => handle_estimate(args),
        Command::Batch(args) => handle_batch(args),
        Command::Tables(args) => handle_tables(args),
    }
}

fn build_estimator(args: &FactorArgs) -> Result<Estimator> {
    let mut factors = match args.factors.as_ref() {
        Some(path) => CorrectionFactors::load(path)
            .with_context(|| format!("failed to load factors from {}", path.display()))?,
        None => CorrectionFactors::default(),
    };
    if let Some(value) = args.weather {
        factors.weather = value;
    }
    if let Some(value) = args.terrain {
        factors.terrain = value;
    }
    if let Some(value) = args.health {
        factors.health = value;
    }
    if let Some(value) = args.mental {
        factors.mental = value;
    }
    if !factors.is_neutral() {
        info!(
            "Correction factors: weather {} terrain {} health {} mental {}",
            factors.weather, factors.terrain, factors.health, factors.mental
        );
    }
    Ok(Estimator::new(factors)?)
}

fn handle_estimate(args: EstimateArgs) -> Result<()> {
    let subject = Subject::new(args.age, &args.gender, args.duration)
        .context("please enter a valid age, gender and duration")?;
    let estimator = build_estimator(&args.factors)?;

    let breakdown = estimator.breakdown(subject.age, subject.gender, subject.duration_h);
    let result = breakdown.result();
    if args.verbose {
        log_breakdown(&breakdown);
    }

    if args.json {
        let text = serde_json::to_string_pretty(&EstimateReport::new(&subject, &breakdown))?;
        println!("{}", text);
    } else {
        print_result(&result);
    }

    if args.no_plot {
        return Ok(());
    }

    if let Err(err) = render_map_guard(result.radius, &args.png, MapKind::Png, args.width, args.height)
    {
        warn!("Skipping PNG render ({}): {}", args.png.display(), err);
    } else {
        info!("Wrote radius map: {}", args.png.display());
    }
    if let Some(path) = args.svg.as_ref() {
        if let Err(err) = render_map_guard(result.radius, path, MapKind::Svg, args.width, args.height)
        {
            warn!("Skipping SVG render ({}): {}", path.display(), err);
        } else {
            info!("Wrote radius map: {}", path.display());
        }
    }
    Ok(())
}

fn print_result(result: &EstimateResult) {
    println!("Walking distance: {} km", result.walk);
    println!("Transit distance: {} km", result.bus);
    println!("Search radius:    {} km", result.radius);
}

fn log_breakdown(b: &EstimateBreakdown) {
    info!(
        "Bracket {}: walk {:.2} km/h x ratio {:.2}, transit {:.2} km/h",
        b.bracket, b.walk_speed_kmh, b.mobility_ratio, b.transit_speed_kmh
    );
    match b.cap_km {
        Some(cap) if b.cap_applied() => info!(
            "Radius {:.3} km capped at {} km for this age",
            b.uncapped_radius_km, cap
        ),
        Some(cap) => info!("Age cap {} km not reached", cap),
        None => info!("No age cap"),
    }
}

#[derive(Serialize)]
struct EstimateReport<'a> {
    subject: &'a Subject,
    bracket: String,
    cap_km: Option<f64>,
    cap_applied: bool,
    #[serde(flatten)]
    result: EstimateResult,
}

impl<'a> EstimateReport<'a> {
    fn new(subject: &'a Subject, breakdown: &EstimateBreakdown) -> Self {
        Self {
            subject,
            bracket: breakdown.bracket.to_string(),
            cap_km: breakdown.cap_km,
            cap_applied: breakdown.cap_applied(),
            result: breakdown.result(),
        }
    }
}

enum MapKind {
    Png,
    Svg,
}

fn render_map_guard(
    radius: f64,
    path: &Path,
    kind: MapKind,
    width: u32,
    height: u32,
) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_map(radius, path, kind, width, height).map_err(|e| format!("plotting error: {:#}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_map(radius: f64, path: &Path, kind: MapKind, width: u32, height: u32) -> Result<()> {
    // backends create the output file on construction
    if width == 0 || height == 0 {
        return Err(RadiusError::RenderTargetUnavailable { width, height }.into());
    }
    match kind {
        MapKind::Png => {
            let backend = BitMapBackend::new(path, (width, height));
            let root = GlyphTextBackend::new(backend).into_drawing_area();
            draw_radius(&root, radius)?;
        }
        MapKind::Svg => {
            let backend = SVGBackend::new(path, (width, height));
            let root = GlyphTextBackend::fallback_only(backend).into_drawing_area();
            draw_radius(&root, radius)?;
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct BatchInput {
    age: String,
    gender: String,
    duration_h: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct BatchOutput {
    row: usize,
    age: String,
    gender: String,
    duration_h: String,
    bracket: Option<String>,
    walk_km: Option<f64>,
    bus_km: Option<f64>,
    radius_km: Option<f64>,
    error: Option<String>,
}

fn handle_batch(args: BatchArgs) -> Result<()> {
    let estimator = build_estimator(&args.factors)?;

    let rows = if args.input.as_os_str() == "-" {
        read_batch_rows(io::stdin().lock())?
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open {}", args.input.display()))?;
        read_batch_rows(file).with_context(|| format!("failed to parse {}", args.input.display()))?
    };
    debug!("Read {} batch rows", rows.len());

    let outputs = estimate_rows(&estimator, rows);
    let failed = outputs.iter().filter(|o| o.error.is_some()).count();
    if failed > 0 {
        warn!("{} of {} rows failed validation", failed, outputs.len());
    }

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        write_batch_rows(stdout.lock(), &outputs)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        write_batch_rows(file, &outputs)?;
        info!(
            "Wrote {} estimates: {}",
            outputs.len(),
            args.output.display()
        );
    }
    Ok(())
}

fn read_batch_rows<R: Read>(reader: R) -> Result<Vec<BatchInput>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: BatchInput = record?;
        rows.push(row);
    }
    Ok(rows)
}

fn estimate_rows(estimator: &Estimator, rows: Vec<BatchInput>) -> Vec<BatchOutput> {
    rows.into_par_iter()
        .enumerate()
        .map(|(idx, input)| {
            let mut output = BatchOutput {
                row: idx + 1,
                age: input.age.clone(),
                gender: input.gender.clone(),
                duration_h: input.duration_h.clone(),
                bracket: None,
                walk_km: None,
                bus_km: None,
                radius_km: None,
                error: None,
            };
            match Subject::parse(&input.age, &input.gender, &input.duration_h) {
                Ok(subject) => {
                    let b = estimator.breakdown(subject.age, subject.gender, subject.duration_h);
                    let result = b.result();
                    output.bracket = Some(b.bracket.to_string());
                    output.walk_km = Some(result.walk);
                    output.bus_km = Some(result.bus);
                    output.radius_km = Some(result.radius);
                }
                Err(err) => output.error = Some(err.to_string()),
            }
            output
        })
        .collect()
}

fn write_batch_rows<W: Write>(writer: W, outputs: &[BatchOutput]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for output in outputs {
        writer.serialize(output)?;
    }
    writer.flush()?;
    Ok(())
}

fn handle_tables(args: TablesArgs) -> Result<()> {
    let rows = list_tables();
    if rows.is_empty() {
        return Err(anyhow!("speed tables are empty"));
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!(
        "{:<7} {:<3} {:>13} {:>14} {:>8}",
        "bracket", "sex", "walk km/h", "transit km/h", "ratio"
    );
    for row in &rows {
        println!(
            "{:<7} {:<3} {:>6.1}-{:<6.1} {:>6.1}-{:<7.1} {:>8.2}",
            row.bracket.label(),
            row.gender.code(),
            row.walk.min_kmh,
            row.walk.max_kmh,
            row.transit.min_kmh,
            row.transit.max_kmh,
            row.mobility_ratio
        );
    }
    println!();
    println!("Radius caps: age < 6 or > 70 -> 6 km; age 6-12 -> 10 km");
    Ok(())
}
