// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use serde::Serialize;
use stasi_cli::{run_analyze, run_fit};
use stasi_core::{Constraints, Diagnostics, StasiError};
use stasi_engine::{CurveShape, NoiseScope, StasiConfig, StasiModel};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

struct Cli {
    command: Command,
}

enum Command {
    Fit(FitArgs),
    Inspect(FitArgs),
}

#[derive(Debug)]
struct FitArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    threshold: Option<f64>,
    noise_scope: NoiseScope,
    level: Option<usize>,
    max_segments: Option<usize>,
    time_budget_ms: Option<u64>,
    log_level: tracing::Level,
}

impl Default for FitArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            threshold: None,
            noise_scope: NoiseScope::Global,
            level: None,
            max_segments: None,
            time_budget_ms: None,
            log_level: tracing::Level::WARN,
        }
    }
}

impl FitArgs {
    fn config(&self) -> StasiConfig {
        let defaults = StasiConfig::default();
        StasiConfig {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            noise_scope: self.noise_scope,
            ..defaults
        }
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            max_segments: self.max_segments,
            time_budget_ms: self.time_budget_ms,
        }
    }
}

#[derive(Debug)]
enum CliError {
    Stasi(StasiError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Stasi(err) => err.code(),
            Self::InvalidInput(_) => "invalid_input",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stasi(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stasi(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<StasiError> for CliError {
    fn from(value: StasiError) -> Self {
        Self::Stasi(value)
    }
}

#[derive(Clone, Debug)]
struct LoadedSeries {
    path: PathBuf,
    values: Vec<f64>,
}

impl LoadedSeries {
    fn summary(&self) -> InputSummary {
        InputSummary {
            path: self.path.display().to_string(),
            n: self.values.len(),
        }
    }
}

#[derive(Serialize)]
struct InputSummary {
    path: String,
    n: usize,
}

#[derive(Serialize)]
struct InspectOutput {
    command: &'static str,
    input: InputSummary,
    config: StasiConfig,
    status: &'static str,
    model: Option<ModelSummary>,
}

#[derive(Serialize)]
struct ModelSummary {
    sigma: f64,
    breakpoints: Vec<usize>,
    selected_level: usize,
    curve_shape: CurveShape,
    mdl_curve: Vec<f64>,
    levels: Vec<LevelSummary>,
    diagnostics: Diagnostics,
}

#[derive(Serialize)]
struct LevelSummary {
    level: usize,
    num_states: usize,
    fit_cost: f64,
    complexity_cost: f64,
    mdl: f64,
}

impl ModelSummary {
    fn from_model(model: &StasiModel) -> Self {
        let levels = model
            .levels()
            .iter()
            .enumerate()
            .map(|(level, evaluation)| LevelSummary {
                level,
                num_states: evaluation.num_states(),
                fit_cost: evaluation.mdl.fit_cost,
                complexity_cost: evaluation.mdl.complexity_cost,
                mdl: evaluation.mdl.total(),
            })
            .collect();

        Self {
            sigma: model.sigma(),
            breakpoints: model.breakpoints().as_slice().to_vec(),
            selected_level: model.selected_level(),
            curve_shape: model.curve_shape(),
            mdl_curve: model.mdl_curve().to_vec(),
            levels,
            diagnostics: model.diagnostics().clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let Some(cli) = parse_cli(env::args().skip(1).collect())? else {
        return Ok(());
    };

    match cli.command {
        Command::Fit(args) => {
            init_logging(args.log_level);
            handle_fit(args)
        }
        Command::Inspect(args) => {
            init_logging(args.log_level);
            handle_inspect(args)
        }
    }
}

fn init_logging(level: tracing::Level) {
    // Stdout carries the JSON document, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_cli(args: Vec<String>) -> Result<Option<Cli>, CliError> {
    if args.is_empty() {
        print_root_help();
        return Ok(None);
    }

    if matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].clone();
    let rest = &args[1..];

    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name.as_str())?;
        return Ok(None);
    }

    let command = match command_name.as_str() {
        "fit" => Command::Fit(parse_fit_args(rest, "fit")?),
        "inspect" => Command::Inspect(parse_fit_args(rest, "inspect")?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: fit, inspect"
            )));
        }
    };

    Ok(Some(Cli { command }))
}

fn parse_fit_args(tokens: &[String], command: &str) -> Result<FitArgs, CliError> {
    let mut args = FitArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.input = PathBuf::from(raw);
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            "--threshold" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.threshold = Some(parse_f64_arg(raw.as_str(), flag)?);
            }
            "--noise-scope" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.noise_scope = parse_noise_scope(raw.as_str())?;
            }
            "--level" if command == "fit" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.level = Some(parse_usize_arg(raw.as_str(), flag)?);
            }
            "--max-segments" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.max_segments = Some(parse_usize_arg(raw.as_str(), flag)?);
            }
            "--time-budget-ms" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.time_budget_ms = Some(parse_u64_arg(raw.as_str(), flag)?);
            }
            "--log-level" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.log_level = parse_log_level(raw.as_str())?;
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown {command} option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input(format!(
            "{command} requires --input <path>"
        )));
    }

    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_u64_arg(raw: &str, flag: &str) -> Result<u64, CliError> {
    raw.parse::<u64>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64, CliError> {
    raw.parse::<f64>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects a number, got '{raw}'")))
}

fn parse_noise_scope(raw: &str) -> Result<NoiseScope, CliError> {
    match raw.to_ascii_lowercase().as_str() {
        "global" => Ok(NoiseScope::Global),
        "per_segment" | "per-segment" => Ok(NoiseScope::PerSegment),
        _ => Err(CliError::invalid_input(format!(
            "--noise-scope expects one of: global, per_segment; got '{raw}'"
        ))),
    }
}

fn parse_log_level(raw: &str) -> Result<tracing::Level, CliError> {
    raw.parse::<tracing::Level>().map_err(|_| {
        CliError::invalid_input(format!(
            "--log-level expects one of: error, warn, info, debug, trace; got '{raw}'"
        ))
    })
}

fn print_version() {
    println!("stasi {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "stasi {}\n\nUSAGE:\n  stasi <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  fit       Fit a series and print the selected level as JSON\n  inspect   Print every pooling level with its MDL terms\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nRun 'stasi <COMMAND> --help' for subcommand options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "fit" => {
            println!(
                "USAGE:\n  stasi fit --input <path.csv> [OPTIONS]\n\nOPTIONS:\n  --threshold <float>                  Default: 3.174\n  --noise-scope <global|per_segment>   Default: global\n  --level <usize>                      Materialize this pooling level instead of the MDL minimum\n  --max-segments <usize>\n  --time-budget-ms <u64>\n  --log-level <error|warn|info|debug|trace>   Default: warn\n  --input <path>                       Required one-column CSV\n  --output <path>                      Write JSON output to file"
            );
            Ok(())
        }
        "inspect" => {
            println!(
                "USAGE:\n  stasi inspect --input <path.csv> [OPTIONS]\n\nOPTIONS:\n  --threshold <float>                  Default: 3.174\n  --noise-scope <global|per_segment>   Default: global\n  --max-segments <usize>\n  --time-budget-ms <u64>\n  --log-level <error|warn|info|debug|trace>   Default: warn\n  --input <path>                       Required one-column CSV\n  --output <path>                      Write JSON output to file"
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: fit, inspect"
        ))),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), CliError> {
    let input = load_series(args.input.as_path())?;
    tracing::info!(path = %input.path.display(), n = input.values.len(), "loaded series");

    let outcome = run_fit(
        &input.values,
        args.config(),
        &args.constraints(),
        args.level,
    )?;
    write_json_output(&outcome, args.output.as_deref())
}

fn handle_inspect(args: FitArgs) -> Result<(), CliError> {
    let input = load_series(args.input.as_path())?;
    tracing::info!(path = %input.path.display(), n = input.values.len(), "loaded series");

    let config = args.config();
    let model = run_analyze(&input.values, config, &args.constraints())?;
    let output = InspectOutput {
        command: "inspect",
        input: input.summary(),
        config,
        status: if model.is_some() {
            "fitted"
        } else {
            "degenerate_noise"
        },
        model: model.as_ref().map(ModelSummary::from_model),
    };
    write_json_output(&output, args.output.as_deref())
}

fn load_series(path: &Path) -> Result<LoadedSeries, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))?;
    let values = parse_csv_series(raw.as_str())?;
    Ok(LoadedSeries {
        path: path.to_path_buf(),
        values,
    })
}

/// Parses a one-column CSV, skipping blank lines, `#` comments and a single
/// non-numeric header row.
fn parse_csv_series(raw: &str) -> Result<Vec<f64>, CliError> {
    let rows = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return Err(CliError::invalid_input("CSV input is empty"));
    }

    match parse_csv_rows(rows.as_slice()) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            if rows.len() > 1 && first_row_looks_like_header(rows[0], rows[1]) {
                if let Ok(without_header) = parse_csv_rows(&rows[1..]) {
                    return Ok(without_header);
                }
            }
            Err(err)
        }
    }
}

fn parse_csv_rows(rows: &[&str]) -> Result<Vec<f64>, CliError> {
    let mut values = Vec::<f64>::with_capacity(rows.len());

    for (row_idx, row) in rows.iter().enumerate() {
        let cells = row.split(',').map(str::trim).collect::<Vec<_>>();
        if cells.len() != 1 {
            return Err(CliError::invalid_input(format!(
                "CSV row {} has {} columns but expected 1",
                row_idx + 1,
                cells.len()
            )));
        }

        let cell = cells[0];
        let value = cell.parse::<f64>().map_err(|_| {
            CliError::invalid_input(format!(
                "CSV row {} is not a valid float: '{}'",
                row_idx + 1,
                cell
            ))
        })?;
        values.push(value);
    }

    Ok(values)
}

fn first_row_looks_like_header(first_row: &str, second_row: &str) -> bool {
    !first_row.contains(',')
        && first_row.parse::<f64>().is_err()
        && second_row.parse::<f64>().is_ok()
}

fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
