// crates/stencil-cli/src/main.rs
// ============================================================================
// Module: Stencil CLI Entry Point
// Description: Command dispatcher for template setup and config checks.
// Purpose: Run setup procedures through the sandbox gate from a shell.
// Dependencies: clap, serde, serde_json, stencil-config, stencil-core, stencil-sandbox
// ============================================================================

//! ## Overview
//! The Stencil CLI builds a [`SetupRequest`] from command-line flags and a
//! template metadata file, then runs the declarative setup plan through the
//! sandbox gate and prints the JSON report. Security posture: every input is
//! untrusted; files are read with size limits and requests are validated by
//! the gate before any capability exists.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use stencil_config::StencilConfig;
use stencil_core::AuthoringMode;
use stencil_core::CombinationViolation;
use stencil_core::DimensionDefinition;
use stencil_core::DimensionSet;
use stencil_core::InputValue;
use stencil_core::RawOptions;
use stencil_core::Selection;
use stencil_sandbox::PlanHost;
use stencil_sandbox::SetupGate;
use stencil_sandbox::SetupRequest;
use stencil_sandbox::SetupStatus;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a template metadata file.
const MAX_TEMPLATE_BYTES: usize = 1024 * 1024;
/// Maximum size of a setup plan file.
const MAX_PLAN_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "stencil", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Template setup utilities.
    Setup {
        /// Selected setup subcommand.
        #[command(subcommand)]
        command: SetupCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Setup subcommands.
#[derive(Subcommand, Debug)]
enum SetupCommand {
    /// Run the template's setup plan against a project directory.
    Run(SetupRunCommand),
    /// Validate template dimensions and print the default selection.
    Check(SetupCheckCommand),
}

/// Arguments for `setup run`.
#[derive(Args, Debug)]
struct SetupRunCommand {
    /// Project directory produced from the template.
    #[arg(long, value_name = "DIR")]
    project: PathBuf,
    /// Project name.
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Template authoring mode.
    #[arg(long, value_enum, default_value_t = ModeArg::Direct)]
    mode: ModeArg,
    /// Placeholder input as `KEY=VALUE` (repeatable).
    #[arg(long = "input", value_name = "KEY=VALUE")]
    inputs: Vec<String>,
    /// Option token such as `auth`, `database=postgres`, or `features=a+b` (repeatable).
    #[arg(long = "option", value_name = "TOKEN")]
    options: Vec<String>,
    /// Template metadata file declaring dimensions and constants.
    #[arg(long, value_name = "PATH")]
    template: Option<PathBuf>,
    /// Setup plan file; defaults to the plan shipped in the author assets.
    #[arg(long, value_name = "PATH")]
    plan: Option<PathBuf>,
    /// Config file path (defaults to `stencil.toml` or `STENCIL_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `setup check`.
#[derive(Args, Debug)]
struct SetupCheckCommand {
    /// Template metadata file declaring dimensions and constants.
    #[arg(long, value_name = "PATH")]
    template: PathBuf,
    /// Config file path (defaults to `stencil.toml` or `STENCIL_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to `stencil.toml` or `STENCIL_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Authoring mode flag values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    /// Template files are the project files.
    Direct,
    /// Template is assembled from author assets.
    Composable,
}

impl From<ModeArg> for AuthoringMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Direct => Self::Direct,
            ModeArg::Composable => Self::Composable,
        }
    }
}

// ============================================================================
// SECTION: Template Metadata
// ============================================================================

/// Template metadata file contents.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateMetadata {
    /// Declared dimensions keyed by name.
    #[serde(default)]
    dimensions: BTreeMap<String, DimensionDefinition>,
    /// Template constants.
    #[serde(default = "empty_object")]
    constants: Value,
}

impl Default for TemplateMetadata {
    fn default() -> Self {
        Self {
            dimensions: BTreeMap::new(),
            constants: empty_object(),
        }
    }
}

/// Returns an empty JSON object.
fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Output of `setup check`.
#[derive(Debug, Serialize)]
struct CheckOutput {
    /// Declared dimension names.
    dimensions: Vec<String>,
    /// Selections when no option tokens are given.
    defaults: BTreeMap<String, Selection>,
    /// `requires`/`conflicts` violations of the default selection.
    violations: Vec<CombinationViolation>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised by bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// I/O failure while reading.
    #[error("{0}")]
    Io(std::io::Error),
    /// File exceeds the read limit.
    #[error("file is {size} bytes (limit {limit})")]
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("stencil {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        return Err(CliError::new("no command given; see `stencil --help`".to_string()));
    };
    match command {
        Commands::Setup {
            command,
        } => command_setup(command),
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Setup Commands
// ============================================================================

/// Dispatches setup subcommands.
fn command_setup(command: SetupCommand) -> CliResult<ExitCode> {
    match command {
        SetupCommand::Run(command) => command_setup_run(command),
        SetupCommand::Check(command) => command_setup_check(&command),
    }
}

/// Executes `setup run`.
fn command_setup_run(command: SetupRunCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let settings = config.sandbox_settings();
    let metadata = match &command.template {
        Some(path) => load_template(path)?,
        None => TemplateMetadata::default(),
    };
    let dimensions = DimensionSet::new(metadata.dimensions)
        .map_err(|err| CliError::new(format!("invalid template dimensions: {err}")))?;
    let options = RawOptions::from_tokens(&command.options)
        .map_err(|err| CliError::new(format!("invalid option: {err}")))?;
    let normalized = dimensions
        .normalize(&options, &settings.default_dimension)
        .map_err(|err| CliError::new(format!("invalid option: {err}")))?;
    let violations = dimensions.check_combination(&normalized);
    if !violations.is_empty() {
        return Err(CliError::new(format!(
            "option combination rejected: {}",
            describe_violations(&violations)
        )));
    }
    let host = match &command.plan {
        Some(path) => PlanHost::from_document(load_json(path, MAX_PLAN_BYTES, "plan")?),
        None => PlanHost::from_assets(),
    };
    let project_dir = std::path::absolute(&command.project).map_err(|err| {
        CliError::new(format!("cannot resolve project directory: {err}"))
    })?;
    let cwd = std::env::current_dir()
        .map_err(|err| CliError::new(format!("cannot read working directory: {err}")))?;
    let request = SetupRequest {
        project_dir,
        project_name: command.name,
        cwd,
        authoring_mode: command.mode.into(),
        inputs: parse_inputs(&command.inputs)?,
        constants: metadata.constants,
        options,
        dimensions,
    };
    let audit =
        config.audit.build_sink().map_err(|err| CliError::new(format!("audit sink: {err}")))?;
    let gate = SetupGate::new(config.sandbox_limits(), settings, audit);
    let report = gate
        .run(request, &host)
        .map_err(|err| CliError::new(format!("setup rejected: {err}")))?;
    write_json(&report)?;
    if report.status == SetupStatus::Failed { Ok(ExitCode::FAILURE) } else { Ok(ExitCode::SUCCESS) }
}

/// Executes `setup check`.
fn command_setup_check(command: &SetupCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let metadata = load_template(&command.template)?;
    let dimensions = DimensionSet::new(metadata.dimensions)
        .map_err(|err| CliError::new(format!("invalid template dimensions: {err}")))?;
    let defaults = dimensions
        .normalize(&RawOptions::default(), &config.sandbox.default_dimension)
        .map_err(|err| CliError::new(format!("invalid template dimensions: {err}")))?;
    let output = CheckOutput {
        dimensions: dimensions.iter().map(|definition| definition.name.clone()).collect(),
        defaults: defaults.selections().clone(),
        violations: dimensions.check_combination(&defaults),
    };
    let clean = output.violations.is_empty();
    write_json(&output)?;
    if clean { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => {
            load_config(command.config.as_deref())?;
            write_stdout_line("config ok")
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<StencilConfig> {
    StencilConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Loads a template metadata file.
fn load_template(path: &Path) -> CliResult<TemplateMetadata> {
    let value = load_json(path, MAX_TEMPLATE_BYTES, "template")?;
    serde_json::from_value(value)
        .map_err(|err| CliError::new(format!("invalid template metadata: {err}")))
}

/// Reads a bounded JSON file.
fn load_json(path: &Path, max_bytes: usize, label: &str) -> CliResult<Value> {
    let bytes = read_bytes_with_limit(path, max_bytes)
        .map_err(|err| CliError::new(format!("cannot read {label} {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid {label} json: {err}")))
}

/// Parses repeated `KEY=VALUE` flags; duplicate keys are rejected.
fn parse_inputs(raw: &[String]) -> CliResult<BTreeMap<String, InputValue>> {
    let mut inputs = BTreeMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(CliError::new(format!("input '{entry}' must be KEY=VALUE")));
        };
        let key = key.trim();
        if inputs.insert(key.to_string(), InputValue::from(value)).is_some() {
            return Err(CliError::new(format!("input '{key}' given more than once")));
        }
    }
    Ok(inputs)
}

/// Renders combination violations as one line.
fn describe_violations(violations: &[CombinationViolation]) -> String {
    violations
        .iter()
        .map(|violation| match violation {
            CombinationViolation::MissingRequirement {
                dimension,
                value,
                requires,
            } => format!("{dimension}: {value} requires {requires}"),
            CombinationViolation::Conflict {
                dimension,
                value,
                conflicts_with,
            } => format!("{dimension}: {value} conflicts with {conflicts_with}"),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reads a file while enforcing a maximum byte size.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value to stdout as pretty JSON.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("cannot serialize output: {err}")))?;
    write_stdout_line(&payload).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
