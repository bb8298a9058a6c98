//! Mask Schema CLI
//!
//! Command-line interface for field masks and model declarations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mask_schema::{
    apply, compile_model, definitions_document, lint, load_document_auto, load_registry_auto,
    marshal, mask_parameter, parse_mask, validate, FileStatus, MarshalOptions, MaskOptions,
    ModelRegistry, Severity, ValidateError,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mask-schema")]
#[command(about = "Apply field masks and compile model declarations")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a mask and print its canonical form
    Parse {
        /// Mask text, e.g. "name,address{city}"
        mask: String,

        /// Print the parsed tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply a mask to a JSON payload
    Apply {
        /// Payload source: file path or URL (http:// or https://)
        payload: String,

        /// Mask to apply
        #[arg(long, short)]
        mask: String,

        /// Drop masked fields missing from the payload instead of emitting null
        #[arg(long)]
        skip_missing: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Compile model declarations into OpenAPI 2 definitions
    Compile {
        /// Declaration source: file path or URL (http:// or https://)
        declarations: String,

        /// Compile a single model instead of every definition
        #[arg(long)]
        model: Option<String>,

        /// Include the mask header parameter under "parameters"
        #[arg(long)]
        mask_param: bool,

        /// Mask header name used by --mask-param
        #[arg(long, default_value = mask_schema::DEFAULT_MASK_HEADER)]
        header: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Shape a JSON payload to a declared model
    Marshal {
        /// Declaration source: file path or URL
        declarations: String,

        /// Payload source: file path or URL
        payload: String,

        /// Model to marshal against
        #[arg(long)]
        model: String,

        /// Mask overriding the model's default mask
        #[arg(long, short)]
        mask: Option<String>,

        /// Drop null and empty-object fields
        #[arg(long)]
        skip_none: bool,

        /// Wrap the output under this key
        #[arg(long)]
        envelope: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a payload against a declared model
    Validate {
        /// Declaration source: file path or URL
        declarations: String,

        /// Payload source: file path or URL
        payload: String,

        /// Model to validate against
        #[arg(long)]
        model: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint declaration files for errors (syntax, unknown models, invalid masks)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Parse { mask, json } => run_parse(&mask, json),
        Commands::Apply {
            payload,
            mask,
            skip_missing,
            output,
            pretty,
        } => run_apply(&payload, &mask, skip_missing, output, pretty),
        Commands::Compile {
            declarations,
            model,
            mask_param,
            header,
            output,
            pretty,
        } => run_compile(
            &declarations,
            model.as_deref(),
            mask_param.then_some(header),
            output,
            pretty,
        ),
        Commands::Marshal {
            declarations,
            payload,
            model,
            mask,
            skip_none,
            envelope,
            pretty,
        } => run_marshal(MarshalArgs {
            declarations,
            payload,
            model,
            mask,
            skip_none,
            envelope,
            pretty,
        }),
        Commands::Validate {
            declarations,
            payload,
            model,
            json,
        } => run_validate(&declarations, &payload, &model, json),
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_parse(text: &str, json_output: bool) -> Result<(), u8> {
    let mask = parse_mask(text).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;

    if json_output {
        println!("{}", mask.to_value());
    } else {
        println!("{}", mask);
    }
    Ok(())
}

fn run_apply(
    payload_source: &str,
    mask: &str,
    skip_missing: bool,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let payload = load_document_auto(payload_source).map_err(|e| {
        eprintln!("Error loading payload: {}", e);
        e.exit_code() as u8
    })?;

    let masked = apply(&payload, mask, skip_missing).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&masked, output.as_deref(), pretty)
}

fn run_compile(
    source: &str,
    model: Option<&str>,
    mask_header: Option<String>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let registry = load_registry(source)?;

    let compiled = match model {
        Some(name) => registry
            .lookup(name)
            .and_then(|model| compile_model(model, &registry)),
        None => definitions_document(&registry),
    };
    let mut document = compiled.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if let (Some(header), Value::Object(map)) = (mask_header, &mut document) {
        let options = MaskOptions::new().header(header);
        map.insert(
            "parameters".into(),
            json!({ "mask": mask_parameter(&options) }),
        );
    }

    write_output(&document, output.as_deref(), pretty)
}

struct MarshalArgs {
    declarations: String,
    payload: String,
    model: String,
    mask: Option<String>,
    skip_none: bool,
    envelope: Option<String>,
    pretty: bool,
}

fn run_marshal(args: MarshalArgs) -> Result<(), u8> {
    let registry = load_registry(&args.declarations)?;
    let payload = load_document_auto(&args.payload).map_err(|e| {
        eprintln!("Error loading payload: {}", e);
        e.exit_code() as u8
    })?;

    let mut options = MarshalOptions::new().skip_none(args.skip_none);
    if let Some(text) = &args.mask {
        let mask = parse_mask(text).map_err(|e| {
            eprintln!("Error: invalid mask: {}", e);
            2u8
        })?;
        options = options.mask(mask);
    }
    if let Some(key) = args.envelope {
        options = options.envelope(key);
    }

    let out = marshal(&payload, &args.model, &registry, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&out, None, args.pretty)
}

fn run_validate(
    source: &str,
    payload_source: &str,
    model: &str,
    json_output: bool,
) -> Result<(), u8> {
    let registry = load_registry(source)?;
    let payload = load_document_auto(payload_source).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    match validate(&payload, model, &registry) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                println!("{}", json!({ "valid": false, "errors": errors }));
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn load_registry(source: &str) -> Result<ModelRegistry, u8> {
    load_registry_auto(source).map_err(|e| {
        eprintln!("Error loading declarations: {}", e);
        e.exit_code() as u8
    })
}

fn write_output(value: &Value, output: Option<&Path>, pretty: bool) -> Result<(), u8> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => std::fs::write(path, &text).map_err(|e| {
            eprintln!("Error writing to {}: {}", path.display(), e);
            3u8
        }),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let text = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", text);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };
            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.failed == 0 {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.failed == 0 {
        Ok(())
    } else {
        Err(1)
    }
}
