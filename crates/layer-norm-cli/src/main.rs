use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use layer_norm::{Backend, DeviceClass, ElementType};

mod commands;

/// Top-level CLI argument parser for the `lnorm` command
#[derive(Parser)]
#[command(
    name = "lnorm",
    about = "layer-norm: resolve shapes, run cases, query backend capabilities",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `lnorm` CLI
#[derive(Subcommand)]
enum Commands {
    /// Resolve (axis, L, G) for an input shape and check parameter shapes
    Resolve {
        /// Input shape, comma separated (e.g. 2,3,4)
        #[arg(long, value_delimiter = ',', required = true)]
        shape: Vec<usize>,
        /// Normalization axis in [-rank, rank)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        axis: i64,
        /// Scale shape, comma separated
        #[arg(long, value_delimiter = ',')]
        scale_shape: Option<Vec<usize>>,
        /// Bias shape, comma separated (requires --scale-shape)
        #[arg(long, value_delimiter = ',', requires = "scale_shape")]
        bias_shape: Option<Vec<usize>>,
    },
    /// Run a YAML case, falling back to the reference path when the CPU gate refuses
    Run {
        /// Path to the case YAML file
        case: PathBuf,
        /// Host backend: scalar, parallel, avx2, or auto
        #[arg(long, default_value = "auto")]
        backend: String,
        /// Output format: text (default), yaml, or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Ask the capability gate whether a device class accepts a configuration
    Supports {
        /// Normalization axis
        #[arg(long, allow_negative_numbers = true)]
        axis: i64,
        /// Input rank
        #[arg(long)]
        rank: usize,
        /// Element type: f32, f16, or bf16
        #[arg(long, default_value = "f32")]
        dtype: String,
        /// Device class: cpu, data-parallel, npu-graph, or ir-graph
        #[arg(long, default_value = "cpu")]
        device: String,
    },
    /// Export a case as an IR stage plan or a fused NPU node
    Export {
        /// Path to the case YAML file
        case: PathBuf,
        /// Export target: ir (default) or npu
        #[arg(long, default_value = "ir")]
        target: String,
        /// Output format: yaml (default) or json
        #[arg(long, default_value = "yaml")]
        format: String,
    },
}

/// Dispatch a parsed CLI subcommand to its handler
fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Resolve {
            shape,
            axis,
            scale_shape,
            bias_shape,
        } => commands::resolve::run(&shape, axis, scale_shape.as_deref(), bias_shape.as_deref()),
        Commands::Run {
            case,
            backend,
            format,
        } => {
            let backend = backend.parse::<Backend>()?;
            let format = commands::OutputFormat::from_str(&format)?;
            commands::run::run(&case, backend, format)
        }
        Commands::Supports {
            axis,
            rank,
            dtype,
            device,
        } => commands::supports::run(
            axis,
            rank,
            dtype.parse::<ElementType>()?,
            device.parse::<DeviceClass>()?,
        ),
        Commands::Export {
            case,
            target,
            format,
        } => {
            let target = commands::export::Target::from_str(&target)?;
            match commands::OutputFormat::from_str(&format)? {
                commands::OutputFormat::Text => {
                    Err("export supports 'yaml' or 'json' output, not 'text'".into())
                }
                fmt => commands::export::run(&case, target, fmt),
            }
        }
    }
}

/// Route `tracing` output to stderr; `RUST_LOG` overrides the default `warn` level
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point: parse CLI arguments and run the selected subcommand
fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run_command(cli.command) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
