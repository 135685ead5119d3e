//! LLM Trace Generator - Command Line Interface
//!
//! Lays a model's weights across the SSD's logical address space and emits a
//! read trace in one of three shapes:
//!
//!   compact = single iteration (recommended; replay via the workload relay count)
//!   decode  = full token sequence (large file)
//!   full    = prefill + decode (very large file)

use std::path::PathBuf;
use std::process;

use clap::Parser;
use colored::*;

use nand_ifc_sim::prelude::*;

// SSD assumptions the traces are generated against; the simulator's flash
// parameter set must be configured consistently.
const SSD_CAPACITY_BYTES: u64 = 256 * 1024 * 1024 * 1024;
const PAGE_SIZE_BYTES: u32 = 16 * 1024;
const PAGES_PER_BLOCK: u32 = 256;

#[derive(Parser)]
#[command(name = "llm-trace-gen")]
#[command(about = "Generate LLM inference read traces over a flash weight layout")]
#[command(version)]
struct Cli {
    /// Model name: llama7b, llama13b, llama70b, opt6.7b
    #[arg(short = 'm', long = "model", default_value = "llama7b")]
    model: String,

    /// Number of tokens to generate (compact mode: used for stats and the
    /// relay-count hint only)
    #[arg(short = 'n', long = "tokens", default_value = "10000")]
    tokens: u32,

    /// Output trace file
    #[arg(short = 'o', long = "output", default_value = "llm_trace.txt")]
    output: PathBuf,

    /// Trace type: compact, decode, full
    #[arg(short = 't', long = "trace-type", default_value = "compact")]
    trace_type: String,

    /// Compute time per token in microseconds
    #[arg(short = 'c', long = "compute-us", default_value = "1000.0")]
    compute_us: f64,

    /// Gap between consecutive page reads in microseconds
    #[arg(long = "read-gap-us", default_value = "30")]
    read_gap_us: u64,

    /// Output workload statistics in JSON format (for machine parsing)
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Validated by hand rather than by clap so unknown values exit 1, the
    // code consumers of this tool key on.
    let Some(model) = ModelSpec::from_cli_name(&cli.model) else {
        eprintln!("{}", WorkloadError::UnknownModel(cli.model));
        process::exit(1);
    };
    let Some(kind) = TraceKind::from_cli_name(&cli.trace_type) else {
        eprintln!("{}", WorkloadError::UnknownTraceKind(cli.trace_type));
        process::exit(1);
    };

    let config = InferenceConfig {
        num_tokens_to_generate: cli.tokens,
        compute_time_per_token_us: cli.compute_us,
        inter_read_gap_us: cli.read_gap_us,
        ..Default::default()
    };

    if !cli.json {
        println!("{}", "=== LLM Trace Generator ===".cyan());
        println!("Model: {}", model.name);
        println!("Tokens to generate: {}", cli.tokens);
        println!("Output file: {}", cli.output.display());
        println!("Trace type: {}", cli.trace_type);
        println!("{}", "===========================".cyan());
        println!();
    }

    let workload = LlmWorkload::new(
        model,
        config,
        SSD_CAPACITY_BYTES,
        PAGE_SIZE_BYTES,
        PAGES_PER_BLOCK,
    );

    let stats = workload.stats();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats).unwrap());
    } else {
        println!("{stats}");
        println!();
        match kind {
            TraceKind::Compact => {}
            TraceKind::Decode => {
                println!("{}", "WARNING: generating full decode trace (large file)".yellow());
            }
            TraceKind::Full => {
                println!(
                    "{}",
                    "WARNING: generating prefill + decode trace (very large file)".yellow()
                );
            }
        }
    }

    let summary = match workload.generate(kind, &cli.output) {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("{}: {}", "Error".red(), err);
            process::exit(1);
        }
    };

    if !cli.json {
        println!("{}", "Trace generation complete".green());
        println!("  Records: {}", summary.records);
        println!(
            "  Simulated duration: {:.3} s",
            summary.duration_us as f64 / 1e6
        );
        if kind == TraceKind::Compact {
            println!();
            println!("To simulate {} tokens with this trace:", cli.tokens);
            println!("  set the workload relay count to {}", cli.tokens);
            println!(
                "  total simulated time: {:.1} s",
                summary.duration_us as f64 * cli.tokens as f64 / 1e6
            );
        }
    }
}
