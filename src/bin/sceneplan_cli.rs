//! Scene Plan CLI - Bridge interface for chat front ends
//!
//! Commands: policies, sanitize, explain, compile
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when the prompt is rejected

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sceneplan_core::{
    sanitize::sanitize_bytes, CompileRequest, GenerationMode, PipelineError, PolicyRegistry,
    QualityPreset, SafetyProfile, ScenePipeline,
};

#[derive(Parser)]
#[command(name = "sceneplan-cli")]
#[command(about = "Scene Plan CLI - prompt to control-spec compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to policies directory
    #[arg(long, default_value = "policies")]
    policies_dir: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,
}

#[derive(Args)]
struct PromptInput {
    /// Prompt text (read from stdin when omitted)
    #[arg(short, long)]
    prompt: Option<String>,
}

impl PromptInput {
    fn read(self) -> io::Result<Vec<u8>> {
        match self.prompt {
            Some(prompt) => Ok(prompt.into_bytes()),
            None => {
                let mut buf = Vec::new();
                io::stdin().read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available policies
    Policies,

    /// Sanitize a prompt and print the result
    Sanitize {
        #[command(flatten)]
        input: PromptInput,
    },

    /// Show which classifier rule decided each facet
    Explain {
        #[command(flatten)]
        input: PromptInput,
    },

    /// Compile a prompt into a scene plan and JSON control spec
    Compile {
        #[command(flatten)]
        input: PromptInput,

        #[arg(short, long, default_value = "text-to-image")]
        mode: GenerationMode,

        #[arg(short, long, default_value = "safe")]
        safety: SafetyProfile,

        #[arg(short, long, default_value = "standard")]
        quality: QualityPreset,

        /// Policy id (defaults to the built-in policy)
        #[arg(long)]
        policy: Option<String>,

        /// Reference image for image-to-image, inpaint and outpaint
        #[arg(long)]
        reference_url: Option<String>,

        /// Suggested output filename
        #[arg(long)]
        output_name: Option<String>,

        /// Print only the JSON control spec
        #[arg(long)]
        control_only: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sceneplan_core=info,sceneplan_cli=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    }
}

fn emit(value: &impl Serialize) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to encode output: {}"}}"#, e);
            ExitCode::FAILURE
        }
    }
}

fn fail(error: &PipelineError) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": error.to_string(),
    });
    println!("{}", output);
    match error {
        PipelineError::InputRejected(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn read_input(input: PromptInput) -> Result<Vec<u8>, ExitCode> {
    input.read().map_err(|e| {
        eprintln!(r#"{{"error": "Failed to read prompt: {}"}}"#, e);
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let registry = match PolicyRegistry::load_from_dir(&cli.policies_dir) {
        Ok(r) => r,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load policies: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = ScenePipeline::new(registry);

    match cli.command {
        Commands::Policies => {
            let policies: Vec<_> = pipeline
                .list_policies()
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "id": p.id,
                        "version": p.policy_version,
                        "engine_min_version": p.engine_min_version,
                        "description": p.description,
                    })
                })
                .collect();
            emit(&policies)
        }

        Commands::Sanitize { input } => {
            let raw = match read_input(input) {
                Ok(raw) => raw,
                Err(code) => return code,
            };
            match sanitize_bytes(&raw) {
                Ok(prompt) => emit(&serde_json::json!({
                    "success": true,
                    "sanitized": prompt,
                    "bytes": prompt.as_str().len(),
                })),
                Err(e) => fail(&PipelineError::InputRejected(e)),
            }
        }

        Commands::Explain { input } => {
            let raw = match read_input(input) {
                Ok(raw) => raw,
                Err(code) => return code,
            };
            match pipeline.explain(&String::from_utf8_lossy(&raw)) {
                Ok(verdicts) => emit(&verdicts),
                Err(e) => fail(&e),
            }
        }

        Commands::Compile {
            input,
            mode,
            safety,
            quality,
            policy,
            reference_url,
            output_name,
            control_only,
        } => {
            let raw = match read_input(input) {
                Ok(raw) => raw,
                Err(code) => return code,
            };
            let request = CompileRequest {
                policy_id: policy,
                reference_image_url: reference_url,
                output_name,
                ..CompileRequest::new(String::from_utf8_lossy(&raw), mode, safety, quality)
            };

            match pipeline.compile_with_manifest(&request) {
                Ok((compiled, manifest)) => {
                    info!(id = %manifest.id, control_hash = %manifest.control_hash, "compiled");
                    if control_only {
                        println!("{}", compiled.json_control);
                        return ExitCode::SUCCESS;
                    }
                    emit(&serde_json::json!({
                        "success": true,
                        "scene_plan": compiled.scene_plan,
                        "json_control": compiled.json_control,
                        "manifest": manifest,
                    }))
                }
                Err(e) => fail(&e),
            }
        }
    }
}
