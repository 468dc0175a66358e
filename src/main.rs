use batchflow_ir::document::{Document, Target};
use batchflow_ir::inspect::{InspectOptions, InspectionNode, Inspector, Strictness};
use batchflow_ir::render;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "batchflow-inspect")]
#[command(about = "Batch dataflow IR inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an IR document as an inspection tree.
    Inspect {
        #[arg(long)]
        input: String,

        #[arg(long, value_enum, default_value_t = Format::JsonPretty)]
        format: Format,

        /// Output file; stdout if omitted.
        #[arg(short = 'o', long)]
        out: Option<String>,

        /// Inspection options (JSON).
        #[arg(long)]
        config: Option<String>,

        /// Skip model validation and rendered-tree verification.
        #[arg(long)]
        trust: bool,
    },
    /// Validate an IR document without rendering it.
    Validate {
        #[arg(long)]
        input: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    JsonPretty,
    Dot,
    Html,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Inspect {
            input,
            format,
            out,
            config,
            trust,
        } => {
            // 1) Options: config file first, flags override.
            let mut options = match &config {
                Some(path) => {
                    let text = std::fs::read_to_string(path)
                        .with_context(|| format!("read config file {}", path))?;
                    serde_json::from_str::<InspectOptions>(&text)
                        .with_context(|| format!("parse config file {}", path))?
                }
                None => InspectOptions::default(),
            };
            if trust {
                options.strictness = Strictness::Trust;
            }

            // 2) Load + build the IR.
            let target = load(&input)?;

            // 3) Inspect.
            let inspector = Inspector::new(options);
            let node = inspect(&inspector, &target)
                .with_context(|| format!("inspect {}", input))?;

            // 4) Render.
            let text = match format {
                Format::Json => render::render_json(&node, false)?,
                Format::JsonPretty => render::render_json(&node, true)?,
                Format::Dot => {
                    let mut buf = Vec::new();
                    render::render_dot(&node, &mut buf)?;
                    String::from_utf8(buf)?
                }
                Format::Html => render::render_html(&node)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| format!("write {}", path))?;
                    tracing::info!("wrote {}", path);
                }
                None => println!("{}", text),
            }
        }
        Commands::Validate { input } => {
            let target = load(&input)?;
            let summary = match &target {
                Target::Batch(batch) => {
                    batch.validate()?;
                    for (_, element) in batch.elements() {
                        element
                            .jobflow()
                            .graph
                            .validate()
                            .with_context(|| format!("jobflow {}", element.jobflow().id))?;
                    }
                    format!("batch {}: {} jobflows", batch.id, batch.len())
                }
                Target::Jobflow(jobflow) => {
                    jobflow.graph.validate()?;
                    format!("jobflow {}: {} operators", jobflow.id, jobflow.graph.len())
                }
                Target::Graph(id, graph) => {
                    graph.validate()?;
                    format!("graph {}: {} operators", id, graph.len())
                }
                Target::Plan(id, plan) => {
                    plan.validate()?;
                    format!(
                        "plan {}: {} sub-plans, {} dependencies",
                        id,
                        plan.len(),
                        plan.dependencies().len()
                    )
                }
            };
            println!("OK {}", summary);
        }
    }

    Ok(())
}

fn load(path: &str) -> Result<Target> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read input file {}", path))?;
    let document = Document::from_json(&text).with_context(|| format!("parse {}", path))?;
    let target = document
        .build()
        .with_context(|| format!("build IR from {}", path))?;
    Ok(target)
}

fn inspect(inspector: &Inspector, target: &Target) -> batchflow_ir::Result<InspectionNode> {
    match target {
        Target::Batch(batch) => inspector.inspect_batch(batch),
        Target::Jobflow(jobflow) => inspector.inspect_jobflow(jobflow),
        Target::Graph(id, graph) => inspector.inspect_graph(id, graph),
        Target::Plan(id, plan) => inspector.inspect_plan(id, plan),
    }
}
