use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;

use tollgate_rs::adk::model::openai::OpenAIModel;
use tollgate_rs::tollgate::server;
use tollgate_rs::tollgate::tools::{math, weather};
use tollgate_rs::tollgate::workflow::builder::WorkflowBuilder;
use tollgate_rs::tollgate::workflow::executor::StepExecutor;
use tollgate_rs::tollgate::workflow::interrupt::{ResumeDecision, ResumeStatus};
use tollgate_rs::tollgate::workflow::registry::ToolRegistry;
use tollgate_rs::tollgate::workflow::runner::{RunInput, RunOutcome, WorkflowRunner};
use tollgate_rs::tollgate::workflow::store::FileStore;

use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the workflow file
    #[arg(short, long, global = true, default_value = "workflows/calculator.yaml")]
    workflow: String,

    /// Directory holding persisted threads
    #[arg(long, global = true, default_value = ".tollgate/threads")]
    store_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a user message to a thread, creating it if needed
    Run {
        #[arg(short, long)]
        thread: String,

        #[arg(short, long)]
        input: String,
    },
    /// Answer the thread's pending interrupt
    Resume {
        #[arg(short, long)]
        thread: String,

        #[command(subcommand)]
        decision: DecisionArg,
    },
    /// Continue a thread from its cursor without new input
    Continue {
        #[arg(short, long)]
        thread: String,
    },
    /// Print a thread's current state and pending interrupt
    State {
        #[arg(short, long)]
        thread: String,
    },
    /// Print a thread's checkpoints
    History {
        #[arg(short, long)]
        thread: String,
    },
    /// Reset a thread to an earlier checkpoint
    Rewind {
        #[arg(short, long)]
        thread: String,

        #[arg(short, long)]
        step: u64,
    },
    /// Serve the workflow over HTTP
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
enum DecisionArg {
    /// Proceed as proposed
    Accept,
    /// Proceed with replacement arguments (JSON)
    Edit {
        #[arg(long)]
        args: String,
    },
    /// Refuse the proposed action
    Reject {
        /// End the thread instead of continuing
        #[arg(long)]
        terminate: bool,
    },
    /// Answer in place of the action (JSON)
    Respond {
        #[arg(long)]
        value: String,
    },
}

impl DecisionArg {
    fn into_decision(self) -> anyhow::Result<ResumeDecision> {
        Ok(match self {
            DecisionArg::Accept => ResumeDecision::Accept,
            DecisionArg::Edit { args } => ResumeDecision::edit(serde_json::from_str(&args)?),
            DecisionArg::Reject { terminate } => ResumeDecision::reject(terminate),
            DecisionArg::Respond { value } => {
                // Plain text is accepted as a JSON string
                let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                ResumeDecision::respond(value)
            }
        })
    }
}

async fn build_runner(
    workflow_path: &str,
    store_dir: &str,
) -> anyhow::Result<WorkflowRunner> {
    let registry = ToolRegistry::new();
    for tool in math::create_tools()
        .into_iter()
        .chain([weather::get_weather()])
    {
        log::info!("Registered tool: {}", tool.name());
        registry.register(tool).await;
    }

    let builder = WorkflowBuilder::new(registry.clone());
    let (workflow, config) = builder
        .build_file(workflow_path)
        .await
        .with_context(|| format!("failed to load workflow {}", workflow_path))?;

    let model_name = std::env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    log::info!("Using model: {}", model_name);
    let executor = match OpenAIModel::new(model_name) {
        Ok(model) => StepExecutor::new(Arc::new(model), registry),
        Err(e) => {
            log::warn!("No model available ({}); chat nodes will fail", e);
            StepExecutor::without_model(registry)
        }
    };

    Ok(WorkflowRunner::new(
        workflow,
        executor,
        Arc::new(FileStore::new(store_dir)),
        config,
    ))
}

fn print_outcome(outcome: &RunOutcome) -> anyhow::Result<()> {
    match outcome {
        RunOutcome::Completed { state } => {
            if let Ok(messages) = state.messages() {
                if let Some(last) = messages.last() {
                    println!("Response: {}", last.text());
                }
            }
            println!("Completed.");
        }
        RunOutcome::Interrupted { interrupt } => {
            println!("Paused at '{}' ({})", interrupt.node, interrupt.id);
            println!("{}", serde_json::to_string_pretty(&interrupt.payload)?);
            println!("Answer with: resume --thread <id> accept|edit|reject|respond");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();
    if !matches!(args.command, Commands::Serve { .. }) {
        env_logger::init();
    }

    let runner = build_runner(&args.workflow, &args.store_dir).await?;

    match args.command {
        Commands::Run { thread, input } => {
            let outcome = runner.invoke(&thread, RunInput::message(input)?).await?;
            print_outcome(&outcome)?;
        }
        Commands::Resume { thread, decision } => {
            let decision = decision.into_decision()?;
            let outcome = runner.invoke(&thread, RunInput::Resume(decision)).await?;
            print_outcome(&outcome)?;
        }
        Commands::Continue { thread } => {
            let outcome = runner.invoke(&thread, RunInput::Continue).await?;
            print_outcome(&outcome)?;
        }
        Commands::State { thread } => {
            let state = runner.get_state(&thread).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            if let ResumeStatus::Pending(record) = runner.pending_interrupt(&thread).await? {
                println!("Waiting on '{}':", record.id);
                println!("{}", serde_json::to_string_pretty(&record.payload)?);
            }
        }
        Commands::History { thread } => {
            for checkpoint in runner.get_history(&thread).await? {
                println!(
                    "step {:>3}  {:<12} -> {}",
                    checkpoint.step,
                    checkpoint.node.as_deref().unwrap_or("(input)"),
                    checkpoint.cursor.as_deref().unwrap_or("(end)")
                );
            }
        }
        Commands::Rewind { thread, step } => {
            let rewound = runner.rewind(&thread, step).await?;
            println!(
                "Thread {} is back at step {} (next: {})",
                rewound.id,
                rewound.step,
                rewound.cursor.as_deref().unwrap_or("(end)")
            );
        }
        Commands::Serve { port } => {
            // Spans from the HTTP layer and `log` records both go through tracing
            if tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .try_init()
                .is_err()
            {
                eprintln!("tracing subscriber already installed");
            }
            server::serve(runner, port)
                .await
                .map_err(|e| anyhow::anyhow!(e))
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}
