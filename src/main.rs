//! stepwise - CLI entry point
//!
//! Plans a task with a local model, validates the plan and runs it step by
//! step, printing every variable binding at the end.

use std::sync::Arc;

use clap::Parser;
use stepwise::agents::{AgentContext, PlanEvent, PlanExecutor, TaskPlanner};
use stepwise::config::Config;
use stepwise::llm::{normalize_base_url, OllamaClient};
use stepwise::tools::ToolRegistry;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TASK: &str = "find out what the current weather is in the user's current location";

#[derive(Debug, Parser)]
#[command(name = "stepwise", about = "Plan a task with a local model and run it step by step")]
struct Cli {
    /// Task to plan and execute
    #[arg(default_value = DEFAULT_TASK)]
    task: String,

    /// Preferred model (substring of the model name)
    #[arg(long)]
    model: Option<String>,

    /// Ollama endpoint or machine name
    #[arg(long)]
    url: Option<String>,

    /// Stop after printing the validated plan
    #[arg(long)]
    plan_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = &cli.url {
        config.ollama_url = normalize_base_url(url);
    }
    if cli.model.is_some() {
        config.preferred_model = cli.model.clone();
    }
    info!(url = %config.ollama_url, "loaded configuration");

    let client = OllamaClient::from_config(&config)?;
    if !client.is_running().await {
        anyhow::bail!("Ollama is not reachable at {}", config.ollama_url);
    }

    let tools = Arc::new(ToolRegistry::with_defaults(config.location.clone()));
    let (tx, rx) = broadcast::channel(64);
    let reporter = tokio::spawn(report_events(rx));

    let ctx = AgentContext::connect(
        Arc::new(client),
        config.preferred_model.as_deref(),
        Some(tx),
    )
    .await?
    .with_tools(tools);

    let planner = TaskPlanner::new();
    let plan = planner.plan(&cli.task, &ctx).await?;
    println!("Plan:\n{}", plan);
    let plan = planner.validate(plan, &ctx)?;

    let result = if cli.plan_only {
        None
    } else {
        Some(PlanExecutor::new().run(&plan, &ctx).await)
    };

    // Closing the last sender ends the reporter.
    drop(ctx);
    if let Err(e) = reporter.await {
        warn!(error = %e, "event reporter stopped abnormally");
    }

    let Some(result) = result else {
        return Ok(());
    };

    println!("\nVariables:");
    for (name, value) in result.state.iter() {
        println!("  ${} = {}", name, value);
    }

    result.into_result()?;
    Ok(())
}

/// Print progress events until the channel closes.
async fn report_events(mut rx: broadcast::Receiver<PlanEvent>) {
    loop {
        match rx.recv().await {
            Ok(PlanEvent::ModelSelected { model }) => println!("[agent] using model {}", model),
            Ok(PlanEvent::StepStarted { index, description, .. }) => {
                println!("[step {}] {}", index + 1, description)
            }
            Ok(PlanEvent::StepCompleted { index, value, .. }) => {
                println!("[step {}] => {}", index + 1, value)
            }
            Ok(PlanEvent::StepFailed { index, error, .. }) => {
                println!("[step {}] failed: {}", index + 1, error)
            }
            Ok(PlanEvent::ValidationFailed {
                step_index,
                variable,
            }) => println!(
                "[plan validation] step {} uses '{}' before it is produced",
                step_index + 1,
                variable
            ),
            Ok(PlanEvent::ValidationPassed { .. }) => println!("[plan validation] validated OK"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
