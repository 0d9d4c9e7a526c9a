mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use aihero::ui::{PollProgress, print_json};
use aihero::{Automation, Client, PollConfig, Poller, Project, SdkConfig};
use cli::{Cli, Command};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<SdkConfig> {
    let config = match &cli.config {
        Some(path) => SdkConfig::load_from(path),
        None => SdkConfig::load(),
    };
    config.context("failed to load configuration")
}

fn with_deadline(mut config: PollConfig, timeout_secs: Option<u64>) -> PollConfig {
    if let Some(secs) = timeout_secs {
        config.deadline = Some(Duration::from_secs(secs));
    }
    config
}

fn parse_json(raw: &str, what: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{what} is not valid JSON"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Promptcraft { app, apps_dir } = &cli.command {
        let app_path = apps_dir.join("promptcraft").join(format!("{app}.py"));
        if !app_path.is_file() {
            bail!("PromptCraft app not found: {}", app_path.display());
        }
        let status = tokio::process::Command::new("streamlit")
            .arg("run")
            .arg(&app_path)
            .status()
            .await
            .context("failed to start streamlit")?;
        if !status.success() {
            bail!("streamlit exited with {status}");
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    let client = Arc::new(Client::connect(config)?);

    match cli.command {
        Command::Project { project_id } => {
            let project = Project::open(client, &project_id).await?;
            print_json("Project", &project.snapshot())
        }
        Command::Workflows { project_id } => {
            let project = Project::open(client, &project_id).await?;
            let workflows = project.list_workflows().await?;
            for workflow in &workflows {
                let status = workflow.status_text().unwrap_or("-");
                println!("{}\t{status}\t{}", workflow.workflow_id, workflow.name);
            }
        }
        Command::Workflow {
            project_id,
            workflow_id,
        } => {
            let project = Project::open(client, &project_id).await?;
            let mut handle = project.workflow(&workflow_id);
            print_json("Workflow", handle.get().await?)
        }
        Command::Launch {
            project_id,
            workflow_id,
            timeout,
        } => {
            let project = Project::open(client.clone(), &project_id).await?;
            let mut handle = project.workflow(&workflow_id);
            let progress = Arc::new(PollProgress::start(&format!("workflow {workflow_id}")));
            let poller = Poller::new(with_deadline(client.config().workflow_poll(), timeout))
                .with_observer(progress.clone());

            match handle.launch_with(&poller).await {
                Ok(outcome) => {
                    progress.complete(&format!("workflow {workflow_id} finished"));
                    print_json("Workflow", &outcome.snapshot);
                    progress.print_record(&outcome.record);
                }
                Err(e) => {
                    progress.fail(&e);
                    return Err(e.into());
                }
            }
        }
        Command::Job {
            automation_id,
            kind,
            body,
            timeout,
        } => {
            let body = parse_json(&body, "body")?;
            let automation = Automation::new(client.clone(), &automation_id, kind)?;
            let progress = Arc::new(PollProgress::start(&format!("automation {automation_id}")));
            let poller = Poller::new(with_deadline(client.config().job_poll(), timeout))
                .with_observer(progress.clone());

            match automation.run_job_with(&body, &poller).await {
                Ok(outcome) => {
                    progress.complete(&format!("job {} done", outcome.snapshot.id));
                    print_json("Job", &outcome.snapshot);
                    progress.print_record(&outcome.record);
                }
                Err(e) => {
                    progress.fail(&e);
                    return Err(e.into());
                }
            }
        }
        Command::Infer {
            automation_id,
            task,
            kind,
            payload,
        } => {
            let payload = parse_json(&payload, "payload")?;
            let automation = Automation::new(client, &automation_id, kind)?;
            print_json("Inference", &automation.infer(&task, &payload).await?)
        }
        Command::Definition {
            automation_id,
            kind,
        } => {
            let automation = Automation::new(client, &automation_id, kind)?;
            print_json("Definition", &automation.get_definition().await?)
        }
        Command::Upload { project_id, file } => {
            let project = Project::open(client, &project_id).await?;
            let name = project.upload_file(&file).await?;
            println!("uploaded {name}");
        }
        Command::Promptcraft { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}
