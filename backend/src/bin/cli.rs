use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use shared::api::{CalendarFailureResponse, CalendarResponse, DeleteTaskResponse, ErrorResponse, TaskResponse};

#[derive(Parser)]
#[command(name = "stay-ops")]
#[command(about = "CLI for running booking reconciliation and managing tasks via the backend API")]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "STAY_OPS_API_URL"
    )]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation and print what it did
    ///
    /// Suitable for cron: exits non-zero when the run failed outright.
    Sync,
    /// List or delete tasks in the task store
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List open tasks, soonest due first
    List,

    /// Permanently delete a task
    Delete {
        /// The task store's ID for the task (shown in brackets by 'tasks list')
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.base_url.trim_end_matches('/');

    match cli.command {
        Commands::Sync => sync(&client, base_url).await?,
        Commands::Tasks { action } => handle_tasks(&client, base_url, action).await?,
    }

    Ok(())
}

async fn sync(client: &Client, base_url: &str) -> anyhow::Result<()> {
    let response = client
        .get(format!("{}/api/calendar", base_url))
        .send()
        .await
        .context("Failed to reach backend")?;

    if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        let failure: CalendarFailureResponse = response.json().await?;
        bail!("{}: {}", failure.error, failure.details);
    }
    let calendar: CalendarResponse = response
        .error_for_status()?
        .json()
        .await
        .context("Failed to parse calendar response")?;

    for source in &calendar.events {
        println!("{:<16} {} events", source.name, source.events.len());
    }
    for error in &calendar.errors {
        println!("✗ {} ({}): {}", error.source, error.kind, error.message);
    }
    if let Some(warning) = &calendar.store_warning {
        println!("! {}", warning);
    }

    let summary = &calendar.summary;
    println!(
        "Created {}, already present {}, out of window {}, failed {}",
        summary.created, summary.duplicates, summary.out_of_window, summary.failed
    );

    if summary.failed > 0 {
        bail!("{} task(s) could not be created", summary.failed);
    }
    Ok(())
}

async fn handle_tasks(client: &Client, base_url: &str, action: TaskAction) -> anyhow::Result<()> {
    match action {
        TaskAction::List => {
            let tasks: Vec<TaskResponse> = client
                .get(format!("{}/api/tasks", base_url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                for task in tasks {
                    let status = if task.completed { "✓" } else { "○" };
                    let due = if task.due_date.is_empty() { "no date" } else { task.due_date.as_str() };
                    println!("{} [{}] {} ({})", status, task.id, task.name, due);
                    if !task.labels.is_empty() {
                        println!("    Labels: {}", task.labels.join(", "));
                    }
                }
            }
        }
        TaskAction::Delete { id } => {
            let response = client
                .delete(format!("{}/api/task/{}", base_url, id))
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status();
                let error: ErrorResponse = response
                    .json()
                    .await
                    .with_context(|| format!("Backend returned {}", status))?;
                match error.details {
                    Some(details) => bail!("{}: {}", error.error, details),
                    None => bail!("{}", error.error),
                }
            }
            let deleted: DeleteTaskResponse = response.json().await?;
            println!("Deleted task: {}", deleted.id);
        }
    }

    Ok(())
}
