use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{AssignmentId, HowSolvedStatus};
use student_client::{
    config::{load_settings, load_settings_from},
    Navigator, ProgressView, StudentPage,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const PROGRESS_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "trix-student", about = "Work with a student assignment page")]
struct Args {
    /// Settings file; defaults to ./student.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Assignment page URL, including any tag filter.
    #[arg(long)]
    page_url: Option<String>,
    #[arg(long)]
    csrf_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page URL with a tag added to the filter.
    AddTag {
        tag: String,
        /// Exclude assignments with this tag instead.
        #[arg(long)]
        exclude: bool,
    },
    /// Print the page URL with a filter term removed (use `-tag` for exclusions).
    RemoveTag { term: String },
    /// List the terms of the current filter.
    Tags,
    /// Mark an assignment as solved.
    Solve {
        assignment_id: i64,
        #[arg(long)]
        with_help: bool,
        /// Status the assignment currently has on the page.
        #[arg(long)]
        current: Option<String>,
    },
    /// Clear the solved status of an assignment.
    Unsolve {
        assignment_id: i64,
        #[arg(long)]
        current: Option<String>,
    },
    /// Show aggregate progress for the current filter.
    Progress,
    /// Print the rendered assignment list fragment.
    List,
}

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, target: &Url) {
        println!("{target}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(page_url) = args.page_url {
        settings.page_url = page_url;
    }
    if let Some(token) = args.csrf_token {
        settings.csrf_token = Some(token);
    }
    let page = StudentPage::from_settings(&settings)?;

    match args.command {
        Command::AddTag { tag, exclude } => {
            page.tag_filter(PrintNavigator).add_tag(&tag, exclude);
        }
        Command::RemoveTag { term } => {
            page.tag_filter(PrintNavigator).remove_tag(&term);
        }
        Command::Tags => {
            let filter = page.tag_filter(PrintNavigator).current();
            if filter.is_empty() {
                println!("(no tags selected)");
            }
            for term in filter.terms() {
                println!("{term}");
            }
        }
        Command::Solve {
            assignment_id,
            with_help,
            current,
        } => {
            let widget = page.assignment(AssignmentId(assignment_id), parse_status(current)?);
            let poller = page.mount_progress().await;
            let before = widget.view().await.status;
            let mut updates = poller.subscribe_updates();
            let status = if with_help {
                widget.solved_with_help().await?
            } else {
                widget.solved_by_myself().await?
            };
            println!("assignment {assignment_id}: {status}");
            if status != before {
                wait_for_refresh(&mut updates).await;
            }
            print_progress(&poller.view().await);
        }
        Command::Unsolve {
            assignment_id,
            current,
        } => {
            let widget = page.assignment(AssignmentId(assignment_id), parse_status(current)?);
            let poller = page.mount_progress().await;
            let before = widget.view().await.status;
            let mut updates = poller.subscribe_updates();
            let status = widget.not_solved().await?;
            println!("assignment {assignment_id}: {status}");
            if status != before {
                wait_for_refresh(&mut updates).await;
            }
            print_progress(&poller.view().await);
        }
        Command::Progress => {
            let poller = page.mount_progress().await;
            print_progress(&poller.view().await);
        }
        Command::List => {
            let list = page.mount_assignment_list().await;
            match list.view().await.content {
                Some(html) => println!("{html}"),
                None => warn!("assignment list: nothing loaded"),
            }
        }
    }

    Ok(())
}

fn parse_status(raw: Option<String>) -> Result<HowSolvedStatus> {
    HowSolvedStatus::parse(raw.as_deref()).context("invalid --current status")
}

// A status change reaches the poller through the bus; wait for its fetch.
async fn wait_for_refresh(updates: &mut watch::Receiver<u64>) {
    match tokio::time::timeout(PROGRESS_REFRESH_TIMEOUT, updates.changed()).await {
        Ok(Ok(())) => info!("progress: refreshed after status change"),
        Ok(Err(_)) | Err(_) => warn!("progress: no refresh received"),
    }
}

fn print_progress(view: &ProgressView) {
    let Some(progress) = &view.progress else {
        println!("progress unavailable");
        return;
    };
    let counts = match (progress.num_solved, progress.num_total) {
        (Some(solved), Some(total)) => format!(" ({solved}/{total})"),
        _ => String::new(),
    };
    println!(
        "solved {}%{counts} [{:?}] level {} ({}% to next), experience {}",
        progress.percent,
        view.bar_tier,
        progress.level,
        progress.level_progress,
        progress.experience
    );
    if view.leveled_up {
        println!("Level up!");
    }
    if view.leveled_down {
        println!("Level down.");
    }
    if view.hidden {
        println!("(progress hidden for this list)");
    }
}
