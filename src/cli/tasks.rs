//! Task store CLI commands.
//!
//! - `voicetask tasks list` - Show tasks, newest first
//! - `voicetask tasks add` - Add a task by hand
//! - `voicetask tasks complete` - Mark a task done (or not done)
//! - `voicetask tasks archive-completed` - Archive every completed task
//! - `voicetask tasks delete` - Remove a task

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::domain::{NewTask, TaskFilter, TaskRecord, TaskSource, TaskUpdate};
use crate::store::TaskStore;

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks
    List {
        /// Show archived tasks instead of active ones
        #[arg(long)]
        archived: bool,

        /// Only show completed tasks
        #[arg(long)]
        completed: bool,
    },

    /// Add a task
    Add {
        /// Task text
        text: String,
    },

    /// Mark a task as completed
    Complete {
        /// Task ID
        id: String,

        /// Mark as not completed instead
        #[arg(long)]
        undo: bool,
    },

    /// Archive all completed tasks
    ArchiveCompleted,

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

/// Execute a task subcommand against a store
pub async fn execute(command: TaskCommands, store: &dyn TaskStore) -> Result<()> {
    match command {
        TaskCommands::List {
            archived,
            completed,
        } => {
            let mut filter = if archived {
                TaskFilter::archived()
            } else {
                TaskFilter::active()
            };
            if completed {
                filter.completed = Some(true);
            }

            let tasks = store
                .list(filter)
                .await
                .context("Failed to list tasks")?;
            print_tasks(&tasks);
        }
        TaskCommands::Add { text } => {
            let text = text.trim();
            if text.is_empty() {
                anyhow::bail!("Task text is empty");
            }
            let task = store
                .insert(NewTask::new(text, TaskSource::Direct))
                .await
                .context("Failed to add task")?;
            println!("Added {}", task.id);
        }
        TaskCommands::Complete { id, undo } => {
            let task = store
                .update(&id, TaskUpdate::completed(!undo))
                .await
                .with_context(|| format!("Failed to update task {}", id))?;
            let state = if task.completed { "completed" } else { "open" };
            println!("{} is {}", task.id, state);
        }
        TaskCommands::ArchiveCompleted => {
            let count = store
                .archive_completed()
                .await
                .context("Failed to archive tasks")?;
            println!("Archived {} task(s)", count);
        }
        TaskCommands::Delete { id } => {
            store
                .delete(&id)
                .await
                .with_context(|| format!("Failed to delete task {}", id))?;
            println!("Deleted {}", id);
        }
    }

    Ok(())
}

fn print_tasks(tasks: &[TaskRecord]) {
    if tasks.is_empty() {
        println!("No tasks found");
        return;
    }

    println!("{:<38} {:<4} {:<7} {:<17} TEXT", "ID", "DONE", "SOURCE", "CREATED");
    println!("{}", "-".repeat(100));

    for task in tasks {
        let done = if task.completed { "x" } else { "" };
        println!(
            "{:<38} {:<4} {:<7} {:<17} {}",
            task.id,
            done,
            task.source,
            task.created_at.format("%Y-%m-%d %H:%M"),
            task.text
        );
    }
}
