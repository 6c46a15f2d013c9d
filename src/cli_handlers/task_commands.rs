use chrono::Utc;
use serde_json::json;

use super::utils::{format_task_line, parse_due_date, print_json, print_section};
use crate::classifier::{ArchiveRange, BucketKey};
use crate::cli::{Commands, OutputFormat, ViewKind};
use crate::config::DaybookConfig;
use crate::db::models::{EnergyLevel, NewTask, StatusFunnel, TaskPatch, TaskStatus};
use crate::db::{create_pool, run_migrations};
use crate::drag::DropTarget;
use crate::error::{PlannerError, Result};
use crate::orchestrator::{ActionOutcome, Orchestrator};
use crate::store::{HttpStore, LocalStore, TaskStore};

/// Run a task command against the configured store
pub async fn handle_command(command: Commands, config: &DaybookConfig) -> Result<()> {
    match &config.api_url {
        Some(url) => {
            let store = HttpStore::new(url.as_str(), config.owner_id.as_str())?;
            let mut orchestrator = Orchestrator::connect(store).await?;
            execute(&mut orchestrator, command).await
        },
        None => {
            let pool = create_pool(&config.db_path).await?;
            run_migrations(&pool).await?;
            let store = LocalStore::new(pool, config.owner_id.as_str());
            let mut orchestrator = Orchestrator::connect(store).await?;
            execute(&mut orchestrator, command).await
        },
    }
}

async fn execute<S: TaskStore>(orch: &mut Orchestrator<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { .. } => Err(PlannerError::InvalidInput(
            "serve is not a task command".to_string(),
        )),

        Commands::Add {
            title,
            description,
            funnel,
            energy,
            context,
            due,
            format,
        } => {
            let new = NewTask {
                title,
                description,
                energy_level: energy
                    .as_deref()
                    .map(EnergyLevel::parse_optional)
                    .transpose()?
                    .flatten(),
                context_id: context,
                status_funnel: Some(funnel.parse::<StatusFunnel>()?),
                due_date: due.as_deref().map(parse_due_date).transpose()?,
                parent_id: None,
            };
            let outcome = orch.create_task(new).await?;
            let id = settle(outcome)?.unwrap_or_default();
            report_task(orch, id, "Created", format)
        },

        Commands::Subtask {
            parent,
            title,
            format,
        } => {
            let outcome = orch.add_subtask(parent, title).await?;
            let id = settle(outcome)?.unwrap_or_default();
            report_task(orch, id, "Created subtask", format)
        },

        Commands::List {
            view,
            range,
            format,
        } => list(orch, view, &range, format),

        Commands::Toggle { id, format } => {
            let xp_before = orch.stats().xp;
            settle(orch.toggle_complete(id).await?)?;
            let task_done = orch.task(id).is_some_and(|t| t.is_done());

            match format {
                OutputFormat::Json => print_json(&json!({
                    "task": orch.task(id),
                    "stats": orch.stats(),
                })),
                OutputFormat::Text => {
                    report_task(orch, id, if task_done { "Completed" } else { "Reopened" }, format)?;
                    let gained = orch.stats().xp - xp_before;
                    if gained > 0 {
                        println!(
                            "+{} XP  (streak {} day(s), {} XP total)",
                            gained,
                            orch.stats().streak,
                            orch.stats().xp
                        );
                    }
                    Ok(())
                },
            }
        },

        Commands::Move { id, funnel, format } => {
            settle(orch.move_funnel(id, funnel.parse()?).await?)?;
            report_task(orch, id, "Moved", format)
        },

        Commands::Energy { id, energy, format } => {
            let energy = EnergyLevel::parse_optional(&energy)?;
            settle(orch.update_energy(id, energy).await?)?;
            report_task(orch, id, "Updated", format)
        },

        Commands::Reorder {
            bucket,
            from,
            to,
            format,
        } => {
            let bucket: BucketKey = bucket.parse()?;
            settle(orch.reorder_within(bucket, from, to).await?)?;
            report_bucket(orch, bucket, format)
        },

        Commands::Drop {
            id,
            bucket,
            over,
            format,
        } => {
            let target = match (bucket, over) {
                (Some(bucket), _) => Some(DropTarget::Container(bucket.parse()?)),
                (None, Some(over)) => Some(DropTarget::Task(over)),
                (None, None) => None,
            };
            orch.begin_drag(id)?;
            let outcome = orch.end_drag(target).await?;
            if outcome == ActionOutcome::Unchanged {
                return match format {
                    OutputFormat::Json => print_json(&json!({ "dropped": false })),
                    OutputFormat::Text => {
                        println!("Drop cancelled");
                        Ok(())
                    },
                };
            }
            settle(outcome)?;
            report_task(orch, id, "Dropped", format)
        },

        Commands::Edit {
            id,
            title,
            description,
            clear_description,
            status,
            due,
            clear_due,
            context,
            format,
        } => {
            let patch = TaskPatch {
                title,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                status: status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
                due_date: if clear_due {
                    Some(None)
                } else {
                    due.as_deref().map(parse_due_date).transpose()?.map(Some)
                },
                context_id: context.map(Some),
                ..Default::default()
            };
            if patch.is_empty() {
                return Err(PlannerError::InvalidInput(
                    "Nothing to edit. Pass at least one field".to_string(),
                ));
            }
            settle(orch.edit_task(id, patch).await?)?;
            report_task(orch, id, "Updated", format)
        },

        Commands::Delete { id, format } => {
            settle(orch.delete_task(id).await?)?;
            match format {
                OutputFormat::Json => print_json(&json!({ "deleted": id })),
                OutputFormat::Text => {
                    println!("Deleted task #{}", id);
                    Ok(())
                },
            }
        },

        Commands::CleanSlate { format } => {
            let pending = orch.pending_today_count();
            let outcome = orch.clean_slate().await?;
            let moved = if outcome == ActionOutcome::Unchanged {
                0
            } else {
                settle(outcome)?;
                pending
            };
            match format {
                OutputFormat::Json => print_json(&json!({ "movedCount": moved })),
                OutputFormat::Text => {
                    println!("Moved {} task(s) back to the backlog", moved);
                    Ok(())
                },
            }
        },

        Commands::Stats { format } => match format {
            OutputFormat::Json => print_json(orch.stats()),
            OutputFormat::Text => {
                let stats = orch.stats();
                println!("Streak: {} day(s)", stats.streak);
                println!("XP:     {}", stats.xp);
                if let Some(last) = stats.last_completed_date {
                    println!("Last completion: {}", last.format("%Y-%m-%d %H:%M UTC"));
                }
                Ok(())
            },
        },
    }
}

/// Turn a rolled-back action into an error; returns the created id, if any
fn settle(outcome: ActionOutcome) -> Result<Option<i64>> {
    match outcome {
        ActionOutcome::RolledBack { warning } => Err(PlannerError::PersistenceFailure(format!(
            "{} (changes were rolled back)",
            warning
        ))),
        ActionOutcome::Created { id } => Ok(Some(id)),
        ActionOutcome::Applied | ActionOutcome::Unchanged => Ok(None),
    }
}

fn report_task<S: TaskStore>(
    orch: &Orchestrator<S>,
    id: i64,
    verb: &str,
    format: OutputFormat,
) -> Result<()> {
    let task = orch.task(id).ok_or(PlannerError::TaskNotFound(id))?;
    match format {
        OutputFormat::Json => print_json(task),
        OutputFormat::Text => {
            println!("{}: {}", verb, format_task_line(task));
            Ok(())
        },
    }
}

fn report_bucket<S: TaskStore>(
    orch: &Orchestrator<S>,
    bucket: BucketKey,
    format: OutputFormat,
) -> Result<()> {
    let tasks: Vec<_> = orch.board().bucket(bucket).into_iter().cloned().collect();
    match format {
        OutputFormat::Json => print_json(&tasks),
        OutputFormat::Text => {
            print_section(&bucket.to_string(), &tasks, |_| Vec::new());
            Ok(())
        },
    }
}

fn list<S: TaskStore>(
    orch: &Orchestrator<S>,
    view: ViewKind,
    range: &str,
    format: OutputFormat,
) -> Result<()> {
    let subtasks = |id| orch.subtasks(id);
    match view {
        ViewKind::Planning => {
            let planning = orch.planning_view();
            if format == OutputFormat::Json {
                return print_json(&planning);
            }
            print_section("Backlog", &planning.backlog, subtasks);
            print_section("This week", &planning.weekly, subtasks);
            print_section("Today", &planning.today, subtasks);
        },
        ViewKind::Execution => {
            let execution = orch.execution_view();
            if format == OutputFormat::Json {
                return print_json(&execution);
            }
            print_section("High focus", &execution.high_focus, subtasks);
            print_section("Low energy", &execution.low_energy, subtasks);
        },
        ViewKind::Archive => {
            let range: ArchiveRange = range.parse()?;
            let archived = orch.archive_view(range, Utc::now());
            if format == OutputFormat::Json {
                return print_json(&archived);
            }
            print_section("Completed", &archived, |_| Vec::new());
        },
    }

    if orch.should_offer_clean_slate() {
        println!(
            "\n{} tasks are still pending today. Run `daybook clean-slate` to start fresh.",
            orch.pending_today_count()
        );
    }
    if orch.is_stale() {
        println!("\nWarning: showing possibly stale data");
    }
    Ok(())
}
