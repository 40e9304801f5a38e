use crate::utils::Context;
use colored::Colorize;
use converge_cloud::{TASK_BACKEND, task_status_map};
use converge_core::{TaskId, TaskStatus};

/// Poll a task once and print its normalized status
pub async fn handle(ctx: &Context, task_id: &str) -> anyhow::Result<()> {
    let task_id = TaskId::new(task_id);
    let report = ctx.client.task_status(&task_id).await?;

    let mut statuses = task_status_map();
    if let Some(extra) = ctx.settings.status_map(TASK_BACKEND) {
        statuses.merge(&extra);
    }
    let raw = report.status.to_string();
    let status = statuses.resolve(&raw)?;

    if ctx.json {
        let value = serde_json::json!({
            "task_id": task_id,
            "status": status,
            "raw_status": raw,
            "message": report.message,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let label = match status {
        TaskStatus::Success => status.to_string().green().bold(),
        TaskStatus::Failed => status.to_string().red().bold(),
        TaskStatus::Pending | TaskStatus::Running => status.to_string().yellow(),
    };
    println!("Task {}: {} ({})", task_id.to_string().cyan(), label, raw);
    if let Some(message) = report.message {
        println!("  {}", message);
    }
    Ok(())
}
