//! Prompt builders for the planning, development and status-report calls.

use super::RunContext;
use crate::tasks::WorkItem;

fn completed_list(ctx: &RunContext) -> String {
    if ctx.completed.is_empty() {
        "nothing has been completed yet".to_string()
    } else {
        serde_json::to_string(&ctx.completed).unwrap_or_else(|_| ctx.completed.join(", "))
    }
}

fn push_document(prompt: &mut String, title: &str, body: Option<&str>) {
    if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
        prompt.push_str(&format!("\n## {}\n\n{}\n", title, body.trim()));
    }
}

fn project_documents(ctx: &RunContext) -> String {
    let mut section = String::from("\n# Project documents\n");
    push_document(&mut section, "Technologies and roadmap", Some(&ctx.docs.roadmap));
    push_document(&mut section, "System flow", ctx.docs.system_flow.as_deref());
    push_document(&mut section, "Entity-relationship spec", ctx.docs.der.as_deref());
    section
}

pub fn planning_prompt(instruction: &str, ctx: &RunContext) -> String {
    format!(
        "Based on the requirements and the current project status, write a detailed \
         development plan.\n\n\
         User request: '{instruction}'\n\
         Current project status: {status}\n\n\
         The plan must be pragmatic, modular and iterative. Identify clear next steps and the \
         phases involved, taking into account what is already done. Include specific sub-tasks \
         for each phase where useful and explain how they fit into overall progress.\n\n\
         Expected output: a detailed development plan broken into steps and sub-tasks.\n{docs}",
        instruction = instruction,
        status = completed_list(ctx),
        docs = project_documents(ctx),
    )
}

/// Prompt for one development work item; `previous` holds outputs of earlier items.
pub fn work_item_prompt(item: WorkItem, previous: &[(WorkItem, String)], ctx: &RunContext) -> String {
    let mut prompt = format!(
        "# Task: {title}\n\n{description}\n\n\
         Stay aligned with what is already done: {status}\n\n\
         Expected output: {expected}\n",
        title = item.title(),
        description = item.description(),
        status = completed_list(ctx),
        expected = item.expected_output(),
    );
    if !previous.is_empty() {
        prompt.push_str("\n# Output of earlier tasks in this run\n");
        for (done, output) in previous {
            prompt.push_str(&format!("\n## {}\n\n{}\n", done.title(), output.trim()));
        }
    }
    prompt.push_str(&project_documents(ctx));
    prompt
}

pub fn status_report_prompt(planning: &str, development: &str, ctx: &RunContext) -> String {
    format!(
        "Review the latest planning and development results and decide which roadmap items \
         are now COMPLETE. Use the roadmap below as the reference for phase and sub-task \
         names.\n\n\
         Plan produced: {planning}\n\n\
         Development results: {development}\n\n\
         Previous status: {status}\n\n\
         Your answer MUST be a JSON array of strings holding ONLY the EXACT names of roadmap \
         phases or tasks that were definitely completed, or the EXACT names of new artifacts or \
         documents produced. Output nothing except the JSON array. \
         Example: [\"Phase 1: Discovery and Design\", \"ER analysis\"]\n{docs}",
        planning = planning.trim(),
        development = development.trim(),
        status = completed_list(ctx),
        docs = project_documents(ctx),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ProjectDocs;

    fn ctx() -> RunContext {
        RunContext {
            completed: vec!["Phase 1: Discovery and Design".into()],
            docs: ProjectDocs {
                roadmap: "## Phase 1: Discovery and Design".into(),
                system_flow: None,
                der: Some("users 1-n messages".into()),
            },
        }
    }

    #[test]
    fn test_planning_prompt_includes_request_status_and_docs() {
        let prompt = planning_prompt("Build chat", &ctx());
        assert!(prompt.contains("User request: 'Build chat'"));
        assert!(prompt.contains(r#"["Phase 1: Discovery and Design"]"#));
        assert!(prompt.contains("## Entity-relationship spec"));
        assert!(!prompt.contains("## System flow"));
    }

    #[test]
    fn test_empty_status_is_spelled_out() {
        let prompt = planning_prompt("x", &RunContext::default());
        assert!(prompt.contains("nothing has been completed yet"));
    }

    #[test]
    fn test_work_item_prompt_feeds_earlier_outputs_forward() {
        let previous = vec![(WorkItem::AnalyzeRequirements, "requirements summary".to_string())];
        let prompt = work_item_prompt(WorkItem::DesignArchitecture, &previous, &ctx());
        assert!(prompt.starts_with("# Task: Architecture and database schema design"));
        assert!(prompt.contains("## Requirements and ER analysis\n\nrequirements summary"));
    }

    #[test]
    fn test_status_report_prompt_demands_json_array() {
        let prompt = status_report_prompt("plan", "code", &ctx());
        assert!(prompt.contains("JSON array of strings"));
        assert!(prompt.contains("Plan produced: plan"));
    }
}
