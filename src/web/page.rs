//! Server-rendered dashboard.

use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;
use uuid::Uuid;

use super::api::SharedState;
use crate::jobs::JobSnapshot;
use crate::results::RunResult;
use crate::roadmap::RoadmapPhase;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub job: Option<String>,
}

/// Everything the dashboard shows.
#[derive(Debug)]
pub struct DashboardView {
    pub phases: Result<Vec<RoadmapPhase>, String>,
    pub completed: Vec<String>,
    pub last_run: Option<RunResult>,
    pub job: Option<JobFlash>,
}

#[derive(Debug)]
pub enum JobFlash {
    Known(JobSnapshot),
    Unknown(String),
}

pub async fn dashboard(
    State(state): State<SharedState>,
    Query(query): Query<DashboardQuery>,
) -> Html<String> {
    let job = query.job.map(|raw| {
        match Uuid::parse_str(&raw).ok().and_then(|id| state.queue.get(id)) {
            Some(snapshot) => JobFlash::Known(snapshot),
            None => JobFlash::Unknown(raw),
        }
    });
    let view = DashboardView {
        phases: state
            .roadmap
            .read_phases_async()
            .await
            .map_err(|e| e.to_string()),
        completed: state.status.load_async().await.to_vec(),
        last_run: state.last_run.load_async().await,
        job,
    };
    Html(render_dashboard(&view))
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn render_flash(job: &JobFlash) -> String {
    match job {
        JobFlash::Known(snapshot) => {
            let poll = if snapshot.state.is_finished() {
                String::new()
            } else {
                format!(
                    "<script>\n\
                     (function poll() {{\n\
                       fetch('/api/jobs/{id}').then(r => r.json()).then(job => {{\n\
                         document.getElementById('job-state').textContent = job.state + ': ' + job.status;\n\
                         if (job.state === 'done' || job.state === 'failed') {{ location.href = '/'; }}\n\
                         else {{ setTimeout(poll, 3000); }}\n\
                       }}).catch(() => setTimeout(poll, 5000));\n\
                     }})();\n\
                     </script>",
                    id = snapshot.id
                )
            };
            format!(
                "<div class=\"flash\">Job <code>{id}</code> submitted. \
                 <span id=\"job-state\">{state}: {status}</span></div>{poll}",
                id = snapshot.id,
                state = snapshot.state.as_str(),
                status = escape_html(&snapshot.status),
                poll = poll,
            )
        }
        JobFlash::Unknown(raw) => format!(
            "<div class=\"flash error\">Job <code>{}</code> is unknown or has expired.</div>",
            escape_html(raw)
        ),
    }
}

fn render_phases(phases: &Result<Vec<RoadmapPhase>, String>, completed: &[String]) -> String {
    match phases {
        Err(err) => format!("<p class=\"error\">{}</p>", escape_html(err)),
        Ok(phases) if phases.is_empty() => {
            "<p>No phases found in the roadmap document.</p>".to_string()
        }
        Ok(phases) => {
            let items: String = phases
                .iter()
                .enumerate()
                .map(|(pos, phase)| {
                    let done = if completed.iter().any(|c| c == &phase.name) {
                        " <span class=\"done\">(completed)</span>"
                    } else {
                        ""
                    };
                    format!(
                        "<li><strong>{}</strong>. {}{}</li>",
                        pos + 1,
                        escape_html(&phase.name),
                        done
                    )
                })
                .collect();
            format!("<ol class=\"phases\">{}</ol>", items)
        }
    }
}

fn render_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("<p>{}</p>", empty);
    }
    let lis: String = items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect();
    format!("<ul>{}</ul>", lis)
}

fn render_text_block(title: &str, text: Option<&str>) -> String {
    match text {
        Some(text) => format!(
            "<h3>{}</h3><pre>{}</pre>",
            title,
            escape_html(text)
        ),
        None => String::new(),
    }
}

fn render_last_run(last_run: Option<&RunResult>) -> String {
    let Some(run) = last_run else {
        return "<p>No runs yet.</p>".to_string();
    };
    let mut html = String::new();
    if let Some(finished) = run.finished_at {
        html.push_str(&format!(
            "<p class=\"meta\">Finished {}</p>",
            finished.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if let Some(err) = &run.error {
        html.push_str(&format!("<p class=\"error\">{}</p>", escape_html(err)));
    }
    html.push_str("<h3>Newly completed</h3>");
    html.push_str(&render_list(&run.newly_completed_items, "Nothing new."));
    html.push_str(&render_text_block("Plan", run.planning_result.as_deref()));
    html.push_str(&render_text_block(
        "Development",
        run.development_result.as_deref(),
    ));
    html
}

pub fn render_dashboard(view: &DashboardView) -> String {
    let flash = view.job.as_ref().map(render_flash).unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>roadcrew</title>\n<style>\n\
         body {{ font-family: system-ui, sans-serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; }}\n\
         pre {{ background: #f4f4f4; padding: 1rem; overflow-x: auto; white-space: pre-wrap; }}\n\
         .flash {{ background: #e8f4ff; border: 1px solid #9cc9f5; padding: .75rem; margin-bottom: 1rem; }}\n\
         .error {{ color: #a40000; }}\n.done {{ color: #2a7a2a; }}\n.meta {{ color: #666; }}\n\
         textarea {{ width: 100%; min-height: 4rem; }}\n\
         </style>\n</head>\n<body>\n\
         <h1>roadcrew</h1>\n{flash}\n\
         <section>\n<h2>Roadmap phases</h2>\n{phases}\n</section>\n\
         <section>\n<h2>Start a run</h2>\n\
         <form method=\"post\" action=\"/runs\">\n\
         <label for=\"user_input\">Phase numbers (e.g. <code>1,2</code>) or an instruction</label>\n\
         <textarea id=\"user_input\" name=\"user_input\" required></textarea>\n\
         <label for=\"mode\">Interpret as</label>\n\
         <select id=\"mode\" name=\"mode\">\n\
         <option value=\"auto\">auto</option>\n\
         <option value=\"phases\">phase numbers</option>\n\
         <option value=\"instruction\">instruction</option>\n\
         </select>\n<button type=\"submit\">Run</button>\n</form>\n</section>\n\
         <section>\n<h2>Completed items</h2>\n{completed}\n</section>\n\
         <section>\n<h2>Last run</h2>\n{last_run}\n</section>\n\
         </body>\n</html>\n",
        flash = flash,
        phases = render_phases(&view.phases, &view.completed),
        completed = render_list(&view.completed, "Nothing completed yet."),
        last_run = render_last_run(view.last_run.as_ref()),
    )
}
