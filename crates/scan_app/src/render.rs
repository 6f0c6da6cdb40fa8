use scan_core::{JobRowView, JobStatus, TrackerViewModel};

pub fn render(view: &TrackerViewModel) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", view.banner())];
    lines.extend(view.jobs.iter().map(render_row));
    if let Some(rejection) = &view.last_rejection {
        lines.push(format!("! {rejection}"));
    }
    lines
}

pub fn render_row(row: &JobRowView) -> String {
    let mut line = format!(
        "{}  {:<8} {:<9} {:>3}%  {}",
        row.job_id,
        row.kind.as_str(),
        row.status.as_str(),
        row.percent,
        row.subject_label
    );
    let detail = match (&row.result_summary, row.message.is_empty()) {
        (Some(summary), _) if row.status == JobStatus::Complete => Some(summary.as_str()),
        (_, false) => Some(row.message.as_str()),
        _ => None,
    };
    if let Some(detail) = detail {
        line.push_str("  - ");
        line.push_str(detail);
    }
    if row.cancelling {
        line.push_str("  (cancelling)");
    }
    if row.display_only {
        line.push_str("  [restored]");
    }
    line
}

/// Everything except the animated percentages, so redraws only happen
/// when something a reader cares about has changed.
pub fn signature(view: &TrackerViewModel) -> String {
    let mut out = view.banner();
    for row in &view.jobs {
        out.push('|');
        out.push_str(row.job_id.as_str());
        out.push(':');
        out.push_str(row.status.as_str());
        if row.cancelling {
            out.push('*');
        }
    }
    if let Some(rejection) = &view.last_rejection {
        out.push('!');
        out.push_str(&rejection.to_string());
    }
    out
}
