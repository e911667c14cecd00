//! Plain-text rendering of the console view.

use skywatch_core::{
    anchor_id, AnchorSurface, ConsoleView, Job, JobRowView, OrchestratorStats, ScrollBehavior,
    StreamPhase,
};

/// Most recent log lines shown by `watch`.
const LOG_TAIL: usize = 15;

struct Section {
    anchor: String,
    title: String,
    lines: Vec<String>,
}

/// A terminal page made of titled sections, one per panel.
///
/// Revealing a section moves it to the top of the next render.
#[derive(Default)]
pub struct Screen {
    sections: Vec<Section>,
    focus: Option<String>,
}

impl Screen {
    pub fn push_section(&mut self, title: &str, lines: Vec<String>) {
        self.sections.push(Section {
            anchor: anchor_id(title),
            title: title.to_string(),
            lines,
        });
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn render(&self) -> String {
        let focused = self
            .sections
            .iter()
            .filter(|section| Some(section.anchor.as_str()) == self.focus());
        let rest = self
            .sections
            .iter()
            .filter(|section| Some(section.anchor.as_str()) != self.focus());

        let mut out = String::new();
        for section in focused.chain(rest) {
            out.push_str(&format!("== {} ==\n", section.title));
            for line in &section.lines {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

impl AnchorSurface for Screen {
    fn has_anchor(&self, id: &str) -> bool {
        self.sections.iter().any(|section| section.anchor == id)
    }

    fn scroll_into_view(&mut self, id: &str, _behavior: ScrollBehavior) {
        self.focus = Some(id.to_string());
    }
}

pub fn console_screen(view: &ConsoleView) -> Screen {
    let mut screen = Screen::default();
    screen.push_section("Overview", overview_lines(view));
    screen.push_section("Jobs", job_rows(&view.jobs));
    screen.push_section("Logs", log_lines(view));
    screen
}

fn overview_lines(view: &ConsoleView) -> Vec<String> {
    let mut lines = vec![stats_line(view.stats.as_ref())];
    if let Some(existing) = &view.conflict {
        lines.push(format!(
            "duplicate job already running: {existing} (select it to attach)"
        ));
    }
    let errors = &view.errors;
    for (label, error) in [
        ("submit", &errors.submit),
        ("refresh", &errors.refresh),
        ("cancel", &errors.cancel),
        ("clear", &errors.clear),
        ("stats", &errors.stats),
    ] {
        if let Some(error) = error {
            lines.push(format!("{label} failed: {error}"));
        }
    }
    lines
}

pub fn stats_line(stats: Option<&OrchestratorStats>) -> String {
    match stats {
        Some(stats) => format!(
            "queue {} | running {} | concurrency {}",
            stats.queue_depth,
            stats.running.len(),
            stats.concurrency
        ),
        None => "queue - | running - | concurrency -".to_string(),
    }
}

pub fn job_rows(rows: &[JobRowView]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["(no jobs)".to_string()];
    }
    rows.iter()
        .map(|row| {
            let marker = match (row.attached, row.executing) {
                (true, _) => '>',
                (false, true) => '*',
                (false, false) => ' ',
            };
            row_line(
                marker,
                &row.job_id,
                row.job_type.as_str(),
                row.state.as_str(),
                row.note.as_deref(),
            )
        })
        .collect()
}

/// Table for a raw job list, newest first as the backend returns it.
pub fn job_list(jobs: &[Job]) -> Vec<String> {
    if jobs.is_empty() {
        return vec!["(no jobs)".to_string()];
    }
    jobs.iter()
        .map(|job| {
            row_line(
                ' ',
                &job.job_id,
                job.job_type.as_str(),
                job.state.as_str(),
                job.note.as_deref().or(job.error.as_deref()),
            )
        })
        .collect()
}

fn row_line(marker: char, job_id: &str, job_type: &str, state: &str, note: Option<&str>) -> String {
    let line = format!("{marker} {job_id:<12} {job_type:<24} {state:<10}");
    match note {
        Some(note) if !note.is_empty() => format!("{line} {note}"),
        _ => line.trim_end().to_string(),
    }
}

fn log_lines(view: &ConsoleView) -> Vec<String> {
    let stream = &view.stream;
    let Some(job_id) = stream.job_id.as_deref() else {
        return vec!["(no job attached)".to_string()];
    };
    let mut lines = vec![format!(
        "{job_id} [{}] {} lines received",
        phase_label(stream.phase),
        stream.received
    )];
    let skip = stream.lines.len().saturating_sub(LOG_TAIL);
    lines.extend(stream.lines.iter().skip(skip).map(|line| line.text.clone()));
    lines
}

pub fn phase_label(phase: StreamPhase) -> &'static str {
    match phase {
        StreamPhase::Disconnected => "disconnected",
        StreamPhase::Connecting => "connecting",
        StreamPhase::Streaming => "streaming",
        StreamPhase::Closed => "closed",
    }
}
