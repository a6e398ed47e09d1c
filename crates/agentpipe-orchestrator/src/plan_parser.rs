use agentpipe_core::{AgentRole, Task};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, warn};

/// Header of the only machine-read section.
pub const MODULES_HEADER: &str = "## Modules and Files";

/// Sections every architecture plan is expected to carry.
pub const REQUIRED_SECTIONS: [&str; 4] = [
    MODULES_HEADER,
    "## Dependencies Between Modules",
    "## Key Classes and Functions",
    "## Suggested File Structure",
];

static MODULE_LINE: OnceLock<Option<Regex>> = OnceLock::new();

fn module_line() -> Option<&'static Regex> {
    MODULE_LINE
        .get_or_init(|| Regex::new(r"^- ([A-Za-z0-9_]+\.py): (.+)").ok())
        .as_ref()
}

/// Required headers absent from `text`, in declaration order.
pub fn missing_sections(text: &str) -> Vec<&'static str> {
    REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|header| !text.lines().any(|line| line.trim_end().starts_with(header)))
        .collect()
}

/// Derive a coding task and its paired testing task for every
/// `- module.py: description` line of the Modules and Files section.
///
/// The section runs from its header to the next line starting with `##`, or
/// to the end of the document. Only lines beginning with `-` are considered;
/// lines that do not match are dropped. A plan without the section yields
/// no tasks.
pub fn parse_plan(text: &str) -> Vec<Task> {
    for header in missing_sections(text) {
        warn!(section = header, "Architecture plan is missing a section");
    }

    let Some(pattern) = module_line() else {
        error!("Module line pattern failed to compile");
        return Vec::new();
    };

    let mut lines = text.lines();
    if !lines
        .by_ref()
        .any(|line| line.trim_end().starts_with(MODULES_HEADER))
    {
        return Vec::new();
    }

    let mut tasks = Vec::new();
    for line in lines.take_while(|line| !line.starts_with("##")) {
        if !line.starts_with('-') {
            continue;
        }
        let Some(caps) = pattern.captures(line.trim_end()) else {
            debug!(line, "Skipping plan line that is not a module entry");
            continue;
        };
        let module = &caps[1];
        let summary = caps[2].trim();

        tasks.push(
            Task::new(AgentRole::Coder, format!("Implement {module}: {summary}")).with_output(module),
        );
        tasks.push(
            Task::new(AgentRole::Tester, format!("Write tests for {module}"))
                .with_input(module)
                .with_output(format!("test_{module}")),
        );
    }
    tasks
}

/// Read and parse the plan at `path`. An unreadable file yields no tasks.
pub fn parse_plan_file(path: &Path) -> Vec<Task> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let tasks = parse_plan(&text);
            debug!(path = %path.display(), tasks = tasks.len(), "Architecture plan parsed");
            tasks
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read architecture plan");
            Vec::new()
        }
    }
}
