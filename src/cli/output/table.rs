//! Table output formatting for CLI commands
//!
//! Provides formatted table output for every studio page using comfy-table.
//! Supports color-coded cells, automatic column sizing, and plain-text
//! fallbacks when colors are off.

use std::collections::{BTreeMap, HashMap};
use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use uuid::Uuid;

use super::{short_id, truncate};
use crate::domain::models::{Agent, Crew, CrewResult, KnowledgeSource, Process, Task, Tool};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self { use_colors, max_width }
    }

    /// Tools with their enabled flag. Tools without a saved state count as enabled.
    pub fn format_tools(&self, tools: &[Tool], states: &BTreeMap<String, bool>) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Name", "Description", "Parameters", "Enabled"]));

        for tool in tools {
            let enabled = states.get(&tool.name).copied().unwrap_or(true);
            table.add_row(vec![
                Cell::new(short_id(&tool.id)),
                Cell::new(&tool.name),
                Cell::new(truncate(&tool.description, 40)),
                Cell::new(tool.parameters.len()),
                self.flag_cell(enabled),
            ]);
        }
        table.to_string()
    }

    pub fn format_knowledge_sources(&self, sources: &[KnowledgeSource]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Name", "Type", "Location", "Chunking"]));

        for source in sources {
            let location = source
                .source_path
                .as_deref()
                .map_or_else(|| "(inline)".to_string(), |p| truncate(p, 32));
            table.add_row(vec![
                Cell::new(short_id(&source.id)),
                Cell::new(&source.name),
                Cell::new(source.source_type.as_str()),
                Cell::new(location),
                Cell::new(format!("{}/{}", source.chunk_size, source.chunk_overlap)),
            ]);
        }
        table.to_string()
    }

    pub fn format_agents(&self, agents: &[Agent]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Role", "Goal", "LLM", "Temp", "Tools"]));

        for agent in agents {
            table.add_row(vec![
                Cell::new(short_id(&agent.id)),
                Cell::new(&agent.role),
                Cell::new(truncate(&agent.goal, 32)),
                Cell::new(&agent.llm_provider_model),
                Cell::new(format!("{:.2}", agent.temperature)),
                Cell::new(agent.tool_ids.len()),
            ]);
        }
        table.to_string()
    }

    /// Tasks with the role of their assigned agent, looked up in `agent_roles`.
    pub fn format_tasks(&self, tasks: &[Task], agent_roles: &HashMap<Uuid, String>) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Description", "Agent", "Async", "Context"]));

        for task in tasks {
            let agent = task
                .agent_id
                .and_then(|id| agent_roles.get(&id).cloned())
                .unwrap_or_else(|| "-".to_string());
            let agent_cell = if self.use_colors && task.agent_id.is_none() {
                Cell::new(agent).fg(Color::Yellow)
            } else {
                Cell::new(agent)
            };
            table.add_row(vec![
                Cell::new(short_id(&task.id)),
                Cell::new(truncate(&task.description, 40)),
                agent_cell,
                self.flag_cell(task.async_execution),
                Cell::new(task.context_task_ids().count()),
            ]);
        }
        table.to_string()
    }

    pub fn format_crews(&self, crews: &[Crew]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Name", "Process", "Agents", "Tasks", "Memory"]));

        for crew in crews {
            let process_cell = if self.use_colors {
                Cell::new(crew.process.as_str()).fg(process_color(crew.process))
            } else {
                Cell::new(crew.process.as_str())
            };
            table.add_row(vec![
                Cell::new(short_id(&crew.id)),
                Cell::new(&crew.name),
                process_cell,
                Cell::new(crew.agent_ids.len()),
                Cell::new(crew.task_ids.len()),
                self.flag_cell(crew.memory),
            ]);
        }
        table.to_string()
    }

    pub fn format_results(&self, results: &[CrewResult]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Crew", "Created", "Output"]));

        for result in results {
            let crew = if result.crew_id.is_some() {
                Cell::new(&result.crew_name)
            } else if self.use_colors {
                Cell::new(format!("{} (deleted)", result.crew_name)).fg(Color::DarkGrey)
            } else {
                Cell::new(format!("{} (deleted)", result.crew_name))
            };
            let output = result
                .raw_output()
                .map_or_else(|| result.result.to_string(), str::to_string);
            table.add_row(vec![
                Cell::new(short_id(&result.id)),
                crew,
                Cell::new(result.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(truncate(&output, 48)),
            ]);
        }
        table.to_string()
    }

    fn flag_cell(&self, on: bool) -> Cell {
        match (self.use_colors, on) {
            (true, true) => Cell::new("yes").fg(Color::Green),
            (true, false) => Cell::new("no").fg(Color::DarkGrey),
            (false, true) => Cell::new("✓ yes"),
            (false, false) => Cell::new("✗ no"),
        }
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

const fn process_color(process: Process) -> Color {
    match process {
        Process::Sequential => Color::Cyan,
        Process::Hierarchical => Color::Magenta,
    }
}
