//! Landing page: what is configured and which crews are ready to run.

use anyhow::{Context, Result};

use crate::cli::output::{output, CommandOutput};
use crate::cli::StudioContext;
use crate::domain::models::LoadedEntities;
use crate::services::load_all_entities;

#[derive(Debug, serde::Serialize)]
pub struct CrewReadiness {
    pub id: String,
    pub name: String,
    pub issues: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct OverviewOutput {
    pub tools: usize,
    pub disabled_tools: Vec<String>,
    pub knowledge_sources: usize,
    pub agents: usize,
    pub tasks: usize,
    pub crews: usize,
    pub results: usize,
    pub crews_not_ready: Vec<CrewReadiness>,
}

impl OverviewOutput {
    pub fn from_snapshot(snapshot: &LoadedEntities) -> Self {
        let disabled_tools = snapshot
            .tools
            .iter()
            .filter(|t| !snapshot.is_tool_enabled(&t.name))
            .map(|t| t.name.clone())
            .collect();
        let crews_not_ready = snapshot
            .crews
            .iter()
            .filter_map(|crew| {
                let issues = crew.readiness_issues();
                (!issues.is_empty()).then(|| CrewReadiness {
                    id: crew.id().to_string(),
                    name: crew.crew.name.clone(),
                    issues,
                })
            })
            .collect();

        Self {
            tools: snapshot.tools.len(),
            disabled_tools,
            knowledge_sources: snapshot.knowledge_sources.len(),
            agents: snapshot.agents.len(),
            tasks: snapshot.tasks.len(),
            crews: snapshot.crews.len(),
            results: snapshot.results.len(),
            crews_not_ready,
        }
    }
}

impl CommandOutput for OverviewOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            "CrewAI Studio".to_string(),
            format!("  Crews:             {}", self.crews),
            format!("  Agents:            {}", self.agents),
            format!("  Tasks:             {}", self.tasks),
            format!("  Tools:             {}", self.tools),
            format!("  Knowledge sources: {}", self.knowledge_sources),
            format!("  Results:           {}", self.results),
        ];
        if !self.disabled_tools.is_empty() {
            lines.push(format!("\nDisabled tools: {}", self.disabled_tools.join(", ")));
        }
        if !self.crews_not_ready.is_empty() {
            lines.push("\nCrews not ready to run:".to_string());
            for crew in &self.crews_not_ready {
                lines.push(format!("  {} ({})", crew.name, &crew.id[..8]));
                for issue in &crew.issues {
                    lines.push(format!("    - {issue}"));
                }
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let snapshot = load_all_entities(&ctx.repos)
        .await
        .context("Failed to load studio configuration")?;
    output(&OverviewOutput::from_snapshot(&snapshot), json_mode);
    Ok(())
}
