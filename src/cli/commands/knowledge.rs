//! Knowledge sources page.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use super::parse_key_values;
use crate::cli::id_resolver::resolve_id;
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::StudioContext;
use crate::domain::models::{EntityKind, KnowledgeSource, SourceType};

#[derive(Args, Debug)]
pub struct KnowledgeArgs {
    #[command(subcommand)]
    pub command: KnowledgeCommands,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeCommands {
    /// List knowledge sources
    List,
    /// Show knowledge source details
    Show {
        /// Knowledge source ID (or unique prefix)
        id: String,
    },
    /// Add a knowledge source
    Add {
        name: String,
        /// Source type (text, file, url, csv, excel, json, pdf, docling)
        #[arg(short = 't', long = "type", default_value = "text")]
        source_type: String,
        /// File path or URL for non-text sources
        #[arg(short, long)]
        path: Option<String>,
        /// Inline content for text sources
        #[arg(short, long)]
        content: Option<String>,
        #[arg(long)]
        chunk_size: Option<u32>,
        #[arg(long)]
        chunk_overlap: Option<u32>,
        /// Metadata entry (format: "key=value")
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },
    /// Update a knowledge source
    Update {
        /// Knowledge source ID (or unique prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        path: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
        #[arg(long)]
        chunk_size: Option<u32>,
        #[arg(long)]
        chunk_overlap: Option<u32>,
        /// Metadata entry to set (format: "key=value")
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },
    /// Delete a knowledge source nothing references
    Delete {
        /// Knowledge source ID (or unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct KnowledgeOutput {
    #[serde(flatten)]
    pub source: KnowledgeSource,
}

impl CommandOutput for KnowledgeOutput {
    fn to_human(&self) -> String {
        let s = &self.source;
        let mut lines = vec![
            format!("Knowledge source: {}", s.name),
            format!("  ID:       {}", s.id),
            format!("  Type:     {}", s.source_type.as_str()),
            format!("  Chunking: size {} / overlap {}", s.chunk_size, s.chunk_overlap),
        ];
        if let Some(path) = &s.source_path {
            lines.push(format!("  Path:     {path}"));
        }
        if let Some(content) = &s.content {
            lines.push(format!("  Content:  {} chars", content.chars().count()));
        }
        for (key, value) in &s.metadata {
            lines.push(format!("  {key}: {value}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct KnowledgeListOutput {
    pub sources: Vec<KnowledgeSource>,
    pub total: usize,
}

impl CommandOutput for KnowledgeListOutput {
    fn to_human(&self) -> String {
        if self.sources.is_empty() {
            return "No knowledge sources configured.".to_string();
        }
        format!(
            "{}\nShowing {} knowledge source(s)",
            TableFormatter::new().format_knowledge_sources(&self.sources),
            self.total
        )
    }
}

pub async fn execute(args: KnowledgeArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let sources = &ctx.repos.knowledge_sources;

    match args.command {
        KnowledgeCommands::List => {
            let list = sources.list().await?;
            output(
                &KnowledgeListOutput {
                    total: list.len(),
                    sources: list,
                },
                json_mode,
            );
        }

        KnowledgeCommands::Show { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::KnowledgeSource, &id).await?;
            let source = sources.get(id).await?;
            output(&KnowledgeOutput { source }, json_mode);
        }

        KnowledgeCommands::Add {
            name,
            source_type,
            path,
            content,
            chunk_size,
            chunk_overlap,
            metadata,
        } => {
            let source_type = SourceType::from_str(&source_type)
                .ok_or_else(|| anyhow!("Unknown knowledge source type '{source_type}'"))?;
            let mut source = KnowledgeSource::new(name, source_type);
            source.source_path = path;
            source.content = content;
            source.chunk_size = chunk_size.unwrap_or(source.chunk_size);
            source.chunk_overlap = chunk_overlap.unwrap_or(source.chunk_overlap);
            source.metadata = parse_key_values(&metadata)?;

            let id = sources.create(&source).await?;
            output(&ActionOutput::done(format!("Knowledge source created: {id}"), id), json_mode);
        }

        KnowledgeCommands::Update {
            id,
            name,
            path,
            content,
            chunk_size,
            chunk_overlap,
            metadata,
        } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::KnowledgeSource, &id).await?;
            let mut source = sources.get(id).await?;
            if let Some(name) = name {
                source.name = name;
            }
            if path.is_some() {
                source.source_path = path;
            }
            if content.is_some() {
                source.content = content;
            }
            source.chunk_size = chunk_size.unwrap_or(source.chunk_size);
            source.chunk_overlap = chunk_overlap.unwrap_or(source.chunk_overlap);
            source.metadata.extend(parse_key_values(&metadata)?);

            sources.update(&source).await?;
            output(&ActionOutput::done(format!("Knowledge source updated: {id}"), id), json_mode);
        }

        KnowledgeCommands::Delete { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::KnowledgeSource, &id).await?;
            sources.delete(id).await?;
            output(&ActionOutput::done(format!("Knowledge source deleted: {id}"), id), json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::Engine;
    use crate::domain::errors::StudioError;
    use crate::domain::models::Settings;

    #[tokio::test]
    async fn test_add_rejects_unknown_type() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let add = KnowledgeCommands::Add {
            name: "docs".to_string(),
            source_type: "carrier-pigeon".to_string(),
            path: None,
            content: None,
            chunk_size: None,
            chunk_overlap: None,
            metadata: vec![],
        };
        let err = execute(KnowledgeArgs { command: add }, &ctx, true).await.unwrap_err();
        assert!(err.to_string().contains("Unknown knowledge source type"));
    }

    #[tokio::test]
    async fn test_pdf_without_path_is_a_persistence_error() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let add = KnowledgeCommands::Add {
            name: "manual".to_string(),
            source_type: "pdf".to_string(),
            path: None,
            content: None,
            chunk_size: None,
            chunk_overlap: None,
            metadata: vec![],
        };
        let err = execute(KnowledgeArgs { command: add }, &ctx, true).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StudioError>(), Some(StudioError::Persistence(_))));
        assert!(ctx.repos.knowledge_sources.list().await.unwrap().is_empty());
    }
}
