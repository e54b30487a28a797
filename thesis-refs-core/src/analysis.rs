//! Three-agent document analysis.
//!
//! The structure, style and citation agents are called strictly one after
//! another. The citation agent is told which references are already stored,
//! and its reply is scanned for suggested references. Nothing is written to a
//! store here.

use tracing::{error, info};

use crate::agent_output::scan_agent_output;
use crate::citation::first_author_surname;
use crate::config::AgentsConfig;
use crate::contract::{Agent, AgentError, Reference};

/// Texts shorter than this (in characters, after trimming) are not analysed.
pub const MIN_ANALYSIS_CHARS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("text too short to analyse: {chars} characters, at least 50 required")]
    TooShort { chars: usize },
    #[error("{stage} agent failed: {source}")]
    Agent {
        stage: &'static str,
        #[source]
        source: AgentError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub structure: String,
    pub style: String,
    pub citations: String,
    /// References proposed by the citation agent, flagged `from_agent`.
    pub suggestions: Vec<Reference>,
}

/// `(Surname, Year), (Surname, Year)` or `Ninguna` when nothing is stored.
pub fn stored_citation_list(stored: &[Reference]) -> String {
    if stored.is_empty() {
        return "Ninguna".to_string();
    }
    stored
        .iter()
        .map(|r| format!("({}, {})", first_author_surname(&r.author), r.year))
        .collect::<Vec<_>>()
        .join(", ")
}

fn structure_prompt(text: &str) -> String {
    format!(
        "Revisa la estructura de esta tesis: indica si tiene introducción, objetivos y justificación, y propone dos mejoras concretas.\n\nTexto: \"{text}\""
    )
}

fn style_prompt(text: &str) -> String {
    format!(
        "Revisa gramática, estilo y claridad del texto y propone dos correcciones específicas.\n\nTexto: \"{text}\""
    )
}

fn citations_prompt(text: &str, stored: &[Reference]) -> String {
    format!(
        "Revisa las citas APA del texto:\n\
         1. Lista las citas en formato (Autor, Año).\n\
         2. Compáralas con las referencias guardadas: {}.\n\
         3. Indica cuáles faltan en la bibliografía.\n\
         4. Sugiere referencias en una tabla | # | Autor (Año) | Título | Fuente | DOI |.\n\n\
         Texto: \"{text}\"",
        stored_citation_list(stored)
    )
}

async fn run_stage<A>(
    agent: &A,
    stage: &'static str,
    flow_id: &str,
    prompt: &str,
    context: &str,
) -> Result<String, AnalysisError>
where
    A: Agent + ?Sized,
{
    info!(stage, flow_id, "[ANALYSIS] Agent activated");
    let reply = agent.invoke(flow_id, prompt, context).await.map_err(|source| {
        error!(stage, flow_id, error = %source, "[ANALYSIS][ERROR] Agent call failed");
        AnalysisError::Agent { stage, source }
    })?;
    info!(stage, reply_len = reply.len(), "[ANALYSIS] Agent replied");
    Ok(reply)
}

/// Run the three agents over `text` and collect their replies.
pub async fn analyze_document<A>(
    agent: &A,
    agents: &AgentsConfig,
    text: &str,
    stored: &[Reference],
) -> Result<AnalysisReport, AnalysisError>
where
    A: Agent + ?Sized,
{
    let text = text.trim();
    let chars = text.chars().count();
    if chars < MIN_ANALYSIS_CHARS {
        info!(chars, "[ANALYSIS] Text too short, skipping");
        return Err(AnalysisError::TooShort { chars });
    }

    let structure = run_stage(agent, "structure", &agents.structure_flow, &structure_prompt(text), "").await?;
    let style = run_stage(agent, "style", &agents.style_flow, &style_prompt(text), "").await?;
    let context = stored_citation_list(stored);
    let citations = run_stage(
        agent,
        "citations",
        &agents.citations_flow,
        &citations_prompt(text, stored),
        &context,
    )
    .await?;

    let suggestions = scan_agent_output(&citations);
    info!(suggestions = suggestions.len(), "[ANALYSIS] Analysis complete");
    Ok(AnalysisReport {
        structure,
        style,
        citations,
        suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_list_uses_first_surname() {
        let refs = [
            Reference::new("García, R. y López, M.", "2021", "A"),
            Reference::new("Pérez", "2019", "B"),
        ];
        assert_eq!(stored_citation_list(&refs), "(García, 2021), (Pérez, 2019)");
        assert_eq!(stored_citation_list(&[]), "Ninguna");
    }

    #[test]
    fn citation_prompt_embeds_text_and_stored_refs() {
        let prompt = citations_prompt("Mi texto", &[Reference::new("Pérez", "2019", "B")]);
        assert!(prompt.contains("(Pérez, 2019)"));
        assert!(prompt.contains("Texto: \"Mi texto\""));
    }
}
