//! Langflow agent client.
//!
//! Each agent is a Langflow flow run through
//! `POST {base_url}/api/v1/run/{flow_id}?stream=false`. The stored-reference
//! context, when present, is appended to the prompt.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thesis_refs_core::config::AgentsConfig;
use thesis_refs_core::contract::{Agent, AgentError};
use tracing::{debug, error, info};

use crate::load_config::AGENT_TOKEN_ENV;

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input_value: &'a str,
    input_type: &'static str,
    output_type: &'static str,
}

/// Reply text of a Langflow run response.
///
/// Flows nest their chat output either under
/// `outputs[0].outputs[0].results.message.text` or one level higher.
pub fn extract_message_text(response: &Value) -> Option<String> {
    let first = response.get("outputs")?.get(0)?;
    let message = first
        .pointer("/outputs/0/results/message/text")
        .or_else(|| first.pointer("/results/message/text"))?;
    message
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Map a non-success status to its error.
pub fn status_error(status: StatusCode, body: String) -> AgentError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AgentError::RateLimited
    } else if status.is_server_error() {
        AgentError::ServerFault {
            status: status.as_u16(),
            body,
        }
    } else {
        AgentError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

fn input_value(prompt: &str, context: &str) -> String {
    if context.trim().is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nReferencias guardadas: {context}")
    }
}

pub struct LangflowClient {
    http: Client,
    base_url: String,
    token: String,
}

impl LangflowClient {
    pub fn new(config: &AgentsConfig) -> Result<Self, AgentError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| AgentError::Transport(format!("{AGENT_TOKEN_ENV} missing in environment")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Initialized Langflow client");
        Ok(Self {
            http: Client::new(),
            base_url,
            token,
        })
    }
}

#[async_trait]
impl Agent for LangflowClient {
    async fn invoke(&self, agent_id: &str, prompt: &str, context: &str) -> Result<String, AgentError> {
        let url = format!("{}/api/v1/run/{}?stream=false", self.base_url, agent_id);
        let input = input_value(prompt, context);
        debug!(url = %url, input_len = input.len(), "Calling Langflow flow");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&RunRequest {
                input_value: &input,
                input_type: "chat",
                output_type: "chat",
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "Langflow request failed");
                AgentError::Transport(e.to_string())
            })?;

        let status = response.status();
        info!(status = %status, flow_id = agent_id, "Langflow responded");
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            error!(status = %status, flow_id = agent_id, body = %body, "Langflow returned error");
            return Err(status_error(status, body));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        extract_message_text(&json).ok_or(AgentError::EmptyResponse)
    }
}
