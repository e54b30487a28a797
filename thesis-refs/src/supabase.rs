//! # Supabase persistence adapter
//!
//! Implements [`ReferenceStore`] and [`ChunkStore`] over the PostgREST
//! interface Supabase exposes at `{url}/rest/v1/{table}`.
//!
//! - Every request carries the project key both as `apikey` and as a bearer token.
//! - Filters use PostgREST operators (`user_id=eq.<owner>`), chunk reads
//!   are ordered with `order=chunk_index.asc`.
//! - The tables use Spanish column names. [`ReferenceRow`] and [`ChunkRow`]
//!   translate to and from the canonical core types; nothing outside this
//!   module sees a column name.
//!
//! Non-success statuses become a [`StoreError`] carrying status and body. No
//! retries, no timeout beyond reqwest's defaults.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thesis_refs_core::config::StoreConfig;
use thesis_refs_core::contract::{
    ChunkStore, DocumentChunk, Reference, ReferenceFilter, ReferencePatch, ReferenceStore,
    StoreError,
};
use tracing::{debug, error, info};

use crate::load_config::STORE_KEY_ENV;

/// Row of the references table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub autor: String,
    #[serde(default)]
    pub inicial: Option<String>,
    pub anio: String,
    pub titulo: String,
    #[serde(default)]
    pub fuente: Option<String>,
    #[serde(default)]
    pub doi_link: Option<String>,
    #[serde(default)]
    pub en_documento: bool,
    #[serde(default)]
    pub desde_agente: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReferenceRow {
    pub fn from_reference(owner_id: &str, reference: &Reference) -> Self {
        Self {
            // The database assigns ids; a parser-assigned id is not sent.
            id: None,
            user_id: owner_id.to_string(),
            autor: reference.author.clone(),
            inicial: reference.initials.clone(),
            anio: reference.year.clone(),
            titulo: reference.title.clone(),
            fuente: reference.source.clone(),
            doi_link: reference.doi_link.clone(),
            en_documento: reference.in_document,
            desde_agente: reference.from_agent,
            created_at: None,
        }
    }

    pub fn into_reference(self) -> Reference {
        let mut reference = Reference::new(self.autor, self.anio, self.titulo);
        reference.id = self.id;
        reference.initials = self.inicial;
        reference.source = self.fuente;
        reference.doi_link = self.doi_link;
        reference.in_document = self.en_documento;
        reference.from_agent = self.desde_agente;
        if let Some(created_at) = self.created_at {
            reference.created_at = created_at;
        }
        reference
    }
}

#[derive(Debug, Serialize)]
struct PatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    en_documento: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    desde_agente: Option<bool>,
}

impl From<&ReferencePatch> for PatchRow {
    fn from(patch: &ReferencePatch) -> Self {
        Self {
            en_documento: patch.in_document,
            desde_agente: patch.from_agent,
        }
    }
}

/// Row of the document chunks table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRow {
    pub user_id: String,
    pub chunk_index: usize,
    pub contenido: String,
}

/// PostgREST query pairs for a reference filter.
pub fn reference_query(filter: &ReferenceFilter) -> Vec<(String, String)> {
    let mut query = vec![
        ("select".to_string(), "*".to_string()),
        ("user_id".to_string(), format!("eq.{}", filter.owner_id)),
    ];
    if let Some(flag) = filter.in_document {
        query.push(("en_documento".to_string(), format!("eq.{flag}")));
    }
    query.push(("order".to_string(), "created_at.asc".to_string()));
    query
}

pub struct SupabaseClient {
    http: Client,
    rest_url: String,
    key: String,
    references_table: String,
    chunks_table: String,
}

impl SupabaseClient {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let key = config
            .api_key
            .clone()
            .ok_or_else(|| format!("{STORE_KEY_ENV} missing in environment"))?;
        let rest_url = format!("{}/rest/v1", config.url.trim_end_matches('/'));
        info!(rest_url = %rest_url, references_table = %config.references_table, "Initialized Supabase client");
        Ok(Self {
            http: Client::new(),
            rest_url,
            key,
            references_table: config.references_table.clone(),
            chunks_table: config.chunks_table.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn checked(response: Response, action: &str) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
        error!(status = %status, action, body = %body, "Supabase returned error");
        Err(format!("Supabase {action} failed with {status}: {body}").into())
    }
}

#[async_trait]
impl ReferenceStore for SupabaseClient {
    async fn select(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, &self.references_table)
            .query(&reference_query(filter))
            .send()
            .await?;
        let rows: Vec<ReferenceRow> = Self::checked(response, "select references").await?.json().await?;
        debug!(rows = rows.len(), owner_id = %filter.owner_id, "Selected references");
        Ok(rows.into_iter().map(ReferenceRow::into_reference).collect())
    }

    async fn insert(&self, owner_id: &str, reference: &Reference) -> Result<String, StoreError> {
        let row = ReferenceRow::from_reference(owner_id, reference);
        let response = self
            .request(reqwest::Method::POST, &self.references_table)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let created: Vec<ReferenceRow> = Self::checked(response, "insert reference").await?.json().await?;
        created
            .into_iter()
            .next()
            .and_then(|row| row.id)
            .ok_or_else(|| "Supabase insert returned no id".into())
    }

    async fn update(&self, id: &str, patch: &ReferencePatch) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::PATCH, &self.references_table)
            .query(&[("id", format!("eq.{id}"))])
            .json(&PatchRow::from(patch))
            .send()
            .await?;
        Self::checked(response, "update reference").await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, &self.references_table)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::checked(response, "delete reference").await?;
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for SupabaseClient {
    async fn select_ordered(&self, owner_id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, &self.chunks_table)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{owner_id}")),
                ("order", "chunk_index.asc".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<ChunkRow> = Self::checked(response, "select chunks").await?.json().await?;
        Ok(rows
            .into_iter()
            .map(|row| DocumentChunk {
                chunk_index: row.chunk_index,
                content: row.contenido,
            })
            .collect())
    }

    async fn replace_all(&self, owner_id: &str, chunks: &[DocumentChunk]) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, &self.chunks_table)
            .query(&[("user_id", format!("eq.{owner_id}"))])
            .send()
            .await?;
        Self::checked(response, "delete chunks").await?;

        if chunks.is_empty() {
            return Ok(());
        }
        let rows: Vec<ChunkRow> = chunks
            .iter()
            .map(|c| ChunkRow {
                user_id: owner_id.to_string(),
                chunk_index: c.chunk_index,
                contenido: c.content.clone(),
            })
            .collect();
        let response = self
            .request(reqwest::Method::POST, &self.chunks_table)
            .json(&rows)
            .send()
            .await?;
        Self::checked(response, "insert chunks").await?;
        Ok(())
    }
}
