#![doc = "thesis-refs-core: citation handling library for thesis-refs."]

//! This crate holds the reference logic of a thesis-writing assistant: citation
//! parsing, document and agent-output scanning, reconciliation against a
//! persisted reference set, document chunking, auto-save and the three-agent
//! analysis pipeline.
//!
//! It performs no network I/O itself. Storage and LLM agents are reached
//! through the traits in [`contract`]; the `thesis-refs` crate provides the
//! HTTP implementations and [`memory`] an in-process one.

pub mod agent_output;
pub mod analysis;
pub mod autosave;
pub mod chunk;
pub mod citation;
pub mod config;
pub mod contract;
pub mod export;
pub mod memory;
pub mod reconcile;
pub mod scan;
