//! # Portal Core
//!
//! Business logic for the portal narration service: the two-phase
//! narrate-then-evaluate pipeline, its wire framing, and the collaborators
//! the server exposes next to it.
//!
//! ## Architecture
//!
//! - `narration/` - Generator, evaluator, pipeline state machine, stream framing
//! - `llm/` - OpenAI-compatible chat client (streaming and structured output)
//! - `models` - Centralized LLM provider configuration
//! - `config` - Persisted portal configuration
//! - `notes/` - SQLite-backed character notes
//! - `catalog/` - GraphQL client for locations and characters
//! - `search/` - Embeddings and the vector index
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portal_core::narration::{LocationDescriptor, NarrationPipeline};
//! use portal_core::models::ModelConfig;
//!
//! let pipeline = NarrationPipeline::from_models(
//!     &ModelConfig::default(),
//!     &ModelConfig::evaluator_default(),
//! )?;
//! let mut handle = pipeline.spawn(LocationDescriptor::new("Earth (C-137)", "Planet", vec![]));
//! while let Some(event) = handle.events.recv().await {
//!     // FramedEvent::TextFragment(..) then FramedEvent::Evaluation(..)
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod llm;
pub mod models;
pub mod narration;
pub mod notes;
pub mod search;
