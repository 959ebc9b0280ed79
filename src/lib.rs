//! Rule-based event coding.
//!
//! Takes a linguistically annotated document (sentences, entity mentions,
//! propositions, actor mentions) and produces event mentions: a CAMEO-style
//! event code plus the actor mentions filling its roles.
//!
//! ```text
//! config.json ──► Config ──► EventFinder::from_config
//!                               │  EventTypeRegistry (catalog.rs)
//!                               │  ActorInfo         (actors.rs)
//!                               │  PatternSet per manifest line (pattern.rs)
//!                               ▼
//! Document ───────────────► EventFinder::run
//!                               │  match event patterns (matcher.rs)
//!                               │  generate EventMentions (events/generate.rs)
//!                               │  pipeline passes (events/pipeline.rs)
//!                               ▼
//!                           FinderRun { events, actors, metrics }
//! ```
//!
//! Everything loaded once (catalogs, pattern sets) is immutable and shared by
//! reference; everything per document lives in the [`FinderRun`].

#[macro_use]
mod macros;

mod api;
mod error;

pub mod actors;
pub mod catalog;
pub mod config;
pub mod document;
pub mod events;
pub mod matcher;
pub mod pattern;
pub mod sexp;

#[cfg(test)]
mod testutil;

pub use actors::{ActorInfo, ActorMention, ActorMentionId, ActorMentionSet};
pub use api::{EventFinder, FinderRun};
pub use catalog::{Catalog, EventType, EventTypeId, EventTypeRegistry};
pub use config::{Config, Uniqueness};
pub use document::{Document, MentionId};
pub use error::{Error, Result};
pub use events::{EventMention, EventMentionId, EventMentionSet, PassMetrics, RunMetrics, Tense};
pub use pattern::PatternSet;
