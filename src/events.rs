//! Event mentions: generation and conflict resolution.
//!
//! ```text
//! event pattern sets ──► generate.rs ──► EventMentionSet
//!   (per sentence)        MatchData::extract / check
//!                         role expansion, paired-actor location,
//!                         match-time tense (tense.rs)
//!                                            │
//!                                            ▼
//!                         pipeline.rs  (one pass after another)
//!                           propagate ─ replace ─ block ─ override x2
//!                           participant-override ─ contingent block
//!                           dedup (grouping.rs) ─ discard temporary
//!                           same-entity ─ tense ─ location ─ unbinarize
//!                                            │
//!                                            ▼
//!                                  final EventMentionSet
//! ```
//!
//! ## Shared state
//!
//! Passes read the document and the [`Catalog`] through a [`Context`] and
//! mutate two things only: the event mention set and, for paired-actor
//! assignment, the document's actor mentions. Later passes see what earlier
//! ones wrote; propagation runs before deduplication so that propagated
//! paired actors take part in the grouping keys.
//!
//! ## Responsibilities by module
//!
//! - `mention.rs`: [`EventMention`], [`EventMentionSet`], [`Tense`].
//! - `generate.rs`: from top-level matches to event mentions.
//! - `grouping.rs`: uniqueness keys, duplicate scores, participant ranking.
//! - `pipeline.rs`: the ordered passes and their pattern sets.
//! - `location.rs` / `unbinarize.rs`: the two optional passes.
//! - `tense.rs`: historicity heuristics used while generating.
//! - `metrics.rs`: per-stage timings and counts.

use crate::catalog::Catalog;
use crate::document::Document;

#[path = "events/generate.rs"]
mod generate;
#[path = "events/grouping.rs"]
mod grouping;
#[path = "events/location.rs"]
mod location;
#[path = "events/mention.rs"]
mod mention;
#[path = "events/metrics.rs"]
mod metrics;
#[path = "events/pipeline.rs"]
mod pipeline;
#[path = "events/tense.rs"]
mod tense;
#[path = "events/unbinarize.rs"]
mod unbinarize;


pub use generate::MatchData;
pub use mention::{EventMention, EventMentionId, EventMentionSet, Participant, Tense};
pub use metrics::{PassMetrics, RunMetrics};
pub use pipeline::{PassPatternSets, PipelineSettings};

pub(crate) use generate::{EventPatternRun, apply_event_patterns, paired_location_blocks};
pub(crate) use metrics::PassTimer;

/// Label logged for matches of patterns without an `(id ..)`.
pub const UNLABELED_PATTERN: &str = "UNLABELED_PATTERN";

/// Read-only inputs every pass shares.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub doc: &'a Document,
    pub catalog: &'a Catalog,
}

impl<'a> Context<'a> {
    pub fn new(doc: &'a Document, catalog: &'a Catalog) -> Self {
        Self { doc, catalog }
    }
}

pub(crate) use pipeline::run as run_pipeline;
