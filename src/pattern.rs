//! Pattern language.
//!
//! Patterns are authored as s-expressions, compiled into a tree stored in an
//! arena, and matched by [`crate::matcher`] against a document.
//!
//! ```text
//! pattern file ── sexp::parse_one ──▶ Sexp
//!                                      │
//!                                      ▼
//!                      PatternSet::parse (set.rs)
//!                        - word sets, entity label names
//!                        - reference patterns, in order (compiler.rs)
//!                        - entity labels, toplevel, doclevel
//!                                      │
//!                                      ▼
//!                      PatternArena + root ids (model.rs)
//! ```
//!
//! ## Pattern kinds
//!
//! - `icews-actor`: constraints on an actor mention (codes, sectors, country).
//! - `icews-event`: constraints on an event mention already in the set.
//! - `mention`: entity type, mention type, head word, entity label, actor.
//! - `vprop` / `nprop` / `mprop` / `anyprop`: a proposition with argument patterns.
//! - `regex`: a regular expression over the sentence text.
//! - `all-of` / `any-of` / `none-of`: combinations.
//!
//! Every kind accepts `(id ..)`, `(shortcut ..)`, `(score ..)` and `(return ..)`.
//! A bare atom where a sub-pattern is expected refers to a reference pattern
//! by its shortcut name.
//!
//! ## Manifest
//!
//! The main event patterns are listed in a manifest, one `CODE:path` per line.
//! See [`read_manifest`].

#[path = "pattern/compiler.rs"]
mod compiler;
#[path = "pattern/model.rs"]
mod model;
#[path = "pattern/set.rs"]
mod set;

pub use compiler::{Compiler, resolve_shortcuts};
pub use model::{
    ActorPattern, ActorShape, ArgPattern, BINDABLE_KEYS, Combinator, EventPattern, Header, MentionPattern, Pattern,
    PatternArena, PatternId, PatternKind, PropPattern, ReturnSpec, RoleSets,
};
pub use set::{ManifestEntry, PatternSet, read_manifest};
