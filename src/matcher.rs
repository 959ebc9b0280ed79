//! Pattern matching against a document.
//!
//! A [`Matcher`] binds one [`PatternSet`] to one document: the catalog, the
//! current actor mentions and (for passes that run after generation) the
//! current event mentions. It is cheap to build and borrows everything, so the
//! pipeline builds a fresh one whenever the state it reads has changed.
//!
//! ```text
//! PatternSet ─┐
//! Document ───┤
//! Catalog ────┼── Matcher ── sentence_matches(s) ─┐
//! actors ─────┤            ── document_matches() ──┼── Vec<FeatureSet>
//! events ─────┘            ── match_event(p, e) ───┘
//! ```
//!
//! ## Scopes
//!
//! Top-level `icews-event` patterns and everything under `doclevel` are matched
//! once per document (every actor mention, and every event mention whose type
//! is not discardable). Every other
//! top-level pattern is matched per sentence against the candidates of its
//! kind: actor mentions, mentions, propositions or the sentence text. Each
//! candidate that matches yields one [`FeatureSet`]; identical feature sets are
//! reported once.
//!
//! ## Unification
//!
//! Sub-patterns that can bind variables (see [`PatternArena::collect_bind_labels`])
//! are checked against the bindings fixed by their earlier siblings. The first
//! consistent sub-match is kept; later alternatives are not explored.
//!
//! [`PatternArena::collect_bind_labels`]: crate::pattern::PatternArena::collect_bind_labels

#[path = "matcher/eval.rs"]
mod eval;
#[path = "matcher/features.rs"]
mod features;
#[path = "matcher/unify.rs"]
mod unify;

#[cfg(test)]
#[path = "matcher/tests.rs"]
mod tests;

pub use features::{Feature, FeatureSet, Target};
pub use unify::Bindings;

use crate::actors::ActorMentionSet;
use crate::catalog::Catalog;
use crate::document::{Document, MentionId};
use crate::events::{EventMentionId, EventMentionSet};
use crate::pattern::{PatternId, PatternKind, PatternSet};
use std::collections::{BTreeSet, HashMap};

/// Entity labels assigned to mentions by a pattern set's `entitylabels` section.
#[derive(Debug, Clone, Default)]
pub struct EntityLabels(HashMap<MentionId, BTreeSet<String>>);

impl EntityLabels {
    /// Run every label pattern over every sentence of `doc`.
    pub fn compute(set: &PatternSet, doc: &Document, catalog: &Catalog, actors: &ActorMentionSet) -> Self {
        let mut labels = EntityLabels::default();
        if set.entity_labels().is_empty() {
            return labels;
        }
        let empty = EntityLabels::default();
        let matcher = Matcher::new(set, doc, catalog, actors, None, &empty);
        for (label, pattern) in set.entity_labels() {
            for sentence in 0..doc.sentences.len() {
                for fs in matcher.matches_in_sentence(*pattern, sentence) {
                    // The label pattern's own target is the last one recorded.
                    if let Some(m) = fs.matched().last().and_then(|t| t.mention(actors)) {
                        labels.0.entry(m).or_default().insert(label.clone());
                    }
                }
            }
        }
        tracing::trace!(set = %set.name, labelled = labels.0.len(), "entity labels");
        labels
    }

    pub fn has(&self, mention: MentionId, label: &str) -> bool {
        self.0.get(&mention).is_some_and(|l| l.contains(label))
    }
}

pub struct Matcher<'a> {
    set: &'a PatternSet,
    doc: &'a Document,
    catalog: &'a Catalog,
    actors: &'a ActorMentionSet,
    events: Option<&'a EventMentionSet>,
    labels: &'a EntityLabels,
}

impl<'a> Matcher<'a> {
    pub fn new(
        set: &'a PatternSet,
        doc: &'a Document,
        catalog: &'a Catalog,
        actors: &'a ActorMentionSet,
        events: Option<&'a EventMentionSet>,
        labels: &'a EntityLabels,
    ) -> Self {
        Self { set, doc, catalog, actors, events, labels }
    }

    pub fn set(&self) -> &PatternSet {
        self.set
    }

    /// Top-level sentence-scope patterns over sentence `sentence`.
    pub fn sentence_matches(&self, sentence: usize) -> Vec<FeatureSet> {
        let mut out = Vec::new();
        for &id in self.set.toplevel() {
            if self.is_document_scope(id) {
                continue;
            }
            for fs in self.matches_in_sentence(id, sentence) {
                push_unique(&mut out, self.top_level(id, fs));
            }
        }
        out
    }

    /// Top-level event patterns and every `doclevel` pattern, once per document.
    pub fn document_matches(&self) -> Vec<FeatureSet> {
        let mut out = Vec::new();
        let ids = self.set.toplevel().iter().filter(|id| self.is_document_scope(**id)).chain(self.set.doclevel());
        for &id in ids {
            for fs in self.matches_in_document(id) {
                push_unique(&mut out, self.top_level(id, fs));
            }
        }
        out
    }

    /// Document matches followed by the sentence matches of every sentence.
    pub fn all_matches(&self) -> Vec<FeatureSet> {
        let mut out = self.document_matches();
        for sentence in 0..self.doc.sentences.len() {
            out.extend(self.sentence_matches(sentence));
        }
        out
    }

    /// Match top-level pattern `id` against one event mention.
    pub fn match_event(&self, id: PatternId, event: EventMentionId) -> Option<FeatureSet> {
        self.match_target(id, Target::Event(event)).map(|fs| self.top_level(id, fs))
    }

    fn is_document_scope(&self, id: PatternId) -> bool {
        matches!(self.set.pattern(id).kind, PatternKind::Event(_))
    }

    fn top_level(&self, id: PatternId, mut fs: FeatureSet) -> FeatureSet {
        let header = &self.set.pattern(id).header;
        if let Some(label) = &header.label {
            fs.features.insert(0, Feature::TopLevel { label: label.clone() });
        }
        if header.score.is_some() {
            fs.score = header.score;
        }
        fs
    }
}

fn push_unique(out: &mut Vec<FeatureSet>, fs: FeatureSet) {
    if !out.contains(&fs) {
        out.push(fs);
    }
}
