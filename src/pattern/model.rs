//! Pattern tree representation.
//!
//! Patterns are stored in a [`PatternArena`] and refer to their sub-patterns by
//! [`PatternId`]. Shortcut resolution rewrites child ids in place, so a pattern
//! referenced from several places is stored once and never cloned.

use crate::document::{MentionType, PropKind};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Index into a [`PatternArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub usize);

/// Return value keys that name a bound variable rather than a plain value.
pub const BINDABLE_KEYS: &[&str] = &["EVENT-CODE", "SENTNO", "ACTOR", "PAIRED-ACTOR", "PAIRED-AGENT"];

/// `(return LABEL)` and/or `(return (key value) ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReturnSpec {
    pub label: Option<String>,
    pub values: BTreeMap<String, String>,
}

impl ReturnSpec {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Label equals `key`, or a value is stored under `key`.
    pub fn signals(&self, key: &str) -> bool {
        self.label.as_deref() == Some(key) || self.has_value(key)
    }

    /// `(key, variable)` pairs that bind variables.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().filter(|(k, _)| BINDABLE_KEYS.contains(&k.as_str())).map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Sub-forms every pattern kind accepts.
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// `(id ..)`: label reported for top-level matches.
    pub label: Option<String>,
    /// `(shortcut ..)`: name other patterns use to refer to this one.
    pub shortcut: Option<String>,
    pub score: Option<f32>,
    pub ret: Option<ReturnSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorShape {
    ProperNoun,
    Composite,
}

/// `(icews-actor ...)`
#[derive(Debug, Clone, Default)]
pub struct ActorPattern {
    pub shape: Option<ActorShape>,
    pub actor_codes: Vec<String>,
    pub block_actor_codes: Vec<String>,
    pub agent_codes: Vec<String>,
    pub block_agent_codes: Vec<String>,
    pub sector_codes: Vec<String>,
    pub block_sector_codes: Vec<String>,
    /// `is-country` (true) / `is-not-country` (false).
    pub country: Option<bool>,
    pub mention: Option<PatternId>,
    pub block_mentions: Vec<PatternId>,
}

/// Role lists of the `same-*` / `block-same-*` constraints, one entry per form.
pub type RoleSets = Vec<Vec<String>>;

/// `(icews-event ...)`
#[derive(Debug, Clone, Default)]
pub struct EventPattern {
    /// `(participant ROLE pattern)`; role `ANY` matches every participant.
    pub participants: Vec<(String, PatternId)>,
    pub block_participants: Vec<(String, PatternId)>,
    pub event_codes: Option<Regex>,
    pub block_codes: Option<Regex>,
    pub pattern_ids: Vec<String>,
    pub block_pattern_ids: Vec<String>,
    pub same_actor: RoleSets,
    pub block_same_actor: RoleSets,
    pub same_agent: RoleSets,
    pub block_same_agent: RoleSets,
    pub same_country: RoleSets,
    pub block_same_country: RoleSets,
    pub sentence_matches: Vec<PatternId>,
    pub block_sentence_matches: Vec<PatternId>,
    pub document_matches: Vec<PatternId>,
    pub block_document_matches: Vec<PatternId>,
    pub first_proposition: Option<PatternId>,
}

/// `(mention ...)`
#[derive(Debug, Clone, Default)]
pub struct MentionPattern {
    pub entity_types: Vec<String>,
    pub block_entity_types: Vec<String>,
    pub mention_types: Vec<MentionType>,
    pub head_words: Vec<String>,
    pub block_head_words: Vec<String>,
    pub entity_labels: Vec<String>,
    pub block_entity_labels: Vec<String>,
    pub actor: Option<PatternId>,
    pub block_actors: Vec<PatternId>,
    pub text: Option<Regex>,
}

/// One `(argument (role ..) pattern?)` entry of a proposition pattern.
#[derive(Debug, Clone, Default)]
pub struct ArgPattern {
    /// Accepted argument roles; empty accepts any role.
    pub roles: Vec<String>,
    /// Constraint on the argument's filler; `None` accepts any filler.
    pub pattern: Option<PatternId>,
}

/// `(vprop ...)`, `(nprop ...)`, `(mprop ...)`, `(anyprop ...)`
#[derive(Debug, Clone, Default)]
pub struct PropPattern {
    /// Accepted proposition kinds; empty for `anyprop`.
    pub kinds: Vec<PropKind>,
    pub predicates: Vec<String>,
    pub block_predicates: Vec<String>,
    pub args: Vec<ArgPattern>,
    pub opt_args: Vec<ArgPattern>,
    pub block_args: Vec<ArgPattern>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    AllOf,
    AnyOf,
    NoneOf,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Actor(ActorPattern),
    Event(EventPattern),
    Mention(MentionPattern),
    Proposition(PropPattern),
    /// `(regex (re "..."))` over a sentence's text.
    Regex(Regex),
    Combination(Combinator, Vec<PatternId>),
    /// Unresolved reference to a `(shortcut NAME)` pattern.
    Shortcut(String),
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub header: Header,
    pub kind: PatternKind,
}

impl Pattern {
    pub fn shortcut(name: impl Into<String>) -> Self {
        Pattern { header: Header::default(), kind: PatternKind::Shortcut(name.into()) }
    }

    /// Mutable access to every child slot, for shortcut rewriting.
    pub(crate) fn children_mut(&mut self) -> Vec<&mut PatternId> {
        let mut out: Vec<&mut PatternId> = Vec::new();
        match &mut self.kind {
            PatternKind::Actor(p) => {
                out.extend(p.mention.as_mut());
                out.extend(p.block_mentions.iter_mut());
            }
            PatternKind::Event(p) => {
                out.extend(p.participants.iter_mut().map(|(_, id)| id));
                out.extend(p.block_participants.iter_mut().map(|(_, id)| id));
                out.extend(p.sentence_matches.iter_mut());
                out.extend(p.block_sentence_matches.iter_mut());
                out.extend(p.document_matches.iter_mut());
                out.extend(p.block_document_matches.iter_mut());
                out.extend(p.first_proposition.as_mut());
            }
            PatternKind::Mention(p) => {
                out.extend(p.actor.as_mut());
                out.extend(p.block_actors.iter_mut());
            }
            PatternKind::Proposition(p) => {
                for arg in p.args.iter_mut().chain(p.opt_args.iter_mut()).chain(p.block_args.iter_mut()) {
                    out.extend(arg.pattern.as_mut());
                }
            }
            PatternKind::Combination(_, members) => out.extend(members.iter_mut()),
            PatternKind::Regex(_) | PatternKind::Shortcut(_) => {}
        }
        out
    }

    /// Child ids whose matches contribute features to this pattern's match.
    ///
    /// Negative (block) children are left out: a successful block match never
    /// reaches the caller.
    pub(crate) fn positive_children(&self) -> Vec<PatternId> {
        match &self.kind {
            PatternKind::Actor(p) => p.mention.into_iter().collect(),
            PatternKind::Event(p) => p
                .participants
                .iter()
                .map(|(_, id)| *id)
                .chain(p.sentence_matches.iter().copied())
                .chain(p.document_matches.iter().copied())
                .chain(p.first_proposition)
                .collect(),
            PatternKind::Mention(p) => p.actor.into_iter().collect(),
            PatternKind::Proposition(p) => p.args.iter().chain(p.opt_args.iter()).filter_map(|a| a.pattern).collect(),
            PatternKind::Combination(Combinator::NoneOf, _) => Vec::new(),
            PatternKind::Combination(_, members) => members.clone(),
            PatternKind::Regex(_) | PatternKind::Shortcut(_) => Vec::new(),
        }
    }
}

/// Owns every compiled pattern of a pattern set.
#[derive(Debug, Clone, Default)]
pub struct PatternArena {
    nodes: Vec<Pattern>,
}

impl PatternArena {
    pub fn add(&mut self, pattern: Pattern) -> PatternId {
        self.nodes.push(pattern);
        PatternId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: PatternId) -> &Pattern {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: PatternId) -> &mut Pattern {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every variable name `id` (or any positive descendant) can bind.
    ///
    /// Lets the matcher know, before running a sub-pattern, whether its
    /// matches could ever conflict with bindings already fixed by siblings.
    pub fn collect_bind_labels(&self, id: PatternId) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();
        let mut stack = vec![id];
        let mut seen = BTreeSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            let pattern = self.get(next);
            if let Some(ret) = &pattern.header.ret {
                labels.extend(ret.bindings().map(|(_, var)| var.to_string()));
            }
            stack.extend(pattern.positive_children());
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_return(kind: PatternKind, values: &[(&str, &str)]) -> Pattern {
        let ret = ReturnSpec {
            label: None,
            values: values.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        };
        Pattern { header: Header { ret: Some(ret), ..Header::default() }, kind }
    }

    #[test]
    fn bind_labels_skip_block_children_and_plain_values() {
        let mut arena = PatternArena::default();
        let src = arena.add(with_return(PatternKind::Actor(ActorPattern::default()), &[("ACTOR", "a1")]));
        let blocked = arena.add(with_return(PatternKind::Actor(ActorPattern::default()), &[("ACTOR", "never")]));
        let sent = arena.add(with_return(
            PatternKind::Regex(Regex::new("x").unwrap()),
            &[("SENTNO", "s"), ("event-tense", "current")],
        ));
        let event = EventPattern {
            participants: vec![("SOURCE".into(), src)],
            block_participants: vec![("TARGET".into(), blocked)],
            sentence_matches: vec![sent],
            ..EventPattern::default()
        };
        let top = arena.add(Pattern { header: Header::default(), kind: PatternKind::Event(event) });

        let labels: Vec<String> = arena.collect_bind_labels(top).into_iter().collect();
        assert_eq!(labels, vec!["a1", "s"]);
    }

    #[test]
    fn return_spec_signals_label_or_value() {
        let by_label = ReturnSpec { label: Some("BLOCK".into()), values: BTreeMap::new() };
        let by_value = ReturnSpec { label: None, values: [("BLOCK".to_string(), "1".to_string())].into() };
        assert!(by_label.signals("BLOCK"));
        assert!(by_value.signals("BLOCK"));
        assert!(!ReturnSpec::default().signals("BLOCK"));
    }
}
