//! Grouping keys, mention scores and participant comparison.
//!
//! Two event mentions belong to the same group when their keys under a
//! [`Uniqueness`] selection are equal. Keys are plain strings so that groups
//! can live in a `BTreeMap` and be visited in a stable order.

use super::mention::{EventMention, EventMentionId, EventMentionSet};
use super::Context;
use crate::actors::{ActorKind, ActorMentionId, ActorMentionSet};
use crate::catalog::{LOCATION, SOURCE, TARGET};
use crate::config::Uniqueness;
use crate::document::MentionType;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Key of `em` under `flags`. Event type and group only take part when
/// `per_event_type` is set.
pub(crate) fn group_key(
    em: &EventMention,
    flags: Uniqueness,
    per_event_type: bool,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
) -> String {
    let mut key = String::new();
    let mut parts = Vec::new();
    let (mut max_sentence, mut max_icews) = (0, 0);
    // Locations never make two mentions different events.
    for p in em.participants.iter().filter(|p| p.role != LOCATION) {
        let sentence = actors.get(p.actor).mention.sentence;
        max_sentence = max_sentence.max(sentence);
        max_icews = max_icews.max(ctx.doc.icews_sentence_no(sentence));
        if flags.intersects(Uniqueness::PARTICIPANTS) {
            parts.push(participant_key(actors, p.actor, flags, ctx));
        }
    }
    parts.sort();
    for part in parts {
        key.push_str(&part);
        key.push(' ');
    }
    if flags.contains(Uniqueness::SENTENCE) {
        let _ = write!(key, " SENTNO={max_sentence}");
    }
    if flags.contains(Uniqueness::ICEWS_SENTENCE) {
        let _ = write!(key, " SENTNO={max_icews}");
    }
    if per_event_type {
        let ty = ctx.catalog.event_types.get(em.event_type);
        if flags.contains(Uniqueness::EVENT_TYPE) {
            let _ = write!(key, " EVENT_TYPE={}", ty.code);
        }
        if flags.contains(Uniqueness::EVENT_GROUP) {
            let _ = write!(key, " EVENT_GROUP={}", ty.group);
        }
    }
    key
}

/// Identity of one participant. Roles stay out of it, so a pair and its
/// swapped counterpart share a key.
fn participant_key(actors: &ActorMentionSet, id: ActorMentionId, flags: Uniqueness, ctx: Context<'_>) -> String {
    let actor = actors.get(id);
    let mut key = String::new();
    if flags.contains(Uniqueness::MENTION_PAIR) {
        let _ = write!(key, "M({})", actor.mention);
    }
    if flags.contains(Uniqueness::ENTITY_PAIR) {
        match ctx.doc.entity_of(actor.mention) {
            Some(entity) => {
                let _ = write!(key, "E({entity})");
            }
            None => {
                let _ = write!(key, "M({})", actor.mention);
            }
        }
    }
    if flags.contains(Uniqueness::ACTOR_PAIR) {
        let _ = match &actor.kind {
            ActorKind::ProperNoun { actor, .. } => write!(key, "A({})", actor.id.0),
            ActorKind::Composite { agent, paired_actor } => {
                write!(key, "A({}.{})", paired_actor.as_ref().map_or(0, |a| a.id.0), agent.id.0)
            }
            ActorKind::Unknown => write!(key, "A(0)"),
        };
    }
    if flags.contains(Uniqueness::PROPER_NOUN_ACTOR_PAIR) {
        let code = actor.identified_actor_id().map(|a| a.0).unwrap_or(0);
        let _ = write!(key, "A({code})");
    }
    key
}

/// Event mentions grouped by key, each group in set order.
pub(crate) fn groups(
    events: &EventMentionSet,
    flags: Uniqueness,
    per_event_type: bool,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
) -> BTreeMap<String, Vec<EventMentionId>> {
    let mut out: BTreeMap<String, Vec<EventMentionId>> = BTreeMap::new();
    for em in events.iter() {
        out.entry(group_key(em, flags, per_event_type, ctx, actors)).or_default().push(em.id);
    }
    out
}

// --- Scoring -------------------------------------------------------------------

/// `maxout` for counts above `maxin`, falling off quadratically below it.
pub(crate) fn count_to_score(count: usize, maxin: usize, maxout: usize) -> f64 {
    if count > maxin {
        return maxout as f64;
    }
    let (c, maxin, maxout) = (count as f64, maxin as f64, maxout as f64);
    maxout - (maxout / maxin / maxin) * (c - maxin).powi(2)
}

/// How much a mention is worth keeping when duplicates collapse: specific
/// codes, identified actors, named mentions and longer mention text win.
pub(crate) fn score(em: &EventMention, ctx: Context<'_>, actors: &ActorMentionSet) -> f64 {
    let mut total = ctx.catalog.event_types.get(em.event_type).code.len() as f64;
    for p in &em.participants {
        let actor = actors.get(p.actor);
        match &actor.kind {
            ActorKind::ProperNoun { .. } => total += 20.0,
            ActorKind::Composite { paired_actor, .. } => {
                if paired_actor.is_some() {
                    total += 10.0;
                }
                // Every composite carries an agent.
                total += 10.0;
            }
            ActorKind::Unknown => {}
        }
        if let Some(mention) = ctx.doc.mention(actor.mention) {
            total += match mention.mention_type {
                MentionType::Name => 5.0,
                MentionType::Desc => 3.0,
                _ => 0.0,
            };
            total += count_to_score(mention.text.len(), 20, 5);
        }
    }
    total
}

/// `a` has a source and target where `b` lacks one, or a source or target
/// that `b` lacks entirely.
pub(crate) fn has_better_participants_than(a: &EventMention, b: &EventMention) -> bool {
    let (a_src, a_tgt) = (a.has_role(SOURCE), a.has_role(TARGET));
    let (b_src, b_tgt) = (b.has_role(SOURCE), b.has_role(TARGET));
    if a_src && a_tgt {
        !b_src || !b_tgt
    } else if a_src {
        !b_src
    } else if a_tgt {
        !b_tgt
    } else {
        false
    }
}
