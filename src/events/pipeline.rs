//! The conflict-resolution pipeline.
//!
//! Passes run strictly in order over the whole document's event mentions.
//! Each removing pass first computes the set of mentions to delete and only
//! then deletes them, so a pass never observes its own partial result.

use super::grouping::{groups, has_better_participants_than, score};
use super::location;
use super::mention::{EventMention, EventMentionId, EventMentionSet, Participant, Tense};
use super::metrics::{PassMetrics, PassTimer};
use super::unbinarize::unbinarize;
use super::{Context, UNLABELED_PATTERN};
use crate::actors::ActorMentionSet;
use crate::config::{Config, Uniqueness};
use crate::matcher::{EntityLabels, FeatureSet, Matcher};
use crate::pattern::PatternSet;
use crate::{Error, Result};
use std::collections::HashSet;

const COPY_ACTOR_SRC: &str = "COPY_ACTOR_SRC";
const COPY_ACTOR_DST: &str = "COPY_ACTOR_DST";

// --- Pattern sets ----------------------------------------------------------------

/// The optional pattern sets used by individual passes.
#[derive(Debug, Clone, Default)]
pub struct PassPatternSets {
    pub propagate_actor_labels: Option<PatternSet>,
    pub replace_event_type: Option<PatternSet>,
    pub block_events: Option<PatternSet>,
    pub contingent_block_events: Option<PatternSet>,
    pub tag_event_tense: Option<PatternSet>,
    pub event_location: Option<PatternSet>,
    pub block_event_location: Option<PatternSet>,
    pub block_paired_actor_location: Option<PatternSet>,
}

impl PassPatternSets {
    pub fn load(config: &Config) -> Result<Self> {
        let paths = &config.pattern_sets;
        let load = |raw: &Option<String>| -> Result<Option<PatternSet>> {
            raw.as_deref().map(|p| PatternSet::load(&config.resolve_path(p)?)).transpose()
        };
        Ok(Self {
            propagate_actor_labels: load(&paths.propagate_actor_labels)?,
            replace_event_type: load(&paths.replace_event_type)?,
            block_events: load(&paths.block_events)?,
            contingent_block_events: load(&paths.contingent_block_events)?,
            tag_event_tense: load(&paths.tag_event_tense)?,
            event_location: load(&paths.event_location)?,
            block_event_location: load(&paths.block_event_location)?,
            block_paired_actor_location: load(&paths.block_paired_actor_location)?,
        })
    }
}

// --- Settings --------------------------------------------------------------------

/// Groupings and switches the pipeline runs with.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub uniqueness: Vec<Uniqueness>,
    pub overrides: Vec<Uniqueness>,
    pub add_locations: bool,
    pub unbinarize: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            uniqueness: vec![Uniqueness::MENTION_PAIR | Uniqueness::EVENT_GROUP | Uniqueness::ICEWS_SENTENCE],
            overrides: vec![Uniqueness::MENTION_PAIR],
            add_locations: false,
            unbinarize: false,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            uniqueness: config.uniqueness_groups()?,
            overrides: config.override_groups()?,
            add_locations: config.add_locations,
            unbinarize: config.unbinarize,
        })
    }
}

// --- Driver ----------------------------------------------------------------------

/// Run every pass over `events`, returning one metrics entry per pass.
pub(crate) fn run(
    settings: &PipelineSettings,
    sets: &PassPatternSets,
    ctx: Context<'_>,
    actors: &mut ActorMentionSet,
    events: &mut EventMentionSet,
) -> Result<Vec<PassMetrics>> {
    let mut metrics = Vec::new();
    macro_rules! pass {
        ($name:expr, $body:expr) => {{
            let timer = PassTimer::start($name, events.len());
            $body;
            metrics.push(timer.finish(events.len()));
        }};
    }

    pass!("propagate", propagate_actor_labels(sets.propagate_actor_labels.as_ref(), ctx, actors, events)?);
    pass!("replace", replace_event_types(sets.replace_event_type.as_ref(), ctx, actors, events)?);
    pass!("block", remove_blocked(sets.block_events.as_ref(), ctx, actors, events));
    pass!("override-temporary", {
        for &flags in &settings.overrides {
            remove_overridden(flags, true, ctx, actors, events);
        }
    });
    pass!("override", {
        for &flags in &settings.overrides {
            remove_overridden(flags, false, ctx, actors, events);
        }
    });
    pass!("participant-override", remove_participant_overridden(ctx, actors, events));
    pass!("contingent-block", remove_blocked(sets.contingent_block_events.as_ref(), ctx, actors, events));
    pass!("dedup", {
        for &flags in &settings.uniqueness {
            remove_duplicates(flags, ctx, actors, events);
        }
    });
    pass!("discard-temporary", remove_temporary(ctx, events));
    pass!("same-entity", remove_same_entity(ctx, actors, events));
    pass!("tense", tag_tense(sets.tag_event_tense.as_ref(), ctx, actors, events));
    if settings.add_locations {
        if let Some(set) = &sets.event_location {
            pass!("location", {
                let block_sets: Vec<&PatternSet> = sets.block_event_location.iter().chain(Some(set)).collect();
                let blocked = location::blocked_events(&block_sets, ctx, actors, events);
                location::add_locations(set, &blocked, ctx, actors, events)
            });
        }
    }
    if settings.unbinarize {
        pass!("unbinarize", unbinarize(ctx, events));
    }
    Ok(metrics)
}

/// Every document and sentence match of `set`, matched against the current events.
fn event_matches(set: &PatternSet, ctx: Context<'_>, actors: &ActorMentionSet, events: &EventMentionSet) -> Vec<FeatureSet> {
    let labels = EntityLabels::compute(set, ctx.doc, ctx.catalog, actors);
    Matcher::new(set, ctx.doc, ctx.catalog, actors, Some(events), &labels).all_matches()
}

fn discard(events: &mut EventMentionSet, doomed: HashSet<EventMentionId>) -> usize {
    if doomed.is_empty() {
        return 0;
    }
    events.remove(&doomed)
}

fn code_of<'c>(ctx: Context<'c>, em: &EventMention) -> &'c str {
    &ctx.catalog.event_types.get(em.event_type).code
}

// --- 1. Propagate actor labels ------------------------------------------------

/// Copy the identified actor of each match's `COPY_ACTOR_SRC` actor onto its
/// unpaired composite `COPY_ACTOR_DST` actors.
pub(crate) fn propagate_actor_labels(
    set: Option<&PatternSet>,
    ctx: Context<'_>,
    actors: &mut ActorMentionSet,
    events: &EventMentionSet,
) -> Result<()> {
    let Some(set) = set else {
        return Ok(());
    };
    for fs in event_matches(set, ctx, actors, events) {
        let label = fs.label().unwrap_or(UNLABELED_PATTERN);
        let mut src = None;
        let mut dsts = Vec::new();
        for (ret, actor) in fs.actor_returns() {
            match ret.label.as_deref() {
                Some(COPY_ACTOR_SRC) if src.is_some() => {
                    return Err(Error::pipeline(format!("pattern {label}: several {COPY_ACTOR_SRC} actors in one match")));
                }
                Some(COPY_ACTOR_SRC) => src = Some(actor),
                Some(COPY_ACTOR_DST) => dsts.push(actor),
                other => {
                    return Err(Error::pipeline(format!(
                        "pattern {label}: unexpected actor label {}",
                        other.unwrap_or("(none)")
                    )));
                }
            }
        }
        let Some(src) = src else {
            return Err(Error::pipeline(format!("pattern {label}: expected exactly one {COPY_ACTOR_SRC} actor")));
        };
        if dsts.is_empty() {
            return Err(Error::pipeline(format!("pattern {label}: expected at least one {COPY_ACTOR_DST} actor")));
        }
        let Some(ids) = actors.get(src).identified_actor().cloned() else {
            continue;
        };
        for dst in dsts {
            let target = actors.get(dst);
            if !target.is_composite() || target.identified_actor().is_some() {
                continue;
            }
            tracing::info!(dst = %target, src = %actors.get(src), pattern = label, "propagating paired actor");
            if actors.set_paired_actor(dst, ids.clone(), "PROPAGATE_EVENT_ACTOR_LABEL") {
                actors.add_source_note(dst, label);
            }
        }
    }
    Ok(())
}

// --- 2. Replace event types ---------------------------------------------------

/// Retype events (`new-event-code`) or add role-swapped copies
/// (`reciprocal-event-code` with `reciprocal-roles`).
pub(crate) fn replace_event_types(
    set: Option<&PatternSet>,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &mut EventMentionSet,
) -> Result<()> {
    let Some(set) = set else {
        return Ok(());
    };
    let registry = &ctx.catalog.event_types;
    let mut added = Vec::new();
    for fs in event_matches(set, ctx, actors, events) {
        let label = fs.label().unwrap_or(UNLABELED_PATTERN);
        for (ret, id) in fs.event_returns() {
            if let Some(code) = ret.value("new-event-code") {
                if code.is_empty() {
                    bail_config!("pattern {label} does not return a new-event-code value");
                }
                let Some(type_id) = registry.id_of(code) else {
                    bail_config!("pattern {label} returns unknown new-event-code {code}");
                };
                if let Some(em) = events.get_mut(id) {
                    tracing::info!(event = %id, from = %registry.get(em.event_type).code, to = code, pattern = label, "retyping event");
                    em.event_type = type_id;
                }
            } else if let Some(code) = ret.value("reciprocal-event-code") {
                let Some(em) = events.get(id) else {
                    continue;
                };
                let type_id = if code.eq_ignore_ascii_case("SAME") {
                    em.event_type
                } else if code.is_empty() {
                    bail_config!("pattern {label} does not return a reciprocal-event-code value");
                } else {
                    registry
                        .id_of(code)
                        .ok_or_else(|| Error::config(format!("pattern {label} returns unknown reciprocal-event-code {code}")))?
                };
                let Some(spec) = ret.value("reciprocal-roles") else {
                    bail_config!("pattern {label} returns reciprocal-event-code but no reciprocal-roles");
                };
                let roles: Vec<&str> = spec.split('+').collect();
                let [a, b] = roles.as_slice() else {
                    bail_config!("pattern {label}: reciprocal-roles must name exactly two roles, got '{spec}'");
                };
                let remove = ret.value("reciprocal-remove-role");
                let participants: Vec<Participant> = em
                    .participants
                    .iter()
                    .map(|p| {
                        let role = match p.role.as_str() {
                            r if r == *a => b.to_string(),
                            r if r == *b => a.to_string(),
                            r => r.to_string(),
                        };
                        Participant::new(role, p.actor)
                    })
                    .filter(|p| remove != Some(p.role.as_str()))
                    .collect();
                if participants.is_empty() {
                    continue;
                }
                tracing::info!(event = %id, code = %registry.get(type_id).code, pattern = label, "creating reciprocal event");
                let mut copy = EventMention::new(type_id, participants, label);
                copy.tense = em.tense;
                copy.time_mention = em.time_mention;
                copy.propositions = em.propositions.clone();
                copy.original_event_id = em.original_event_id;
                added.push(copy);
            }
        }
    }
    for em in added {
        events.add(em);
    }
    Ok(())
}

// --- 3 and 6. Block -----------------------------------------------------------

/// Remove every event a `BLOCK` return of `set` points at.
pub(crate) fn remove_blocked(
    set: Option<&PatternSet>,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &mut EventMentionSet,
) -> usize {
    let Some(set) = set else {
        return 0;
    };
    let mut doomed = HashSet::new();
    for fs in event_matches(set, ctx, actors, events) {
        for (ret, id) in fs.event_returns() {
            if ret.signals("BLOCK") && doomed.insert(id) {
                let pattern = fs.label().unwrap_or(UNLABELED_PATTERN);
                tracing::info!(event = %id, set = %set.name, pattern, "discarding blocked event");
            }
        }
    }
    discard(events, doomed)
}

// --- 4. Overrides -------------------------------------------------------------

/// Within each group, drop the member whose type the other's type overrides.
/// With `temporary_only`, only pairs whose winner is a discardable type count.
pub(crate) fn remove_overridden(
    flags: Uniqueness,
    temporary_only: bool,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &mut EventMentionSet,
) -> usize {
    let registry = &ctx.catalog.event_types;
    let mut doomed = HashSet::new();
    for group in groups(events, flags, false, ctx, actors).into_values() {
        for (i, &a) in group.iter().enumerate() {
            for &b in &group[i + 1..] {
                let (Some(ea), Some(eb)) = (events.get(a), events.get(b)) else {
                    continue;
                };
                let (keep, lose) = if registry.overrides(ea.event_type, eb.event_type) {
                    (ea, eb)
                } else if registry.overrides(eb.event_type, ea.event_type) {
                    (eb, ea)
                } else {
                    continue;
                };
                if temporary_only && !registry.get(keep.event_type).discard {
                    continue;
                }
                if doomed.insert(lose.id) {
                    tracing::info!(
                        event = %lose.id, code = code_of(ctx, lose), by = %keep.id, by_code = code_of(ctx, keep),
                        "discarding overridden event"
                    );
                }
            }
        }
    }
    discard(events, doomed)
}

// --- 5. Participant overrides -------------------------------------------------

/// Within one ICEWS sentence, drop events whose participants are worse than
/// another's of the same group or of an overriding type.
pub(crate) fn remove_participant_overridden(
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &mut EventMentionSet,
) -> usize {
    let registry = &ctx.catalog.event_types;
    let mut doomed = HashSet::new();
    for group in groups(events, Uniqueness::ICEWS_SENTENCE, true, ctx, actors).into_values() {
        for (i, &a) in group.iter().enumerate() {
            for &b in &group[i + 1..] {
                let (Some(ea), Some(eb)) = (events.get(a), events.get(b)) else {
                    continue;
                };
                let (keep, lose) = if has_better_participants_than(ea, eb) {
                    (ea, eb)
                } else if has_better_participants_than(eb, ea) {
                    (eb, ea)
                } else {
                    continue;
                };
                let (kt, lt) = (registry.get(keep.event_type), registry.get(lose.event_type));
                if (kt.group == lt.group || registry.overrides(keep.event_type, lose.event_type)) && doomed.insert(lose.id)
                {
                    tracing::info!(event = %lose.id, by = %keep.id, "discarding event overridden by participants");
                }
            }
        }
    }
    discard(events, doomed)
}

// --- 7. Duplicates ------------------------------------------------------------

/// Keep only the best-scoring member of each group; the first of equal
/// scores wins.
pub(crate) fn remove_duplicates(
    flags: Uniqueness,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &mut EventMentionSet,
) -> usize {
    let mut doomed = HashSet::new();
    for (key, group) in groups(events, flags, true, ctx, actors) {
        if group.len() < 2 {
            continue;
        }
        let mut best: Option<(EventMentionId, f64)> = None;
        for &id in &group {
            let Some(em) = events.get(id) else {
                continue;
            };
            let s = score(em, ctx, actors);
            if best.is_none_or(|(_, b)| s > b) {
                best = Some((id, s));
            }
        }
        let Some((best, _)) = best else {
            continue;
        };
        for id in group.into_iter().filter(|&id| id != best) {
            if doomed.insert(id) {
                tracing::info!(event = %id, kept = %best, key = %key, "discarding duplicate event");
            }
        }
    }
    discard(events, doomed)
}

// --- 8 and 9. Temporary and same-entity ----------------------------------------

pub(crate) fn remove_temporary(ctx: Context<'_>, events: &mut EventMentionSet) -> usize {
    let doomed =
        events.iter().filter(|em| ctx.catalog.event_types.get(em.event_type).discard).map(|em| em.id).collect();
    discard(events, doomed)
}

/// Drop events where one entity fills two roles that may not share it.
pub(crate) fn remove_same_entity(ctx: Context<'_>, actors: &ActorMentionSet, events: &mut EventMentionSet) -> usize {
    let mut doomed = HashSet::new();
    for em in events.iter() {
        let ty = ctx.catalog.event_types.get(em.event_type);
        let entities: Vec<(&str, Option<usize>)> =
            em.participants.iter().map(|p| (p.role.as_str(), ctx.doc.entity_of(actors.get(p.actor).mention))).collect();
        let clash = entities.iter().enumerate().any(|(i, (role, entity))| {
            entity.is_some()
                && entities[i + 1..]
                    .iter()
                    .any(|(other, e)| e == entity && !ty.roles_can_share_entity(role, other))
        });
        if clash {
            tracing::info!(event = %em.id, code = %ty.code, "discarding event with one entity in several roles");
            doomed.insert(em.id);
        }
    }
    discard(events, doomed)
}

// --- 10. Tense ----------------------------------------------------------------

/// Apply `event-tense` returns. Without a document date nothing can be
/// judged, and every event is marked unavailable.
pub(crate) fn tag_tense(set: Option<&PatternSet>, ctx: Context<'_>, actors: &ActorMentionSet, events: &mut EventMentionSet) {
    if ctx.doc.date.is_none() {
        for em in events.iter_mut() {
            em.tense = Tense::Unavailable;
        }
        return;
    }
    let Some(set) = set else {
        return;
    };
    for fs in event_matches(set, ctx, actors, events) {
        let pattern = fs.label().unwrap_or(UNLABELED_PATTERN);
        for (ret, id) in fs.event_returns() {
            let Some(raw) = ret.value("event-tense") else {
                continue;
            };
            let Some(tense) = Tense::parse(raw) else {
                tracing::warn!(tense = raw, pattern, "unexpected tense; skipping");
                continue;
            };
            if let Some(em) = events.get_mut(id) {
                em.tense = tense;
                tracing::info!(event = %id, %tense, pattern, "tagging event tense");
            }
        }
    }
}
