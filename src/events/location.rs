//! Event location resolution.
//!
//! Each event without a `LOCATION` participant is run through the top-level
//! event patterns of the location set in order. The first event return for
//! that event decides how to resolve: the target's or source's country, the
//! document default, a pattern-matched place, or no location at all. An
//! actor or mention return naming a resolved place also resolves directly.

use super::mention::{EventMention, EventMentionId, EventMentionSet, Participant};
use super::{Context, UNLABELED_PATTERN};
use crate::actors::{ActorKind, ActorMentionId, ActorMentionSet};
use crate::catalog::{LOCATION, SOURCE, TARGET};
use crate::matcher::{EntityLabels, FeatureSet, Matcher};
use crate::pattern::{PatternKind, PatternSet};
use std::collections::HashSet;

const BLOCK_LOCATION: &str = "BLOCK_LOCATION";

/// Outcome of one location pattern for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Found(ActorMentionId),
    Blocked,
    Nothing,
}

/// Events the `block_event_location` set (and the location set itself) marks
/// with `BLOCK_LOCATION`.
pub(crate) fn blocked_events(
    sets: &[&PatternSet],
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &EventMentionSet,
) -> HashSet<EventMentionId> {
    let mut blocked = HashSet::new();
    for set in sets {
        let labels = EntityLabels::compute(set, ctx.doc, ctx.catalog, actors);
        let matcher = Matcher::new(set, ctx.doc, ctx.catalog, actors, Some(events), &labels);
        for fs in matcher.all_matches() {
            for (ret, event) in fs.event_returns() {
                if ret.signals(BLOCK_LOCATION) && blocked.insert(event) {
                    tracing::info!(
                        event = %event,
                        pattern = fs.label().unwrap_or(UNLABELED_PATTERN),
                        "event location resolution blocked"
                    );
                }
            }
        }
    }
    blocked
}

/// Add a `LOCATION` participant to every event a location pattern resolves.
/// Returns the number of events located.
pub(crate) fn add_locations(
    set: &PatternSet,
    blocked: &HashSet<EventMentionId>,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    events: &mut EventMentionSet,
) -> usize {
    let default = ctx.catalog.actors.default_country(actors);
    let patterns: Vec<_> =
        set.toplevel().iter().copied().filter(|&id| matches!(set.pattern(id).kind, PatternKind::Event(_))).collect();
    let labels = EntityLabels::compute(set, ctx.doc, ctx.catalog, actors);

    let mut found = Vec::new();
    {
        let matcher = Matcher::new(set, ctx.doc, ctx.catalog, actors, Some(&*events), &labels);
        for em in events.iter() {
            if em.has_role(LOCATION) || blocked.contains(&em.id) {
                continue;
            }
            for &pattern in &patterns {
                let Some(fs) = matcher.match_event(pattern, em.id) else {
                    continue;
                };
                match resolve(&fs, em, ctx, actors, default) {
                    Resolution::Found(place) => {
                        found.push((em.id, place, fs.label().unwrap_or(UNLABELED_PATTERN).to_string()));
                        break;
                    }
                    Resolution::Blocked => break,
                    Resolution::Nothing => {}
                }
            }
        }
    }

    for (id, place, pattern) in &found {
        if let Some(em) = events.get_mut(*id) {
            em.participants.push(Participant::new(LOCATION, *place));
            tracing::info!(event = %id, location = %actors.get(*place), pattern = %pattern, "event located");
        }
    }
    found.len()
}

fn resolve(
    fs: &FeatureSet,
    em: &EventMention,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
    default: Option<ActorMentionId>,
) -> Resolution {
    let own = fs.event_returns().find(|(_, e)| *e == em.id).map(|(ret, _)| ret.label.as_deref());
    let place = match own {
        Some(Some(BLOCK_LOCATION)) => return Resolution::Blocked,
        Some(Some("TARGET_LOCATION")) => role_country(em, TARGET, ctx, actors),
        Some(Some("SOURCE_LOCATION")) => role_country(em, SOURCE, ctx, actors),
        Some(Some("DEFAULT_LOCATION")) => default,
        // `LOCATION`, or no event return at all: a returned place mention decides.
        _ => fs
            .returns()
            .filter_map(|(_, target)| target.mention(actors))
            .filter_map(|m| actors.find(m))
            .find(|&a| actors.get(a).is_resolved_geo()),
    };
    match place {
        Some(p) if actors.get(p).is_resolved_geo() => Resolution::Found(p),
        _ => Resolution::Nothing,
    }
}

/// The resolved place for the first participant in `role`: itself when it
/// is a resolved place, otherwise the country of its (paired) actor.
fn role_country(em: &EventMention, role: &str, ctx: Context<'_>, actors: &ActorMentionSet) -> Option<ActorMentionId> {
    let id = em.actors_in(role).next()?;
    let actor = match &actors.get(id).kind {
        ActorKind::ProperNoun { geo: Some(_), .. } => return Some(id),
        ActorKind::ProperNoun { actor, .. } => actor.id,
        ActorKind::Composite { paired_actor: Some(paired), .. } => paired.id,
        _ => return None,
    };
    let iso = ctx.catalog.actors.iso_code(actor)?;
    actors.find_country(iso)
}
