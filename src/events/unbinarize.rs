//! Merging binarized event mentions back together.
//!
//! Expansion splits "A and B clashed with C" into one mention per role
//! combination. Mentions that share an original event id and an event code
//! are merged back into one mention whose roles carry every actor seen. When
//! the same actor shows up as both source and target, the merged mention is
//! marked reciprocal and keeps only the source role.

use super::mention::{EventMention, EventMentionSet, Participant};
use super::Context;
use crate::actors::ActorMentionId;
use crate::catalog::{SOURCE, TARGET};
use std::collections::{BTreeMap, BTreeSet};

/// Replace every cluster of `events` by one merged mention. Returns the
/// number of mentions afterwards.
pub(crate) fn unbinarize(ctx: Context<'_>, events: &mut EventMentionSet) -> usize {
    let mut clusters: BTreeMap<(u32, String), Vec<EventMention>> = BTreeMap::new();
    for em in events.take_all() {
        // A retyped copy keeps its original id but must not merge with its source.
        let code = ctx.catalog.event_types.get(em.event_type).code.clone();
        clusters.entry((em.original_event_id, code)).or_default().push(em);
    }
    for ((original, code), cluster) in clusters {
        let Some(merged) = merge(cluster) else {
            continue;
        };
        tracing::debug!(original, code = %code, participants = merged.participants.len(), "unbinarized event");
        events.add(merged);
    }
    events.len()
}

fn merge(cluster: Vec<EventMention>) -> Option<EventMention> {
    let mut roles: BTreeMap<String, BTreeSet<ActorMentionId>> = BTreeMap::new();
    for em in &cluster {
        for p in &em.participants {
            roles.entry(p.role.clone()).or_default().insert(p.actor);
        }
    }
    let reciprocal = match (roles.get(SOURCE), roles.get(TARGET)) {
        (Some(sources), Some(targets)) => !sources.is_disjoint(targets),
        _ => false,
    };
    let participants = roles
        .into_iter()
        .filter(|(role, _)| !(reciprocal && role == TARGET))
        .flat_map(|(role, actors)| actors.into_iter().map(move |a| Participant::new(role.clone(), a)))
        .collect();

    let mut representative = cluster.into_iter().next()?;
    representative.participants = participants;
    representative.reciprocal = reciprocal;
    Some(representative)
}
