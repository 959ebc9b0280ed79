//! Event mentions and the per-document set that owns them.

use crate::actors::{ActorKind, ActorMentionId, ActorMentionSet};
use crate::catalog::{EventTypeId, EventTypeRegistry};
use crate::document::{Document, PropRef, TimeRef};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventMentionId(pub usize);

impl fmt::Display for EventMentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tense {
    #[default]
    Neutral,
    Current,
    Historical,
    Ongoing,
    /// No document date, so nothing could be judged.
    Unavailable,
}

impl Tense {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" => Some(Tense::Neutral),
            "current" => Some(Tense::Current),
            "historical" => Some(Tense::Historical),
            "ongoing" => Some(Tense::Ongoing),
            "unavailable" | "null" => Some(Tense::Unavailable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tense::Neutral => "neutral",
            Tense::Current => "current",
            Tense::Historical => "historical",
            Tense::Ongoing => "ongoing",
            Tense::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Tense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub role: String,
    pub actor: ActorMentionId,
}

impl Participant {
    pub fn new(role: impl Into<String>, actor: ActorMentionId) -> Self {
        Self { role: role.into(), actor }
    }
}

#[derive(Debug, Clone)]
pub struct EventMention {
    pub id: EventMentionId,
    pub event_type: EventTypeId,
    /// In insertion order; a role may repeat after un-binarization.
    pub participants: Vec<Participant>,
    pub pattern_id: String,
    pub tense: Tense,
    pub time_mention: Option<TimeRef>,
    pub propositions: Vec<PropRef>,
    /// Shared by every mention expanded from the same raw match.
    pub original_event_id: u32,
    pub reciprocal: bool,
}

impl EventMention {
    /// A mention with no id yet; [`EventMentionSet::add`] assigns one.
    pub fn new(event_type: EventTypeId, participants: Vec<Participant>, pattern_id: impl Into<String>) -> Self {
        Self {
            id: EventMentionId(usize::MAX),
            event_type,
            participants,
            pattern_id: pattern_id.into(),
            tense: Tense::Neutral,
            time_mention: None,
            propositions: Vec::new(),
            original_event_id: 0,
            reciprocal: false,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.participants.iter().any(|p| p.role == role)
    }

    pub fn actors_in<'a>(&'a self, role: &'a str) -> impl Iterator<Item = ActorMentionId> + 'a {
        self.participants.iter().filter(move |p| p.role == role).map(|p| p.actor)
    }

    /// Sentence of the first participant.
    pub fn sentence(&self, actors: &ActorMentionSet) -> Option<usize> {
        self.participants.first().map(|p| actors.get(p.actor).mention.sentence)
    }

    /// Every sentence some participant is mentioned in.
    pub fn sentences(&self, actors: &ActorMentionSet) -> BTreeSet<usize> {
        self.participants.iter().map(|p| actors.get(p.actor).mention.sentence).collect()
    }

    /// The ICEWS sentence holding the most participants; ties go to the lowest.
    pub fn icews_sentence_number(&self, doc: &Document, actors: &ActorMentionSet) -> usize {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for p in &self.participants {
            *counts.entry(doc.icews_sentence_no(actors.get(p.actor).mention.sentence)).or_default() += 1;
        }
        let mut best = (0, 0);
        for (sent, count) in counts {
            if count > best.1 {
                best = (sent, count);
            }
        }
        best.0
    }

    /// Every participant resolves to an identified actor.
    pub fn is_database_worthy(&self, actors: &ActorMentionSet) -> bool {
        self.participants.iter().all(|p| match &actors.get(p.actor).kind {
            ActorKind::ProperNoun { .. } => true,
            ActorKind::Composite { paired_actor, .. } => paired_actor.is_some(),
            ActorKind::Unknown => false,
        })
    }

    pub fn dump(&self, registry: &EventTypeRegistry, actors: &ActorMentionSet, doc: &Document) -> String {
        let ty = registry.get(self.event_type);
        let mut out = format!("EVENT-{} ({})\nTense: {}\nPattern: {}", ty.code, ty.name, self.tense, self.pattern_id);
        if self.reciprocal {
            out.push_str("\nReciprocal");
        }
        for p in &self.participants {
            let actor = actors.get(p.actor);
            let text = doc.mention(actor.mention).map(|m| m.text.as_str()).unwrap_or("");
            let _ = write!(out, "\n  {}: {}\n          \"{}\"", p.role, actor, text);
        }
        out
    }
}

/// The document's event mentions, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EventMentionSet {
    events: Vec<EventMention>,
    next_id: usize,
}

impl EventMentionSet {
    pub fn add(&mut self, mut event: EventMention) -> EventMentionId {
        event.id = EventMentionId(self.next_id);
        self.next_id += 1;
        let id = event.id;
        self.events.push(event);
        id
    }

    pub fn get(&self, id: EventMentionId) -> Option<&EventMention> {
        self.position(id).map(|i| &self.events[i])
    }

    pub fn get_mut(&mut self, id: EventMentionId) -> Option<&mut EventMention> {
        self.position(id).map(move |i| &mut self.events[i])
    }

    fn position(&self, id: EventMentionId) -> Option<usize> {
        // Ids grow monotonically and removal keeps order, so the list stays sorted by id.
        self.events.binary_search_by_key(&id, |e| e.id).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventMention> {
        self.events.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EventMention> {
        self.events.iter_mut()
    }

    pub fn ids(&self) -> Vec<EventMentionId> {
        self.events.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove every listed mention; returns how many were removed.
    pub fn remove(&mut self, doomed: &HashSet<EventMentionId>) -> usize {
        let before = self.events.len();
        self.events.retain(|e| !doomed.contains(&e.id));
        before - self.events.len()
    }

    /// Drop every mention and hand them back, keeping the id counter.
    pub(crate) fn take_all(&mut self) -> Vec<EventMention> {
        std::mem::take(&mut self.events)
    }
}
