//! Actor mentions and the actor-info catalog.
//!
//! An actor mention ties an entity mention to a resolved political actor. It
//! comes in three shapes:
//!
//! ```text
//! ProperNoun   "Syria"                 -> actor SYR (optionally a resolved geo)
//! Composite    "Syrian rebels"         -> agent REB FOR actor SYR
//! Unknown      "gunmen"                -> nothing resolved
//! ```
//!
//! Mentions live in an [`ActorMentionSet`] arena and are referenced by
//! [`ActorMentionId`]. The only mutation after construction is filling in a
//! composite's paired actor (label propagation and location defaulting), which
//! later pattern applications in the same document observe.

use crate::document::MentionId;
use crate::error::read_to_string;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentifiers {
    pub id: ActorId,
    pub code: String,
    /// Id of the actor pattern that produced the resolution, if any.
    #[serde(default)]
    pub pattern_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentifiers {
    pub id: AgentId,
    pub code: String,
    #[serde(default)]
    pub pattern_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoResolution {
    /// ISO country code of the resolved place.
    pub country_code: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorKind {
    ProperNoun {
        actor: ActorIdentifiers,
        #[serde(default)]
        geo: Option<GeoResolution>,
    },
    Composite {
        agent: AgentIdentifiers,
        #[serde(default)]
        paired_actor: Option<ActorIdentifiers>,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorMention {
    pub mention: MentionId,
    /// Free-form provenance note ("EVENT-BASED-LOC:", "PROPAGATE_EVENT_ACTOR_LABEL", ...).
    #[serde(default)]
    pub source_note: String,
    #[serde(flatten)]
    pub kind: ActorKind,
}

impl ActorMention {
    pub fn unknown(mention: MentionId) -> Self {
        Self { mention, source_note: "UNKNOWN_ACTOR".to_string(), kind: ActorKind::Unknown }
    }

    pub fn is_proper_noun(&self) -> bool {
        matches!(self.kind, ActorKind::ProperNoun { .. })
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, ActorKind::Composite { .. })
    }

    pub fn is_resolved_geo(&self) -> bool {
        matches!(self.kind, ActorKind::ProperNoun { geo: Some(_), .. })
    }

    pub fn geo(&self) -> Option<&GeoResolution> {
        match &self.kind {
            ActorKind::ProperNoun { geo, .. } => geo.as_ref(),
            _ => None,
        }
    }

    /// Actor of a proper noun, or the paired actor of a composite.
    pub fn identified_actor(&self) -> Option<&ActorIdentifiers> {
        match &self.kind {
            ActorKind::ProperNoun { actor, .. } => Some(actor),
            ActorKind::Composite { paired_actor, .. } => paired_actor.as_ref(),
            ActorKind::Unknown => None,
        }
    }

    pub fn identified_actor_id(&self) -> Option<ActorId> {
        self.identified_actor().map(|a| a.id)
    }

    pub fn paired_agent_id(&self) -> Option<AgentId> {
        match &self.kind {
            ActorKind::Composite { agent, .. } => Some(agent.id),
            _ => None,
        }
    }
}

impl fmt::Display for ActorMention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActorKind::ProperNoun { actor, .. } => write!(f, "{}[{}]", actor.code, actor.id),
            ActorKind::Composite { agent, paired_actor } => {
                let actor = paired_actor.as_ref().map(|a| a.code.as_str()).unwrap_or("UNKNOWN");
                write!(f, "{} FOR {}", agent.code, actor)
            }
            ActorKind::Unknown => f.write_str("UNKNOWN_ACTOR"),
        }
    }
}

/// Index into an [`ActorMentionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorMentionId(pub usize);

/// Arena of the document's actor mentions, one per entity mention at most.
#[derive(Debug, Clone, Default)]
pub struct ActorMentionSet {
    mentions: Vec<ActorMention>,
    by_mention: HashMap<MentionId, ActorMentionId>,
}

impl ActorMentionSet {
    pub fn new(mentions: Vec<ActorMention>) -> Self {
        let mut set = Self::default();
        for m in mentions {
            set.add(m);
        }
        set
    }

    /// Add a mention; a later mention for the same entity mention replaces the earlier one.
    pub fn add(&mut self, mention: ActorMention) -> ActorMentionId {
        if let Some(&id) = self.by_mention.get(&mention.mention) {
            self.mentions[id.0] = mention;
            return id;
        }
        let id = ActorMentionId(self.mentions.len());
        self.by_mention.insert(mention.mention, id);
        self.mentions.push(mention);
        id
    }

    pub fn find(&self, mention: MentionId) -> Option<ActorMentionId> {
        self.by_mention.get(&mention).copied()
    }

    /// Find the actor mention for `mention`, creating a generic unknown one if needed.
    pub fn find_or_add_unknown(&mut self, mention: MentionId) -> ActorMentionId {
        match self.find(mention) {
            Some(id) => id,
            None => self.add(ActorMention::unknown(mention)),
        }
    }

    pub fn get(&self, id: ActorMentionId) -> &ActorMention {
        &self.mentions[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActorMentionId, &ActorMention)> {
        self.mentions.iter().enumerate().map(|(i, m)| (ActorMentionId(i), m))
    }

    pub fn len(&self) -> usize {
        self.mentions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }

    /// Prefix `note:` to the mention's source note.
    pub fn add_source_note(&mut self, id: ActorMentionId, note: &str) {
        let mention = &mut self.mentions[id.0];
        mention.source_note = format!("{note}:{}", mention.source_note);
    }

    /// Fill in the paired actor of a composite mention. Returns false (and
    /// changes nothing) for any other kind of mention.
    pub fn set_paired_actor(&mut self, id: ActorMentionId, actor: ActorIdentifiers, note: &str) -> bool {
        let mention = &mut self.mentions[id.0];
        match &mut mention.kind {
            ActorKind::Composite { paired_actor, .. } => {
                *paired_actor = Some(actor);
                mention.source_note = format!("{}{}", note, mention.source_note);
                true
            }
            _ => false,
        }
    }

    /// First resolved-geo proper noun whose country code is `iso`.
    pub fn find_country(&self, iso: &str) -> Option<ActorMentionId> {
        self.iter().find(|(_, m)| m.geo().is_some_and(|g| g.country_code == iso)).map(|(id, _)| id)
    }
}

// --- Actor info catalog -------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRecord {
    pub id: ActorId,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_country: bool,
    #[serde(default)]
    pub iso_code: Option<String>,
    #[serde(default)]
    pub sectors: Vec<String>,
    /// Countries the actor belongs to (itself, for a country).
    #[serde(default)]
    pub countries: Vec<ActorId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ActorInfoFile {
    #[serde(default)]
    actors: Vec<ActorRecord>,
    #[serde(default)]
    agents: Vec<AgentRecord>,
}

/// Read-only facts about actors and agents, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ActorInfo {
    actors: HashMap<ActorId, ActorRecord>,
    agents: HashMap<AgentId, AgentRecord>,
}

impl ActorInfo {
    pub fn new(actors: Vec<ActorRecord>, agents: Vec<AgentRecord>) -> Self {
        Self {
            actors: actors.into_iter().map(|a| (a.id, a)).collect(),
            agents: agents.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: ActorInfoFile = serde_json::from_str(&read_to_string(path)?)?;
        Ok(Self::new(file.actors, file.agents))
    }

    pub fn actor(&self, id: ActorId) -> Option<&ActorRecord> {
        self.actors.get(&id)
    }

    pub fn agent_code(&self, id: AgentId) -> Option<&str> {
        self.agents.get(&id).map(|a| a.code.as_str())
    }

    pub fn iso_code(&self, id: ActorId) -> Option<&str> {
        self.actor(id).and_then(|a| a.iso_code.as_deref())
    }

    pub fn is_country(&self, id: ActorId) -> bool {
        self.actor(id).is_some_and(|a| a.is_country)
    }

    pub fn sectors(&self, id: ActorId) -> &[String] {
        self.actor(id).map(|a| a.sectors.as_slice()).unwrap_or(&[])
    }

    pub fn countries(&self, id: ActorId) -> Vec<ActorId> {
        match self.actor(id) {
            Some(a) if a.is_country && a.countries.is_empty() => vec![a.id],
            Some(a) => a.countries.clone(),
            None => Vec::new(),
        }
    }

    /// The document's default country: the resolved-geo country actor
    /// mentioned most often, ties going to the one mentioned first.
    pub fn default_country(&self, actors: &ActorMentionSet) -> Option<ActorMentionId> {
        let mut counts: Vec<(ActorId, usize, ActorMentionId)> = Vec::new();
        for (id, mention) in actors.iter() {
            let ActorKind::ProperNoun { actor, geo: Some(_) } = &mention.kind else {
                continue;
            };
            if !self.is_country(actor.id) {
                continue;
            }
            match counts.iter_mut().find(|(a, _, _)| *a == actor.id) {
                Some(entry) => entry.1 += 1,
                None => counts.push((actor.id, 1, id)),
            }
        }
        let mut best: Option<&(ActorId, usize, ActorMentionId)> = None;
        for entry in &counts {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(_, _, first)| *first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(sentence: usize, index: usize, id: u32, code: &str, iso: Option<&str>) -> ActorMention {
        ActorMention {
            mention: MentionId::new(sentence, index),
            source_note: String::new(),
            kind: ActorKind::ProperNoun {
                actor: ActorIdentifiers { id: ActorId(id), code: code.into(), pattern_id: None },
                geo: iso.map(|c| GeoResolution { country_code: c.into(), name: None }),
            },
        }
    }

    fn country(id: u32, code: &str, iso: &str) -> ActorRecord {
        ActorRecord {
            id: ActorId(id),
            code: code.into(),
            name: code.into(),
            is_country: true,
            iso_code: Some(iso.into()),
            sectors: vec![],
            countries: vec![],
        }
    }

    #[test]
    fn paired_actor_only_set_on_composites() {
        let composite = ActorMention {
            mention: MentionId::new(0, 0),
            source_note: String::new(),
            kind: ActorKind::Composite {
                agent: AgentIdentifiers { id: AgentId(3), code: "REB".into(), pattern_id: None },
                paired_actor: None,
            },
        };
        let mut set = ActorMentionSet::new(vec![composite, pn(0, 1, 7, "SYR", Some("SY"))]);
        let syr = ActorIdentifiers { id: ActorId(7), code: "SYR".into(), pattern_id: None };

        assert!(set.set_paired_actor(ActorMentionId(0), syr.clone(), "EVENT-BASED-LOC:"));
        assert!(!set.set_paired_actor(ActorMentionId(1), syr, "x"));
        let m = set.get(ActorMentionId(0));
        assert_eq!(m.identified_actor_id(), Some(ActorId(7)));
        assert_eq!(m.source_note, "EVENT-BASED-LOC:");
        assert_eq!(m.to_string(), "REB FOR SYR");
    }

    #[test]
    fn unknown_actors_are_created_once() {
        let mut set = ActorMentionSet::default();
        let a = set.find_or_add_unknown(MentionId::new(1, 2));
        let b = set.find_or_add_unknown(MentionId::new(1, 2));
        assert_eq!(a, b);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(a).to_string(), "UNKNOWN_ACTOR");
    }

    #[test]
    fn default_country_prefers_most_frequent_then_first() {
        let info = ActorInfo::new(vec![country(1, "SYR", "SY"), country(2, "LBN", "LB")], vec![]);
        let set = ActorMentionSet::new(vec![
            pn(0, 0, 2, "LBN", Some("LB")),
            pn(0, 1, 1, "SYR", Some("SY")),
            pn(1, 0, 1, "SYR", Some("SY")),
        ]);
        assert_eq!(info.default_country(&set), Some(ActorMentionId(1)));

        let tie = ActorMentionSet::new(vec![pn(0, 0, 2, "LBN", Some("LB")), pn(0, 1, 1, "SYR", Some("SY"))]);
        assert_eq!(info.default_country(&tie), Some(ActorMentionId(0)));
        assert_eq!(tie.find_country("SY"), Some(ActorMentionId(1)));
        assert_eq!(info.countries(ActorId(1)), vec![ActorId(1)]);
    }
}
