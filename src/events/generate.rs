//! From top-level matches to event mentions.
//!
//! ```text
//! FeatureSet ── MatchData::extract ── check ──┬── paired-actor location
//!                                             ├── tense
//!                                             └── expand (role combinations)
//!                                                   │
//!                                                   ▼
//!                                             EventMention x N
//! ```
//!
//! A single match may bind several mentions to one role ("rebels and
//! soldiers attacked"). Expansion produces one event per combination and
//! drops combinations where one entity would fill two roles that may not
//! share an entity.

use super::mention::{EventMention, EventMentionSet, Participant, Tense};
use super::{tense, Context};
use crate::actors::{ActorId, ActorKind, ActorMentionId, ActorMentionSet};
use crate::catalog::{EventType, EventTypeId, EventTypeRegistry};
use crate::document::{ArgValue, Document, MentionId, PropRef, TimeRef};
use crate::matcher::{EntityLabels, Feature, FeatureSet, Matcher, Target};
use crate::pattern::PatternSet;
use std::collections::HashMap;

pub(crate) const NO_PATTERN_ID: &str = "NO_PATTERN_ID";

/// One top-level match, reduced to what event generation needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchData {
    pub event_code: String,
    pub blocked: bool,
    /// Raw `event-tense` return value.
    pub tense: Option<String>,
    pub pattern_label: Option<String>,
    /// Role to candidate mentions, roles in first-seen order.
    pub roles: Vec<(String, Vec<MentionId>)>,
    pub propositions: Vec<PropRef>,
    pub time_mention: Option<TimeRef>,
}

impl MatchData {
    /// Read codes, roles and propositions off a match; `default_code` is the
    /// code the pattern set was registered under.
    pub fn extract(
        fs: &FeatureSet,
        default_code: &str,
        registry: &EventTypeRegistry,
        doc: &Document,
        actors: &ActorMentionSet,
    ) -> Self {
        let mut md = MatchData {
            event_code: default_code.to_string(),
            pattern_label: fs.label().map(str::to_string),
            ..MatchData::default()
        };
        for feature in &fs.features {
            match feature {
                Feature::Matched { target: Target::Proposition(r), .. } if !md.propositions.contains(r) => {
                    md.propositions.push(*r);
                }
                Feature::Return { ret, target, .. } => {
                    if ret.signals("BLOCK") {
                        md.blocked = true;
                        return md;
                    }
                    if let (Some(label), Some(mention)) = (&ret.label, target.mention(actors)) {
                        for role in label.split('+').map(str::trim).filter(|r| !r.is_empty()) {
                            md.add_role(role, mention);
                        }
                    }
                    if let Some(code) = ret.value("event-code") {
                        if md.event_code == default_code || code_overrides(registry, code, &md.event_code) {
                            md.event_code = code.to_string();
                        }
                    }
                    if let Some(t) = ret.value("event-tense") {
                        md.tense = Some(t.to_string());
                    }
                }
                _ => {}
            }
        }
        md.time_mention = md.propositions.iter().find_map(|&r| {
            doc.proposition(r)?.arguments.iter().find_map(|a| match a.value {
                ArgValue::Time(index) => Some(TimeRef { sentence: r.sentence, index }),
                _ => None,
            })
        });
        md
    }

    fn add_role(&mut self, role: &str, mention: MentionId) {
        match self.roles.iter_mut().find(|(r, _)| r == role) {
            Some((_, mentions)) if !mentions.contains(&mention) => mentions.push(mention),
            Some(_) => {}
            None => self.roles.push((role.to_string(), vec![mention])),
        }
    }

    pub fn role_mentions(&self, role: &str) -> &[MentionId] {
        self.roles.iter().find(|(r, _)| r == role).map(|(_, m)| m.as_slice()).unwrap_or(&[])
    }

    pub fn label(&self) -> &str {
        self.pattern_label.as_deref().unwrap_or(NO_PATTERN_ID)
    }

    /// Validate against the event type. Soft failures are logged and reject
    /// the match; an invalid tense is logged and reset to neutral.
    pub fn check(&mut self, registry: &EventTypeRegistry) -> Option<EventTypeId> {
        if self.pattern_label.is_none() {
            tracing::warn!(code = %self.event_code, "match without a pattern label");
            self.pattern_label = Some(NO_PATTERN_ID.to_string());
        }
        if self.blocked {
            tracing::debug!(pattern = self.label(), "match blocked");
            return None;
        }
        let Some(type_id) = registry.id_of(&self.event_code) else {
            tracing::warn!(pattern = self.label(), code = %self.event_code, "unknown event code");
            return None;
        };
        let ty = registry.get(type_id);
        if let Some(raw) = &self.tense {
            if Tense::parse(raw).is_none() {
                tracing::warn!(pattern = self.label(), tense = %raw, "unknown event tense; using neutral");
                self.tense = None;
            }
        }
        if let Some((role, _)) = self.roles.iter().find(|(role, _)| !ty.has_role(role)) {
            tracing::warn!(pattern = self.label(), code = %ty.code, role = %role, "unexpected role for event type");
            return None;
        }
        if let Some(role) = ty.required_roles.iter().find(|r| self.role_mentions(r).is_empty()) {
            tracing::warn!(pattern = self.label(), code = %ty.code, role = %role, "missing required role");
            return None;
        }
        if self.roles.is_empty() {
            tracing::warn!(pattern = self.label(), code = %ty.code, "match without participants");
            return None;
        }
        Some(type_id)
    }
}

fn code_overrides(registry: &EventTypeRegistry, new: &str, existing: &str) -> bool {
    registry.lookup(new).is_some_and(|t| t.overrides_code(existing))
}

// --- Expansion -----------------------------------------------------------------

/// Every role assignment of `md` that respects entity sharing rules.
pub(crate) fn role_combinations(md: &MatchData, ty: &EventType, doc: &Document) -> Vec<Vec<(String, MentionId)>> {
    let mut out = Vec::new();
    let mut chosen = Vec::new();
    expand_roles(&md.roles, ty, doc, &mut chosen, &mut out);
    out
}

fn expand_roles(
    roles: &[(String, Vec<MentionId>)],
    ty: &EventType,
    doc: &Document,
    chosen: &mut Vec<(String, MentionId)>,
    out: &mut Vec<Vec<(String, MentionId)>>,
) {
    let Some(((role, mentions), rest)) = roles.split_first() else {
        out.push(chosen.clone());
        return;
    };
    for &mention in mentions {
        let entity = doc.entity_of(mention);
        let clash = chosen.iter().any(|(other_role, other)| {
            let same = *other == mention || (entity.is_some() && doc.entity_of(*other) == entity);
            same && !ty.roles_can_share_entity(role, other_role)
        });
        if clash {
            continue;
        }
        chosen.push((role.clone(), mention));
        expand_roles(rest, ty, doc, chosen, out);
        chosen.pop();
    }
}

/// Turn a checked match into event mentions, creating unknown actor mentions
/// for participants nobody resolved.
pub(crate) fn expand(
    md: &MatchData,
    type_id: EventTypeId,
    ctx: Context<'_>,
    actors: &mut ActorMentionSet,
    tense: Tense,
    original_event_id: u32,
) -> Vec<EventMention> {
    let ty = ctx.catalog.event_types.get(type_id);
    role_combinations(md, ty, ctx.doc)
        .into_iter()
        .map(|combo| {
            let participants =
                combo.into_iter().map(|(role, m)| Participant::new(role, actors.find_or_add_unknown(m))).collect();
            let mut em = EventMention::new(type_id, participants, md.label());
            em.tense = tense;
            em.time_mention = md.time_mention;
            em.propositions = md.propositions.clone();
            em.original_event_id = original_event_id;
            em
        })
        .collect()
}

// --- Paired-actor location -----------------------------------------------------

/// A located proper-noun actor named by an `in`/`near`/`outside`/`inside`
/// argument of the match's propositions.
pub(crate) fn paired_actor_location(fs: &FeatureSet, doc: &Document, actors: &ActorMentionSet) -> Option<ActorMentionId> {
    for target in fs.matched() {
        let r = match target {
            Target::Proposition(r) => r,
            Target::Mention(m) => {
                let Some(index) = doc.sentences.get(m.sentence).and_then(|s| s.definition_index(m.index)) else {
                    continue;
                };
                PropRef { sentence: m.sentence, index }
            }
            _ => continue,
        };
        let Some(prop) = doc.proposition(r) else {
            continue;
        };
        for arg in &prop.arguments {
            if !matches!(arg.role.as_str(), "in" | "near" | "outside" | "inside") {
                continue;
            }
            let ArgValue::Mention(index) = arg.value else {
                continue;
            };
            let mention_id = MentionId::new(r.sentence, index);
            let Some(mention) = doc.mention(mention_id) else {
                continue;
            };
            let head = mention.head_word.to_lowercase();
            if head == "embassy" || head == "consulate" || !mention.is_location_like() {
                continue;
            }
            if let Some(a) = actors.find(mention_id).filter(|&a| actors.get(a).is_proper_noun()) {
                return Some(a);
            }
        }
    }
    None
}

/// Pair every unpaired composite participant of `md` with `location`.
pub(crate) fn set_default_locations(
    md: &MatchData,
    location: ActorMentionId,
    doc: &Document,
    actors: &mut ActorMentionSet,
    blocked: &HashMap<MentionId, String>,
) {
    let ActorKind::ProperNoun { actor: place, .. } = &actors.get(location).kind else {
        return;
    };
    let place = place.clone();
    for (_, mentions) in &md.roles {
        for &m in mentions {
            let Some(a) = actors.find(m) else {
                continue;
            };
            if !matches!(actors.get(a).kind, ActorKind::Composite { paired_actor: None, .. }) {
                continue;
            }
            if let Some(sister) = clashing_sister(doc, actors, m, place.id) {
                tracing::info!(mention = %m, sister = %sister, actor = %place.code, "default location blocked by coreferent actor");
                continue;
            }
            if let Some(pattern) = blocked.get(&m) {
                tracing::info!(mention = %m, pattern = %pattern, "paired-actor location blocked");
                continue;
            }
            actors.set_paired_actor(a, place.clone(), "EVENT-BASED-LOC:");
            tracing::info!(mention = %m, actor = %place.code, pattern = md.label(), "paired actor set from event location");
        }
    }
}

/// A mention coreferent with `mention` whose actor is identified as something
/// other than `proposed`. Unpaired composites never clash.
fn clashing_sister(doc: &Document, actors: &ActorMentionSet, mention: MentionId, proposed: ActorId) -> Option<MentionId> {
    let entity = doc.entity_of(mention)?;
    doc.sentences
        .iter()
        .enumerate()
        .flat_map(|(s, sent)| {
            sent.mentions.iter().enumerate().filter(|(_, m)| m.entity == Some(entity)).map(move |(i, _)| MentionId::new(s, i))
        })
        .find(|&sister| {
            actors
                .find(sister)
                .and_then(|a| actors.get(a).identified_actor_id())
                .is_some_and(|id| id != proposed)
        })
}

/// Mentions the `block_paired_actor_location` set returns, with the label of
/// the pattern that blocked them.
pub(crate) fn paired_location_blocks(
    set: &PatternSet,
    ctx: Context<'_>,
    actors: &ActorMentionSet,
) -> HashMap<MentionId, String> {
    let labels = EntityLabels::compute(set, ctx.doc, ctx.catalog, actors);
    let matcher = Matcher::new(set, ctx.doc, ctx.catalog, actors, None, &labels);
    let mut blocked = HashMap::new();
    for fs in matcher.all_matches() {
        let label = fs.label().unwrap_or(super::UNLABELED_PATTERN).to_string();
        for (_, target) in fs.returns() {
            if let Some(m) = target.mention(actors) {
                blocked.entry(m).or_insert_with(|| label.clone());
            }
        }
    }
    blocked
}

// --- Applying a pattern set ----------------------------------------------------

/// Inputs for one application of a main event pattern set.
pub(crate) struct EventPatternRun<'r> {
    pub set: &'r PatternSet,
    pub default_code: &'r str,
    pub sentence_limit: usize,
    pub blocked_locations: &'r HashMap<MentionId, String>,
}

/// Match `run.set` sentence by sentence and add the resulting events.
/// Returns the number of events added.
pub(crate) fn apply_event_patterns(
    run: &EventPatternRun<'_>,
    ctx: Context<'_>,
    actors: &mut ActorMentionSet,
    events: &mut EventMentionSet,
    next_original_id: &mut u32,
) -> usize {
    let registry = &ctx.catalog.event_types;
    let labels = EntityLabels::compute(run.set, ctx.doc, ctx.catalog, actors);
    let mut added = 0;
    for sentence in 0..run.sentence_limit.min(ctx.doc.sentences.len()) {
        // Later sentences see paired actors set by earlier matches.
        let matches = Matcher::new(run.set, ctx.doc, ctx.catalog, actors, None, &labels).sentence_matches(sentence);
        for fs in matches {
            let mut md = MatchData::extract(&fs, run.default_code, registry, ctx.doc, actors);
            let Some(type_id) = md.check(registry) else {
                continue;
            };
            if let Some(location) = paired_actor_location(&fs, ctx.doc, actors) {
                set_default_locations(&md, location, ctx.doc, actors, run.blocked_locations);
            }
            let tense = match md.tense.as_deref().and_then(Tense::parse) {
                Some(t) => t,
                None => tense::detect(ctx.doc, &fs, &md.event_code, sentence).unwrap_or_default(),
            };
            let original_id = *next_original_id;
            *next_original_id += 1;
            for em in expand(&md, type_id, ctx, actors, tense, original_id) {
                tracing::debug!(pattern = md.label(), code = %md.event_code, sentence, "event mention");
                events.add(em);
                added += 1;
            }
        }
    }
    added
}
