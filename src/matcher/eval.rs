//! Per-kind matching.
//!
//! `match_target` matches one pattern against one candidate; the
//! `matches_in_*` helpers enumerate candidates for a scope. Block constraints
//! are checked before positive ones so a blocked candidate never pays for
//! sub-pattern unification.

use super::features::{Feature, FeatureSet, Target};
use super::unify::Bindings;
use super::Matcher;
use crate::actors::{ActorId, ActorKind, ActorMentionId};
use crate::document::{ArgValue, MentionId, PropRef};
use crate::events::{EventMention, EventMentionId};
use crate::pattern::{
    ActorPattern, ActorShape, ArgPattern, Combinator, EventPattern, MentionPattern, PatternId, PatternKind,
    PropPattern,
};
use std::collections::BTreeSet;

impl Matcher<'_> {
    // --- Scopes -------------------------------------------------------------------

    pub(crate) fn matches_in_sentence(&self, id: PatternId, sentence: usize) -> Vec<FeatureSet> {
        let Some(sent) = self.doc.sentences.get(sentence) else {
            return Vec::new();
        };
        let scope = Target::Sentence(sentence);
        let candidates: Vec<Target> = match &self.set.pattern(id).kind {
            PatternKind::Combination(op, members) => {
                return self.combine_in_sentence(id, *op, members, sentence);
            }
            PatternKind::Shortcut(_) => return Vec::new(),
            PatternKind::Regex(_) => vec![scope],
            PatternKind::Actor(_) => self
                .actors
                .iter()
                .filter(|(_, a)| a.mention.sentence == sentence)
                .map(|(a, _)| Target::Actor(a))
                .collect(),
            PatternKind::Mention(_) => {
                (0..sent.mentions.len()).map(|i| Target::Mention(MentionId::new(sentence, i))).collect()
            }
            PatternKind::Proposition(_) => {
                (0..sent.propositions.len()).map(|index| Target::Proposition(PropRef { sentence, index })).collect()
            }
            PatternKind::Event(_) => match self.events {
                Some(events) => events
                    .iter()
                    .filter(|e| e.sentences(self.actors).contains(&sentence))
                    .map(|e| Target::Event(e.id))
                    .collect(),
                None => Vec::new(),
            },
        };
        candidates.into_iter().filter_map(|t| self.match_target(id, t)).collect()
    }

    fn combine_in_sentence(
        &self,
        id: PatternId,
        op: Combinator,
        members: &[PatternId],
        sentence: usize,
    ) -> Vec<FeatureSet> {
        let scope = Target::Sentence(sentence);
        match op {
            Combinator::AllOf => {
                let mut fs = FeatureSet::default();
                let mut bindings = Bindings::default();
                for &member in members {
                    let found = self
                        .matches_in_sentence(member, sentence)
                        .into_iter()
                        .find(|m| self.admit(member, &mut bindings, m));
                    match found {
                        Some(m) => fs.absorb(m),
                        None => return Vec::new(),
                    }
                }
                vec![self.finish(id, scope, fs)]
            }
            Combinator::AnyOf => {
                for &member in members {
                    let found = self.matches_in_sentence(member, sentence);
                    if !found.is_empty() {
                        return found.into_iter().map(|m| self.finish(id, scope, m)).collect();
                    }
                }
                Vec::new()
            }
            Combinator::NoneOf => {
                if members.iter().any(|&m| !self.matches_in_sentence(m, sentence).is_empty()) {
                    Vec::new()
                } else {
                    vec![self.finish(id, scope, FeatureSet::default())]
                }
            }
        }
    }

    pub(crate) fn matches_in_document(&self, id: PatternId) -> Vec<FeatureSet> {
        match &self.set.pattern(id).kind {
            PatternKind::Event(_) => {
                let Some(events) = self.events else {
                    return Vec::new();
                };
                events.ids().into_iter().filter_map(|e| self.match_target(id, Target::Event(e))).collect()
            }
            PatternKind::Actor(_) => {
                self.actors.iter().filter_map(|(a, _)| self.match_target(id, Target::Actor(a))).collect()
            }
            _ => (0..self.doc.sentences.len()).flat_map(|s| self.matches_in_sentence(id, s)).collect(),
        }
    }

    // --- Single candidate ---------------------------------------------------------

    pub(crate) fn match_target(&self, id: PatternId, target: Target) -> Option<FeatureSet> {
        let fs = match (&self.set.pattern(id).kind, target) {
            (PatternKind::Actor(p), Target::Actor(a)) => self.match_actor(p, a)?,
            (PatternKind::Actor(_), Target::Mention(m)) => {
                return self.match_target(id, Target::Actor(self.actors.find(m)?));
            }
            (PatternKind::Mention(p), Target::Mention(m)) => self.match_mention(p, m)?,
            (PatternKind::Mention(_), Target::Actor(a)) => {
                return self.match_target(id, Target::Mention(self.actors.get(a).mention));
            }
            (PatternKind::Proposition(p), Target::Proposition(r)) => self.match_proposition(p, r)?,
            (PatternKind::Proposition(_), Target::Mention(m)) => {
                let index = self.doc.sentences.get(m.sentence)?.definition_index(m.index)?;
                return self.match_target(id, Target::Proposition(PropRef { sentence: m.sentence, index }));
            }
            (PatternKind::Regex(re), Target::Sentence(s)) => {
                if !re.is_match(&self.doc.sentences.get(s)?.text()) {
                    return None;
                }
                FeatureSet::default()
            }
            (PatternKind::Regex(re), Target::Mention(m)) => {
                if !re.is_match(&self.doc.mention(m)?.text) {
                    return None;
                }
                FeatureSet::default()
            }
            (PatternKind::Event(p), Target::Event(e)) => self.match_event_mention(id, p, e)?,
            (PatternKind::Combination(op, members), t) => self.combine_on_target(*op, members, t)?,
            _ => return None,
        };
        Some(self.finish(id, target, fs))
    }

    /// Record the match of `id` on `target` and its return value, if any.
    fn finish(&self, id: PatternId, target: Target, mut fs: FeatureSet) -> FeatureSet {
        let header = &self.set.pattern(id).header;
        fs.features.push(Feature::Matched { pattern: id, target });
        if let Some(ret) = &header.ret {
            fs.features.push(Feature::Return { pattern: id, ret: ret.clone(), target });
        }
        if let Some(score) = header.score {
            fs.score = Some(fs.score.map_or(score, |s| s.max(score)));
        }
        fs
    }

    fn combine_on_target(&self, op: Combinator, members: &[PatternId], target: Target) -> Option<FeatureSet> {
        match op {
            Combinator::AllOf => {
                let mut fs = FeatureSet::default();
                let mut bindings = Bindings::default();
                for &member in members {
                    let m = self.match_target(member, target)?;
                    if !self.admit(member, &mut bindings, &m) {
                        return None;
                    }
                    fs.absorb(m);
                }
                Some(fs)
            }
            Combinator::AnyOf => members.iter().find_map(|&m| self.match_target(m, target)),
            Combinator::NoneOf => {
                members.iter().all(|&m| self.match_target(m, target).is_none()).then(FeatureSet::default)
            }
        }
    }

    /// Accept `fs` as the next sibling if its bindings agree with `acc`.
    fn admit(&self, child: PatternId, acc: &mut Bindings, fs: &FeatureSet) -> bool {
        if self.set.arena().collect_bind_labels(child).is_empty() {
            return true;
        }
        match self.bindings(fs) {
            Some(b) => acc.unify(&b),
            None => false,
        }
    }

    // --- Actors and mentions ------------------------------------------------------

    fn match_actor(&self, p: &ActorPattern, id: ActorMentionId) -> Option<FeatureSet> {
        let actor = self.actors.get(id);
        let info = &self.catalog.actors;
        let (actor_code, agent_code) = match &actor.kind {
            ActorKind::ProperNoun { actor, .. } => (Some(actor.code.as_str()), None),
            ActorKind::Composite { agent, paired_actor } => {
                (paired_actor.as_ref().map(|a| a.code.as_str()), Some(agent.code.as_str()))
            }
            ActorKind::Unknown => (None, None),
        };
        match p.shape {
            Some(ActorShape::ProperNoun) if !actor.is_proper_noun() => return None,
            Some(ActorShape::Composite) if !actor.is_composite() => return None,
            _ => {}
        }
        if !allowed(&p.actor_codes, &p.block_actor_codes, actor_code) {
            return None;
        }
        if !allowed(&p.agent_codes, &p.block_agent_codes, agent_code) {
            return None;
        }
        let actor_id = actor.identified_actor_id();
        if !p.sector_codes.is_empty() || !p.block_sector_codes.is_empty() {
            let sectors = actor_id.map(|a| info.sectors(a)).unwrap_or(&[]);
            if !p.sector_codes.is_empty() && !sectors.iter().any(|s| p.sector_codes.contains(s)) {
                return None;
            }
            if sectors.iter().any(|s| p.block_sector_codes.contains(s)) {
                return None;
            }
        }
        if let Some(want) = p.country {
            if actor_id.is_some_and(|a| info.is_country(a)) != want {
                return None;
            }
        }
        let mention = Target::Mention(actor.mention);
        if p.block_mentions.iter().any(|&b| self.match_target(b, mention).is_some()) {
            return None;
        }
        match p.mention {
            Some(sub) => self.match_target(sub, mention),
            None => Some(FeatureSet::default()),
        }
    }

    fn match_mention(&self, p: &MentionPattern, id: MentionId) -> Option<FeatureSet> {
        let m = self.doc.mention(id)?;
        if !allowed(&p.entity_types, &p.block_entity_types, Some(m.entity_type.as_str())) {
            return None;
        }
        if !p.mention_types.is_empty() && !p.mention_types.contains(&m.mention_type) {
            return None;
        }
        let head = m.head_word.to_lowercase();
        if !allowed(&p.head_words, &p.block_head_words, Some(head.as_str())) {
            return None;
        }
        if !p.entity_labels.is_empty() && !p.entity_labels.iter().any(|l| self.labels.has(id, l)) {
            return None;
        }
        if p.block_entity_labels.iter().any(|l| self.labels.has(id, l)) {
            return None;
        }
        if p.text.as_ref().is_some_and(|re| !re.is_match(&m.text)) {
            return None;
        }
        let actor = self.actors.find(id);
        if let Some(a) = actor {
            if p.block_actors.iter().any(|&b| self.match_target(b, Target::Actor(a)).is_some()) {
                return None;
            }
        }
        match p.actor {
            Some(sub) => self.match_target(sub, Target::Actor(actor?)),
            None => Some(FeatureSet::default()),
        }
    }

    // --- Propositions -------------------------------------------------------------

    fn match_proposition(&self, p: &PropPattern, r: PropRef) -> Option<FeatureSet> {
        let prop = self.doc.proposition(r)?;
        if !p.kinds.is_empty() && !p.kinds.contains(&prop.kind) {
            return None;
        }
        let predicate = prop.predicate.as_deref().map(str::to_lowercase);
        if !allowed(&p.predicates, &p.block_predicates, predicate.as_deref()) {
            return None;
        }
        if p.block_args.iter().any(|arg| self.find_argument(arg, r, &mut Bindings::default()).is_some()) {
            return None;
        }
        let mut fs = FeatureSet::default();
        let mut bindings = Bindings::default();
        for arg in &p.args {
            fs.absorb(self.find_argument(arg, r, &mut bindings)?);
        }
        for arg in &p.opt_args {
            if let Some(found) = self.find_argument(arg, r, &mut bindings) {
                fs.absorb(found);
            }
        }
        Some(fs)
    }

    /// First argument of `r` that satisfies `arg` and unifies with `bindings`.
    fn find_argument(&self, arg: &ArgPattern, r: PropRef, bindings: &mut Bindings) -> Option<FeatureSet> {
        let prop = self.doc.proposition(r)?;
        for argument in &prop.arguments {
            if !arg.roles.is_empty() && !arg.roles.contains(&argument.role) {
                continue;
            }
            let Some(pattern) = arg.pattern else {
                return Some(FeatureSet::default());
            };
            let target = match argument.value {
                ArgValue::Mention(index) => Target::Mention(MentionId::new(r.sentence, index)),
                ArgValue::Proposition(index) => Target::Proposition(PropRef { sentence: r.sentence, index }),
                ArgValue::Time(_) => continue,
            };
            if let Some(fs) = self.match_target(pattern, target) {
                if self.admit(pattern, bindings, &fs) {
                    return Some(fs);
                }
            }
        }
        None
    }

    // --- Events -------------------------------------------------------------------

    fn match_event_mention(&self, id: PatternId, p: &EventPattern, eid: EventMentionId) -> Option<FeatureSet> {
        let em = self.events?.get(eid)?;
        let ty = self.catalog.event_types.get(em.event_type);
        // Events of discardable types are invisible to event patterns.
        if ty.discard {
            return None;
        }
        let code = &ty.code;

        if p.event_codes.as_ref().is_some_and(|re| !re.is_match(code)) {
            return None;
        }
        if p.block_codes.as_ref().is_some_and(|re| re.is_match(code)) {
            return None;
        }
        if !allowed(&p.pattern_ids, &p.block_pattern_ids, Some(em.pattern_id.as_str())) {
            return None;
        }
        if !p.same_actor.iter().all(|roles| self.same_actor(em, roles))
            || p.block_same_actor.iter().any(|roles| self.same_actor(em, roles))
        {
            return None;
        }
        if !p.same_country.iter().all(|roles| self.same_country(em, roles))
            || p.block_same_country.iter().any(|roles| self.same_country(em, roles))
        {
            return None;
        }
        if !p.same_agent.iter().all(|roles| self.same_agent(em, roles))
            || p.block_same_agent.iter().any(|roles| self.same_agent(em, roles))
        {
            return None;
        }
        for (role, pattern) in &p.block_participants {
            let hit = em
                .participants
                .iter()
                .filter(|pt| role == "ANY" || pt.role == *role)
                .any(|pt| self.match_target(*pattern, Target::Actor(pt.actor)).is_some());
            if hit {
                return None;
            }
        }
        let sentences = em.sentences(self.actors);
        for &pattern in &p.block_sentence_matches {
            if sentences.iter().any(|&s| !self.matches_in_sentence(pattern, s).is_empty()) {
                return None;
            }
        }
        if p.block_document_matches.iter().any(|&pattern| !self.matches_in_document(pattern).is_empty()) {
            return None;
        }

        let mut fs = FeatureSet::default();
        let mut bindings = Bindings::default();
        if let Some(pattern) = p.first_proposition {
            let &first = em.propositions.first()?;
            let found = self
                .match_target(pattern, Target::Proposition(first))
                .filter(|m| self.admit(pattern, &mut bindings, m))?;
            fs.absorb(found);
        }
        for (role, pattern) in &p.participants {
            let found = em
                .participants
                .iter()
                .filter(|pt| role == "ANY" || pt.role == *role)
                .filter_map(|pt| self.match_target(*pattern, Target::Actor(pt.actor)))
                .find(|m| self.admit(*pattern, &mut bindings, m))?;
            fs.absorb(found);
        }

        // The event's own return value joins the bindings before the
        // sentence and document sub-patterns are consulted.
        let own = self.finish(id, Target::Event(eid), FeatureSet::default());
        if !bindings.unify(&self.bindings(&own)?) {
            return None;
        }

        // Every sentence the participants come from must match.
        for &pattern in &p.sentence_matches {
            for &s in &sentences {
                let found =
                    self.matches_in_sentence(pattern, s).into_iter().find(|m| self.admit(pattern, &mut bindings, m))?;
                fs.absorb(found);
            }
        }
        for &pattern in &p.document_matches {
            let found =
                self.matches_in_document(pattern).into_iter().find(|m| self.admit(pattern, &mut bindings, m))?;
            fs.absorb(found);
        }
        Some(fs)
    }

    /// The participants filling `roles` resolve to one actor. An empty role
    /// or an unidentified actor stands for the null actor, which is equal to
    /// itself.
    fn same_actor(&self, em: &EventMention, roles: &[String]) -> bool {
        let ids: BTreeSet<Option<ActorId>> = role_actors(em, roles)
            .map(|a| a.and_then(|a| self.actors.get(a).identified_actor_id()))
            .collect();
        ids.len() == 1
    }

    /// Like [`Self::same_actor`] for agents; anything but a composite has the
    /// null agent.
    fn same_agent(&self, em: &EventMention, roles: &[String]) -> bool {
        let ids: BTreeSet<_> =
            role_actors(em, roles).map(|a| a.and_then(|a| self.actors.get(a).paired_agent_id())).collect();
        ids.len() == 1
    }

    /// The identified actors in `roles` share at least one country.
    fn same_country(&self, em: &EventMention, roles: &[String]) -> bool {
        let mut common: Option<BTreeSet<ActorId>> = None;
        for actor in role_actors(em, roles).flatten().filter_map(|a| self.actors.get(a).identified_actor_id()) {
            let countries: BTreeSet<ActorId> = self.catalog.actors.countries(actor).into_iter().collect();
            common = Some(match common {
                Some(c) => c.intersection(&countries).copied().collect(),
                None => countries,
            });
        }
        common.is_some_and(|c| !c.is_empty())
    }

    // --- Bindings -----------------------------------------------------------------

    /// Values of every variable `fs` binds, or `None` if they disagree or a
    /// binding cannot be computed.
    pub(crate) fn bindings(&self, fs: &FeatureSet) -> Option<Bindings> {
        let mut out = Bindings::default();
        for (ret, target) in fs.returns() {
            if ret.bindings().next().is_none() {
                continue;
            }
            for (key, var) in ret.bindings() {
                let value = self.binding_value(key, target)?;
                if !out.bind(var, value) {
                    return None;
                }
            }
        }
        Some(out)
    }

    fn binding_value(&self, key: &str, target: Target) -> Option<String> {
        match (key, target) {
            ("EVENT-CODE", Target::Event(e)) => {
                let em = self.events?.get(e)?;
                Some(self.catalog.event_types.get(em.event_type).code.clone())
            }
            ("SENTNO", Target::Event(e)) => {
                Some(self.events?.get(e)?.icews_sentence_number(self.doc, self.actors).to_string())
            }
            ("SENTNO", Target::Sentence(s)) => Some(self.doc.icews_sentence_no(s).to_string()),
            (_, Target::Mention(m)) => self.binding_value(key, Target::Actor(self.actors.find(m)?)),
            ("ACTOR", Target::Actor(a)) => match &self.actors.get(a).kind {
                ActorKind::ProperNoun { actor, .. } => Some(actor.code.clone()),
                ActorKind::Composite { agent, paired_actor } => {
                    let actor = paired_actor.as_ref().map(|p| p.code.as_str()).unwrap_or("UNKNOWN");
                    Some(format!("{} FOR {}", agent.code, actor))
                }
                ActorKind::Unknown => None,
            },
            // An unpaired composite binds the empty code.
            ("PAIRED-ACTOR", Target::Actor(a)) => match &self.actors.get(a).kind {
                ActorKind::Composite { paired_actor, .. } => {
                    Some(paired_actor.as_ref().map(|p| p.code.clone()).unwrap_or_default())
                }
                _ => None,
            },
            ("PAIRED-AGENT", Target::Actor(a)) => match &self.actors.get(a).kind {
                ActorKind::Composite { agent, .. } => Some(agent.code.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The first participant of each role in `roles`, `None` where the event
/// has no such role.
fn role_actors<'e>(em: &'e EventMention, roles: &'e [String]) -> impl Iterator<Item = Option<ActorMentionId>> + 'e {
    roles.iter().map(|role| em.actors_in(role).next())
}

/// Allow-list (empty allows all) and block-list check. A missing value only
/// passes when there is no allow-list.
fn allowed(allow: &[String], block: &[String], value: Option<&str>) -> bool {
    match value {
        Some(v) => (allow.is_empty() || allow.iter().any(|a| a == v)) && !block.iter().any(|b| b == v),
        None => allow.is_empty(),
    }
}
