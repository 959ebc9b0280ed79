//! S-expression to pattern-tree compiler.
//!
//! Compilation is two-phase:
//!
//! ```text
//! Sexp ── Compiler::compile ──▶ arena nodes (atoms in pattern slots become Shortcut nodes)
//!                                   │
//!                                   ▼
//!                     resolve_shortcuts(roots, names)
//!                       - rewrite every child id that points at a Shortcut
//!                       - error on any name that is not defined
//! ```
//!
//! Keywords are checked against a fixed vocabulary per pattern type; anything
//! else is a compile error rather than a silently ignored constraint.

use super::model::{
    ActorPattern, ActorShape, ArgPattern, Combinator, EventPattern, Header, MentionPattern, Pattern, PatternArena,
    PatternId, PatternKind, PropPattern, ReturnSpec,
};
use crate::catalog::compile_code_globs;
use crate::document::{MentionType, PropKind};
use crate::sexp::Sexp;
use crate::{Error, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Compiles pattern forms into a shared arena.
pub struct Compiler<'a> {
    arena: &'a mut PatternArena,
    word_sets: &'a HashMap<String, Vec<String>>,
    entity_labels: &'a BTreeSet<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(
        arena: &'a mut PatternArena,
        word_sets: &'a HashMap<String, Vec<String>>,
        entity_labels: &'a BTreeSet<String>,
    ) -> Self {
        Self { arena, word_sets, entity_labels }
    }

    /// Compile one pattern form. A bare atom compiles to a shortcut reference.
    pub fn compile(&mut self, form: &Sexp) -> Result<PatternId> {
        let head = match form {
            Sexp::Atom(name) => return Ok(self.arena.add(Pattern::shortcut(name.clone()))),
            Sexp::List(_) => form.head().ok_or_else(|| Error::pattern(format!("pattern without a type: {form}")))?,
        };
        let mut header = Header::default();
        let kind = match head {
            "icews-actor" => PatternKind::Actor(self.actor(form, &mut header)?),
            "icews-event" => PatternKind::Event(self.event(form, &mut header)?),
            "mention" => PatternKind::Mention(self.mention(form, &mut header)?),
            "vprop" => PatternKind::Proposition(self.prop(form, &mut header, &[PropKind::Verb])?),
            "nprop" => PatternKind::Proposition(self.prop(form, &mut header, &[PropKind::Noun])?),
            "mprop" => PatternKind::Proposition(self.prop(form, &mut header, &[PropKind::Modifier])?),
            "anyprop" => PatternKind::Proposition(self.prop(form, &mut header, &[])?),
            "regex" => self.regex(form, &mut header)?,
            "all-of" => self.combination(form, &mut header, Combinator::AllOf)?,
            "any-of" => self.combination(form, &mut header, Combinator::AnyOf)?,
            "none-of" => self.combination(form, &mut header, Combinator::NoneOf)?,
            other => bail_pattern!("unknown pattern type '{other}'"),
        };
        Ok(self.arena.add(Pattern { header, kind }))
    }

    // --- Common sub-forms ----------------------------------------------------

    /// Consume `(id ..)`, `(shortcut ..)`, `(score ..)`, `(return ..)`. Returns
    /// false if `item` is not one of them.
    fn header_item(&self, header: &mut Header, item: &Sexp) -> Result<bool> {
        match item.head() {
            Some("id") => header.label = Some(single_atom(item)?.to_string()),
            Some("shortcut") => header.shortcut = Some(single_atom(item)?.to_string()),
            Some("score") => {
                let raw = single_atom(item)?;
                header.score = Some(raw.parse().map_err(|_| Error::pattern(format!("bad score '{raw}'")))?);
            }
            Some("return") => header.ret = Some(parse_return(item)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Expand a word list; `@NAME` pulls in a word set.
    fn words(&self, item: &Sexp, lowercase: bool) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for atom in item.tail_atoms()? {
            if let Some(name) = atom.strip_prefix('@') {
                let set = self
                    .word_sets
                    .get(name)
                    .ok_or_else(|| Error::pattern(format!("unknown word set '@{name}' in {item}")))?;
                out.extend(set.iter().cloned());
            } else {
                out.push(atom.to_string());
            }
        }
        if lowercase {
            out.iter_mut().for_each(|w| *w = w.to_lowercase());
        }
        Ok(out)
    }

    /// Compile the single sub-pattern of `(keyword pattern)`.
    fn slot(&mut self, item: &Sexp) -> Result<PatternId> {
        match item.tail() {
            [child] => self.compile(child),
            _ => Err(Error::pattern(format!("'{}' expects exactly one sub-pattern", item.head().unwrap_or("?")))),
        }
    }

    /// `(participant ROLE pattern)`
    fn role_slot(&mut self, item: &Sexp) -> Result<(String, PatternId)> {
        match item.tail() {
            [Sexp::Atom(role), child] => Ok((role.clone(), self.compile(child)?)),
            _ => Err(Error::pattern(format!("expected (keyword ROLE pattern), found {item}"))),
        }
    }

    // --- Pattern types -------------------------------------------------------

    fn actor(&mut self, form: &Sexp, header: &mut Header) -> Result<ActorPattern> {
        let mut p = ActorPattern::default();
        for item in form.tail() {
            if let Some(atom) = item.as_atom() {
                match atom {
                    "proper-noun" => p.shape = Some(ActorShape::ProperNoun),
                    "composite" => p.shape = Some(ActorShape::Composite),
                    "is-country" => p.country = Some(true),
                    "is-not-country" => p.country = Some(false),
                    other => bail_pattern!("unknown icews-actor flag '{other}'"),
                }
                continue;
            }
            if self.header_item(header, item)? {
                continue;
            }
            match item.head() {
                Some("actor-code") => p.actor_codes = self.words(item, false)?,
                Some("block-actor-code") => p.block_actor_codes = self.words(item, false)?,
                Some("agent-code") => p.agent_codes = self.words(item, false)?,
                Some("block-agent-code") => p.block_agent_codes = self.words(item, false)?,
                Some("sector-code") => p.sector_codes = self.words(item, false)?,
                Some("block-sector-code") => p.block_sector_codes = self.words(item, false)?,
                Some("mention") => p.mention = Some(self.slot(item)?),
                Some("block-mention") => {
                    let id = self.slot(item)?;
                    p.block_mentions.push(id);
                }
                _ => bail_pattern!("unknown icews-actor constraint {item}"),
            }
        }
        Ok(p)
    }

    fn event(&mut self, form: &Sexp, header: &mut Header) -> Result<EventPattern> {
        let mut p = EventPattern::default();
        for item in form.tail() {
            if let Some(atom) = item.as_atom() {
                bail_pattern!("unknown icews-event flag '{atom}'");
            }
            if self.header_item(header, item)? {
                continue;
            }
            match item.head() {
                Some("same-actor") => p.same_actor.push(role_set(item)?),
                Some("block-same-actor") => p.block_same_actor.push(role_set(item)?),
                Some("same-agent") => p.same_agent.push(role_set(item)?),
                Some("block-same-agent") => p.block_same_agent.push(role_set(item)?),
                Some("same-country") => p.same_country.push(role_set(item)?),
                Some("block-same-country") => p.block_same_country.push(role_set(item)?),
                Some("participant") => {
                    let slot = self.role_slot(item)?;
                    p.participants.push(slot);
                }
                Some("block-participant") => {
                    let slot = self.role_slot(item)?;
                    p.block_participants.push(slot);
                }
                Some("event-code") => p.event_codes = compile_code_globs(&self.words(item, false)?.join(","))?,
                Some("block-code") => p.block_codes = compile_code_globs(&self.words(item, false)?.join(","))?,
                Some("pattern-id") => p.pattern_ids = self.words(item, false)?,
                Some("block-pattern-id") => p.block_pattern_ids = self.words(item, false)?,
                Some("sentence-matches") => {
                    let id = self.slot(item)?;
                    p.sentence_matches.push(id);
                }
                Some("block-sentence-matches") => {
                    let id = self.slot(item)?;
                    p.block_sentence_matches.push(id);
                }
                Some("document-matches") => {
                    let id = self.slot(item)?;
                    p.document_matches.push(id);
                }
                Some("block-document-matches") => {
                    let id = self.slot(item)?;
                    p.block_document_matches.push(id);
                }
                Some("first-proposition") => p.first_proposition = Some(self.slot(item)?),
                _ => bail_pattern!("unknown icews-event constraint {item}"),
            }
        }
        Ok(p)
    }

    fn mention(&mut self, form: &Sexp, header: &mut Header) -> Result<MentionPattern> {
        let mut p = MentionPattern::default();
        for item in form.tail() {
            if self.header_item(header, item)? {
                continue;
            }
            match item.head() {
                Some("acetype") => p.entity_types = upper(self.words(item, false)?),
                Some("block-acetype") => p.block_entity_types = upper(self.words(item, false)?),
                Some("mentiontype") => {
                    p.mention_types = self
                        .words(item, false)?
                        .iter()
                        .map(|w| MentionType::parse(w).ok_or_else(|| Error::pattern(format!("bad mention type '{w}'"))))
                        .collect::<Result<_>>()?;
                }
                Some("headword") => p.head_words = self.words(item, true)?,
                Some("block-headword") => p.block_head_words = self.words(item, true)?,
                Some("entitylabel") => p.entity_labels = self.labels(item)?,
                Some("block-entitylabel") => p.block_entity_labels = self.labels(item)?,
                Some("actor") => p.actor = Some(self.slot(item)?),
                Some("block-actor") => {
                    let id = self.slot(item)?;
                    p.block_actors.push(id);
                }
                Some("regex") => p.text = Some(compile_regex(single_atom(item)?)?),
                _ => bail_pattern!("unknown mention constraint {item}"),
            }
        }
        Ok(p)
    }

    fn labels(&self, item: &Sexp) -> Result<Vec<String>> {
        let labels = self.words(item, false)?;
        if let Some(unknown) = labels.iter().find(|l| !self.entity_labels.contains(*l)) {
            bail_pattern!("unknown entity label '{unknown}'");
        }
        Ok(labels)
    }

    fn prop(&mut self, form: &Sexp, header: &mut Header, kinds: &[PropKind]) -> Result<PropPattern> {
        let mut p = PropPattern { kinds: kinds.to_vec(), ..PropPattern::default() };
        for item in form.tail() {
            if self.header_item(header, item)? {
                continue;
            }
            match item.head() {
                Some("predicate") => p.predicates = self.words(item, true)?,
                Some("block-predicate") => p.block_predicates = self.words(item, true)?,
                Some("args") => p.args = self.arguments(item)?,
                Some("opt-args") => p.opt_args = self.arguments(item)?,
                Some("block-args") => p.block_args = self.arguments(item)?,
                _ => bail_pattern!("unknown proposition constraint {item}"),
            }
        }
        Ok(p)
    }

    fn arguments(&mut self, item: &Sexp) -> Result<Vec<ArgPattern>> {
        let mut out = Vec::new();
        for arg in item.tail() {
            if arg.head() != Some("argument") {
                bail_pattern!("expected (argument ...), found {arg}");
            }
            let mut parsed = ArgPattern::default();
            for part in arg.tail() {
                if part.head() == Some("role") {
                    parsed.roles = part.tail_atoms()?.into_iter().map(str::to_string).collect();
                } else if parsed.pattern.is_none() {
                    parsed.pattern = Some(self.compile(part)?);
                } else {
                    bail_pattern!("argument with more than one pattern: {arg}");
                }
            }
            out.push(parsed);
        }
        Ok(out)
    }

    fn regex(&mut self, form: &Sexp, header: &mut Header) -> Result<PatternKind> {
        let mut re = None;
        for item in form.tail() {
            if self.header_item(header, item)? {
                continue;
            }
            match item.head() {
                Some("re") => re = Some(compile_regex(single_atom(item)?)?),
                _ => bail_pattern!("unknown regex constraint {item}"),
            }
        }
        re.map(PatternKind::Regex).ok_or_else(|| Error::pattern(format!("regex pattern without (re ..): {form}")))
    }

    fn combination(&mut self, form: &Sexp, header: &mut Header, op: Combinator) -> Result<PatternKind> {
        let mut members = Vec::new();
        for item in form.tail() {
            if self.header_item(header, item)? {
                continue;
            }
            match item.head() {
                Some("members") => {
                    for member in item.tail() {
                        members.push(self.compile(member)?);
                    }
                }
                _ => bail_pattern!("unknown combination constraint {item}"),
            }
        }
        if members.is_empty() {
            bail_pattern!("combination without members: {form}");
        }
        Ok(PatternKind::Combination(op, members))
    }
}

/// `(same-actor ROLE ROLE ..)`; at least two roles are needed to compare anything.
fn role_set(item: &Sexp) -> Result<Vec<String>> {
    let roles: Vec<String> = item.tail_atoms()?.into_iter().map(str::to_string).collect();
    if roles.len() < 2 {
        bail_pattern!("'{}' needs at least two roles: {item}", item.head().unwrap_or("?"));
    }
    Ok(roles)
}

fn upper(words: Vec<String>) -> Vec<String> {
    words.into_iter().map(|w| w.to_uppercase()).collect()
}

fn single_atom(item: &Sexp) -> Result<&str> {
    match item.tail() {
        [Sexp::Atom(a)] => Ok(a),
        _ => Err(Error::pattern(format!("expected a single value in {item}"))),
    }
}

fn compile_regex(raw: &str) -> Result<Regex> {
    Regex::new(raw).map_err(|e| Error::pattern(format!("bad regex '{raw}': {e}")))
}

fn parse_return(item: &Sexp) -> Result<ReturnSpec> {
    let mut spec = ReturnSpec::default();
    for part in item.tail() {
        match part {
            Sexp::Atom(label) if spec.label.is_none() => spec.label = Some(label.clone()),
            Sexp::List(kv) => match kv.as_slice() {
                [Sexp::Atom(k), Sexp::Atom(v)] => {
                    spec.values.insert(k.clone(), v.clone());
                }
                _ => bail_pattern!("expected (key value) in {item}"),
            },
            _ => bail_pattern!("return with more than one label: {item}"),
        }
    }
    if spec.label.is_none() && spec.values.is_empty() {
        bail_pattern!("empty return: {item}");
    }
    Ok(spec)
}

/// Follow a chain of shortcut nodes to a real pattern.
fn follow(arena: &PatternArena, mut id: PatternId, names: &HashMap<String, PatternId>) -> Result<PatternId> {
    let mut hops = 0;
    while let PatternKind::Shortcut(name) = &arena.get(id).kind {
        id = *names.get(name).ok_or_else(|| Error::UnresolvedShortcut(name.clone()))?;
        hops += 1;
        if hops > names.len() {
            return Err(Error::UnresolvedShortcut(format!("{name} (cyclic)")));
        }
    }
    Ok(id)
}

/// Rewrite every shortcut reference reachable from `roots`.
///
/// Returns the roots themselves resolved, since a root may be a bare shortcut.
pub fn resolve_shortcuts(
    arena: &mut PatternArena,
    roots: &[PatternId],
    names: &HashMap<String, PatternId>,
) -> Result<Vec<PatternId>> {
    let view: &PatternArena = arena;
    let resolved_roots = roots.iter().map(|&r| follow(view, r, names)).collect::<Result<Vec<_>>>()?;
    let mut stack = resolved_roots.clone();
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let current: Vec<PatternId> = arena.get_mut(id).children_mut().into_iter().map(|c| *c).collect();
        let view: &PatternArena = arena;
        let targets = current.iter().map(|&c| follow(view, c, names)).collect::<Result<Vec<_>>>()?;
        for (slot, target) in arena.get_mut(id).children_mut().into_iter().zip(&targets) {
            *slot = *target;
        }
        stack.extend(targets);
    }
    Ok(resolved_roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::parse_one;

    fn compile_str(text: &str) -> Result<(PatternArena, PatternId)> {
        let mut arena = PatternArena::default();
        let words = HashMap::from([("ATTACK".to_string(), vec!["Attack".to_string(), "bomb".to_string()])]);
        let labels = BTreeSet::from(["REBEL".to_string()]);
        let id = Compiler::new(&mut arena, &words, &labels).compile(&parse_one(text)?)?;
        Ok((arena, id))
    }

    #[test]
    fn compiles_event_pattern_with_flags_and_returns() {
        let (arena, id) = compile_str(
            r#"(icews-event (id attack-block) (event-code "19*") (block-code 195)
                 (participant SOURCE (icews-actor composite (agent-code REB)))
                 (same-actor SOURCE TARGET) (return (EVENT-CODE c) (event-tense historical)))"#,
        )
        .unwrap();
        let pattern = arena.get(id);
        assert_eq!(pattern.header.label.as_deref(), Some("attack-block"));
        let PatternKind::Event(event) = &pattern.kind else { panic!("expected event pattern") };
        assert!(event.event_codes.as_ref().unwrap().is_match("190"));
        assert!(event.block_codes.as_ref().unwrap().is_match("195"));
        assert_eq!(event.same_actor, vec![vec!["SOURCE".to_string(), "TARGET".to_string()]]);
        assert_eq!(event.participants[0].0, "SOURCE");
        let ret = pattern.header.ret.as_ref().unwrap();
        assert_eq!(ret.value("event-tense"), Some("historical"));
        assert_eq!(arena.collect_bind_labels(id).into_iter().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn expands_word_sets_and_lowercases_predicates() {
        let (arena, id) = compile_str(r#"(vprop (predicate @ATTACK shell) (args (argument (role <sub>))))"#).unwrap();
        let PatternKind::Proposition(p) = &arena.get(id).kind else { panic!("expected prop pattern") };
        assert_eq!(p.predicates, vec!["attack", "bomb", "shell"]);
        assert_eq!(p.kinds, vec![PropKind::Verb]);
        assert_eq!(p.args[0].roles, vec!["<sub>"]);
        assert!(p.args[0].pattern.is_none());
    }

    #[test]
    fn rejects_unknown_vocabulary() {
        assert!(compile_str("(icews-event (colour red))").is_err());
        assert!(compile_str("(icews-event (same-actor SOURCE))").is_err());
        assert!(compile_str("(icews-actor is-purple)").is_err());
        assert!(compile_str("(frobnicate)").is_err());
        assert!(compile_str("(vprop (predicate @NOPE))").is_err());
        assert!(compile_str("(mention (entitylabel NOT_DEFINED))").is_err());
        assert!(compile_str("(mention (mentiontype name) (entitylabel REBEL))").is_ok());
        assert!(compile_str("(regex (id x))").is_err());
        assert!(compile_str("(all-of (id x))").is_err());
    }

    #[test]
    fn shortcut_resolution_rewrites_children() {
        let mut arena = PatternArena::default();
        let words = HashMap::new();
        let labels = BTreeSet::new();
        let mut compiler = Compiler::new(&mut arena, &words, &labels);
        let target = compiler.compile(&parse_one("(icews-actor proper-noun (shortcut PN))").unwrap()).unwrap();
        let root = compiler.compile(&parse_one("(icews-event (participant SOURCE PN))").unwrap()).unwrap();

        let names = HashMap::from([("PN".to_string(), target)]);
        resolve_shortcuts(&mut arena, &[root], &names).unwrap();
        let PatternKind::Event(event) = &arena.get(root).kind else { panic!() };
        assert_eq!(event.participants[0].1, target);

        let mut arena = PatternArena::default();
        let mut compiler = Compiler::new(&mut arena, &words, &labels);
        let root = compiler.compile(&parse_one("(icews-event (participant SOURCE MISSING))").unwrap()).unwrap();
        let err = resolve_shortcuts(&mut arena, &[root], &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedShortcut(name) if name == "MISSING"));
    }
}
