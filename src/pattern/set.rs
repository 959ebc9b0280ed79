//! Pattern sets and the event pattern manifest.
//!
//! A pattern file holds one form:
//!
//! ```text
//! (attack-patterns
//!   (wordsets     (ATTACK attack bomb shell))
//!   (entitylabels (ARMED_GROUP (mention (headword rebels militants))))
//!   (reference    (icews-actor composite (agent-code REB) (shortcut REBELS)) ...)
//!   (toplevel     (vprop (predicate @ATTACK) ...) ...)
//!   (doclevel     (icews-event ...) ...))
//! ```
//!
//! Reference patterns must carry a `(shortcut ..)` and may only refer to
//! reference patterns defined before them, which keeps the tree acyclic.
//! Top-level patterns are matched per sentence, doc-level patterns once per
//! document.

use super::compiler::{Compiler, resolve_shortcuts};
use super::model::{Pattern, PatternArena, PatternId};
use crate::catalog::EventTypeRegistry;
use crate::config::expand_variables;
use crate::error::read_to_string;
use crate::sexp::{self, Sexp};
use crate::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    pub name: String,
    arena: PatternArena,
    entity_labels: Vec<(String, PatternId)>,
    toplevel: Vec<PatternId>,
    doclevel: Vec<PatternId>,
}

impl PatternSet {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            Error::Pattern(msg) => Error::pattern(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let form = sexp::parse_one(text)?;
        let Some(items) = form.as_list() else {
            bail_pattern!("a pattern set must be a list form");
        };
        let name = items
            .first()
            .and_then(Sexp::as_atom)
            .ok_or_else(|| Error::pattern("a pattern set must start with its name"))?
            .to_string();

        let mut sections: HashMap<&str, &Sexp> = HashMap::new();
        for section in &items[1..] {
            let key = section.head().ok_or_else(|| Error::pattern(format!("malformed section {section}")))?;
            if !matches!(key, "wordsets" | "entitylabels" | "reference" | "toplevel" | "doclevel" | "options") {
                bail_pattern!("unknown pattern set section '{key}'");
            }
            if sections.insert(key, section).is_some() {
                bail_pattern!("duplicate pattern set section '{key}'");
            }
        }

        let word_sets = match sections.get("wordsets") {
            Some(section) => parse_word_sets(section)?,
            None => HashMap::new(),
        };
        let label_forms: Vec<(String, &Sexp)> = match sections.get("entitylabels") {
            Some(section) => section
                .tail()
                .iter()
                .map(|entry| match entry.as_list() {
                    Some([Sexp::Atom(label), pattern]) => Ok((label.clone(), pattern)),
                    _ => Err(Error::pattern(format!("expected (LABEL pattern), found {entry}"))),
                })
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        let label_names: BTreeSet<String> = label_forms.iter().map(|(l, _)| l.clone()).collect();

        let mut arena = PatternArena::default();
        let mut names: HashMap<String, PatternId> = HashMap::new();

        // Reference patterns, each resolved against the ones before it.
        for form in sections.get("reference").map(|s| s.tail()).unwrap_or(&[]) {
            let id = Compiler::new(&mut arena, &word_sets, &label_names).compile(form)?;
            let id = resolve_shortcuts(&mut arena, &[id], &names)?[0];
            let shortcut = arena
                .get(id)
                .header
                .shortcut
                .clone()
                .ok_or_else(|| Error::pattern(format!("reference pattern without a shortcut: {form}")))?;
            if names.insert(shortcut.clone(), id).is_some() {
                bail_pattern!("duplicate shortcut '{shortcut}'");
            }
        }

        let compile_all = |forms: &[Sexp], arena: &mut PatternArena| -> Result<Vec<PatternId>> {
            let ids = forms
                .iter()
                .map(|f| Compiler::new(arena, &word_sets, &label_names).compile(f))
                .collect::<Result<Vec<_>>>()?;
            resolve_shortcuts(arena, &ids, &names)
        };

        let label_pattern_forms: Vec<Sexp> = label_forms.iter().map(|(_, f)| (*f).clone()).collect();
        let label_ids = compile_all(&label_pattern_forms, &mut arena)?;
        let entity_labels = label_forms.into_iter().map(|(l, _)| l).zip(label_ids).collect();
        let toplevel = compile_all(sections.get("toplevel").map(|s| s.tail()).unwrap_or(&[]), &mut arena)?;
        let doclevel = compile_all(sections.get("doclevel").map(|s| s.tail()).unwrap_or(&[]), &mut arena)?;

        Ok(PatternSet { name, arena, entity_labels, toplevel, doclevel })
    }

    pub fn arena(&self) -> &PatternArena {
        &self.arena
    }

    pub fn pattern(&self, id: PatternId) -> &Pattern {
        self.arena.get(id)
    }

    pub fn toplevel(&self) -> &[PatternId] {
        &self.toplevel
    }

    pub fn doclevel(&self) -> &[PatternId] {
        &self.doclevel
    }

    pub fn entity_labels(&self) -> &[(String, PatternId)] {
        &self.entity_labels
    }
}

fn parse_word_sets(section: &Sexp) -> Result<HashMap<String, Vec<String>>> {
    let mut sets = HashMap::new();
    for entry in section.tail() {
        let name = entry.head().ok_or_else(|| Error::pattern(format!("malformed word set {entry}")))?;
        let words = entry.tail_atoms()?.into_iter().map(str::to_string).collect();
        if sets.insert(name.to_string(), words).is_some() {
            bail_pattern!("duplicate word set '{name}'");
        }
    }
    Ok(sets)
}

// --- Manifest ------------------------------------------------------------------

/// One `EVENTCODE:filename` line of an event pattern manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub code: String,
    pub path: PathBuf,
}

/// Read a manifest, skipping codes outside `enabled` (when given).
///
/// Lines are trimmed, everything after `#` is a comment, and variables are
/// expanded before the line is split. Relative pattern paths resolve against
/// the manifest's directory.
pub fn read_manifest(
    path: &Path,
    variables: &BTreeMap<String, String>,
    registry: &EventTypeRegistry,
    enabled: Option<&Regex>,
) -> Result<Vec<ManifestEntry>> {
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut entries = Vec::new();
    for (lineno, raw) in read_to_string(path)?.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let line = expand_variables(line, variables)?;
        let Some((code, file)) = line.split_once(':') else {
            bail_config!("{}:{}: expected EVENTCODE:filename", path.display(), lineno + 1);
        };
        let (code, file) = (code.trim(), file.trim());
        if code.is_empty() || file.is_empty() {
            bail_config!("{}:{}: empty event code or filename", path.display(), lineno + 1);
        }
        if registry.lookup(code).is_none() {
            bail_config!("{}:{}: unknown event code '{code}'", path.display(), lineno + 1);
        }
        if enabled.is_some_and(|re| !re.is_match(code)) {
            tracing::info!(code, "skipping patterns for disabled event code");
            continue;
        }
        let file = PathBuf::from(file);
        let path = if file.is_absolute() { file } else { base.join(file) };
        entries.push(ManifestEntry { code: code.to_string(), path });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    const SET: &str = r#"
        (attack-patterns
          (wordsets (ATTACK attack bomb))
          (entitylabels (ARMED (mention (headword rebels))))
          (reference
             (icews-actor composite (agent-code REB) (shortcut REBELS))
             (icews-actor (mention (mention (entitylabel ARMED))) (shortcut ARMED_ACTOR))
             (any-of (members REBELS ARMED_ACTOR) (shortcut ANY_REBEL)))
          (toplevel
             (vprop (id attack-1) (predicate @ATTACK) (return (event-code 190))
                    (args (argument (role <sub>) (mention (actor ANY_REBEL) (return SOURCE)))
                          (argument (role <obj>) (mention (return TARGET))))))
          (doclevel (icews-event (participant SOURCE REBELS))))
    "#;

    #[test]
    fn parses_sections_and_resolves_shortcuts() {
        let set = PatternSet::parse(SET).unwrap();
        assert_eq!(set.name, "attack-patterns");
        assert_eq!(set.toplevel().len(), 1);
        assert_eq!(set.doclevel().len(), 1);
        assert_eq!(set.entity_labels()[0].0, "ARMED");

        for id in (0..set.arena().len()).map(PatternId) {
            // Shortcut nodes stay in the arena but nothing reachable points at them.
            let pattern = set.pattern(id);
            for child in pattern.positive_children() {
                assert!(!matches!(set.pattern(child).kind, PatternKind::Shortcut(_)), "dangling shortcut");
            }
        }
    }

    #[test]
    fn reference_patterns_only_see_earlier_shortcuts() {
        let forward = r#"(s (reference (any-of (members LATER) (shortcut FIRST))
                                        (icews-actor (shortcut LATER))))"#;
        assert!(matches!(PatternSet::parse(forward), Err(Error::UnresolvedShortcut(_))));

        let unnamed = r#"(s (reference (icews-actor proper-noun)))"#;
        assert!(PatternSet::parse(unnamed).is_err());

        let dup = r#"(s (reference (icews-actor (shortcut A)) (icews-actor (shortcut A))))"#;
        assert!(PatternSet::parse(dup).is_err());

        assert!(PatternSet::parse("(s (bogus))").is_err());
    }

    #[test]
    fn manifest_lines_are_validated_and_filtered() {
        let registry = EventTypeRegistry::parse(
            r#"(event-type (name a) (code "190") (event-group V))
               (event-type (name b) (code "140") (event-group P))"#,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("manifest.txt");
        std::fs::write(&manifest, "# comment\n190:%dir%/attack.sexp  # trailing\n\n140 : protest.sexp\n").unwrap();
        let vars = BTreeMap::from([("dir".to_string(), "violence".to_string())]);

        let all = read_manifest(&manifest, &vars, &registry, None).unwrap();
        assert_eq!(
            all,
            vec![
                ManifestEntry { code: "190".into(), path: dir.path().join("violence/attack.sexp") },
                ManifestEntry { code: "140".into(), path: dir.path().join("protest.sexp") },
            ]
        );

        let only_19 = Regex::new("^19.*$").unwrap();
        let some = read_manifest(&manifest, &vars, &registry, Some(&only_19)).unwrap();
        assert_eq!(some.len(), 1);

        std::fs::write(&manifest, "190 attack.sexp\n").unwrap();
        assert!(matches!(read_manifest(&manifest, &vars, &registry, None), Err(Error::Config(_))));
        std::fs::write(&manifest, "999:x.sexp\n").unwrap();
        assert!(read_manifest(&manifest, &vars, &registry, None).is_err());
        std::fs::write(&manifest, ":x.sexp\n").unwrap();
        assert!(read_manifest(&manifest, &vars, &registry, None).is_err());
    }
}
