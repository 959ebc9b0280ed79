//! Event-type registry and the process-wide catalog.
//!
//! Event types are read from an s-expression file, one form per type:
//!
//! ```text
//! (event-type
//!    (name "Use conventional military force") (code "190") (event-group VIOLENCE)
//!    (id 190) (description "...")
//!    (role SOURCE) (role TARGET) (optional-role INSTRUMENT)
//!    (overrides "18*,193")
//!    (shared-entity-roles SOURCE TARGET)
//!    DISCARD-EVENTS-WITH-THIS-TYPE)
//! ```
//!
//! `role` declares a required role, `optional-role` a role that may be left
//! empty. A type that declares no roles gets `SOURCE` and `TARGET`. `LOCATION`
//! is always an optional role because the location pass may add it to any
//! event. `overrides` is a list of code globs (`*` matches anything) separated
//! by commas, semicolons or spaces.
//!
//! Event mentions refer to their type by [`EventTypeId`]; types are never copied.

use crate::actors::ActorInfo;
use crate::error::read_to_string;
use crate::sexp::{self, Sexp};
use crate::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

pub const SOURCE: &str = "SOURCE";
pub const TARGET: &str = "TARGET";
pub const LOCATION: &str = "LOCATION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTypeId(pub usize);

#[derive(Debug, Clone)]
pub struct EventType {
    pub name: String,
    pub code: String,
    pub group: String,
    pub id: Option<u32>,
    pub description: String,
    /// Declared roles, in declaration order.
    pub roles: Vec<String>,
    pub required_roles: Vec<String>,
    overrides: Option<Regex>,
    /// Temporary/placeholder type, dropped at the end of the pipeline.
    pub discard: bool,
    shared_entity_roles: Vec<(String, String)>,
}

impl EventType {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// True when `other` matches this type's override rule.
    pub fn overrides_code(&self, other: &str) -> bool {
        self.code != other && self.overrides.as_ref().is_some_and(|re| re.is_match(other))
    }

    /// Whether a single entity may fill both `a` and `b`.
    pub fn roles_can_share_entity(&self, a: &str, b: &str) -> bool {
        self.shared_entity_roles.iter().any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    fn from_sexp(form: &Sexp) -> Result<Self> {
        let mut name = None;
        let mut code = None;
        let mut group = None;
        let mut id = None;
        let mut description = String::new();
        let mut roles: Vec<String> = Vec::new();
        let mut required_roles = Vec::new();
        let mut overrides = None;
        let mut discard = false;
        let mut shared_entity_roles = Vec::new();

        for item in form.tail() {
            if let Some(atom) = item.as_atom() {
                match atom {
                    "DISCARD-EVENTS-WITH-THIS-TYPE" => discard = true,
                    other => bail_config!("unexpected atom '{other}' in {form}"),
                }
                continue;
            }
            let key = item.head().ok_or_else(|| Error::config(format!("malformed event type entry {item}")))?;
            let values = item.tail_atoms().map_err(|_| Error::config(format!("malformed entry {item}")))?;
            let single = || -> Result<String> {
                match values.as_slice() {
                    [v] => Ok(v.to_string()),
                    _ => Err(Error::config(format!("'{key}' expects one value in {form}"))),
                }
            };
            match key {
                "name" => name = Some(single()?),
                "code" => code = Some(single()?),
                "event-group" => group = Some(single()?),
                "description" => description = values.join(" "),
                "id" => {
                    let v = single()?;
                    id = if v == "NULL" {
                        None
                    } else {
                        Some(v.parse::<u32>().map_err(|_| Error::config(format!("bad event type id '{v}'")))?)
                    };
                }
                "role" | "optional-role" => {
                    let role = single()?;
                    if !roles.contains(&role) {
                        roles.push(role.clone());
                    }
                    if key == "role" {
                        required_roles.push(role);
                    }
                }
                "overrides" => overrides = Some(compile_code_globs(&values.join(","))?),
                "shared-entity-roles" => match values.as_slice() {
                    [a, b] => shared_entity_roles.push((a.to_string(), b.to_string())),
                    _ => bail_config!("'shared-entity-roles' expects two roles in {form}"),
                },
                other => bail_config!("unknown event type keyword '{other}'"),
            }
        }

        let name = name.ok_or_else(|| Error::config(format!("event type without a name: {form}")))?;
        let code = code.ok_or_else(|| Error::config(format!("event type without a code: {form}")))?;
        let group = group.ok_or_else(|| Error::config(format!("event type without an event-group: {form}")))?;
        if roles.is_empty() {
            roles = vec![SOURCE.to_string(), TARGET.to_string()];
            required_roles = roles.clone();
        }
        if !roles.iter().any(|r| r == LOCATION) {
            roles.push(LOCATION.to_string());
        }

        Ok(EventType {
            name,
            code,
            group,
            id,
            description,
            roles,
            required_roles,
            overrides: overrides.flatten(),
            discard,
            shared_entity_roles,
        })
    }
}

/// Compile `"18*, 190"` style glob lists into one anchored alternation.
///
/// Returns `Ok(None)` for an empty list.
pub(crate) fn compile_code_globs(list: &str) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = list
        .split([',', ';', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|glob| regex::escape(glob).replace(r"\*", ".*"))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    let pattern = format!("^(?:{})$", alternatives.join("|"));
    Regex::new(&pattern).map(Some).map_err(|e| Error::config(format!("bad code list '{list}': {e}")))
}

/// All known event types, addressable by code or [`EventTypeId`].
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    types: Vec<EventType>,
    by_code: HashMap<String, EventTypeId>,
}

impl EventTypeRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut registry = EventTypeRegistry::default();
        for form in sexp::parse_all(text)? {
            if form.head() != Some("event-type") {
                bail_config!("expected (event-type ...), found {form}");
            }
            let ty = EventType::from_sexp(&form)?;
            if registry.by_code.contains_key(&ty.code) {
                bail_config!("duplicate event code '{}'", ty.code);
            }
            registry.by_code.insert(ty.code.clone(), EventTypeId(registry.types.len()));
            registry.types.push(ty);
        }
        registry.check_override_references(text)?;
        Ok(registry)
    }

    /// Literal (non-glob) codes named in `overrides` must exist.
    fn check_override_references(&self, text: &str) -> Result<()> {
        for form in sexp::parse_all(text)? {
            for item in form.tail().iter().filter(|i| i.head() == Some("overrides")) {
                for atom in item.tail().iter().filter_map(Sexp::as_atom) {
                    for code in atom.split([',', ';', ' ']).map(str::trim).filter(|c| !c.is_empty()) {
                        if !code.contains('*') && !self.by_code.contains_key(code) {
                            bail_config!("'overrides' references unknown event code '{code}'");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn lookup(&self, code: &str) -> Option<&EventType> {
        self.id_of(code).map(|id| self.get(id))
    }

    pub fn id_of(&self, code: &str) -> Option<EventTypeId> {
        self.by_code.get(code).copied()
    }

    pub fn get(&self, id: EventTypeId) -> &EventType {
        &self.types[id.0]
    }

    /// True if type `a` takes precedence over type `b`.
    pub fn overrides(&self, a: EventTypeId, b: EventTypeId) -> bool {
        self.get(a).overrides_code(&self.get(b).code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventTypeId, &EventType)> {
        self.types.iter().enumerate().map(|(i, t)| (EventTypeId(i), t))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Process-wide read-only knowledge, built once and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub event_types: EventTypeRegistry,
    pub actors: ActorInfo,
}

impl Catalog {
    pub fn new(event_types: EventTypeRegistry, actors: ActorInfo) -> Self {
        Self { event_types, actors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = r#"
        (event-type (name "Protest") (code "140") (event-group PROTEST))
        (event-type (name "Use conventional military force") (code "190") (event-group VIOLENCE)
                    (id 190) (role SOURCE) (role TARGET) (overrides "18*, 140"))
        (event-type (name "Assault") (code "180") (event-group VIOLENCE) (id NULL)
                    (role SOURCE) (optional-role TARGET) (shared-entity-roles SOURCE TARGET))
        (event-type (name "Placeholder") (code "TMP") (event-group VIOLENCE) DISCARD-EVENTS-WITH-THIS-TYPE)
    "#;

    #[test]
    fn loads_roles_and_flags() {
        let reg = EventTypeRegistry::parse(TYPES).unwrap();
        assert_eq!(reg.len(), 4);

        let protest = reg.lookup("140").unwrap();
        assert_eq!(protest.roles, vec!["SOURCE", "TARGET", "LOCATION"]);
        assert_eq!(protest.required_roles, vec!["SOURCE", "TARGET"]);

        let assault = reg.lookup("180").unwrap();
        assert_eq!(assault.id, None);
        assert_eq!(assault.required_roles, vec!["SOURCE"]);
        assert!(assault.has_role("TARGET"));
        assert!(assault.roles_can_share_entity("TARGET", "SOURCE"));
        assert!(!protest.roles_can_share_entity("SOURCE", "TARGET"));

        assert!(reg.lookup("TMP").unwrap().discard);
        assert!(reg.lookup("999").is_none());
    }

    #[test]
    fn override_rule_uses_globs_and_is_not_reflexive() {
        let reg = EventTypeRegistry::parse(TYPES).unwrap();
        let attack = reg.id_of("190").unwrap();
        let assault = reg.id_of("180").unwrap();
        let protest = reg.id_of("140").unwrap();

        assert!(reg.overrides(attack, assault));
        assert!(reg.overrides(attack, protest));
        assert!(!reg.overrides(assault, attack));
        assert!(!reg.overrides(attack, attack));
    }

    #[test]
    fn rejects_duplicates_unknown_references_and_missing_fields() {
        let dup = r#"(event-type (name a) (code "1") (event-group g)) (event-type (name b) (code "1") (event-group g))"#;
        assert!(matches!(EventTypeRegistry::parse(dup), Err(Error::Config(_))));

        let unknown = r#"(event-type (name a) (code "1") (event-group g) (overrides "2"))"#;
        assert!(EventTypeRegistry::parse(unknown).is_err());

        assert!(EventTypeRegistry::parse(r#"(event-type (name a) (event-group g))"#).is_err());
        assert!(EventTypeRegistry::parse(r#"(event-type (name a) (code 1) (event-group g) (colour red))"#).is_err());
    }

    #[test]
    fn code_globs_escape_regex_characters() {
        let re = compile_code_globs("1.2, 3*").unwrap().unwrap();
        assert!(re.is_match("1.2"));
        assert!(!re.is_match("112"));
        assert!(re.is_match("3"));
        assert!(re.is_match("345"));
        assert!(compile_code_globs(" , ").unwrap().is_none());
    }
}
