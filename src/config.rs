//! Run configuration.
//!
//! A JSON file names the catalogs and pattern sets to load and selects the
//! optional pipeline behaviour:
//!
//! ```text
//! {
//!   "event_types": "event_types.sexp",
//!   "actor_info": "actors.json",
//!   "pattern_manifest": "%patterns%/manifest.txt",
//!   "variables": { "patterns": "patterns" },
//!   "enabled_event_codes": ["18*", "19*"],
//!   "uniqueness": ["ONE_GROUP_PER_MENTION_PAIR_PER_EVENT_GROUP_PER_ICEWS_SENTENCE"],
//!   "pattern_sets": { "block_events": "block.sexp" }
//! }
//! ```
//!
//! Relative paths resolve against the config file's directory after
//! `%var%`/`+var+` expansion.

use crate::catalog::compile_code_globs;
use crate::error::read_to_string;
use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

bitflags::bitflags! {
    /// Which identifiers make two event mentions "the same event".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Uniqueness: u16 {
        const EVENT_TYPE             = 1 << 0;
        const EVENT_GROUP            = 1 << 1;
        const SENTENCE               = 1 << 2;
        const ICEWS_SENTENCE         = 1 << 3;
        const MENTION_PAIR           = 1 << 4;
        const ENTITY_PAIR            = 1 << 5;
        const ACTOR_PAIR             = 1 << 6;
        const PROPER_NOUN_ACTOR_PAIR = 1 << 7;
    }
}

impl Uniqueness {
    /// Flags that put participant identity into the key.
    pub const PARTICIPANTS: Uniqueness = Uniqueness::MENTION_PAIR
        .union(Uniqueness::ENTITY_PAIR)
        .union(Uniqueness::ACTOR_PAIR)
        .union(Uniqueness::PROPER_NOUN_ACTOR_PAIR);

    /// Parse `ONE_GROUP_PER_<DOMAIN>(_PER_<DOMAIN>)*` (case-insensitive).
    pub fn parse(spec: &str) -> Result<Self> {
        let upper = spec.trim().to_ascii_uppercase();
        if !regex!(r"^ONE_GROUP(_PER_[A-Z_]+)+$").is_match(&upper) {
            bail_config!("bad uniqueness specification '{spec}'");
        }
        let mut flags = Uniqueness::empty();
        for domain in upper.split("_PER_").skip(1) {
            flags |= match domain {
                "EVENT_TYPE" => Uniqueness::EVENT_TYPE,
                "EVENT_GROUP" => Uniqueness::EVENT_GROUP,
                "SENTENCE" => Uniqueness::SENTENCE,
                "ICEWS_SENTENCE" => Uniqueness::ICEWS_SENTENCE,
                "MENTION_PAIR" => Uniqueness::MENTION_PAIR,
                "ENTITY_PAIR" => Uniqueness::ENTITY_PAIR,
                "ACTOR_PAIR" => Uniqueness::ACTOR_PAIR,
                "PROPER_NOUN_ACTOR_PAIR" => Uniqueness::PROPER_NOUN_ACTOR_PAIR,
                other => bail_config!("unknown uniqueness domain '{other}' in '{spec}'"),
            };
        }
        Ok(flags)
    }

    /// Inverse of [`Uniqueness::parse`].
    pub fn to_spec(self) -> String {
        let mut spec = String::from("ONE_GROUP");
        for (name, _) in self.iter_names() {
            spec.push_str("_PER_");
            spec.push_str(name);
        }
        spec
    }
}

fn default_uniqueness() -> Vec<String> {
    vec!["ONE_GROUP_PER_MENTION_PAIR_PER_EVENT_GROUP_PER_ICEWS_SENTENCE".to_string()]
}

fn default_overrides() -> Vec<String> {
    vec!["ONE_GROUP_PER_MENTION_PAIR".to_string()]
}

/// Optional pattern sets used by individual pipeline passes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassPatternPaths {
    pub propagate_actor_labels: Option<String>,
    pub replace_event_type: Option<String>,
    pub block_events: Option<String>,
    pub contingent_block_events: Option<String>,
    pub tag_event_tense: Option<String>,
    pub event_location: Option<String>,
    pub block_event_location: Option<String>,
    pub block_paired_actor_location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub event_types: String,
    #[serde(default)]
    pub actor_info: Option<String>,
    #[serde(default)]
    pub pattern_manifest: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub enabled_event_codes: Vec<String>,
    #[serde(default)]
    pub actor_event_sentence_cutoff: Option<usize>,
    #[serde(default = "default_uniqueness")]
    pub uniqueness: Vec<String>,
    #[serde(default = "default_overrides")]
    pub overrides: Vec<String>,
    #[serde(default)]
    pub add_locations: bool,
    #[serde(default)]
    pub unbinarize: bool,
    #[serde(default)]
    pub pattern_sets: PassPatternPaths,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_json(&read_to_string(path)?)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Expand variables in `raw` and anchor it at the config directory.
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf> {
        let expanded = expand_variables(raw, &self.variables)?;
        let path = PathBuf::from(expanded);
        Ok(if path.is_absolute() { path } else { self.base_dir.join(path) })
    }

    pub fn uniqueness_groups(&self) -> Result<Vec<Uniqueness>> {
        self.uniqueness.iter().map(|s| Uniqueness::parse(s)).collect()
    }

    /// Override groupings; they may not split by type since overriding compares types.
    pub fn override_groups(&self) -> Result<Vec<Uniqueness>> {
        let mut groups = Vec::with_capacity(self.overrides.len());
        for spec in &self.overrides {
            let flags = Uniqueness::parse(spec)?;
            if flags.intersects(Uniqueness::EVENT_TYPE | Uniqueness::EVENT_GROUP) {
                bail_config!("override grouping '{spec}' may not include EVENT_TYPE or EVENT_GROUP");
            }
            groups.push(flags);
        }
        Ok(groups)
    }

    /// Regex over enabled codes; `None` means every code is enabled.
    pub fn enabled_codes(&self) -> Result<Option<Regex>> {
        compile_code_globs(&self.enabled_event_codes.join(","))
    }
}

/// Expand `%name%` and `+name+` references. A delimiter pair with a space
/// between them is left alone; an undefined name is an error.
pub fn expand_variables(input: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let once = expand_with(input, '+', vars)?;
    expand_with(&once, '%', vars)
}

fn expand_with(input: &str, delim: char, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut result = input.to_string();
    let mut pos = 0;
    while let Some(start) = result[pos..].find(delim).map(|i| i + pos) {
        let Some(end) = result[start + 1..].find(delim).map(|i| i + start + 1) else {
            break;
        };
        let name = &result[start + 1..end];
        if name.contains(' ') || name.is_empty() {
            pos = start + 1;
            continue;
        }
        let value = vars
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config(format!("could not expand variable '{name}'")))?
            .clone();
        result.replace_range(start..=end, &value);
        pos = start + value.len();
    }
    Ok(result)
}
