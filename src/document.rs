//! The annotated document consumed by the coder.
//!
//! Everything here is produced upstream (tokenizer, parser, proposition
//! finder, coreference, actor resolution) and handed over as JSON. The model is
//! index based: mentions, propositions and time mentions are addressed by their
//! position inside their sentence, and a [`MentionId`] pairs a sentence index
//! with a mention index.

use crate::actors::ActorMention;
use crate::error::read_to_string;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Document-wide mention address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionId {
    pub sentence: usize,
    pub index: usize,
}

impl MentionId {
    pub fn new(sentence: usize, index: usize) -> Self {
        Self { sentence, index }
    }
}

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sentence, self.index)
    }
}

/// Document-wide proposition address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropRef {
    pub sentence: usize,
    pub index: usize,
}

/// Document-wide time mention address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRef {
    pub sentence: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionType {
    Name,
    Desc,
    Pronoun,
    Other,
}

impl MentionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Some(MentionType::Name),
            "desc" => Some(MentionType::Desc),
            "pronoun" | "pron" => Some(MentionType::Pronoun),
            "other" => Some(MentionType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    /// Coreference entity, if the mention was linked to one.
    #[serde(default)]
    pub entity: Option<usize>,
    pub mention_type: MentionType,
    /// ACE-style type: PER, ORG, GPE, LOC, FAC, ...
    pub entity_type: String,
    pub head_word: String,
    #[serde(default)]
    pub text: String,
}

impl Mention {
    pub fn is_location_like(&self) -> bool {
        matches!(self.entity_type.as_str(), "GPE" | "LOC" | "FAC")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    Verb,
    Noun,
    Modifier,
    Copula,
    Set,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgValue {
    Mention(usize),
    Proposition(usize),
    Time(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    /// `<sub>`, `<obj>`, `<ref>`, `<temp>`, or a preposition such as `in`.
    pub role: String,
    pub value: ArgValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposition {
    pub kind: PropKind,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

/// A normalized temporal expression (TIMEX2-style value such as `2012-03-14`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeMention {
    pub start_token: usize,
    pub end_token: usize,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sentence {
    pub tokens: Vec<String>,
    /// Sentence number in the ICEWS story numbering, when it differs from ours.
    #[serde(default)]
    pub icews_sentence: Option<usize>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub propositions: Vec<Proposition>,
    #[serde(default)]
    pub time_mentions: Vec<TimeMention>,
}

impl Sentence {
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// The proposition whose `<ref>` argument is the given mention.
    pub fn definition(&self, mention_index: usize) -> Option<&Proposition> {
        self.definition_index(mention_index).map(|i| &self.propositions[i])
    }

    pub fn definition_index(&self, mention_index: usize) -> Option<usize> {
        self.propositions.iter().position(|p| {
            p.arguments.first().is_some_and(|a| a.role == "<ref>" && a.value == ArgValue::Mention(mention_index))
        })
    }

    pub fn time_text(&self, time: &TimeMention) -> String {
        let end = (time.end_token + 1).min(self.tokens.len());
        self.tokens.get(time.start_token..end).map(|t| t.join(" ")).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    /// Publication date; tense detection is skipped without one.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub sentences: Vec<Sentence>,
    #[serde(default)]
    pub actor_mentions: Vec<ActorMention>,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn mention(&self, id: MentionId) -> Option<&Mention> {
        self.sentences.get(id.sentence).and_then(|s| s.mentions.get(id.index))
    }

    /// ICEWS sentence number of sentence `sentence`, falling back to its index.
    pub fn icews_sentence_no(&self, sentence: usize) -> usize {
        self.sentences.get(sentence).and_then(|s| s.icews_sentence).unwrap_or(sentence)
    }

    pub fn proposition(&self, r: PropRef) -> Option<&Proposition> {
        self.sentences.get(r.sentence).and_then(|s| s.propositions.get(r.index))
    }

    pub fn time_mention(&self, r: TimeRef) -> Option<&TimeMention> {
        self.sentences.get(r.sentence).and_then(|s| s.time_mentions.get(r.index))
    }

    pub fn entity_of(&self, id: MentionId) -> Option<usize> {
        self.mention(id).and_then(|m| m.entity)
    }
}
