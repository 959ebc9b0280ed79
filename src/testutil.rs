//! Fixtures shared by the unit tests: a small catalog and a document builder.

use crate::actors::{
    ActorId, ActorIdentifiers, ActorInfo, ActorKind, ActorMention, ActorMentionSet, ActorRecord, AgentId,
    AgentIdentifiers, AgentRecord, GeoResolution,
};
use crate::catalog::{Catalog, EventTypeRegistry};
use crate::document::{
    ArgValue, Argument, Document, Mention, MentionId, MentionType, PropKind, PropRef, Proposition, Sentence,
    TimeMention, TimeRef,
};
use chrono::NaiveDate;

pub(crate) const EVENT_TYPES: &str = r#"
    (event-type (name "Make statement") (code "010") (event-group STATEMENT)
                (role SOURCE) (optional-role TARGET))
    (event-type (name "Consult") (code "040") (event-group COOPERATION)
                (role SOURCE) (role TARGET) (shared-entity-roles SOURCE TARGET))
    (event-type (name "Protest") (code "140") (event-group PROTEST) (role SOURCE) (optional-role TARGET))
    (event-type (name "Use unconventional violence") (code "180") (event-group VIOLENCE)
                (role SOURCE) (role TARGET))
    (event-type (name "Use conventional military force") (code "190") (event-group VIOLENCE)
                (role SOURCE) (role TARGET) (overrides 18*))
    (event-type (name "Fight with artillery") (code "194") (event-group VIOLENCE)
                (role SOURCE) (role TARGET) (overrides 190))
    (event-type (name "Attack placeholder") (code "TMP") (event-group VIOLENCE)
                (role SOURCE) (optional-role TARGET) (overrides 19* 18*) DISCARD-EVENTS-WITH-THIS-TYPE)
"#;

pub(crate) const SYR: u32 = 1;
pub(crate) const TUR: u32 = 2;
pub(crate) const DAMASCUS: u32 = 3;
pub(crate) const REB: u32 = 10;
pub(crate) const MIL: u32 = 11;

pub(crate) fn registry() -> EventTypeRegistry {
    EventTypeRegistry::parse(EVENT_TYPES).unwrap()
}

pub(crate) fn actor_info() -> ActorInfo {
    let actor = |id: u32, code: &str, is_country: bool, iso: Option<&str>, countries: Vec<u32>| ActorRecord {
        id: ActorId(id),
        code: code.to_string(),
        name: code.to_string(),
        is_country,
        iso_code: iso.map(str::to_string),
        sectors: Vec::new(),
        countries: countries.into_iter().map(ActorId).collect(),
    };
    ActorInfo::new(
        vec![
            actor(SYR, "SYR", true, Some("SY"), vec![]),
            actor(TUR, "TUR", true, Some("TR"), vec![]),
            actor(DAMASCUS, "SYRGOV", false, None, vec![SYR]),
        ],
        vec![
            AgentRecord { id: AgentId(REB), code: "REB".to_string() },
            AgentRecord { id: AgentId(MIL), code: "MIL".to_string() },
        ],
    )
}

pub(crate) fn catalog() -> Catalog {
    Catalog::new(registry(), actor_info())
}

pub(crate) fn actor_ids(id: u32, code: &str) -> ActorIdentifiers {
    ActorIdentifiers { id: ActorId(id), code: code.to_string(), pattern_id: None }
}

/// Builds documents sentence by sentence. Mention text doubles as head word.
#[derive(Debug, Default)]
pub(crate) struct DocBuilder {
    doc: Document,
}

impl DocBuilder {
    pub fn new(name: &str) -> Self {
        let mut b = Self::default();
        b.doc.name = name.to_string();
        b.doc.date = NaiveDate::from_ymd_opt(2012, 3, 20);
        b
    }

    pub fn no_date(mut self) -> Self {
        self.doc.date = None;
        self
    }

    pub fn sentence(&mut self, text: &str) -> usize {
        self.doc.sentences.push(Sentence {
            tokens: text.split_whitespace().map(str::to_string).collect(),
            ..Sentence::default()
        });
        self.doc.sentences.len() - 1
    }

    pub fn icews(&mut self, sentence: usize, number: usize) {
        self.doc.sentences[sentence].icews_sentence = Some(number);
    }

    pub fn mention(&mut self, sentence: usize, text: &str, entity_type: &str, entity: Option<usize>) -> MentionId {
        let mention_type = if text.chars().next().is_some_and(char::is_uppercase) {
            MentionType::Name
        } else {
            MentionType::Desc
        };
        let mentions = &mut self.doc.sentences[sentence].mentions;
        mentions.push(Mention {
            entity,
            mention_type,
            entity_type: entity_type.to_string(),
            head_word: text.to_lowercase(),
            text: text.to_string(),
        });
        MentionId::new(sentence, mentions.len() - 1)
    }

    pub fn proper_noun(&mut self, mention: MentionId, id: u32, code: &str) {
        self.actor(mention, ActorKind::ProperNoun { actor: actor_ids(id, code), geo: None });
    }

    /// A proper noun that is also a resolved place in country `iso`.
    pub fn place(&mut self, mention: MentionId, id: u32, code: &str, iso: &str) {
        let geo = GeoResolution { country_code: iso.to_string(), name: None };
        self.actor(mention, ActorKind::ProperNoun { actor: actor_ids(id, code), geo: Some(geo) });
    }

    pub fn composite(&mut self, mention: MentionId, agent: u32, agent_code: &str, paired: Option<(u32, &str)>) {
        let agent = AgentIdentifiers { id: AgentId(agent), code: agent_code.to_string(), pattern_id: None };
        let paired_actor = paired.map(|(id, code)| actor_ids(id, code));
        self.actor(mention, ActorKind::Composite { agent, paired_actor });
    }

    fn actor(&mut self, mention: MentionId, kind: ActorKind) {
        self.doc.actor_mentions.push(ActorMention { mention, source_note: String::new(), kind });
    }

    /// A verb proposition with mention arguments, e.g. `[("<sub>", m0), ("<obj>", m1)]`.
    pub fn verb(&mut self, sentence: usize, predicate: &str, args: &[(&str, MentionId)]) -> PropRef {
        let arguments =
            args.iter().map(|(role, m)| Argument { role: role.to_string(), value: ArgValue::Mention(m.index) }).collect();
        self.prop(sentence, PropKind::Verb, Some(predicate), arguments)
    }

    pub fn prop(
        &mut self,
        sentence: usize,
        kind: PropKind,
        predicate: Option<&str>,
        arguments: Vec<Argument>,
    ) -> PropRef {
        let props = &mut self.doc.sentences[sentence].propositions;
        props.push(Proposition { kind, predicate: predicate.map(str::to_string), arguments });
        PropRef { sentence, index: props.len() - 1 }
    }

    /// A time mention over tokens `start..=end`, attached to `prop` as `<temp>`.
    pub fn time(&mut self, prop: PropRef, start: usize, end: usize, value: &str) -> TimeRef {
        let sent = &mut self.doc.sentences[prop.sentence];
        sent.time_mentions.push(TimeMention { start_token: start, end_token: end, value: Some(value.to_string()) });
        let index = sent.time_mentions.len() - 1;
        sent.propositions[prop.index].arguments.push(Argument { role: "<temp>".to_string(), value: ArgValue::Time(index) });
        TimeRef { sentence: prop.sentence, index }
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

pub(crate) fn actors_of(doc: &Document) -> ActorMentionSet {
    ActorMentionSet::new(doc.actor_mentions.clone())
}
