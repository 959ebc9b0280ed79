//! Match-time tense heuristics.
//!
//! Every normalized time expression near the match is classified against the
//! document date:
//!
//! ```text
//! Within   same month, or last month on/after today's day-of-month
//! Older    earlier than that
//! Ongoing  older, but introduced by "since" (or "in the past N years")
//! Unknown  anything else (clock times, untrustworthy "day"/"night" phrases)
//! ```
//!
//! The first proposition or mention of the match that yields a verdict wins;
//! sentence-initial dates and (for violence codes) any date in the sentence
//! are consulted only when the match itself says nothing.

use super::mention::Tense;
use crate::document::{ArgValue, Document, PropKind, PropRef, Sentence, TimeMention};
use crate::matcher::{FeatureSet, Target};
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Historicity {
    Unknown,
    Within,
    Older,
    OlderOngoing,
}

const MAX_DEPTH: usize = 10;

/// Predicates whose recent date says nothing about when the violence happened.
const REPORTING_PREDICATES: &[&str] = &[
    "wanted", "arrested", "condemned", "denounced", "vilified", "admonished", "blasted", "assailed", "castigated",
    "censured", "chastised", "chided", "criticized", "criticised", "decried", "denigrated", "deplored", "derided",
    "lambasted", "rebuked", "scolded", "slammed", "court-martialed", "charged", "tried", "sentenced",
];

pub(crate) fn is_violence(code: &str) -> bool {
    code.starts_with("18") || code.starts_with("19")
}

/// Tense implied by the match `fs` in sentence `sentence`, if any.
pub(crate) fn detect(doc: &Document, fs: &FeatureSet, code: &str, sentence: usize) -> Option<Tense> {
    let date = doc.date?;
    let sent = doc.sentences.get(sentence)?;
    let violence = is_violence(code);
    let mut tense: Option<Tense> = None;

    for target in fs.matched() {
        let (prop_ref, mention_index) = match target {
            Target::Proposition(r) => {
                let referent = doc.proposition(r).and_then(|p| match p.arguments.first() {
                    Some(a) if a.role == "<ref>" => match a.value {
                        ArgValue::Mention(i) => Some(i),
                        _ => None,
                    },
                    _ => None,
                });
                (Some(r), referent.map(|i| (r.sentence, i)))
            }
            Target::Mention(m) => {
                let def = doc.sentences.get(m.sentence).and_then(|s| s.definition_index(m.index));
                (def.map(|index| PropRef { sentence: m.sentence, index }), Some((m.sentence, m.index)))
            }
            _ => continue,
        };
        let prop = prop_ref.and_then(|r| doc.proposition(r).map(|p| (r, p)));
        let predicate = prop.and_then(|(_, p)| p.predicate.as_deref()).unwrap_or("");

        let mut hist = match prop {
            Some((r, _)) => prop_historicity(doc, date, r, 0),
            None => Historicity::Unknown,
        };
        if hist == Historicity::OlderOngoing
            && (code == "173" || code == "175")
            && matches!(predicate, "detained" | "imprisoned" | "jailed")
        {
            hist = Historicity::Older;
        }
        if violence && prop.is_some() && hist == Historicity::Within && REPORTING_PREDICATES.contains(&predicate) {
            continue;
        }
        if hist == Historicity::Within {
            return Some(Tense::Current);
        }
        if matches!(tense, None | Some(Tense::Ongoing)) {
            match hist {
                Historicity::Older => tense = Some(Tense::Historical),
                Historicity::OlderOngoing => tense = Some(Tense::Ongoing),
                _ => {}
            }
        }
        if matches!(tense, None | Some(Tense::Ongoing)) {
            if let Some((s, i)) = mention_index {
                if let Some(t) = modifier_tense(doc, s, i) {
                    tense = Some(t);
                }
            }
        }
    }
    if tense.is_some() {
        return tense;
    }

    // Sentence-initial dates ("In 2003, ...", "Earlier on Monday ...").
    for time in &sent.time_mentions {
        if time.start_token == 0 {
            if time_historicity(sent, time, date) == Historicity::Older {
                return Some(Tense::Historical);
            }
        } else if time.start_token < 3 && sent.tokens.len() > 3 {
            let mut first = sent.tokens[0].to_lowercase();
            if matches!(first.as_str(), "earlier" | "later" | "already") {
                first = sent.tokens[1].to_lowercase();
            }
            let older = time_historicity(sent, time, date) == Historicity::Older;
            if older && matches!(first.as_str(), "in" | "on" | "but") {
                return Some(Tense::Historical);
            }
            if older && matches!(first.as_str(), "between" | "from") {
                return Some(Tense::Ongoing);
            }
        }
    }

    if violence {
        for time in &sent.time_mentions {
            match time_historicity(sent, time, date) {
                Historicity::Older => return Some(Tense::Historical),
                Historicity::OlderOngoing => return Some(Tense::Ongoing),
                _ => {}
            }
        }
    }
    None
}

/// Modifiers and "anniversary of" constructions around a mention.
fn modifier_tense(doc: &Document, sentence: usize, mention: usize) -> Option<Tense> {
    let sent = doc.sentences.get(sentence)?;
    let is_person = sent.mentions.get(mention).is_some_and(|m| m.entity_type == "PER");
    for prop in &sent.propositions {
        let Some(predicate) = prop.predicate.as_deref() else {
            continue;
        };
        let modifies = prop.kind == PropKind::Modifier
            && prop.arguments.first().is_some_and(|a| a.value == ArgValue::Mention(mention));
        if modifies {
            match predicate {
                "long-standing" | "longstanding" | "standing" | "longest-standing" | "long-running"
                | "longrunning" | "longest-running" => return Some(Tense::Ongoing),
                "past" => return Some(Tense::Historical),
                "-old" if !is_person => return Some(Tense::Ongoing),
                _ => {}
            }
        }
        if prop.kind == PropKind::Noun
            && matches!(predicate, "decade" | "decades" | "year" | "years" | "months" | "anniversary" | "commemoration")
            && prop.arguments.iter().any(|a| a.role == "of" && a.value == ArgValue::Mention(mention))
        {
            return Some(if matches!(predicate, "anniversary" | "commemoration") {
                Tense::Historical
            } else {
                Tense::Ongoing
            });
        }
    }
    None
}

pub(crate) fn prop_historicity(doc: &Document, date: NaiveDate, r: PropRef, depth: usize) -> Historicity {
    if depth > MAX_DEPTH {
        return Historicity::Unknown;
    }
    let (Some(sent), Some(prop)) = (doc.sentences.get(r.sentence), doc.proposition(r)) else {
        return Historicity::Unknown;
    };
    let mut referent = None;
    for arg in &prop.arguments {
        if arg.role == "<ref>" {
            if let ArgValue::Mention(i) = arg.value {
                referent = Some(i);
            }
        }
        if let ArgValue::Time(t) = arg.value {
            if let Some(time) = sent.time_mentions.get(t) {
                let mut hist = time_historicity(sent, time, date);
                if hist == Historicity::Older && is_since(sent, time) {
                    hist = Historicity::OlderOngoing;
                }
                if hist != Historicity::Unknown {
                    return hist;
                }
            }
        }
        if matches!(arg.role.as_str(), "following" | "after" | "since") {
            let next = match arg.value {
                ArgValue::Proposition(i) if i != r.index => Some(i),
                ArgValue::Mention(m) => sent.definition_index(m).filter(|&i| i != r.index),
                _ => None,
            };
            let mut hist = match next {
                Some(index) => prop_historicity(doc, date, PropRef { sentence: r.sentence, index }, depth + 1),
                None => Historicity::Unknown,
            };
            if hist == Historicity::Older && arg.role == "since" {
                hist = Historicity::OlderOngoing;
            }
            if hist != Historicity::Unknown {
                return hist;
            }
        }
        if let ArgValue::Mention(m) = arg.value {
            if prop.predicate.as_deref() != Some("sentenced") && matches!(arg.role.as_str(), "in" | "for" | "<temp>") {
                if let Some(mention) = sent.mentions.get(m) {
                    let head = mention.head_word.to_lowercase();
                    if matches!(head.as_str(), "months" | "years" | "year" | "decades" | "decade")
                        && !has_superlative(sent)
                    {
                        return if mention.text.to_lowercase().contains("past ") {
                            Historicity::OlderOngoing
                        } else {
                            Historicity::Older
                        };
                    }
                }
            }
        }
    }

    // "in TIME when EVENT", "did X in TIME as EVENT"
    for other in &sent.propositions {
        let mut allow = false;
        let mut temporal: Option<&TimeMention> = None;
        for arg in &other.arguments {
            match arg.value {
                ArgValue::Mention(i) if arg.role == "<ref>" && Some(i) == referent => allow = true,
                ArgValue::Time(t) => temporal = sent.time_mentions.get(t).or(temporal),
                ArgValue::Proposition(i) if i == r.index && matches!(arg.role.as_str(), "when" | "as" | "after") => {
                    allow = true
                }
                _ => {}
            }
        }
        if allow {
            if let Some(time) = temporal {
                return time_historicity(sent, time, date);
            }
        }
    }
    Historicity::Unknown
}

fn is_since(sent: &Sentence, time: &TimeMention) -> bool {
    time.start_token > 0 && sent.tokens.get(time.start_token - 1).is_some_and(|t| t.eq_ignore_ascii_case("since"))
}

fn has_superlative(sent: &Sentence) -> bool {
    let text = format!("{} ", sent.text().to_lowercase());
    text.contains("the first") || regex!(r"the \S*est ").is_match(&text)
}

/// Classify one time mention of `sent` against the document date.
pub(crate) fn time_historicity(sent: &Sentence, time: &TimeMention, date: NaiveDate) -> Historicity {
    let Some(value) = time.value.as_deref() else {
        return Historicity::Unknown;
    };
    if is_since(sent, time) && has_superlative(sent) {
        return Historicity::Unknown;
    }
    let text = format!("{} ", sent.time_text(time).to_lowercase());
    classify(value, &text, date)
}

/// `text` is the lowercased surface form followed by one space.
pub(crate) fn classify(value: &str, text: &str, date: NaiveDate) -> Historicity {
    if text == "the past " {
        return Historicity::Older;
    }
    let untrustworthy = text.contains(" day ") || text.contains(" night") || text == "night ";
    let within = if untrustworthy { Historicity::Unknown } else { Historicity::Within };

    let (doc_year, doc_month, doc_day) = (date.year(), date.month() as i32, date.day() as i32);
    let (target_year, target_month) = if doc_month > 1 { (doc_year, doc_month - 1) } else { (doc_year - 1, 12) };
    let num = |s: &str| s.parse::<i32>().unwrap_or(0);

    if regex!(r"^[12]\d{3}T").is_match(value) {
        return Historicity::Unknown;
    }
    if let Some(c) = regex!(r"^([12]\d{3})-([0123]?\d)-([0123]?\d)").captures(value) {
        let (year, month, day) = (num(&c[1]), num(&c[2]), num(&c[3]));
        if year == doc_year && month == doc_month {
            return within;
        }
        let last_month =
            (year == doc_year && month == doc_month - 1) || (year == doc_year - 1 && month == 12 && doc_month == 1);
        if last_month && day >= doc_day {
            return within;
        }
        if (year, month, day) < (target_year, target_month, doc_day) {
            return Historicity::Older;
        }
        return Historicity::Unknown;
    }
    if let Some(c) = regex!(r"^([12]\d{3})-([01]?\d)").captures(value) {
        let (year, month) = (num(&c[1]), num(&c[2]));
        if year == doc_year && month == doc_month {
            return within;
        }
        if (year, month) <= (target_year, target_month) {
            return Historicity::Older;
        }
        return Historicity::Unknown;
    }
    if regex!(r"^[12]\d{3}-W[0-5]\d").is_match(value) {
        return Historicity::Within;
    }
    if let Some(c) = regex!(r"^([12]\d{3})").captures(value) {
        return if num(&c[1]) < doc_year { Historicity::Older } else { Historicity::Unknown };
    }
    if let Some(c) = regex!(r"^([12]\d\d)$").captures(value) {
        return if num(&c[1]) * 10 + 9 < doc_year { Historicity::Older } else { Historicity::Unknown };
    }
    Historicity::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn classifies_timex_forms_against_the_document_date() {
        let date = d(2012, 3, 20);
        assert_eq!(classify("2012-03-02", "march 2 ", date), Historicity::Within);
        assert_eq!(classify("2012-02-25", "feb 25 ", date), Historicity::Within);
        assert_eq!(classify("2012-02-10", "feb 10 ", date), Historicity::Older);
        assert_eq!(classify("2011-11", "november ", date), Historicity::Older);
        assert_eq!(classify("2012-03", "this month ", date), Historicity::Within);
        assert_eq!(classify("2012-W11", "last week ", date), Historicity::Within);
        assert_eq!(classify("2009", "2009 ", date), Historicity::Older);
        assert_eq!(classify("2012", "this year ", date), Historicity::Unknown);
        assert_eq!(classify("198", "the 1980s ", date), Historicity::Older);
        assert_eq!(classify("2012T10:00", "10 am ", date), Historicity::Unknown);
        assert_eq!(classify("PAST_REF", "the past ", date), Historicity::Older);
    }

    #[test]
    fn day_and_night_phrases_never_count_as_recent() {
        let date = d(2012, 3, 20);
        assert_eq!(classify("2012-03-19", "the previous day ", date), Historicity::Unknown);
        assert_eq!(classify("2012-03-19", "monday night ", date), Historicity::Unknown);
        assert_eq!(classify("2011-03-19", "that day last year ", date), Historicity::Older);
    }

    #[test]
    fn january_documents_look_back_into_december() {
        let date = d(2013, 1, 10);
        assert_eq!(classify("2012-12-15", "december 15 ", date), Historicity::Within);
        assert_eq!(classify("2012-12-01", "december 1 ", date), Historicity::Older);
        assert!(is_violence("190") && is_violence("1823") && !is_violence("140"));
    }
}
