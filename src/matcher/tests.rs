use super::*;
use crate::actors::ActorMentionId;
use crate::catalog::{SOURCE, TARGET};
use crate::document::PropRef;
use crate::events::{EventMention, Participant};
use crate::testutil::{DAMASCUS, DocBuilder, MIL, REB, SYR, TUR, actors_of, catalog};
use crate::Error;

// Actor mention ids follow insertion order in `doc`.
const TROOPS: ActorMentionId = ActorMentionId(0);
const REBELS: ActorMentionId = ActorMentionId(1);
const HOMS: ActorMentionId = ActorMentionId(2);
const OFFICIALS: ActorMentionId = ActorMentionId(3);
const TURKEY: ActorMentionId = ActorMentionId(4);
const MILITANTS: ActorMentionId = ActorMentionId(5);

/// `homs` is the (actor id, actor code, country iso) Homs resolves to.
fn doc(homs: (u32, &str, &str)) -> Document {
    let mut b = DocBuilder::new("matcher");
    let s0 = b.sentence("Syrian troops shelled rebels in Homs");
    let troops = b.mention(s0, "troops", "ORG", Some(0));
    let rebels = b.mention(s0, "rebels", "PER", Some(1));
    let place = b.mention(s0, "Homs", "GPE", Some(2));
    b.composite(troops, MIL, "MIL", Some((SYR, "SYR")));
    b.composite(rebels, REB, "REB", None);
    b.place(place, homs.0, homs.1, homs.2);
    b.verb(s0, "shelled", &[("<sub>", troops), ("<obj>", rebels), ("in", place)]);

    let s1 = b.sentence("Damascus officials met Turkey about militants");
    b.icews(s1, 2);
    let officials = b.mention(s1, "officials", "ORG", Some(3));
    let turkey = b.mention(s1, "Turkey", "GPE", Some(4));
    let militants = b.mention(s1, "militants", "PER", Some(5));
    b.proper_noun(officials, DAMASCUS, "SYRGOV");
    b.proper_noun(turkey, TUR, "TUR");
    b.composite(militants, REB, "REB", None);
    b.verb(s1, "met", &[("<sub>", officials), ("<obj>", turkey), ("about", militants)]);
    b.build()
}

fn syrian_doc() -> Document {
    doc((SYR, "SYR", "SY"))
}

fn matches_with(text: &str, doc: &Document, events: Option<&EventMentionSet>) -> Vec<FeatureSet> {
    let set = PatternSet::parse(text).unwrap();
    let catalog = catalog();
    let actors = actors_of(doc);
    let labels = EntityLabels::compute(&set, doc, &catalog, &actors);
    Matcher::new(&set, doc, &catalog, &actors, events, &labels).all_matches()
}

fn matches(text: &str) -> Vec<FeatureSet> {
    matches_with(text, &syrian_doc(), None)
}

/// `(label, target)` of every return across `found`.
fn returned(found: &[FeatureSet]) -> Vec<(String, Target)> {
    found
        .iter()
        .flat_map(|fs| fs.returns().map(|(ret, target)| (ret.label.clone().unwrap_or_default(), target)))
        .collect()
}

fn toplevel(patterns: &str) -> String {
    format!("(test (toplevel {patterns}))")
}

// --- Actors, mentions, text ------------------------------------------------------

#[test]
fn actor_patterns_filter_on_shape_and_codes() {
    let found = matches(&toplevel("(icews-actor composite (agent-code MIL) (return HIT))"));
    assert_eq!(returned(&found), vec![("HIT".to_string(), Target::Actor(TROOPS))]);

    // A composite's actor code is its paired actor's.
    let found = matches(&toplevel("(icews-actor (actor-code SYR) (return HIT))"));
    let targets: Vec<Target> = returned(&found).into_iter().map(|(_, t)| t).collect();
    assert_eq!(targets, vec![Target::Actor(TROOPS), Target::Actor(HOMS)]);

    let found = matches(&toplevel("(icews-actor is-country (block-actor-code SYR) (return HIT))"));
    assert_eq!(returned(&found), vec![("HIT".to_string(), Target::Actor(TURKEY))]);
}

#[test]
fn mention_patterns_check_type_head_and_actor() {
    let found = matches(&toplevel("(mention (acetype gpe) (block-headword turkey) (return PLACE))"));
    assert_eq!(returned(&found), vec![("PLACE".to_string(), Target::Mention(MentionId::new(0, 2)))]);

    let found = matches(&toplevel("(mention (mentiontype desc) (actor (icews-actor proper-noun)) (return X))"));
    assert_eq!(returned(&found), vec![("X".to_string(), Target::Mention(MentionId::new(1, 0)))]);
}

#[test]
fn regex_patterns_match_sentence_text() {
    let found = matches(&toplevel(r#"(regex (id shelling) (re "shell(ed|ing)") (return X))"#));
    assert_eq!(returned(&found), vec![("X".to_string(), Target::Sentence(0))]);
    assert_eq!(found[0].label(), Some("shelling"));
}

#[test]
fn scores_are_reported_on_the_match() {
    let found = matches(&toplevel("(mention (score 0.5) (headword rebels))"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].score, Some(0.5));
}

// --- Propositions ----------------------------------------------------------------

#[test]
fn proposition_arguments_return_their_mentions() {
    let set = toplevel(
        "(vprop (id shelling) (predicate @ATTACK)
                (args (argument (role <sub>) (mention (actor (icews-actor (agent-code MIL))) (return SOURCE)))
                      (argument (role <obj>) (mention (return TARGET)))))",
    );
    let set = set.replace("(test ", "(test (wordsets (ATTACK bombed Shelled)) ");
    let found = matches(&set);
    assert_eq!(found.len(), 1);
    assert_eq!(
        returned(&found),
        vec![
            ("SOURCE".to_string(), Target::Mention(MentionId::new(0, 0))),
            ("TARGET".to_string(), Target::Mention(MentionId::new(0, 1))),
        ]
    );
    let props: Vec<Target> = found[0].matched().filter(|t| matches!(t, Target::Proposition(_))).collect();
    assert_eq!(props, vec![Target::Proposition(PropRef { sentence: 0, index: 0 })]);
}

#[test]
fn block_args_and_missing_args_reject_the_proposition() {
    assert!(matches(&toplevel("(vprop (predicate shelled) (block-args (argument (role in))))")).is_empty());
    assert!(matches(&toplevel("(vprop (predicate shelled) (args (argument (role <iobj>))))")).is_empty());
    // Optional arguments only add what they find.
    let found = matches(&toplevel(
        "(vprop (predicate met) (args (argument (role <sub>)))
                (opt-args (argument (role in) (mention (return LOC)))))",
    ));
    assert_eq!(found.len(), 1);
    assert!(returned(&found).is_empty());
}

#[test]
fn bound_variables_must_agree_across_arguments() {
    let pattern = toplevel(
        "(vprop (id local-shelling) (predicate shelled)
                (args (argument (role <sub>) (mention (return (PAIRED-ACTOR c))))
                      (argument (role in) (mention (return (ACTOR c))))))",
    );
    assert_eq!(matches_with(&pattern, &syrian_doc(), None).len(), 1);
    // Homs resolved to Turkey no longer agrees with the troops' Syria.
    assert!(matches_with(&pattern, &doc((TUR, "TUR", "TR")), None).is_empty());
}

// --- Combinations, shortcuts, labels ---------------------------------------------

#[test]
fn combinations_follow_their_operator() {
    let any = toplevel("(any-of (members (mention (headword tanks)) (mention (headword rebels) (return X))))");
    assert_eq!(returned(&matches(&any)), vec![("X".to_string(), Target::Mention(MentionId::new(0, 1)))]);

    let none = toplevel("(none-of (id quiet) (members (regex (re shelled))))");
    let found = matches(&none);
    assert_eq!(found.len(), 1);
    assert!(found[0].matched().any(|t| t == Target::Sentence(1)));

    let all = toplevel("(all-of (members (mention (headword troops)) (regex (re met))))");
    assert!(matches(&all).is_empty());
}

#[test]
fn shortcuts_resolve_to_reference_patterns() {
    let set = "(test (reference (icews-actor (shortcut MILITARY) (agent-code MIL)))
                     (toplevel (mention (actor MILITARY) (return M))))";
    assert_eq!(returned(&matches(set)), vec![("M".to_string(), Target::Mention(MentionId::new(0, 0)))]);

    let err = PatternSet::parse("(test (toplevel (mention (actor NAVY))))").unwrap_err();
    assert!(matches!(err, Error::UnresolvedShortcut(name) if name == "NAVY"));
}

#[test]
fn entity_labels_mark_mentions_for_later_patterns() {
    let set = "(test (entitylabels (ARMED (mention (headword troops rebels))))
                     (toplevel (mention (entitylabel ARMED) (block-actor (icews-actor (agent-code REB))) (return A))))";
    assert_eq!(returned(&matches(set)), vec![("A".to_string(), Target::Mention(MentionId::new(0, 0)))]);

    let doc = syrian_doc();
    let parsed = PatternSet::parse(set).unwrap();
    let labels = EntityLabels::compute(&parsed, &doc, &catalog(), &actors_of(&doc));
    assert!(labels.has(MentionId::new(0, 1), "ARMED"));
    assert!(!labels.has(MentionId::new(1, 0), "ARMED"));

    let err = PatternSet::parse("(test (toplevel (mention (entitylabel UNARMED))))").unwrap_err();
    assert!(matches!(err, Error::Pattern(_)));
}

// --- Event patterns --------------------------------------------------------------

/// e0 190 troops shell rebels in Homs, e1 040 officials meet Turkey, e2 140
/// officials alone, e3 180 rebels against militants across both sentences,
/// e4 a discardable placeholder.
fn events() -> EventMentionSet {
    let registry = crate::testutil::registry();
    let ty = |code: &str| registry.id_of(code).unwrap();
    let s0p0 = PropRef { sentence: 0, index: 0 };
    let s1p0 = PropRef { sentence: 1, index: 0 };
    let mut events = EventMentionSet::default();
    let mut attack = EventMention::new(
        ty("190"),
        vec![Participant::new(SOURCE, TROOPS), Participant::new(TARGET, REBELS), Participant::new("LOCATION", HOMS)],
        "shelling",
    );
    attack.propositions = vec![s0p0];
    events.add(attack);
    events.add(EventMention::new(
        ty("040"),
        vec![Participant::new(SOURCE, OFFICIALS), Participant::new(TARGET, TURKEY)],
        "meeting",
    ));
    events.add(EventMention::new(ty("140"), vec![Participant::new(SOURCE, OFFICIALS)], "protest"));
    let mut clash = EventMention::new(
        ty("180"),
        vec![Participant::new(SOURCE, REBELS), Participant::new(TARGET, MILITANTS)],
        "clash",
    );
    clash.propositions = vec![s1p0, s0p0];
    events.add(clash);
    events.add(EventMention::new(ty("TMP"), vec![Participant::new(SOURCE, OFFICIALS)], "placeholder"));
    events
}

fn event_matches(patterns: &str) -> Vec<FeatureSet> {
    let doc = syrian_doc();
    let events = events();
    matches_with(&toplevel(patterns), &doc, Some(&events))
}

fn event_hits(patterns: &str) -> Vec<usize> {
    event_matches(patterns)
        .iter()
        .flat_map(|fs| fs.event_returns().map(|(_, e)| e.0).collect::<Vec<_>>())
        .collect()
}

#[test]
fn event_patterns_are_matched_once_per_document() {
    let found = event_matches("(icews-event (id violent) (event-code 19*) (return HIT))");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label(), Some("violent"));
    assert_eq!(event_hits("(icews-event (block-code 19*) (return HIT))"), vec![1, 2, 3]);
    assert_eq!(
        event_hits("(icews-event (pattern-id meeting protest) (block-pattern-id protest) (return HIT))"),
        vec![1]
    );
    // Without events, event patterns see nothing.
    assert!(matches(&toplevel("(icews-event (return HIT))")).is_empty());
}

#[test]
fn participants_match_by_role_or_any() {
    assert_eq!(event_hits("(icews-event (participant SOURCE (icews-actor (agent-code MIL))) (return HIT))"), vec![0]);
    assert_eq!(event_hits("(icews-event (participant ANY (icews-actor (actor-code TUR))) (return HIT))"), vec![1]);
    assert_eq!(event_hits("(icews-event (block-participant ANY (icews-actor proper-noun)) (return HIT))"), vec![3]);
    assert_eq!(
        event_hits("(icews-event (participant TARGET (mention (headword rebels) (return R))) (return HIT))"),
        vec![0]
    );
}

#[test]
fn same_actor_treats_unidentified_participants_as_one_null_actor() {
    // Troops FOR Syria in Syrian Homs.
    assert_eq!(event_hits("(icews-event (event-code 190) (same-actor SOURCE LOCATION) (return HIT))"), vec![0]);
    // Only the two unpaired composites agree; a missing target is null and
    // differs from the officials.
    assert_eq!(event_hits("(icews-event (same-actor SOURCE TARGET) (return HIT))"), vec![3]);
    assert_eq!(event_hits("(icews-event (block-same-actor SOURCE TARGET) (return HIT))"), vec![0, 1, 2]);
}

#[test]
fn same_country_skips_unidentified_participants() {
    // Rebels are skipped; the troops alone give a country.
    assert_eq!(event_hits("(icews-event (event-code 190) (same-country SOURCE TARGET) (return HIT))"), vec![0]);
    // Damascus government is Syrian, Turkey is not; nobody identified shares nothing.
    assert_eq!(event_hits("(icews-event (block-same-country SOURCE TARGET) (return HIT))"), vec![1, 3]);
}

#[test]
fn same_agent_gives_non_composites_the_null_agent() {
    assert_eq!(event_hits("(icews-event (same-agent SOURCE TARGET) (return HIT))"), vec![1, 2, 3]);
    // MIL troops against REB rebels.
    assert_eq!(event_hits("(icews-event (block-same-agent SOURCE TARGET) (return HIT))"), vec![0]);
}

#[test]
fn event_sentence_and_document_sub_patterns_share_bindings() {
    let sentno = "(icews-event (event-code 040) (return (SENTNO n))
                               (sentence-matches (regex (re met) (return (SENTNO n)))))";
    assert_eq!(event_matches(sentno).len(), 1);

    let elsewhere = "(icews-event (event-code 040) (return (SENTNO n))
                                  (document-matches (regex (re shelled) (return (SENTNO n)))))";
    assert!(event_matches(elsewhere).is_empty());

    assert!(event_matches("(icews-event (event-code 040) (block-sentence-matches (regex (re met))))").is_empty());
    assert_eq!(event_matches("(icews-event (event-code 040) (document-matches (regex (re shelled))))").len(), 1);
}

#[test]
fn sentence_matches_must_hold_in_every_participant_sentence() {
    // The clash spans both sentences; only the second mentions a meeting.
    assert!(event_hits("(icews-event (event-code 18*) (sentence-matches (regex (re met))) (return HIT))").is_empty());
    assert_eq!(
        event_hits(r#"(icews-event (event-code 18*) (sentence-matches (regex (re "shelled|met"))) (return HIT))"#),
        vec![3]
    );
}

#[test]
fn discardable_events_never_match() {
    assert_eq!(event_hits("(icews-event (return HIT))"), vec![0, 1, 2, 3]);
    assert_eq!(event_hits("(icews-event (return (EVENT-CODE c)))"), vec![0, 1, 2, 3]);
    assert!(event_hits("(icews-event (event-code TMP) (return BLOCK))").is_empty());
}

#[test]
fn unpaired_composites_bind_an_empty_paired_actor() {
    let pair = |code: &str| {
        format!(
            "(icews-event (event-code {code})
                          (participant SOURCE (icews-actor composite (return (PAIRED-ACTOR p))))
                          (participant TARGET (icews-actor composite (return (PAIRED-ACTOR p))))
                          (return HIT))"
        )
    };
    // Rebels and militants are both unpaired, so both bind "".
    assert_eq!(event_hits(&pair("180")), vec![3]);
    // Syria against "" does not unify.
    assert!(event_hits(&pair("190")).is_empty());
    // The officials are a proper noun with no paired actor to bind at all.
    assert_eq!(
        event_hits("(icews-event (participant SOURCE (icews-actor (return (PAIRED-ACTOR p)))) (return HIT))"),
        vec![0, 3]
    );
}

#[test]
fn first_proposition_only_looks_at_the_first() {
    assert_eq!(event_hits("(icews-event (first-proposition (vprop (predicate shelled))) (return HIT))"), vec![0]);
    // The clash's first proposition is the meeting; events without propositions never match.
    assert_eq!(event_hits("(icews-event (first-proposition (vprop (predicate met))) (return HIT))"), vec![3]);
}

#[test]
fn match_event_targets_a_single_event() {
    let doc = syrian_doc();
    let events = events();
    let set = PatternSet::parse(&toplevel("(icews-event (id any) (return HIT))")).unwrap();
    let catalog = catalog();
    let actors = actors_of(&doc);
    let labels = EntityLabels::default();
    let matcher = Matcher::new(&set, &doc, &catalog, &actors, Some(&events), &labels);
    let pattern = set.toplevel()[0];

    let fs = matcher.match_event(pattern, EventMentionId(1)).unwrap();
    assert_eq!(fs.event_returns().map(|(_, e)| e).collect::<Vec<_>>(), vec![EventMentionId(1)]);
    assert!(matcher.match_event(pattern, EventMentionId(4)).is_none());
    assert!(matcher.match_event(pattern, EventMentionId(9)).is_none());
    // Document-scope patterns are not repeated per sentence.
    assert!(matcher.sentence_matches(0).is_empty());
}
