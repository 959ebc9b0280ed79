//! What a successful match reports.

use crate::actors::{ActorMentionId, ActorMentionSet};
use crate::document::{MentionId, PropRef};
use crate::events::EventMentionId;
use crate::pattern::{PatternId, ReturnSpec};

/// The object a pattern was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Sentence(usize),
    Mention(MentionId),
    Actor(ActorMentionId),
    Event(EventMentionId),
    Proposition(PropRef),
}

impl Target {
    /// The entity mention behind a mention or actor target.
    pub fn mention(self, actors: &ActorMentionSet) -> Option<MentionId> {
        match self {
            Target::Mention(m) => Some(m),
            Target::Actor(a) => Some(actors.get(a).mention),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    /// Label of the top-level pattern that produced the match.
    TopLevel { label: String },
    Matched { pattern: PatternId, target: Target },
    Return { pattern: PatternId, ret: ReturnSpec, target: Target },
}

/// Ordered fragments of one match, outermost pattern last.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
    pub score: Option<f32>,
}

impl FeatureSet {
    pub(crate) fn absorb(&mut self, other: FeatureSet) {
        self.features.extend(other.features);
        self.score = match (self.score, other.score) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn label(&self) -> Option<&str> {
        self.features.iter().find_map(|f| match f {
            Feature::TopLevel { label } => Some(label.as_str()),
            _ => None,
        })
    }

    pub fn returns(&self) -> impl Iterator<Item = (&ReturnSpec, Target)> {
        self.features.iter().filter_map(|f| match f {
            Feature::Return { ret, target, .. } => Some((ret, *target)),
            _ => None,
        })
    }

    /// Return features attached to event mentions.
    pub fn event_returns(&self) -> impl Iterator<Item = (&ReturnSpec, EventMentionId)> {
        self.returns().filter_map(|(ret, t)| match t {
            Target::Event(e) => Some((ret, e)),
            _ => None,
        })
    }

    /// Return features attached to actor mentions.
    pub fn actor_returns(&self) -> impl Iterator<Item = (&ReturnSpec, ActorMentionId)> {
        self.returns().filter_map(|(ret, t)| match t {
            Target::Actor(a) => Some((ret, a)),
            _ => None,
        })
    }

    pub fn matched(&self) -> impl Iterator<Item = Target> + '_ {
        self.features.iter().filter_map(|f| match f {
            Feature::Matched { target, .. } => Some(*target),
            _ => None,
        })
    }
}
