use crate::actors::{ActorInfo, ActorMentionSet};
use crate::catalog::{Catalog, EventTypeRegistry};
use crate::config::Config;
use crate::document::Document;
use crate::events::{
    self, Context, EventMentionSet, EventPatternRun, PassPatternSets, PassTimer, PipelineSettings, RunMetrics,
};
use crate::pattern::{PatternSet, read_manifest};
use crate::Result;
use std::collections::HashMap;
use std::time::Instant;

/// Finds and resolves event mentions in documents.
///
/// Holds everything that is loaded once: the catalog, the main event pattern
/// sets (each with the code it was registered under) and the pattern sets of
/// the individual pipeline passes. [`EventFinder::run`] can then be called for
/// any number of documents.
#[derive(Debug, Clone)]
pub struct EventFinder {
    catalog: Catalog,
    event_sets: Vec<(String, PatternSet)>,
    pass_sets: PassPatternSets,
    settings: PipelineSettings,
    sentence_cutoff: Option<usize>,
}

/// Result of [`EventFinder::run`].
#[derive(Debug, Clone)]
pub struct FinderRun {
    /// The surviving event mentions, in insertion order.
    pub events: EventMentionSet,
    /// The document's actor mentions, including paired actors filled in and
    /// unknown actors created while generating events.
    pub actors: ActorMentionSet,
    pub metrics: RunMetrics,
}

impl EventFinder {
    /// A finder with no pattern sets and default pipeline settings.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            event_sets: Vec::new(),
            pass_sets: PassPatternSets::default(),
            settings: PipelineSettings::default(),
            sentence_cutoff: None,
        }
    }

    /// Load catalogs, the manifest's pattern sets and every pass pattern set
    /// named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = EventTypeRegistry::load(&config.resolve_path(&config.event_types)?)?;
        let actor_info = match &config.actor_info {
            Some(path) => ActorInfo::load(&config.resolve_path(path)?)?,
            None => ActorInfo::default(),
        };

        let mut event_sets = Vec::new();
        if let Some(manifest) = &config.pattern_manifest {
            let enabled = config.enabled_codes()?;
            let manifest = config.resolve_path(manifest)?;
            for entry in read_manifest(&manifest, &config.variables, &registry, enabled.as_ref())? {
                let set = PatternSet::load(&entry.path)?;
                tracing::debug!(code = %entry.code, set = %set.name, path = %entry.path.display(), "loaded event patterns");
                event_sets.push((entry.code, set));
            }
        }

        Ok(Self {
            catalog: Catalog::new(registry, actor_info),
            event_sets,
            pass_sets: PassPatternSets::load(config)?,
            settings: PipelineSettings::from_config(config)?,
            sentence_cutoff: config.actor_event_sentence_cutoff,
        })
    }

    /// Add a main event pattern set whose matches default to `code`.
    pub fn with_event_patterns(mut self, code: impl Into<String>, set: PatternSet) -> Self {
        self.event_sets.push((code.into(), set));
        self
    }

    pub fn with_pass_patterns(mut self, sets: PassPatternSets) -> Self {
        self.pass_sets = sets;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Only match event patterns in sentences before ICEWS sentence `cutoff`.
    pub fn with_sentence_cutoff(mut self, cutoff: Option<usize>) -> Self {
        self.sentence_cutoff = cutoff;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn event_set_count(&self) -> usize {
        self.event_sets.len()
    }

    /// Generate event mentions for `doc` and run the pipeline over them.
    pub fn run(&self, doc: &Document) -> Result<FinderRun> {
        let start = Instant::now();
        let ctx = Context::new(doc, &self.catalog);
        let mut actors = ActorMentionSet::new(doc.actor_mentions.clone());
        let mut events = EventMentionSet::default();
        let mut passes = Vec::new();

        let blocked_locations = match &self.pass_sets.block_paired_actor_location {
            Some(set) => events::paired_location_blocks(set, ctx, &actors),
            None => HashMap::new(),
        };
        let sentence_limit = self.sentence_limit(doc);
        let mut next_original_id = 0;
        for (code, set) in &self.event_sets {
            if set.toplevel().is_empty() {
                continue;
            }
            let timer = PassTimer::start(format!("match {code}"), events.len());
            let run = EventPatternRun { set, default_code: code, sentence_limit, blocked_locations: &blocked_locations };
            events::apply_event_patterns(&run, ctx, &mut actors, &mut events, &mut next_original_id);
            passes.push(timer.finish(events.len()));
        }

        passes.extend(events::run_pipeline(&self.settings, &self.pass_sets, ctx, &mut actors, &mut events)?);

        tracing::info!(document = %doc.name, events = events.len(), "event coding finished");
        for em in events.iter() {
            tracing::debug!("{}", em.dump(&self.catalog.event_types, &actors, doc));
        }
        Ok(FinderRun { events, actors, metrics: RunMetrics { total: start.elapsed(), passes } })
    }

    /// Number of leading sentences event patterns may look at.
    fn sentence_limit(&self, doc: &Document) -> usize {
        match self.sentence_cutoff {
            Some(cutoff) => (0..doc.sentences.len())
                .find(|&s| doc.icews_sentence_no(s) >= cutoff)
                .unwrap_or(doc.sentences.len()),
            None => doc.sentences.len(),
        }
    }
}
