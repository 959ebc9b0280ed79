use eventcoder::{ActorMentionSet, Catalog, Document, EventMention, FinderRun, PassMetrics};
use serde_json::json;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(doc: &Document, run: &FinderRun, catalog: &Catalog, color: bool) {
    let palette = ansi::Palette::new(color);
    let date = doc.date.map(|d| d.to_string()).unwrap_or_else(|| "no date".to_string());
    println!(
        "\n{} {}",
        palette.bold(palette.paint(format!("⚙  Document: {}", doc.name), ansi::CYAN)),
        palette.dim(format!("({} sentences, {date})", doc.sentences.len()))
    );

    println!("\n{}", palette.paint("━━━ Passes ━━━", ansi::GRAY));
    for pass in &run.metrics.passes {
        println!("  {}", fmt_pass(pass, &palette));
    }

    println!("\n{}", palette.paint("━━━ Events ━━━", ansi::GRAY));
    if run.events.is_empty() {
        println!("{}", palette.dim("  No events survived"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • No event pattern matched (check predicates and word sets)");
        println!("  • Candidates lacked a required role");
        println!("  • A block, override or dedup pass removed them (see counts above)");
        println!("\n{}", palette.dim("  Tip: run with -v to log every match and removal"));
    } else {
        for (idx, em) in run.events.iter().enumerate() {
            print_event(idx, em, doc, &run.actors, catalog, &palette);
        }
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    let matching: std::time::Duration =
        run.metrics.passes.iter().filter(|p| p.name.starts_with("match ")).map(|p| p.duration).sum();
    println!(
        "  Total: {}  │  Matching: {}  │  Events: {}",
        palette.paint(format!("{:?}", run.metrics.total), ansi::GREEN),
        palette.paint(format!("{matching:?}"), ansi::CYAN),
        palette.dim(run.events.len().to_string()),
    );
    println!();
}

fn fmt_pass(pass: &PassMetrics, palette: &ansi::Palette) -> String {
    let change = if pass.removed() > 0 {
        palette.paint(format!("-{}", pass.removed()), ansi::RED)
    } else if pass.added() > 0 {
        palette.paint(format!("+{}", pass.added()), ansi::GREEN)
    } else {
        palette.dim("·")
    };
    format!(
        "{:<24} {:>4} → {:<4} {}  {}",
        palette.paint(&pass.name, ansi::BLUE),
        pass.before,
        pass.after,
        change,
        palette.dim(format!("{:?}", pass.duration))
    )
}

fn print_event(
    idx: usize,
    em: &EventMention,
    doc: &Document,
    actors: &ActorMentionSet,
    catalog: &Catalog,
    palette: &ansi::Palette,
) {
    let ty = catalog.event_types.get(em.event_type);
    let reciprocal = if em.reciprocal { palette.paint(" reciprocal", ansi::YELLOW) } else { String::new() };
    println!(
        "  {} {} {} {}{}",
        palette.paint(format!("[{idx}]"), ansi::GRAY),
        palette.bold(palette.paint(&ty.code, ansi::GREEN)),
        palette.dim("│"),
        ty.name,
        reciprocal,
    );
    println!(
        "      {} {}  {} {}",
        palette.dim("pattern:"),
        palette.paint(&em.pattern_id, ansi::CYAN),
        palette.dim("│ tense:"),
        palette.paint(em.tense.as_str(), ansi::YELLOW)
    );
    for p in &em.participants {
        let actor = actors.get(p.actor);
        let text = doc.mention(actor.mention).map(|m| m.text.as_str()).unwrap_or("");
        println!(
            "      {} {} {}",
            palette.paint(format!("{:<9}", p.role), ansi::BLUE),
            actor,
            palette.dim(format!("\"{text}\" (s{})", actor.mention.sentence))
        );
    }
}

/// One JSON object per document on stdout.
pub fn print_json(doc: &Document, run: &FinderRun, catalog: &Catalog) -> eventcoder::Result<()> {
    let events: Vec<_> = run
        .events
        .iter()
        .map(|em| {
            let ty = catalog.event_types.get(em.event_type);
            let participants: Vec<_> = em
                .participants
                .iter()
                .map(|p| {
                    let actor = run.actors.get(p.actor);
                    json!({
                        "role": p.role,
                        "actor": actor.to_string(),
                        "sentence": actor.mention.sentence,
                        "mention": actor.mention.index,
                        "text": doc.mention(actor.mention).map(|m| m.text.as_str()),
                    })
                })
                .collect();
            json!({
                "code": ty.code,
                "name": ty.name,
                "pattern": em.pattern_id,
                "tense": em.tense.as_str(),
                "reciprocal": em.reciprocal,
                "original_event_id": em.original_event_id,
                "participants": participants,
            })
        })
        .collect();
    let out = json!({ "document": doc.name, "events": events });
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
