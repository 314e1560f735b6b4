//! Sector classification.
//!
//! Every sector scores the content independently as a weighted density of
//! marker-pattern hits per word. The best score picks the primary sector
//! (ties go to the earlier sector in [`Sector::ALL`]); any other sector
//! scoring at least `secondary_ratio` of the best joins the set. Content with
//! no markers at all falls back to a lone semantic sector.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::memory::sector::SectorTable;
use crate::memory::types::{Sector, SectorSet};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("sector pattern must compile"))
        .collect()
}

/// Temporal markers and first-person past narration.
static EPISODIC: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\b(today|yesterday|tonight|this morning|last (night|week|month|year|summer|winter)|ago|remember when|that time)\b",
        r"(?i)\b(i|we) (did|went|saw|met|felt|was|were|had|visited|ate|bought|got|arrived|left)\b",
        r"(?i)\b(at \d{1,2}:\d{2}|on (monday|tuesday|wednesday|thursday|friday|saturday|sunday)|in (19|20)\d{2})\b",
        r"(?i)\b(happened|occurred|experience|event|moment|trip|visit|meeting|party|vacation)\b",
    ])
});

/// Definitions, facts, and measured quantities.
static SEMANTIC: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\b(define|definition|meaning of|concept|theory|refers to|known as|consists of)\b",
        r"(?i)\b(what is|how does|facts? about|is an?|are (a|an|the))\b",
        r"(?i)\b(principle|rule|law|algorithm|formula|property|equals)\b",
        r"(?i)\b(knowledge|information|data|research|study|science)\b",
        r"(?i)\b(boils|freezes|melts|contains|measures)\b",
        r"(?i)\d+(\.\d+)?\s*(°\s*[cf]\b|%|\b(km|kg|cm|mm|degrees|percent|meters|grams)\b)",
    ])
});

/// Instructions, sequencing, and imperatives.
static PROCEDURAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\b(how to|step by step|procedure|process|workflow)\b",
        r"(?i)\b(first|then|next|finally|afterwards|step \d+)\b",
        r"(?i)\b(install|configure|setup|set up|run|execute|deploy|compile)\b",
        r"(?i)\b(tutorial|guide|instructions|manual|recipe)\b",
        r"(?i)(^|[.!?]\s+)(click|press|type|enter|select|open|add|remove|use|make sure)\b",
    ])
});

/// Affect vocabulary and emphatic punctuation.
static EMOTIONAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\b(feel|feeling|felt|emotion|emotional|mood)\b",
        r"(?i)\b(happy|sad|angry|excited|worried|anxious|calm|afraid|proud|grateful|frustrated|lonely)\b",
        r"(?i)\b(love|hate|enjoy|dislike|fear|miss)\b",
        r"(?i)\b(amazing|terrible|wonderful|awful|fantastic|horrible|delighted|devastated)\b",
        r"!{2,}|[?!]{2,}",
    ])
});

/// Self-reference, insight, and open questions.
static REFLECTIVE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\bi (think|thought|realize|realized|wonder|believe|learned|noticed)\b",
        r"(?i)\b(reflect|reflection|insight|lesson|conclusion|realization)\b",
        r"(?i)\b(why|purpose|significance|meaning)\b",
        r"(?i)\b(philosophy|wisdom|belief|values?)\b",
        r"(?i)\b(should have|could have|if only|what if)\b",
        r"\?",
    ])
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern must compile"));

fn patterns(sector: Sector) -> &'static [Regex] {
    match sector {
        Sector::Episodic => &EPISODIC,
        Sector::Semantic => &SEMANTIC,
        Sector::Procedural => &PROCEDURAL,
        Sector::Emotional => &EMOTIONAL,
        Sector::Reflective => &REFLECTIVE,
    }
}

/// Result of classifying one piece of content.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub primary: Sector,
    /// Primary plus every secondary sector.
    pub sectors: SectorSet,
    /// Raw per-sector scores in [`Sector::ALL`] order.
    pub scores: [f64; 5],
}

impl Classification {
    fn singleton(sector: Sector, scores: [f64; 5]) -> Self {
        Self {
            primary: sector,
            sectors: [sector].into_iter().collect(),
            scores,
        }
    }
}

/// Score every sector for `content`.
pub fn score(content: &str, table: &SectorTable) -> [f64; 5] {
    let words = WORD.find_iter(content).count().max(1) as f64;
    Sector::ALL.map(|sector| {
        let hits: usize = patterns(sector)
            .iter()
            .map(|p| p.find_iter(content).count())
            .sum();
        table.weight(sector) * hits as f64 / words
    })
}

/// Classify content into a primary sector and a set of memberships.
///
/// Pure and infallible.
pub fn classify(content: &str, table: &SectorTable) -> Classification {
    let scores = score(content, table);

    let mut primary = Sector::Semantic;
    let mut best = 0.0;
    for sector in Sector::ALL {
        let s = scores[sector.index()];
        if s > best {
            best = s;
            primary = sector;
        }
    }

    if best <= 0.0 {
        return Classification::singleton(Sector::Semantic, scores);
    }

    let cutoff = best * table.secondary_ratio();
    let sectors: SectorSet = Sector::ALL
        .into_iter()
        .filter(|s| *s == primary || scores[s.index()] >= cutoff)
        .collect();

    tracing::debug!(primary = %primary, ?scores, "classified content");

    Classification {
        primary,
        sectors,
        scores,
    }
}

/// Classify, honouring an explicit `"sector"` entry in the caller's metadata.
///
/// A valid sector name there becomes the primary and only sector.
pub fn classify_with_hint(
    content: &str,
    metadata: &serde_json::Map<String, serde_json::Value>,
    table: &SectorTable,
) -> Classification {
    let hinted = metadata
        .get("sector")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Sector>().ok());

    match hinted {
        Some(sector) => Classification::singleton(sector, score(content, table)),
        None => classify(content, table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::sector::SectorProfile;

    fn table() -> SectorTable {
        SectorTable::default()
    }

    #[test]
    fn episodic_content() {
        let c = classify("I went to Paris yesterday", &table());
        assert_eq!(c.primary, Sector::Episodic);
        assert!(c.sectors.contains(&Sector::Episodic));
    }

    #[test]
    fn semantic_content() {
        let c = classify("Water boils at 100°C", &table());
        assert_eq!(c.primary, Sector::Semantic);
    }

    #[test]
    fn procedural_content() {
        let c = classify(
            "First install the toolchain, then run the build. Finally deploy it.",
            &table(),
        );
        assert_eq!(c.primary, Sector::Procedural);
    }

    #[test]
    fn emotional_content() {
        let c = classify("I feel so happy and excited!!", &table());
        assert_eq!(c.primary, Sector::Emotional);
    }

    #[test]
    fn reflective_content() {
        let c = classify(
            "I wonder about the purpose of all this, and what lesson I should take",
            &table(),
        );
        assert_eq!(c.primary, Sector::Reflective);
    }

    #[test]
    fn empty_content_defaults_to_semantic() {
        for text in ["", "   ", "zzz qqq", "12345"] {
            let c = classify(text, &table());
            assert_eq!(c.primary, Sector::Semantic, "content {text:?}");
            assert_eq!(c.sectors.len(), 1);
        }
    }

    #[test]
    fn multi_label_content() {
        // one episodic marker ("yesterday") and one emotional marker ("happy"):
        // emotional outweighs episodic (1.3 vs 1.2), and 1.2 >= 0.7 * 1.3
        let c = classify("yesterday happy", &table());
        assert_eq!(c.primary, Sector::Emotional);
        assert!(c.sectors.contains(&Sector::Episodic));
        assert!(c.sectors.contains(&Sector::Emotional));
    }

    #[test]
    fn ties_follow_priority_order() {
        let flat = SectorTable::new(
            [SectorProfile { decay_lambda: 0.01, weight: 1.0 }; 5],
            0.7,
        )
        .unwrap();
        // one episodic hit ("yesterday") and one emotional hit ("sad"), equal weights
        let c = classify("yesterday sad", &flat);
        assert_eq!(c.primary, Sector::Episodic);
        assert!(c.sectors.contains(&Sector::Emotional));
    }

    #[test]
    fn primary_always_in_sectors() {
        let samples = [
            "",
            "Remember when we met at 10:30 on Monday?",
            "How to configure the server step by step",
            "Why do I feel this way? I think I learned something.",
            "The definition of entropy is a law of thermodynamics",
        ];
        for text in samples {
            let c = classify(text, &table());
            assert!(c.sectors.contains(&c.primary), "content {text:?}");
        }
    }

    #[test]
    fn metadata_hint_overrides_classifier() {
        let mut meta = serde_json::Map::new();
        meta.insert("sector".into(), serde_json::json!("reflective"));
        let c = classify_with_hint("I went to Paris yesterday", &meta, &table());
        assert_eq!(c.primary, Sector::Reflective);
        assert_eq!(c.sectors.len(), 1);

        meta.insert("sector".into(), serde_json::json!("bogus"));
        let c = classify_with_hint("I went to Paris yesterday", &meta, &table());
        assert_eq!(c.primary, Sector::Episodic);
    }
}
