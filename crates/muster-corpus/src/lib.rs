//! Corpus orchestration: the generate-corpus and score-difficulty-only
//! process surfaces.
//!
//! Phases run strictly in sequence; artifacts are written once, atomically,
//! after every phase (including optional rebalancing) has succeeded. A
//! failing run writes nothing and surfaces a single structured diagnostic.

mod artifact;
mod pipeline;
mod rebalance;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{error, info};

use muster_difficulty::{Assessment, DifficultyComputer, ExtractionProvider, ExtractionTable};
use muster_error::{MusterError, Result};
use muster_types::SoldierId;

pub use artifact::{
    label_rows, read_extraction_table, write_difficulty_artifact, write_generation_artifacts,
    LabelRow, RawRecordRow, DIFFICULTY_FILE, LABELS_FILE, RECORDS_FILE, RECORD_META_FILE,
    SOURCES_FILE, SUMMARY_FILE,
};
pub use pipeline::{validate_corpus, Corpus, Pipeline, RunSummary};
pub use rebalance::{rebalance, RebalanceConfig, RebalanceOutcome};

/// Result of a full generate-corpus run.
#[derive(Debug)]
pub struct GenerateOutcome {
    pub corpus: Corpus,
    pub assessments: Option<BTreeMap<SoldierId, Assessment>>,
    pub summary: RunSummary,
}

/// Generate a corpus; score and rebalance when an extraction provider is on
/// hand; write artifacts last. Nothing touches `out_dir` until every phase
/// has succeeded.
pub fn generate_corpus(
    pipeline: &Pipeline,
    provider: Option<&dyn ExtractionProvider>,
    rebalance_config: Option<&RebalanceConfig>,
    out_dir: Option<&Path>,
) -> Result<GenerateOutcome> {
    let outcome = run_generation(pipeline, provider, rebalance_config);
    match &outcome {
        Ok(_) => {}
        Err(err) => {
            error!(kind = err.kind(), component = err.component(), "generation failed: {err}");
        }
    }
    let (corpus, assessments) = outcome?;

    let tier_counts = assessments.as_ref().map_or_else(BTreeMap::new, |map| {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for assessment in map.values() {
            *counts.entry(assessment.difficulty_tier.to_string()).or_default() += 1;
        }
        counts
    });
    let summary = pipeline.summarize(&corpus, tier_counts);

    if let Some(dir) = out_dir {
        write_generation_artifacts(dir, &corpus, &summary)?;
        if let Some(map) = &assessments {
            write_difficulty_artifact(dir, map)?;
        }
        info!(dir = %dir.display(), records = summary.record_count, "artifacts written");
    }

    Ok(GenerateOutcome {
        corpus,
        assessments,
        summary,
    })
}

fn run_generation(
    pipeline: &Pipeline,
    provider: Option<&dyn ExtractionProvider>,
    rebalance_config: Option<&RebalanceConfig>,
) -> Result<(Corpus, Option<BTreeMap<SoldierId, Assessment>>)> {
    let mut corpus = pipeline.generate()?;

    let assessments = match (provider, rebalance_config) {
        (Some(provider), Some(config)) => {
            let outcome = rebalance(pipeline, &mut corpus, provider, config)?;
            Some(outcome.assessments)
        }
        (Some(provider), None) => {
            let table = provider.extract(&corpus.records);
            let computer = DifficultyComputer::new(pipeline.hierarchy());
            Some(computer.assess_table(&table))
        }
        (None, Some(_)) => {
            return Err(MusterError::InfeasibleTargets {
                detail: "rebalancing requires an extraction provider".to_owned(),
            });
        }
        (None, None) => None,
    };
    Ok((corpus, assessments))
}

/// Score difficulty over an existing extraction table, without generating
/// anything. The pure half of the process surface.
pub fn score_difficulty_only(
    hierarchy: &muster_hierarchy::Hierarchy,
    table: &ExtractionTable,
    out_dir: Option<&Path>,
) -> Result<BTreeMap<SoldierId, Assessment>> {
    let computer = DifficultyComputer::new(hierarchy);
    let assessments = computer.assess_table(table);
    if let Some(dir) = out_dir {
        write_difficulty_artifact(dir, &assessments)?;
        info!(dir = %dir.display(), soldiers = assessments.len(), "difficulty artifact written");
    }
    Ok(assessments)
}
