//! Artifact persistence: JSONL tables written atomically at phase
//! boundaries (temp file, then rename). A failed run leaves nothing behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use muster_difficulty::{Assessment, ExtractionRow, ExtractionTable};
use muster_error::{MusterError, Result};
use muster_types::{SoldierId, SourceId, StateId};

use crate::pipeline::{Corpus, RunSummary};

/// Raw record row: exactly what the disambiguation side is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecordRow {
    pub source_id: SourceId,
    pub soldier_id: SoldierId,
    pub raw_text: String,
}

/// Per-soldier label row, one per state, with per-level designator columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRow {
    pub soldier_id: SoldierId,
    pub state_id: StateId,
    pub state_order: u8,
    pub branch: String,
    pub post_path: String,
    pub designators: BTreeMap<String, String>,
}

/// File names of the artifact tables.
pub const RECORDS_FILE: &str = "records.jsonl";
pub const RECORD_META_FILE: &str = "record_meta.jsonl";
pub const LABELS_FILE: &str = "labels.jsonl";
pub const SOURCES_FILE: &str = "sources.jsonl";
pub const DIFFICULTY_FILE: &str = "difficulty.jsonl";
pub const SUMMARY_FILE: &str = "summary.json";

/// Write the generation artifacts (records, metadata, labels, sources) plus
/// the run summary. Difficulty is written separately when computed.
pub fn write_generation_artifacts(
    dir: &Path,
    corpus: &Corpus,
    summary: &RunSummary,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| MusterError::ArtifactIo {
        path: dir.to_path_buf(),
        source,
    })?;

    let records: Vec<RawRecordRow> = corpus
        .records
        .iter()
        .map(|r| RawRecordRow {
            source_id: r.source_id,
            soldier_id: r.soldier_id,
            raw_text: r.raw_text.clone(),
        })
        .collect();
    write_jsonl(&dir.join(RECORDS_FILE), &records)?;
    write_jsonl(&dir.join(RECORD_META_FILE), &corpus.metadata)?;
    write_jsonl(&dir.join(LABELS_FILE), &label_rows(corpus))?;
    write_jsonl(&dir.join(SOURCES_FILE), &corpus.sources)?;
    write_json(&dir.join(SUMMARY_FILE), summary)
}

/// Write the per-soldier difficulty artifact.
pub fn write_difficulty_artifact(
    dir: &Path,
    assessments: &BTreeMap<SoldierId, Assessment>,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| MusterError::ArtifactIo {
        path: dir.to_path_buf(),
        source,
    })?;
    let rows: Vec<&Assessment> = assessments.values().collect();
    write_jsonl(&dir.join(DIFFICULTY_FILE), &rows)
}

/// Label rows for every (soldier, state).
#[must_use]
pub fn label_rows(corpus: &Corpus) -> Vec<LabelRow> {
    let mut rows = Vec::new();
    for soldier in &corpus.soldiers {
        for state in &soldier.states {
            rows.push(LabelRow {
                soldier_id: soldier.id,
                state_id: state.state_id,
                state_order: state.order,
                branch: state.post.branch.clone(),
                post_path: state.post.to_string(),
                designators: state
                    .post
                    .segments
                    .iter()
                    .map(|seg| (seg.level.clone(), seg.designator.as_text()))
                    .collect(),
            });
        }
    }
    rows
}

/// Load an externally produced extraction table from a JSON document:
/// `{ "<source_id>/<soldier_id>": { characterized, bare_alpha, bare_numeric } }`.
pub fn read_extraction_table(path: &Path) -> Result<ExtractionTable> {
    let text = fs::read_to_string(path).map_err(|source| MusterError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: BTreeMap<String, Value> =
        serde_json::from_str(&text).map_err(|e| MusterError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    let mut table = ExtractionTable::new();
    for (key, value) in raw {
        let Some((source_part, soldier_part)) = key.split_once('/') else {
            return Err(MusterError::ConfigParse {
                path: path.to_path_buf(),
                detail: format!("extraction key `{key}` is not <source>/<soldier>"),
            });
        };
        let source_id = parse_id(source_part, "src-").map(SourceId);
        let soldier_id = parse_id(soldier_part, "sld-").map(SoldierId);
        let (Some(source_id), Some(soldier_id)) = (source_id, soldier_id) else {
            return Err(MusterError::ConfigParse {
                path: path.to_path_buf(),
                detail: format!("extraction key `{key}` has malformed ids"),
            });
        };
        let row: ExtractionRow =
            serde_json::from_value(value).map_err(|e| MusterError::ConfigParse {
                path: path.to_path_buf(),
                detail: format!("row `{key}`: {e}"),
            })?;
        table.insert((source_id, soldier_id), row);
    }
    Ok(table)
}

fn parse_id(text: &str, prefix: &str) -> Option<u32> {
    text.strip_prefix(prefix).unwrap_or(text).parse().ok()
}

fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut body = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut body, row).map_err(|e| MusterError::ConfigParse {
            path: path.to_path_buf(),
            detail: format!("serialization failed: {e}"),
        })?;
        body.push(b'\n');
    }
    write_atomic(path, &body)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| MusterError::ConfigParse {
        path: path.to_path_buf(),
        detail: format!("serialization failed: {e}"),
    })?;
    write_atomic(path, &body)
}

/// Write to a sibling temp file, then rename into place. Readers never see a
/// partially written artifact.
fn write_atomic(path: &Path, body: &[u8]) -> Result<()> {
    let io_err = |source| MusterError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    };
    let tmp: PathBuf = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(body).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)
}
