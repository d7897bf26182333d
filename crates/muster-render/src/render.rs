//! The rendering contract: clerk template + familiarity expansion +
//! quality compression + imperfections.

use rand::rngs::StdRng;
use rand::Rng;

use muster_catalog::{
    level_abbreviation, Casing, ClerkInstance, DesignatorPolicy, NameTemplate, RankStyle,
    Situation, TokenOrder, UnitTemplate, VocabPlacement,
};
use muster_error::{MusterError, Result};
use muster_types::{Familiarity, PathSegment, QualityTier, Soldier, State};

use crate::vocab::{SourceVocabState, VocabularyInjector};

/// Probability of a small spacing slip, independent of fatigue.
const SPACING_JITTER: f64 = 0.08;

/// Everything `render_record` needs about one (source, soldier) pairing.
/// All fields are frozen before rendering begins.
pub struct RenderRequest<'a> {
    pub clerk: &'a ClerkInstance,
    pub soldier: &'a Soldier,
    pub state: &'a State,
    pub familiarity: Familiarity,
    pub situation: &'a Situation,
    pub quality: QualityTier,
    pub position_in_source: u32,
}

/// Render one record line.
///
/// Fails with `RenderIncompatible` when the clerk's designator policy cannot
/// accept a designator in the selected path segments; that is a catalog bug,
/// not a runtime condition.
pub fn render_record(
    req: &RenderRequest<'_>,
    injector: &VocabularyInjector<'_>,
    vocab_state: &mut SourceVocabState,
    rng: &mut StdRng,
) -> Result<String> {
    let archetype = &req.clerk.archetype;
    let injection = injector.inject(rng, archetype, req.situation, &req.state.post, vocab_state);

    let (selected, branch_tag) = select_segments(req);
    for seg in &selected {
        let incompatible = match archetype.designator_policy {
            DesignatorPolicy::Mixed => false,
            DesignatorPolicy::NumericOnly => !seg.designator.is_numeric(),
            DesignatorPolicy::AlphaOnly => seg.designator.is_numeric(),
        };
        if incompatible {
            return Err(MusterError::RenderIncompatible {
                clerk: archetype.id.clone(),
                designator: seg.designator.as_text(),
                detail: format!(
                    "designator policy {:?} rejects level `{}`",
                    archetype.designator_policy, seg.level
                ),
            });
        }
    }

    let unit = render_unit(archetype, &selected, branch_tag.then_some(req.state.post.branch.as_str()));
    let name = render_name(archetype.name_template, req.soldier);
    let rank = match archetype.rank_style {
        RankStyle::Full => Some(req.soldier.rank.full().to_owned()),
        RankStyle::Abbreviated => Some(req.soldier.rank.abbreviated().to_owned()),
        RankStyle::Omitted => None,
    };

    let joiner = if archetype.rank_style == RankStyle::Omitted { " " } else { ", " };
    let mut groups: Vec<String> = Vec::with_capacity(4);
    let ordered: [Option<String>; 3] = match archetype.token_order {
        TokenOrder::NameRankUnit => [Some(name), rank, Some(unit)],
        TokenOrder::RankNameUnit => [rank, Some(name), Some(unit)],
        TokenOrder::UnitNameRank => [Some(unit), Some(name), rank],
    };
    for group in ordered.into_iter().flatten() {
        groups.push(group);
    }

    let extras = injection.tokens().join(" ");
    let mut line = match archetype.vocab_placement {
        VocabPlacement::Infix if !extras.is_empty() && groups.len() > 1 => {
            let mut with_infix = groups.clone();
            with_infix.insert(1, extras);
            with_infix.join(joiner)
        }
        _ => {
            let body = groups.join(joiner);
            if extras.is_empty() {
                body
            } else {
                format!("{body} {extras}")
            }
        }
    };

    line = match archetype.casing {
        Casing::AsIs => line,
        Casing::Upper => line.to_uppercase(),
        Casing::Lower => line.to_lowercase(),
    };

    if rng.gen::<f64>() < SPACING_JITTER {
        if let Some(pos) = line.find(' ') {
            line.insert(pos, ' ');
        }
    }

    Ok(apply_fatigue(archetype, req.position_in_source, rng, line))
}

/// Which path segments the clerk writes out. Quality tier 1 forces the
/// explicit, complete path; tiers 2-3 follow familiarity; tiers 4-5
/// compress toward the deepest selected segments. Only a different-branch
/// post carries the branch tag, at every tier.
fn select_segments<'a>(req: &'a RenderRequest<'_>) -> (Vec<&'a PathSegment>, bool) {
    let segments: Vec<&PathSegment> = req.state.post.segments.iter().collect();
    let tier = req.quality.get();
    let tag = req.familiarity == Familiarity::DifferentBranch;
    if tier == 1 {
        return (segments, tag);
    }
    let by_familiarity: Vec<&PathSegment> = match req.familiarity {
        Familiarity::SameMidUnit => {
            segments[segments.len().saturating_sub(2)..].to_vec()
        }
        Familiarity::SameBranchDifferentMid => segments[1..].to_vec(),
        // Known branch, unknown sector: the intermediate band, without the
        // top level or the finest segment. Depth >= 3 keeps it non-empty.
        Familiarity::SameBranchDifferentTop => segments[1..segments.len() - 1].to_vec(),
        Familiarity::DifferentBranch => segments,
    };
    let compressed = match tier {
        2 | 3 => by_familiarity,
        4 => by_familiarity[by_familiarity.len().saturating_sub(2)..].to_vec(),
        _ => by_familiarity[by_familiarity.len().saturating_sub(1)..].to_vec(),
    };
    (compressed, tag)
}

fn render_unit(
    archetype: &muster_catalog::Archetype,
    selected: &[&PathSegment],
    branch_tag: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(selected.len() + 1);
    if let Some(branch) = branch_tag {
        parts.push(title_case(branch));
    }
    for seg in selected {
        let highlighted = archetype.highlight_level.as_deref() == Some(seg.level.as_str());
        let text = match archetype.unit_template {
            UnitTemplate::LabeledSegments => {
                format!("{} {}", title_case(&seg.level), seg.designator)
            }
            UnitTemplate::AbbreviatedSegments => {
                format!("{} {}", seg.designator, level_abbreviation(&seg.level))
            }
            UnitTemplate::BareDesignators => {
                if highlighted {
                    format!("{} {}", seg.designator, level_abbreviation(&seg.level))
                } else {
                    seg.designator.to_string()
                }
            }
        };
        parts.push(text);
    }
    parts.join(&archetype.separator)
}

fn render_name(template: NameTemplate, soldier: &Soldier) -> String {
    match template {
        NameTemplate::SurnameCommaInitial => format!("{}, {}.", soldier.surname, soldier.initial),
        NameTemplate::InitialDotSurname => format!("{}. {}", soldier.initial, soldier.surname),
        NameTemplate::SurnameOnly => soldier.surname.clone(),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Fatigue drift beyond the clerk's threshold: spacing collapse first, then
/// capitalization drift, then truncation. Strictly position-driven, so the
/// drifts are monotonic along a source. Fatigue resets between sources
/// because positions do.
fn apply_fatigue(
    archetype: &muster_catalog::Archetype,
    position: u32,
    rng: &mut StdRng,
    line: String,
) -> String {
    let probability = archetype.fatigue.drift_probability(position);
    if probability == 0.0 || rng.gen::<f64>() >= probability {
        return line;
    }
    let severity = position.saturating_sub(archetype.fatigue.threshold);
    let mut drifted = line.replace(", ", ",").replace(" / ", "/").replace(" - ", "-");
    if severity >= 10 {
        drifted = drifted.to_lowercase();
    }
    if severity >= 20 {
        if let Some(cut) = drifted.rfind(' ') {
            let tail_len = drifted.len() - cut - 1;
            if tail_len > 3 {
                drifted.truncate(cut + 4);
            }
        }
    }
    drifted
}
