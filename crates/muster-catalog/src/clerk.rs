//! Clerk archetypes: fixed characters with immutable rendering habits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use muster_error::{MusterError, Result};
use muster_hierarchy::Hierarchy;
use muster_types::{ClerkId, SourceKind};

/// How the clerk writes a soldier's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameTemplate {
    /// `Harker, J.`
    SurnameCommaInitial,
    /// `J. Harker`
    InitialDotSurname,
    /// `Harker`
    SurnameOnly,
}

/// How the clerk writes rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStyle {
    Full,
    Abbreviated,
    Omitted,
}

/// How the clerk writes unit path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitTemplate {
    /// `Division 3, Regiment 7` — full level names, value after.
    LabeledSegments,
    /// `3 Div / 7 Regt` — value first, abbreviated level name after.
    AbbreviatedSegments,
    /// `3/7/B` — designators only.
    BareDesignators,
}

/// Token ordering for the whole record line. Fixed per archetype; the
/// within-source identical-format invariant follows from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOrder {
    NameRankUnit,
    RankNameUnit,
    UnitNameRank,
}

/// Casing policy applied to the assembled line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    AsIs,
    Upper,
    Lower,
}

/// Which designator shapes the clerk's template can accept. A mismatch at
/// render time is a configuration bug surfaced as `RenderIncompatible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignatorPolicy {
    Mixed,
    NumericOnly,
    AlphaOnly,
}

/// Where injected vocabulary lands in the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabPlacement {
    Suffix,
    Infix,
}

/// The clerk's working environment; keys the contextual-clutter pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkEnv {
    Headquarters,
    LocalOffice,
    Transit,
    Medical,
    Depot,
}

impl WorkEnv {
    /// Clutter tokens for this environment. Not tied to any soldier's post.
    #[must_use]
    pub fn clutter_pool(self) -> &'static [&'static str] {
        match self {
            Self::Headquarters => &["ref", "ledger", "minute", "docket"],
            Self::LocalOffice => &["roll", "return", "parade", "ration"],
            Self::Transit => &["deck", "berth", "manifest", "hold"],
            Self::Medical => &["ward", "bed", "chit", "dressing"],
            Self::Depot => &["stores", "bay", "issue", "kit"],
        }
    }

    /// The source kinds this environment's clerks are drawn for.
    #[must_use]
    pub fn source_kind(self) -> SourceKind {
        match self {
            Self::Headquarters => SourceKind::SectorHq,
            Self::LocalOffice => SourceKind::LocalAdministrative,
            Self::Transit => SourceKind::Transit,
            Self::Medical => SourceKind::Medical,
            Self::Depot => SourceKind::DepotIntake,
        }
    }
}

/// Fatigue onset and strength. Beyond `threshold` records in one source the
/// clerk's output drifts (spacing collapse, casing drift, truncation) with
/// probability `slope * (position - threshold)`, capped at 0.9. Fatigue
/// resets between sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueCurve {
    pub threshold: u32,
    pub slope: f64,
}

impl FatigueCurve {
    /// Drift probability at a 0-based position within a source.
    #[must_use]
    pub fn drift_probability(&self, position: u32) -> f64 {
        if position < self.threshold {
            0.0
        } else {
            (self.slope * f64::from(position - self.threshold + 1)).min(0.9)
        }
    }
}

/// A named character with immutable habits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub id: String,
    pub name_template: NameTemplate,
    pub rank_style: RankStyle,
    pub unit_template: UnitTemplate,
    pub token_order: TokenOrder,
    pub separator: String,
    pub casing: Casing,
    pub designator_policy: DesignatorPolicy,
    /// A level name this clerk always labels explicitly, even when the
    /// template is otherwise bare. Must exist in some branch.
    pub highlight_level: Option<String>,
    pub fatigue: FatigueCurve,
    /// Probability that a record receives a deliberately ambiguous token.
    pub confounder_rate: f64,
    pub vocab_placement: VocabPlacement,
    pub work_env: WorkEnv,
}

impl Archetype {
    /// Validate policy ranges and any hierarchy references.
    pub fn validate(&self, hierarchy: &Hierarchy) -> Result<()> {
        if self.id.is_empty() {
            return Err(MusterError::archetype("<empty>", "archetype id is empty"));
        }
        if !(0.0..=1.0).contains(&self.confounder_rate) {
            return Err(MusterError::archetype(
                &self.id,
                format!("confounder_rate {} outside [0, 1]", self.confounder_rate),
            ));
        }
        if self.fatigue.threshold == 0 || self.fatigue.slope < 0.0 {
            return Err(MusterError::archetype(
                &self.id,
                "fatigue curve requires threshold >= 1 and slope >= 0",
            ));
        }
        if self.separator.is_empty() {
            return Err(MusterError::archetype(&self.id, "separator is empty"));
        }
        if let Some(level) = &self.highlight_level {
            let known = hierarchy
                .branches()
                .any(|b| b.levels().iter().any(|l| l == level));
            if !known {
                return Err(MusterError::archetype(
                    &self.id,
                    format!("highlight level `{level}` exists in no branch"),
                ));
            }
        }
        Ok(())
    }
}

/// Standard abbreviation for a level name, used by
/// [`UnitTemplate::AbbreviatedSegments`].
#[must_use]
pub fn level_abbreviation(level: &str) -> String {
    match level {
        "sector" => "Sec".to_owned(),
        "division" => "Div".to_owned(),
        "regiment" => "Regt".to_owned(),
        "company" => "Coy".to_owned(),
        "battery" => "Bty".to_owned(),
        "gun" => "Gun".to_owned(),
        "troop" => "Trp".to_owned(),
        "flotilla" => "Flot".to_owned(),
        "squadron" => "Sqn".to_owned(),
        "vessel" => "Vsl".to_owned(),
        "station" => "Stn".to_owned(),
        "wing" => "Wg".to_owned(),
        "flight" => "Flt".to_owned(),
        other => {
            let mut s: String = other.chars().take(3).collect();
            if let Some(first) = s.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            s
        }
    }
}

/// An instantiated clerk: one stable id, one archetype, habits frozen for
/// its entire lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClerkInstance {
    pub clerk_id: ClerkId,
    pub archetype: Archetype,
}

/// The finite catalog of archetypes.
#[derive(Debug, Clone)]
pub struct ArchetypeRegistry {
    by_id: BTreeMap<String, Archetype>,
}

impl ArchetypeRegistry {
    /// Build a registry from archetype records, validating each.
    pub fn new(archetypes: Vec<Archetype>, hierarchy: &Hierarchy) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for archetype in archetypes {
            archetype.validate(hierarchy)?;
            if by_id.insert(archetype.id.clone(), archetype.clone()).is_some() {
                return Err(MusterError::archetype(&archetype.id, "duplicate archetype id"));
            }
        }
        if by_id.is_empty() {
            return Err(MusterError::archetype("<none>", "archetype catalog is empty"));
        }
        Ok(Self { by_id })
    }

    /// The built-in nine-archetype catalog of clerk characters.
    pub fn builtin(hierarchy: &Hierarchy) -> Result<Self> {
        Self::new(builtin_archetypes(), hierarchy)
    }

    /// Load an archetype catalog document (`[[archetypes]]` TOML list).
    pub fn load(path: &std::path::Path, hierarchy: &Hierarchy) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct Doc {
            archetypes: Vec<Archetype>,
        }
        let text = std::fs::read_to_string(path).map_err(|source| MusterError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Doc = toml::from_str(&text).map_err(|e| MusterError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::new(doc.archetypes, hierarchy)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Archetype> {
        self.by_id.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.by_id.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Archetypes working in the environment that serves `kind`.
    #[must_use]
    pub fn for_source_kind(&self, kind: SourceKind) -> Vec<&Archetype> {
        self.by_id
            .values()
            .filter(|a| a.work_env.source_kind() == kind)
            .collect()
    }
}

fn builtin_archetypes() -> Vec<Archetype> {
    vec![
        Archetype {
            id: "formal-hq".to_owned(),
            name_template: NameTemplate::SurnameCommaInitial,
            rank_style: RankStyle::Full,
            unit_template: UnitTemplate::LabeledSegments,
            token_order: TokenOrder::NameRankUnit,
            separator: ", ".to_owned(),
            casing: Casing::AsIs,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 40, slope: 0.01 },
            confounder_rate: 0.02,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::Headquarters,
        },
        Archetype {
            id: "efficient-hq".to_owned(),
            name_template: NameTemplate::InitialDotSurname,
            rank_style: RankStyle::Abbreviated,
            unit_template: UnitTemplate::AbbreviatedSegments,
            token_order: TokenOrder::RankNameUnit,
            separator: " / ".to_owned(),
            casing: Casing::AsIs,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 30, slope: 0.02 },
            confounder_rate: 0.03,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::Headquarters,
        },
        Archetype {
            id: "garrison-adjutant".to_owned(),
            name_template: NameTemplate::SurnameCommaInitial,
            rank_style: RankStyle::Full,
            unit_template: UnitTemplate::LabeledSegments,
            token_order: TokenOrder::RankNameUnit,
            separator: "; ".to_owned(),
            casing: Casing::AsIs,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: Some("division".to_owned()),
            fatigue: FatigueCurve { threshold: 50, slope: 0.005 },
            confounder_rate: 0.01,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::Headquarters,
        },
        Archetype {
            id: "rushed-local".to_owned(),
            name_template: NameTemplate::SurnameOnly,
            rank_style: RankStyle::Omitted,
            unit_template: UnitTemplate::BareDesignators,
            token_order: TokenOrder::NameRankUnit,
            separator: "/".to_owned(),
            casing: Casing::Lower,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 12, slope: 0.06 },
            confounder_rate: 0.10,
            vocab_placement: VocabPlacement::Infix,
            work_env: WorkEnv::LocalOffice,
        },
        Archetype {
            id: "methodical-local".to_owned(),
            name_template: NameTemplate::SurnameCommaInitial,
            rank_style: RankStyle::Abbreviated,
            unit_template: UnitTemplate::AbbreviatedSegments,
            token_order: TokenOrder::NameRankUnit,
            separator: ", ".to_owned(),
            casing: Casing::AsIs,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 35, slope: 0.01 },
            confounder_rate: 0.04,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::LocalOffice,
        },
        Archetype {
            id: "expeditionary-minimalist".to_owned(),
            name_template: NameTemplate::SurnameOnly,
            rank_style: RankStyle::Omitted,
            unit_template: UnitTemplate::BareDesignators,
            token_order: TokenOrder::UnitNameRank,
            separator: " ".to_owned(),
            casing: Casing::Lower,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 8, slope: 0.08 },
            confounder_rate: 0.06,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::LocalOffice,
        },
        Archetype {
            id: "transit-clerk".to_owned(),
            name_template: NameTemplate::InitialDotSurname,
            rank_style: RankStyle::Omitted,
            unit_template: UnitTemplate::BareDesignators,
            token_order: TokenOrder::NameRankUnit,
            separator: "-".to_owned(),
            casing: Casing::Upper,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 15, slope: 0.05 },
            confounder_rate: 0.12,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::Transit,
        },
        Archetype {
            id: "field-medical".to_owned(),
            name_template: NameTemplate::SurnameOnly,
            rank_style: RankStyle::Abbreviated,
            unit_template: UnitTemplate::AbbreviatedSegments,
            token_order: TokenOrder::NameRankUnit,
            separator: " - ".to_owned(),
            casing: Casing::AsIs,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 20, slope: 0.03 },
            confounder_rate: 0.08,
            vocab_placement: VocabPlacement::Infix,
            work_env: WorkEnv::Medical,
        },
        Archetype {
            id: "depot-intake".to_owned(),
            name_template: NameTemplate::SurnameCommaInitial,
            rank_style: RankStyle::Abbreviated,
            unit_template: UnitTemplate::BareDesignators,
            token_order: TokenOrder::NameRankUnit,
            separator: " ".to_owned(),
            casing: Casing::Upper,
            designator_policy: DesignatorPolicy::Mixed,
            highlight_level: None,
            fatigue: FatigueCurve { threshold: 25, slope: 0.04 },
            confounder_rate: 0.09,
            vocab_placement: VocabPlacement::Suffix,
            work_env: WorkEnv::Depot,
        },
    ]
}
