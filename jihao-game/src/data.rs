use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::stats::{StatKey, StatRef};
use crate::validate::{ValidationIssue, validate_catalog};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),
}

/// Flag mutation performed by a [`Effect::Flag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagOp {
    SetFlag,
    ClearFlag,
}

/// Effect applied when a choice is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    Stat { stat: StatRef, change: i32 },
    Flag {
        #[serde(rename = "type")]
        op: FlagOp,
        flag: String,
    },
}

impl Effect {
    #[must_use]
    pub fn stat(stat: StatKey, change: i32) -> Self {
        Self::Stat {
            stat: stat.into(),
            change,
        }
    }

    #[must_use]
    pub fn set_flag(flag: impl Into<String>) -> Self {
        Self::Flag {
            op: FlagOp::SetFlag,
            flag: flag.into(),
        }
    }

    #[must_use]
    pub fn clear_flag(flag: impl Into<String>) -> Self {
        Self::Flag {
            op: FlagOp::ClearFlag,
            flag: flag.into(),
        }
    }

    /// Stat delta carried by this effect, regardless of whether the stat is known.
    #[must_use]
    pub const fn change(&self) -> Option<i32> {
        match self {
            Self::Stat { change, .. } => Some(*change),
            Self::Flag { .. } => None,
        }
    }
}

/// Stat delta as recorded in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDelta {
    pub stat: StatRef,
    pub change: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl CompareOp {
    #[must_use]
    pub const fn holds(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagCheck {
    HasFlag,
    NotFlag,
}

/// Predicate over stats or flags gating ending eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Stat {
        stat: StatRef,
        operator: CompareOp,
        value: i32,
    },
    Flag {
        flag: String,
        operator: FlagCheck,
    },
}

impl Condition {
    #[must_use]
    pub fn stat(stat: StatKey, operator: CompareOp, value: i32) -> Self {
        Self::Stat {
            stat: stat.into(),
            operator,
            value,
        }
    }

    #[must_use]
    pub fn has_flag(flag: impl Into<String>) -> Self {
        Self::Flag {
            flag: flag.into(),
            operator: FlagCheck::HasFlag,
        }
    }

    #[must_use]
    pub fn not_flag(flag: impl Into<String>) -> Self {
        Self::Flag {
            flag: flag.into(),
            operator: FlagCheck::NotFlag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinigameType {
    Billiards,
    Moneyrun,
    Campnou,
}

impl MinigameType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Billiards => "billiards",
            Self::Moneyrun => "moneyrun",
            Self::Campnou => "campnou",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinigameConfig {
    #[serde(rename = "type")]
    pub kind: MinigameType,
    pub difficulty: u32,
}

/// A choice within a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub trigger_minigame: bool,
}

impl Choice {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, effects: Vec<Effect>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            effects,
            trigger_minigame: false,
        }
    }

    pub fn stat_effects(&self) -> impl Iterator<Item = StatDelta> + '_ {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Stat { stat, change } => Some(StatDelta {
                stat: stat.clone(),
                change: *change,
            }),
            Effect::Flag { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneCategory {
    AcademicStruggles,
    FootballFandom,
    BilliardsProgression,
    GreatFirewall,
    DigitalSurvival,
    FinancialTemptations,
    TianjinLife,
    HometownPressure,
    HealthPhysique,
    CrisisManagement,
}

impl SceneCategory {
    pub const ALL: [Self; 10] = [
        Self::AcademicStruggles,
        Self::FootballFandom,
        Self::BilliardsProgression,
        Self::GreatFirewall,
        Self::DigitalSurvival,
        Self::FinancialTemptations,
        Self::TianjinLife,
        Self::HometownPressure,
        Self::HealthPhysique,
        Self::CrisisManagement,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AcademicStruggles => "academic-struggles",
            Self::FootballFandom => "football-fandom",
            Self::BilliardsProgression => "billiards-progression",
            Self::GreatFirewall => "great-firewall",
            Self::DigitalSurvival => "digital-survival",
            Self::FinancialTemptations => "financial-temptations",
            Self::TianjinLife => "tianjin-life",
            Self::HometownPressure => "hometown-pressure",
            Self::HealthPhysique => "health-physique",
            Self::CrisisManagement => "crisis-management",
        }
    }
}

impl fmt::Display for SceneCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    Studying,
    Football,
    Billiards,
    Scrolling,
    Running,
    Eating,
    Talking,
    Stressed,
    Celebrating,
    Arrested,
}

/// A scene in the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub category: SceneCategory,
    pub text: String,
    pub animation: Animation,
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minigame: Option<MinigameConfig>,
}

impl Scene {
    #[must_use]
    pub fn choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.id == choice_id)
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> + '_ {
        self.choices.iter().flat_map(|choice| choice.effects.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndingType {
    Positive,
    Negative,
}

impl EndingType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for EndingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Legendary,
    Secret,
}

impl Rarity {
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Legendary,
        Self::Secret,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Legendary => "legendary",
            Self::Secret => "secret",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal narrative outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ending {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EndingType,
    #[serde(default)]
    pub rarity: Rarity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_sequence: Vec<String>,
}

/// Container for all scene and ending content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContentCatalog {
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub endings: Vec<Ending>,
}

impl ContentCatalog {
    /// Create an empty catalog (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid content.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// catalog fails [`validate_catalog`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)?.validated()
    }

    /// Pass the catalog through only if it has no validation issues.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Invalid`] listing every issue found.
    pub fn validated(self) -> Result<Self, ContentError> {
        let issues = validate_catalog(&self);
        if issues.is_empty() {
            Ok(self)
        } else {
            Err(ContentError::Invalid(issues))
        }
    }

    #[must_use]
    pub fn from_parts(scenes: Vec<Scene>, endings: Vec<Ending>) -> Self {
        Self { scenes, endings }
    }

    #[must_use]
    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == scene_id)
    }

    #[must_use]
    pub fn ending(&self, ending_id: &str) -> Option<&Ending> {
        self.endings.iter().find(|ending| ending.id == ending_id)
    }
}
