//! The five bounded stats and the flag set that make up the world state.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::constants::{STAT_MAX, STAT_MIN};

/// Persistent boolean facts set and cleared by choices.
pub type Flags = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatKey {
    AcademicStanding,
    DigitalSafety,
    Wealth,
    BilliardsSkill,
    Sanity,
}

impl StatKey {
    pub const ALL: [Self; 5] = [
        Self::AcademicStanding,
        Self::DigitalSafety,
        Self::Wealth,
        Self::BilliardsSkill,
        Self::Sanity,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AcademicStanding => "academicStanding",
            Self::DigitalSafety => "digitalSafety",
            Self::Wealth => "wealth",
            Self::BilliardsSkill => "billiardsSkill",
            Self::Sanity => "sanity",
        }
    }

    /// Skill-only stats never end a run through the danger zone.
    #[must_use]
    pub const fn is_skill_only(self) -> bool {
        matches!(self, Self::BilliardsSkill)
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or(())
    }
}

/// Stat reference as written in content.
///
/// Content is trusted but not re-validated at runtime, so a misspelled stat
/// name survives decoding and is ignored when effects and conditions run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatRef {
    Known(StatKey),
    Unknown(String),
}

impl StatRef {
    #[must_use]
    pub const fn key(&self) -> Option<StatKey> {
        match self {
            Self::Known(key) => Some(*key),
            Self::Unknown(_) => None,
        }
    }
}

impl From<StatKey> for StatRef {
    fn from(value: StatKey) -> Self {
        Self::Known(value)
    }
}

impl From<String> for StatRef {
    fn from(value: String) -> Self {
        value
            .parse::<StatKey>()
            .map_or_else(|()| Self::Unknown(value), Self::Known)
    }
}

impl From<StatRef> for String {
    fn from(value: StatRef) -> Self {
        match value {
            StatRef::Known(key) => key.as_str().to_string(),
            StatRef::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for StatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(key) => f.write_str(key.as_str()),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Raw stat record used while decoding; see [`Stats`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStats {
    academic_standing: i32,
    digital_safety: i32,
    wealth: i32,
    billiards_skill: i32,
    sanity: i32,
}

/// Stat value outside `0..=100` found while decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stat {stat} out of range: {value}")]
pub struct StatOutOfRange {
    pub stat: StatKey,
    pub value: i32,
}

/// The protagonist's five stats, each kept within `0..=100`.
///
/// Decoding rejects out-of-range values instead of clamping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawStats")]
pub struct Stats {
    pub academic_standing: i32,
    pub digital_safety: i32,
    pub wealth: i32,
    pub billiards_skill: i32,
    pub sanity: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl TryFrom<RawStats> for Stats {
    type Error = StatOutOfRange;

    fn try_from(raw: RawStats) -> Result<Self, Self::Error> {
        let stats = Self {
            academic_standing: raw.academic_standing,
            digital_safety: raw.digital_safety,
            wealth: raw.wealth,
            billiards_skill: raw.billiards_skill,
            sanity: raw.sanity,
        };
        match stats.first_out_of_range() {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}

impl Stats {
    /// Starting stats for every run.
    pub const INITIAL: Self = Self {
        academic_standing: 20,
        digital_safety: 40,
        wealth: 30,
        billiards_skill: 50,
        sanity: 60,
    };

    #[must_use]
    pub const fn uniform(value: i32) -> Self {
        Self {
            academic_standing: value,
            digital_safety: value,
            wealth: value,
            billiards_skill: value,
            sanity: value,
        }
    }

    #[must_use]
    pub const fn get(&self, key: StatKey) -> i32 {
        match key {
            StatKey::AcademicStanding => self.academic_standing,
            StatKey::DigitalSafety => self.digital_safety,
            StatKey::Wealth => self.wealth,
            StatKey::BilliardsSkill => self.billiards_skill,
            StatKey::Sanity => self.sanity,
        }
    }

    /// Write a stat, clamping into `0..=100`.
    pub fn set(&mut self, key: StatKey, value: i32) {
        let clamped = value.clamp(STAT_MIN, STAT_MAX);
        match key {
            StatKey::AcademicStanding => self.academic_standing = clamped,
            StatKey::DigitalSafety => self.digital_safety = clamped,
            StatKey::Wealth => self.wealth = clamped,
            StatKey::BilliardsSkill => self.billiards_skill = clamped,
            StatKey::Sanity => self.sanity = clamped,
        }
    }

    /// Builder-style variant of [`Stats::set`].
    #[must_use]
    pub fn with(mut self, key: StatKey, value: i32) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatKey, i32)> + '_ {
        StatKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }

    #[must_use]
    pub fn total(&self) -> i32 {
        self.iter().map(|(_, value)| value).sum()
    }

    #[must_use]
    pub fn in_bounds(&self) -> bool {
        self.first_out_of_range().is_none()
    }

    fn first_out_of_range(&self) -> Option<StatOutOfRange> {
        self.iter()
            .find(|(_, value)| !(STAT_MIN..=STAT_MAX).contains(value))
            .map(|(stat, value)| StatOutOfRange { stat, value })
    }
}
