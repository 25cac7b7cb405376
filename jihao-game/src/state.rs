use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{Ending, MinigameType, Scene, SceneCategory, StatDelta};
use crate::endings::TerminationReason;
use crate::engine::composite_score;
use crate::stats::{Flags, Stats};

/// Result reported back by a mini-game activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinigameOutcome {
    Win,
    Lose,
}

impl MinigameOutcome {
    #[must_use]
    pub const fn from_won(won: bool) -> Self {
        if won { Self::Win } else { Self::Lose }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
        }
    }
}

impl fmt::Display for MinigameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One played turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub scene_id: String,
    pub scene_text: String,
    pub scene_category: SceneCategory,
    pub choice_id: String,
    pub choice_text: String,
    /// Stat effects declared by the choice, before balancing.
    #[serde(default)]
    pub effects: Vec<StatDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_minigame: Option<MinigameType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minigame_result: Option<MinigameOutcome>,
}

/// Full state of a run.
///
/// Transitions never mutate a state in place; every turn derives a new value
/// from the previous one. Decoding goes through [`Stats`], so a persisted state
/// with out-of-range stats is rejected rather than repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub stats: Stats,
    pub flags: Flags,
    /// Cursor into `selected_scenes`.
    pub current_scene: usize,
    pub selected_scenes: Vec<Scene>,
    pub is_game_over: bool,
    pub current_ending: Option<Ending>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<TerminationReason>,
    pub scene_history: Vec<HistoryEntry>,
    pub turn_count: u32,
    pub composite_score: f64,
    /// Every choice id played so far, oldest first.
    pub choice_path: Vec<String>,
    /// Turns in a row with the composite score at or above the victory line.
    pub consecutive_high_score: u32,
}

impl Default for GameState {
    fn default() -> Self {
        init_game(Vec::new())
    }
}

impl GameState {
    /// Scene under the cursor, if the pool has not run dry.
    #[must_use]
    pub fn current_scene(&self) -> Option<&Scene> {
        self.selected_scenes.get(self.current_scene)
    }

    #[must_use]
    pub fn has_scene(&self, scene_id: &str) -> bool {
        self.selected_scenes.iter().any(|scene| scene.id == scene_id)
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        !self.selected_scenes.is_empty()
    }

    /// Ids of the last `window` scenes played, oldest first.
    pub fn recent_scene_ids(&self, window: usize) -> impl Iterator<Item = &str> + '_ {
        let start = self.scene_history.len().saturating_sub(window);
        self.scene_history[start..]
            .iter()
            .map(|entry| entry.scene_id.as_str())
    }

    /// Ids already dealt into the pool but not played yet.
    pub fn queued_scene_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.selected_scenes
            .get(self.current_scene..)
            .unwrap_or_default()
            .iter()
            .map(|scene| scene.id.as_str())
    }

    /// Categories of the last `window` scenes played, oldest first.
    pub fn recent_categories(&self, window: usize) -> impl Iterator<Item = SceneCategory> + '_ {
        let start = self.scene_history.len().saturating_sub(window);
        self.scene_history[start..]
            .iter()
            .map(|entry| entry.scene_category)
    }

    /// Rounded average of the five stats, shown on the ending screen.
    #[must_use]
    pub fn ending_score(&self) -> i32 {
        crate::endings::ending_score(&self.stats)
    }
}

/// Fresh run over an initial scene batch.
#[must_use]
pub fn init_game(selected_scenes: Vec<Scene>) -> GameState {
    let stats = Stats::INITIAL;
    let flags = Flags::new();
    GameState {
        composite_score: composite_score(&stats, &flags),
        stats,
        flags,
        current_scene: 0,
        selected_scenes,
        is_game_over: false,
        current_ending: None,
        termination_reason: None,
        scene_history: Vec::new(),
        turn_count: 0,
        choice_path: Vec::new(),
        consecutive_high_score: 0,
    }
}

/// Scene at the state's cursor.
#[must_use]
pub fn current_scene(state: &GameState) -> Option<&Scene> {
    state.current_scene()
}
