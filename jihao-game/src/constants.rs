//! Centralized balance and tuning constants for the jihao turn engine.
//!
//! These values define the deterministic math for the core simulation.
//! Keeping them together ensures that gameplay can only be adjusted via
//! code changes reviewed in version control, rather than through the
//! content catalog.

// Stat bounds ---------------------------------------------------------------
pub(crate) const STAT_MIN: i32 = 0;
pub(crate) const STAT_MAX: i32 = 100;

// Balance modulator ---------------------------------------------------------
/// A single choice cannot push a healthy stat below this value.
pub const BALANCE_SAFETY_FLOOR: i32 = 5;
/// Negative deltas start to be damped below this stat value.
pub const BALANCE_DIMINISH_THRESHOLD: i32 = 20;
/// Damping factor applied to negative deltas when the stat sits at zero.
pub const BALANCE_MIN_EFFECT_FACTOR: f64 = 0.3;

// Composite score -----------------------------------------------------------
pub(crate) const WEIGHT_ACADEMIC_STANDING: f64 = 0.25;
pub(crate) const WEIGHT_SANITY: f64 = 0.25;
pub(crate) const WEIGHT_WEALTH: f64 = 0.2;
pub(crate) const WEIGHT_DIGITAL_SAFETY: f64 = 0.2;
pub(crate) const WEIGHT_BILLIARDS_SKILL: f64 = 0.1;
pub(crate) const POSITIVE_FLAG_BONUS: f64 = 3.0;
pub(crate) const NEGATIVE_FLAG_PENALTY: f64 = 5.0;
pub(crate) const POSITIVE_FLAGS: [&str; 4] =
    ["graduated", "stable_job", "good_reputation", "healthy"];
pub(crate) const NEGATIVE_FLAGS: [&str; 4] =
    ["criminal_record", "debt_crisis", "mental_illness", "expelled"];
pub(crate) const SCORE_MIN: f64 = 0.0;
pub(crate) const SCORE_MAX: f64 = 100.0;

// Termination thresholds ----------------------------------------------------
pub const CRITICAL_STAT: i32 = 0;
pub const DANGER_STAT: i32 = 10;
pub const NEGATIVE_SCORE: f64 = 25.0;
pub const VICTORY_SCORE: f64 = 80.0;
pub const CONSECUTIVE_VICTORY: u32 = 3;
pub const BALANCED_MASTERY: i32 = 70;
pub const SURVIVAL_TURNS: u32 = 30;
pub const SURVIVAL_MIN_SCORE: f64 = 60.0;
pub const MIN_TURNS_FOR_DANGER_CHECK: u32 = 5;
pub(crate) const GENERIC_POSITIVE_AVERAGE: f64 = 50.0;

// Scene selection -----------------------------------------------------------
/// Size of the batch dealt at the start of a run.
pub const INITIAL_SCENE_COUNT: usize = 10;
pub const DEFAULT_MIN_MINIGAMES: usize = 1;
pub(crate) const RECENT_SCENE_WINDOW: usize = 5;
pub(crate) const RECENT_CATEGORY_WINDOW: usize = 3;
pub(crate) const POOL_REFILL_MARGIN: usize = 2;
pub(crate) const DEFAULT_EXPANSION_BATCH: usize = 5;
pub(crate) const CATEGORY_DIVERSITY_BONUS: f64 = 1.5;
pub(crate) const WEAK_STAT_THRESHOLD: i32 = 30;
pub(crate) const STRONG_STAT_THRESHOLD: i32 = 70;
pub(crate) const WEAK_STAT_RELEVANCE_SCALE: f64 = 0.01;
pub(crate) const STRONG_STAT_CHALLENGE: f64 = 0.2;
pub(crate) const RELEVANCE_WEIGHT: f64 = 0.3;
pub(crate) const HIGH_STAKES_DELTA: i32 = 10;
pub(crate) const DIFFICULTY_START_TURN: u32 = 10;
pub(crate) const DIFFICULTY_TURN_DIVISOR: f64 = 50.0;
pub(crate) const HIGH_STAKES_DAMPING: f64 = 0.5;
pub(crate) const MINIGAME_BONUS_CHANCE: f64 = 0.3;
pub(crate) const MINIGAME_BONUS: f64 = 1.3;
pub(crate) const UNDERREPRESENTED_RATIO: f64 = 0.1;
pub(crate) const OVERREPRESENTED_RATIO: f64 = 0.2;
pub(crate) const UNDERREPRESENTED_BONUS: f64 = 1.4;
pub(crate) const OVERREPRESENTED_PENALTY: f64 = 0.7;
pub(crate) const MIN_SCENE_WEIGHT: f64 = 0.1;

// Mini-games ----------------------------------------------------------------
pub const MINIGAME_COMPLETE_CHOICE_ID: &str = "minigame_complete";
pub(crate) const MINIGAME_WIN_TEXT: &str = "成功";
pub(crate) const MINIGAME_LOSS_TEXT: &str = "失败";

// Persistence ---------------------------------------------------------------
pub(crate) const SAVE_KEY: &str = "jihao.save";
pub(crate) const ENDINGS_KEY: &str = "jihao.endings";
pub(crate) const SAVE_MAX_AGE_HOURS: i64 = 24;

// Telemetry -----------------------------------------------------------------
pub(crate) const NEXT_SCENE_POOL_ID: &str = "jihao.next_scene";

#[cfg(test)]
pub(crate) const FLOAT_EPSILON: f64 = 1e-9;
