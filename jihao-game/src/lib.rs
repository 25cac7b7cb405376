//! Jihao Game Engine
//!
//! Platform-agnostic core of the Zhang Jihao life simulator: stats and
//! effects, turn application, termination and ending resolution, scene
//! selection and save handling. No UI or platform-specific dependencies.

pub mod balance;
pub mod collection;
pub mod conditions;
pub mod constants;
pub mod data;
pub mod endings;
pub mod engine;
pub mod numbers;
pub mod persistence;
pub mod reducer;
pub mod selector;
pub mod session;
pub mod state;
pub mod stats;
pub mod trace;
pub mod validate;

use std::path::PathBuf;

// Re-export commonly used types
pub use balance::apply_balanced_effect;
pub use collection::{CollectionStats, EndingCollection, UnlockedEnding};
pub use conditions::{check_all_conditions, check_condition};
pub use data::{
    Animation, Choice, CompareOp, Condition, ContentCatalog, ContentError, Effect, Ending,
    EndingType, FlagCheck, FlagOp, MinigameConfig, MinigameType, Rarity, Scene, SceneCategory,
    StatDelta,
};
pub use endings::{
    Termination, TerminationReason, calculate_ending, check_termination, ending_score,
    generic_ending,
};
pub use engine::{
    MinigameReward, apply_choice, apply_minigame_reward, apply_stat_change, complete_minigame,
    composite_score,
};
pub use persistence::{
    FileStore, KeyValueStore, MemoryStore, PersistenceError, SaveConfig, SaveManager, SavedGame,
};
pub use reducer::{GameAction, reduce, reduce_traced};
pub use selector::{expand_scene_pool, select_next_scene, select_scenes_for_game};
pub use session::{GameSession, PendingMinigame, SessionError, TurnOutcome};
pub use state::{GameState, HistoryEntry, MinigameOutcome, current_scene, init_game};
pub use stats::{Flags, StatKey, StatRef, Stats};
pub use trace::{SelectionTrace, WeightFactor, WeightedCandidate};
pub use validate::{ValidationIssue, validate_catalog};

/// Trait for abstracting content loading
/// Platform-specific implementations should provide this
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the scene and ending catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or fails validation.
    fn load_catalog(&self) -> Result<ContentCatalog, Self::Error>;
}

/// Loads a validated catalog from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileContentLoader {
    path: PathBuf,
}

impl FileContentLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentLoader for FileContentLoader {
    type Error = ContentError;

    fn load_catalog(&self) -> Result<ContentCatalog, Self::Error> {
        ContentCatalog::from_path(&self.path)
    }
}

/// Main game engine for managing game sessions
pub struct GameEngine<L, S>
where
    L: ContentLoader,
    S: KeyValueStore + Clone,
{
    loader: L,
    store: S,
    config: SaveConfig,
}

impl<L, S> GameEngine<L, S>
where
    L: ContentLoader,
    S: KeyValueStore + Clone,
{
    /// Create a new game engine with the provided loader and store
    pub fn new(loader: L, store: S) -> Self {
        Self::with_config(loader, store, SaveConfig::default())
    }

    pub const fn with_config(loader: L, store: S, config: SaveConfig) -> Self {
        Self {
            loader,
            store,
            config,
        }
    }

    /// Construct a session with a fresh run already started.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn create_session(&self, seed: u64) -> Result<GameSession<S>, L::Error> {
        let mut session = self.idle_session(seed)?;
        session.start();
        Ok(session)
    }

    /// Construct a session resuming the saved run, if one is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn resume_session(&self, seed: u64) -> Result<Option<GameSession<S>>, L::Error> {
        let mut session = self.idle_session(seed)?;
        Ok(session.restore().then_some(session))
    }

    fn idle_session(&self, seed: u64) -> Result<GameSession<S>, L::Error> {
        let catalog = self.loader.load_catalog()?;
        Ok(GameSession::with_config(
            catalog,
            self.store.clone(),
            self.config.clone(),
            seed,
        ))
    }

    /// Unlocked-ending collection backed by the engine's store.
    pub fn collection(&self) -> EndingCollection<S> {
        EndingCollection::with_key(self.store.clone(), self.config.endings_key.clone())
    }
}
