//! Offline checks that a content catalog is safe to hand to the engine.
use std::collections::HashSet;

use crate::constants::MINIGAME_COMPLETE_CHOICE_ID;
use crate::data::{Condition, ContentCatalog, Effect, EndingType, Rarity};
use crate::stats::StatRef;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("duplicate scene id `{0}`")]
    DuplicateSceneId(String),
    #[error("duplicate ending id `{0}`")]
    DuplicateEndingId(String),
    #[error("scene `{scene}` repeats choice id `{choice}`")]
    DuplicateChoiceId { scene: String, choice: String },
    #[error("scene `{0}` has no choices")]
    EmptyChoices(String),
    #[error("{what} has an empty id")]
    EmptyId { what: String },
    #[error("{what} has empty text")]
    EmptyText { what: String },
    #[error("{owner} references unknown stat `{stat}`")]
    UnknownStat { owner: String, stat: String },
    #[error("choice `{choice}` in scene `{scene}` triggers a mini-game the scene does not have")]
    DanglingMinigameTrigger { scene: String, choice: String },
    #[error("secret ending `{ending}` path references unknown choice `{choice}`")]
    UnknownPathChoice { ending: String, choice: String },
    #[error("no common {0} ending to fall back on")]
    MissingCommonEnding(EndingType),
}

fn unknown_stat(stat: &StatRef) -> Option<&str> {
    match stat {
        StatRef::Known(_) => None,
        StatRef::Unknown(raw) => Some(raw.as_str()),
    }
}

/// Every problem found in `catalog`. An empty list means the catalog is usable.
#[must_use]
pub fn validate_catalog(catalog: &ContentCatalog) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut scene_ids = HashSet::new();
    let mut choice_ids: HashSet<&str> = HashSet::new();

    for scene in &catalog.scenes {
        if scene.id.trim().is_empty() {
            issues.push(ValidationIssue::EmptyId {
                what: String::from("scene"),
            });
        } else if !scene_ids.insert(scene.id.as_str()) {
            issues.push(ValidationIssue::DuplicateSceneId(scene.id.clone()));
        }
        if scene.text.trim().is_empty() {
            issues.push(ValidationIssue::EmptyText {
                what: format!("scene `{}`", scene.id),
            });
        }
        if scene.choices.is_empty() {
            issues.push(ValidationIssue::EmptyChoices(scene.id.clone()));
        }

        let mut local = HashSet::new();
        for choice in &scene.choices {
            if choice.id.trim().is_empty() {
                issues.push(ValidationIssue::EmptyId {
                    what: format!("choice in scene `{}`", scene.id),
                });
            } else if !local.insert(choice.id.as_str()) {
                issues.push(ValidationIssue::DuplicateChoiceId {
                    scene: scene.id.clone(),
                    choice: choice.id.clone(),
                });
            }
            choice_ids.insert(choice.id.as_str());
            if choice.text.trim().is_empty() {
                issues.push(ValidationIssue::EmptyText {
                    what: format!("choice `{}` in scene `{}`", choice.id, scene.id),
                });
            }
            if choice.trigger_minigame && scene.minigame.is_none() {
                issues.push(ValidationIssue::DanglingMinigameTrigger {
                    scene: scene.id.clone(),
                    choice: choice.id.clone(),
                });
            }
            for effect in &choice.effects {
                if let Effect::Stat { stat, .. } = effect
                    && let Some(raw) = unknown_stat(stat)
                {
                    issues.push(ValidationIssue::UnknownStat {
                        owner: format!("choice `{}` in scene `{}`", choice.id, scene.id),
                        stat: raw.to_string(),
                    });
                }
            }
        }
    }

    let mut ending_ids = HashSet::new();
    for ending in &catalog.endings {
        if ending.id.trim().is_empty() {
            issues.push(ValidationIssue::EmptyId {
                what: String::from("ending"),
            });
        } else if !ending_ids.insert(ending.id.as_str()) {
            issues.push(ValidationIssue::DuplicateEndingId(ending.id.clone()));
        }
        if ending.title.trim().is_empty() {
            issues.push(ValidationIssue::EmptyText {
                what: format!("ending `{}`", ending.id),
            });
        }
        for condition in &ending.conditions {
            if let Condition::Stat { stat, .. } = condition
                && let Some(raw) = unknown_stat(stat)
            {
                issues.push(ValidationIssue::UnknownStat {
                    owner: format!("ending `{}`", ending.id),
                    stat: raw.to_string(),
                });
            }
        }
        if ending.rarity == Rarity::Secret {
            for choice in &ending.path_sequence {
                if choice != MINIGAME_COMPLETE_CHOICE_ID && !choice_ids.contains(choice.as_str()) {
                    issues.push(ValidationIssue::UnknownPathChoice {
                        ending: ending.id.clone(),
                        choice: choice.clone(),
                    });
                }
            }
        }
    }

    for kind in [EndingType::Positive, EndingType::Negative] {
        let has_common = catalog
            .endings
            .iter()
            .any(|ending| ending.kind == kind && ending.rarity == Rarity::Common);
        if !has_common {
            issues.push(ValidationIssue::MissingCommonEnding(kind));
        }
    }

    issues
}
