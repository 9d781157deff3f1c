use serde::{Deserialize, Serialize};

use crate::model::{CategoryId, Difficulty};

/// User-facing quiz settings stored alongside progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub difficulty: Difficulty,
    pub sound_enabled: bool,
    pub haptic_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_reminder_time: Option<String>,
    #[serde(default)]
    pub preferred_categories: Vec<CategoryId>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            sound_enabled: true,
            haptic_enabled: true,
            daily_reminder_time: None,
            preferred_categories: Vec::new(),
        }
    }
}

/// Partial update for `Preferences`; only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub difficulty: Option<Difficulty>,
    pub sound_enabled: Option<bool>,
    pub haptic_enabled: Option<bool>,
    pub daily_reminder_time: Option<Option<String>>,
    pub preferred_categories: Option<Vec<CategoryId>>,
}

impl PreferencesPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Preferences {
    /// Shallow merge: each field set in `patch` replaces the current value wholesale.
    pub fn apply(&mut self, patch: PreferencesPatch) {
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(sound) = patch.sound_enabled {
            self.sound_enabled = sound;
        }
        if let Some(haptic) = patch.haptic_enabled {
            self.haptic_enabled = haptic;
        }
        if let Some(reminder) = patch.daily_reminder_time {
            self.daily_reminder_time = reminder;
        }
        if let Some(categories) = patch.preferred_categories {
            self.preferred_categories = categories;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_set_fields() {
        let mut prefs = Preferences::default();
        prefs.apply(PreferencesPatch {
            sound_enabled: Some(false),
            preferred_categories: Some(vec![CategoryId::new("rust")]),
            ..PreferencesPatch::new()
        });
        assert!(!prefs.sound_enabled);
        assert!(prefs.haptic_enabled);
        assert_eq!(prefs.difficulty, Difficulty::Medium);
        assert_eq!(prefs.preferred_categories, vec![CategoryId::new("rust")]);
    }

    #[test]
    fn reminder_can_be_cleared() {
        let mut prefs = Preferences {
            daily_reminder_time: Some("08:00".into()),
            ..Preferences::default()
        };
        prefs.apply(PreferencesPatch {
            daily_reminder_time: Some(None),
            ..PreferencesPatch::new()
        });
        assert!(prefs.daily_reminder_time.is_none());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(PreferencesPatch::new().is_empty());
        let patch = PreferencesPatch {
            difficulty: Some(Difficulty::Hard),
            ..PreferencesPatch::new()
        };
        assert!(!patch.is_empty());
    }
}
