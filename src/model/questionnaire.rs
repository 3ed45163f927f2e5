//! First-run questionnaire draft and its mapping onto preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::preferences::{
    Accommodation, Climate, Interest, PreferencePatch, Season, TransportMode, TravelStyle,
};

/// Raw, unvalidated onboarding input. Budgets are kept as typed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireDraft {
    #[serde(default)]
    pub accommodation_budget: String,
    #[serde(default)]
    pub transportation_budget: String,
    #[serde(default)]
    pub total_budget: String,
    pub primary_interest: Interest,
    pub preferred_travel_style: TravelStyle,
    pub preferred_climate: Climate,
    pub preferred_travel_season: Season,
    pub preferred_accommodation: Accommodation,
    pub avg_travel_duration: u32,
    pub transport_preference: TransportMode,
    pub data_sharing: bool,
    /// Set once the server accepted this draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Default for QuestionnaireDraft {
    fn default() -> Self {
        Self {
            accommodation_budget: String::new(),
            transportation_budget: String::new(),
            total_budget: String::new(),
            primary_interest: Interest::Adventure,
            preferred_travel_style: TravelStyle::Casual,
            preferred_climate: Climate::Mediterranean,
            preferred_travel_season: Season::Summer,
            preferred_accommodation: Accommodation::Hotel,
            avg_travel_duration: 7,
            transport_preference: TransportMode::Flights,
            data_sharing: true,
            submitted_at: None,
        }
    }
}

/// The three screens of the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionnaireStep {
    Interests,
    Climate,
    Sharing,
}

impl QuestionnaireStep {
    pub fn next(&self) -> Option<QuestionnaireStep> {
        match self {
            Self::Interests => Some(Self::Climate),
            Self::Climate => Some(Self::Sharing),
            Self::Sharing => None,
        }
    }
}

impl QuestionnaireDraft {
    pub fn set_accommodation_budget(&mut self, value: impl Into<String>) {
        self.accommodation_budget = value.into();
        self.recompute_total();
    }

    pub fn set_transportation_budget(&mut self, value: impl Into<String>) {
        self.transportation_budget = value.into();
        self.recompute_total();
    }

    fn recompute_total(&mut self) {
        self.total_budget = self
            .budget_total()
            .map(|total| total.to_string())
            .unwrap_or_default();
    }

    /// Accommodation + transportation when both parse, else absent.
    pub fn budget_total(&self) -> Option<i64> {
        let accommodation = parse_budget(&self.accommodation_budget)?;
        let transportation = parse_budget(&self.transportation_budget)?;
        accommodation.checked_add(transportation)
    }

    /// Whether the given screen has everything it needs to move on.
    pub fn step_complete(&self, step: QuestionnaireStep) -> bool {
        match step {
            QuestionnaireStep::Interests => {
                self.avg_travel_duration > 0
                    && (!self.accommodation_budget.trim().is_empty()
                        || !self.transportation_budget.trim().is_empty())
            }
            // Climate, season and accommodation are closed enums and always set.
            QuestionnaireStep::Climate => true,
            QuestionnaireStep::Sharing => true,
        }
    }

    /// Whether this draft still waits for the server to accept it.
    pub fn is_pending(&self) -> bool {
        self.submitted_at.is_none()
    }

    /// Map onto the preference shape submitted to the server.
    pub fn to_preference_patch(&self) -> PreferencePatch {
        PreferencePatch {
            user_id: None,
            accommodation_budget: parse_budget(&self.accommodation_budget),
            transportation_budget: parse_budget(&self.transportation_budget),
            total_budget: self.budget_total(),
            primary_interest: Some(self.primary_interest),
            primary_travel_style: Some(self.preferred_travel_style),
            preferred_climate: Some(self.preferred_climate),
            preferred_travel_season: Some(self.preferred_travel_season),
            preferred_accommodation: Some(self.preferred_accommodation),
            avg_travel_duration: Some(self.avg_travel_duration),
            transport_preference: Some(self.transport_preference),
            data_sharing: Some(self.data_sharing),
        }
    }
}

/// Leading-integer parse of free text: `"1200"`, `" 300 usd"` and `"+50"`
/// parse, `""` and `"abc"` do not.
pub fn parse_budget(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|v| v * sign)
}
