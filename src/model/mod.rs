//! Session data model: identity, preferences and the onboarding draft.

pub mod credential;
pub mod identity;
pub mod preferences;
pub mod questionnaire;

pub use credential::Credential;
pub use identity::{
    AccountDeletion, Country, Gender, Identity, IdentityPatch, LoginRequest, LoginResponse,
    PasswordResetRequest, ProfileUpdate, RegisterRequest, UserLookup,
};
pub use preferences::{
    Accommodation, Climate, Interest, PreferencePatch, PreferenceProfile, Season, TransportMode,
    TravelStyle,
};
pub use questionnaire::{QuestionnaireDraft, QuestionnaireStep};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parse an RFC 3339 or zone-less backend timestamp into `DateTime<Utc>`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Backend LocalDateTime, with and without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    None
}

/// Unparseable timestamps become `None` instead of failing the whole record.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_timestamp_shapes() {
        assert!(parse_timestamp("2025-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2025-03-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("2025-03-01 10:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn lenient_patch_timestamp() {
        let patch: IdentityPatch =
            serde_json::from_value(serde_json::json!({"createdAt": "not a date"})).unwrap();
        assert!(patch.created_at.is_none());
        let patch: IdentityPatch =
            serde_json::from_value(serde_json::json!({"createdAt": "2025-03-01T10:00:00"})).unwrap();
        assert!(patch.created_at.is_some());
    }
}
