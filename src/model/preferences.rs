//! Travel preference profile and its enumerations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declares a closed enum whose wire form is SCREAMING_SNAKE_CASE.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().replace(['-', ' '], "_").to_ascii_uppercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {}: {s}", stringify!($name)))
            }
        }
    };
}

wire_enum!(
    /// Primary reason for travelling.
    Interest {
        Adventure => "ADVENTURE",
        Relaxation => "RELAXATION",
        CulturalExperience => "CULTURAL_EXPERIENCE",
        Nature => "NATURE",
    }
);

wire_enum!(
    TravelStyle {
        Casual => "CASUAL",
        Frequent => "FREQUENT",
        Business => "BUSINESS",
        Enthusiast => "ENTHUSIAST",
        Organizer => "ORGANIZER",
    }
);

wire_enum!(
    Climate {
        Tropical => "TROPICAL",
        Dry => "DRY",
        Continental => "CONTINENTAL",
        Polar => "POLAR",
        Mediterranean => "MEDITERRANEAN",
        Arid => "ARID",
        SemiArid => "SEMI_ARID",
        Monsoon => "MONSOON",
        Tundra => "TUNDRA",
    }
);

wire_enum!(
    Season {
        Spring => "SPRING",
        Summer => "SUMMER",
        Autumn => "AUTUMN",
        Winter => "WINTER",
    }
);

wire_enum!(
    Accommodation {
        Hotel => "HOTEL",
        Airbnb => "AIRBNB",
        Lodge => "LODGE",
    }
);

wire_enum!(
    TransportMode {
        Flights => "FLIGHTS",
    }
);

/// Durable travel preferences, one-to-one with an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_budget: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transportation_budget: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_interest: Option<Interest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_travel_style: Option<TravelStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_climate: Option<Climate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_travel_season: Option<Season>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_accommodation: Option<Accommodation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_travel_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_preference: Option<TransportMode>,
    #[serde(default)]
    pub data_sharing: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::lenient_timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial preferences submitted to `PUT /profile/preferences`.
///
/// `user_id` is always overwritten with the cached identity id before sending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_budget: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transportation_budget: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_interest: Option<Interest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_travel_style: Option<TravelStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_climate: Option<Climate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_travel_season: Option<Season>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_accommodation: Option<Accommodation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_travel_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_preference: Option<TransportMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_sharing: Option<bool>,
}

impl PreferencePatch {
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl PreferenceProfile {
    /// Whether every field set in `patch` holds the same value here.
    pub fn reflects(&self, patch: &PreferencePatch) -> bool {
        fn same<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            want.is_none() || want == have
        }
        same(&patch.user_id, &Some(self.user_id))
            && same(&patch.accommodation_budget, &self.accommodation_budget)
            && same(&patch.transportation_budget, &self.transportation_budget)
            && same(&patch.total_budget, &self.total_budget)
            && same(&patch.primary_interest, &self.primary_interest)
            && same(&patch.primary_travel_style, &self.primary_travel_style)
            && same(&patch.preferred_climate, &self.preferred_climate)
            && same(&patch.preferred_travel_season, &self.preferred_travel_season)
            && same(&patch.preferred_accommodation, &self.preferred_accommodation)
            && same(&patch.avg_travel_duration, &self.avg_travel_duration)
            && same(&patch.transport_preference, &self.transport_preference)
            && same(&patch.data_sharing, &Some(self.data_sharing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&Interest::CulturalExperience).unwrap(),
            "\"CULTURAL_EXPERIENCE\""
        );
        assert_eq!(Climate::SemiArid.to_string(), "SEMI_ARID");
        let parsed: Climate = serde_json::from_str("\"SEMI_ARID\"").unwrap();
        assert_eq!(parsed, Climate::SemiArid);
    }

    #[test]
    fn enums_parse_loosely_from_text() {
        assert_eq!("semi-arid".parse::<Climate>().unwrap(), Climate::SemiArid);
        assert_eq!("cultural experience".parse::<Interest>().unwrap(), Interest::CulturalExperience);
        assert!("boat".parse::<TransportMode>().is_err());
    }

    #[test]
    fn profile_tolerates_sparse_server_record() {
        let profile: PreferenceProfile = serde_json::from_value(serde_json::json!({
            "id": 3, "userId": 7, "dataSharing": false, "updatedAt": "2025-01-01T09:30:00"
        }))
        .unwrap();
        assert_eq!(profile.user_id, 7);
        assert!(profile.primary_interest.is_none());
        assert!(profile.updated_at.is_some());
    }

    #[test]
    fn patch_skips_absent_fields() {
        let patch = PreferencePatch {
            preferred_climate: Some(Climate::Tropical),
            ..Default::default()
        }
        .with_user_id(4);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"userId": 4, "preferredClimate": "TROPICAL"})
        );
    }
}
