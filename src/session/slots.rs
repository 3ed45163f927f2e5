//! Slot names, snapshots and events.

use crate::model::{Credential, Identity, PreferenceProfile, QuestionnaireDraft};

/// The four logical slots of the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Identity,
    Credential,
    Preferences,
    QuestionnaireDraft,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::Identity,
        Slot::Credential,
        Slot::Preferences,
        Slot::QuestionnaireDraft,
    ];

    /// Durable key of the slot.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Credential => "credential",
            Self::Preferences => "preferences",
            Self::QuestionnaireDraft => "questionnaire-draft",
        }
    }

    pub fn from_key(key: &str) -> Option<Slot> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A typed value for one slot.
#[derive(Debug, Clone)]
pub enum SlotValue {
    Identity(Identity),
    Credential(Credential),
    Preferences(PreferenceProfile),
    QuestionnaireDraft(QuestionnaireDraft),
}

impl SlotValue {
    pub fn slot(&self) -> Slot {
        match self {
            Self::Identity(_) => Slot::Identity,
            Self::Credential(_) => Slot::Credential,
            Self::Preferences(_) => Slot::Preferences,
            Self::QuestionnaireDraft(_) => Slot::QuestionnaireDraft,
        }
    }
}

/// One durable write. A batch of these is applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotWrite {
    Put(Slot, String),
    Delete(Slot),
}

/// Everything the session cache currently holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub credential: Option<Credential>,
    pub preferences: Option<PreferenceProfile>,
    pub questionnaire_draft: Option<QuestionnaireDraft>,
}

impl SessionSnapshot {
    /// Authenticated means both a credential and an identity are cached.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.credential.is_some()
    }

    pub fn identity_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|i| i.id)
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.credential.is_none()
            && self.preferences.is_none()
            && self.questionnaire_draft.is_none()
    }
}

/// Result of loading the cache at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated,
    Unauthenticated,
}

/// Out-of-band session notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A 401 evicted the credential; route to the login entry point.
    LoginRequired,
    SignedIn { identity_id: i64 },
    SignedOut,
    /// Corrupt or inconsistent cache found at load time and wiped.
    Evicted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_keys_roundtrip() {
        for slot in Slot::ALL {
            assert_eq!(Slot::from_key(slot.key()), Some(slot));
        }
        assert_eq!(Slot::QuestionnaireDraft.to_string(), "questionnaire-draft");
        assert_eq!(Slot::from_key("authToken"), None);
    }

    #[test]
    fn empty_snapshot_is_unauthenticated() {
        let snapshot = SessionSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(!snapshot.is_authenticated());
        assert_eq!(snapshot.identity_id(), None);
    }
}
