//! Write-through session cache over a [`SlotBackend`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::model::{Credential, Identity, IdentityPatch};
use crate::session::backend::SlotBackend;
use crate::session::slots::{
    SessionEvent, SessionSnapshot, SessionStatus, Slot, SlotValue, SlotWrite,
};

const EVENT_CAPACITY: usize = 64;

/// Authoritative in-process copy of the four session slots.
///
/// Every mutation is written to the backend first and only then becomes
/// visible in memory, so a failed write leaves the previous state intact.
pub struct SessionStore {
    backend: Arc<dyn SlotBackend>,
    state: RwLock<SessionSnapshot>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SlotBackend>) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            backend,
            state: RwLock::new(SessionSnapshot::default()),
            snapshot_tx,
            events,
        })
    }

    /// Populate the cache from durable storage.
    ///
    /// A slot that fails to parse, or a combination that cannot belong to one
    /// session, wipes all four slots. Preferences bound to another identity
    /// are dropped on their own.
    pub async fn load(&self) -> Result<SessionStatus, StoreError> {
        let raw = self.backend.read_all().await?;
        let mut state = self.state.write().await;

        let decoded = match decode(&raw) {
            Ok(snapshot) => snapshot,
            Err((slot, reason)) => {
                warn!(slot = %slot, reason = %reason, "Session cache corrupt, evicting all slots");
                self.wipe(&mut state).await;
                return Ok(SessionStatus::Unauthenticated);
            }
        };

        if decoded.identity.is_some() != decoded.credential.is_some()
            || (decoded.identity.is_none() && !decoded.is_empty())
        {
            warn!(
                has_identity = decoded.identity.is_some(),
                has_credential = decoded.credential.is_some(),
                "Session cache inconsistent, evicting all slots"
            );
            self.wipe(&mut state).await;
            return Ok(SessionStatus::Unauthenticated);
        }

        let mut next = decoded;
        let mut writes = Vec::new();
        if let (Some(identity_id), Some(prefs)) = (next.identity_id(), next.preferences.as_ref())
            && prefs.user_id != identity_id
        {
            warn!(
                identity_id,
                preferences_user_id = prefs.user_id,
                "Cached preferences belong to another identity, dropping"
            );
            next.preferences = None;
            writes.push(SlotWrite::Delete(Slot::Preferences));
        }

        let status = if next.is_authenticated() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        self.persist(&mut state, next, writes).await?;
        info!(status = ?status, "Session cache loaded");
        Ok(status)
    }

    /// Store one slot value.
    ///
    /// A new identity with a different id evicts preferences and the draft in
    /// the same batch. Preferences and drafts need a cached identity, and
    /// preferences must carry its id.
    pub async fn commit(&self, value: SlotValue) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let mut writes = Vec::new();
        let slot = value.slot();

        match value {
            SlotValue::Identity(identity) => {
                stage_identity(&mut next, &mut writes, identity)?;
            }
            SlotValue::Credential(credential) => {
                writes.push(SlotWrite::Put(Slot::Credential, encode(credential.expose())?));
                next.credential = Some(credential);
            }
            SlotValue::Preferences(preferences) => {
                let expected = state.identity_id().ok_or(StoreError::NoIdentity)?;
                if preferences.user_id != expected {
                    return Err(StoreError::IdentityMismatch {
                        expected,
                        found: preferences.user_id,
                    });
                }
                writes.push(SlotWrite::Put(Slot::Preferences, encode(&preferences)?));
                next.preferences = Some(preferences);
            }
            SlotValue::QuestionnaireDraft(draft) => {
                if state.identity.is_none() {
                    return Err(StoreError::NoIdentity);
                }
                writes.push(SlotWrite::Put(Slot::QuestionnaireDraft, encode(&draft)?));
                next.questionnaire_draft = Some(draft);
            }
        }

        self.persist(&mut state, next, writes).await?;
        debug!(slot = %slot, "Slot committed");
        Ok(())
    }

    /// Commit identity and credential together after a successful login.
    pub async fn establish(
        &self,
        identity: Identity,
        credential: Credential,
    ) -> Result<(), StoreError> {
        let identity_id = identity.id;
        {
            let mut state = self.state.write().await;
            let mut next = state.clone();
            let mut writes = Vec::new();
            stage_identity(&mut next, &mut writes, identity)?;
            writes.push(SlotWrite::Put(Slot::Credential, encode(credential.expose())?));
            next.credential = Some(credential);
            self.persist(&mut state, next, writes).await?;
        }
        info!(identity_id, "Session established");
        let _ = self.events.send(SessionEvent::SignedIn { identity_id });
        Ok(())
    }

    /// Shallow-merge a server profile into the cached identity.
    ///
    /// Returns the merged identity, or `None` when nothing is cached.
    pub async fn merge_identity(&self, patch: IdentityPatch) -> Result<Option<Identity>, StoreError> {
        let mut state = self.state.write().await;
        let Some(mut identity) = state.identity.clone() else {
            return Ok(None);
        };
        if let Some(found) = patch.id.filter(|id| *id != identity.id) {
            return Err(StoreError::IdentityMismatch {
                expected: identity.id,
                found,
            });
        }
        identity.merge(patch);

        let mut next = state.clone();
        let writes = vec![SlotWrite::Put(Slot::Identity, encode(&identity)?)];
        next.identity = Some(identity.clone());
        self.persist(&mut state, next, writes).await?;
        Ok(Some(identity))
    }

    /// Remove one slot.
    pub async fn clear(&self, slot: Slot) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        match slot {
            Slot::Identity => next.identity = None,
            Slot::Credential => next.credential = None,
            Slot::Preferences => next.preferences = None,
            Slot::QuestionnaireDraft => next.questionnaire_draft = None,
        }
        self.persist(&mut state, next, vec![SlotWrite::Delete(slot)])
            .await
    }

    /// Remove all four slots.
    pub async fn evict_all(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let writes = Slot::ALL.into_iter().map(SlotWrite::Delete).collect();
        self.persist(&mut state, SessionSnapshot::default(), writes)
            .await
    }

    /// Local sign-out: evict everything and notify subscribers.
    pub async fn sign_out(&self) -> Result<(), StoreError> {
        self.evict_all().await?;
        info!("Signed out");
        let _ = self.events.send(SessionEvent::SignedOut);
        Ok(())
    }

    /// A 401 was received: drop the credential and ask for a new login.
    ///
    /// Every call signals `LoginRequired`; the durable delete only runs while
    /// a credential is still cached.
    pub async fn handle_authorization_denied(&self) {
        {
            let mut state = self.state.write().await;
            if state.credential.is_some() {
                let next = SessionSnapshot {
                    credential: None,
                    ..state.clone()
                };
                let writes = vec![SlotWrite::Delete(Slot::Credential)];
                if let Err(e) = self.persist(&mut state, next, writes).await {
                    warn!(error = %e, "Failed to evict credential after 401");
                }
            }
        }
        warn!("Authorization rejected, login required");
        let _ = self.events.send(SessionEvent::LoginRequired);
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.clone()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.identity.clone()
    }

    pub async fn identity_id(&self) -> Option<i64> {
        self.state.read().await.identity_id()
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.state.read().await.credential.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    /// Latest snapshot, updated after every successful write.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn persist(
        &self,
        state: &mut SessionSnapshot,
        next: SessionSnapshot,
        writes: Vec<SlotWrite>,
    ) -> Result<(), StoreError> {
        self.backend.apply(&writes).await?;
        *state = next.clone();
        self.snapshot_tx.send_replace(next);
        Ok(())
    }

    /// Fail closed: memory is emptied even if the durable delete fails.
    async fn wipe(&self, state: &mut SessionSnapshot) {
        let writes: Vec<_> = Slot::ALL.into_iter().map(SlotWrite::Delete).collect();
        if let Err(e) = self.backend.apply(&writes).await {
            warn!(error = %e, "Failed to evict session slots from storage");
        }
        *state = SessionSnapshot::default();
        self.snapshot_tx.send_replace(SessionSnapshot::default());
        let _ = self.events.send(SessionEvent::Evicted);
    }
}

fn stage_identity(
    next: &mut SessionSnapshot,
    writes: &mut Vec<SlotWrite>,
    identity: Identity,
) -> Result<(), StoreError> {
    if let Some(previous) = next.identity_id().filter(|id| *id != identity.id) {
        info!(previous, next = identity.id, "Identity switched, evicting bound slots");
        next.preferences = None;
        next.questionnaire_draft = None;
        writes.push(SlotWrite::Delete(Slot::Preferences));
        writes.push(SlotWrite::Delete(Slot::QuestionnaireDraft));
    }
    writes.push(SlotWrite::Put(Slot::Identity, encode(&identity)?));
    next.identity = Some(identity);
    Ok(())
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_slot<T: DeserializeOwned>(
    raw: &HashMap<Slot, String>,
    slot: Slot,
) -> Result<Option<T>, (Slot, String)> {
    raw.get(&slot)
        .map(|value| serde_json::from_str(value).map_err(|e| (slot, e.to_string())))
        .transpose()
}

fn decode(raw: &HashMap<Slot, String>) -> Result<SessionSnapshot, (Slot, String)> {
    let credential = match decode_slot::<String>(raw, Slot::Credential)? {
        Some(token) => Some(
            Credential::new(token).ok_or((Slot::Credential, "blank credential".to_string()))?,
        ),
        None => None,
    };
    Ok(SessionSnapshot {
        identity: decode_slot(raw, Slot::Identity)?,
        credential,
        preferences: decode_slot(raw, Slot::Preferences)?,
        questionnaire_draft: decode_slot(raw, Slot::QuestionnaireDraft)?,
    })
}
