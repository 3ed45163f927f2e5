//! Data sync: keeps the session cache's identity and preferences in step with
//! the server after every point of change.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{LoginGrant, TravelApi};
use crate::error::StoreError;
use crate::gateway::ApiResponse;
use crate::model::{
    AccountDeletion, Identity, IdentityPatch, PreferencePatch, PreferenceProfile, ProfileUpdate,
    QuestionnaireDraft,
};
use crate::session::{SessionStore, Slot, SlotValue};

/// Per-slot results of one [`DataSyncCoordinator::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub identity: ApiResponse<Identity>,
    pub preferences: ApiResponse<Option<PreferenceProfile>>,
}

impl RefreshOutcome {
    pub fn is_complete(&self) -> bool {
        self.identity.success && self.preferences.success
    }
}

pub struct DataSyncCoordinator {
    api: Arc<TravelApi>,
    session: Arc<SessionStore>,
}

impl DataSyncCoordinator {
    pub fn new(api: Arc<TravelApi>, session: Arc<SessionStore>) -> Arc<Self> {
        Arc::new(Self { api, session })
    }

    pub fn api(&self) -> &Arc<TravelApi> {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Commit a fresh login and start a background refresh.
    ///
    /// A different identity evicts the previous one's preferences and draft.
    pub async fn sign_in(
        self: &Arc<Self>,
        grant: &LoginGrant,
    ) -> Result<JoinHandle<Option<RefreshOutcome>>, StoreError> {
        let identity = grant.profile.to_identity(Utc::now());
        self.session
            .establish(identity, grant.credential.clone())
            .await?;

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.refresh().await }))
    }

    /// Fetch identity and preferences concurrently and commit each on its own.
    ///
    /// `None` when there is no credential or no identity to refresh.
    pub async fn refresh(&self) -> Option<RefreshOutcome> {
        let snapshot = self.session.snapshot().await;
        if snapshot.credential.is_none() {
            debug!("No credential cached, skipping refresh");
            return None;
        }
        let user_id = snapshot.identity_id()?;

        let (identity, preferences) = tokio::join!(
            self.refresh_identity(user_id),
            self.refresh_preferences(user_id)
        );
        info!(
            identity_id = user_id,
            identity_ok = identity.success,
            preferences_ok = preferences.success,
            "Session refreshed"
        );
        Some(RefreshOutcome {
            identity,
            preferences,
        })
    }

    async fn refresh_identity(&self, user_id: i64) -> ApiResponse<Identity> {
        let response = self.api.fetch_identity(user_id).await;
        let status = response.status_code;
        let Some(mut patch) = response.data.filter(|_| response.success) else {
            return ApiResponse::failure(response.message.unwrap_or_default(), status);
        };
        // Pin the patch to the identity it was fetched for.
        patch.id = Some(patch.id.unwrap_or(user_id));
        match self.session.merge_identity(patch).await {
            Ok(Some(identity)) => ApiResponse::ok(identity, status),
            Ok(None) => ApiResponse::failure("Signed out during refresh", status),
            Err(e) => store_failure("refresh_identity", e, status),
        }
    }

    async fn refresh_preferences(&self, user_id: i64) -> ApiResponse<Option<PreferenceProfile>> {
        let response = self.api.fetch_preferences(user_id).await;
        if !response.success {
            return response;
        }
        let status = response.status_code;
        let result = match response.data.flatten() {
            Some(profile) => self
                .session
                .commit(SlotValue::Preferences(profile.clone()))
                .await
                .map(|_| Some(profile)),
            None => self.session.clear(Slot::Preferences).await.map(|_| None),
        };
        match result {
            Ok(profile) => ApiResponse::ok(profile, status),
            Err(e) => store_failure("refresh_preferences", e, status),
        }
    }

    /// Submit the onboarding questionnaire as a preferences update.
    ///
    /// The draft is cached before the call and kept when the call fails, so
    /// [`retry_pending_questionnaire`](Self::retry_pending_questionnaire) can
    /// submit it later. On success it is marked submitted and a refresh runs.
    pub async fn apply_questionnaire(
        &self,
        draft: QuestionnaireDraft,
    ) -> ApiResponse<Option<PreferenceProfile>> {
        let Some(user_id) = self.session.identity_id().await else {
            return ApiResponse::missing_identity();
        };
        if let Err(e) = self
            .session
            .commit(SlotValue::QuestionnaireDraft(draft.clone()))
            .await
        {
            warn!(error = %e, "Failed to cache questionnaire draft");
        }

        let response = self
            .submit_preferences(user_id, draft.to_preference_patch())
            .await;
        if !response.success {
            warn!(
                identity_id = user_id,
                status = response.status_code,
                "Questionnaire submission failed, draft kept for retry"
            );
            return response;
        }

        let mut accepted = draft;
        accepted.submitted_at = Some(Utc::now());
        if let Err(e) = self
            .session
            .commit(SlotValue::QuestionnaireDraft(accepted))
            .await
        {
            warn!(error = %e, "Failed to mark questionnaire draft submitted");
        }
        info!(identity_id = user_id, "Questionnaire applied");
        self.refresh().await;
        response
    }

    /// Re-submit a cached draft the server has not accepted yet.
    pub async fn retry_pending_questionnaire(&self) -> Option<ApiResponse<Option<PreferenceProfile>>> {
        let draft = self
            .session
            .snapshot()
            .await
            .questionnaire_draft
            .filter(QuestionnaireDraft::is_pending)?;
        Some(self.apply_questionnaire(draft).await)
    }

    pub async fn update_preferences(
        &self,
        patch: PreferencePatch,
    ) -> ApiResponse<Option<PreferenceProfile>> {
        let Some(user_id) = self.session.identity_id().await else {
            return ApiResponse::missing_identity();
        };
        let response = self.submit_preferences(user_id, patch).await;
        if response.success {
            self.refresh().await;
        }
        response
    }

    /// Send a preferences update with the cached identity id injected and
    /// commit the returned profile. An empty success body commits nothing.
    async fn submit_preferences(
        &self,
        user_id: i64,
        patch: PreferencePatch,
    ) -> ApiResponse<Option<PreferenceProfile>> {
        let patch = patch.with_user_id(user_id);
        let response = self.api.update_preferences(&patch).await;
        if !response.success {
            return response;
        }
        let status = response.status_code;
        match response.data.flatten() {
            Some(profile) => match self
                .session
                .commit(SlotValue::Preferences(profile.clone()))
                .await
            {
                Ok(()) => ApiResponse::ok(Some(profile), status),
                Err(e) => store_failure("update_preferences", e, status),
            },
            None => ApiResponse::ok(None, status),
        }
    }

    /// Update profile fields and shallow-merge the result into the cache.
    pub async fn update_identity(&self, patch: IdentityPatch) -> ApiResponse<Identity> {
        let Some(user_id) = self.session.identity_id().await else {
            return ApiResponse::missing_identity();
        };
        let response = self
            .api
            .update_identity(&ProfileUpdate::new(user_id, patch.clone()))
            .await;
        let status = response.status_code;
        if !response.success {
            return ApiResponse::failure(response.message.unwrap_or_default(), status);
        }

        let mut merged = response.data.flatten().unwrap_or(patch);
        merged.id = Some(merged.id.unwrap_or(user_id));
        match self.session.merge_identity(merged).await {
            Ok(Some(identity)) => ApiResponse::ok(identity, status),
            Ok(None) => ApiResponse::failure("Signed out during update", status),
            Err(e) => store_failure("update_identity", e, status),
        }
    }

    /// Best-effort server logout; the local session is evicted regardless.
    pub async fn logout(&self) -> ApiResponse<()> {
        let response = if self.session.credential().await.is_some() {
            self.api.logout().await
        } else {
            ApiResponse::ok_empty(200)
        };
        if !response.success {
            warn!(status = response.status_code, "Server logout failed, evicting locally");
        }
        if let Err(e) = self.session.sign_out().await {
            warn!(error = %e, "Failed to evict session on logout");
        }
        response
    }

    pub async fn delete_account(&self, current_password: &str) -> ApiResponse<()> {
        let Some(user_id) = self.session.identity_id().await else {
            return ApiResponse::missing_identity();
        };
        let response = self
            .api
            .delete_account(&AccountDeletion {
                user_id,
                current_password: current_password.to_string(),
            })
            .await;
        if response.success {
            info!(identity_id = user_id, "Account deleted");
            if let Err(e) = self.session.sign_out().await {
                warn!(error = %e, "Failed to evict session after account deletion");
            }
        }
        response
    }
}

fn store_failure<T>(operation: &'static str, err: StoreError, status: u16) -> ApiResponse<T> {
    warn!(operation, error = %err, "Session cache rejected server data");
    ApiResponse::failure(format!("Failed to update session: {err}"), status)
}
