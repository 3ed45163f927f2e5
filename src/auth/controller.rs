//! Drives the authentication and onboarding journey one screen at a time.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::state::{
    FlowState, FlowTag, LoginForm, NewPasswordForm, RegisterForm, ResetCodeForm,
    ResetRequestForm, VerificationForm,
};
use super::validation::{
    FieldErrors, validate_login, validate_new_password, validate_registration,
    validate_reset_code, validate_reset_request, validate_verification,
};
use crate::gateway::ApiResponse;
use crate::model::{
    LoginRequest, PasswordResetRequest, QuestionnaireDraft, QuestionnaireStep, RegisterRequest,
};
use crate::sync::{DataSyncCoordinator, RefreshOutcome};

/// What a user action did to the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Moved to a new screen.
    Advanced(FlowTag),
    /// Local validation failed; nothing was sent.
    Invalid(FieldErrors),
    /// The server said no; the screen is unchanged.
    Rejected { message: String, status_code: u16 },
    /// The action does not exist on the current screen.
    NotAllowed { state: FlowTag },
}

impl SubmitOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced(_))
    }
}

/// A delayed transition owned by a success screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTransition {
    pub from: FlowTag,
    pub target: FlowTag,
    pub due: Instant,
}

pub struct AuthFlowController {
    sync: Arc<DataSyncCoordinator>,
    state: FlowState,
    pending: Option<ScheduledTransition>,
    error: Option<String>,
    notice: Option<String>,
    background_refresh: Option<JoinHandle<Option<RefreshOutcome>>>,
}

impl AuthFlowController {
    pub fn new(sync: Arc<DataSyncCoordinator>) -> Self {
        Self {
            sync,
            state: FlowState::default(),
            pending: None,
            error: None,
            notice: None,
            background_refresh: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn tag(&self) -> FlowTag {
        self.state.tag()
    }

    pub fn is_finished(&self) -> bool {
        self.tag().is_terminal()
    }

    /// Message from the last rejected action on this screen.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Informational message from the last action.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn pending_transition(&self) -> Option<&ScheduledTransition> {
        self.pending.as_ref()
    }

    /// Refresh started by the last login, if still held.
    pub fn take_background_refresh(&mut self) -> Option<JoinHandle<Option<RefreshOutcome>>> {
        self.background_refresh.take()
    }

    // ── Login screen ────────────────────────────────────────────────

    pub async fn submit_login(&mut self, form: LoginForm) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::Login) {
            return refused;
        }
        self.state = FlowState::Login(form.clone());
        if let Err(errors) = validate_login(&form) {
            return SubmitOutcome::Invalid(errors);
        }

        let response = self
            .sync
            .api()
            .login(&LoginRequest {
                email: form.email.trim().to_string(),
                password: form.password,
            })
            .await;
        let status_code = response.status_code;
        let Some(grant) = response.data.filter(|_| response.success) else {
            return self.reject(response.message, status_code, "Login failed");
        };

        match self.sync.sign_in(&grant).await {
            Ok(refresh) => self.background_refresh = Some(refresh),
            Err(e) => {
                warn!(error = %e, "Failed to store session after login");
                return self.reject(Some(format!("Failed to store session: {e}")), status_code, "Login failed");
            }
        }

        let first_login = grant.profile.is_first_login();
        info!(
            identity_id = grant.profile.id,
            login_count = grant.profile.login_count,
            first_login,
            "Login succeeded"
        );
        self.advance(FlowState::LoginSuccess { first_login })
    }

    pub fn go_to_register(&mut self) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::Login) {
            return refused;
        }
        self.advance(FlowState::Register(RegisterForm::default()))
    }

    pub fn go_to_password_reset(&mut self) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::Login) {
            return refused;
        }
        let email = match &self.state {
            FlowState::Login(form) => form.email.clone(),
            _ => String::new(),
        };
        self.advance(FlowState::PasswordResetRequest(ResetRequestForm { email }))
    }

    /// "Back" from the password reset screens.
    pub fn back(&mut self) -> SubmitOutcome {
        let tag = self.tag();
        if tag.back_target().is_none() {
            return SubmitOutcome::NotAllowed { state: tag };
        }
        let email = match &self.state {
            FlowState::PasswordResetRequest(f) => f.email.clone(),
            FlowState::PasswordResetCode(f) => f.email.clone(),
            FlowState::PasswordResetNew(f) => f.email.clone(),
            _ => String::new(),
        };
        self.advance(FlowState::login_with_email(email))
    }

    // ── Registration ────────────────────────────────────────────────

    pub async fn submit_registration(&mut self, form: RegisterForm) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::Register) {
            return refused;
        }
        self.state = FlowState::Register(form.clone());
        if let Err(errors) = validate_registration(&form) {
            return SubmitOutcome::Invalid(errors);
        }

        let email = form.email.trim().to_string();
        let request = RegisterRequest {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: email.clone(),
            password: form.password,
            date_of_birth: form.date_of_birth.trim().to_string(),
            gender: form.gender,
            citizenship_ids: form.citizenship_ids.into_iter().filter(|id| *id > 0).collect(),
        };
        let response = self.sync.api().register(&request).await;
        if !response.success {
            return self.reject_response(response, "Registration failed");
        }
        info!("Registration accepted, verification pending");
        self.advance(FlowState::RegisterSuccess { email })
    }

    pub async fn submit_verification(&mut self, form: VerificationForm) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::EmailVerification) {
            return refused;
        }
        self.state = FlowState::EmailVerification(form.clone());
        if let Err(errors) = validate_verification(&form) {
            return SubmitOutcome::Invalid(errors);
        }

        let email = form.email.trim().to_string();
        let response = self.sync.api().verify_email(&email, form.code.trim()).await;
        if !response.success {
            return self.reject_response(response, "Verification failed");
        }
        // Picks up the verified flag when a session is already cached.
        self.sync.refresh().await;
        self.advance(FlowState::EmailVerificationSuccess { email })
    }

    // ── Password reset ──────────────────────────────────────────────

    pub async fn request_password_reset(&mut self, form: ResetRequestForm) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::PasswordResetRequest) {
            return refused;
        }
        self.state = FlowState::PasswordResetRequest(form.clone());
        if let Err(errors) = validate_reset_request(&form) {
            return SubmitOutcome::Invalid(errors);
        }

        let email = form.email.trim().to_string();
        let response = self.sync.api().request_password_reset(&email).await;
        if !response.success {
            return self.reject_response(response, "Failed to send reset code");
        }
        let outcome = self.advance(FlowState::PasswordResetCode(ResetCodeForm {
            email,
            code: String::new(),
        }));
        self.notice = Some("Reset code sent to your email".to_string());
        outcome
    }

    /// The code is only checked by the server together with the new password.
    pub fn submit_reset_code(&mut self, form: ResetCodeForm) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::PasswordResetCode) {
            return refused;
        }
        self.state = FlowState::PasswordResetCode(form.clone());
        if let Err(errors) = validate_reset_code(&form) {
            return SubmitOutcome::Invalid(errors);
        }
        self.advance(FlowState::PasswordResetNew(NewPasswordForm {
            email: form.email,
            code: form.code.trim().to_string(),
            password: String::new(),
            confirm_password: String::new(),
        }))
    }

    pub async fn submit_new_password(&mut self, form: NewPasswordForm) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::PasswordResetNew) {
            return refused;
        }
        self.state = FlowState::PasswordResetNew(form.clone());
        if let Err(errors) = validate_new_password(&form) {
            return SubmitOutcome::Invalid(errors);
        }

        let request = PasswordResetRequest {
            email: form.email.clone(),
            reset_code: form.code,
            new_password: form.password,
        };
        let response = self.sync.api().reset_password(&request).await;
        if !response.success {
            return self.reject_response(response, "Password reset failed");
        }
        self.advance(FlowState::PasswordResetSuccess { email: form.email })
    }

    // ── Questionnaire ───────────────────────────────────────────────

    /// Current questionnaire draft and step, for editing.
    pub fn questionnaire_mut(&mut self) -> Option<(&mut QuestionnaireDraft, QuestionnaireStep)> {
        match &mut self.state {
            FlowState::Questionnaire { draft, step } => Some((draft, *step)),
            _ => None,
        }
    }

    /// Move to the next questionnaire screen once the current one is filled.
    pub fn next_questionnaire_step(&mut self) -> SubmitOutcome {
        let tag = self.tag();
        let FlowState::Questionnaire { draft, step } = &mut self.state else {
            return SubmitOutcome::NotAllowed { state: tag };
        };
        if !draft.step_complete(*step) {
            let mut errors = FieldErrors::new();
            errors.add("questionnaire", "Please fill in a budget and a travel duration");
            return SubmitOutcome::Invalid(errors);
        }
        match step.next() {
            Some(next) => {
                *step = next;
                debug!(step = ?next, "Questionnaire step");
                SubmitOutcome::Advanced(FlowTag::Questionnaire)
            }
            None => SubmitOutcome::NotAllowed { state: tag },
        }
    }

    /// Submit the questionnaire and leave for the dashboard, even when the
    /// submission fails; the draft stays cached in that case.
    pub async fn complete_questionnaire(&mut self) -> SubmitOutcome {
        let tag = self.tag();
        let FlowState::Questionnaire { draft, .. } = &self.state else {
            return SubmitOutcome::NotAllowed { state: tag };
        };
        let response = self.sync.apply_questionnaire(draft.clone()).await;
        if !response.success {
            warn!(
                status = response.status_code,
                "Questionnaire not saved, continuing to dashboard"
            );
            self.notice = Some(response.message_or("Preferences could not be saved"));
        }
        self.advance(FlowState::Dashboard)
    }

    pub fn skip_questionnaire(&mut self) -> SubmitOutcome {
        if let Some(refused) = self.guard(FlowTag::Questionnaire) {
            return refused;
        }
        info!("Questionnaire skipped");
        self.advance(FlowState::Dashboard)
    }

    /// Start over at the login screen after the session was revoked.
    pub fn restart(&mut self) {
        let email = self
            .sync
            .session()
            .watch()
            .borrow()
            .identity
            .as_ref()
            .map(|i| i.email.clone())
            .unwrap_or_default();
        info!(from = %self.tag(), "Flow restarted at login");
        self.pending = None;
        self.error = None;
        self.notice = None;
        self.state = FlowState::login_with_email(email);
    }

    // ── Timers ──────────────────────────────────────────────────────

    /// Sleep until the pending transition is due and apply it.
    pub async fn wait_for_timer(&mut self) -> Option<FlowTag> {
        let due = self.pending?.due;
        tokio::time::sleep_until(due).await;
        self.fire_due().await
    }

    /// Apply the pending transition if its time has come.
    pub async fn fire_due(&mut self) -> Option<FlowTag> {
        let scheduled = self.pending?;
        if scheduled.due > Instant::now() {
            return None;
        }
        self.pending = None;
        if self.tag() != scheduled.from {
            debug!(from = %scheduled.from, current = %self.tag(), "Dropping stale timer");
            return None;
        }

        let next = match (&self.state, scheduled.target) {
            (FlowState::LoginSuccess { .. }, FlowTag::Questionnaire) => {
                let draft = self
                    .sync
                    .session()
                    .snapshot()
                    .await
                    .questionnaire_draft
                    .filter(QuestionnaireDraft::is_pending);
                FlowState::questionnaire(draft)
            }
            (FlowState::LoginSuccess { .. }, _) => FlowState::Dashboard,
            (FlowState::RegisterSuccess { email }, _) => FlowState::EmailVerification(VerificationForm {
                email: email.clone(),
                code: String::new(),
            }),
            (FlowState::EmailVerificationSuccess { email }, _)
            | (FlowState::PasswordResetSuccess { email }, _) => FlowState::login_with_email(email.clone()),
            _ => return None,
        };
        self.advance(next);
        Some(self.tag())
    }

    /// Drop the pending timer; used when the controller is torn down.
    pub fn cancel_pending(&mut self) {
        if let Some(scheduled) = self.pending.take() {
            debug!(from = %scheduled.from, target = %scheduled.target, "Timer cancelled");
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn guard(&mut self, expected: FlowTag) -> Option<SubmitOutcome> {
        let current = self.tag();
        if current != expected {
            return Some(SubmitOutcome::NotAllowed { state: current });
        }
        self.error = None;
        self.notice = None;
        None
    }

    fn advance(&mut self, next: FlowState) -> SubmitOutcome {
        let from = self.tag();
        let to = next.tag();
        if !from.can_transition_to(to) {
            warn!(from = %from, to = %to, "Refusing invalid flow transition");
            return SubmitOutcome::NotAllowed { state: from };
        }

        self.pending = to.interstitial_delay().map(|delay| ScheduledTransition {
            from: to,
            target: interstitial_target(&next),
            due: Instant::now() + delay,
        });
        self.state = next;
        self.error = None;
        info!(from = %from, to = %to, "Flow transition");
        SubmitOutcome::Advanced(to)
    }

    fn reject(&mut self, message: Option<String>, status_code: u16, fallback: &str) -> SubmitOutcome {
        let message = message.filter(|m| !m.is_empty()).unwrap_or_else(|| fallback.to_string());
        warn!(state = %self.tag(), status_code, message = %message, "Action rejected");
        self.error = Some(message.clone());
        SubmitOutcome::Rejected {
            message,
            status_code,
        }
    }

    fn reject_response(&mut self, response: ApiResponse<()>, fallback: &str) -> SubmitOutcome {
        self.reject(response.message, response.status_code, fallback)
    }
}

fn interstitial_target(state: &FlowState) -> FlowTag {
    match state {
        FlowState::LoginSuccess { first_login: true } => FlowTag::Questionnaire,
        FlowState::LoginSuccess { first_login: false } => FlowTag::Dashboard,
        FlowState::RegisterSuccess { .. } => FlowTag::EmailVerification,
        _ => FlowTag::Login,
    }
}
