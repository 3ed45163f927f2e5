//! Authentication flow states and the form each one owns.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Gender, QuestionnaireDraft, QuestionnaireStep};

/// Delay of the login success screen.
pub const LOGIN_SUCCESS_DELAY: Duration = Duration::from_secs(2);

/// Delay of every other success screen.
pub const SUCCESS_DELAY: Duration = Duration::from_secs(3);

/// The screens of the authentication and onboarding journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTag {
    Login,
    LoginSuccess,
    Register,
    RegisterSuccess,
    EmailVerification,
    EmailVerificationSuccess,
    PasswordResetRequest,
    PasswordResetCode,
    PasswordResetNew,
    PasswordResetSuccess,
    Questionnaire,
    Dashboard,
}

impl FlowTag {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying on a screen after a failed submit is not a transition.
    pub fn can_transition_to(&self, target: FlowTag) -> bool {
        use FlowTag::*;
        matches!(
            (self, target),
            (Login, LoginSuccess)
                | (Login, PasswordResetRequest)
                | (Login, Register)
                | (LoginSuccess, Questionnaire)
                | (LoginSuccess, Dashboard)
                | (Register, RegisterSuccess)
                | (RegisterSuccess, EmailVerification)
                | (EmailVerification, EmailVerificationSuccess)
                | (EmailVerificationSuccess, Login)
                | (PasswordResetRequest, PasswordResetCode)
                | (PasswordResetCode, PasswordResetNew)
                | (PasswordResetNew, PasswordResetSuccess)
                | (PasswordResetSuccess, Login)
                | (PasswordResetRequest, Login)
                | (PasswordResetCode, Login)
                | (PasswordResetNew, Login)
                | (Questionnaire, Dashboard)
        )
    }

    /// The controller exits once the dashboard is reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dashboard)
    }

    /// Success screens that leave on a timer and ignore input.
    pub fn is_interstitial(&self) -> bool {
        self.interstitial_delay().is_some()
    }

    pub fn interstitial_delay(&self) -> Option<Duration> {
        match self {
            Self::LoginSuccess => Some(LOGIN_SUCCESS_DELAY),
            Self::RegisterSuccess | Self::EmailVerificationSuccess | Self::PasswordResetSuccess => {
                Some(SUCCESS_DELAY)
            }
            _ => None,
        }
    }

    /// Where "back" leads, for the screens that offer it.
    pub fn back_target(&self) -> Option<FlowTag> {
        match self {
            Self::PasswordResetRequest | Self::PasswordResetCode | Self::PasswordResetNew => {
                Some(Self::Login)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for FlowTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Login => "login",
            Self::LoginSuccess => "login_success",
            Self::Register => "register",
            Self::RegisterSuccess => "register_success",
            Self::EmailVerification => "email_verification",
            Self::EmailVerificationSuccess => "email_verification_success",
            Self::PasswordResetRequest => "password_reset_request",
            Self::PasswordResetCode => "password_reset_code",
            Self::PasswordResetNew => "password_reset_new",
            Self::PasswordResetSuccess => "password_reset_success",
            Self::Questionnaire => "questionnaire",
            Self::Dashboard => "dashboard",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub gender: Option<Gender>,
    pub citizenship_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationForm {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetRequestForm {
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetCodeForm {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPasswordForm {
    pub email: String,
    pub code: String,
    pub password: String,
    pub confirm_password: String,
}

/// The active screen together with its screen-local fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Login(LoginForm),
    LoginSuccess { first_login: bool },
    Register(RegisterForm),
    RegisterSuccess { email: String },
    EmailVerification(VerificationForm),
    EmailVerificationSuccess { email: String },
    PasswordResetRequest(ResetRequestForm),
    PasswordResetCode(ResetCodeForm),
    PasswordResetNew(NewPasswordForm),
    PasswordResetSuccess { email: String },
    Questionnaire {
        draft: QuestionnaireDraft,
        step: QuestionnaireStep,
    },
    Dashboard,
}

impl FlowState {
    pub fn tag(&self) -> FlowTag {
        match self {
            Self::Login(_) => FlowTag::Login,
            Self::LoginSuccess { .. } => FlowTag::LoginSuccess,
            Self::Register(_) => FlowTag::Register,
            Self::RegisterSuccess { .. } => FlowTag::RegisterSuccess,
            Self::EmailVerification(_) => FlowTag::EmailVerification,
            Self::EmailVerificationSuccess { .. } => FlowTag::EmailVerificationSuccess,
            Self::PasswordResetRequest(_) => FlowTag::PasswordResetRequest,
            Self::PasswordResetCode(_) => FlowTag::PasswordResetCode,
            Self::PasswordResetNew(_) => FlowTag::PasswordResetNew,
            Self::PasswordResetSuccess { .. } => FlowTag::PasswordResetSuccess,
            Self::Questionnaire { .. } => FlowTag::Questionnaire,
            Self::Dashboard => FlowTag::Dashboard,
        }
    }

    pub fn login_with_email(email: impl Into<String>) -> Self {
        Self::Login(LoginForm {
            email: email.into(),
            password: String::new(),
        })
    }

    /// The questionnaire starts from the cached draft when one exists.
    pub fn questionnaire(draft: Option<QuestionnaireDraft>) -> Self {
        Self::Questionnaire {
            draft: draft.unwrap_or_default(),
            step: QuestionnaireStep::Interests,
        }
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::Login(LoginForm::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use FlowTag::*;
        let transitions = [
            (Login, LoginSuccess),
            (LoginSuccess, Questionnaire),
            (LoginSuccess, Dashboard),
            (Register, RegisterSuccess),
            (RegisterSuccess, EmailVerification),
            (EmailVerificationSuccess, Login),
            (PasswordResetRequest, PasswordResetCode),
            (PasswordResetCode, PasswordResetNew),
            (PasswordResetNew, PasswordResetSuccess),
            (PasswordResetSuccess, Login),
            (Questionnaire, Dashboard),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn no_way_back_from_dashboard_or_interstitials() {
        use FlowTag::*;
        assert!(Dashboard.is_terminal());
        assert!(!Dashboard.can_transition_to(Login));
        assert!(!LoginSuccess.can_transition_to(Login));
        assert!(!Register.can_transition_to(Login));
        assert!(!Questionnaire.can_transition_to(Login));
        assert!(LoginSuccess.back_target().is_none());
    }

    #[test]
    fn interstitial_delays() {
        assert_eq!(FlowTag::LoginSuccess.interstitial_delay(), Some(Duration::from_secs(2)));
        assert_eq!(FlowTag::RegisterSuccess.interstitial_delay(), Some(Duration::from_secs(3)));
        assert_eq!(
            FlowTag::PasswordResetSuccess.interstitial_delay(),
            Some(Duration::from_secs(3))
        );
        assert!(!FlowTag::Login.is_interstitial());
    }

    #[test]
    fn back_only_from_reset_screens() {
        for tag in [
            FlowTag::PasswordResetRequest,
            FlowTag::PasswordResetCode,
            FlowTag::PasswordResetNew,
        ] {
            assert_eq!(tag.back_target(), Some(FlowTag::Login));
            assert!(tag.can_transition_to(FlowTag::Login));
        }
        assert_eq!(FlowTag::EmailVerification.back_target(), None);
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(FlowTag::PasswordResetNew.to_string(), "password_reset_new");
        assert_eq!(FlowState::default().tag(), FlowTag::Login);
    }
}
