//! Authentication and onboarding flow.

pub mod controller;
pub mod state;
pub mod validation;

pub use controller::{AuthFlowController, ScheduledTransition, SubmitOutcome};
pub use state::{
    FlowState, FlowTag, LoginForm, NewPasswordForm, RegisterForm, ResetCodeForm,
    ResetRequestForm, VerificationForm,
};
pub use validation::FieldErrors;
