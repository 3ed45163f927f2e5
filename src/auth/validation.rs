//! Field-level form checks run before any network call.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::state::{
    LoginForm, NewPasswordForm, RegisterForm, ResetCodeForm, ResetRequestForm, VerificationForm,
};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};':"\\|,.<>/?]"#).unwrap());

pub const MIN_PASSWORD_LEN: usize = 8;

/// Every violated rule, grouped by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &String)> + '_ {
        self.0
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| (*field, m)))
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !EMAIL.is_match(email) {
        errors.add("email", "Please enter a valid email address");
    }
}

/// Complexity rules for a new password. All failures are returned.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    if password.is_empty() {
        return vec!["Password is required"];
    }
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain at least one number");
    }
    if !SYMBOL.is_match(password) {
        problems.push("Password must contain at least one symbol");
    }
    problems
}

fn check_new_password(errors: &mut FieldErrors, password: &str, confirm: &str) {
    for problem in password_problems(password) {
        errors.add("password", problem);
    }
    if password != confirm {
        errors.add("confirmPassword", "Passwords do not match");
    }
}

pub fn validate_login(form: &LoginForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &form.email);
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()
}

pub fn validate_registration(form: &RegisterForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.first_name.trim().is_empty() {
        errors.add("firstName", "First name is required");
    }
    if form.last_name.trim().is_empty() {
        errors.add("lastName", "Last name is required");
    }
    check_email(&mut errors, &form.email);
    check_new_password(&mut errors, &form.password, &form.confirm_password);
    if form.date_of_birth.trim().is_empty() {
        errors.add("dateOfBirth", "Date of birth is required");
    } else if chrono::NaiveDate::parse_from_str(form.date_of_birth.trim(), "%Y-%m-%d").is_err() {
        errors.add("dateOfBirth", "Date of birth must be a date (YYYY-MM-DD)");
    }
    if !form.citizenship_ids.iter().any(|id| *id > 0) {
        errors.add("citizenship", "At least one citizenship is required");
    }
    errors.into_result()
}

pub fn validate_verification(form: &VerificationForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &form.email);
    if form.code.trim().is_empty() {
        errors.add("code", "Verification code is required");
    }
    errors.into_result()
}

pub fn validate_reset_request(form: &ResetRequestForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &form.email);
    errors.into_result()
}

pub fn validate_reset_code(form: &ResetCodeForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.code.trim().is_empty() {
        errors.add("code", "Reset code is required");
    }
    errors.into_result()
}

pub fn validate_new_password(form: &NewPasswordForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }
    if form.password != form.confirm_password {
        errors.add("confirmPassword", "Passwords do not match");
    }
    errors.into_result()
}
