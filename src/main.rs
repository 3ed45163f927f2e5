use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::{self, error::TryRecvError};

use farrin_session::auth::{
    AuthFlowController, FlowState, FlowTag, LoginForm, NewPasswordForm, RegisterForm,
    ResetCodeForm, ResetRequestForm, SubmitOutcome, VerificationForm,
};
use farrin_session::client::TravelClient;
use farrin_session::config::ClientConfig;
use farrin_session::model::{
    Accommodation, Climate, Gender, IdentityPatch, Interest, PreferencePatch, Season, TravelStyle,
};
use farrin_session::session::{SessionEvent, SessionStatus};

type Input = Lines<BufReader<Stdin>>;
type Events = broadcast::Receiver<SessionEvent>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    eprintln!("Farrin session v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.base_url);
    eprintln!("   Session file: {}\n", config.session_db_path.display());

    let client = TravelClient::open(config).await?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    // Subscribed before start so a 401 during the first refresh is seen.
    let mut events = client.session().subscribe();
    let mut next = match client.start().await? {
        SessionStatus::Authenticated => None,
        SessionStatus::Unauthenticated if login_required(&mut events) => Some(Next::Expired),
        SessionStatus::Unauthenticated => Some(Next::SignIn),
    };
    loop {
        if let Some(reason) = next {
            let mut flow = client.auth_flow();
            if matches!(reason, Next::Expired) {
                flow.restart();
            }
            if !run_flow(&client, &mut flow, &mut input).await? {
                return Ok(());
            }
        }
        match dashboard(&client, &mut events, &mut input).await? {
            Next::Quit => return Ok(()),
            reason => next = Some(reason),
        }
    }
}

async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<String> {
    eprint!("{label}: ");
    match input.next_line().await? {
        Some(line) => Ok(line.trim().to_string()),
        None => bail!("stdin closed"),
    }
}

fn report(flow: &AuthFlowController, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Advanced(tag) => {
            if let Some(notice) = flow.notice() {
                eprintln!("  {notice}");
            }
            eprintln!("→ {tag}");
        }
        SubmitOutcome::Invalid(errors) => {
            for (field, message) in errors.iter() {
                eprintln!("  ✗ {field}: {message}");
            }
        }
        SubmitOutcome::Rejected { message, .. } => eprintln!("  ✗ {message}"),
        SubmitOutcome::NotAllowed { state } => eprintln!("  not available on {state}"),
    }
}

/// Drive the flow until the dashboard. `false` means the user quit.
async fn run_flow(
    client: &TravelClient,
    flow: &mut AuthFlowController,
    input: &mut Input,
) -> anyhow::Result<bool> {
    while !flow.is_finished() {
        if let Some(pending) = flow.pending_transition().copied() {
            eprintln!("✓ {} (continuing to {})", pending.from, pending.target);
            flow.wait_for_timer().await;
            continue;
        }

        let outcome = match flow.tag() {
            FlowTag::Login => {
                let choice = prompt(input, "[l]ogin, [r]egister, [f]orgot password, [q]uit").await?;
                match choice.as_str() {
                    "r" => flow.go_to_register(),
                    "f" => flow.go_to_password_reset(),
                    "q" => return Ok(false),
                    _ => {
                        let email = prompt(input, "Email").await?;
                        let password = prompt(input, "Password").await?;
                        flow.submit_login(LoginForm { email, password }).await
                    }
                }
            }
            FlowTag::Register => {
                let email = prompt(input, "Email").await?;
                if !email.trim().is_empty()
                    && let Some(found) = client
                        .api()
                        .check_user(email.trim())
                        .await
                        .data
                        .filter(|found| found.exists)
                {
                    let name = found.name.unwrap_or_else(|| email.clone());
                    eprintln!("  An account for {name} already exists, try another email.");
                    continue;
                }
                let countries = client.api().list_countries().await;
                if let Some(countries) = countries.data {
                    for country in countries.iter().take(20) {
                        eprintln!("  {:>4} {}", country.id, country.name);
                    }
                }
                let form = RegisterForm {
                    first_name: prompt(input, "First name").await?,
                    last_name: prompt(input, "Last name").await?,
                    email,
                    password: prompt(input, "Password").await?,
                    confirm_password: prompt(input, "Confirm password").await?,
                    date_of_birth: prompt(input, "Date of birth (YYYY-MM-DD)").await?,
                    gender: parse_gender(&prompt(input, "Gender (male/female, blank to skip)").await?),
                    citizenship_ids: prompt(input, "Citizenship country ids (comma separated)")
                        .await?
                        .split(',')
                        .filter_map(|id| id.trim().parse().ok())
                        .collect(),
                };
                flow.submit_registration(form).await
            }
            FlowTag::EmailVerification => {
                let email = match flow.state() {
                    FlowState::EmailVerification(form) => form.email.clone(),
                    _ => String::new(),
                };
                let code = prompt(input, &format!("Verification code sent to {email}")).await?;
                flow.submit_verification(VerificationForm { email, code }).await
            }
            FlowTag::PasswordResetRequest => {
                let email = prompt(input, "Email (blank to go back)").await?;
                if email.is_empty() {
                    flow.back()
                } else {
                    flow.request_password_reset(ResetRequestForm { email }).await
                }
            }
            FlowTag::PasswordResetCode => {
                let email = match flow.state() {
                    FlowState::PasswordResetCode(form) => form.email.clone(),
                    _ => String::new(),
                };
                let code = prompt(input, "Reset code (blank to go back)").await?;
                if code.is_empty() {
                    flow.back()
                } else {
                    flow.submit_reset_code(ResetCodeForm { email, code })
                }
            }
            FlowTag::PasswordResetNew => {
                let (email, code) = match flow.state() {
                    FlowState::PasswordResetNew(form) => (form.email.clone(), form.code.clone()),
                    _ => Default::default(),
                };
                let password = prompt(input, "New password (blank to go back)").await?;
                if password.is_empty() {
                    flow.back()
                } else {
                    let confirm_password = prompt(input, "Confirm new password").await?;
                    flow.submit_new_password(NewPasswordForm {
                        email,
                        code,
                        password,
                        confirm_password,
                    })
                    .await
                }
            }
            FlowTag::Questionnaire => questionnaire(flow, input).await?,
            _ => continue,
        };
        report(flow, &outcome);
    }
    Ok(true)
}

async fn questionnaire(flow: &mut AuthFlowController, input: &mut Input) -> anyhow::Result<SubmitOutcome> {
    eprintln!("A few questions to tailor your trips. Blank keeps the suggestion.");
    if prompt(input, "Skip the questionnaire? [y/N]").await? == "y" {
        return Ok(flow.skip_questionnaire());
    }

    let interest = prompt(input, &format!("Main interest {}", choices(Interest::ALL))).await?;
    let style = prompt(input, &format!("Travel style {}", choices(TravelStyle::ALL))).await?;
    let accommodation_budget = prompt(input, "Accommodation budget").await?;
    let transportation_budget = prompt(input, "Transportation budget").await?;
    let duration = prompt(input, "Average trip length in days").await?;
    if let Some((draft, _)) = flow.questionnaire_mut() {
        if let Ok(v) = interest.parse() {
            draft.primary_interest = v;
        }
        if let Ok(v) = style.parse() {
            draft.preferred_travel_style = v;
        }
        draft.set_accommodation_budget(accommodation_budget);
        draft.set_transportation_budget(transportation_budget);
        if let Ok(days) = duration.parse() {
            draft.avg_travel_duration = days;
        }
    }
    let step = flow.next_questionnaire_step();
    if !step.is_advanced() {
        return Ok(step);
    }

    let climate = prompt(input, &format!("Climate {}", choices(Climate::ALL))).await?;
    let season = prompt(input, &format!("Season {}", choices(Season::ALL))).await?;
    let accommodation = prompt(input, &format!("Accommodation {}", choices(Accommodation::ALL))).await?;
    if let Some((draft, _)) = flow.questionnaire_mut() {
        if let Ok(v) = climate.parse() {
            draft.preferred_climate = v;
        }
        if let Ok(v) = season.parse() {
            draft.preferred_travel_season = v;
        }
        if let Ok(v) = accommodation.parse() {
            draft.preferred_accommodation = v;
        }
    }
    flow.next_questionnaire_step();

    let sharing = prompt(input, "Share anonymised data to improve suggestions? [Y/n]").await?;
    if let Some((draft, _)) = flow.questionnaire_mut() {
        draft.data_sharing = sharing != "n";
    }
    Ok(flow.complete_questionnaire().await)
}

enum Next {
    Quit,
    SignIn,
    /// The server revoked the session; the login screen keeps the email.
    Expired,
}

/// Drain queued session events. `true` when one asked for a new login.
fn login_required(events: &mut Events) -> bool {
    let mut required = false;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::LoginRequired) => required = true,
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return required,
        }
    }
}

async fn dashboard(client: &TravelClient, events: &mut Events, input: &mut Input) -> anyhow::Result<Next> {
    if let Some(identity) = client.session().identity().await {
        eprintln!("\nSigned in as {} {} <{}>", identity.first_name, identity.last_name, identity.email);
    }
    if let Some(response) = client.sync().retry_pending_questionnaire().await {
        if response.success {
            eprintln!("  Submitted your saved questionnaire answers.");
        } else {
            eprintln!("  Saved questionnaire answers are still pending: {}", response.message_or("server unavailable"));
        }
    }

    loop {
        // A rejection from before the current login leaves a credential in place.
        if login_required(events) && !client.session().is_authenticated().await {
            eprintln!("Your session expired. Please sign in again.");
            return Ok(Next::Expired);
        }

        let command = prompt(input, "\n[p]rofile, p[r]eferences, [n]ame, [s]haring, re[f]resh, [o]ut, [d]elete, [q]uit").await?;
        match command.as_str() {
            "p" => {
                if let Some(identity) = client.session().identity().await {
                    eprintln!("{}", serde_json::to_string_pretty(&identity)?);
                }
            }
            "r" => match client.session().snapshot().await.preferences {
                Some(prefs) => eprintln!("{}", serde_json::to_string_pretty(&prefs)?),
                None => eprintln!("No preferences saved yet."),
            },
            "n" => {
                let first_name = prompt(input, "First name").await?;
                let response = client
                    .sync()
                    .update_identity(IdentityPatch {
                        first_name: Some(first_name),
                        ..Default::default()
                    })
                    .await;
                eprintln!("  {}", response.message_or("Profile updated"));
            }
            "s" => {
                let answer = prompt(input, "Share data? [y/n]").await?;
                let response = client
                    .sync()
                    .update_preferences(PreferencePatch {
                        data_sharing: Some(answer == "y"),
                        ..Default::default()
                    })
                    .await;
                eprintln!("  {}", response.message_or("Preferences updated"));
            }
            "f" => match client.sync().refresh().await {
                Some(outcome) if outcome.is_complete() => eprintln!("  Up to date."),
                Some(_) => eprintln!("  Partially refreshed."),
                None => eprintln!("  Not signed in."),
            },
            "o" => {
                client.sync().logout().await;
                eprintln!("Signed out.");
                return Ok(Next::SignIn);
            }
            "d" => {
                let password = prompt(input, "Current password").await?;
                let response = client.sync().delete_account(&password).await;
                if response.success {
                    eprintln!("Account deleted.");
                    return Ok(Next::SignIn);
                }
                eprintln!("  ✗ {}", response.message_or("Account deletion failed"));
            }
            "q" => return Ok(Next::Quit),
            _ => {}
        }
    }
}

fn choices<T: std::fmt::Display>(all: &[T]) -> String {
    let names: Vec<String> = all.iter().map(|v| v.to_string().to_lowercase()).collect();
    format!("({})", names.join(", "))
}

fn parse_gender(raw: &str) -> Option<Gender> {
    match raw.to_ascii_lowercase().as_str() {
        "male" | "m" => Some(Gender::Male),
        "female" | "f" => Some(Gender::Female),
        _ => None,
    }
}
