//! Typed backend operations over the [`RequestGateway`].
//!
//! Identity-bound calls take the user id explicitly; injecting it from the
//! session cache is the sync layer's job.

use std::sync::Arc;

use serde_json::json;

use crate::gateway::{ApiResponse, HttpRequest, RequestGateway};
use crate::model::{
    AccountDeletion, Country, Credential, IdentityPatch, LoginRequest, LoginResponse,
    PasswordResetRequest, PreferencePatch, PreferenceProfile, ProfileUpdate, RegisterRequest,
    UserLookup,
};
use crate::session::SessionStore;

/// A successful login: the server's user record plus the issued credential.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub profile: LoginResponse,
    pub credential: Credential,
}

pub struct TravelApi {
    gateway: RequestGateway,
}

impl TravelApi {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.gateway.session()
    }

    pub async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginGrant> {
        let response = self
            .gateway
            .send(
                "login",
                HttpRequest::post("/auth/login").with_json(to_body(request)),
            )
            .await;
        let status = response.status_code;
        let Some(reply) = response.data.filter(|_| response.success) else {
            return ApiResponse::failure(
                response.message.unwrap_or_default(),
                response.status_code,
            );
        };

        let profile: LoginResponse = match serde_json::from_value(reply.body) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(status, error = %e, "Unexpected login response");
                return ApiResponse::failure(format!("Unexpected response from server: {e}"), status);
            }
        };
        let credential = profile
            .token
            .clone()
            .and_then(Credential::new)
            .or_else(|| reply.issued_bearer.and_then(Credential::new))
            .unwrap_or_else(Credential::session_local);

        ApiResponse::ok(LoginGrant { profile, credential }, status)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResponse<()> {
        self.gateway
            .call_empty(
                "register",
                HttpRequest::post("/auth/register").with_json(to_body(request)),
            )
            .await
    }

    pub async fn logout(&self) -> ApiResponse<()> {
        self.gateway
            .call_empty("logout", HttpRequest::post("/auth/logout"))
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> ApiResponse<()> {
        self.gateway
            .call_empty(
                "request_password_reset",
                HttpRequest::post("/auth/password-reset-request").with_query("email", email),
            )
            .await
    }

    pub async fn reset_password(&self, request: &PasswordResetRequest) -> ApiResponse<()> {
        self.gateway
            .call_empty(
                "reset_password",
                HttpRequest::put("/auth/password-reset").with_json(to_body(request)),
            )
            .await
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> ApiResponse<()> {
        self.gateway
            .call_empty(
                "verify_email",
                HttpRequest::put("/auth/verify-email")
                    .with_query("email", email)
                    .with_query("verificationCode", code),
            )
            .await
    }

    pub async fn fetch_identity(&self, user_id: i64) -> ApiResponse<IdentityPatch> {
        self.gateway
            .call(
                "fetch_identity",
                HttpRequest::get("/profile").with_query("userId", user_id),
            )
            .await
    }

    /// The server may answer with the updated profile or an empty body.
    pub async fn update_identity(&self, update: &ProfileUpdate) -> ApiResponse<Option<IdentityPatch>> {
        self.gateway
            .call(
                "update_identity",
                HttpRequest::put("/profile").with_json(to_body(update)),
            )
            .await
    }

    /// `None` until the user saved preferences for the first time.
    pub async fn fetch_preferences(&self, user_id: i64) -> ApiResponse<Option<PreferenceProfile>> {
        self.gateway
            .call(
                "fetch_preferences",
                HttpRequest::get("/profile/preferences").with_query("userId", user_id),
            )
            .await
    }

    pub async fn update_preferences(
        &self,
        patch: &PreferencePatch,
    ) -> ApiResponse<Option<PreferenceProfile>> {
        self.gateway
            .call(
                "update_preferences",
                HttpRequest::put("/profile/preferences").with_json(to_body(patch)),
            )
            .await
    }

    pub async fn delete_account(&self, request: &AccountDeletion) -> ApiResponse<()> {
        self.gateway
            .call_empty(
                "delete_account",
                HttpRequest::delete("/auth/account").with_json(to_body(request)),
            )
            .await
    }

    pub async fn check_user(&self, email: &str) -> ApiResponse<UserLookup> {
        self.gateway
            .call(
                "check_user",
                HttpRequest::get("/auth/check-user").with_query("email", email),
            )
            .await
    }

    pub async fn list_countries(&self) -> ApiResponse<Vec<Country>> {
        self.gateway
            .call("list_countries", HttpRequest::get("/trips/countries"))
            .await
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> serde_json::Value {
    // Plain DTOs with string keys always serialize.
    serde_json::to_value(value).unwrap_or_else(|_| json!({}))
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::gateway::tests::{ScriptedTransport, signed_in_session};
    use crate::gateway::{HttpReply, RetryPolicy};

    fn login_body(token: Option<&str>) -> serde_json::Value {
        json!({
            "id": 12,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "gender": "FEMALE",
            "isVerified": true,
            "loginCount": 1,
            "token": token,
        })
    }

    async fn api_with(transport: Arc<ScriptedTransport>) -> TravelApi {
        let session = signed_in_session(12).await;
        TravelApi::new(RequestGateway::new(transport, session, RetryPolicy::default()))
    }

    #[tokio::test]
    async fn login_prefers_body_token() {
        let mut reply = HttpReply::json(200, login_body(Some("body-token")));
        reply.issued_bearer = Some("header-token".into());
        let transport = ScriptedTransport::new(vec![Ok(reply)]);
        let api = api_with(transport.clone()).await;

        let response = api
            .login(&LoginRequest {
                email: "ada@example.com".into(),
                password: "Secret1!".into(),
            })
            .await;
        let grant = response.data.unwrap();
        assert_eq!(grant.credential.expose(), "body-token");
        assert!(grant.profile.is_first_login());

        let sent = transport.requests().await;
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].path, "/auth/login");
        assert_eq!(sent[0].body.as_ref().unwrap()["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn login_falls_back_to_header_then_local() {
        let mut reply = HttpReply::json(200, login_body(None));
        reply.issued_bearer = Some("header-token".into());
        let transport = ScriptedTransport::new(vec![
            Ok(reply),
            Ok(HttpReply::json(200, login_body(None))),
        ]);
        let api = api_with(transport).await;
        let request = LoginRequest {
            email: "ada@example.com".into(),
            password: "Secret1!".into(),
        };

        let first = api.login(&request).await.data.unwrap();
        assert_eq!(first.credential.expose(), "header-token");
        let second = api.login(&request).await.data.unwrap();
        assert!(second.credential.expose().starts_with("session-"));
    }

    #[tokio::test]
    async fn login_failure_carries_server_message() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::json(
            400,
            json!({"errorMessage": "Invalid email or password"}),
        ))]);
        let api = api_with(transport).await;
        let response = api
            .login(&LoginRequest {
                email: "ada@example.com".into(),
                password: "nope".into(),
            })
            .await;
        assert!(!response.success);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.message.as_deref(), Some("Invalid email or password"));
    }

    #[tokio::test]
    async fn check_user_queries_by_email() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpReply::json(200, json!({"exists": true, "name": "Ada Lovelace"}))),
            Ok(HttpReply::json(200, json!({"exists": false}))),
        ]);
        let api = api_with(transport.clone()).await;

        let known = api.check_user("ada@example.com").await;
        assert!(known.success);
        assert_eq!(
            known.data,
            Some(UserLookup {
                exists: true,
                name: Some("Ada Lovelace".into()),
            })
        );
        let unknown = api.check_user("new@example.com").await.data.unwrap();
        assert!(!unknown.exists);
        assert_eq!(unknown.name, None);

        let sent = transport.requests().await;
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].path, "/auth/check-user");
        assert_eq!(
            sent[0].query,
            vec![("email".to_string(), "ada@example.com".to_string())]
        );
        assert!(sent[0].body.is_none());
    }

    #[tokio::test]
    async fn verification_uses_query_parameters() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::json(200, json!(null)))]);
        let api = api_with(transport.clone()).await;

        assert!(api.verify_email("ada@example.com", "123456").await.success);
        let sent = transport.requests().await;
        assert_eq!(sent[0].method, Method::PUT);
        assert_eq!(
            sent[0].query,
            vec![
                ("email".to_string(), "ada@example.com".to_string()),
                ("verificationCode".to_string(), "123456".to_string()),
            ]
        );
        assert!(sent[0].body.is_none());
    }

    #[tokio::test]
    async fn missing_preferences_decode_as_none() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::json(200, json!(null)))]);
        let api = api_with(transport.clone()).await;

        let response = api.fetch_preferences(12).await;
        assert!(response.success);
        assert_eq!(response.data, Some(None));
        assert_eq!(
            transport.requests().await[0].query[0],
            ("userId".to_string(), "12".to_string())
        );
    }

    #[tokio::test]
    async fn countries_decode() {
        let transport = ScriptedTransport::new(vec![Ok(HttpReply::json(
            200,
            json!([{"id": 1, "name": "Portugal", "countryCode": "PT"}]),
        ))]);
        let api = api_with(transport).await;
        let countries = api.list_countries().await.data.unwrap();
        assert_eq!(countries[0].country_code, "PT");
    }
}
