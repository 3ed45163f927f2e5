//! Identity record and the auth/profile wire DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

/// A country, as used for citizenships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent_id: Option<i64>,
}

/// The authenticated user's profile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub login_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub citizenship_ids: Vec<i64>,
    #[serde(default)]
    pub citizenships: Vec<Country>,
}

impl Identity {
    /// Shallow merge: fields present in the patch overwrite, absent ones keep
    /// their cached value.
    pub fn merge(&mut self, patch: IdentityPatch) {
        if let Some(v) = patch.first_name {
            self.first_name = v;
        }
        if let Some(v) = patch.last_name {
            self.last_name = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.gender {
            self.gender = Some(v);
        }
        if let Some(v) = patch.date_of_birth.or(patch.dob) {
            self.date_of_birth = Some(v);
        }
        if let Some(v) = patch.is_verified {
            self.is_verified = v;
        }
        if let Some(v) = patch.login_count {
            self.login_count = v;
        }
        if let Some(v) = patch.created_at {
            self.created_at = v;
        }
        match (patch.citizenship_ids, patch.citizenships) {
            (Some(ids), countries) => {
                self.citizenship_ids = ids;
                if let Some(countries) = countries {
                    self.citizenships = countries;
                }
            }
            (None, Some(countries)) => {
                self.citizenship_ids = countries.iter().map(|c| c.id).collect();
                self.citizenships = countries;
            }
            (None, None) => {}
        }
    }
}

/// A possibly partial identity as returned by profile endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_count: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizenship_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizenships: Option<Vec<Country>>,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub login_count: u32,
    #[serde(default)]
    pub token: Option<String>,
}

impl LoginResponse {
    /// Identity as known at the moment of authentication. Fields the login
    /// response does not carry are filled by the next refresh.
    pub fn to_identity(&self, now: DateTime<Utc>) -> Identity {
        Identity {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            gender: self.gender,
            date_of_birth: None,
            is_verified: self.is_verified,
            login_count: self.login_count,
            created_at: now,
            citizenship_ids: Vec::new(),
            citizenships: Vec::new(),
        }
    }

    /// The server reports a login counter of exactly one on the first login.
    pub fn is_first_login(&self) -> bool {
        self.login_count == 1
    }
}

/// `POST /auth/register` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub citizenship_ids: Vec<i64>,
}

/// `PUT /auth/password-reset` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub email: String,
    pub reset_code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
struct CountryRef {
    id: i64,
}

/// `PUT /profile` body, built from a patch plus the cached identity id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    citizenships: Option<Vec<CountryRef>>,
}

impl ProfileUpdate {
    pub fn new(user_id: i64, patch: IdentityPatch) -> Self {
        let citizenships = match (patch.citizenship_ids, patch.citizenships) {
            (Some(ids), _) => Some(ids.into_iter().map(|id| CountryRef { id }).collect()),
            (None, Some(countries)) => {
                Some(countries.into_iter().map(|c| CountryRef { id: c.id }).collect())
            }
            (None, None) => None,
        };
        Self {
            user_id,
            first_name: patch.first_name,
            last_name: patch.last_name,
            email: patch.email,
            gender: patch.gender,
            dob: patch.date_of_birth.or(patch.dob),
            citizenships,
        }
    }
}

/// `DELETE /auth/account` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletion {
    pub user_id: i64,
    pub current_password: String,
}

/// `GET /auth/check-user` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserLookup {
    pub exists: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: 7,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            gender: None,
            date_of_birth: None,
            is_verified: false,
            login_count: 1,
            created_at: Utc::now(),
            citizenship_ids: vec![3],
            citizenships: vec![],
        }
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let mut cached = identity();
        let patch: IdentityPatch =
            serde_json::from_value(serde_json::json!({"id": 7, "isVerified": true, "dob": "1990-01-02"}))
                .unwrap();
        cached.merge(patch);

        assert!(cached.is_verified);
        assert_eq!(cached.date_of_birth.as_deref(), Some("1990-01-02"));
        assert_eq!(cached.first_name, "Ada");
        assert_eq!(cached.email, "ada@example.com");
        assert_eq!(cached.citizenship_ids, vec![3]);
    }

    #[test]
    fn merge_derives_ids_from_country_objects() {
        let mut cached = identity();
        cached.citizenship_ids.clear();
        cached.merge(IdentityPatch {
            citizenships: Some(vec![Country {
                id: 12,
                name: "Jamaica".into(),
                country_code: "JM".into(),
                continent_id: None,
            }]),
            ..Default::default()
        });
        assert_eq!(cached.citizenship_ids, vec![12]);
        assert_eq!(cached.citizenships[0].name, "Jamaica");
    }

    #[test]
    fn login_response_first_login() {
        let resp: LoginResponse = serde_json::from_value(serde_json::json!({
            "id": 1, "firstName": "A", "lastName": "B", "email": "a@b.co",
            "isVerified": true, "loginCount": 1
        }))
        .unwrap();
        assert!(resp.is_first_login());
        assert!(resp.token.is_none());
        let identity = resp.to_identity(Utc::now());
        assert_eq!(identity.login_count, 1);
        assert!(identity.is_verified);
    }

    #[test]
    fn profile_update_wire_shape() {
        let update = ProfileUpdate::new(
            9,
            IdentityPatch {
                first_name: Some("Grace".into()),
                citizenship_ids: Some(vec![1, 4]),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"userId": 9, "firstName": "Grace", "citizenships": [{"id": 1}, {"id": 4}]})
        );
    }
}
