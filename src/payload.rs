//! Request bodies and headers for each [`Action`].
//!
//! The [`PayloadBuilder`] is a pure data builder: it never performs I/O, it only
//! describes the request a [`Transport`](../client/trait.Transport.html) should send.

use http::Method;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::json;

use crate::action::Action;
use crate::config::GanderConfiguration;

/// Default path prefix of the user API.
pub const DEFAULT_USERS_PATH: &str = "/api/users";

/// Name given to every user created by the load test.
const CREATE_NAME: &str = "LoadTestUser";
/// Name written by every update.
const UPDATE_NAME: &str = "UpdatedName";
/// Role given to every user created by the load test.
const CREATE_ROLE: &str = "ADMIN";
/// Secret phrase shared by created and updated users.
const SECRET_PHRASE: &str = "secret-xyz";

/// Everything needed to issue one request against the user API.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestPlan {
    /// The action this request performs.
    pub action: Action,
    /// The identifier (email) the request targets.
    pub identifier: String,
    /// The HTTP method.
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    /// The path, relative to the configured host.
    pub path: String,
    /// Query parameters appended to the path.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
    /// Optional value for the `Authorization` header.
    #[serde(skip)]
    pub authorization: Option<String>,
}
impl RequestPlan {
    /// A short name grouping requests in logs, ie `GET /api/users/get-by-email`.
    pub fn name(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

fn serialize_method<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(method.as_str())
}

/// Builds [`RequestPlan`]s for each [`Action`].
#[derive(Clone, Debug)]
pub struct PayloadBuilder {
    users_path: String,
    authorization: Option<String>,
    update_requires_auth: bool,
}
impl PayloadBuilder {
    /// Create a builder for the user API found under `users_path`.
    ///
    /// The `token` is sent as a bearer token, a `Bearer ` prefix is added if missing.
    ///
    /// # Example
    /// ```rust
    /// use gander::action::Action;
    /// use gander::payload::PayloadBuilder;
    ///
    /// let builder = PayloadBuilder::new("/api/users", Some("abc123"));
    /// let plan = builder.build(Action::Delete, "write_a1b2@test.com");
    /// assert_eq!(plan.path, "/api/users");
    /// assert_eq!(plan.authorization.as_deref(), Some("Bearer abc123"));
    /// ```
    pub fn new(users_path: &str, token: Option<&str>) -> Self {
        let authorization = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                if t.starts_with("Bearer ") {
                    t.to_string()
                } else {
                    format!("Bearer {}", t)
                }
            });
        PayloadBuilder {
            users_path: users_path.trim_end_matches('/').to_string(),
            authorization,
            update_requires_auth: true,
        }
    }

    /// Build a payload builder from a configured load test.
    pub fn from_configuration(configuration: &GanderConfiguration) -> Self {
        let token = if configuration.token.is_empty() {
            None
        } else {
            Some(configuration.token.as_str())
        };
        PayloadBuilder::new(&configuration.users_path, token)
            .set_update_requires_auth(!configuration.update_without_auth)
    }

    /// Controls whether UPDATE requests carry the bearer token (default: true).
    pub fn set_update_requires_auth(mut self, required: bool) -> Self {
        self.update_requires_auth = required;
        self
    }

    /// Whether the given action is sent with the bearer token.
    pub fn requires_auth(&self, action: Action) -> bool {
        match action {
            Action::Update => self.update_requires_auth,
            Action::Read | Action::Create | Action::Delete => true,
        }
    }

    /// Describe the request that performs `action` against `identifier`.
    pub fn build(&self, action: Action, identifier: &str) -> RequestPlan {
        let (path, query, body) = match action {
            Action::Read => (
                format!("{}/get-by-email", self.users_path),
                vec![("email".to_string(), identifier.to_string())],
                None,
            ),
            Action::Update => (
                format!("{}/update", self.users_path),
                Vec::new(),
                Some(json!({
                    "name": UPDATE_NAME,
                    "oldEmail": identifier,
                    "newPassword": generate_password(),
                    "secretPhrase": SECRET_PHRASE,
                })),
            ),
            Action::Create => (self.users_path.clone(), Vec::new(), Some(create_body(identifier))),
            Action::Delete => (
                self.users_path.clone(),
                Vec::new(),
                Some(json!({ "email": identifier })),
            ),
        };

        let authorization = if self.requires_auth(action) {
            self.authorization.clone()
        } else {
            None
        };

        RequestPlan {
            action,
            identifier: identifier.to_string(),
            method: action.method(),
            path,
            query,
            body,
            authorization,
        }
    }
}

fn create_body(email: &str) -> serde_json::Value {
    json!({
        "name": CREATE_NAME,
        "email": email,
        "role": CREATE_ROLE,
        "password": generate_password(),
        "secretPhrase": SECRET_PHRASE,
    })
}

fn random_suffix(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Generate a fresh email-like identifier tagged with `prefix`.
///
/// # Example
/// ```rust
/// use gander::payload::generate_identifier;
///
/// let email = generate_identifier("create");
/// assert!(email.starts_with("create_"));
/// assert!(email.ends_with("@test.com"));
/// ```
pub fn generate_identifier(prefix: &str) -> String {
    format!("{}_{}@test.com", prefix, random_suffix(10))
}

// Passwords must contain upper and lower case letters, a digit and a symbol.
fn generate_password() -> String {
    format!("P@{}9x", random_suffix(10))
}
