//! Quartermaster platform API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod claims;
pub mod http;
pub mod session;

pub use http::QuartermasterClient;
pub use session::FileSessionStore;

/// Quartermaster platform API trait
#[async_trait]
pub trait QuartermasterApi: Send + Sync {
    /// Establish a session. Credential presentation (the mutual-TLS client
    /// certificate) happens at the transport layer; on success the returned
    /// token pair is persisted.
    async fn login(&self) -> Result<AuthUser>;

    /// Notify the platform and clear the local session. The local session is
    /// cleared even when the server call fails.
    async fn logout(&self) -> Result<()>;

    /// Fetch the profile of the authenticated account
    async fn me(&self) -> Result<AuthUser>;

    /// Submit an account registration request
    async fn register(&self, registration: &Registration) -> Result<()>;
}

/// Authenticated account profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Account ID
    pub id: String,

    /// Email address
    pub email: String,

    /// Given name
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// Rank or grade
    #[serde(default)]
    pub rank: Option<String>,

    /// Directorate assignment
    #[serde(default)]
    pub jdir: Option<String>,

    /// Subject DN from the presented client certificate
    #[serde(default)]
    pub subject_name: Option<String>,

    /// Platform role
    #[serde(default)]
    pub role: Option<String>,
}

/// Response returned by `POST /api/auth/login`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: AuthUser,
    pub token: String,
    pub refresh_token: String,
}

/// Account registration request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub rank: String,
    pub jdir: String,
}
