//! Login exchange models.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/login`.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful login response.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}
