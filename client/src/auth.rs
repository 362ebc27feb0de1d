use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, TransportError};

pub const DEFAULT_LOGIN_URL: &str = "https://play.pokemonshowdown.com/api/login";

const LOGIN_RETRIES: usize = 3;

/// Username and password for a registered account
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Exchange credentials and a challstr for a login assertion.
///
/// Transport failures are retried a few times; an explicit rejection from
/// the login server is returned at once.
pub async fn get_assertion(
    login_url: &str,
    credentials: &Credentials,
    challstr: &str,
) -> Result<String> {
    let client = reqwest::Client::new();
    let params = [
        ("name", credentials.username.as_str()),
        ("pass", credentials.password.as_str()),
        ("challstr", challstr),
    ];

    let mut last_error = String::new();
    for attempt in 1..=LOGIN_RETRIES {
        let body = match client.post(login_url).form(&params).send().await {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };
        match body {
            Ok(text) => return parse_login_response(&text),
            Err(e) => {
                warn!(attempt, error = %e, "Login request failed");
                last_error = e.to_string();
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }
    }

    Err(TransportError::ConnectionLost(format!(
        "login server unreachable: {}",
        last_error
    )))
}

/// Pull the assertion out of a login response body.
///
/// The body is JSON prefixed with `]`. A rejected login comes back as an
/// assertion starting with `;;` followed by the reason.
pub fn parse_login_response(body: &str) -> Result<String> {
    let json_str = body.trim_start_matches(']');
    let json: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        TransportError::AuthenticationRejected(format!("unreadable login response: {}", e))
    })?;

    let assertion = json
        .get("assertion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            TransportError::AuthenticationRejected("login response missing assertion".to_string())
        })?;

    if let Some(reason) = assertion.strip_prefix(";;") {
        return Err(TransportError::AuthenticationRejected(reason.to_string()));
    }
    if assertion.is_empty() {
        return Err(TransportError::AuthenticationRejected(
            "empty assertion".to_string(),
        ));
    }

    debug!("Received login assertion");
    Ok(assertion.to_string())
}
