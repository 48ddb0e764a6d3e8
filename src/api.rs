use std::time::Duration;

use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, ErrorClass, classify_transport};
use crate::session::{REQUEST_ID_HEADER, Session, new_correlation_id};

/// Default retry budget per call.
const DEFAULT_ATTEMPTS: u32 = 5;

/// Linear backoff step: attempt N waits N times this before the next try.
const RETRY_STEP: Duration = Duration::from_secs(3);

/// Messages the service uses when a bearer token has lapsed.
const SESSION_EXPIRED_SENTINELS: [&str; 2] = ["token expired", "invalid token"];

/// Application-level response envelope shared by every endpoint.
/// `code` 0 means success; anything else carries a server message.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Whether the payload signals an expired/invalid session.
    pub fn is_session_expired(&self) -> bool {
        is_session_expired_message(&self.message)
    }
}

fn is_session_expired_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    SESSION_EXPIRED_SENTINELS.iter().any(|s| lower.contains(s))
}

/// Per-call knobs for the request executor.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub max_attempts: u32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
        }
    }
}

/// Today's completion flags as reported by the service. Decoding is lenient:
/// a missing or malformed field reads as "not done".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskStatus {
    pub request_created: bool,
    pub agent_created: bool,
}

/// Identifier returned by the create endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Created {
    pub id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub score: Option<u64>,
}

impl Session {
    /// Issue an authenticated request with retry, re-authentication on
    /// session expiry, and transport reset on network failure.
    ///
    /// At most one re-authentication is triggered per failure event, followed
    /// by exactly one reissue; the re-auth side path never consumes a
    /// main-loop attempt. May silently replace the session's bearer token and
    /// rebuild the transport.
    pub async fn execute<T: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        opts: CallOptions,
    ) -> Result<Envelope<T>, ApiError> {
        let mut last_err = ApiError::Network("no attempt made".to_string());

        for attempt in 1..=opts.max_attempts {
            match self.send_once(method.clone(), path, body).await {
                Ok(envelope) => {
                    if envelope.is_session_expired() {
                        return self.reauthenticate_and_reissue(method, path, body).await;
                    }
                    return Ok(envelope);
                }
                Err(ApiError::Http(status)) if matches!(status, 401 | 403) => {
                    return self.reauthenticate_and_reissue(method, path, body).await;
                }
                Err(err) => {
                    if matches!(err, ApiError::Network(_)) {
                        if let Err(reset) = self.reset_transport() {
                            warn!("[{}] transport reset failed: {reset}", self.account.label());
                        }
                    }
                    warn!(
                        "[{}] {method} {path} attempt {attempt}/{} failed: {err}",
                        self.account.label(),
                        opts.max_attempts,
                    );
                    last_err = err;
                }
            }

            if attempt < opts.max_attempts {
                tokio::time::sleep(RETRY_STEP * attempt).await;
            }
        }

        Err(last_err)
    }

    /// One re-authentication followed by exactly one reissue. A failure on
    /// either leg fails the whole operation immediately; a still-expired
    /// payload after the reissue is a hard error, not another loop.
    async fn reauthenticate_and_reissue<T: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Envelope<T>, ApiError> {
        debug!("[{}] session expired, re-authenticating", self.account.label());
        self.authenticate().await?;
        let envelope = self.send_once(method, path, body).await?;
        if envelope.is_session_expired() {
            return Err(ApiError::SessionExpired);
        }
        Ok(envelope)
    }

    /// A single attempt: fresh correlation id, bearer token if held, decoded
    /// envelope.
    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Envelope<T>, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .header(REQUEST_ID_HEADER, new_correlation_id());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            match classify_transport(&e) {
                ErrorClass::Auth => {
                    ApiError::Http(e.status().map(|s| s.as_u16()).unwrap_or(401))
                }
                // reqwest send failures without a status are connection-level
                ErrorClass::Network | ErrorClass::Other => ApiError::Network(e.to_string()),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }

        response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))
    }

    /// Fetch today's completion flags. Server state is authoritative, so this
    /// is re-fetched at every cycle start and never cached.
    pub async fn verify_status(&mut self) -> Result<TaskStatus, ApiError> {
        let path = self.endpoints.verify_status.clone();
        let envelope: Envelope<TaskStatus> = self
            .execute(Method::GET, &path, None, CallOptions::default())
            .await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Create a request post. The caller inspects the envelope: only a zero
    /// code together with an id warrants an on-chain proof.
    pub async fn create_request(
        &mut self,
        title: &str,
        content: &str,
    ) -> Result<Envelope<Created>, ApiError> {
        let path = self.endpoints.create_request.clone();
        let body = serde_json::json!({ "title": title, "content": content });
        self.execute(Method::POST, &path, Some(&body), CallOptions::default())
            .await
    }

    /// Create an agent. Same contract as `create_request` with a different
    /// payload shape.
    pub async fn create_agent(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<Envelope<Created>, ApiError> {
        let path = self.endpoints.create_agent.clone();
        let body = serde_json::json!({ "name": name, "description": description });
        self.execute(Method::POST, &path, Some(&body), CallOptions::default())
            .await
    }

    /// Fetch the account's profile, including the quest score.
    pub async fn user_info(&mut self) -> Result<Envelope<UserInfo>, ApiError> {
        let path = self.endpoints.user_info.clone();
        self.execute(Method::GET, &path, None, CallOptions::default())
            .await
    }
}

/// Best-effort score extraction: prefer the structured field, then fall back
/// to the first integer in the server's free-text message. Some deployments
/// only echo the score there ("Current score: 1200").
pub fn extract_score(envelope: &Envelope<UserInfo>) -> Option<u64> {
    if let Some(score) = envelope.data.as_ref().and_then(|d| d.score) {
        return Some(score);
    }
    let re = Regex::new(r"\d+").ok()?;
    re.find(&envelope.message)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_from(json: &str) -> Envelope<UserInfo> {
        serde_json::from_str(json).expect("valid envelope JSON")
    }

    // ── envelope & sentinels ───────────────────────────────────────

    #[test]
    fn zero_code_is_success() {
        let env: Envelope<Created> = serde_json::from_str(r#"{"code":0,"data":{"id":42}}"#).unwrap();
        assert!(env.is_success());
        assert_eq!(env.data.unwrap().id, Some(42));
    }

    #[test]
    fn missing_fields_decode_leniently() {
        let env: Envelope<Created> = serde_json::from_str(r#"{}"#).unwrap();
        assert!(env.is_success()); // code defaults to 0
        assert!(env.data.is_none());
        assert!(env.message.is_empty());
    }

    #[test]
    fn expiry_sentinels_match_case_insensitively() {
        assert!(is_session_expired_message("Token Expired"));
        assert!(is_session_expired_message("error: invalid token supplied"));
        assert!(is_session_expired_message("AUTH TOKEN EXPIRED, please re-login"));
        assert!(!is_session_expired_message("rate limit exceeded"));
        assert!(!is_session_expired_message(""));
    }

    #[test]
    fn expired_envelope_is_detected() {
        let env = envelope_from(r#"{"code":1401,"message":"token expired"}"#);
        assert!(env.is_session_expired());
        assert!(!env.is_success());
    }

    // ── task status leniency ───────────────────────────────────────

    #[test]
    fn task_status_missing_fields_read_not_done() {
        let status: TaskStatus = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!status.request_created);
        assert!(!status.agent_created);

        let status: TaskStatus =
            serde_json::from_str(r#"{"requestCreated":true}"#).unwrap();
        assert!(status.request_created);
        assert!(!status.agent_created);
    }

    // ── score extraction ───────────────────────────────────────────

    #[test]
    fn score_prefers_structured_field() {
        let env = envelope_from(r#"{"code":0,"message":"score is 999","data":{"score":1200}}"#);
        assert_eq!(extract_score(&env), Some(1200));
    }

    #[test]
    fn score_falls_back_to_message() {
        let env = envelope_from(r#"{"code":0,"message":"Current score: 450 points","data":{}}"#);
        assert_eq!(extract_score(&env), Some(450));
    }

    #[test]
    fn score_absent_everywhere_is_none() {
        let env = envelope_from(r#"{"code":0,"message":"welcome back","data":{}}"#);
        assert_eq!(extract_score(&env), None);
    }

    #[test]
    fn default_call_options_budget() {
        assert_eq!(CallOptions::default().max_attempts, 5);
    }
}
