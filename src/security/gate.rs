//! Request gate.
//!
//! Runs in front of every handler, strictly in this order:
//!
//! ```text
//! HeaderAttach → PreflightCheck → PathClassify → AuthCheck → RateCheck → Allow
//!      │               │                │             │            │
//!   CORS +          OPTIONS →        public →      401          429
//!   security        204, done        allow
//! ```
//!
//! Headers computed in an earlier state are kept on every later outcome,
//! rejections included.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::header::{ORIGIN, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::api_keys::{ApiKeyIdentity, ApiKeyValidator, KeyValidation, ValidatorError};
use crate::security::clock::Clock;
use crate::security::headers::{cors_headers, security_headers};
use crate::security::messages::MessageLanguage;
use crate::security::rate_limit::RateLimitStore;

pub static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// The parts of the configuration the gate reads on every request.
/// Swapped as a whole on config reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    pub allowed_origins: Vec<String>,
    pub legacy_api_key: String,
    pub default_rate_limit: u32,
    pub validation_timeout: Duration,
    pub docs_path: String,
    pub key_management_path: String,
    pub language: MessageLanguage,
}

impl GatePolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            allowed_origins: config.cors.allowed_origins.clone(),
            legacy_api_key: config.auth.legacy_api_key.clone(),
            default_rate_limit: config.auth.default_rate_limit,
            validation_timeout: Duration::from_millis(config.auth.validation_timeout_ms),
            docs_path: config.paths.docs_path.clone(),
            key_management_path: config.paths.key_management_path.clone(),
            language: config.auth.message_language,
        }
    }

    /// Keep `current`'s paths and language, which are wired into the router
    /// and key store at startup. Returns whether the revision tried to
    /// change any of them.
    pub fn pin_startup_fields(&mut self, current: &GatePolicy) -> bool {
        let changed = self.docs_path != current.docs_path
            || self.key_management_path != current.key_management_path
            || self.language != current.language;
        self.docs_path.clone_from(&current.docs_path);
        self.key_management_path.clone_from(&current.key_management_path);
        self.language = current.language;
        changed
    }

    pub fn is_docs_path(&self, path: &str) -> bool {
        path.starts_with(&self.docs_path)
    }

    pub fn classify(&self, path: &str) -> PathClass {
        let exact = matches!(path, "/" | "/health" | "/db") || path == self.docs_path;
        if exact || self.is_docs_path(path) || path.starts_with(&self.key_management_path) {
            PathClass::Public
        } else {
            PathClass::Private
        }
    }

    fn is_legacy_key(&self, presented: &str) -> bool {
        !self.legacy_api_key.is_empty() && presented == self.legacy_api_key
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    Private,
}

/// Who is calling a private endpoint. Inserted into request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerContext {
    Identified {
        key_id: String,
        name: String,
        quota: u32,
    },
    /// Authenticated with the shared legacy key; no identity, no quota.
    Legacy,
}

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Missing API key. Header: X-API-Key")]
    MissingKey,
    #[error("{reason}")]
    InvalidKey { reason: String },
    #[error("Limit of {limit} req/min reached")]
    QuotaExceeded { limit: u32, retry_after_secs: u64 },
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::MissingKey | GateError::InvalidKey { .. } => StatusCode::UNAUTHORIZED,
            GateError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn label(&self, language: MessageLanguage) -> &'static str {
        match self {
            GateError::MissingKey | GateError::InvalidKey { .. } => language.unauthorized(),
            GateError::QuotaExceeded { .. } => language.rate_limited(),
        }
    }

    /// Client-facing message. `Display` stays English for logs.
    pub fn message(&self, language: MessageLanguage) -> String {
        match self {
            GateError::MissingKey => language.missing_key().to_string(),
            GateError::InvalidKey { reason } => reason.clone(),
            GateError::QuotaExceeded { limit, .. } => language.quota_exceeded(*limit),
        }
    }

    /// JSON rejection with texts in `language`.
    pub fn into_response_in(self, language: MessageLanguage) -> Response {
        let retry_after = match &self {
            GateError::QuotaExceeded { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            error: self.label(language),
            message: self.message(language),
            retry_after,
        };

        let mut response = (self.status(), Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        self.into_response_in(MessageLanguage::default())
    }
}

#[derive(Debug)]
pub enum GateOutcome {
    Allow { caller: Option<CallerContext> },
    Preflight,
    Reject(GateError),
}

/// The gate's verdict for one request plus the headers it must carry.
#[derive(Debug)]
pub struct GateDecision {
    pub headers: HeaderMap,
    pub outcome: GateOutcome,
    /// Language of the rejection body.
    pub language: MessageLanguage,
}

/// A request the gate let through.
#[derive(Debug)]
pub struct Admitted {
    pub headers: HeaderMap,
    pub caller: Option<CallerContext>,
}

impl GateDecision {
    fn new(headers: HeaderMap, outcome: GateOutcome) -> Self {
        Self {
            headers,
            outcome,
            language: MessageLanguage::default(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self.outcome, GateOutcome::Allow { .. })
    }

    /// Status the gate itself answers with; `None` when a handler decides.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.outcome {
            GateOutcome::Allow { .. } => None,
            GateOutcome::Preflight => Some(StatusCode::NO_CONTENT),
            GateOutcome::Reject(err) => Some(err.status()),
        }
    }

    pub fn label(&self) -> &'static str {
        match &self.outcome {
            GateOutcome::Allow { caller: None } => "public",
            GateOutcome::Allow { caller: Some(CallerContext::Legacy) } => "legacy",
            GateOutcome::Allow { caller: Some(_) } => "allowed",
            GateOutcome::Preflight => "preflight",
            GateOutcome::Reject(GateError::QuotaExceeded { .. }) => "rate_limited",
            GateOutcome::Reject(_) => "unauthenticated",
        }
    }

    /// Split into the admitted request's data, or the finished response.
    pub fn into_result(self) -> Result<Admitted, Response> {
        let mut response = match self.outcome {
            GateOutcome::Allow { caller } => {
                return Ok(Admitted {
                    headers: self.headers,
                    caller,
                })
            }
            GateOutcome::Preflight => StatusCode::NO_CONTENT.into_response(),
            GateOutcome::Reject(err) => err.into_response_in(self.language),
        };
        response.headers_mut().extend(self.headers);
        Err(response)
    }
}

/// Authentication and quota enforcement shared by all requests.
pub struct RequestGate {
    policy: ArcSwap<GatePolicy>,
    validator: Arc<dyn ApiKeyValidator>,
    limiter: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RequestGate {
    pub fn new(
        policy: GatePolicy,
        validator: Arc<dyn ApiKeyValidator>,
        limiter: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            validator,
            limiter,
            clock,
        }
    }

    pub fn policy(&self) -> Arc<GatePolicy> {
        self.policy.load_full()
    }

    /// Replace the policy for subsequent requests. Rate-limit state is kept.
    pub fn update_policy(&self, policy: GatePolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn validator(&self) -> &Arc<dyn ApiKeyValidator> {
        &self.validator
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimitStore> {
        &self.limiter
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Decide what happens to a request.
    pub async fn evaluate(&self, method: &Method, path: &str, headers: &HeaderMap) -> GateDecision {
        let policy = self.policy.load_full();
        let mut decision = self.decide(&policy, method, path, headers).await;
        decision.language = policy.language;
        decision
    }

    async fn decide(
        &self,
        policy: &GatePolicy,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> GateDecision {
        let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
        let mut out = cors_headers(origin, &policy.allowed_origins);
        out.extend(security_headers(policy.is_docs_path(path)));

        if method == Method::OPTIONS {
            return GateDecision::new(out, GateOutcome::Preflight);
        }

        if policy.classify(path) == PathClass::Public {
            return GateDecision::new(out, GateOutcome::Allow { caller: None });
        }

        let presented = match headers.get(&X_API_KEY) {
            None => return reject(out, GateError::MissingKey),
            Some(v) if v.is_empty() => return reject(out, GateError::MissingKey),
            Some(v) => match v.to_str() {
                Ok(key) => key,
                Err(_) => return reject(out, invalid_key(String::new(), policy.language)),
            },
        };

        match self.lookup(policy, presented).await {
            Ok(KeyValidation::Valid(identity)) => self.enforce_quota(policy, identity, out),
            Ok(KeyValidation::Invalid { reason }) => {
                if policy.is_legacy_key(presented) {
                    return admit_legacy(out, path);
                }
                tracing::debug!(path = %path, reason = %reason, "Rejected invalid API key");
                reject(out, invalid_key(reason, policy.language))
            }
            Err(e) => {
                metrics::record_validator_failure();
                if policy.is_legacy_key(presented) {
                    return admit_legacy(out, path);
                }
                tracing::warn!(path = %path, error = %e, "API key lookup failed, rejecting");
                reject(out, invalid_key(String::new(), policy.language))
            }
        }
    }

    async fn lookup(&self, policy: &GatePolicy, key: &str) -> Result<KeyValidation, ValidatorError> {
        tokio::time::timeout(policy.validation_timeout, self.validator.validate(key))
            .await
            .unwrap_or(Err(ValidatorError::Timeout(policy.validation_timeout)))
    }

    fn enforce_quota(
        &self,
        policy: &GatePolicy,
        identity: ApiKeyIdentity,
        mut headers: HeaderMap,
    ) -> GateDecision {
        let quota = identity.quota_or(policy.default_rate_limit);
        let now = self.clock.now_millis();

        let check = self.limiter.check_and_consume(&identity.id, quota, now);
        self.limiter
            .headers_for(&identity.id, quota, now)
            .apply(&mut headers);

        if !check.allowed {
            let retry_after_secs = check.retry_after_secs(now);
            tracing::warn!(
                key_id = %identity.id,
                quota,
                attempts = check.count,
                retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            return reject(
                headers,
                GateError::QuotaExceeded {
                    limit: quota,
                    retry_after_secs,
                },
            );
        }

        GateDecision::new(
            headers,
            GateOutcome::Allow {
                caller: Some(CallerContext::Identified {
                    key_id: identity.id,
                    name: identity.name,
                    quota,
                }),
            },
        )
    }
}

fn reject(headers: HeaderMap, err: GateError) -> GateDecision {
    GateDecision::new(headers, GateOutcome::Reject(err))
}

fn invalid_key(reason: String, language: MessageLanguage) -> GateError {
    let reason = if reason.is_empty() {
        language.invalid_key().to_string()
    } else {
        reason
    };
    GateError::InvalidKey { reason }
}

fn admit_legacy(headers: HeaderMap, path: &str) -> GateDecision {
    tracing::warn!(path = %path, "Request admitted with legacy shared API key");
    metrics::record_legacy_key();
    GateDecision::new(
        headers,
        GateOutcome::Allow {
            caller: Some(CallerContext::Legacy),
        },
    )
}
