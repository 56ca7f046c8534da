use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::auth::{AccessToken, TokenResponse};
use crate::config::{credentials_path, load_config};
use crate::credentials::{CredentialMode, OAuth2Credentials, acquire};
use crate::error::{ApiErrorResponse, OAuthErrorResponse, format_api_error, format_oauth_error};
use crate::expression::{Expr, LonLat};
use crate::util::{backoff, compute_url, initial_sleep, retriable_status};

const QUOTA_PROJECT_HEADER: &str = "x-goog-user-project";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://earthengine.googleapis.com`.
    pub url: String,
    /// Cloud project the computations run under. Falls back to the quota
    /// project of the credentials when unset.
    pub project: Option<String>,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

/// An authorized connection to the Earth Engine REST API.
pub struct Session {
    url: String,
    project: String,
    quota_project: String,
    credentials: OAuth2Credentials,
    token: Mutex<Option<AccessToken>>,

    timeout: Duration,
    retry_max: usize,
    sleep_max: Duration,
    progress: bool,

    http: HttpClient,
}

#[derive(Debug, serde::Deserialize)]
struct ComputeReply {
    #[serde(default)]
    result: Value,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url)
            .field("project", &self.project)
            .field("credentials", &self.credentials)
            .field("retry_max", &self.retry_max)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session from the ambient credential file and environment.
    ///
    /// Equivalent to Python: `ee.Initialize()`.
    pub fn from_env() -> Result<Self> {
        let path = credentials_path(None)?;
        let credentials = acquire(CredentialMode::Ambient, &path)?;
        let session = Self::new(credentials, load_config(None, None, None))?;
        session.initialize()?;
        Ok(session)
    }

    /// Builds a session without contacting the service.
    pub fn new(credentials: OAuth2Credentials, cfg: ClientConfig) -> Result<Self> {
        let project = cfg
            .project
            .or_else(|| credentials.quota_project_id.clone())
            .ok_or_else(|| {
                anyhow!(
                    "Missing configuration: project (set EARTHENGINE_PROJECT, pass --project, or add `project` to the credentials)"
                )
            })?;
        let quota_project = credentials
            .quota_project_id
            .clone()
            .unwrap_or_else(|| project.clone());

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("eesmoke/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("eesmoke")),
        );

        let mut builder = HttpClient::builder().default_headers(default_headers);
        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            url: cfg.url,
            project,
            quota_project,
            credentials,
            token: Mutex::new(None),
            timeout: Duration::from_secs(60),
            retry_max: 5,
            sleep_max: Duration::from_secs(30),
            progress: true,
            http,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_max(mut self, retry_max: usize) -> Self {
        self.retry_max = retry_max.max(1);
        self
    }

    pub fn with_sleep_max(mut self, sleep_max: Duration) -> Self {
        self.sleep_max = sleep_max;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Exchanges the refresh token for an access token.
    ///
    /// Later calls reuse the cached token until it nears expiry.
    pub fn initialize(&self) -> Result<()> {
        let token = self.fetch_token()?;
        *self.token_cache()? = Some(token);
        tracing::info!(project = %self.project, "session initialized");
        Ok(())
    }

    /// Evaluates `expr` remotely and returns its `result`.
    pub fn compute_value(&self, expr: &Expr) -> Result<Value> {
        let url = compute_url(&self.url, &self.project);
        let body = json!({ "expression": expr.encode() });

        let spinner = self.spinner("Computing value");
        let reply = self.api_json::<Value, ComputeReply>(&url, &body);
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        Ok(reply?.result)
    }

    /// Sends `text` to the server and returns what it evaluates to.
    ///
    /// Equivalent to Python: `ee.String(text).getInfo()`.
    pub fn echo(&self, text: &str) -> Result<String> {
        match self.compute_value(&Expr::constant(text))? {
            Value::String(s) => Ok(s),
            other => bail!("echo returned a non-string value: {}", other),
        }
    }

    /// Reads `band` of `dataset` at `at`, sampled at `scale` metres.
    ///
    /// Equivalent to Python:
    /// `ee.Image(dataset).sample(ee.Geometry.Point([lon, lat]), scale).first().get(band).getInfo()`.
    pub fn sample_point(&self, dataset: &str, at: LonLat, scale: f64, band: &str) -> Result<f64> {
        let expr = Expr::point_sample(dataset, at, scale, band);
        match self.compute_value(&expr)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| anyhow!("sample returned a non-finite number: {}", n)),
            Value::Null => bail!(
                "sample of {} at ({}, {}) returned no value for band `{}`",
                dataset,
                at.lon,
                at.lat,
                band
            ),
            other => bail!("sample returned a non-numeric value: {}", other),
        }
    }

    fn token_cache(&self) -> Result<std::sync::MutexGuard<'_, Option<AccessToken>>> {
        self.token
            .lock()
            .map_err(|_| anyhow!("access token cache is poisoned"))
    }

    fn access_token(&self) -> Result<String> {
        let mut cache = self.token_cache()?;
        if let Some(token) = cache.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
            tracing::debug!("access token near expiry; refreshing");
        }
        let token = self.fetch_token()?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    fn fetch_token(&self) -> Result<AccessToken> {
        let creds = &self.credentials;
        let scope = creds.scopes.join(" ");
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("refresh_token", creds.refresh_token.as_str()),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        tracing::debug!(token_uri = %creds.token_uri, "refreshing access token");
        let issued_at = Instant::now();
        let resp = self.robust_request(|| {
            self.http
                .post(&creds.token_uri)
                .timeout(self.timeout)
                .form(&form)
                .send()
        })?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            if let Ok(err_json) = serde_json::from_str::<OAuthErrorResponse>(&text) {
                return Err(format_oauth_error(status, &err_json));
            }
            bail!(
                "Token refresh failed: HTTP {} for url ({})\n{}",
                status,
                creds.token_uri,
                text
            );
        }

        let body: TokenResponse = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse token response (url={})", creds.token_uri))?;
        AccessToken::from_response(body, issued_at)
    }

    fn api_json<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        url: &str,
        request: &TReq,
    ) -> Result<TResp> {
        let mut reauthorized = false;
        loop {
            let token = self.access_token()?;
            let resp = self.robust_request(|| {
                self.http
                    .post(url)
                    .timeout(self.timeout)
                    .bearer_auth(&token)
                    .header(QUOTA_PROJECT_HEADER, &self.quota_project)
                    .json(request)
                    .send()
            })?;

            let status = resp.status();
            let text = resp.text().unwrap_or_default();

            if status == StatusCode::UNAUTHORIZED && !reauthorized {
                tracing::warn!("access token rejected; refreshing once");
                *self.token_cache()? = None;
                reauthorized = true;
                continue;
            }

            if !status.is_success() {
                // Try to parse Google error payloads for actionable messages.
                if let Ok(err_json) = serde_json::from_str::<ApiErrorResponse>(&text) {
                    return Err(format_api_error(status, url, &err_json));
                }

                bail!(
                    "API request failed: HTTP {} for url ({})\n{}",
                    status,
                    url,
                    text
                );
            }

            return serde_json::from_str::<TResp>(&text).with_context(|| {
                format!("failed to parse API JSON (url={}, status={})", url, status)
            });
        }
    }

    fn robust_request<F>(&self, mut f: F) -> Result<Response>
    where
        F: FnMut() -> std::result::Result<Response, reqwest::Error>,
    {
        let mut tries = 0usize;
        let mut sleep = initial_sleep(self.sleep_max);
        loop {
            match f() {
                Ok(resp) => {
                    let status = resp.status();
                    if retriable_status(status.as_u16()) {
                        tries += 1;
                        if tries >= self.retry_max {
                            return Ok(resp);
                        }
                        tracing::warn!(%status, attempt = tries, "transient HTTP status; retrying");
                        thread::sleep(sleep);
                        sleep = backoff(sleep, self.sleep_max);
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if err.is_builder() {
                        return Err(err).context("invalid request (check project and URL settings)");
                    }
                    // only timeouts / transient connection errors are retried
                    if !(err.is_timeout() || err.is_connect() || err.is_request()) {
                        return Err(err).context("request failed");
                    }
                    tries += 1;
                    if tries >= self.retry_max {
                        return Err(err).context("could not connect");
                    }
                    tracing::warn!(error = %err, attempt = tries, "request failed; retrying");
                    thread::sleep(sleep);
                    sleep = backoff(sleep, self.sleep_max);
                }
            }
        }
    }

    fn spinner(&self, message: &'static str) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}
