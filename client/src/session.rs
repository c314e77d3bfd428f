//! Router session client
//!
//! Runs the handshake on demand, sends encrypted command frames and
//! transparently re-authenticates once when the router drops the session.
//!
//! Handshake:
//! 1. `POST /cgi/getParm` -> RSA modulus/exponent and sequence
//! 2. generate the AES session key
//! 3. `POST /cgi/login?data=..&sign=..` with `login\npassword`
//! 4. session id from `Set-Cookie: JSESSIONID=..`
//! 5. `GET /` with the cookie -> `var token=".."`
//!
//! Command execution is serialized per client: the session lock is held for
//! the whole request, including any reconnect and replay.

use crate::error::{ClientError, Result};
use crate::handshake::{
    extract_session_id, extract_token_id, login_query, parse_encryption_params, session_cookie,
};
use mr600_crypto::EncryptionManager;
use mr600_protocol::{Batch, Command, Method, ResponsePayload, coerce_types, controller, frame};
use mr600_transport::{
    HttpRequest, HttpResponse, HttpTransport, HttpTransportConfig, SharedTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// Status the router answers on `/cgi_gdpr` once the cookie/token pair is stale
pub const SESSION_EXPIRED_STATUS: u16 = 500;

const GET_PARM_PATH: &str = "/cgi/getParm";
const LOGIN_PATH: &str = "/cgi/login";
const HOME_PATH: &str = "/";
const COMMAND_PATH: &str = "/cgi_gdpr";

/// Retry policy for the unauthenticated handshake requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub retries: u32,
    /// Delay before the first retry; doubles each time, plus up to one unit of jitter
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = base.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp.saturating_add(fastrand::u64(0..base)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Where and how to log in
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Router base URL, e.g. `http://192.168.1.1`
    pub base_url: String,
    pub login: String,
    pub password: String,
    pub retry: RetryPolicy,
}

impl SessionConfig {
    pub fn new(
        base_url: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            login: login.into(),
            password: password.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    HandshakeInFlight,
    Authenticated,
}

/// Session cookie and token, always obtained together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub session_id: String,
    pub token_id: String,
}

struct Session {
    state: SessionState,
    credentials: Option<SessionCredentials>,
    encryption: Option<EncryptionManager>,
}

impl Session {
    fn disconnected() -> Self {
        Self {
            state: SessionState::Disconnected,
            credentials: None,
            encryption: None,
        }
    }

    fn reset(&mut self) {
        *self = Self::disconnected();
    }

    fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

/// Client for the router's encrypted command protocol
pub struct SessionClient {
    config: SessionConfig,
    transport: SharedTransport,
    session: Mutex<Session>,
}

impl SessionClient {
    pub fn new(config: SessionConfig, transport: SharedTransport) -> Self {
        Self {
            config,
            transport,
            session: Mutex::new(Session::disconnected()),
        }
    }

    /// Client over a fresh reqwest transport
    pub fn with_http(config: SessionConfig, http: HttpTransportConfig) -> Result<Self> {
        let transport = HttpTransport::new(http)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    pub async fn credentials(&self) -> Option<SessionCredentials> {
        self.session.lock().await.credentials.clone()
    }

    /// Run a fresh handshake, replacing any current session
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.handshake(&mut session).await
    }

    /// Log out if a session is open. The client may be reused afterwards;
    /// the next `execute` logs in again.
    ///
    /// Sends nothing when no session is open.
    pub async fn disconnect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.is_authenticated() {
            debug!("Disconnect requested without an open session");
            return Ok(());
        }

        let logout = frame::encode(&[Command::new(Method::Cgi, controller::CGI_LOGOUT)]);
        let result = self.execute_locked(&mut session, &logout, true).await;
        session.reset();
        result?;

        info!("Logged out of {}", self.config.base_url);
        Ok(())
    }

    /// Execute a command or batch, reconnecting once if the session expired
    pub async fn execute(&self, request: impl Into<Batch>) -> Result<ResponsePayload> {
        self.execute_with(request, true).await
    }

    /// Execute with explicit control over the single reconnect-and-replay
    pub async fn execute_with(
        &self,
        request: impl Into<Batch>,
        allow_reconnect: bool,
    ) -> Result<ResponsePayload> {
        let batch = request.into();
        if batch.is_empty() {
            return Err(ClientError::InvalidArgument("empty command batch".into()));
        }
        let request = frame::encode(batch.commands());

        let mut session = self.session.lock().await;
        self.execute_locked(&mut session, &request, allow_reconnect)
            .await
    }

    async fn execute_locked(
        &self,
        session: &mut Session,
        request: &str,
        mut allow_reconnect: bool,
    ) -> Result<ResponsePayload> {
        loop {
            if !session.is_authenticated() {
                self.handshake(session).await?;
            }

            match self.send_frame(session, request).await {
                Err(ClientError::SessionExpired { status }) => {
                    session.reset();
                    if !allow_reconnect {
                        return Err(ClientError::SessionExpired { status });
                    }
                    warn!("Session expired (HTTP {}), reconnecting", status);
                    allow_reconnect = false;
                }
                other => return other,
            }
        }
    }

    async fn send_frame(&self, session: &Session, text: &str) -> Result<ResponsePayload> {
        let (Some(encryption), Some(credentials)) = (&session.encryption, &session.credentials)
        else {
            return Err(ClientError::Authentication("no open session".into()));
        };

        trace!("Sending frame: {:?}", text);
        let payload = encryption.encrypt_command(text)?;
        let body = format!("sign={}\r\ndata={}\r\n", payload.sign, payload.data);

        let request = HttpRequest::post(self.url(COMMAND_PATH))
            .header("Referer", self.config.base_url.as_str())
            .header("Cookie", session_cookie(&credentials.session_id))
            .header("TokenID", credentials.token_id.as_str())
            .header("Content-Type", "text/plain")
            .body(body);

        let response = self.transport.send(request).await?;
        if response.status == SESSION_EXPIRED_STATUS {
            return Err(ClientError::SessionExpired {
                status: response.status,
            });
        }
        if !response.is_success() {
            return Err(ClientError::UnexpectedStatus {
                endpoint: COMMAND_PATH,
                status: response.status,
            });
        }

        let plaintext = encryption.decrypt_response(&response.body)?;
        trace!("Received frame: {:?}", plaintext);

        let payload = frame::decode(&plaintext)?;
        debug!(
            "Router answered error={} with {} record(s)",
            payload.error_code,
            payload.records.len()
        );
        Ok(coerce_types(payload))
    }

    async fn handshake(&self, session: &mut Session) -> Result<()> {
        session.reset();
        session.state = SessionState::HandshakeInFlight;

        match self.run_handshake().await {
            Ok((encryption, credentials)) => {
                session.encryption = Some(encryption);
                session.credentials = Some(credentials);
                session.state = SessionState::Authenticated;
                info!("Connected to {}", self.config.base_url);
                Ok(())
            }
            Err(e) => {
                session.reset();
                warn!("Handshake with {} failed: {}", self.config.base_url, e);
                Err(e)
            }
        }
    }

    async fn run_handshake(&self) -> Result<(EncryptionManager, SessionCredentials)> {
        let response = self
            .send_with_retry(GET_PARM_PATH, || {
                HttpRequest::post(self.url(GET_PARM_PATH))
                    .header("Referer", self.config.base_url.as_str())
            })
            .await?;
        let params = parse_encryption_params(&response.body)?;
        info!("Received encryption params (seq={})", params.sequence);

        let mut encryption =
            EncryptionManager::configure(&params.modulus, &params.exponent, params.sequence)?;
        encryption.generate_session_key();

        let login = encryption
            .encrypt_login(&format!("{}\n{}", self.config.login, self.config.password))?;
        let login_url = format!("{}?{}", self.url(LOGIN_PATH), login_query(&login));
        debug!("Sending login for {}", self.config.login);

        let response = self
            .send_with_retry(LOGIN_PATH, || {
                HttpRequest::post(login_url.as_str())
                    .header("Referer", self.config.base_url.as_str())
            })
            .await?;
        let session_id = extract_session_id(&response)?;
        debug!("Received session cookie");

        let response = self
            .send_checked(
                HOME_PATH,
                HttpRequest::get(self.url(HOME_PATH))
                    .header("Referer", self.config.base_url.as_str())
                    .header("Cookie", session_cookie(&session_id)),
            )
            .await?;
        let token_id = extract_token_id(&response.body)?;
        debug!("Received token id");

        Ok((
            encryption,
            SessionCredentials {
                session_id,
                token_id,
            },
        ))
    }

    /// Send and require a 2xx status
    async fn send_checked(
        &self,
        endpoint: &'static str,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::UnexpectedStatus {
                endpoint,
                status: response.status,
            });
        }
        Ok(response)
    }

    async fn send_with_retry<F>(&self, endpoint: &'static str, make: F) -> Result<HttpResponse>
    where
        F: Fn() -> HttpRequest,
    {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            match self.send_checked(endpoint, make()).await {
                Err(e) if e.is_retryable() && attempt < policy.retries => {
                    let delay = policy.delay(attempt);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        endpoint,
                        e,
                        attempt + 1,
                        policy.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}
