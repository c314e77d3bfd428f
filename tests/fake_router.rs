//! Scripted in-process router
#![allow(dead_code)]
//!
//! Speaks the router side of the web protocol over the `Transport` seam:
//! hands out a 512-bit RSA key, recovers the AES key from the login
//! signature, checks every signature and session header, and answers
//! command frames with encrypted responses.

use async_trait::async_trait;
use mr600_crypto::{SessionCipher, SessionKey};
use mr600_transport::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use std::sync::Arc;

pub const BASE_URL: &str = "http://192.168.1.1";
pub const LOGIN: &str = "admin";
pub const PASSWORD: &str = "s3cret";

const SEQUENCE: u64 = 470_182_333;

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;

struct Active {
    session_id: String,
    token_id: String,
    cipher: SessionCipher,
}

#[derive(Default)]
struct Script {
    /// Answer the next N `/cgi/login` calls with 500
    failing_logins: u32,
    /// Answer the next N `/cgi_gdpr` calls with 500
    expiring_commands: u32,
    /// Answer the next N `/cgi_gdpr` calls with this status, keeping the session
    failing_commands: (u16, u32),
    omit_cookie: bool,
    omit_token: bool,
}

struct State {
    issued: u64,
    active: Option<Active>,
    script: Script,
    requests: Vec<(HttpMethod, String)>,
    frames: Vec<String>,
}

pub struct FakeRouter {
    private: RsaPrivateKey,
    responder: Responder,
    state: Mutex<State>,
}

impl FakeRouter {
    /// Router answering every command frame with `responder(frame)`
    pub fn new(responder: impl Fn(&str) -> String + Send + Sync + 'static) -> Arc<Self> {
        let mut rng = StdRng::seed_from_u64(600);
        let private = RsaPrivateKey::new(&mut rng, 512).expect("512-bit test key");

        Arc::new(Self {
            private,
            responder: Box::new(responder),
            state: Mutex::new(State {
                issued: 0,
                active: None,
                script: Script::default(),
                requests: Vec::new(),
                frames: Vec::new(),
            }),
        })
    }

    /// Router answering every command with an empty success frame
    pub fn accepting() -> Arc<Self> {
        Self::new(|_| "[error]0".to_string())
    }

    pub fn fail_logins(&self, n: u32) {
        self.state.lock().script.failing_logins = n;
    }

    pub fn expire_commands(&self, n: u32) {
        self.state.lock().script.expiring_commands = n;
    }

    pub fn fail_commands(&self, status: u16, n: u32) {
        self.state.lock().script.failing_commands = (status, n);
    }

    pub fn omit_cookie(&self) {
        self.state.lock().script.omit_cookie = true;
    }

    pub fn omit_token(&self) {
        self.state.lock().script.omit_token = true;
    }

    /// Drop the current session, as the router does after an idle timeout
    pub fn forget_session(&self) {
        self.state.lock().active = None;
    }

    /// Paths requested so far, query strings stripped
    pub fn paths(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|(_, url)| {
                let path = url.strip_prefix(BASE_URL).unwrap_or(url);
                path.split('?').next().unwrap_or(path).to_string()
            })
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.paths().iter().filter(|p| p.as_str() == path).count()
    }

    /// Decrypted command frames received, in order
    pub fn frames(&self) -> Vec<String> {
        self.state.lock().frames.clone()
    }

    pub fn sessions_issued(&self) -> u64 {
        self.state.lock().issued
    }

    fn modulus_hex(&self) -> String {
        self.private.n().to_str_radix(16)
    }

    /// Undo the chunked no-padding RSA with the private exponent
    fn rsa_decrypt(&self, hex: &str) -> Option<String> {
        if hex.is_empty() || hex.len() % 128 != 0 {
            return None;
        }
        let mut out = Vec::new();
        for chunk in hex.as_bytes().chunks(128) {
            let c = BigUint::parse_bytes(chunk, 16)?;
            let mut bytes = c.modpow(self.private.d(), self.private.n()).to_bytes_be();
            while bytes.last() == Some(&0) {
                bytes.pop();
            }
            out.extend_from_slice(&bytes);
        }
        String::from_utf8(out).ok()
    }

    /// Check `h=undefined&s=<seq + len>` at the end of a signature
    fn verify_sequence(material: &str, data_len: usize) -> bool {
        let expected = format!("h=undefined&s={}", SEQUENCE + data_len as u64);
        material.ends_with(&expected)
    }

    fn get_parm(&self) -> HttpResponse {
        HttpResponse::new(
            200,
            format!(
                "[cgi]0\nvar ee=\"010001\";\nvar nn=\"{}\";\nvar seq=\"{}\";\n$.ret=0;\n",
                self.modulus_hex(),
                SEQUENCE
            ),
        )
    }

    fn login(&self, url: &str) -> HttpResponse {
        let mut state = self.state.lock();
        if state.script.failing_logins > 0 {
            state.script.failing_logins -= 1;
            return HttpResponse::new(500, "");
        }

        let Ok(parsed) = url::Url::parse(url) else {
            return HttpResponse::new(400, "");
        };
        let query = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let (Some(data), Some(sign)) = (query("data"), query("sign")) else {
            return HttpResponse::new(400, "");
        };
        if query("Action").as_deref() != Some("1") || query("LoginStatus").as_deref() != Some("0")
        {
            return HttpResponse::new(400, "");
        }

        let Some(material) = self.rsa_decrypt(&sign) else {
            return HttpResponse::new(400, "");
        };
        if !Self::verify_sequence(&material, data.len()) {
            return HttpResponse::new(400, "");
        }
        let Some(key) = parse_key_material(&material) else {
            return HttpResponse::new(400, "");
        };

        let cipher = SessionCipher::new(&key);
        let credentials = cipher.decrypt(&data).ok();
        if credentials.as_deref() != Some(format!("{}\n{}", LOGIN, PASSWORD).as_str()) {
            return HttpResponse::new(200, "$.ret=1;");
        }

        state.issued += 1;
        let session_id = format!("{:032x}", 0xa11ce000 + state.issued);
        let token_id = format!("{:032x}", 0x70ce0000 + state.issued);
        state.active = Some(Active {
            session_id: session_id.clone(),
            token_id,
            cipher,
        });

        let response = HttpResponse::new(200, "$.ret=0;")
            .with_header("Set-Cookie", "loginErrorShow=1; Path=/");
        if state.script.omit_cookie {
            response
        } else {
            response.with_header("Set-Cookie", format!("JSESSIONID={}; Path=/; HttpOnly", session_id))
        }
    }

    fn home(&self, request: &HttpRequest) -> HttpResponse {
        let state = self.state.lock();
        let Some(active) = &state.active else {
            return HttpResponse::new(200, "<html>login</html>");
        };
        let cookie = request.header_value("Cookie").unwrap_or_default();
        if !cookie.contains(&format!("JSESSIONID={}", active.session_id)) || state.script.omit_token
        {
            return HttpResponse::new(200, "<html>login</html>");
        }
        HttpResponse::new(
            200,
            format!(
                "<html><script type=\"text/javascript\">var token=\"{}\";</script></html>",
                active.token_id
            ),
        )
    }

    fn command(&self, request: &HttpRequest) -> HttpResponse {
        let mut state = self.state.lock();
        if state.script.expiring_commands > 0 {
            state.script.expiring_commands -= 1;
            state.active = None;
            return HttpResponse::new(500, "");
        }
        if let (status, n @ 1..) = state.script.failing_commands {
            state.script.failing_commands = (status, n - 1);
            return HttpResponse::new(status, "");
        }
        let Some(active) = &state.active else {
            return HttpResponse::new(500, "");
        };

        let cookie = request.header_value("Cookie").unwrap_or_default();
        if cookie != format!("loginErrorShow=1; JSESSIONID={}", active.session_id)
            || request.header_value("TokenID") != Some(active.token_id.as_str())
            || request.header_value("Referer") != Some(BASE_URL)
        {
            return HttpResponse::new(500, "");
        }

        let body = request.body.as_deref().unwrap_or_default();
        let mut sign = None;
        let mut data = None;
        for line in body.split("\r\n") {
            if let Some(v) = line.strip_prefix("sign=") {
                sign = Some(v);
            } else if let Some(v) = line.strip_prefix("data=") {
                data = Some(v);
            }
        }
        let (Some(sign), Some(data)) = (sign, data) else {
            return HttpResponse::new(400, "");
        };

        match self.rsa_decrypt(sign) {
            Some(material) if material.starts_with("h=") && Self::verify_sequence(&material, data.len()) => {}
            _ => return HttpResponse::new(400, ""),
        }

        let Ok(frame) = active.cipher.decrypt(data) else {
            return HttpResponse::new(400, "");
        };
        let reply = (self.responder)(&frame);
        let Ok(encrypted) = active.cipher.encrypt(&reply) else {
            return HttpResponse::new(500, "");
        };
        state.frames.push(frame);

        HttpResponse::new(200, encrypted)
    }
}

#[async_trait]
impl Transport for FakeRouter {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.state
            .lock()
            .requests
            .push((request.method, request.url.clone()));

        if request.header_value("Referer") != Some(BASE_URL) {
            return Ok(HttpResponse::new(403, ""));
        }

        let path = request
            .url
            .strip_prefix(BASE_URL)
            .ok_or_else(|| TransportError::InvalidUrl(request.url.clone()))?;
        let path = path.split('?').next().unwrap_or(path);

        Ok(match (request.method, path) {
            (HttpMethod::Post, "/cgi/getParm") => self.get_parm(),
            (HttpMethod::Post, "/cgi/login") => self.login(&request.url),
            (HttpMethod::Get, "/") => self.home(&request),
            (HttpMethod::Post, "/cgi_gdpr") => self.command(&request),
            _ => HttpResponse::new(404, ""),
        })
    }
}

/// `key=<16 hex>&iv=<16 hex>&h=..` -> session key
fn parse_key_material(material: &str) -> Option<SessionKey> {
    let mut parts = material.split('&');
    let key = parts.next()?.strip_prefix("key=")?;
    let iv = parts.next()?.strip_prefix("iv=")?;
    SessionKey::from_hex(key, iv).ok()
}

/// Response frame listing `records`, each a set of `key=value` lines
pub fn list_frame(records: &[Vec<(&str, String)>]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("[{},0,0,0,0,0]0\n", i + 1));
        for (k, v) in record {
            out.push_str(&format!("{}={}\n", k, v));
        }
    }
    out.push_str("[error]0");
    out
}
