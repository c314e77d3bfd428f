//! Handshake response parsing
//!
//! The router's handshake pages are not structured data; the fields are
//! picked out of JavaScript-ish text.

use crate::error::{ClientError, Result};
use mr600_crypto::EncryptedPayload;
use mr600_transport::HttpResponse;
use regex::Regex;
use std::sync::LazyLock;

/// Cookie carrying the web session
pub const SESSION_COOKIE: &str = "JSESSIONID";

static EXPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ee="(\d+)""#).expect("valid regex"));
static MODULUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"nn="([0-9A-Fa-f]+)""#).expect("valid regex"));
static SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"seq="(\d+)""#).expect("valid regex"));
static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"JSESSIONID=([a-f0-9]+)").expect("valid regex"));
static TOKEN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var token="([a-f0-9]+)""#).expect("valid regex"));

/// RSA key and sequence announced by `/cgi/getParm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParams {
    /// Hex modulus
    pub modulus: String,
    /// Hex exponent (sent as digits only, e.g. `010001`)
    pub exponent: String,
    pub sequence: u64,
}

/// Parse `ee="..."`, `nn="..."` and `seq="..."` out of a getParm body
pub fn parse_encryption_params(body: &str) -> Result<EncryptionParams> {
    let exponent = capture(&EXPONENT, body, "ee")?;
    let modulus = capture(&MODULUS, body, "nn")?;
    let sequence = capture(&SEQUENCE, body, "seq")?;

    let sequence = sequence
        .parse()
        .map_err(|_| ClientError::ProtocolFormat {
            context: "encryption params",
            detail: format!("seq out of range: {}", sequence),
        })?;

    Ok(EncryptionParams {
        modulus,
        exponent,
        sequence,
    })
}

fn capture(re: &Regex, body: &str, field: &str) -> Result<String> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ClientError::ProtocolFormat {
            context: "encryption params",
            detail: format!("missing or invalid {}", field),
        })
}

/// Session id from the login response's `Set-Cookie` headers
pub fn extract_session_id(response: &HttpResponse) -> Result<String> {
    let mut saw_cookie = false;
    for header in response.headers_named("set-cookie") {
        saw_cookie = true;
        if let Some(c) = SESSION_ID.captures(header) {
            return Ok(c[1].to_string());
        }
    }

    Err(ClientError::Authentication(if saw_cookie {
        format!("no {} cookie in login response", SESSION_COOKIE)
    } else {
        "login response carried no Set-Cookie header".to_string()
    }))
}

/// Token id embedded in the authenticated home page
pub fn extract_token_id(body: &str) -> Result<String> {
    TOKEN_ID
        .captures(body)
        .map(|c| c[1].to_string())
        .ok_or_else(|| ClientError::Authentication("no token in home page".to_string()))
}

/// Query string for `/cgi/login`
pub fn login_query(payload: &EncryptedPayload) -> String {
    let data: String = url::form_urlencoded::byte_serialize(payload.data.as_bytes()).collect();
    format!("data={}&sign={}&Action=1&LoginStatus=0", data, payload.sign)
}

/// `Cookie` header value for an authenticated request
pub fn session_cookie(session_id: &str) -> String {
    format!("loginErrorShow=1; {}={}", SESSION_COOKIE, session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_PARM_BODY: &str = "[cgi]0\n\
        var ee=\"010001\";\n\
        var nn=\"C1A2B3D4E5F60718293A4B5C6D7E8F90C1A2B3D4E5F60718293A4B5C6D7E8F90C1A2B3D4E5F60718293A4B5C6D7E8F90C1A2B3D4E5F60718293A4B5C6D7E8F91\";\n\
        var seq=\"582744615\";\n\
        $.ret=0;\n";

    #[test]
    fn test_parse_encryption_params() {
        let params = parse_encryption_params(GET_PARM_BODY).unwrap();
        assert_eq!(params.exponent, "010001");
        assert_eq!(params.modulus.len(), 128);
        assert!(params.modulus.starts_with("C1A2"));
        assert_eq!(params.sequence, 582744615);
    }

    #[test]
    fn test_parse_encryption_params_missing_field() {
        let body = GET_PARM_BODY.replace("var seq=\"582744615\";", "");
        let err = parse_encryption_params(&body).unwrap_err();
        match err {
            ClientError::ProtocolFormat { detail, .. } => assert!(detail.contains("seq")),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(parse_encryption_params("<html>login</html>").is_err());
    }

    #[test]
    fn test_parse_encryption_params_seq_overflow() {
        let body = GET_PARM_BODY.replace("582744615", "99999999999999999999999");
        assert!(matches!(
            parse_encryption_params(&body),
            Err(ClientError::ProtocolFormat { .. })
        ));
    }

    #[test]
    fn test_extract_session_id() {
        let response = HttpResponse::new(200, "")
            .with_header("Set-Cookie", "loginErrorShow=1; Path=/")
            .with_header("Set-Cookie", "JSESSIONID=0a1b2c3d4e; Path=/; HttpOnly");
        assert_eq!(extract_session_id(&response).unwrap(), "0a1b2c3d4e");
    }

    #[test]
    fn test_extract_session_id_failures() {
        let no_header = HttpResponse::new(200, "");
        assert!(matches!(
            extract_session_id(&no_header),
            Err(ClientError::Authentication(_))
        ));

        let wrong_cookie = HttpResponse::new(200, "").with_header("Set-Cookie", "other=1");
        assert!(matches!(
            extract_session_id(&wrong_cookie),
            Err(ClientError::Authentication(_))
        ));
    }

    #[test]
    fn test_extract_token_id() {
        let body = "<script type=\"text/javascript\">var token=\"9f8e7d6c5b4a\";</script>";
        assert_eq!(extract_token_id(body).unwrap(), "9f8e7d6c5b4a");
        assert!(extract_token_id("<html></html>").is_err());
    }

    #[test]
    fn test_login_query_encodes_base64() {
        let payload = EncryptedPayload {
            data: "ab+/cd==".to_string(),
            sign: "00ff".to_string(),
        };
        assert_eq!(
            login_query(&payload),
            "data=ab%2B%2Fcd%3D%3D&sign=00ff&Action=1&LoginStatus=0"
        );
    }

    #[test]
    fn test_session_cookie() {
        assert_eq!(session_cookie("abc"), "loginErrorShow=1; JSESSIONID=abc");
    }
}
