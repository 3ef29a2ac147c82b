//! reqwest-backed gateway to the remote ticketing REST API.
//!
//! # Security Note - Logging
//!
//! The password is sent as the `Authorization` header. It is held in a
//! `SecretBox` and wrapped in `RedactedHeader` while the request is built, so
//! neither `Debug` nor `Display` output ever contains it.
//!
//! **Important:** Do not enable reqwest logging in production:
//!
//! ```bash
//! # RUST_LOG=reqwest=debug  <-- AVOID IN PRODUCTION
//! ```

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header;
use secrecy::{ExposeSecret, SecretBox};
use serde_json::{Map, Value};

use crate::config::SyncConfig;
use crate::error::{BridgeError, Result};

use super::{ARRAY_KEY, ApiError, HttpMethod, RemoteGateway};

const CLIENT_ID_HEADER: &str = "clientID";

/// Wrapper for sensitive header values that redacts the value when formatted.
struct RedactedHeader {
    value: SecretBox<String>,
}

impl RedactedHeader {
    fn new(value: &str) -> Self {
        Self {
            value: SecretBox::new(Box::new(value.to_string())),
        }
    }

    fn as_header_value(&self) -> Result<header::HeaderValue> {
        let mut value = header::HeaderValue::from_str(self.value.expose_secret())
            .map_err(|_| BridgeError::Config("password is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Display for RedactedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for RedactedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactedHeader")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Parse a response body into a document.
///
/// Objects are returned as-is and arrays are wrapped under `"JSONArray"`.
/// Anything else (including an empty body) yields `None`.
pub fn parse_document(body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(Value::Array(items)) => {
            let mut wrapped = Map::new();
            wrapped.insert(ARRAY_KEY.to_string(), Value::Array(items));
            Some(Value::Object(wrapped))
        }
        Ok(_) => {
            tracing::warn!("Response body is neither a JSON object nor an array");
            None
        }
        Err(e) => {
            if !body.trim().is_empty() {
                tracing::warn!("Error parsing response body as JSON: {e}");
            }
            None
        }
    }
}

/// Gateway that talks to the remote API over HTTPS.
///
/// Credentials are taken from the configuration passed with each call.
pub struct HttpGateway {
    client: Client,
}

impl HttpGateway {
    /// Configures the HTTP client with a 30s connect timeout and 60s total timeout.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }
}

impl RemoteGateway for HttpGateway {
    async fn call(
        &self,
        config: &SyncConfig,
        url: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let (Some(login), Some(password)) = (config.login(), config.password()) else {
            tracing::error!("Unable to retrieve login and/or password from configuration");
            return Err(BridgeError::Config(
                "login and password must be configured for the remote API".to_string(),
            ));
        };
        let auth_header = RedactedHeader::new(&password);

        let mut request = self
            .client
            .request(method.into(), url)
            .header(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            )
            .header(CLIENT_ID_HEADER, login)
            .header(header::AUTHORIZATION, auth_header.as_header_value()?);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!("{method} {url}");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(method, url, &e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{method} {url} unsuccessful - HTTP {status}");
            return Err(ApiError::unsuccessful(method, url, status).into());
        }
        tracing::info!("{method} {url} successful - HTTP {status}");

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(method, url, &e))?;
        Ok(parse_document(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_redacted_header_display() {
        let header = RedactedHeader::new("secret-api-key-12345");
        assert_eq!(format!("{}", header), "[REDACTED]");
    }

    #[test]
    fn test_redacted_header_debug() {
        let header = RedactedHeader::new("secret-api-key-12345");
        let debug_str = format!("{:?}", header);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret-api-key"));
    }

    #[test]
    fn test_redacted_header_as_header_value() {
        let header = RedactedHeader::new("Basic dG9rZW4=");
        let header_value = header.as_header_value().unwrap();
        assert_eq!(header_value.to_str().unwrap(), "Basic dG9rZW4=");
        assert!(header_value.is_sensitive());
    }

    #[test]
    fn test_redacted_header_rejects_newlines() {
        let header = RedactedHeader::new("bad\nvalue");
        assert!(header.as_header_value().unwrap_err().is_config());
    }

    #[test]
    fn test_parse_document_object() {
        let doc = parse_document(r#"{"id": 187562, "summary": "x"}"#).unwrap();
        assert_eq!(doc["id"], 187562);
    }

    #[test]
    fn test_parse_document_array_is_wrapped() {
        let doc = parse_document(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert_eq!(doc[ARRAY_KEY].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_document_garbage_is_none() {
        assert_eq!(parse_document("<html>oops</html>"), None);
        assert_eq!(parse_document(""), None);
        assert_eq!(parse_document("42"), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_credentials_is_config_error() {
        let gateway = HttpGateway::new().unwrap();
        // SAFETY: serialized with other env tests
        unsafe {
            std::env::remove_var(crate::config::LOGIN_ENV);
            std::env::remove_var(crate::config::PASSWORD_ENV);
        }
        let err = gateway
            .call(&SyncConfig::default(), "http://127.0.0.1:9/tickets", HttpMethod::Get, None)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }
}
