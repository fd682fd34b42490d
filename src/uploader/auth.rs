//! Auth header shaper (C4): translate a credential record into request
//! headers.

use base64::Engine;
use std::collections::HashMap;

/// A presented credential. This crate only *presents* credentials; issuing
/// them is out of scope.
#[derive(Debug, Clone)]
pub enum Credential {
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { key: String, header_name: Option<String> },
}

impl Credential {
    /// Build the header map this credential translates to. Absence of a
    /// credential (the caller holds `None`) yields an empty map.
    pub fn to_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        match self {
            Credential::Basic { username, password } => {
                let raw = format!("{username}:{password}");
                let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
                headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
            }
            Credential::Bearer { token } => {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            Credential::ApiKey { key, header_name } => {
                let name = header_name.clone().unwrap_or_else(|| "X-API-Key".to_string());
                headers.insert(name, key.clone());
            }
        }
        headers
    }
}

/// Shape headers for an optional credential.
pub fn shape_headers(credential: Option<&Credential>) -> HashMap<String, String> {
    credential.map(Credential::to_headers).unwrap_or_default()
}

/// Shape a bearer-auth header map directly from a session-issued token.
pub fn bearer_headers(token: &str) -> HashMap<String, String> {
    Credential::Bearer {
        token: token.to_string(),
    }
    .to_headers()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credential_base64_encodes_user_pass() {
        let cred = Credential::Basic {
            username: "alice".into(),
            password: "wonderland".into(),
        };
        let headers = cred.to_headers();
        assert_eq!(
            headers.get("Authorization").unwrap(),
            "Basic YWxpY2U6d29uZGVybGFuZA=="
        );
    }

    #[test]
    fn bearer_credential_sets_authorization_header() {
        let cred = Credential::Bearer {
            token: "tok_123".into(),
        };
        assert_eq!(
            cred.to_headers().get("Authorization").unwrap(),
            "Bearer tok_123"
        );
    }

    #[test]
    fn api_key_defaults_to_x_api_key_header() {
        let cred = Credential::ApiKey {
            key: "secret".into(),
            header_name: None,
        };
        assert_eq!(cred.to_headers().get("X-API-Key").unwrap(), "secret");
    }

    #[test]
    fn api_key_honors_custom_header_name() {
        let cred = Credential::ApiKey {
            key: "secret".into(),
            header_name: Some("X-Custom-Key".into()),
        };
        assert_eq!(cred.to_headers().get("X-Custom-Key").unwrap(), "secret");
    }

    #[test]
    fn no_credential_yields_empty_headers() {
        assert!(shape_headers(None).is_empty());
    }
}
