use serde::{Deserialize, Serialize};

/// Static configuration for one OIDC provider, as loaded from the server
/// config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

pub fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "offline_access".to_string(),
    ]
}

/// The subset of the OIDC discovery document the server consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDoc {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// A token-endpoint response (authorization-code exchange or refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_defaults_scopes() {
        let cfg: ProviderConfig = serde_json::from_value(serde_json::json!({
            "id": "kc",
            "name": "Keycloak",
            "issuer_url": "https://kc.example/realms/main",
            "client_id": "habits",
            "client_secret": "s3cret",
            "redirect_url": "https://habits.example/auth/callback/kc",
        }))
        .unwrap();
        assert_eq!(cfg.scopes, vec!["openid", "profile", "offline_access"]);
    }

    #[test]
    fn test_token_response_optional_fields() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token": "at", "token_type": "Bearer"}"#,
        )
        .unwrap();
        assert_eq!(resp.access_token, "at");
        assert!(resp.refresh_token.is_none());
        assert!(resp.id_token.is_none());
    }
}
