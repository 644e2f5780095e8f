use sha2::{Digest, Sha256};

/// Derive the stable opaque user id from an issuer/subject pair.
///
/// `user-` + the first 8 hex digits of SHA-256("<iss>|<sub>") — 13
/// characters total. Deterministic across sessions and identical whether
/// the credential arrived as a cookie or a bearer token.
pub fn user_id_from_parts(iss: &str, sub: &str) -> String {
    let digest = Sha256::digest(format!("{iss}|{sub}").as_bytes());
    format!("user-{}", hex::encode(&digest[..4]))
}

/// Derive the user id from a verified claim set. None when `iss` or `sub`
/// is missing or not a string.
pub fn user_id_from_claims(claims: &serde_json::Value) -> Option<String> {
    let iss = claims.get("iss")?.as_str()?;
    let sub = claims.get("sub")?.as_str()?;
    Some(user_id_from_parts(iss, sub))
}

/// Read a string claim, defaulting to empty.
pub fn str_claim(claims: &serde_json::Value, key: &str) -> String {
    claims
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Split a provider-prefixed token of the form `"<provider>:<jwt>"`.
pub fn parse_provider_token(token: &str) -> Option<(&str, &str)> {
    let (provider_id, jwt) = token.split_once(':')?;
    if provider_id.is_empty() || jwt.is_empty() {
        return None;
    }
    Some((provider_id, jwt))
}
