// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claim sets and claim-level checks.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::Deserialize;
use serde_json::Value;

use super::config::JwtConfig;
use super::error::TokenError;

/// Issuer
pub const ISSUER: &str = "iss";
/// Issued at
pub const ISSUED_AT: &str = "iat";
/// Expire time
pub const EXPIRES_AT: &str = "exp";
/// Not before
pub const NOT_BEFORE: &str = "nbf";
/// Subject
pub const SUBJECT: &str = "sub";
/// Audience, also selects the config override
pub const AUDIENCE: &str = "aud";
/// Guard that issued the token (custom)
pub const GUARD: &str = "grd";

/// Decoded token payload: claim name to JSON value.
pub type ClaimSet = serde_json::Map<String, Value>;

/// Base64url, with or without padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Ensure every required claim of `config` is present in `claims`.
///
/// Presence is what counts: a claim holding `null` satisfies the check.
pub fn validate_required_claims(
    claims: &ClaimSet,
    config: &JwtConfig,
    enforce: bool,
) -> Result<(), TokenError> {
    if !enforce {
        return Ok(());
    }
    match config
        .required_claims
        .iter()
        .find(|name| !claims.contains_key(name.as_str()))
    {
        Some(missing) => Err(TokenError::MissingRequiredClaim(missing.clone())),
        None => Ok(()),
    }
}

/// Every required claim of `config` mapped to `null`.
pub fn required_claims_defaults(config: &JwtConfig) -> ClaimSet {
    config
        .required_claims
        .iter()
        .map(|name| (name.clone(), Value::Null))
        .collect()
}

/// Add a `null` placeholder for each required claim missing from `claims`.
///
/// Placeholders make a token pass the presence check without carrying a
/// value. Callers that need real `iat`/`exp` must set them explicitly.
pub fn fill_required_claims(claims: &mut ClaimSet, config: &JwtConfig) {
    for name in &config.required_claims {
        claims.entry(name.clone()).or_insert(Value::Null);
    }
}

/// Subject as a lookup key. Numeric subjects are rendered as strings.
pub fn subject_identifier(claims: &ClaimSet) -> Option<String> {
    match claims.get(SUBJECT)? {
        Value::String(subject) => Some(subject.clone()),
        Value::Number(subject) => Some(subject.to_string()),
        _ => None,
    }
}

/// Guard claim, if it is a string.
pub fn guard_claim(claims: &ClaimSet) -> Option<&str> {
    claims.get(GUARD).and_then(Value::as_str)
}

/// Set `iss`, `iat`, `nbf` and, unless `ttl_seconds` is zero, `exp`.
pub fn stamp_lifetime(claims: &mut ClaimSet, issuer: &str, now: i64, ttl_seconds: u64) {
    claims.insert(ISSUER.to_string(), Value::from(issuer));
    claims.insert(ISSUED_AT.to_string(), Value::from(now));
    claims.insert(NOT_BEFORE.to_string(), Value::from(now));
    if ttl_seconds > 0 {
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        claims.insert(EXPIRES_AT.to_string(), Value::from(now.saturating_add(ttl)));
    }
}

/// Check numeric `exp` and `nbf` against `now`, allowing `leeway` seconds.
///
/// Absent, `null` and non-numeric time claims are skipped, so placeholder
/// claims never fail the check. Fractional values are floored.
pub fn check_lifetime(claims: &ClaimSet, now: i64, leeway: u64) -> Result<(), TokenError> {
    let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);

    if let Some(exp) = timestamp_claim(claims, EXPIRES_AT) {
        if now.saturating_sub(leeway) >= exp {
            return Err(TokenError::TokenExpired);
        }
    }
    if let Some(nbf) = timestamp_claim(claims, NOT_BEFORE) {
        if nbf > now.saturating_add(leeway) {
            return Err(TokenError::TokenNotYetValid);
        }
    }
    Ok(())
}

fn timestamp_claim(claims: &ClaimSet, name: &str) -> Option<i64> {
    match claims.get(name)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v.floor() as i64)),
        _ => None,
    }
}

#[derive(Deserialize)]
struct AudienceOnly {
    #[serde(default)]
    aud: Option<Value>,
}

/// Read the `aud` claim of `token` WITHOUT verifying its signature.
///
/// Only used to pick the configuration the token is then verified with.
/// Anything unparseable yields `None`.
pub fn peek_unverified_audience(token: &str) -> Option<Value> {
    let mut segments = token.split('.');
    let payload = segments.nth(1)?;
    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    serde_json::from_slice::<AudienceOnly>(&bytes).ok()?.aud
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn claims(value: Value) -> ClaimSet {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn config_requiring(names: &[&str]) -> JwtConfig {
        JwtConfig {
            required_claims: names.iter().map(|n| n.to_string()).collect(),
            ..JwtConfig::default()
        }
    }

    fn unsigned_token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT","alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn all_required_claims_present_passes() {
        let config = config_requiring(&["sub", "grd"]);
        let claims = claims(json!({ "sub": "Pepe", "grd": "jwt_users", "extra": 1 }));
        assert!(validate_required_claims(&claims, &config, true).is_ok());
    }

    #[test]
    fn missing_claim_is_reported_by_name() {
        let config = config_requiring(&["iss", "iat", "exp", "nbf", "sub", "grd"]);
        let claims = claims(json!({ "iss": "x", "iat": 1, "exp": 2, "nbf": 1, "sub": "Pepe" }));

        let result = validate_required_claims(&claims, &config, true);
        assert!(matches!(result, Err(TokenError::MissingRequiredClaim(name)) if name == "grd"));
    }

    #[test]
    fn null_placeholder_counts_as_present() {
        let config = config_requiring(&["iss", "sub"]);
        let claims = claims(json!({ "iss": null, "sub": "Pepe" }));
        assert!(validate_required_claims(&claims, &config, true).is_ok());
    }

    #[test]
    fn validation_is_skipped_when_not_enforced() {
        let config = config_requiring(&["iss"]);
        assert!(validate_required_claims(&ClaimSet::new(), &config, false).is_ok());
    }

    #[test]
    fn fill_keeps_explicit_values() {
        let config = config_requiring(&["iss", "iat", "exp", "nbf", "grd"]);
        let mut claims = claims(json!({ "sub": "Pepe", "iss": "Relational" }));
        fill_required_claims(&mut claims, &config);

        assert_eq!(
            Value::Object(claims),
            json!({
                "sub": "Pepe",
                "iss": "Relational",
                "iat": null,
                "exp": null,
                "nbf": null,
                "grd": null
            })
        );
    }

    #[test]
    fn defaults_map_every_required_claim_to_null() {
        let defaults = required_claims_defaults(&config_requiring(&["iss", "grd"]));
        assert_eq!(Value::Object(defaults), json!({ "iss": null, "grd": null }));
    }

    #[test]
    fn subject_identifier_accepts_strings_and_numbers() {
        assert_eq!(
            subject_identifier(&claims(json!({ "sub": "Pepe" }))),
            Some("Pepe".to_string())
        );
        assert_eq!(
            subject_identifier(&claims(json!({ "sub": 42 }))),
            Some("42".to_string())
        );
        assert_eq!(subject_identifier(&claims(json!({ "sub": null }))), None);
    }

    #[test]
    fn stamp_lifetime_skips_exp_for_zero_ttl() {
        let mut stamped = ClaimSet::new();
        stamp_lifetime(&mut stamped, "Relational", 1_700_000_000, 60);
        assert_eq!(stamped[EXPIRES_AT], json!(1_700_000_060));
        assert_eq!(stamped[NOT_BEFORE], json!(1_700_000_000));

        let mut endless = ClaimSet::new();
        stamp_lifetime(&mut endless, "Relational", 1_700_000_000, 0);
        assert!(!endless.contains_key(EXPIRES_AT));
        assert_eq!(endless[ISSUER], json!("Relational"));
    }

    #[test]
    fn lifetime_skips_placeholder_time_claims() {
        let placeholders = claims(json!({ "exp": null, "nbf": null, "sub": "Pepe" }));
        assert!(check_lifetime(&placeholders, 1_700_000_000, 0).is_ok());

        let strings = claims(json!({ "exp": "yesterday", "nbf": "tomorrow" }));
        assert!(check_lifetime(&strings, 1_700_000_000, 0).is_ok());
        assert!(check_lifetime(&ClaimSet::new(), 1_700_000_000, 0).is_ok());
    }

    #[test]
    fn lifetime_rejects_numeric_expiry_and_not_before() {
        let now = 1_700_000_000;
        let expired = claims(json!({ "exp": now - 10 }));
        assert!(matches!(
            check_lifetime(&expired, now, 0),
            Err(TokenError::TokenExpired)
        ));
        assert!(check_lifetime(&expired, now, 60).is_ok());

        let at_expiry = claims(json!({ "exp": now }));
        assert!(matches!(
            check_lifetime(&at_expiry, now, 0),
            Err(TokenError::TokenExpired)
        ));

        let early = claims(json!({ "nbf": now + 10 }));
        assert!(matches!(
            check_lifetime(&early, now, 0),
            Err(TokenError::TokenNotYetValid)
        ));
        assert!(check_lifetime(&early, now, 10).is_ok());

        let fractional = claims(json!({ "exp": (now as f64) + 30.5 }));
        assert!(check_lifetime(&fractional, now, 0).is_ok());
    }

    #[test]
    fn peek_reads_audience_without_signature() {
        let token = unsigned_token(r#"{"sub":"Pepe","aud":"mobile"}"#);
        assert_eq!(peek_unverified_audience(&token), Some(json!("mobile")));
    }

    #[test]
    fn peek_tolerates_padding() {
        let token = format!(
            "x.{}.y",
            base64::engine::general_purpose::URL_SAFE.encode(r#"{"aud":"web"}"#)
        );
        assert_eq!(peek_unverified_audience(&token), Some(json!("web")));
    }

    #[test]
    fn peek_returns_none_for_garbage() {
        assert_eq!(peek_unverified_audience(""), None);
        assert_eq!(peek_unverified_audience("only-one-segment"), None);
        assert_eq!(peek_unverified_audience("a.!!!.c"), None);
        assert_eq!(peek_unverified_audience(&unsigned_token("not json")), None);
        assert_eq!(peek_unverified_audience(&unsigned_token(r#"{"sub":"Pepe"}"#)), None);
    }
}
