//! Cross-module conformance tests for the core primitives

use pagedesk_core::{
    hash_refresh_token, issue_access_token, issue_refresh_token, validate_webhook_url,
    verify_access_token, Feature, GlobalRole, PolicyViolation, TokenConfig,
};

#[test]
fn global_role_rank_containment() {
    // moderator gate: moderator, admin and super_admin pass; client fails
    let passing = [GlobalRole::Moderator, GlobalRole::Admin, GlobalRole::SuperAdmin];
    for role in passing {
        assert!(role.allows(Feature::Moderator));
    }
    assert!(!GlobalRole::Client.allows(Feature::Moderator));

    // admin gate
    assert!(GlobalRole::Admin.allows(Feature::Admin));
    assert!(GlobalRole::SuperAdmin.allows(Feature::Admin));
    assert!(!GlobalRole::Moderator.allows(Feature::Admin));

    // superadmin gate admits exactly one role
    for role in [GlobalRole::Client, GlobalRole::Moderator, GlobalRole::Admin] {
        assert!(!role.allows(Feature::Superadmin));
    }
    assert!(GlobalRole::SuperAdmin.allows(Feature::Superadmin));
}

#[test]
fn token_pair_round_trip() {
    let config = TokenConfig::new("conformance-secret-long-enough-for-hmac");

    let access = issue_access_token("user-1", GlobalRole::Moderator, &config).unwrap();
    let (refresh, refresh_hash) =
        issue_refresh_token("user-1", GlobalRole::Moderator, &config).unwrap();

    // Both halves of the pair verify, carry the same subject, and the
    // refresh expiry is far beyond the access expiry.
    let access_claims = verify_access_token(&access, &config).unwrap();
    let refresh_claims = verify_access_token(&refresh, &config).unwrap();
    assert_eq!(access_claims.sub, refresh_claims.sub);
    assert!(refresh_claims.exp > access_claims.exp);

    // The persisted representation is the hash, recomputable from the
    // presented token.
    assert_eq!(refresh_hash, hash_refresh_token(&refresh));
}

#[test]
fn webhook_policy_matrix() {
    let allowlist = vec!["hooks.zapier.com".to_string()];

    let cases = [
        ("https://hooks.zapier.com/x", Ok(())),
        ("http://hooks.zapier.com/x", Err(PolicyViolation::NotHttps)),
        ("https://10.0.0.5/hook", Err(PolicyViolation::PrivateAddress)),
        (
            "https://evil.example.com/hook",
            Err(PolicyViolation::DomainNotAllowed("evil.example.com".to_string())),
        ),
    ];
    for (url, expected) in cases {
        assert_eq!(validate_webhook_url(url, &allowlist), expected, "case: {}", url);
    }
}
