//! Outbound automation-webhook URL policy
//!
//! Automation webhook targets are user-supplied, so they are validated
//! before being persisted or invoked: HTTPS only, host must fall under a
//! configured domain allowlist, and literal IP hosts (private ranges in
//! particular) are rejected to keep the gateway from being used as a proxy
//! into internal networks.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

/// A specific rule the candidate URL failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("not a valid URL")]
    Malformed,

    #[error("scheme must be https")]
    NotHttps,

    #[error("host is missing")]
    MissingHost,

    #[error("literal IP hosts are not allowed")]
    IpAddressHost,

    #[error("host resolves to a private or loopback address")]
    PrivateAddress,

    #[error("host {0} is not on the webhook domain allowlist")]
    DomainNotAllowed(String),
}

/// Validate a candidate webhook URL against the domain allowlist.
///
/// Allowlist entries match the host exactly or as a parent domain
/// (`zapier.com` admits `hooks.zapier.com`). Comparison is
/// case-insensitive.
pub fn validate_webhook_url(candidate: &str, allowlist: &[String]) -> Result<(), PolicyViolation> {
    let url = Url::parse(candidate).map_err(|_| PolicyViolation::Malformed)?;

    if url.scheme() != "https" {
        return Err(PolicyViolation::NotHttps);
    }

    match url.host() {
        None => Err(PolicyViolation::MissingHost),
        Some(Host::Ipv4(addr)) => {
            if is_private_v4(addr) {
                Err(PolicyViolation::PrivateAddress)
            } else {
                Err(PolicyViolation::IpAddressHost)
            }
        }
        Some(Host::Ipv6(addr)) => {
            if is_private_v6(addr) {
                Err(PolicyViolation::PrivateAddress)
            } else {
                Err(PolicyViolation::IpAddressHost)
            }
        }
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            let allowed = allowlist.iter().any(|entry| {
                let entry = entry.to_ascii_lowercase();
                domain == entry || domain.ends_with(&format!(".{}", entry))
            });
            if allowed {
                Ok(())
            } else {
                Err(PolicyViolation::DomainNotAllowed(domain))
            }
        }
    }
}

fn is_private_v4(addr: Ipv4Addr) -> bool {
    addr.is_private() || addr.is_loopback() || addr.is_link_local() || addr.is_unspecified()
}

fn is_private_v6(addr: Ipv6Addr) -> bool {
    // fc00::/7 unique-local and fe80::/10 link-local
    let seg = addr.segments();
    addr.is_loopback()
        || addr.is_unspecified()
        || (seg[0] & 0xfe00) == 0xfc00
        || (seg[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist() -> Vec<String> {
        vec!["zapier.com".to_string(), "hooks.make.com".to_string()]
    }

    #[test]
    fn test_accepts_allowlisted_https() {
        assert_eq!(
            validate_webhook_url("https://hooks.zapier.com/x", &allowlist()),
            Ok(())
        );
        assert_eq!(
            validate_webhook_url("https://hooks.make.com/hook/1", &allowlist()),
            Ok(())
        );
    }

    #[test]
    fn test_rejects_plain_http() {
        assert_eq!(
            validate_webhook_url("http://hooks.zapier.com/x", &allowlist()),
            Err(PolicyViolation::NotHttps)
        );
    }

    #[test]
    fn test_rejects_private_ip() {
        assert_eq!(
            validate_webhook_url("https://10.0.0.5/hook", &allowlist()),
            Err(PolicyViolation::PrivateAddress)
        );
        assert_eq!(
            validate_webhook_url("https://127.0.0.1/hook", &allowlist()),
            Err(PolicyViolation::PrivateAddress)
        );
        assert_eq!(
            validate_webhook_url("https://192.168.1.1/hook", &allowlist()),
            Err(PolicyViolation::PrivateAddress)
        );
        assert_eq!(
            validate_webhook_url("https://[::1]/hook", &allowlist()),
            Err(PolicyViolation::PrivateAddress)
        );
    }

    #[test]
    fn test_rejects_public_ip_literal() {
        assert_eq!(
            validate_webhook_url("https://8.8.8.8/hook", &allowlist()),
            Err(PolicyViolation::IpAddressHost)
        );
    }

    #[test]
    fn test_rejects_unlisted_domain() {
        assert_eq!(
            validate_webhook_url("https://evil.example.com/hook", &allowlist()),
            Err(PolicyViolation::DomainNotAllowed("evil.example.com".to_string()))
        );
        // A domain merely containing an allowlisted name is not a subdomain.
        assert!(matches!(
            validate_webhook_url("https://notzapier.com/x", &allowlist()),
            Err(PolicyViolation::DomainNotAllowed(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            validate_webhook_url("not a url", &allowlist()),
            Err(PolicyViolation::Malformed)
        );
    }

    #[test]
    fn test_host_match_is_case_insensitive() {
        assert_eq!(
            validate_webhook_url("https://Hooks.ZAPIER.com/x", &allowlist()),
            Ok(())
        );
    }
}
