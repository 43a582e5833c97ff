// Probe target validation
// Hosts reach argv and the vantage shell, so only name/address characters pass

use super::error::DomainError;

/// Accept hostnames, IPv4 and IPv6 literals
///
/// Allowed: ASCII letters, digits, `.`, `-`, `_`, `:`. A leading `-` is
/// refused so the host can never be read as an option by ping or nmap.
pub fn validate_host(host: &str) -> Result<&str, DomainError> {
    let invalid = |reason: &str| DomainError::InvalidHost(format!("{:?}: {}", host, reason));

    if host.is_empty() {
        return Err(invalid("empty"));
    }
    if host.starts_with('-') {
        return Err(invalid("starts with '-'"));
    }
    if let Some(c) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')))
    {
        return Err(invalid(&format!("character {:?} not allowed", c)));
    }
    Ok(host)
}
