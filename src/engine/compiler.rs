//! Pure translation of a domain list into redirect rules.
//!
//! These functions take plain parameters (no engine or backend dependency)
//! and can be unit-tested in isolation. Rule ids are positional, `1..=N`
//! over the emitted rules; reuse across unrelated domains after a list edit
//! is safe only because the engine removes every installed id before adding
//! a new set.

use crate::config;
use crate::error::AppError;
use crate::platform::RedirectRule;

/// Validate and canonicalize a single domain: trimmed, ASCII-lower-cased.
pub fn normalize_domain(raw: &str) -> Result<String, AppError> {
    let domain = raw.trim();
    if domain.is_empty() {
        return Err(AppError::InvalidInput("empty domain".into()));
    }
    if domain.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidInput(format!(
            "domain contains whitespace: {domain:?}"
        )));
    }
    if domain.contains('/') {
        return Err(AppError::InvalidInput(format!(
            "domain contains a path separator: {domain:?}"
        )));
    }
    if domain.len() > config::MAX_DOMAIN_LEN {
        return Err(AppError::InvalidInput(format!(
            "domain exceeds {} bytes",
            config::MAX_DOMAIN_LEN
        )));
    }
    Ok(domain.to_ascii_lowercase())
}

/// Validate and canonicalize a domain list, deduplicating while preserving
/// first-occurrence order.
pub fn normalize_domains(raw: &[String]) -> Result<Vec<String>, AppError> {
    let mut domains = Vec::with_capacity(raw.len());
    for entry in raw {
        let domain = normalize_domain(entry)?;
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    Ok(domains)
}

/// Compile a normalized domain list into redirect rules, one per domain in
/// input order. Whitelisted domains produce no rule.
pub fn compile(domains: &[String], whitelist: &[String]) -> Vec<RedirectRule> {
    domains
        .iter()
        .filter(|domain| !whitelist.contains(domain))
        .enumerate()
        .map(|(index, domain)| RedirectRule {
            id: (index + 1) as u32,
            priority: config::RULE_PRIORITY,
            url_filter: format!("*://*.{domain}/*"),
            redirect_url: format!("{}?domain={domain}", config::NOTICE_PAGE_URL),
        })
        .collect()
}
