//! Centralized runtime constants for flowguard.
//!
//! All tunable timeouts, defaults, and limits are collected here so they can
//! be found and adjusted in a single place rather than scattered across modules.

/// Upper bound on any single call into the rule backend (seconds).
/// Expiry surfaces as a `Platform` failure; the engine never retries.
pub const PLATFORM_CALL_TIMEOUT_SECS: u64 = 5;

/// Pause duration used when a `pause_protection` command carries no minutes.
pub const DEFAULT_PAUSE_MINUTES: u64 = 10;

/// Longest pause a single command may request (minutes).
pub const MAX_PAUSE_MINUTES: u64 = 24 * 60;

/// Priority assigned to every generated redirect rule.
pub const RULE_PRIORITY: u32 = 1;

/// Maximum length of a domain name accepted by validation (bytes).
pub const MAX_DOMAIN_LEN: usize = 253;

/// Base URL of the notice page blocked navigations are redirected to.
/// The blocked domain is appended as a `domain` query parameter.
pub const NOTICE_PAGE_URL: &str = "flowguard://blocked";

/// Capacity of the rule-match broadcast channel. Events beyond this while the
/// counter task lags are dropped (lost increments are accepted).
pub const MATCH_CHANNEL_CAPACITY: usize = 256;

/// File name of the SQLite state store inside the data directory.
pub const STATE_DB_FILE: &str = "flowguard.db";

/// File name of the command socket inside the data directory.
pub const COMMAND_SOCKET_FILE: &str = "flowguard.sock";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FLOWGUARD_DATA_DIR";

/// Environment variable overriding the command socket path.
pub const SOCKET_PATH_ENV: &str = "FLOWGUARD_SOCKET";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pause_within_max() {
        assert!(DEFAULT_PAUSE_MINUTES <= MAX_PAUSE_MINUTES);
    }

    /// Compile-time sanity: all constants are positive.
    /// Uses const assertions to avoid clippy::assertions_on_constants.
    #[test]
    fn test_all_limits_positive() {
        const _: () = assert!(PLATFORM_CALL_TIMEOUT_SECS > 0);
        const _: () = assert!(DEFAULT_PAUSE_MINUTES > 0);
        const _: () = assert!(MAX_PAUSE_MINUTES > 0);
        const _: () = assert!(RULE_PRIORITY > 0);
        const _: () = assert!(MAX_DOMAIN_LEN > 0);
        const _: () = assert!(MATCH_CHANNEL_CAPACITY > 0);
    }
}
