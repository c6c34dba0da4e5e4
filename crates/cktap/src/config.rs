//! Configuration options for a card session

use std::time::Duration;

use crate::constants::{SIGN_ATTEMPTS, roots};

/// How much checking `address` does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressMode {
    /// Certificate check (once per session) and derive cross-check
    #[default]
    Full,
    /// Trust the `read` signature alone
    Faster,
}

/// A public key the certificate chain may end at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryRoot {
    /// Human readable name
    pub label: String,
    /// Compressed public key
    pub pubkey: [u8; 33],
}

impl FactoryRoot {
    /// Create a root
    pub fn new(label: impl Into<String>, pubkey: [u8; 33]) -> Self {
        Self {
            label: label.into(),
            pubkey,
        }
    }
}

/// Configuration options for a card session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Roots accepted at the end of the certificate chain
    pub factory_roots: Vec<FactoryRoot>,

    /// Attempts `sign_digest` makes before giving up
    pub sign_attempts: usize,

    /// Fixed pause between signing attempts
    pub retry_delay: Duration,

    /// Default mode of `address`
    pub address_mode: AddressMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            factory_roots: vec![
                FactoryRoot::new("Root Factory Certificate", roots::ROOT_FACTORY),
                FactoryRoot::new(
                    "Root Factory Certificate (TESTING ONLY)",
                    roots::ROOT_FACTORY_TESTING,
                ),
            ],
            sign_attempts: SIGN_ATTEMPTS,
            retry_delay: Duration::from_millis(50),
            address_mode: AddressMode::Full,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted factory roots
    pub fn with_factory_roots(mut self, roots: Vec<FactoryRoot>) -> Self {
        self.factory_roots = roots;
        self
    }

    /// Accept one more factory root
    pub fn with_extra_root(mut self, root: FactoryRoot) -> Self {
        self.factory_roots.push(root);
        self
    }

    /// Set the number of signing attempts (at least one is always made)
    pub const fn with_sign_attempts(mut self, attempts: usize) -> Self {
        self.sign_attempts = if attempts == 0 { 1 } else { attempts };
        self
    }

    /// Set the pause between signing attempts
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the default address mode
    pub const fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.sign_attempts, 4);
        assert_eq!(config.factory_roots.len(), 2);
        assert_eq!(config.address_mode, AddressMode::Full);
    }

    #[test]
    fn builder() {
        let config = SessionConfig::new()
            .with_sign_attempts(0)
            .with_retry_delay(Duration::ZERO)
            .with_address_mode(AddressMode::Faster)
            .with_factory_roots(vec![FactoryRoot::new("test", [2u8; 33])]);
        assert_eq!(config.sign_attempts, 1);
        assert_eq!(config.retry_delay, Duration::ZERO);
        assert_eq!(config.address_mode, AddressMode::Faster);
        assert_eq!(config.factory_roots[0].label, "test");
    }
}
