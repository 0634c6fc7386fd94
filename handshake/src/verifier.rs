//! Credential verifier. A `Verifier` only exists once a `Config` has loaded
//! successfully, so holding one means the handshake is ready.

use std::fmt;

use crate::config::{Config, Secret};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationResult {
    Granted,
    Denied,
}

impl VerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationResult::Granted => "GRANTED",
            VerificationResult::Denied => "DENIED",
        }
    }

    /// The fixed console line for this outcome.
    pub fn message(&self) -> &'static str {
        match self {
            VerificationResult::Granted => "ACCESS_GRANTED: WELCOME_HOME_ARCHITECT",
            VerificationResult::Denied => "ACCESS_DENIED: INTRUDER_DETECTED",
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug)]
pub struct Verifier<'a> {
    secret: &'a Secret,
}

impl<'a> Verifier<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            secret: &config.secret,
        }
    }

    /// Exact, case-sensitive comparison of `candidate` against the secret.
    pub fn verify(&self, candidate: &str) -> VerificationResult {
        if candidate == self.secret.expose() {
            VerificationResult::Granted
        } else {
            VerificationResult::Denied
        }
    }

    pub fn secret(&self) -> &str {
        self.secret.expose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(secret: &str) -> Config {
        Config {
            secret: Secret::new(secret),
            ledger: Default::default(),
        }
    }

    #[test]
    fn grants_exact_match() {
        for secret in ["VOID-9", "a", "with spaces ", "ünïcödé", "MiXeD"] {
            let config = config_with(secret);
            let verifier = Verifier::new(&config);
            assert_eq!(verifier.verify(secret), VerificationResult::Granted, "{secret}");
        }
    }

    #[test]
    fn denies_anything_else() {
        let config = config_with("VOID-9");
        let verifier = Verifier::new(&config);
        for candidate in ["intruder", "VOID-", "VOID-99", " VOID-9", "VOID-9\n", "void-9"] {
            assert_eq!(verifier.verify(candidate), VerificationResult::Denied, "{candidate:?}");
        }
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let config = config_with("Foo");
        assert_eq!(Verifier::new(&config).verify("foo"), VerificationResult::Denied);
    }

    #[test]
    fn empty_candidate_is_denied() {
        let config = config_with("VOID-9");
        assert_eq!(Verifier::new(&config).verify(""), VerificationResult::Denied);
    }

    #[test]
    fn repeated_calls_leave_secret_untouched() {
        let config = config_with("VOID-9");
        let verifier = Verifier::new(&config);
        let _ = verifier.verify("intruder");
        let _ = verifier.verify("VOID-9");
        assert_eq!(verifier.secret(), "VOID-9");
        assert_eq!(verifier.verify("VOID-9"), VerificationResult::Granted);
    }

    #[test]
    fn messages_are_fixed() {
        assert_eq!(
            VerificationResult::Granted.to_string(),
            "ACCESS_GRANTED: WELCOME_HOME_ARCHITECT"
        );
        assert_eq!(
            VerificationResult::Denied.message(),
            "ACCESS_DENIED: INTRUDER_DETECTED"
        );
        assert_eq!(VerificationResult::Denied.as_str(), "DENIED");
    }
}
