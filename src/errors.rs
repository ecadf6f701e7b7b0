use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a rule or a policy method to deny the request.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single rule invocation. `Ok(())` grants access.
pub type RuleResult = std::result::Result<(), BoxError>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid rule name {0:?}.")]
    InvalidRuleName(String),

    #[error("Policy {0:?} is already registered.")]
    PolicyAlreadyRegistered(String),

    #[error("Rule {rule:?} not found in policy {policy:?}.")]
    RuleNotFound { policy: String, rule: String },

    #[error("Policy {0:?} not found.")]
    PolicyNotFound(String),

    #[error("An invalid auth context was provided.")]
    InvalidAuthCtx,

    #[error("Auth context type mismatch: policy expects {expected}, got {actual}.")]
    AuthCtxTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Policy type {0:?} does not declare an auth context slot.")]
    MisconfiguredPolicyType(String),

    #[error("Method {method:?} is not available on policy {policy:?}.")]
    MethodNotAvailable { policy: String, method: String },

    #[error("Rule expects {expected} arguments, {actual} were supplied.")]
    RuleArgsLenMismatch { expected: usize, actual: usize },

    #[error("Rule argument at position {position} does not match, expected {expected}.")]
    RuleArgItemMismatch {
        position: usize,
        expected: &'static str,
    },

    #[error("Resource does not match, expected {expected}.")]
    InvalidResource { expected: &'static str },

    #[error("Access denied.")]
    Denied(#[source] BoxError),

    #[error("An error occurred deserializing options {0}.")]
    Deserializing(#[from] serde_json::Error),

    #[error("Invalid options: {0}.")]
    InvalidOptions(String),

    #[error("An error occurred registering metrics {0}.")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Returns `true` when the error is a denial produced by a rule, as opposed
    /// to a failure detected by the dispatcher itself.
    pub fn is_denied(&self) -> bool {
        matches!(self, Error::Denied(_))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn denial_reason_is_reported_once_as_source() {
        let error = Error::Denied("only admins can create projects".into());

        assert_eq!("Access denied.", error.to_string());
        assert_eq!(
            "only admins can create projects",
            error.source().unwrap().to_string()
        );
    }

    #[test]
    fn only_rule_denials_are_denied() {
        assert!(Error::Denied("nope".into()).is_denied());
        assert!(!Error::InvalidAuthCtx.is_denied());
        assert!(!Error::PolicyNotFound("project".into()).is_denied());
    }
}
