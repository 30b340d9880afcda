//! Classification of launch failures into retry decisions.
//!
//! The provider's error surface is uncontrolled, so matching is driven by an
//! ordered rule table rather than inline conditionals. The first matching
//! rule wins; errors that match nothing are [`FailureClass::Other`].

use crate::provider::{LaunchedInstance, ProviderError};

/// Message returned when a domain has no capacity left for the shape.
pub const OUT_OF_HOST_CAPACITY: &str = "Out of host capacity.";

/// Service code returned alongside HTTP 429.
pub const TOO_MANY_REQUESTS: &str = "TooManyRequests";

/// Outcome of a single launch attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttemptOutcome {
    /// The instance was created.
    Success(LaunchedInstance),
    /// The provider throttled the request.
    RateLimited,
    /// The domain has no capacity for the requested shape.
    CapacityExhausted,
    /// Any other failure, kept for logging.
    OtherError(ProviderError),
}

/// Failure categories produced by the classifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    /// Throttled; recover by backing off.
    RateLimited,
    /// Out of capacity; recover by deferring.
    CapacityExhausted,
    /// Unrecognised failure.
    Other,
}

/// Shape of an error a rule matches against.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorPattern {
    /// Exact HTTP status.
    Status(u16),
    /// Exact provider service code.
    ServiceCode(String),
    /// Exact error message.
    Message(String),
}

impl ErrorPattern {
    fn matches(&self, err: &ProviderError) -> bool {
        match self {
            Self::Status(status) => err.status() == Some(*status),
            Self::ServiceCode(code) => err.service_code() == Some(code.as_str()),
            Self::Message(message) => err.message() == Some(message.as_str()),
        }
    }
}

/// A single row of the classification table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassificationRule {
    /// Pattern to match.
    pub pattern: ErrorPattern,
    /// Class assigned when the pattern matches.
    pub class: FailureClass,
}

impl ClassificationRule {
    /// Creates a rule.
    #[must_use]
    pub const fn new(pattern: ErrorPattern, class: FailureClass) -> Self {
        Self { pattern, class }
    }
}

/// Ordered rule table mapping provider errors to [`FailureClass`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule::new(ErrorPattern::Status(429), FailureClass::RateLimited),
            ClassificationRule::new(
                ErrorPattern::ServiceCode(TOO_MANY_REQUESTS.to_owned()),
                FailureClass::RateLimited,
            ),
            ClassificationRule::new(
                ErrorPattern::Message(OUT_OF_HOST_CAPACITY.to_owned()),
                FailureClass::CapacityExhausted,
            ),
        ])
    }
}

impl ErrorClassifier {
    /// Creates a classifier from an explicit rule table.
    #[must_use]
    pub const fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Appends a rule, evaluated after the existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the rule table in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classifies a provider error.
    #[must_use]
    pub fn classify(&self, err: &ProviderError) -> FailureClass {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(err))
            .map_or(FailureClass::Other, |rule| rule.class)
    }

    /// Turns the raw result of a launch call into an [`AttemptOutcome`].
    #[must_use]
    pub fn outcome(&self, result: Result<LaunchedInstance, ProviderError>) -> AttemptOutcome {
        match result {
            Ok(instance) => AttemptOutcome::Success(instance),
            Err(err) => match self.classify(&err) {
                FailureClass::RateLimited => AttemptOutcome::RateLimited,
                FailureClass::CapacityExhausted => AttemptOutcome::CapacityExhausted,
                FailureClass::Other => AttemptOutcome::OtherError(err),
            },
        }
    }
}
