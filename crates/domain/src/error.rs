//! Domain error types.

use thiserror::Error;

use crate::booking::TransitionError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A state transition was rejected.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A money amount could not be parsed.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Malformed booking input. Lists every problem found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", .problems.join("; "))]
pub struct ValidationError {
    problems: Vec<String>,
}

impl ValidationError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// A single-problem validation error.
    pub fn single(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }
}

/// Errors parsing decimal money text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Invalid amount: '{0}'")]
    InvalidFormat(String),

    #[error("Amount '{0}' has more than two decimal places")]
    TooManyDecimalPlaces(String),

    #[error("Amount '{0}' is out of range")]
    Overflow(String),
}
