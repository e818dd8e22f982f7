use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{
        availability::{AvailabilityError, RecurrenceError},
        notify::NotifyError,
        repos::RepoError,
    },
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Top-level failure of a binary command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code, following the BSD `sysexits` conventions.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Domain(err) if err.is_not_found() => 66,
            AppError::Domain(err) if err.is_conflict() => 73,
            AppError::Domain(_) | AppError::Validation(_) => 65,
            AppError::Repo(RepoError::InvalidInput { .. }) => 65,
            AppError::Repo(err) if err.is_duplicate() => 73,
            AppError::Notify(NotifyError::CalendarNotFound) => 66,
            AppError::Config(_) | AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Repo(_)
            | AppError::Notify(NotifyError::Repo(_))
            | AppError::Infra(InfraError::Database { .. }) => 69,
            AppError::Infra(InfraError::Io(_)) => 74,
            AppError::Infra(_) | AppError::Unexpected(_) => 70,
        }
    }

    /// The error followed by each of its sources, outermost first.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            let message = inner.to_string();
            if messages.last() != Some(&message) {
                messages.push(message);
            }
            current = inner.source();
        }
        messages
    }
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::Domain(err) => Self::Domain(err),
            AvailabilityError::Repo(err) => Self::Repo(err),
        }
    }
}

impl From<RecurrenceError> for AppError {
    fn from(error: RecurrenceError) -> Self {
        match error {
            RecurrenceError::Domain(err) => Self::Domain(err),
            RecurrenceError::Repo(err) => Self::Repo(err),
        }
    }
}
