//! Error types for provisioning and workspace creation

use thiserror::Error;

use crate::providers::Operation;

/// Failures of a lifecycle call routed through the provisioner
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The target config names a provider that is not registered
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// The provider itself failed; its error is kept unchanged as the source
    #[error("{operation} failed for {subject}: {source}")]
    ProviderExecution {
        operation: Operation,
        subject: String,
        #[source]
        source: anyhow::Error,
    },

    /// The caller passed a target or workspace that cannot be dispatched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{operation} for {subject} was cancelled")]
    Cancelled {
        operation: Operation,
        subject: String,
    },

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl ProvisionError {
    pub(crate) fn execution(
        operation: Operation,
        subject: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        ProvisionError::ProviderExecution {
            operation,
            subject: subject.into(),
            source,
        }
    }
}

/// Failures while assembling a batch of workspace creation requests
#[derive(Debug, Error)]
pub enum CreationError {
    /// The user cancelled the flow; not a system fault
    #[error("Aborted by user")]
    AbortedByUser,

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A git or selection collaborator failed
    #[error("{operation} failed{}: {message}", status_suffix(.status))]
    Upstream {
        operation: &'static str,
        status: Option<u16>,
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" with status {status}"))
        .unwrap_or_default()
}

/// A failed response from a remote collaborator
///
/// Collaborators backed by an HTTP API return this (wrapped in `anyhow`) so
/// that the status code and the decoded message survive the trip through the
/// assembler.
#[derive(Debug, Clone, Error)]
#[error("{message} (status {status})")]
pub struct UpstreamResponse {
    pub status: u16,
    pub message: String,
}

impl CreationError {
    /// Wraps a collaborator error, decoding an `UpstreamResponse` anywhere in
    /// its chain
    pub fn upstream(operation: &'static str, source: anyhow::Error) -> Self {
        let response = source
            .chain()
            .find_map(|cause| cause.downcast_ref::<UpstreamResponse>())
            .cloned();

        match response {
            Some(response) => CreationError::Upstream {
                operation,
                status: Some(response.status),
                message: response.message,
                source,
            },
            None => CreationError::Upstream {
                operation,
                status: None,
                message: format!("{source:#}"),
                source,
            },
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CreationError::AbortedByUser)
    }
}
