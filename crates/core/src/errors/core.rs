use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::container::key::TypeKey;

/// Boxed error returned by user-supplied constructors
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency chain that was active when a resolution failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTrace {
    /// Keys on the failing call chain, outermost first, ending with the failing key
    pub chain: Vec<TypeKey>,
    /// Every key in flight across the container at the time of failure
    pub in_flight: Vec<TypeKey>,
}

impl ResolutionTrace {
    pub fn new(chain: Vec<TypeKey>, in_flight: Vec<TypeKey>) -> Self {
        Self { chain, in_flight }
    }

    /// The call chain rendered as `A -> B -> C`
    pub fn path_string(&self) -> String {
        if self.chain.is_empty() {
            return "<root>".to_string();
        }
        self.chain
            .iter()
            .map(|key| key.short_name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check whether a key appears on the chain or among the in-flight keys
    pub fn mentions(&self, key: &TypeKey) -> bool {
        self.chain.contains(key) || self.in_flight.contains(key)
    }
}

impl std::fmt::Display for ResolutionTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let in_flight = self
            .in_flight
            .iter()
            .map(|key| key.short_name())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "chain: {}; in flight: [{}]", self.path_string(), in_flight)
    }
}

/// Error type for component registration and resolution
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Component not registered: {key} ({trace})")]
    NotRegistered { key: TypeKey, trace: ResolutionTrace },

    #[error("Circular dependency detected at {key} ({trace})")]
    CircularDependency { key: TypeKey, trace: ResolutionTrace },

    #[error("Constructor for '{key}' failed: {source} ({trace})")]
    ConstructorFailed {
        key: TypeKey,
        source: BoxError,
        trace: ResolutionTrace,
    },

    #[error("Constructor for '{key}' panicked: {message} ({trace})")]
    ConstructorPanicked {
        key: TypeKey,
        message: String,
        trace: ResolutionTrace,
    },

    #[error("Constructor for '{key}' did not complete within {timeout:?}, possible deadlock ({trace})")]
    Timeout {
        key: TypeKey,
        timeout: Duration,
        trace: ResolutionTrace,
    },

    #[error("Component '{key}' is not of the requested type {expected}")]
    TypeMismatch { key: TypeKey, expected: &'static str },

    #[error("Lock error on resource: {resource}")]
    LockPoisoned { resource: String },

    #[error("Failed to spawn constructor worker for '{key}': {source}")]
    WorkerSpawn {
        key: TypeKey,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ContainerError {
    /// Create a lock error for a named resource
    pub fn lock_poisoned(resource: impl Into<String>) -> Self {
        Self::LockPoisoned {
            resource: resource.into(),
        }
    }

    /// The key the failed resolution was for, if any
    pub fn key(&self) -> Option<&TypeKey> {
        match self {
            Self::NotRegistered { key, .. }
            | Self::CircularDependency { key, .. }
            | Self::ConstructorFailed { key, .. }
            | Self::ConstructorPanicked { key, .. }
            | Self::Timeout { key, .. }
            | Self::TypeMismatch { key, .. }
            | Self::WorkerSpawn { key, .. } => Some(key),
            Self::LockPoisoned { .. } | Self::Configuration(_) => None,
        }
    }

    /// Diagnostic chain attached to resolution failures
    pub fn trace(&self) -> Option<&ResolutionTrace> {
        match self {
            Self::NotRegistered { trace, .. }
            | Self::CircularDependency { trace, .. }
            | Self::ConstructorFailed { trace, .. }
            | Self::ConstructorPanicked { trace, .. }
            | Self::Timeout { trace, .. } => Some(trace),
            _ => None,
        }
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True when the constructor ran and either returned an error or panicked
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            Self::ConstructorFailed { .. } | Self::ConstructorPanicked { .. }
        )
    }
}
