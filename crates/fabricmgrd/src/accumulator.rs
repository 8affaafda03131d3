//! Deferred error classification.
//!
//! Remote lookups never fail with an error value. They record a classified
//! [`ErrorKind`] here and return `None`, so a multi-step hydration can keep
//! going and the public operation decides at its boundary which single
//! error to report.

use crate::error::FabricError;

/// Classification of a low-level failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection parameters are unusable.
    Configuration,
    /// The remote responded, but its content breaks a topology invariant.
    #[default]
    Control,
    /// Local processing inconsistency.
    Internal,
}

impl ErrorKind {
    /// Resolution order, highest priority first.
    pub const PRIORITY: [ErrorKind; 3] = [
        ErrorKind::Configuration,
        ErrorKind::Control,
        ErrorKind::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Control => "control",
            ErrorKind::Internal => "internal",
        }
    }

    /// Maps the tag to the error reported to the caller.
    pub fn to_error(self) -> FabricError {
        match self {
            ErrorKind::Configuration => FabricError::Configuration,
            ErrorKind::Control => FabricError::ControlObject,
            ErrorKind::Internal => FabricError::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects error tags for one logical operation.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator {
    errors: Vec<ErrorKind>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tag.
    pub fn record(&mut self, kind: ErrorKind) {
        self.errors.push(kind);
    }

    /// Appends the default tag ([`ErrorKind::Control`]).
    pub fn record_default(&mut self) {
        self.record(ErrorKind::default());
    }

    /// Tags recorded so far, in insertion order.
    pub fn errors(&self) -> &[ErrorKind] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.contains(&kind)
    }

    /// Resolves the accumulated tags to one reported kind.
    ///
    /// Configuration wins over control, control over internal. An empty
    /// accumulator resolves to internal: a caller that asks for an error
    /// must never get "no error" back.
    pub fn resolve_kind(&self) -> ErrorKind {
        ErrorKind::PRIORITY
            .into_iter()
            .find(|kind| self.contains(*kind))
            .unwrap_or(ErrorKind::Internal)
    }

    /// Resolves the accumulated tags to the error reported to the caller.
    pub fn resolve(&self) -> FabricError {
        self.resolve_kind().to_error()
    }
}
