use std::fmt;

#[doc(hidden)]
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A list specifying categories of binding engine errors
///
/// used with the [`Error`] type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expression text could not be parsed
    Parse,
    /// A value could not be serialized or deserialized into the requested type
    Serialization,
    /// The node does not exist in the view tree (or it has been torn down)
    NodeNotFound,
    /// The node already declares a context
    ContextAlreadyDeclared,
    /// The context id is reserved by the engine and cannot be declared by a node
    ReservedContext,
    /// No context with the requested id is visible from the node
    UnresolvedContext,
    /// A path segment points into a value of an incompatible kind
    StructuralConflict,
    /// A deep link route pattern is not valid
    InvalidRoute,
    /// An external collaborator (renderer, network, deep link handler) failed
    Platform,
}

impl ErrorKind {
    pub(crate) fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match *self {
            Parse => "malformed expression",
            Serialization => "serialization failed",
            NodeNotFound => "node not found",
            ContextAlreadyDeclared => "node already declares a context",
            ReservedContext => "context id is reserved",
            UnresolvedContext => "context not found in scope",
            StructuralConflict => "path segment has an incompatible kind",
            InvalidRoute => "invalid route",
            Platform => "platform error",
        }
    }
}

impl fmt::Display for ErrorKind {
    /// Shows a human-readable description of the `ErrorKind`.
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error { kind, error: None }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::new(ErrorKind::Serialization, e)
    }
}

impl From<crate::expression::ParseError> for Error {
    fn from(e: crate::expression::ParseError) -> Self {
        Error::new(ErrorKind::Parse, e)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    error: Option<BoxError>,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    /// Shows a human-readable description of the `Error`.
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = self.error.as_ref() {
            write!(fmt, "{}: {source}", self.kind.as_str())
        } else {
            write!(fmt, "{}", self.kind.as_str())
        }
    }
}

impl Error {
    pub fn new<E: Into<BoxError>>(kind: ErrorKind, error: E) -> Self {
        Self {
            kind,
            error: Some(error.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn source(&self) -> Option<&BoxError> {
        self.error.as_ref()
    }

    pub(crate) fn node_not_found(node: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NodeNotFound, format!("no live node {node}"))
    }

    pub(crate) fn unresolved(id: &str) -> Self {
        Self::new(ErrorKind::UnresolvedContext, format!("'{id}'"))
    }

    pub fn platform(error: anyhow::Error) -> Self {
        Self::new(ErrorKind::Platform, error)
    }

    /// Returns true for errors that leave the engine unchanged and are only
    /// reported for diagnostics
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnresolvedContext | ErrorKind::StructuralConflict
        )
    }
}
