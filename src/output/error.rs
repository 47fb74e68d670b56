use std::fmt;

/// Failure reported by a native transport adapter.
///
/// Senders log these and carry on; none of them reaches the frame producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Native library missing, not linked, or failed to initialize.
    Unavailable { transport: &'static str, reason: String },
    /// The send instance / server could not be created.
    HandleCreate { transport: &'static str, reason: String },
    /// The destination (frame descriptor, texture) could not be sized to the frame.
    Allocation { transport: &'static str, width: u32, height: u32, reason: String },
    /// Publishing one frame failed.
    Publish { transport: &'static str, reason: String },
    /// Releasing native resources failed.
    Teardown { transport: &'static str, reason: String },
}

impl TransportError {
    pub fn transport(&self) -> &'static str {
        match self {
            TransportError::Unavailable { transport, .. }
            | TransportError::HandleCreate { transport, .. }
            | TransportError::Allocation { transport, .. }
            | TransportError::Publish { transport, .. }
            | TransportError::Teardown { transport, .. } => transport,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Unavailable { transport, reason } => {
                write!(f, "{transport} not available: {reason}")
            }
            TransportError::HandleCreate { transport, reason } => {
                write!(f, "{transport} sender creation failed: {reason}")
            }
            TransportError::Allocation { transport, width, height, reason } => {
                write!(f, "{transport} destination {width}x{height} allocation failed: {reason}")
            }
            TransportError::Publish { transport, reason } => {
                write!(f, "{transport} send failed: {reason}")
            }
            TransportError::Teardown { transport, reason } => {
                write!(f, "{transport} teardown failed: {reason}")
            }
        }
    }
}

impl std::error::Error for TransportError {}
