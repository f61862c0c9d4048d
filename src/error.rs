use std::time::Duration;

pub type Result<T> = std::result::Result<T, CqlError>;

/// Everything that can go wrong while talking to a node. Transport, protocol
/// and server errors all force the connection closed; usage errors never
/// touch the socket.
#[derive(Debug, thiserror::Error)]
pub enum CqlError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error 0x{code:04X}: {message}")]
    Server { code: u32, message: String },

    #[error("usage error: {0}")]
    Usage(String),
}

impl CqlError {
    pub(crate) fn protocol(msg: impl Into<String>) -> CqlError {
        CqlError::Protocol(msg.into())
    }

    pub(crate) fn usage(msg: impl Into<String>) -> CqlError {
        CqlError::Usage(msg.into())
    }

    /// Named kind for a decoded ERROR frame, if this is one.
    pub fn kind(&self) -> Option<ServerErrorKind> {
        match self {
            CqlError::Server { code, .. } => ServerErrorKind::from_code(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServerErrorKind {
    ServerError,
    ProtocolError,
    BadCredentials,
    Unavailable,
    Overloaded,
    IsBootstrapping,
    TruncateError,
    ReadTimeout,
    WriteTimeout,
    ReadFailure,
    WriteFailure,
    FunctionFailure,
    SyntaxError,
    Unauthorized,
    Invalid,
    ConfigError,
    AlreadyExists,
    Unprepared,
}

impl ServerErrorKind {
    pub fn from_code(code: u32) -> Option<ServerErrorKind> {
        match code {
            0x0000 => Some(ServerErrorKind::ServerError),
            0x000A => Some(ServerErrorKind::ProtocolError),
            0x0100 => Some(ServerErrorKind::BadCredentials),
            0x1000 => Some(ServerErrorKind::Unavailable),
            0x1001 => Some(ServerErrorKind::Overloaded),
            0x1002 => Some(ServerErrorKind::IsBootstrapping),
            0x1003 => Some(ServerErrorKind::TruncateError),
            0x1100 => Some(ServerErrorKind::WriteTimeout),
            0x1200 => Some(ServerErrorKind::ReadTimeout),
            0x1300 => Some(ServerErrorKind::ReadFailure),
            0x1400 => Some(ServerErrorKind::FunctionFailure),
            0x1500 => Some(ServerErrorKind::WriteFailure),
            0x2000 => Some(ServerErrorKind::SyntaxError),
            0x2100 => Some(ServerErrorKind::Unauthorized),
            0x2200 => Some(ServerErrorKind::Invalid),
            0x2300 => Some(ServerErrorKind::ConfigError),
            0x2400 => Some(ServerErrorKind::AlreadyExists),
            0x2500 => Some(ServerErrorKind::Unprepared),
            _ => None,
        }
    }
}
