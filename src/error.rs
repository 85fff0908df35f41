use thiserror::Error;

use crate::saslprep::Prohibited;

/// Shorthand for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The SCRAM mechanism error cases.
///
/// None of these is retried internally. Every error terminates the current exchange and the
/// caller decides whether to start a new attempt with a fresh nonce.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The username or password was rejected by SASLprep.
    #[error("invalid profile input: {0}")]
    InvalidProfileInput(#[from] Prohibited),
    /// A message wasn't formatted as required. `Kind` contains further information.
    ///
    /// RFC5802 section 7 describes the format of the exchanged messages.
    #[error("malformed SCRAM message: {0}")]
    MalformedMessage(Kind),
    /// The server responded with a nonce that doesn't start with our nonce.
    #[error("server nonce does not extend the client nonce")]
    NonceMismatch,
    /// The server didn't offer `SCRAM-SHA-256`. Contains the mechanisms it did offer.
    #[error("SCRAM-SHA-256 not offered by server (offered: {0:?})")]
    UnsupportedMechanism(Vec<String>),
    /// The server required a mandatory extension to be present that this client doesn't support.
    #[error("unsupported mandatory extension")]
    UnsupportedExtension,
    /// The server asked for more key derivation rounds than the configured ceiling allows.
    #[error("iteration count {0} exceeds the configured maximum")]
    IterationsTooHigh(u32),
    /// The server signature couldn't be validated.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// The server rejected the authentication request. Contains the server's error value.
    #[error("server rejected authentication: {0}")]
    ServerError(String),
}

/// The kinds of malformed messages.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum Kind {
    /// The content of the field `Field` is invalid.
    #[error("invalid field {0:?}")]
    InvalidField(Field),
    /// The field `Field` was expected but not found.
    #[error("expected field {0:?}")]
    ExpectedField(Field),
    /// The field `Field` occurred more than once.
    #[error("duplicate field {0:?}")]
    DuplicateField(Field),
    /// A segment that isn't an attribute accepted by this message type.
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),
    /// A client-first message without the `n,,` GS2 header.
    #[error("missing GS2 header")]
    MissingGs2Header,
    /// The payload isn't valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    /// A frame ended before its declared length.
    #[error("truncated frame")]
    Truncated,
    /// A declared length doesn't match the bytes that follow it.
    #[error("length prefix does not match payload")]
    LengthMismatch,
    /// A frame whose type byte isn't the one expected.
    #[error("unexpected frame tag {0:#04x}")]
    UnexpectedTag(u8),
    /// An authentication frame with a code other than the one expected.
    #[error("unexpected authentication frame (code {0})")]
    UnexpectedFrame(i32),
    /// A mechanism name that isn't NUL-terminated printable ASCII.
    #[error("invalid mechanism name")]
    InvalidMechanismName,
}

/// The fields used in the exchanged messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Nonce
    Nonce,
    /// Salt
    Salt,
    /// Iterations
    Iterations,
    /// Verifier
    Verifier,
    /// Channel Binding
    ChannelBinding,
    /// Authcid
    Authcid,
    /// Client Proof
    Proof,
}

impl From<Kind> for Error {
    fn from(kind: Kind) -> Self {
        Error::MalformedMessage(kind)
    }
}
