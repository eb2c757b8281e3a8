//! Error taxonomy of the binding.
//!
//! Native status codes are checked immediately after every call and converted
//! here; they are never silently ignored.

use std::time::Duration;

use respot_core::ffi::{self, sp_error};
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A null handle was wrapped, or a released handle was used.
    #[error("invalid native handle")]
    InvalidHandle,

    /// The native parser rejected a URI string.
    #[error("failed to parse URI: {0:?}")]
    InvalidUri(String),

    /// A blocking `load` or wait did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// `relogin` was called with no remembered user.
    #[error("no stored credentials")]
    NoStoredCredentials,

    /// The native library reported an error status.
    #[error("native library error: {0}")]
    Library(#[from] LibError),
}

/// Typed form of the native status code enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LibError {
    #[error("bad API version")]
    BadApiVersion,
    #[error("API initialization failed")]
    ApiInitializationFailed,
    #[error("track not playable")]
    TrackNotPlayable,
    #[error("bad application key")]
    BadApplicationKey,
    #[error("bad username or password")]
    BadUsernameOrPassword,
    #[error("user banned")]
    UserBanned,
    #[error("unable to contact server")]
    UnableToContactServer,
    #[error("client too old")]
    ClientTooOld,
    #[error("other permanent error")]
    OtherPermanent,
    #[error("bad user agent")]
    BadUserAgent,
    #[error("missing callback")]
    MissingCallback,
    #[error("invalid input data")]
    InvalidInData,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("user needs premium")]
    UserNeedsPremium,
    #[error("other transient error")]
    OtherTransient,
    #[error("object is loading")]
    IsLoading,
    #[error("no stream available")]
    NoStreamAvailable,
    #[error("permission denied")]
    PermissionDenied,
    #[error("inbox is full")]
    InboxIsFull,
    #[error("no cache")]
    NoCache,
    #[error("no such user")]
    NoSuchUser,
    #[error("no credentials")]
    NoCredentials,
    #[error("network disabled")]
    NetworkDisabled,
    #[error("invalid device id")]
    InvalidDeviceId,
    #[error("cannot open trace file")]
    CantOpenTraceFile,
    #[error("application banned")]
    ApplicationBanned,
    #[error("offline: too many tracks")]
    OfflineTooManyTracks,
    #[error("offline: disk cache error")]
    OfflineDiskCache,
    #[error("offline: cache expired")]
    OfflineExpired,
    #[error("offline: not allowed")]
    OfflineNotAllowed,
    #[error("offline: license lost")]
    OfflineLicenseLost,
    #[error("offline: license error")]
    OfflineLicenseError,
    #[error("last.fm authentication error")]
    LastfmAuthError,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("system failure")]
    SystemFailure,
    #[error("unknown native error code {0}")]
    Unknown(i32),
}

impl LibError {
    /// Maps a native status code; `None` for success.
    pub fn from_code(code: sp_error) -> Option<LibError> {
        let error = match code {
            ffi::SP_ERROR_OK => return None,
            ffi::SP_ERROR_BAD_API_VERSION => LibError::BadApiVersion,
            ffi::SP_ERROR_API_INITIALIZATION_FAILED => LibError::ApiInitializationFailed,
            ffi::SP_ERROR_TRACK_NOT_PLAYABLE => LibError::TrackNotPlayable,
            ffi::SP_ERROR_BAD_APPLICATION_KEY => LibError::BadApplicationKey,
            ffi::SP_ERROR_BAD_USERNAME_OR_PASSWORD => LibError::BadUsernameOrPassword,
            ffi::SP_ERROR_USER_BANNED => LibError::UserBanned,
            ffi::SP_ERROR_UNABLE_TO_CONTACT_SERVER => LibError::UnableToContactServer,
            ffi::SP_ERROR_CLIENT_TOO_OLD => LibError::ClientTooOld,
            ffi::SP_ERROR_OTHER_PERMANENT => LibError::OtherPermanent,
            ffi::SP_ERROR_BAD_USER_AGENT => LibError::BadUserAgent,
            ffi::SP_ERROR_MISSING_CALLBACK => LibError::MissingCallback,
            ffi::SP_ERROR_INVALID_INDATA => LibError::InvalidInData,
            ffi::SP_ERROR_INDEX_OUT_OF_RANGE => LibError::IndexOutOfRange,
            ffi::SP_ERROR_USER_NEEDS_PREMIUM => LibError::UserNeedsPremium,
            ffi::SP_ERROR_OTHER_TRANSIENT => LibError::OtherTransient,
            ffi::SP_ERROR_IS_LOADING => LibError::IsLoading,
            ffi::SP_ERROR_NO_STREAM_AVAILABLE => LibError::NoStreamAvailable,
            ffi::SP_ERROR_PERMISSION_DENIED => LibError::PermissionDenied,
            ffi::SP_ERROR_INBOX_IS_FULL => LibError::InboxIsFull,
            ffi::SP_ERROR_NO_CACHE => LibError::NoCache,
            ffi::SP_ERROR_NO_SUCH_USER => LibError::NoSuchUser,
            ffi::SP_ERROR_NO_CREDENTIALS => LibError::NoCredentials,
            ffi::SP_ERROR_NETWORK_DISABLED => LibError::NetworkDisabled,
            ffi::SP_ERROR_INVALID_DEVICE_ID => LibError::InvalidDeviceId,
            ffi::SP_ERROR_CANT_OPEN_TRACE_FILE => LibError::CantOpenTraceFile,
            ffi::SP_ERROR_APPLICATION_BANNED => LibError::ApplicationBanned,
            ffi::SP_ERROR_OFFLINE_TOO_MANY_TRACKS => LibError::OfflineTooManyTracks,
            ffi::SP_ERROR_OFFLINE_DISK_CACHE => LibError::OfflineDiskCache,
            ffi::SP_ERROR_OFFLINE_EXPIRED => LibError::OfflineExpired,
            ffi::SP_ERROR_OFFLINE_NOT_ALLOWED => LibError::OfflineNotAllowed,
            ffi::SP_ERROR_OFFLINE_LICENSE_LOST => LibError::OfflineLicenseLost,
            ffi::SP_ERROR_OFFLINE_LICENSE_ERROR => LibError::OfflineLicenseError,
            ffi::SP_ERROR_LASTFM_AUTH_ERROR => LibError::LastfmAuthError,
            ffi::SP_ERROR_INVALID_ARGUMENT => LibError::InvalidArgument,
            ffi::SP_ERROR_SYSTEM_FAILURE => LibError::SystemFailure,
            other => LibError::Unknown(other),
        };
        Some(error)
    }
}

/// Error for call sites where the native side signaled failure out of band
/// (for example a failed `create` that returned a status code).
pub(crate) fn lib_error(code: sp_error) -> Error {
    Error::Library(LibError::from_code(code).unwrap_or(LibError::Unknown(code)))
}

/// Converts a native status code into a `Result`.
pub fn check(code: sp_error) -> Result<()> {
    match LibError::from_code(code) {
        None => Ok(()),
        Some(error) => Err(Error::Library(error)),
    }
}
