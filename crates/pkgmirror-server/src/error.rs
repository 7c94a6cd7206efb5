//! Maps [`PkgError`] onto HTTP responses per the error-kind table in
//! spec.md §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pkgmirror_core::error::PkgError;

/// Thin wrapper so `PkgError` (defined in `pkgmirror-core`) can implement
/// `IntoResponse` here without an orphan-rule violation.
pub struct HttpError(pub PkgError);

impl From<PkgError> for HttpError {
    fn from(err: PkgError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PkgError::NoMatch { .. } | PkgError::NewerVersionAvailable { .. } => StatusCode::NOT_FOUND,
            PkgError::NoMirrorAvailable { .. } => StatusCode::BAD_GATEWAY,
            PkgError::InvalidFilename { .. } | PkgError::RepoAlreadyAvailable { .. } => StatusCode::NOT_FOUND,
            PkgError::ShortRead { .. } | PkgError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}
