use serde::Serialize;
use thiserror::Error;

/// Camera bridge errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera permission not granted")]
    PermissionDenied,

    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera configuration failed: {0}")]
    Configuration(String),

    #[error("preview stream failed: {0}")]
    Stream(String),

    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("settings error: {0}")]
    Settings(String),
}

impl CameraError {
    /// Discriminant used when reporting the error over a string channel.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Stream(_) => ErrorKind::Stream,
            Self::AlreadyActive => ErrorKind::AlreadyActive,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Settings(_) => ErrorKind::Settings,
        }
    }
}

/// Serialisable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    Configuration,
    Stream,
    AlreadyActive,
    Encode,
    Settings,
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = CameraError::DeviceUnavailable("camera 0 busy".to_string());
        assert_eq!(err.to_string(), "camera unavailable: camera 0 busy");
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(CameraError::PermissionDenied.kind(), ErrorKind::PermissionDenied);
        assert_eq!(
            CameraError::Stream("boom".to_string()).kind(),
            ErrorKind::Stream
        );
        assert_eq!(CameraError::AlreadyActive.kind(), ErrorKind::AlreadyActive);
    }

    #[test]
    fn kind_serialises_to_camelcase() {
        let json = serde_json::to_value(ErrorKind::DeviceUnavailable).unwrap();
        assert_eq!(json, "deviceUnavailable");
    }
}
