use thiserror::Error;

#[derive(Error, Debug)]
pub enum HueError {
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    FromHexError(#[from] hex::FromHexError),

    #[error("Invalid color string {0:?}, expected 6 hex digits")]
    InvalidColor(String),
}

pub type HueResult<T> = Result<T, HueError>;

/// Error codes reported by the v1 api in the `type` field of an error object.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HueApiV1Error {
    #[error("unauthorized user")]
    UnauthorizedUser,
    #[error("body contains invalid JSON")]
    BodyContainsInvalidJson,
    #[error("resource not available")]
    ResourceNotAvailable,
    #[error("method not available for resource")]
    MethodNotAvailable,
    #[error("missing parameters in body")]
    MissingParameters,
    #[error("parameter not available")]
    ParameterNotAvailable,
    #[error("invalid value for parameter")]
    InvalidValueForParameter,
    #[error("parameter is not modifiable")]
    ParameterNotModifiable,
    #[error("too many items in list")]
    TooManyItemsInList,
    #[error("portal connection required")]
    PortalConnectionRequired,
    #[error("link button not pressed")]
    LinkButtonNotPressed,
    #[error("device is set to off")]
    DeviceIsSetToOff,
    #[error("internal error")]
    InternalError,
    #[error("unknown error code {0}")]
    Other(u32),
}

impl HueApiV1Error {
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::UnauthorizedUser,
            2 => Self::BodyContainsInvalidJson,
            3 => Self::ResourceNotAvailable,
            4 => Self::MethodNotAvailable,
            5 => Self::MissingParameters,
            6 => Self::ParameterNotAvailable,
            7 => Self::InvalidValueForParameter,
            8 => Self::ParameterNotModifiable,
            11 => Self::TooManyItemsInList,
            12 => Self::PortalConnectionRequired,
            101 => Self::LinkButtonNotPressed,
            201 => Self::DeviceIsSetToOff,
            901 => Self::InternalError,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::UnauthorizedUser => 1,
            Self::BodyContainsInvalidJson => 2,
            Self::ResourceNotAvailable => 3,
            Self::MethodNotAvailable => 4,
            Self::MissingParameters => 5,
            Self::ParameterNotAvailable => 6,
            Self::InvalidValueForParameter => 7,
            Self::ParameterNotModifiable => 8,
            Self::TooManyItemsInList => 11,
            Self::PortalConnectionRequired => 12,
            Self::LinkButtonNotPressed => 101,
            Self::DeviceIsSetToOff => 201,
            Self::InternalError => 901,
            Self::Other(code) => *code,
        }
    }
}
