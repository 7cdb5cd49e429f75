use std::{error, fmt};

/// Everything that can stop the pipeline, grouped the way the batch binary reports failures.
/// Input problems name the offending file and field; invariant violations mean a bug in the
/// aggregation code, not bad data.
#[derive(Debug)]
pub enum Error {
    /// Missing file, malformed geometry, unreadable table.
    Input(String),
    /// A required column is absent or has the wrong type.
    Schema(String),
    /// A layer's coordinates aren't in the expected reference system.
    Crs(String),
    /// The POI class column is absent entirely.
    Mapping(String),
    /// A post-aggregation check failed.
    Invariant(String),
}

impl Error {
    pub fn input<S: Into<String>>(msg: S) -> Error {
        Error::Input(msg.into())
    }

    pub fn schema<S: Into<String>>(msg: S) -> Error {
        Error::Schema(msg.into())
    }

    pub fn crs<S: Into<String>>(msg: S) -> Error {
        Error::Crs(msg.into())
    }

    pub fn mapping<S: Into<String>>(msg: S) -> Error {
        Error::Mapping(msg.into())
    }

    pub fn invariant<S: Into<String>>(msg: S) -> Error {
        Error::Invariant(msg.into())
    }

    /// The process exit code the batch binary reports for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Input(_) | Error::Schema(_) | Error::Mapping(_) => 1,
            Error::Crs(_) => 2,
            Error::Invariant(_) => 3,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Input(msg) => write!(f, "input error: {}", msg),
            Error::Schema(msg) => write!(f, "schema error: {}", msg),
            Error::Crs(msg) => write!(f, "CRS error: {}", msg),
            Error::Mapping(msg) => write!(f, "mapping error: {}", msg),
            Error::Invariant(msg) => write!(f, "invariant violated: {}", msg),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Error::input("x").exit_code(), 1);
        assert_eq!(Error::schema("x").exit_code(), 1);
        assert_eq!(Error::mapping("x").exit_code(), 1);
        assert_eq!(Error::crs("x").exit_code(), 2);
        assert_eq!(Error::invariant("x").exit_code(), 3);
    }
}
