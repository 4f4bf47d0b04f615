//! Library version.

use std::fmt;

/// Version of this client library.
pub struct Version;

impl Version {
    pub const MAJOR: u32 = 0;
    pub const MINOR: u32 = 0;
    pub const PATCH: u32 = 9;
    pub const PRE: Option<&'static str> = None;

    /// Default `User-Agent` sent by [`crate::http::Client`].
    pub fn user_agent() -> String {
        format!("thecity-rs/{}", Version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", Self::MAJOR, Self::MINOR, Self::PATCH)?;
        if let Some(pre) = Self::PRE {
            write!(f, ".{}", pre)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display() {
        assert_eq!(Version.to_string(), "0.0.9");
    }

    #[test]
    fn test_version_matches_package() {
        assert_eq!(Version.to_string(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_user_agent() {
        assert_eq!(Version::user_agent(), "thecity-rs/0.0.9");
    }
}
