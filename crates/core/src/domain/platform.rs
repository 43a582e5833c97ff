// Platform tag used to pick a command variant

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::DomainError;

/// Operating system family a command line is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    /// Platform of the machine this binary was built for.
    ///
    /// Only the composition root should call this; everything below it
    /// receives the platform as an explicit argument.
    pub fn host() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Posix => "posix",
            Platform::Windows => "windows",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "posix" | "linux" | "unix" | "macos" | "darwin" => Ok(Platform::Posix),
            "windows" | "win32" | "win" => Ok(Platform::Windows),
            other => Err(DomainError::InvalidPlatform(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("linux".parse::<Platform>().unwrap(), Platform::Posix);
        assert_eq!("Win32".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!(" posix ".parse::<Platform>().unwrap(), Platform::Posix);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "plan9".parse::<Platform>().unwrap_err();
        assert_eq!(err, DomainError::InvalidPlatform("plan9".to_string()));
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&Platform::Windows).unwrap();
        assert_eq!(json, format!("\"{}\"", Platform::Windows));
    }
}
