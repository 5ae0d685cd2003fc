use crate::ErrorLocation;
use crate::error::model_error::ModelError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

const WILDCARD_ORIGIN: &str = "*";

/// A tuple origin (`scheme://host[:port]`) in its ASCII serialization.
///
/// Only tuple origins can be constructed. The wildcard `*` and opaque origins
/// (`data:`, `file:` and friends) are rejected, so a handshake can never be
/// addressed to "anyone".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Parse any URL and keep only its origin.
    ///
    /// `http://localhost:3000/frame?x=1` and `http://localhost:3000` yield the
    /// same origin; default ports are dropped (`https://a.test:443` becomes
    /// `https://a.test`).
    #[track_caller]
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        let trimmed = input.trim();

        if trimmed == WILDCARD_ORIGIN {
            return Err(ModelError::Validation {
                message: String::from("Wildcard origin is not allowed"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let url = Url::parse(trimmed).map_err(|e| ModelError::Validation {
            message: format!("Invalid origin '{trimmed}': {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(ModelError::Validation {
                message: format!("Opaque origin is not allowed: {trimmed}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Origin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

impl FromStr for Origin {
    type Err = ModelError;

    #[track_caller]
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for Origin {
    type Error = ModelError;

    #[track_caller]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}
