use std::fmt::{Display, Formatter, Result as FormatResult};

use serde_json::{Map, Value};

/// Application-level event exchanged over an established channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A single string payload.
    Primitive(String),
    /// An ordered mapping of string keys to arbitrary JSON values.
    Data(Map<String, Value>),
}

/// Discriminant of [`ChannelEvent`], used in logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEventKind {
    Primitive,
    Data,
}

impl ChannelEvent {
    pub fn primitive(payload: impl Into<String>) -> Self {
        Self::Primitive(payload.into())
    }

    pub fn data(payload: Map<String, Value>) -> Self {
        Self::Data(payload)
    }

    pub fn kind(&self) -> ChannelEventKind {
        match self {
            Self::Primitive(_) => ChannelEventKind::Primitive,
            Self::Data(_) => ChannelEventKind::Data,
        }
    }
}

impl Display for ChannelEventKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::Primitive => write!(formatter, "PRIMITIVE"),
            Self::Data => write!(formatter, "DATA"),
        }
    }
}
