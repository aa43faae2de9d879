//! In-process messages exchanged between the roster coordinator and its surfaces.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{domain::Member, error::ProtocolError};

/// How a record-carrying notification is applied to the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MemberMode {
    Add,
    Update,
}

impl MemberMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Update => "Update",
        }
    }
}

impl fmt::Display for MemberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("add") {
            Ok(Self::Add)
        } else if trimmed.eq_ignore_ascii_case("update") {
            Ok(Self::Update)
        } else {
            Err(ProtocolError::UnknownMode(s.to_string()))
        }
    }
}

impl TryFrom<String> for MemberMode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MemberMode> for String {
    fn from(value: MemberMode) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ControlKind {
    Delete,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("delete") {
            Ok(Self::Delete)
        } else {
            Err(ProtocolError::UnknownControlKind(s.to_string()))
        }
    }
}

impl TryFrom<String> for ControlKind {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ControlKind> for String {
    fn from(value: ControlKind) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberNotification {
    pub member: Member,
    pub mode: MemberMode,
}

impl MemberNotification {
    pub fn add(member: Member) -> Self {
        Self {
            member,
            mode: MemberMode::Add,
        }
    }

    pub fn update(member: Member) -> Self {
        Self {
            member,
            mode: MemberMode::Update,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlNotification {
    pub kind: ControlKind,
}

impl ControlNotification {
    pub fn delete() -> Self {
        Self {
            kind: ControlKind::Delete,
        }
    }
}

/// Published to a freshly opened edit surface so it can pre-populate its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditTarget {
    pub member: Member,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
