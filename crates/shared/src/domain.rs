use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UnknownHowSolved;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(AssignmentId);

/// How a solved assignment was solved. This is the only thing a client may
/// submit; clearing a status is a separate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolvedKind {
    #[serde(rename = "bymyself")]
    ByMyself,
    #[serde(rename = "withhelp")]
    WithHelp,
}

impl SolvedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SolvedKind::ByMyself => "bymyself",
            SolvedKind::WithHelp => "withhelp",
        }
    }
}

/// Per-user status of one assignment.
///
/// On the wire a missing record is `null` (or an empty string in server
/// rendered pages), so the enum round-trips through `Option<String>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum HowSolvedStatus {
    #[default]
    NotSolved,
    SolvedByMyself,
    SolvedWithHelp,
}

impl HowSolvedStatus {
    pub fn parse(raw: Option<&str>) -> Result<Self, UnknownHowSolved> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::NotSolved),
            Some("bymyself") => Ok(Self::SolvedByMyself),
            Some("withhelp") => Ok(Self::SolvedWithHelp),
            Some(other) => Err(UnknownHowSolved(other.to_string())),
        }
    }

    pub fn kind(self) -> Option<SolvedKind> {
        match self {
            Self::NotSolved => None,
            Self::SolvedByMyself => Some(SolvedKind::ByMyself),
            Self::SolvedWithHelp => Some(SolvedKind::WithHelp),
        }
    }

    pub fn is_solved(self) -> bool {
        self != Self::NotSolved
    }
}

impl From<SolvedKind> for HowSolvedStatus {
    fn from(kind: SolvedKind) -> Self {
        match kind {
            SolvedKind::ByMyself => Self::SolvedByMyself,
            SolvedKind::WithHelp => Self::SolvedWithHelp,
        }
    }
}

impl TryFrom<Option<String>> for HowSolvedStatus {
    type Error = UnknownHowSolved;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        Self::parse(value.as_deref())
    }
}

impl From<HowSolvedStatus> for Option<String> {
    fn from(value: HowSolvedStatus) -> Self {
        value.kind().map(|kind| kind.as_str().to_string())
    }
}

impl fmt::Display for HowSolvedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => f.write_str(kind.as_str()),
            None => f.write_str("notsolved"),
        }
    }
}
