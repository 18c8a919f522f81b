use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A principal reference as it appears in a request or an ACL entry.
///
/// Groups are written `@name`. `*` matches any authenticated or anonymous
/// caller. `anonymous` and `admin` are reserved words and cannot be used as
/// user names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Member {
    User(String),
    Group(String),
    /// The `*` wildcard.
    Anyone,
    Anonymous,
    /// The reserved daemon principal, resolved through the daemon-ACL table.
    Admin,
}

impl Member {
    pub fn user<S: Into<String>>(name: S) -> Self {
        Self::User(name.into())
    }

    pub fn group<S: Into<String>>(name: S) -> Self {
        Self::Group(name.into())
    }

    pub fn is_exempt_from_study_precondition(&self) -> bool {
        matches!(self, Self::Anyone | Self::Anonymous)
    }
}

impl std::fmt::Display for Member {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::User(name) => write!(fmt, "{name}"),
            Self::Group(name) => write!(fmt, "@{name}"),
            Self::Anyone => write!(fmt, "*"),
            Self::Anonymous => write!(fmt, "anonymous"),
            Self::Admin => write!(fmt, "admin"),
        }
    }
}

impl From<Member> for String {
    fn from(member: Member) -> String {
        member.to_string()
    }
}

impl FromStr for Member {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "" => Err("empty member reference".to_string()),
            "*" => Ok(Self::Anyone),
            "anonymous" => Ok(Self::Anonymous),
            "admin" => Ok(Self::Admin),
            s => match s.strip_prefix('@') {
                Some("") => Err("empty group name in member reference".to_string()),
                Some(group) => Ok(Self::Group(group.to_string())),
                None => Ok(Self::User(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Member {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        s.parse()
    }
}
