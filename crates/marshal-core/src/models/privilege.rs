//! Privileges a plan may require from its caller.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A system privilege declared by a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Privilege {
    /// Change cluster topology and services
    #[serde(rename = "SYSOPER")]
    SysOper,
    /// View cluster configuration
    #[serde(rename = "SYSVIEW")]
    SysView,
    /// Define and drop tables and indexes
    #[serde(rename = "DBVIEW")]
    DbView,
    /// Read user data
    #[serde(rename = "USRVIEW")]
    UsrView,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::SysOper => "SYSOPER",
            Privilege::SysView => "SYSVIEW",
            Privilege::DbView => "DBVIEW",
            Privilege::UsrView => "USRVIEW",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SYSOPER" => Ok(Privilege::SysOper),
            "SYSVIEW" => Ok(Privilege::SysView),
            "DBVIEW" => Ok(Privilege::DbView),
            "USRVIEW" => Ok(Privilege::UsrView),
            _ => Err(format!("Invalid privilege: {s}")),
        }
    }
}
