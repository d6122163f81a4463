use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Scanning module owning one of the five sub-configurations of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Module {
    Ns,
    Brute,
    Port,
    Web,
    Keyword,
}

impl Module {
    pub const ALL: [Module; 5] = [
        Module::Ns,
        Module::Brute,
        Module::Port,
        Module::Web,
        Module::Keyword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Ns => "ns",
            Module::Brute => "brute",
            Module::Port => "port",
            Module::Web => "web",
            Module::Keyword => "keyword",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named scanning activity gated by admission control. Each phase owns a
/// distinct lease namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    NsLookup,
    BruteZone,
    MutateZone,
    WebAnalyze,
    BigdataLookup,
    PortScan,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::NsLookup,
        Phase::BruteZone,
        Phase::MutateZone,
        Phase::WebAnalyze,
        Phase::BigdataLookup,
        Phase::PortScan,
    ];

    /// Key segment for the phase's leases.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::NsLookup => "ns",
            Phase::BruteZone => "brute",
            Phase::MutateZone => "mutate",
            Phase::WebAnalyze => "web",
            Phase::BigdataLookup => "bigdata",
            Phase::PortScan => "port",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "phase",
                value: s.to_string(),
            })
    }
}
