//! Deployment environments

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Deployment environment a budget is resolved for.
///
/// Ordered from the lowest tier to the highest; budget bounds widen in the
/// same order. Goes through its string tag on the wire so it can key maps in
/// both TOML and JSON documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Environment {
    IntStable,
    PreStable,
    Prod,
}

impl Environment {
    /// Every environment, lowest tier first.
    pub const ALL: [Self; 3] = [Self::IntStable, Self::PreStable, Self::Prod];
}

impl_domain_status_conversions!(Environment {
    IntStable => "int-stable",
    PreStable => "pre-stable",
    Prod => "prod",
});

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Environment> for &'static str {
    fn from(env: Environment) -> Self {
        env.as_str()
    }
}
