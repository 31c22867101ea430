pub mod actors;
pub mod config;
pub mod gateway;
pub mod monitors;
pub mod registry;
pub mod storage;
pub mod supervisor;
pub mod util;

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monitored server as read from the configuration.
///
/// The pair `(name, address)` is the identity used for registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Network address in `host:port` form
    pub address: String,
    #[serde(default)]
    pub description: String,
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// A target together with the durable identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTarget {
    pub target: Target,
    pub store_id: i64,
}
