//! Broker metadata reported by `kafkacat -L -J`.

use serde::Deserialize;

/// Cluster metadata as seen by a client.
///
/// Only the broker list is modelled; topics and other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerMetadata {
    /// Brokers advertised by the cluster.
    pub brokers: Vec<Broker>,
}

/// One advertised broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Broker {
    /// Broker id.
    pub id: i32,
    /// Advertised `host:port`.
    pub name: String,
}

impl BrokerMetadata {
    /// Parses kafkacat's JSON output.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `output` is not a metadata document.
    pub fn parse(output: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(output.trim())
    }
}
