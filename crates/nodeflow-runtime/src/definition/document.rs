//! Serializable graph document.

use std::collections::BTreeMap;

use nodeflow_core::{NodeId, PortId};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::GraphMetadata;
use crate::error::Result;
use crate::port::PortKind;

/// Document format version written by this crate.
pub const DOCUMENT_VERSION: Version = Version::new(1, 0, 0);

/// Persisted form of a graph: nodes with their properties and port
/// identities, plus links addressed by port ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Document format version.
    pub version: Version,
    /// Graph metadata.
    #[serde(default)]
    pub metadata: GraphMetadata,
    /// Nodes in insertion order.
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    /// Links between ports.
    #[serde(default)]
    pub connections: Vec<ConnectionDocument>,
}

impl GraphDocument {
    /// Parses a document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Persisted node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Node ID.
    pub id: NodeId,
    /// Registered node type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Property values by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Json>,
    /// Port identities.
    #[serde(default)]
    pub ports: Vec<PortDocument>,
}

/// Persisted port identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDocument {
    /// Port ID referenced by connections.
    pub id: PortId,
    /// Port kind.
    pub kind: PortKind,
    /// Position among the node's ports of that kind.
    pub index: usize,
    /// Port name.
    pub name: String,
    /// Carried value type name; absent for exec ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

/// Persisted link from a producer port to a consumer port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDocument {
    /// Producing node.
    pub source_node: NodeId,
    /// Producing port.
    pub source_port: PortId,
    /// Consuming node.
    pub target_node: NodeId,
    /// Consuming port.
    pub target_port: PortId,
}
