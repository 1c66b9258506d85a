//! Links between ports.

use nodeflow_core::Conversion;

use crate::port::{PortKind, PortRef};

/// Class of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LinkKind {
    Data,
    Exec,
}

impl LinkKind {
    pub fn producer(self) -> PortKind {
        match self {
            Self::Data => PortKind::Output,
            Self::Exec => PortKind::ExecOut,
        }
    }

    pub fn consumer(self) -> PortKind {
        self.producer().counterpart()
    }
}

/// Edge weight: which producer port feeds which consumer port.
///
/// The conversion is resolved once at connect time; exec links carry
/// [`Conversion::Identity`].
#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub kind: LinkKind,
    pub from_port: usize,
    pub to_port: usize,
    pub conversion: Conversion,
}

impl Link {
    /// Returns whether the link starts at `port` of the source node.
    pub fn starts_at(&self, kind: PortKind, port: usize) -> bool {
        self.kind.producer() == kind && self.from_port == port
    }

    /// Returns whether the link ends at `port` of the target node.
    pub fn ends_at(&self, kind: PortKind, port: usize) -> bool {
        self.kind.consumer() == kind && self.to_port == port
    }
}

/// A link as seen from outside the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Producing port.
    pub from: PortRef,
    /// Consuming port.
    pub to: PortRef,
}

impl Connection {
    /// Returns whether the link carries control flow.
    pub fn is_exec(&self) -> bool {
        self.from.kind.is_exec()
    }
}
