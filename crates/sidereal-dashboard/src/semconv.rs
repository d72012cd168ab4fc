//! Semantic convention attribute keys the store interprets.

// Resource attributes
pub const SERVICE_NAME: &str = "service.name";
pub const SERVICE_INSTANCE_ID: &str = "service.instance.id";

// Peer attributes, newest convention first
pub const PEER_SERVICE: &str = "peer.service";
pub const SERVER_ADDRESS: &str = "server.address";
pub const SERVER_PORT: &str = "server.port";
pub const NET_PEER_NAME: &str = "net.peer.name";
pub const NET_PEER_PORT: &str = "net.peer.port";

/// Message template emitted by structured logging libraries.
pub const LOG_ORIGINAL_FORMAT: &str = "{OriginalFormat}";
