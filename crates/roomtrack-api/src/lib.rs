// roomtrack-api: Async clients for the room directory REST API and the
// Socket.IO presence push channel

pub mod channel;
pub mod directory;
pub mod error;
pub mod models;
pub mod socketio;
pub mod transport;

pub use channel::{ChannelEvent, PresenceChannel, ReconnectConfig};
pub use directory::DirectoryClient;
pub use error::Error;
pub use models::{PresenceEntry, RoomDto};
pub use transport::{TlsMode, TransportConfig};
