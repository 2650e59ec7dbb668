// Public API
pub use connection_manager::{ConnectionManager, InMemoryConnectionManager};
pub use handler::{broadcast_disconnect, deliver, websocket_handler, WebsocketReceiveHandler};
pub use messages::{MessageType, WebSocketMessage};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod connection_manager;
mod handler;
pub mod messages;
mod socket;
