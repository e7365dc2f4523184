pub mod hub;
pub mod mailbox;
pub mod ws;

pub use hub::{NotificationTx, PushHub};
pub use mailbox::Mailbox;
pub use ws::{push_ws, PushGatewayState, WsQuery};
