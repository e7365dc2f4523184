pub mod client;
pub mod heartbeat;
pub mod push_receiver;
pub mod watcher;

pub use client::{DroneClient, DroneClientError, IngestRequest, IngestResponse};
pub use heartbeat::{Heartbeat, HealthState};
pub use push_receiver::PushNotification;
pub use watcher::DroneWatcher;
