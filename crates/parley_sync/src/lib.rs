#![forbid(unsafe_code)]
//! Client-side real-time conversation and notification sync.
//!
//! [`SyncService`] owns the push channel for the logged-in identity and a
//! [`SyncEngine`] holding presence, conversations, message streams and
//! notifications. Pushed events and user actions mutate that state through
//! the engine only; the presentation layer reads snapshots and listens for
//! [`EngineEvent`]s.

pub mod api;
pub mod connection;
pub mod conversations;
pub mod engine;
pub mod error;
pub mod events;
pub mod matching;
pub mod messages;
pub mod notifications;
pub mod presence;
pub mod router;
pub mod service;
pub mod settings;
pub mod state;

pub use api::{ChannelEventsApi, ChannelSessionApi, ChatApi};
pub use connection::{ChannelEvent, ConnectionManager, ConnectionTuning};
pub use conversations::{ConversationStore, SelectionTicket};
pub use engine::{HistoryOutcome, SyncEngine};
pub use error::SyncError;
pub use events::{EngineEvent, Toast, ToastKind};
pub use messages::{MessageStream, MessageStreams};
pub use notifications::NotificationCenter;
pub use presence::PresenceTracker;
pub use service::SyncService;
pub use settings::{SyncSettings, load_settings, load_settings_from_path};
pub use state::{ConversationView, EngineSnapshot, EngineState};
