//! Save/load orchestration: settings, user interaction and background jobs.

pub mod config;
pub mod interaction;
pub mod job;
pub mod serializer;

pub use config::SerializerConfig;
pub use interaction::{BlockingInteraction, InteractionChannel, InteractionRequest, NoInteraction};
pub use job::{BusyGuard, Job, Outcome, SerializerEvent, SharedDocument};
pub use serializer::Serializer;
