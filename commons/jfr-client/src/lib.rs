//! Typed client for the JFR recording service's HTTP command API.

pub mod backend;
pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod session;
pub mod types;

pub use backend::RecordingBackend;
pub use client::{CommandChannel, REQUEST_ID_HEADER};
pub use config::BackendConfig;
pub use correlation::{IdGenerator, MonotonicIds};
pub use error::{ClientError, TransportError};
pub use session::{SessionGuard, SharedSession};
pub use types::{
    CommandMessage, EventInfo, OptionDescriptor, Payload, RecordingDescriptor,
    ResponseMessage, SavedRecording, Target,
};
