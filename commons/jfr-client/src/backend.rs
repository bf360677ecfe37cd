use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{EventInfo, RecordingDescriptor, SavedRecording, Target};

/// Typed command surface of the recording service.
///
/// Every method takes `&mut self`: a holder can have at most one command in
/// flight, which is how a shared session keeps backend traffic serialised.
#[async_trait]
pub trait RecordingBackend: Send {
    async fn list_recordings(
        &mut self,
        target: &Target,
    ) -> Result<Vec<RecordingDescriptor>, ClientError>;

    /// Fixed-length recording that the JVM stops on its own after `seconds`.
    async fn dump_recording(
        &mut self,
        target: &Target,
        name: &str,
        seconds: u64,
        events: &[String],
    ) -> Result<(), ClientError>;

    /// Continuous recording, runs until stopped.
    async fn start_recording(
        &mut self,
        target: &Target,
        name: &str,
        events: &[String],
    ) -> Result<(), ClientError>;

    async fn stop_recording(
        &mut self,
        target: &Target,
        name: &str,
    ) -> Result<(), ClientError>;

    /// Archive the recording on the backend, returning the archive filename.
    async fn save_recording(
        &mut self,
        target: &Target,
        name: &str,
    ) -> Result<String, ClientError>;

    async fn list_saved_recordings(
        &mut self,
    ) -> Result<Vec<SavedRecording>, ClientError>;

    async fn delete_recording(
        &mut self,
        target: &Target,
        name: &str,
    ) -> Result<(), ClientError>;

    async fn delete_saved_recording(
        &mut self,
        filename: &str,
    ) -> Result<(), ClientError>;

    async fn list_event_types(
        &mut self,
        target: &Target,
    ) -> Result<Vec<EventInfo>, ClientError>;

    async fn close(&mut self);
}
