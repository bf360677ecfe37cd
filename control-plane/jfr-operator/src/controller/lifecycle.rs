use jfr_client::{ClientError, RecordingBackend, RecordingDescriptor, Target};
use kube::runtime::controller::Action;
use percent_encoding::percent_decode_str;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ReconcileErr;
use crate::crd::{RecordingSpec, RecordingState, RecordingStatus};
use crate::duration::{format_duration_ms, format_epoch_ms};

/// Backend mutation issued during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Started,
    Dumped { seconds: u64 },
    Stopped,
    Saved { filename: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Status to persist; only meaningful when the cycle succeeded.
    pub status: RecordingStatus,
    pub mutations: Vec<Mutation>,
}

/// One reconcile pass for a Recording against its target JVM.
///
/// Order is fixed: start or dump when nothing was observed yet, stop when the
/// user asked for it, refresh from the backend listing, then archive once the
/// recording has stopped. The first failing command ends the pass and nothing
/// computed so far is returned, so the caller never writes a partial status.
pub async fn run_cycle<B>(
    backend: &mut B,
    target: &Target,
    spec: &RecordingSpec,
    current: Option<&RecordingStatus>,
) -> Result<CycleOutcome, ReconcileErr>
where
    B: RecordingBackend + ?Sized,
{
    let name = spec.name.as_str();
    if name.is_empty() {
        return Err(ReconcileErr::Validation(
            "spec.name must not be empty".into(),
        ));
    }
    let seconds = spec.duration_secs().map_err(ReconcileErr::Validation)?;
    let observed = current.and_then(|s| s.state);
    let mut mutations = Vec::new();

    match observed {
        None if seconds == 0 => {
            info!(%target, name, "starting continuous recording");
            backend
                .start_recording(target, name, &spec.event_options)
                .await?;
            mutations.push(Mutation::Started);
        }
        None => {
            info!(%target, name, seconds, "starting fixed-length recording");
            backend
                .dump_recording(target, name, seconds, &spec.event_options)
                .await?;
            mutations.push(Mutation::Dumped { seconds });
        }
        Some(RecordingState::Stopped | RecordingState::Stopping) => {}
        Some(_) if spec.wants_stopped() => {
            info!(%target, name, "stopping recording");
            backend.stop_recording(target, name).await?;
            mutations.push(Mutation::Stopped);
        }
        Some(_) => {}
    }

    let listed = backend.list_recordings(target).await?;
    let previous = current.cloned().unwrap_or_default();
    let mut status = match listed.iter().find(|d| d.name == name) {
        Some(descriptor) => refresh(previous, descriptor)?,
        None => {
            warn!(%target, name, "recording not listed; keeping status");
            previous
        }
    };

    if status.state == Some(RecordingState::Stopped)
        && spec.archive
        && status.download_url.is_none()
    {
        let filename = backend.save_recording(target, name).await?;
        info!(%target, name, %filename, "recording archived");
        let saved = backend.list_saved_recordings().await?;
        match saved.iter().find(|s| s.name == filename) {
            Some(entry) => {
                status.download_url = non_empty(&entry.download_url);
                status.report_url = non_empty(&entry.report_url);
            }
            None => warn!(
                name,
                %filename,
                "archive not in saved listing yet; download URL left unset"
            ),
        }
        mutations.push(Mutation::Saved { filename });
    }

    Ok(CycleOutcome { status, mutations })
}

/// Overwrite the observed fields from a backend descriptor.
fn refresh(
    mut status: RecordingStatus,
    descriptor: &RecordingDescriptor,
) -> Result<RecordingStatus, ReconcileErr> {
    let reported: RecordingState = descriptor
        .state
        .parse()
        .map_err(|e| ReconcileErr::Validation(format!("{}", e)))?;
    status.state = match status.state {
        Some(prev) if prev > reported => {
            debug!(
                name = %descriptor.name,
                %prev,
                %reported,
                "ignoring backward state report"
            );
            Some(prev)
        }
        _ => Some(reported),
    };
    if let Some(ts) = format_epoch_ms(descriptor.start_time) {
        status.start_time = Some(ts);
    }
    status.duration = Some(format_duration_ms(descriptor.duration));
    Ok(status)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Poll until the recording has stopped, then wait for spec changes.
pub fn next_action(status: &RecordingStatus, poll: Duration) -> Action {
    if status.state == Some(RecordingState::Stopped) {
        Action::await_change()
    } else {
        Action::requeue(poll)
    }
}

/// Remove what a Recording left behind on the backend. Already-gone
/// resources are not an error.
pub async fn delete_from_backend<B>(
    backend: &mut B,
    target: &Target,
    name: &str,
    status: Option<&RecordingStatus>,
) -> Result<(), ClientError>
where
    B: RecordingBackend + ?Sized,
{
    let Some(status) = status else {
        return Ok(());
    };
    if status.state.is_some() {
        tolerate_missing(backend.delete_recording(target, name).await)?;
    }
    if let Some(filename) =
        status.download_url.as_deref().and_then(saved_filename)
    {
        tolerate_missing(backend.delete_saved_recording(&filename).await)?;
    }
    Ok(())
}

fn tolerate_missing(res: Result<(), ClientError>) -> Result<(), ClientError> {
    match res {
        Err(e) if e.is_not_found() => {
            debug!(error = %e, "already removed from backend");
            Ok(())
        }
        other => other,
    }
}

/// Archive filename from a download URL: the last path segment, decoded.
pub fn saved_filename(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        return None;
    }
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}
