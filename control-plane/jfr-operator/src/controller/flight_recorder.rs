use std::sync::Arc;

use jfr_client::RecordingBackend;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::{ControllerContext, ReconcileErr, TargetError, target};
use crate::crd::FlightRecorder;
use crate::crd::flight_recorder::EventType;

/// Keep `status.events` in line with what the target JVM can record.
#[instrument(
    skip_all,
    fields(
        ns = %obj.namespace().unwrap_or_else(|| "default".into()),
        name = %obj.name_any()
    )
)]
pub async fn reconcile(
    obj: Arc<FlightRecorder>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();

    let target = match target::for_recorder(&ctx.client, &ns, &obj).await {
        Ok(t) => t,
        Err(e @ (TargetError::NoTarget(_) | TargetError::InvalidPort(..))) => {
            debug!(%ns, %name, reason = %e, "no target yet; waiting");
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };

    let listed = {
        let mut guard = ctx.session.acquire().await?;
        let res = guard.channel()?.list_event_types(&target).await;
        if let Err(e) = &res {
            guard.settle(e).await;
        }
        res?
    };
    let events: Vec<EventType> = listed.iter().map(EventType::from).collect();

    let current = obj.status.as_ref().map(|s| s.events.as_slice());
    if current == Some(events.as_slice()) {
        debug!(%ns, %name, count = events.len(), "event types unchanged");
        return Ok(Action::await_change());
    }

    info!(%ns, %name, %target, count = events.len(), "updating event types");
    let api: Api<FlightRecorder> = Api::namespaced(ctx.client.clone(), &ns);
    let patch = json!({ "status": { "events": events } });
    let _ = api
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(Action::await_change())
}

pub(crate) fn error_policy(
    obj: Arc<FlightRecorder>,
    error: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    warn!(
        name = %obj.name_any(),
        error = %error,
        "event type refresh failed; retrying"
    );
    Action::requeue(ctx.cfg.retry_interval())
}
