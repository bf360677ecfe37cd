use std::sync::Arc;

use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info, instrument, trace, warn};

use super::events::{REASON_BACKEND_ERROR, describe, emit_event};
use super::lifecycle::{delete_from_backend, next_action, run_cycle};
use super::status::{should_patch_status, status_patch};
use super::{
    ControllerContext, ReconcileErr, TargetError, into_internal, target,
};
use crate::crd::Recording;

const FINALIZER: &str = "rhjmc.redhat.com/recording-finalizer";

fn has_finalizer(obj: &Recording) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .map(|f| f.iter().any(|x| x == FINALIZER))
        .unwrap_or(false)
}

#[instrument(
    skip_all,
    fields(
        ns = %obj.namespace().unwrap_or_else(|| "default".into()),
        name = %obj.name_any()
    )
)]
pub async fn reconcile(
    obj: Arc<Recording>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();
    let api: Api<Recording> = Api::namespaced(ctx.client.clone(), &ns);

    if obj.meta().deletion_timestamp.is_some() {
        if has_finalizer(&obj) {
            info!(%ns, %name, "reconcile: deleting; cleaning up backend");
            cleanup(&ctx, &obj).await?;
            let finals = obj
                .meta()
                .finalizers
                .clone()
                .unwrap_or_default()
                .into_iter()
                .filter(|f| f != FINALIZER)
                .collect::<Vec<_>>();
            let patch = json!({"metadata": {"finalizers": finals}});
            let _ = api
                .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(into_internal)?;
            info!(%ns, %name, "reconcile: finalizer removed");
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer(&obj) {
        info!(%ns, %name, "reconcile: adding finalizer");
        let mut finals = obj.meta().finalizers.clone().unwrap_or_default();
        finals.push(FINALIZER.to_string());
        let patch = json!({"metadata": {"finalizers": finals}});
        let _ = api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(into_internal)?;
    }

    let target = target::resolve(&ctx.client, &obj).await?;
    let reference = obj.object_ref(&());
    debug!(%ns, %name, %target, "reconcile: target resolved");

    // The guard is held for the whole cycle and released before any
    // Kubernetes writes.
    let result = {
        let mut guard = ctx.session.acquire().await?;
        let result = match guard.channel() {
            Ok(channel) => {
                run_cycle(channel, &target, &obj.spec, obj.status.as_ref())
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(ReconcileErr::Client(e)) = &result {
            guard.settle(e).await;
        }
        result
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(
                e,
                ReconcileErr::Client(_) | ReconcileErr::Validation(_)
            ) {
                emit_event(
                    ctx.recorder.as_ref(),
                    &reference,
                    EventType::Warning,
                    REASON_BACKEND_ERROR,
                    "Reconcile",
                    Some(e.to_string()),
                )
                .await;
            }
            return Err(e);
        }
    };

    for m in &outcome.mutations {
        let (reason, action, note) = describe(m, &obj.spec.name);
        emit_event(
            ctx.recorder.as_ref(),
            &reference,
            EventType::Normal,
            reason,
            action,
            Some(note),
        )
        .await;
    }

    if should_patch_status(obj.status.as_ref(), &outcome.status) {
        trace!(%ns, %name, "reconcile: status changed; patching status");
        let _ = api
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Merge(&status_patch(&outcome.status)),
            )
            .await?;
    }

    Ok(next_action(&outcome.status, ctx.cfg.poll_interval()))
}

/// Remove the recording and its archive from the backend. A target that can
/// no longer be resolved means there is nothing left to reach.
async fn cleanup(
    ctx: &ControllerContext,
    obj: &Recording,
) -> Result<(), ReconcileErr> {
    let Some(status) = obj.status.as_ref() else {
        return Ok(());
    };
    if status.state.is_none() && status.download_url.is_none() {
        return Ok(());
    }
    let target = match target::resolve(&ctx.client, obj).await {
        Ok(t) => t,
        Err(TargetError::Kube(e)) => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "target unresolvable; skipping backend cleanup");
            return Ok(());
        }
    };
    let mut guard = ctx.session.acquire().await?;
    let res = delete_from_backend(
        guard.channel()?,
        &target,
        &obj.spec.name,
        Some(status),
    )
    .await;
    if let Err(e) = &res {
        guard.settle(e).await;
    }
    res.map_err(Into::into)
}
