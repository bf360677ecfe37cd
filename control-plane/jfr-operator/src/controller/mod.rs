use std::sync::Arc;

use futures_util::StreamExt;
use jfr_client::{ClientError, MonotonicIds, SharedSession};
use kube::{
    Client,
    api::Api,
    runtime::{
        Controller,
        controller::Action,
        events::{Recorder, Reporter},
        watcher::Config,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::OperatorConfig;
use crate::crd::{FlightRecorder, Recording};

pub mod events;
pub mod flight_recorder;
pub mod lifecycle;
pub mod reconcile;
pub mod status;
pub mod target;


pub use target::TargetError;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error("backend: {0}")]
    Client(#[from] ClientError),
    /// Backend reported something the status schema cannot hold.
    #[error("validation: {0}")]
    Validation(String),
    #[error("target: {0}")]
    Target(#[from] TargetError),
    #[error("kubernetes: {0}")]
    Kube(#[from] kube::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub struct ControllerContext {
    pub client: Client,
    pub cfg: OperatorConfig,
    /// Single backend session shared by every reconcile.
    pub session: SharedSession,
    pub recorder: Option<Recorder>,
}

impl ControllerContext {
    pub fn new(
        client: Client,
        cfg: OperatorConfig,
        cancel: CancellationToken,
    ) -> Self {
        let session = SharedSession::new(
            cfg.backend.clone(),
            Arc::new(MonotonicIds::new()),
            cancel,
        );
        let recorder = cfg.features.events.then(|| {
            Recorder::new(
                client.clone(),
                Reporter {
                    controller: "jfr-operator".into(),
                    instance: std::env::var("HOSTNAME").ok(),
                },
            )
        });
        Self {
            client,
            cfg,
            session,
            recorder,
        }
    }
}

fn api_for<K>(client: &Client, ns: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match ns {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the Recording (and optionally FlightRecorder) controllers until the
/// watch streams end or `cancel` fires.
pub async fn run_controller(
    client: Client,
    cfg: OperatorConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let ns = cfg.watch_namespace.clone();
    let event_types = cfg.features.event_types;
    let ctx = Arc::new(ControllerContext::new(
        client.clone(),
        cfg,
        cancel.clone(),
    ));
    info!(namespace = ?ns, event_types, "starting controllers");

    let recordings: Api<Recording> = api_for(&client, ns.as_deref());
    let recording_ctrl = Controller::new(recordings, Config::default())
        .run(reconcile::reconcile, error_policy, ctx.clone())
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    info!(recording = %obj_ref, ?action, "reconciled")
                }
                Err(e) => error!(error = ?e, "recording reconcile error"),
            }
        });

    let recorder_ctrl = async {
        if !event_types {
            return;
        }
        let recorders: Api<FlightRecorder> = api_for(&client, ns.as_deref());
        Controller::new(recorders, Config::default())
            .run(
                flight_recorder::reconcile,
                flight_recorder::error_policy,
                ctx.clone(),
            )
            .for_each(|res| async move {
                if let Err(e) = res {
                    error!(error = ?e, "flight recorder reconcile error");
                }
            })
            .await
    };

    tokio::select! {
        _ = futures_util::future::join(recording_ctrl, recorder_ctrl) => {
            warn!("controller streams ended");
        }
        _ = cancel.cancelled() => {
            info!("shutdown requested; stopping controllers");
        }
    }
    Ok(())
}

pub(crate) fn error_policy(
    obj: Arc<Recording>,
    error: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    warn!(
        name = %kube::ResourceExt::name_any(obj.as_ref()),
        error = %error,
        "reconcile failed; retrying"
    );
    Action::requeue(ctx.cfg.retry_interval())
}

pub(crate) fn into_internal<E: std::fmt::Display>(e: E) -> ReconcileErr {
    ReconcileErr::Internal(e.to_string())
}
