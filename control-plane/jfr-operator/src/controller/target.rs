use jfr_client::Target;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::crd::{FlightRecorder, Recording};

#[derive(thiserror::Error, Debug)]
pub enum TargetError {
    #[error("recording {0} does not reference a FlightRecorder")]
    MissingReference(String),
    #[error("flight recorder {0} not found")]
    RecorderNotFound(String),
    #[error("flight recorder {0} has no target service yet")]
    NoTarget(String),
    #[error("flight recorder {0} has invalid port {1:?}")]
    InvalidPort(String, Option<i32>),
    #[error("service {0} not found")]
    ServiceNotFound(String),
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Resolve the JVM address a Recording's commands are sent to:
/// Recording → FlightRecorder → Service → `host:port`.
pub async fn resolve(
    client: &Client,
    recording: &Recording,
) -> Result<Target, TargetError> {
    let ns = recording.namespace().unwrap_or_else(|| "default".into());
    let fr_name = recording
        .spec
        .flight_recorder
        .as_ref()
        .map(|r| r.name.clone())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TargetError::MissingReference(recording.name_any()))?;
    let api: Api<FlightRecorder> = Api::namespaced(client.clone(), &ns);
    let recorder = api
        .get_opt(&fr_name)
        .await?
        .ok_or_else(|| {
            TargetError::RecorderNotFound(format!("{}/{}", ns, fr_name))
        })?;
    for_recorder(client, &ns, &recorder).await
}

pub async fn for_recorder(
    client: &Client,
    ns: &str,
    recorder: &FlightRecorder,
) -> Result<Target, TargetError> {
    let (svc_ns, svc_name, port) = service_of(ns, recorder)?;
    let api: Api<Service> = Api::namespaced(client.clone(), &svc_ns);
    let svc = api
        .get_opt(&svc_name)
        .await?
        .ok_or_else(|| {
            TargetError::ServiceNotFound(format!("{}/{}", svc_ns, svc_name))
        })?;
    let host = service_host(&svc, &svc_ns, &svc_name);
    debug!(%svc_ns, %svc_name, %host, port, "resolved recording target");
    Ok(Target::new(&host, port))
}

/// Service namespace, name and JMX port recorded in a FlightRecorder status.
pub fn service_of(
    ns: &str,
    recorder: &FlightRecorder,
) -> Result<(String, String, u16), TargetError> {
    let key = format!("{}/{}", ns, recorder.name_any());
    let status = recorder
        .status
        .as_ref()
        .ok_or_else(|| TargetError::NoTarget(key.clone()))?;
    let target = status
        .target
        .as_ref()
        .filter(|t| !t.name.is_empty())
        .ok_or_else(|| TargetError::NoTarget(key.clone()))?;
    let port = status
        .port
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p > 0)
        .ok_or_else(|| TargetError::InvalidPort(key, status.port))?;
    let svc_ns = target
        .namespace
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| ns.to_string());
    Ok((svc_ns, target.name.clone(), port))
}

/// ClusterIP when the Service has one, otherwise its cluster DNS name.
pub fn service_host(svc: &Service, ns: &str, name: &str) -> String {
    svc.spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != "None")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.{}.svc", name, ns))
}
