use jfr_operator::crd::{FlightRecorder, Recording};
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let docs = [
        serde_yaml::to_string(&FlightRecorder::crd())?,
        serde_yaml::to_string(&Recording::crd())?,
    ];
    println!("{}", docs.join("---\n"));
    Ok(())
}
