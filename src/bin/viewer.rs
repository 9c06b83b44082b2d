use anyhow::Context;
use infergate::{
    adapters::Backends,
    cli::config_path_from_args,
    config::Config,
    logging::{GatewayProcess, init_tracing},
    signal::shutdown_signal,
    viewer::{Viewer, ensure_shared_stores},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let _logging = init_tracing(&config, GatewayProcess::Viewer)?;

    ensure_shared_stores(&config)?;
    let backends = Backends::from_config(&config)?;
    let viewer = Viewer::new(backends.counters, backends.unstructured, config.viewer.clone());

    let signal_name = viewer
        .run(shutdown_signal()?, |snapshot| println!("{}", snapshot.render()))
        .await;
    eprintln!("infergate-viewer stopped: received {signal_name}");
    Ok(())
}
