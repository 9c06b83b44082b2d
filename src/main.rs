use anyhow::Context;
use infergate::{
    adapters::Backends,
    cli::config_path_from_args,
    config::Config,
    core_loop::ServingLoop,
    logging::{GatewayProcess, init_tracing},
    signal::shutdown_signal,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging = init_tracing(&config, GatewayProcess::Server)?;

    let backends = Backends::from_config(&config)?;
    let serving_loop = ServingLoop::bind(&config, backends).await?;
    let addr = serving_loop.local_addr()?;
    eprintln!("infergate listening on http://{addr} (run_id {})", logging.run_id());

    let exit_reason = serving_loop.run(shutdown_signal()?).await?;
    eprintln!("infergate stopped: {exit_reason:?}");
    Ok(())
}
