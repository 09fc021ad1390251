use precis_client_lib::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    precis_client_lib::init_logging();

    let config = ClientConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    precis_client_lib::run(config).await
}
