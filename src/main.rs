/*!
 * Queue Broker - Main Entry Point
 *
 * Reads configuration from the environment, serves the line protocol until
 * Ctrl+C, then closes every topic.
 */

use std::error::Error;
use std::sync::Arc;
use tracing::{error, info};

use queue_broker::{
    init_tracing, BrokerConfig, BrokerHandler, BrokerServer, CancelToken, ServerConfig,
    TopicRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = BrokerConfig::from_env()?;
    info!(config = %config.to_json(), "Queue broker starting");

    let registry = Arc::new(TopicRegistry::<String>::new(config.limits())?);
    let handler = Arc::new(BrokerHandler::new(Arc::clone(&registry)));
    let shutdown = CancelToken::new();

    let server = BrokerServer::bind(ServerConfig::from(&config), handler, shutdown.clone()).await?;
    let server_task = tokio::spawn(server.run());

    info!("Press Ctrl+C to exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C, shutting down");
    }

    info!("Shutdown requested");
    shutdown.cancel();

    let outcome = server_task.await;
    registry.close_all().await;

    match outcome {
        Ok(Ok(())) => {
            info!("Queue broker stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(e.into()),
    }
}
