/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Github:   https://github.com/samwilcox/pawx
 *
 * License: dual MIT / Apache-2.0, see LICENSE files.
 * ==========================================================================
 */

//! Thin host binary: wires logging, a router actor, an evaluator (so its
//! built-ins and registry exist before anything declares a `server`), and
//! the HTTP gateway, then serves until shutdown. Loading and evaluating
//! actual Relay source is a host concern outside this crate.

use relay_runtime::actor::router::{Router, ServerRegistry};
use relay_runtime::gateway::{self, config::GatewayConfig};
use relay_runtime::interpreter::Evaluator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let router = Router::new(ServerRegistry::new()).start();
    let _evaluator = Evaluator::new(router.clone());

    let mut config = GatewayConfig::default().with_node_id_default();
    if let Ok(host) = std::env::var("RELAY_GATEWAY_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("RELAY_GATEWAY_PORT") {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }

    if let Err(err) = gateway::serve(config, router).await {
        tracing::error!(error = %err, "gateway exited with an error");
        std::process::exit(1);
    }
}
