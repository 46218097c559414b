// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use logtrack::{
    bulk::BulkSender, bus::BusSubscription, config::Config, event_loop::EventLoop,
    filter::PatternSet, opensearch::OpenSearchApi,
};
use core::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const SEND_TIMEOUT_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGTRACK_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on log forwarder startup: {e}");
            return;
        }
    };

    let patterns = match PatternSet::from_config(config.include.as_deref(), config.exclude.as_deref())
    {
        Ok(p) => p,
        Err(e) => {
            error!("Error compiling process name patterns: {e}");
            return;
        }
    };

    info!(
        endpoint = %config.endpoint,
        include = config.include.as_deref().unwrap_or(""),
        exclude = config.exclude.as_deref().unwrap_or(""),
        listen_patterns = patterns.listen_count(),
        ignore_patterns = patterns.ignore_count(),
        show_send_stat = config.show_send_stat,
        bus_socket = %config.bus_socket,
        "start"
    );

    let api = OpenSearchApi::new(config.endpoint.clone(), SEND_TIMEOUT_DURATION);
    let sender = BulkSender::new(api, config.show_send_stat);
    let (event_loop, handle) = EventLoop::new(patterns, sender);

    let cancel_token = CancellationToken::new();
    let subscription =
        match BusSubscription::launch(&config.bus_socket, handle.sender(), cancel_token.clone())
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(%err, "bus launch");
                return;
            }
        };
    tokio::spawn(subscription.spin());

    event_loop.run().await;

    // The loop only exits on a bus close; release the subscription cleanly.
    cancel_token.cancel();
}
