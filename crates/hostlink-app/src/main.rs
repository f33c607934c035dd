// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hostlink — bridge gateway between a web page and its native host
//
// Entry point. Initialises logging, loads the gateway config, and drives a
// simulated host session, printing the resulting journey as JSON.

mod services;
mod session;

use hostlink_core::human_errors::humanize_error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Hostlink starting");

    let data_dir = services::data_dir::data_dir();
    let config = services::config_store::load_or_init(&data_dir);

    match session::run(config).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "could not render session report"),
        },
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, suggestion = %human.suggestion, "{}", human.message);
            std::process::exit(1);
        }
    }
}
