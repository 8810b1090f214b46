//! Runs the Widget scenarios over REST and JSON-RPC.
//!
//! # Usage
//!
//! ```bash
//! switchyard-demo [rest|rpc|both]
//! ```
//!
//! Reads `.env` if present. `SWITCHYARD_DEMO_TOKEN` sets the accepted
//! bearer token and the `SWITCHYARD_*` kernel variables tune the kernel.

use demo::{Demo, Via, build_kernel, scenarios};
use switchyard_core_plugins::{TracingFormat, TracingPlugin};
use switchyard_kernel::KernelConfig;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let transports = match std::env::args().nth(1).as_deref() {
        None | Some("both") => vec![Via::Rest, Via::Rpc],
        Some("rest") => vec![Via::Rest],
        Some("rpc") => vec![Via::Rpc],
        Some(other) => {
            eprintln!("Usage: switchyard-demo [rest|rpc|both] (got {other})");
            std::process::exit(1);
        }
    };

    let config = KernelConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let token = std::env::var("SWITCHYARD_DEMO_TOKEN").unwrap_or_else(|_| "ok".to_string());
    let tracing = TracingPlugin::default()
        .with_format(TracingFormat::Compact)
        .with_env_filter("info,switchyard_kernel=debug");

    let kernel = build_kernel(&token, config, tracing).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    for via in transports {
        // Fresh store per transport so both runs start empty.
        let demo = Demo::new(kernel.clone(), token.as_str());
        for scenario in scenarios() {
            let report = demo.run(&scenario, via).await;
            let (begins, commits, rollbacks) = report.transactions;
            tracing::info!(
                scenario = report.name,
                via = ?report.via,
                code = %report.code,
                begins,
                commits,
                rollbacks,
                body = %report.body,
                "scenario finished"
            );
        }
        tracing::info!(via = ?via, widgets = demo.store().count(demo::WIDGET), "run complete");
    }
}
