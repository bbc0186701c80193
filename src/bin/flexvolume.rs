// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use oci_orchestrator::flexvolume::{exec_driver, FlexPaths, OciFlexvolumeDriver};

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the JSON status, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let driver = OciFlexvolumeDriver::new(FlexPaths::from_env());
    let status = exec_driver(&driver, &args).await;

    let line = status.to_json_line();
    tracing::info!("Command result: {}", line);
    println!("{}", line);
    ExitCode::from(status.exit_code() as u8)
}
