// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use std::time::Duration;

use tracing::info;
use warden_config::ConfigLoader;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::logging::init_logging;
use crate::runtime::Orchestrator;
use crate::shutdown::{TerminationLatch, spawn_signal_listener};

/// How long a stuck console read may delay process exit.
const RUNTIME_DRAIN: Duration = Duration::from_millis(250);

/// Executes the `run` command.
pub fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let mut config = ConfigLoader::new().load_or_default(&cli.config)?;
    if let Some(data_dir) = args.data_dir {
        config.bot.data_dir = data_dir;
    }

    init_logging(
        cli.effective_log_level(config.logging.level.as_str()),
        cli.effective_log_format(config.logging.format),
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("warden-worker");
    if let Some(threads) = config.runtime.worker_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder
        .build()
        .map_err(|e| BinError::from(e).with_context("Failed to build async runtime"))?;

    let result = runtime.block_on(async move {
        let latch = TerminationLatch::new();
        spawn_signal_listener(latch.clone())?;

        let mut builder = Orchestrator::builder().config(config).termination(latch);
        if !args.no_console {
            builder = builder.stdio_console();
        }
        let orchestrator = builder.build()?;

        let reason = orchestrator.run().await?;
        info!(?reason, "Warden stopped");
        Ok::<_, BinError>(())
    });

    runtime.shutdown_timeout(RUNTIME_DRAIN);
    result
}
