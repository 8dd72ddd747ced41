// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::io::IsTerminal;

use anyhow::Context as _;
use idlink_config::{LogFormat, TelemetryConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Install the global subscriber, writing logs to stderr
///
/// `RUST_LOG` takes precedence over the configured filter. The returned guard
/// flushes the pending logs when dropped.
pub fn setup(config: &TelemetryConfig) -> anyhow::Result<WorkerGuard> {
    let output = std::io::stderr();
    let with_ansi = output.is_terminal();
    let (log_writer, guard) = tracing_appender::non_blocking(output);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_writer)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(with_ansi);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log.format {
        LogFormat::Full => fmt_layer.boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
        LogFormat::Pretty => fmt_layer.pretty().boxed(),
    };

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .context("could not setup logging filter")?;

    Registry::default()
        .with(fmt_layer)
        .with(filter_layer)
        .try_init()
        .context("could not initialize logging")?;

    Ok(guard)
}
