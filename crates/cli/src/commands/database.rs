// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use clap::Parser;
use figment::Figment;
use idlink_config::{ConfigurationSectionExt, DatabaseConfig};
use tracing::info_span;

use crate::util::{MIGRATIONS_APPLICATION_NAME, database_connection_from_config, run_migrations};

#[derive(Parser, Debug)]
pub(super) struct Options {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Parser, Debug)]
enum Subcommand {
    /// Run database migrations
    Migrate,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let Subcommand::Migrate = self.subcommand;
        let _span = info_span!("cli.database.migrate").entered();
        let config =
            DatabaseConfig::extract_or_default(figment).map_err(anyhow::Error::from_boxed)?;
        let mut conn =
            database_connection_from_config(&config, MIGRATIONS_APPLICATION_NAME).await?;

        run_migrations(&mut conn, &config).await?;

        Ok(ExitCode::SUCCESS)
    }
}
