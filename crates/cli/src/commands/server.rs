// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{collections::BTreeSet, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::Parser;
use figment::Figment;
use http::HeaderName;
use idlink_config::{ConfigurationSection, RootConfig};
use idlink_handlers::TrustedHeaderSessionResolver;
use idlink_linking::{ConfiguredProviderResolver, IdentityLinker};
use idlink_oidc::{JwksCache, JwksVerifier};
use idlink_storage_pg::{MIGRATOR, PgRepositoryFactory};
use sqlx::migrate::Migrate;
use tracing::{info, info_span};

use crate::{
    app_state::AppState,
    shutdown::ShutdownSignal,
    util::{database_pool_from_config, http_client, providers_from_config, run_migrations},
};

#[derive(Parser, Debug, Default)]
pub(super) struct Options {
    /// Do not apply pending database migrations on start
    #[arg(long)]
    no_migrate: bool,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let span = info_span!("cli.run.init").entered();
        let shutdown = ShutdownSignal::new().context("could not install signal handlers")?;
        let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;

        info!(version = crate::VERSION, "Starting up");

        // Connect to the database
        info!("Connecting to the database");
        let pool = database_pool_from_config(&config.database).await?;

        let mut conn = pool.acquire().await?;
        if self.no_migrate {
            // Check that we applied all the migrations
            let applied = conn.list_applied_migrations().await?;
            let applied: BTreeSet<_> = applied.into_iter().map(|m| m.version).collect();
            let has_missing_migrations = MIGRATOR.iter().any(|m| !applied.contains(&m.version));
            if has_missing_migrations {
                // Refuse to start if there are pending migrations
                anyhow::bail!(
                    "The server is running with `--no-migrate` but there are pending migrations. \
                     Please run them first with `idlink database migrate`, or omit the \
                     `--no-migrate` flag to apply them automatically on startup."
                );
            }
        } else {
            run_migrations(&mut conn, &config.database).await?;
        }
        drop(conn);

        let providers = providers_from_config(&config.identity_providers)?;
        info!(providers = providers.len(), "Loaded identity providers");

        let jwks_cache = JwksCache::new(http_client()?)
            .with_ttl(config.identity_providers.jwks_cache_ttl)
            .with_min_refresh_interval(config.identity_providers.jwks_min_refresh_interval);
        let verifier = JwksVerifier::with_cache(jwks_cache);
        let linker = IdentityLinker::new(
            Arc::new(ConfiguredProviderResolver::new(providers)),
            Arc::new(verifier),
        );

        let header = HeaderName::try_from(config.http.authenticated_user_header.as_str())
            .context("invalid authenticated user header name")?;
        let session_resolver = TrustedHeaderSessionResolver::new(header).shared();

        let state = AppState {
            repository_factory: PgRepositoryFactory::new(pool),
            linker,
            session_resolver,
        };

        let router = idlink_handlers::router(state);

        let listener = tokio::net::TcpListener::bind(config.http.listen)
            .await
            .with_context(|| format!("could not bind to {}", config.http.listen))?;

        info!(address = %config.http.listen, "Listening for HTTP requests");

        span.exit();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await
            .context("HTTP server failed")?;

        info!("Server stopped");

        Ok(ExitCode::SUCCESS)
    }
}
