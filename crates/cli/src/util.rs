// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use anyhow::Context;
use idlink_config::{DatabaseConfig, IdentityProvidersConfig, ProviderKeys};
use idlink_linking::ProviderSettings;
use idlink_oidc::{JwkSet, KeySource};
use idlink_storage_pg::MIGRATOR;
use sqlx::{
    ConnectOptions, Executor, PgConnection, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tracing::{Instrument, info, info_span, log::LevelFilter};
use url::Url;

/// The `application_name` of the connections serving requests
pub const SERVER_APPLICATION_NAME: &str = "idlink";

/// The `application_name` of the connection running the migrations
pub const MIGRATIONS_APPLICATION_NAME: &str = "idlink-migrations";

fn database_connect_options_from_config(
    config: &DatabaseConfig,
    application_name: &str,
) -> Result<PgConnectOptions, anyhow::Error> {
    let options = if let Some(uri) = config.uri.as_deref() {
        uri.parse::<PgConnectOptions>()
            .context("could not parse database connection string")?
    } else {
        let mut opts = PgConnectOptions::new();

        if let Some(host) = config.host.as_deref() {
            opts = opts.host(host);
        }

        if let Some(port) = config.port {
            opts = opts.port(port);
        }

        if let Some(socket) = config.socket.as_deref() {
            opts = opts.socket(socket);
        }

        if let Some(username) = config.username.as_deref() {
            opts = opts.username(username);
        }

        if let Some(password) = config.password.as_deref() {
            opts = opts.password(password);
        }

        if let Some(database) = config.database.as_deref() {
            opts = opts.database(database);
        }

        opts
    };

    let mut options = options.application_name(application_name);

    if let Some(namespace) = config.namespace.as_deref() {
        options = options.options([("search_path", namespace)]);
    }

    Ok(options.log_statements(LevelFilter::Debug))
}

/// A description of where the database is, without the password
pub fn redacted_database_uri(config: &DatabaseConfig) -> String {
    if let Some(uri) = config.uri.as_deref() {
        return match Url::parse(uri) {
            Ok(mut url) => {
                if url.password().is_some() {
                    // Only fails for URLs which cannot have a password
                    let _ = url.set_password(Some("********"));
                }
                url.to_string()
            }
            Err(_) => "<invalid database URI>".to_owned(),
        };
    }

    let user = config.username.as_deref().unwrap_or_default();
    let password = if config.password.is_some() {
        ":********"
    } else {
        ""
    };
    let at = if user.is_empty() && password.is_empty() {
        ""
    } else {
        "@"
    };
    let host = config
        .host
        .as_deref()
        .or_else(|| config.socket.as_ref().map(|socket| socket.as_str()))
        .unwrap_or_default();
    let port = config.port.map(|p| format!(":{p}")).unwrap_or_default();
    let database = config.database.as_deref().unwrap_or_default();

    format!("postgresql://{user}{password}{at}{host}{port}/{database}")
}

pub async fn database_pool_from_config(config: &DatabaseConfig) -> Result<PgPool, anyhow::Error> {
    let options = database_connect_options_from_config(config, SERVER_APPLICATION_NAME)?;
    PgPoolOptions::new()
        .max_connections(config.max_connections.into())
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect_with(options)
        .await
        .context("could not connect to the database")
}

pub async fn database_connection_from_config(
    config: &DatabaseConfig,
    application_name: &str,
) -> Result<PgConnection, anyhow::Error> {
    database_connect_options_from_config(config, application_name)?
        .connect()
        .await
        .context("could not connect to the database")
}

/// Create the namespace if one is configured, then run the pending migrations
pub async fn run_migrations(
    conn: &mut PgConnection,
    config: &DatabaseConfig,
) -> Result<(), anyhow::Error> {
    info!(
        database = %redacted_database_uri(config),
        namespace = config.namespace.as_deref(),
        "Running pending database migrations"
    );

    if let Some(namespace) = config.namespace.as_deref() {
        // The name was checked to be a plain identifier when loading the config
        let statement = format!("CREATE SCHEMA IF NOT EXISTS \"{namespace}\"");
        (&mut *conn)
            .execute(statement.as_str())
            .instrument(info_span!("db.create_schema", db.schema = namespace))
            .await
            .context("could not create the database schema")?;
    }

    MIGRATOR
        .run(&mut *conn)
        .instrument(info_span!("db.migrate"))
        .await
        .context("could not run migrations")?;

    Ok(())
}

/// Build the settings of the configured identity providers
pub fn providers_from_config(
    config: &IdentityProvidersConfig,
) -> Result<Vec<ProviderSettings>, anyhow::Error> {
    config
        .providers
        .iter()
        .map(|provider| {
            let keys = match provider.keys() {
                Some(ProviderKeys::Inline(jwks)) => {
                    let jwks: JwkSet = serde_json::from_value(jwks.clone()).with_context(|| {
                        format!("invalid inline JWKS for provider {:?}", provider.name)
                    })?;
                    KeySource::Inline(jwks)
                }
                Some(ProviderKeys::Remote(uri)) => KeySource::Remote(uri.clone()),
                None => anyhow::bail!(
                    "provider {:?} must have exactly one of `jwks` and `jwks_uri`",
                    provider.name
                ),
            };

            Ok(ProviderSettings {
                name: provider.name.clone(),
                issuer: provider.issuer.clone(),
                client_ids: provider.client_ids.clone(),
                skip_nonce_check: provider.skip_nonce_check,
                keys,
            })
        })
        .collect()
}

/// The HTTP client used to fetch the remote key sets
pub fn http_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("idlink/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("could not build the HTTP client")
}
