// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::net::{Ipv6Addr, SocketAddr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::Error as _};

use crate::{ConfigError, ConfigurationSection, util::annotate};

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 8080))
}

fn is_default_listen(value: &SocketAddr) -> bool {
    *value == default_listen()
}

fn default_authenticated_user_header() -> String {
    "x-authenticated-user".to_owned()
}

fn is_default_authenticated_user_header(value: &String) -> bool {
    *value == default_authenticated_user_header()
}

fn listen_example() -> &'static str {
    "127.0.0.1:8080"
}

/// Configuration of the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpConfig {
    /// Address and port to listen on
    ///
    /// Defaults to `[::]:8080`
    #[serde(default = "default_listen", skip_serializing_if = "is_default_listen")]
    #[schemars(with = "String", example = "listen_example")]
    pub listen: SocketAddr,

    /// Name of the header the authenticating proxy puts the ID of the
    /// authenticated user in
    ///
    /// Defaults to `x-authenticated-user`
    #[serde(
        default = "default_authenticated_user_header",
        skip_serializing_if = "is_default_authenticated_user_header"
    )]
    pub authenticated_user_header: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            authenticated_user_header: default_authenticated_user_header(),
        }
    }
}

impl HttpConfig {
    /// Returns true if the configuration is the default one
    pub(crate) fn is_default(&self) -> bool {
        is_default_listen(&self.listen)
            && is_default_authenticated_user_header(&self.authenticated_user_header)
    }
}

/// Characters allowed in an HTTP header name, besides ASCII alphanumerics
const HEADER_NAME_SYMBOLS: &str = "!#$%&'*+-.^_`|~";

impl ConfigurationSection for HttpConfig {
    const PATH: Option<&'static str> = Some("http");

    fn validate(&self, figment: &figment::Figment) -> Result<(), ConfigError> {
        let header = &self.authenticated_user_header;
        let valid = !header.is_empty()
            && header
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || HEADER_NAME_SYMBOLS.contains(c));

        if !valid {
            return annotate(
                figment,
                &["http", "authenticated_user_header"],
                figment::Error::custom(format!("{header:?} is not a valid HTTP header name")),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Yaml},
    };

    use super::*;
    use crate::ConfigurationSectionExt;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    http:
                      listen: 127.0.0.1:3000
                      authenticated_user_header: X-Remote-User
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = HttpConfig::extract(&figment).map_err(|e| e.to_string())?;

            assert_eq!(config.listen, "127.0.0.1:3000".parse().unwrap());
            assert_eq!(config.authenticated_user_header, "X-Remote-User");

            Ok(())
        });
    }

    #[test]
    fn defaults() {
        let config = HttpConfig::extract_or_default(&Figment::new()).unwrap();
        assert!(config.is_default());
        assert_eq!(config.listen.to_string(), "[::]:8080");
        assert_eq!(config.authenticated_user_header, "x-authenticated-user");
    }

    #[test]
    fn invalid_header_name() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                    http:
                      authenticated_user_header: "x user"
                "#,
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let err = HttpConfig::extract(&figment).unwrap_err();
            assert!(err.to_string().contains("not a valid HTTP header name"));

            Ok(())
        });
    }
}
