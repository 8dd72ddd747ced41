// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use idlink_data_model::VerifiedIdToken;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header,
    jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm},
};
use sha2::{Digest, Sha256, Sha384, Sha512};
use url::Url;

use crate::{claims::IdTokenClaims, error::IdTokenError, jwks::JwksCache};

/// Clock skew tolerated on `exp` and `nbf`, in seconds
const LEEWAY: u64 = 60;

/// Where the keys of a provider come from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// A key set given in the configuration
    Inline(JwkSet),

    /// A key set fetched from a `jwks_uri`
    Remote(Url),
}

/// What an ID token is verified against
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// The expected `iss` claim
    pub issuer: String,

    /// The keys the provider signs with
    pub keys: KeySource,
}

/// Optional inputs to the verification
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions<'a> {
    /// The access token issued alongside the ID token, checked against the
    /// `at_hash` claim when both are present
    pub access_token: Option<&'a str>,
}

/// Verifies ID tokens
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify the signature and claims of `id_token`, returning the verified
    /// claims.
    ///
    /// The audience is returned as-is and is not checked.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, has an invalid signature
    /// or carries invalid claims, or if the keys could not be obtained
    async fn verify(
        &self,
        config: &VerifierConfig,
        id_token: &str,
        options: VerifyOptions<'_>,
    ) -> Result<VerifiedIdToken, IdTokenError>;
}

#[async_trait]
impl<T: TokenVerifier + ?Sized> TokenVerifier for Arc<T> {
    async fn verify(
        &self,
        config: &VerifierConfig,
        id_token: &str,
        options: VerifyOptions<'_>,
    ) -> Result<VerifiedIdToken, IdTokenError> {
        (**self).verify(config, id_token, options).await
    }
}

/// A [`TokenVerifier`] using JSON Web Key Sets
#[derive(Debug)]
pub struct JwksVerifier {
    cache: JwksCache,
}

impl JwksVerifier {
    /// Create a verifier fetching remote key sets with the given client
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            cache: JwksCache::new(client),
        }
    }

    /// Create a verifier using an already configured key set cache
    #[must_use]
    pub fn with_cache(cache: JwksCache) -> Self {
        Self { cache }
    }

    async fn find_key(&self, keys: &KeySource, kid: Option<&str>) -> Result<Jwk, IdTokenError> {
        match keys {
            KeySource::Inline(jwks) => select_key(jwks, kid),

            KeySource::Remote(uri) => {
                let jwks = self.cache.get(uri).await?;
                match select_key(&jwks, kid) {
                    // The provider may have rotated its keys
                    Err(IdTokenError::UnknownKey { kid }) => {
                        tracing::info!(%kid, jwks_uri = %uri, "Unknown key ID, refreshing JWKS");
                        let jwks = self.cache.refresh(uri).await?;
                        select_key(&jwks, Some(&kid))
                    }
                    res => res,
                }
            }
        }
    }
}

fn select_key(jwks: &JwkSet, kid: Option<&str>) -> Result<Jwk, IdTokenError> {
    if let Some(kid) = kid {
        return jwks
            .find(kid)
            .cloned()
            .ok_or_else(|| IdTokenError::UnknownKey {
                kid: kid.to_owned(),
            });
    }

    match jwks.keys.as_slice() {
        [] => Err(IdTokenError::NoKeys),
        [key] => Ok(key.clone()),
        _ => Err(IdTokenError::MissingKeyId),
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Result<Algorithm, IdTokenError> {
    let alg = match alg {
        KeyAlgorithm::HS256 => Algorithm::HS256,
        KeyAlgorithm::HS384 => Algorithm::HS384,
        KeyAlgorithm::HS512 => Algorithm::HS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        other => return Err(IdTokenError::UnsupportedAlgorithm(format!("{other:?}"))),
    };

    Ok(alg)
}

fn key_supports(key: &AlgorithmParameters, alg: Algorithm) -> bool {
    match key {
        AlgorithmParameters::OctetKey(_) => {
            matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
        }
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(_) => {
            matches!(alg, Algorithm::ES256 | Algorithm::ES384)
        }
        AlgorithmParameters::OctetKeyPair(_) => alg == Algorithm::EdDSA,
    }
}

/// Compute the `at_hash` of an access token: the base64url encoding of the
/// left half of its hash, with the hash function of the signing algorithm
fn access_token_hash(alg: Algorithm, access_token: &str) -> String {
    let hash = match alg {
        Algorithm::HS256 | Algorithm::RS256 | Algorithm::PS256 | Algorithm::ES256 => {
            Sha256::digest(access_token).to_vec()
        }
        Algorithm::HS384 | Algorithm::RS384 | Algorithm::PS384 | Algorithm::ES384 => {
            Sha384::digest(access_token).to_vec()
        }
        Algorithm::HS512 | Algorithm::RS512 | Algorithm::PS512 | Algorithm::EdDSA => {
            Sha512::digest(access_token).to_vec()
        }
    };

    Base64UrlUnpadded::encode_string(&hash[..hash.len() / 2])
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    #[tracing::instrument(
        name = "oidc.id_token.verify",
        skip_all,
        fields(oidc.issuer = %config.issuer),
        err,
    )]
    async fn verify(
        &self,
        config: &VerifierConfig,
        id_token: &str,
        options: VerifyOptions<'_>,
    ) -> Result<VerifiedIdToken, IdTokenError> {
        let header = decode_header(id_token).map_err(IdTokenError::InvalidHeader)?;

        let jwk = self.find_key(&config.keys, header.kid.as_deref()).await?;

        if let Some(key_alg) = &jwk.common.key_algorithm {
            let key_alg = signing_algorithm(key_alg)?;
            if key_alg != header.alg {
                return Err(IdTokenError::AlgorithmMismatch {
                    key: key_alg,
                    token: header.alg,
                });
            }
        }

        if !key_supports(&jwk.algorithm, header.alg) {
            return Err(IdTokenError::IncompatibleKey(header.alg));
        }

        let key = DecodingKey::from_jwk(&jwk).map_err(IdTokenError::InvalidKey)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = LEEWAY;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(IdTokenError::Claims)?
            .claims;

        if let (Some(access_token), Some(at_hash)) = (options.access_token, &claims.at_hash) {
            if access_token_hash(header.alg, access_token) != *at_hash {
                return Err(IdTokenError::AccessTokenHashMismatch);
            }
        }

        Ok(claims.into_verified())
    }
}
