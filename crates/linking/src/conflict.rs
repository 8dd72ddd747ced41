// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use idlink_data_model::User;
use idlink_storage::{BoxRepository, RepositoryAccess};

use crate::{IdentityConflict, LinkError};

/// Check that no identity exists yet for this provider and subject
///
/// # Errors
///
/// Returns [`LinkError::IdentityAlreadyExists`] if the identity is already
/// linked, telling whether it is linked to `user` or to someone else, and
/// [`LinkError::Internal`] if the lookup failed
#[tracing::instrument(
    name = "linking.resolve_conflict",
    skip_all,
    fields(user.id = %user.id, identity.provider = provider_type),
    err,
)]
pub async fn resolve_conflict(
    repo: &mut BoxRepository,
    user: &User,
    provider_type: &str,
    subject: &str,
) -> Result<(), LinkError> {
    let existing = repo
        .identity()
        .find_by_subject(provider_type, subject)
        .await
        .map_err(LinkError::storage("Database error finding identity"))?;

    match existing {
        None => Ok(()),
        Some(identity) if identity.is_owned_by(user.id) => Err(LinkError::IdentityAlreadyExists(
            IdentityConflict::LinkedToThisUser,
        )),
        Some(_) => Err(LinkError::IdentityAlreadyExists(
            IdentityConflict::LinkedToAnotherUser,
        )),
    }
}
