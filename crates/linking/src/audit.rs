// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use idlink_data_model::{AuditAction, AuditLogEntry, Clock, Identity, User};
use idlink_storage::{BoxRepository, RepositoryAccess};
use rand_core::RngCore;

use crate::LinkError;

/// Record that `actor` linked `identity`, in the same unit of work as the link
///
/// # Errors
///
/// Returns [`LinkError::Internal`] if the entry could not be written
pub async fn record_identity_link(
    repo: &mut BoxRepository,
    rng: &mut (dyn RngCore + Send),
    clock: &dyn Clock,
    actor: &User,
    identity: &Identity,
) -> Result<AuditLogEntry, LinkError> {
    repo.audit_log()
        .add(
            rng,
            clock,
            actor,
            AuditAction::IdentityLinked,
            identity.id,
            identity.provider.clone(),
        )
        .await
        .map_err(LinkError::storage("Error recording audit log entry"))
}
