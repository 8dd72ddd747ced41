// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::collections::BTreeMap;

use idlink_data_model::{AuditLogEntry, Identity, Metadata, User};
use ulid::Ulid;

use crate::MemoryError;

#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    pub(crate) users: BTreeMap<Ulid, User>,
    pub(crate) identities: BTreeMap<Ulid, Identity>,
    pub(crate) audit_log: Vec<AuditLogEntry>,
}

/// A write recorded in the journal of a repository
#[derive(Debug, Clone)]
pub(crate) enum Write {
    AddUser(User),
    MergeMetadata { user_id: Ulid, metadata: Metadata },
    AddProvider { user_id: Ulid, provider: String },
    AddIdentity(Identity),
    AddAuditLogEntry(AuditLogEntry),
}

impl State {
    pub(crate) fn find_identity(&self, provider: &str, subject: &str) -> Option<&Identity> {
        self.identities
            .values()
            .find(|identity| identity.provider == provider && identity.subject == subject)
    }

    fn user_mut(&mut self, user_id: Ulid) -> Result<&mut User, MemoryError> {
        self.users.get_mut(&user_id).ok_or(MemoryError::NotFound {
            entity: "user",
            id: user_id,
        })
    }

    /// Apply a single write, enforcing the constraints a relational backend
    /// would
    pub(crate) fn apply(&mut self, write: Write) -> Result<(), MemoryError> {
        match write {
            Write::AddUser(user) => {
                self.users.insert(user.id, user);
            }

            Write::MergeMetadata { user_id, metadata } => {
                self.user_mut(user_id)?.merge_metadata(&metadata);
            }

            Write::AddProvider { user_id, provider } => {
                self.user_mut(user_id)?.add_provider(&provider);
            }

            Write::AddIdentity(identity) => {
                if !self.users.contains_key(&identity.user_id) {
                    return Err(MemoryError::NotFound {
                        entity: "user",
                        id: identity.user_id,
                    });
                }

                if self
                    .find_identity(&identity.provider, &identity.subject)
                    .is_some()
                {
                    return Err(MemoryError::identity_conflict());
                }

                self.identities.insert(identity.id, identity);
            }

            Write::AddAuditLogEntry(entry) => {
                self.audit_log.push(entry);
            }
        }

        Ok(())
    }
}
