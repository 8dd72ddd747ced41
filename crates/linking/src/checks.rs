// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Policy checks on the verified token, run before anything is written

use crate::LinkError;

/// Check that the token was issued to one of the acceptable clients
///
/// Blank client IDs never match.
///
/// # Errors
///
/// Returns [`LinkError::UnacceptableAudience`] if no acceptable client ID is
/// in the audience
pub fn match_audience(audience: &[String], acceptable: &[String]) -> Result<(), LinkError> {
    let matched = acceptable
        .iter()
        .filter(|client_id| !client_id.is_empty())
        .any(|client_id| audience.contains(client_id));

    if matched {
        Ok(())
    } else {
        Err(LinkError::UnacceptableAudience)
    }
}

/// Check the nonce of the token against the one of the request
///
/// Nothing is checked if the provider skips nonce checks or if the request has
/// no nonce.
///
/// # Errors
///
/// Returns [`LinkError::InvalidNonce`] if the nonces differ
pub fn validate_nonce(
    skip_nonce_check: bool,
    request_nonce: Option<&str>,
    token_nonce: Option<&str>,
) -> Result<(), LinkError> {
    let Some(expected) = request_nonce.filter(|_| !skip_nonce_check) else {
        return Ok(());
    };

    if token_nonce == Some(expected) {
        Ok(())
    } else {
        Err(LinkError::InvalidNonce)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|&v| v.to_owned()).collect()
    }

    #[test]
    fn test_audience() {
        let acceptable = strings(&["client-a", "client-b"]);

        assert!(match_audience(&strings(&["client-a"]), &acceptable).is_ok());
        assert!(match_audience(&strings(&["other", "client-b"]), &acceptable).is_ok());
        assert_matches!(
            match_audience(&strings(&["client-c"]), &acceptable),
            Err(LinkError::UnacceptableAudience)
        );
        assert_matches!(
            match_audience(&[], &acceptable),
            Err(LinkError::UnacceptableAudience)
        );

        // Matching is exact
        assert!(match_audience(&strings(&["Client-A"]), &acceptable).is_err());
    }

    #[test]
    fn test_audience_blank_client_ids() {
        assert_matches!(
            match_audience(&strings(&[""]), &strings(&["", "client-a"])),
            Err(LinkError::UnacceptableAudience)
        );
        assert_matches!(
            match_audience(&strings(&["client-a"]), &[]),
            Err(LinkError::UnacceptableAudience)
        );
    }

    #[test]
    fn test_nonce() {
        assert!(validate_nonce(false, Some("abc"), Some("abc")).is_ok());
        assert_matches!(
            validate_nonce(false, Some("abc"), Some("xyz")),
            Err(LinkError::InvalidNonce)
        );
        assert_matches!(
            validate_nonce(false, Some("abc"), None),
            Err(LinkError::InvalidNonce)
        );

        // No nonce in the request: nothing to compare
        assert!(validate_nonce(false, None, Some("xyz")).is_ok());
        assert!(validate_nonce(false, None, None).is_ok());

        // Skipped by provider policy
        assert!(validate_nonce(true, Some("abc"), Some("xyz")).is_ok());
        assert!(validate_nonce(true, Some("abc"), None).is_ok());
    }
}
