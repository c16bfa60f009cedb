use crate::{error::Error, identity::VerifiedPrincipal, model::normalize_email};

/// Succeeds only when the caller's verified email is `owner_email`.
///
/// # Errors
/// Returns [`Error::Forbidden`] on mismatch.
pub fn authorize(principal: &VerifiedPrincipal, owner_email: &str) -> Result<(), Error> {
    if is_owner(principal, owner_email) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

#[must_use]
pub fn is_owner(principal: &VerifiedPrincipal, owner_email: &str) -> bool {
    let owner = normalize_email(owner_email);
    !owner.is_empty() && normalize_email(&principal.email) == owner
}
