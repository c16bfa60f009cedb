//! Request state machine.
//!
//! ```text
//! request:  pending -> delivered | cancelled        (both terminal)
//! listing:  available -> requested -> delivered
//!                                  -> available     (request cancelled)
//! ```

use crate::{
    error::Error,
    model::{FoodStatus, RequestStatus},
    store::Transition,
};

/// Plan the move of a request currently in `current` to the client-supplied
/// `next` status, together with the listing status it implies.
///
/// # Errors
/// - [`Error::Validation`] when `next` is unknown or is `pending`.
/// - [`Error::Conflict`] when the request already reached a terminal state.
pub fn plan(current: RequestStatus, next: &str) -> Result<Transition, Error> {
    let to: RequestStatus = next.parse().map_err(Error::Validation)?;

    let listing = match to {
        RequestStatus::Delivered => FoodStatus::Delivered,
        RequestStatus::Cancelled => FoodStatus::Available,
        RequestStatus::Pending => {
            return Err(Error::Validation(
                "status must be delivered or cancelled".to_string(),
            ))
        }
    };

    if current.is_terminal() {
        return Err(Error::Conflict(format!("food request is already {current}")));
    }

    Ok(Transition {
        from: current,
        to,
        listing,
    })
}
