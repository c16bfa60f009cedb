//! Request lifecycle coordinator.
//!
//! Every mutating operation follows the same order: resolve the record
//! (`404`), check ownership against the verified principal (`403`), validate
//! the payload (`400`), then hand one atomic write to the store (`409` when a
//! conditional update loses).

pub mod policy;
pub mod transition;

use crate::{
    error::Error,
    identity::VerifiedPrincipal,
    model::{
        normalize_email, valid_email, FoodListing, FoodPatch, FoodRequest, FoodStatus, NewFood,
        NewFoodRequest, RegisterUser, StatusUpdate, UserProfile,
    },
    store::{FoodFilter, RequestFilter, Store, StoreError, FOOD, FOOD_REQUEST},
};
use policy::authorize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn Store>,
}

/// Path identifiers that do not parse cannot name an existing record.
fn parse_id(raw: &str, entity: &'static str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::NotFound(entity))
}

/// Required `email` style query parameter, normalized.
fn required_email(raw: Option<&str>, name: &str) -> Result<String, Error> {
    raw.map(normalize_email)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| Error::Validation(format!("{name} query parameter is required")))
}

impl Coordinator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Store liveness for `/health`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be reached.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Public listing, optionally filtered by donator email and status.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for an unknown status filter.
    pub async fn list_foods(
        &self,
        email: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<FoodListing>, Error> {
        let filter = FoodFilter {
            owner_email: email.map(normalize_email).filter(|email| !email.is_empty()),
            status: status
                .filter(|status| !status.trim().is_empty())
                .map(str::parse::<FoodStatus>)
                .transpose()
                .map_err(Error::Validation)?,
        };
        Ok(self.store.list_foods(&filter).await?)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] when the id is malformed or unknown.
    pub async fn get_food(&self, id: &str) -> Result<FoodListing, Error> {
        let id = parse_id(id, FOOD)?;
        Ok(self.store.get_food(id).await?)
    }

    /// Listings donated by `email`, which must be the caller.
    ///
    /// # Errors
    /// `400` when `email` is missing, `403` when it is not the caller.
    pub async fn foods_owned_by(
        &self,
        principal: &VerifiedPrincipal,
        email: Option<&str>,
    ) -> Result<Vec<FoodListing>, Error> {
        let email = required_email(email, "email")?;
        authorize(principal, &email)?;

        let filter = FoodFilter {
            owner_email: Some(email),
            status: None,
        };
        Ok(self.store.list_foods(&filter).await?)
    }

    /// # Errors
    /// `400` for an invalid payload, `403` when the donator is not the caller.
    #[instrument(skip(self, principal, food), fields(caller = %principal.email))]
    pub async fn create_food(
        &self,
        principal: &VerifiedPrincipal,
        food: NewFood,
    ) -> Result<Uuid, Error> {
        let food = food.normalize().map_err(Error::Validation)?;
        authorize(principal, &food.donator.email)?;

        let id = self.store.create_food(&food).await?;
        info!(food_id = %id, "food listing created");
        Ok(id)
    }

    /// Merge validated fields into a listing the caller owns.
    ///
    /// # Errors
    /// `404`, `403`, `400`, or `409` when the status changes under a pending request.
    #[instrument(skip(self, principal, patch), fields(caller = %principal.email))]
    pub async fn update_food(
        &self,
        principal: &VerifiedPrincipal,
        id: &str,
        patch: FoodPatch,
    ) -> Result<FoodListing, Error> {
        let id = parse_id(id, FOOD)?;
        let current = self.store.get_food(id).await?;
        authorize(principal, &current.donator.email)?;

        let changes = patch.validate().map_err(Error::Validation)?;
        let updated = self.store.update_food(id, &changes).await?;
        info!(food_id = %id, status = %updated.food_status, "food listing updated");
        Ok(updated)
    }

    /// # Errors
    /// `404`, `403`, or `409` while a pending request references the listing.
    #[instrument(skip(self, principal), fields(caller = %principal.email))]
    pub async fn delete_food(&self, principal: &VerifiedPrincipal, id: &str) -> Result<(), Error> {
        let id = parse_id(id, FOOD)?;
        let current = self.store.get_food(id).await?;
        authorize(principal, &current.donator.email)?;

        self.store.delete_food(id).await?;
        info!(food_id = %id, "food listing deleted");
        Ok(())
    }

    /// Claim an available listing for the caller.
    ///
    /// The listing moves `available -> requested` and a `pending` request is
    /// inserted in the same store write; of two concurrent claims only one wins.
    ///
    /// # Errors
    /// - `403` when `requesterEmail` is not the caller.
    /// - `404` when the listing does not exist.
    /// - `400` when the caller donated the listing.
    /// - `409` when the listing is not available.
    #[instrument(skip(self, principal, payload), fields(caller = %principal.email))]
    pub async fn create_request(
        &self,
        principal: &VerifiedPrincipal,
        payload: NewFoodRequest,
    ) -> Result<FoodRequest, Error> {
        let requester_email = normalize_email(&payload.requester_email);
        if !valid_email(&requester_email) {
            return Err(Error::Validation("requesterEmail is invalid".to_string()));
        }
        authorize(principal, &requester_email)?;

        let food_id = parse_id(&payload.food_id, FOOD)?;
        let food = self.store.get_food(food_id).await?;
        if food.donator.email == requester_email {
            return Err(Error::Validation(
                "donators cannot request their own food".to_string(),
            ));
        }

        let draft = payload.into_draft(food_id);
        let request = self.store.open_request(&draft).await?;
        info!(
            request_id = %request.id,
            food_id = %request.food_id,
            "food request opened"
        );
        Ok(request)
    }

    /// Requests made by `email`, which must be the caller.
    ///
    /// # Errors
    /// `400` when `email` is missing, `403` when it is not the caller.
    pub async fn requests_by_requester(
        &self,
        principal: &VerifiedPrincipal,
        email: Option<&str>,
    ) -> Result<Vec<FoodRequest>, Error> {
        let email = required_email(email, "userEmail")?;
        authorize(principal, &email)?;

        let filter = RequestFilter {
            requester_email: Some(email),
            donator_email: None,
        };
        Ok(self.store.list_requests(&filter).await?)
    }

    /// Requests against listings donated by `email`, which must be the caller.
    ///
    /// # Errors
    /// `400` when `email` is missing, `403` when it is not the caller.
    pub async fn requests_by_donator(
        &self,
        principal: &VerifiedPrincipal,
        email: Option<&str>,
    ) -> Result<Vec<FoodRequest>, Error> {
        let email = required_email(email, "email")?;
        authorize(principal, &email)?;

        let filter = RequestFilter {
            requester_email: None,
            donator_email: Some(email),
        };
        Ok(self.store.list_requests(&filter).await?)
    }

    /// One request, visible to its requester and its donator.
    ///
    /// # Errors
    /// `404` when unknown, `403` for anyone else.
    pub async fn get_request(
        &self,
        principal: &VerifiedPrincipal,
        id: &str,
    ) -> Result<FoodRequest, Error> {
        let id = parse_id(id, FOOD_REQUEST)?;
        let request = self.store.get_request(id).await?;
        if policy::is_owner(principal, &request.requester_email) {
            return Ok(request);
        }
        authorize(principal, &request.donator_email)?;
        Ok(request)
    }

    /// Donator moves a pending request to `delivered` or `cancelled`; the
    /// listing follows (`delivered` or back to `available`) in the same write.
    ///
    /// # Errors
    /// `404`, `403`, `400` for an unsupported target, `409` when the request is
    /// no longer pending.
    #[instrument(skip(self, principal, update), fields(caller = %principal.email))]
    pub async fn update_request_status(
        &self,
        principal: &VerifiedPrincipal,
        id: &str,
        update: StatusUpdate,
    ) -> Result<FoodRequest, Error> {
        let id = parse_id(id, FOOD_REQUEST)?;
        let request = self.store.get_request(id).await?;
        authorize(principal, &request.donator_email)?;

        let transition = transition::plan(request.status, &update.status)?;
        let request = self.store.close_request(id, transition).await?;
        info!(
            request_id = %request.id,
            food_id = %request.food_id,
            status = %request.status,
            listing_status = %transition.listing,
            "food request closed"
        );
        Ok(request)
    }

    /// Insert or refresh a profile. The flag is `true` for a new profile.
    ///
    /// # Errors
    /// `400` for an invalid email.
    pub async fn register_user(&self, user: RegisterUser) -> Result<(UserProfile, bool), Error> {
        let user = user.normalize().map_err(Error::Validation)?;
        Ok(self.store.upsert_user(&user).await?)
    }
}
