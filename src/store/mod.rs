//! Persistence seams for listings, requests and user profiles.
//!
//! The coordinator only talks to these traits, so the process-wide store is an
//! explicitly passed `Arc<dyn Store>`: [`postgres::PgStore`] in production and
//! [`memory::MemoryStore`] in tests.
//!
//! The two lifecycle writes (`open_request`, `close_request`) are single
//! operations on purpose. Each implementation applies the listing change and the
//! request change atomically, and guards them with a conditional status check so
//! concurrent callers cannot both succeed.

pub mod memory;
pub mod postgres;

use crate::model::{
    FoodChanges, FoodListing, FoodRequest, FoodStatus, NewFood, RegisterUser, RequestDraft,
    RequestStatus, UserProfile,
};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub const FOOD: &str = "food";
pub const FOOD_REQUEST: &str = "food request";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A conditional write lost against the current record state.
    #[error("{0}")]
    Conflict(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodFilter {
    pub owner_email: Option<String>,
    pub status: Option<FoodStatus>,
}

impl FoodFilter {
    #[must_use]
    pub fn matches(&self, food: &FoodListing) -> bool {
        self.owner_email
            .as_deref()
            .map_or(true, |email| food.donator.email == email)
            && self.status.map_or(true, |status| food.food_status == status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub requester_email: Option<String>,
    pub donator_email: Option<String>,
}

impl RequestFilter {
    #[must_use]
    pub fn matches(&self, request: &FoodRequest) -> bool {
        self.requester_email
            .as_deref()
            .map_or(true, |email| request.requester_email == email)
            && self
                .donator_email
                .as_deref()
                .map_or(true, |email| request.donator_email == email)
    }
}

/// A request status change together with the listing status it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub listing: FoodStatus,
}

#[async_trait]
pub trait FoodRepository: Send + Sync {
    /// Listings matching `filter`, newest first.
    async fn list_foods(&self, filter: &FoodFilter) -> Result<Vec<FoodListing>, StoreError>;

    async fn get_food(&self, id: Uuid) -> Result<FoodListing, StoreError>;

    /// Store a validated listing as `available` and return its new id.
    async fn create_food(&self, food: &NewFood) -> Result<Uuid, StoreError>;

    /// Merge `changes` into the listing. Changing `food_status` while a pending
    /// request references the listing is a conflict.
    async fn update_food(&self, id: Uuid, changes: &FoodChanges)
        -> Result<FoodListing, StoreError>;

    /// Remove the listing unless a pending request still references it.
    async fn delete_food(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait FoodRequestRepository: Send + Sync {
    /// Requests matching `filter`, newest first.
    async fn list_requests(&self, filter: &RequestFilter)
        -> Result<Vec<FoodRequest>, StoreError>;

    async fn get_request(&self, id: Uuid) -> Result<FoodRequest, StoreError>;

    /// Claim the listing (`available -> requested`) and insert a pending request
    /// that copies the listing's donator email, as one atomic write.
    async fn open_request(&self, draft: &RequestDraft) -> Result<FoodRequest, StoreError>;

    /// Move the request `from -> to` and set its listing to `transition.listing`,
    /// as one atomic write. A request no longer in `from` is a conflict.
    async fn close_request(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<FoodRequest, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or refresh a profile keyed by email. The flag is `true` when a new
    /// row was created.
    async fn upsert_user(&self, user: &RegisterUser) -> Result<(UserProfile, bool), StoreError>;
}

#[async_trait]
pub trait Store: FoodRepository + FoodRequestRepository + UserRepository {
    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
