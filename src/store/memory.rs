//! In-process store.
//!
//! All collections sit behind one `RwLock`, and every compound write holds the
//! write guard for its whole duration, which gives the same atomicity the
//! Postgres store gets from transactions.

use super::{
    FoodFilter, FoodRepository, FoodRequestRepository, RequestFilter, Store, StoreError,
    Transition, UserRepository, FOOD, FOOD_REQUEST,
};
use crate::model::{
    FoodChanges, FoodListing, FoodRequest, FoodStatus, NewFood, RegisterUser, RequestDraft,
    RequestStatus, UserProfile,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collections {
    foods: HashMap<Uuid, FoodListing>,
    requests: HashMap<Uuid, FoodRequest>,
    users: HashMap<String, UserProfile>,
}

impl Collections {
    fn has_pending_request(&self, food_id: Uuid) -> bool {
        self.requests
            .values()
            .any(|request| request.food_id == food_id && request.status == RequestStatus::Pending)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FoodRepository for MemoryStore {
    async fn list_foods(&self, filter: &FoodFilter) -> Result<Vec<FoodListing>, StoreError> {
        let inner = self.inner.read().await;
        let mut foods: Vec<FoodListing> = inner
            .foods
            .values()
            .filter(|food| filter.matches(food))
            .cloned()
            .collect();
        foods.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(foods)
    }

    async fn get_food(&self, id: Uuid) -> Result<FoodListing, StoreError> {
        self.inner
            .read()
            .await
            .foods
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(FOOD))
    }

    async fn create_food(&self, food: &NewFood) -> Result<Uuid, StoreError> {
        let now = Utc::now();
        let listing = FoodListing {
            id: Uuid::new_v4(),
            donator: food.donator.clone(),
            food_name: food.food_name.clone(),
            food_image: food.food_image.clone(),
            food_quantity: food.food_quantity,
            pickup_location: food.pickup_location.clone(),
            expire_date: food.expire_date.clone(),
            additional_notes: food.additional_notes.clone(),
            food_status: FoodStatus::Available,
            created_at: now,
            updated_at: now,
        };
        let id = listing.id;
        self.inner.write().await.foods.insert(id, listing);
        Ok(id)
    }

    async fn update_food(
        &self,
        id: Uuid,
        changes: &FoodChanges,
    ) -> Result<FoodListing, StoreError> {
        let mut inner = self.inner.write().await;

        if changes.food_status.is_some() && inner.has_pending_request(id) {
            return Err(StoreError::Conflict(
                "food has a pending request; resolve it first",
            ));
        }

        let food = inner.foods.get_mut(&id).ok_or(StoreError::NotFound(FOOD))?;
        if let Some(name) = &changes.food_name {
            food.food_name.clone_from(name);
        }
        if let Some(image) = &changes.food_image {
            food.food_image.clone_from(image);
        }
        if let Some(quantity) = changes.food_quantity {
            food.food_quantity = Some(quantity);
        }
        if let Some(location) = &changes.pickup_location {
            food.pickup_location = Some(location.clone());
        }
        if let Some(expire_date) = &changes.expire_date {
            food.expire_date = Some(expire_date.clone());
        }
        if let Some(notes) = &changes.additional_notes {
            food.additional_notes = Some(notes.clone()).filter(|notes| !notes.is_empty());
        }
        if let Some(status) = changes.food_status {
            food.food_status = status;
        }
        food.updated_at = Utc::now();

        Ok(food.clone())
    }

    async fn delete_food(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.foods.contains_key(&id) {
            return Err(StoreError::NotFound(FOOD));
        }
        if inner.has_pending_request(id) {
            return Err(StoreError::Conflict(
                "food has a pending request; resolve it first",
            ));
        }

        inner.foods.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl FoodRequestRepository for MemoryStore {
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<FoodRequest>, StoreError> {
        let inner = self.inner.read().await;
        let mut requests: Vec<FoodRequest> = inner
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn get_request(&self, id: Uuid) -> Result<FoodRequest, StoreError> {
        self.inner
            .read()
            .await
            .requests
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(FOOD_REQUEST))
    }

    async fn open_request(&self, draft: &RequestDraft) -> Result<FoodRequest, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let food = inner
            .foods
            .get_mut(&draft.food_id)
            .ok_or(StoreError::NotFound(FOOD))?;
        if food.food_status != FoodStatus::Available {
            return Err(StoreError::Conflict("food is not available"));
        }
        food.food_status = FoodStatus::Requested;
        food.updated_at = now;

        let request = FoodRequest {
            id: Uuid::new_v4(),
            food_id: draft.food_id,
            requester_email: draft.requester_email.clone(),
            requester_name: draft.requester_name.clone(),
            donator_email: food.donator.email.clone(),
            notes: draft.notes.clone(),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.requests.insert(request.id, request.clone());

        Ok(request)
    }

    async fn close_request(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<FoodRequest, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let request = inner
            .requests
            .get_mut(&id)
            .ok_or(StoreError::NotFound(FOOD_REQUEST))?;
        if request.status != transition.from {
            return Err(StoreError::Conflict("food request is no longer pending"));
        }
        request.status = transition.to;
        request.updated_at = now;
        let request = request.clone();

        if let Some(food) = inner.foods.get_mut(&request.food_id) {
            food.food_status = transition.listing;
            food.updated_at = now;
        }

        Ok(request)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn upsert_user(&self, user: &RegisterUser) -> Result<(UserProfile, bool), StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(profile) = inner.users.get_mut(&user.email) {
            if user.name.is_some() {
                profile.name.clone_from(&user.name);
            }
            if user.photo_url.is_some() {
                profile.photo_url.clone_from(&user.photo_url);
            }
            return Ok((profile.clone(), false));
        }

        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone(),
            photo_url: user.photo_url.clone(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.email.clone(), profile.clone());
        Ok((profile, true))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
