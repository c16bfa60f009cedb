//! Listing, request and user records plus the payloads that create or change them.
//!
//! Wire names are camelCase. Emails are normalized to trimmed lowercase before
//! they are stored or compared.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trim an optional free-text field and drop it when empty.
fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FoodStatus {
    #[default]
    Available,
    Requested,
    Delivered,
}

impl FoodStatus {
    /// Canonical string stored in the `foods.food_status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Requested => "requested",
            Self::Delivered => "delivered",
        }
    }
}

impl FromStr for FoodStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "requested" => Ok(Self::Requested),
            "delivered" => Ok(Self::Delivered),
            other => Err(format!("unsupported food status: {other}")),
        }
    }
}

impl fmt::Display for FoodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Delivered,
    Cancelled,
}

impl RequestStatus {
    /// Canonical string stored in the `food_requests.status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            // older clients send the american spelling
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unsupported request status: {other}")),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Donator {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodListing {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub donator: Donator,
    pub food_name: String,
    pub food_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_quantity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
    pub food_status: FoodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /foods`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFood {
    pub donator: Donator,
    pub food_name: String,
    #[serde(default)]
    pub food_image: String,
    /// A number or a numeric string.
    #[serde(default, deserialize_with = "quantity")]
    #[schema(value_type = Option<i32>)]
    pub food_quantity: Option<i32>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub expire_date: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
    /// Only `available` is accepted; a new listing cannot start claimed.
    #[serde(default)]
    pub food_status: Option<String>,
}

impl NewFood {
    /// Validate and normalize the payload in place.
    ///
    /// # Errors
    /// Returns a short client-facing message describing the first invalid field.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.donator.email = normalize_email(&self.donator.email);
        if !valid_email(&self.donator.email) {
            return Err("donator email is invalid".to_string());
        }
        self.donator.name = clean(self.donator.name.as_deref());
        self.donator.image = clean(self.donator.image.as_deref());

        self.food_name = required(&self.food_name, "foodName")?;
        self.pickup_location = clean(self.pickup_location.as_deref());
        self.expire_date = clean(self.expire_date.as_deref());
        self.food_image = self.food_image.trim().to_string();
        self.additional_notes = clean(self.additional_notes.as_deref());
        positive_quantity(self.food_quantity)?;

        if let Some(status) = self.food_status.as_deref() {
            if status.parse::<FoodStatus>()? != FoodStatus::Available {
                return Err("new listings must be available".to_string());
            }
        }
        self.food_status = None;

        Ok(self)
    }
}

/// Payload for `PUT`/`PATCH /foods/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodPatch {
    pub food_name: Option<String>,
    pub food_image: Option<String>,
    #[serde(default, deserialize_with = "quantity")]
    #[schema(value_type = Option<i32>)]
    pub food_quantity: Option<i32>,
    pub pickup_location: Option<String>,
    pub expire_date: Option<String>,
    pub additional_notes: Option<String>,
    pub food_status: Option<String>,
}

/// A validated [`FoodPatch`] ready for the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodChanges {
    pub food_name: Option<String>,
    pub food_image: Option<String>,
    pub food_quantity: Option<i32>,
    pub pickup_location: Option<String>,
    pub expire_date: Option<String>,
    pub additional_notes: Option<String>,
    pub food_status: Option<FoodStatus>,
}

impl FoodPatch {
    /// Validate the patch.
    ///
    /// # Errors
    /// Returns a client-facing message when a field is invalid or nothing would change.
    pub fn validate(self) -> Result<FoodChanges, String> {
        let changes = FoodChanges {
            food_name: self
                .food_name
                .as_deref()
                .map(|value| required(value, "foodName"))
                .transpose()?,
            food_image: self.food_image.map(|value| value.trim().to_string()),
            food_quantity: positive_quantity(self.food_quantity)?,
            pickup_location: self
                .pickup_location
                .as_deref()
                .map(|value| required(value, "pickupLocation"))
                .transpose()?,
            expire_date: self
                .expire_date
                .as_deref()
                .map(|value| required(value, "expireDate"))
                .transpose()?,
            additional_notes: self.additional_notes.map(|value| value.trim().to_string()),
            food_status: match self
                .food_status
                .as_deref()
                .map(str::parse::<FoodStatus>)
                .transpose()?
            {
                // only a claim moves a listing to requested
                Some(FoodStatus::Requested) => {
                    return Err("foodStatus cannot be set to requested".to_string())
                }
                other => other,
            },
        };

        if changes == FoodChanges::default() {
            return Err("No updates provided.".to_string());
        }

        Ok(changes)
    }
}

fn positive_quantity(quantity: Option<i32>) -> Result<Option<i32>, String> {
    match quantity {
        Some(quantity) if quantity <= 0 => Err("foodQuantity must be positive".to_string()),
        other => Ok(other),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuantityInput {
    Number(i64),
    Text(String),
}

/// Accepts `5`, `"5"`, `null` or an empty string.
fn quantity<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let parsed = match Option::<QuantityInput>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(QuantityInput::Number(number)) => i32::try_from(number).ok(),
        Some(QuantityInput::Text(text)) if text.trim().is_empty() => return Ok(None),
        Some(QuantityInput::Text(text)) => text.trim().parse::<i32>().ok(),
    };
    parsed
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("foodQuantity must be a whole number"))
}

fn required(value: &str, field: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodRequest {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub food_id: Uuid,
    pub requester_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,
    pub donator_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /food-requests`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFoodRequest {
    pub food_id: String,
    pub requester_email: String,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the store needs to open a request. `donator_email` is copied from the
/// claimed listing inside the same write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDraft {
    pub food_id: Uuid,
    pub requester_email: String,
    pub requester_name: Option<String>,
    pub notes: Option<String>,
}

impl NewFoodRequest {
    /// Build a draft for `food_id`, normalizing free-text fields.
    #[must_use]
    pub fn into_draft(self, food_id: Uuid) -> RequestDraft {
        RequestDraft {
            food_id,
            requester_email: normalize_email(&self.requester_email),
            requester_name: clean(self.requester_name.as_deref()),
            notes: clean(self.notes.as_deref()),
        }
    }
}

/// Payload for `PATCH /food-requests/{id}/status`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "photoURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /users`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

impl RegisterUser {
    /// Validate and normalize the profile.
    ///
    /// # Errors
    /// Returns a client-facing message when the email is invalid.
    pub fn normalize(self) -> Result<Self, String> {
        let email = normalize_email(&self.email);
        if !valid_email(&email) {
            return Err("email is invalid".to_string());
        }
        Ok(Self {
            email,
            name: clean(self.name.as_deref()),
            photo_url: clean(self.photo_url.as_deref()),
        })
    }
}
