//! Postgres-backed store.
//!
//! Compound writes run inside a transaction. Claims and transitions are
//! conditional updates (`... WHERE food_status = 'available'`,
//! `... WHERE status = 'pending'`), so under READ COMMITTED a concurrent loser
//! re-evaluates the predicate after the winner commits and matches zero rows.

use super::{
    FoodFilter, FoodRepository, FoodRequestRepository, RequestFilter, Store, StoreError,
    Transition, UserRepository, FOOD, FOOD_REQUEST,
};
use crate::model::{
    Donator, FoodChanges, FoodListing, FoodRequest, FoodStatus, NewFood, RegisterUser,
    RequestDraft, RequestStatus, UserProfile,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use tracing::{info_span, instrument, Instrument, Span};
use uuid::Uuid;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const FOOD_COLUMNS: &str = "id, donator_email, donator_name, donator_image, food_name, \
     food_image, food_quantity, pickup_location, expire_date, additional_notes, food_status, \
     created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, food_id, requester_email, requester_name, donator_email, \
     notes, status, created_at, updated_at";

const PENDING_CONFLICT: &str = "food has a pending request; resolve it first";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`. Statements are idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(db_span("MIGRATE", "schema.sql"))
            .await?;
        Ok(())
    }
}

fn db_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == "23505")
}

fn decode_status<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|err: String| sqlx::Error::Decode(err.into()))
}

fn food_from_row(row: &PgRow) -> Result<FoodListing, sqlx::Error> {
    let status: String = row.try_get("food_status")?;
    Ok(FoodListing {
        id: row.try_get("id")?,
        donator: Donator {
            email: row.try_get("donator_email")?,
            name: row.try_get("donator_name")?,
            image: row.try_get("donator_image")?,
        },
        food_name: row.try_get("food_name")?,
        food_image: row.try_get("food_image")?,
        food_quantity: row.try_get("food_quantity")?,
        pickup_location: row.try_get("pickup_location")?,
        expire_date: row.try_get("expire_date")?,
        additional_notes: row.try_get("additional_notes")?,
        food_status: decode_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<FoodRequest, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(FoodRequest {
        id: row.try_get("id")?,
        food_id: row.try_get("food_id")?,
        requester_email: row.try_get("requester_email")?,
        requester_name: row.try_get("requester_name")?,
        donator_email: row.try_get("donator_email")?,
        notes: row.try_get("notes")?,
        status: decode_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Lock the listing row for the rest of the transaction. `false` if it is gone.
async fn lock_food(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<bool, sqlx::Error> {
    let query = "SELECT id FROM foods WHERE id = $1 FOR UPDATE";
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .instrument(db_span("SELECT", query))
        .await?;
    Ok(row.is_some())
}

async fn has_pending_request(
    tx: &mut Transaction<'_, Postgres>,
    food_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS (SELECT 1 FROM food_requests WHERE food_id = $1 AND status = 'pending')";
    sqlx::query_scalar(query)
        .bind(food_id)
        .fetch_one(&mut **tx)
        .instrument(db_span("SELECT", query))
        .await
}

#[async_trait]
impl FoodRepository for PgStore {
    #[instrument(skip(self))]
    async fn list_foods(&self, filter: &FoodFilter) -> Result<Vec<FoodListing>, StoreError> {
        let query = format!(
            "SELECT {FOOD_COLUMNS} FROM foods \
             WHERE ($1::text IS NULL OR donator_email = $1) \
             AND ($2::text IS NULL OR food_status = $2) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(filter.owner_email.as_deref())
            .bind(filter.status.map(FoodStatus::as_str))
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;

        Ok(rows
            .iter()
            .map(food_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self))]
    async fn get_food(&self, id: Uuid) -> Result<FoodListing, StoreError> {
        let query = format!("SELECT {FOOD_COLUMNS} FROM foods WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?
            .ok_or(StoreError::NotFound(FOOD))?;

        Ok(food_from_row(&row)?)
    }

    #[instrument(skip(self, food), fields(donator = %food.donator.email))]
    async fn create_food(&self, food: &NewFood) -> Result<Uuid, StoreError> {
        let query = r"
            INSERT INTO foods
                (id, donator_email, donator_name, donator_image, food_name, food_image,
                 food_quantity, pickup_location, expire_date, additional_notes, food_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'available')
        ";
        let id = Uuid::new_v4();
        sqlx::query(query)
            .bind(id)
            .bind(&food.donator.email)
            .bind(food.donator.name.as_deref())
            .bind(food.donator.image.as_deref())
            .bind(&food.food_name)
            .bind(&food.food_image)
            .bind(food.food_quantity)
            .bind(&food.pickup_location)
            .bind(&food.expire_date)
            .bind(food.additional_notes.as_deref())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        Ok(id)
    }

    #[instrument(skip(self, changes))]
    async fn update_food(
        &self,
        id: Uuid,
        changes: &FoodChanges,
    ) -> Result<FoodListing, StoreError> {
        let mut tx = self.pool.begin().await?;

        if !lock_food(&mut tx, id).await? {
            return Err(StoreError::NotFound(FOOD));
        }
        if changes.food_status.is_some() && has_pending_request(&mut tx, id).await? {
            return Err(StoreError::Conflict(PENDING_CONFLICT));
        }

        let query = format!(
            "UPDATE foods SET \
                food_name = COALESCE($2, food_name), \
                food_image = COALESCE($3, food_image), \
                food_quantity = COALESCE($4, food_quantity), \
                pickup_location = COALESCE($5, pickup_location), \
                expire_date = COALESCE($6, expire_date), \
                additional_notes = CASE WHEN $7::text IS NULL THEN additional_notes \
                    ELSE NULLIF($7, '') END, \
                food_status = COALESCE($8, food_status), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {FOOD_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(changes.food_name.as_deref())
            .bind(changes.food_image.as_deref())
            .bind(changes.food_quantity)
            .bind(changes.pickup_location.as_deref())
            .bind(changes.expire_date.as_deref())
            .bind(changes.additional_notes.as_deref())
            .bind(changes.food_status.map(FoodStatus::as_str))
            .fetch_one(&mut *tx)
            .instrument(db_span("UPDATE", &query))
            .await?;
        let food = food_from_row(&row)?;

        tx.commit().await?;
        Ok(food)
    }

    #[instrument(skip(self))]
    async fn delete_food(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if !lock_food(&mut tx, id).await? {
            return Err(StoreError::NotFound(FOOD));
        }
        if has_pending_request(&mut tx, id).await? {
            return Err(StoreError::Conflict(PENDING_CONFLICT));
        }

        let query = "DELETE FROM foods WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span("DELETE", query))
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl FoodRequestRepository for PgStore {
    #[instrument(skip(self))]
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<FoodRequest>, StoreError> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM food_requests \
             WHERE ($1::text IS NULL OR requester_email = $1) \
             AND ($2::text IS NULL OR donator_email = $2) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(filter.requester_email.as_deref())
            .bind(filter.donator_email.as_deref())
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;

        Ok(rows
            .iter()
            .map(request_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self))]
    async fn get_request(&self, id: Uuid) -> Result<FoodRequest, StoreError> {
        let query = format!("SELECT {REQUEST_COLUMNS} FROM food_requests WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?
            .ok_or(StoreError::NotFound(FOOD_REQUEST))?;

        Ok(request_from_row(&row)?)
    }

    #[instrument(skip(self, draft), fields(food_id = %draft.food_id))]
    async fn open_request(&self, draft: &RequestDraft) -> Result<FoodRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let claim = r"
            UPDATE foods SET food_status = 'requested', updated_at = NOW()
            WHERE id = $1 AND food_status = 'available'
            RETURNING donator_email
        ";
        let donator_email: Option<String> = sqlx::query_scalar(claim)
            .bind(draft.food_id)
            .fetch_optional(&mut *tx)
            .instrument(db_span("UPDATE", claim))
            .await?;

        let Some(donator_email) = donator_email else {
            let exists = "SELECT EXISTS (SELECT 1 FROM foods WHERE id = $1)";
            let found: bool = sqlx::query_scalar(exists)
                .bind(draft.food_id)
                .fetch_one(&mut *tx)
                .instrument(db_span("SELECT", exists))
                .await?;
            return Err(if found {
                StoreError::Conflict("food is not available")
            } else {
                StoreError::NotFound(FOOD)
            });
        };

        let insert = format!(
            "INSERT INTO food_requests \
                (id, food_id, requester_email, requester_name, donator_email, notes, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending') \
             RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&insert)
            .bind(Uuid::new_v4())
            .bind(draft.food_id)
            .bind(&draft.requester_email)
            .bind(draft.requester_name.as_deref())
            .bind(&donator_email)
            .bind(draft.notes.as_deref())
            .fetch_one(&mut *tx)
            .instrument(db_span("INSERT", &insert))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict("food is not available")
                } else {
                    StoreError::Database(err)
                }
            })?;
        let request = request_from_row(&row)?;

        tx.commit().await?;
        Ok(request)
    }

    #[instrument(skip(self))]
    async fn close_request(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<FoodRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let update = format!(
            "UPDATE food_requests SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&update)
            .bind(id)
            .bind(transition.from.as_str())
            .bind(transition.to.as_str())
            .fetch_optional(&mut *tx)
            .instrument(db_span("UPDATE", &update))
            .await?;

        let Some(row) = row else {
            let exists = "SELECT EXISTS (SELECT 1 FROM food_requests WHERE id = $1)";
            let found: bool = sqlx::query_scalar(exists)
                .bind(id)
                .fetch_one(&mut *tx)
                .instrument(db_span("SELECT", exists))
                .await?;
            return Err(if found {
                StoreError::Conflict("food request is no longer pending")
            } else {
                StoreError::NotFound(FOOD_REQUEST)
            });
        };
        let request = request_from_row(&row)?;

        let sync = "UPDATE foods SET food_status = $2, updated_at = NOW() WHERE id = $1";
        sqlx::query(sync)
            .bind(request.food_id)
            .bind(transition.listing.as_str())
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", sync))
            .await?;

        tx.commit().await?;
        Ok(request)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn upsert_user(&self, user: &RegisterUser) -> Result<(UserProfile, bool), StoreError> {
        let query = r"
            INSERT INTO users (id, email, name, photo_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, users.name),
                photo_url = COALESCE(EXCLUDED.photo_url, users.photo_url)
            RETURNING id, email, name, photo_url, created_at, (xmax = 0) AS inserted
        ";
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(user.name.as_deref())
            .bind(user.photo_url.as_deref())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        let profile = UserProfile {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            photo_url: row.try_get("photo_url")?,
            created_at: row.try_get("created_at")?,
        };
        let inserted: bool = row.try_get("inserted")?;

        Ok((profile, inserted))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("PING", query))
            .await?;
        Ok(())
    }
}
