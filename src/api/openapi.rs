use super::handlers::{food_requests, foods, health, users};
use crate::{
    error::ErrorBody,
    model::{
        Donator, FoodListing, FoodPatch, FoodRequest, FoodStatus, NewFood, NewFoodRequest,
        RegisterUser, RequestStatus, StatusUpdate, UserProfile,
    },
};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, InfoBuilder, License,
    },
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        foods::list_foods,
        foods::get_food,
        foods::foods_by_email,
        foods::create_food,
        foods::update_food,
        foods::delete_food,
        food_requests::create_request,
        food_requests::requests_by_requester,
        food_requests::requests_by_donator,
        food_requests::get_request,
        food_requests::update_request_status,
        users::register,
    ),
    components(schemas(
        health::Health,
        ErrorBody,
        Donator,
        FoodListing,
        FoodStatus,
        NewFood,
        FoodPatch,
        foods::CreatedFood,
        foods::Deleted,
        FoodRequest,
        RequestStatus,
        NewFoodRequest,
        StatusUpdate,
        UserProfile,
        RegisterUser,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service health"),
        (name = "foods", description = "Donated food listings"),
        (name = "food-requests", description = "Claims on listings and their lifecycle"),
        (name = "users", description = "User profiles"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// The generated document with its info block taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();
    doc
}

fn cargo_info() -> utoipa::openapi::Info {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    non_empty(value.trim())
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            non_empty(name.trim()),
            non_empty(email.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Share Meal"));
            assert_eq!(contact.email.as_deref(), Some("team@sharemeal.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, env!("CARGO_PKG_LICENSE"));
        }
    }

    #[test]
    fn documents_lifecycle_routes() {
        let doc = openapi();
        for path in [
            "/foods",
            "/foods/{id}",
            "/foods-by-email",
            "/food-requests",
            "/food-requests/{id}",
            "/food-requests/{id}/status",
            "/food-requests-by-donator",
            "/users",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let has_bearer = doc
            .components
            .as_ref()
            .is_some_and(|components| components.security_schemes.contains_key("bearer_auth"));
        assert!(has_bearer);
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Jane Doe <jane@example.com>"),
            (Some("Jane Doe"), Some("jane@example.com"))
        );
        assert_eq!(parse_author("Jane Doe"), (Some("Jane Doe"), None));
        assert_eq!(parse_author("<jane@example.com>"), (None, Some("jane@example.com")));
    }
}
