//! Profile Routes
//!
//! Create/update profiles, fetch profile data, and expose the reference
//! lists the frontend filters on.
//!
//! - POST /api/profile - Create or update a profile
//! - GET /api/profile?userID= - Fetch a profile
//! - GET /api/facts - Basic attributes of every profile
//! - POST /api/profile/avatar - Save avatar and username
//! - POST /api/profile/edit - Merge editable fields
//! - GET /api/available_languages - Languages seen in profiles
//! - GET /api/available_timezones - Timezones seen in profiles
//! - GET /api/matchedUsers?userID= - Unique timezones of a user's partners

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::dto::{
    insert_if_sent, present, truthy, AvatarRequest, EditProfileRequest, FactEntry, MessageResponse,
    SaveProfileRequest, UserQuery,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::{
    DocumentStore, SetMode, StoreResult, WriteSet, AVAILABLE_COUNTRIES, AVAILABLE_LANGUAGES,
    PROFILES,
};

/// POST /api/profile
///
/// Merge the required fields and any optional ones that were sent, then
/// register the profile's languages and timezone in the reference lists.
pub async fn save_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveProfileRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let required = [
        &req.user_id,
        &req.intro,
        &req.age_range,
        &req.hobbies,
        &req.timezone,
        &req.language,
        &req.country,
    ];
    if !required.iter().all(|field| present(field)) {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let user_id = document_id(req.user_id.as_ref())?;
    let language = req.language.clone();
    let timezone = req.timezone.clone();

    let mut update = serde_json::Map::new();
    insert_if_sent(&mut update, "userID", req.user_id);
    insert_if_sent(&mut update, "intro", req.intro);
    insert_if_sent(&mut update, "ageRange", req.age_range);
    insert_if_sent(&mut update, "hobbies", req.hobbies);
    insert_if_sent(&mut update, "timezone", req.timezone);
    insert_if_sent(&mut update, "language", req.language);
    insert_if_sent(&mut update, "country", req.country);
    insert_if_sent(&mut update, "favorites", req.favorites);
    insert_if_sent(&mut update, "facts", req.facts);
    insert_if_sent(&mut update, "sayings", req.sayings);
    insert_if_sent(&mut update, "username", req.username);
    insert_if_sent(&mut update, "avatarUrl", req.avatar_url);
    insert_if_sent(&mut update, "countryCode", req.country_code);
    insert_if_sent(&mut update, "languageCode", req.language_code);

    if let Err(e) = state
        .store
        .set(PROFILES, &user_id, WriteSet::from_map(update), SetMode::Merge)
        .await
    {
        tracing::error!(user_id = %user_id, error = %e, "Error saving profile");
        return Err(e.into());
    }

    let languages: Vec<&str> = match &language {
        Some(Value::String(l)) => vec![l.as_str()],
        Some(Value::Array(ls)) => ls.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    for lang in languages {
        if let Err(e) = register_name(state.store.as_ref(), AVAILABLE_LANGUAGES, lang).await {
            tracing::error!(language = %lang, error = %e, "Error adding language to available_languages");
        }
    }

    if let Some(Value::String(tz)) = &timezone {
        if let Err(e) = register_name(state.store.as_ref(), AVAILABLE_COUNTRIES, tz).await {
            tracing::error!(timezone = %tz, error = %e, "Error adding timezone to available_countries");
        }
    }

    Ok(Json(MessageResponse::new("Profile saved successfully")))
}

/// GET /api/profile?userID=
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing userID"))?;

    match state.store.get(PROFILES, &user_id).await {
        Ok(Some(doc)) => Ok(Json(doc.into_value())),
        Ok(None) => Err(ApiError::not_found("Profile not found")),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Error fetching profile");
            Err(e.into())
        }
    }
}

/// GET /api/facts
pub async fn list_facts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<FactEntry>>> {
    let profiles = state.store.list(PROFILES).await?;

    let facts = profiles
        .into_iter()
        .map(|doc| FactEntry {
            age_range: doc.data.get("ageRange").cloned(),
            hobbies: doc.data.get("hobbies").cloned(),
            timezone: doc.data.get("timezone").cloned(),
            language: doc.data.get("language").cloned(),
        })
        .collect();

    Ok(Json(facts))
}

/// POST /api/profile/avatar
pub async fn save_avatar(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AvatarRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !present(&req.user_id) || !present(&req.username) || !present(&req.avatar_url) {
        return Err(ApiError::bad_request(
            "Missing required fields (userID, username, avatarUrl)",
        ));
    }
    let user_id = document_id(req.user_id.as_ref())?;

    let mut update = serde_json::Map::new();
    insert_if_sent(&mut update, "userID", req.user_id);
    insert_if_sent(&mut update, "username", req.username);
    insert_if_sent(&mut update, "avatarUrl", req.avatar_url);

    state
        .store
        .set(PROFILES, &user_id, WriteSet::from_map(update), SetMode::Merge)
        .await?;

    Ok(Json(MessageResponse::new(
        "Avatar and username saved successfully",
    )))
}

/// POST /api/profile/edit
///
/// Every editable field is written; absent ones are reset to empty.
pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditProfileRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !present(&req.user_id) {
        return Err(ApiError::bad_request("Missing userID"));
    }
    let user_id = document_id(req.user_id.as_ref())?;

    let or_text = |v: Option<Value>| v.filter(truthy).unwrap_or_else(|| json!(""));
    let or_list = |v: Option<Value>| v.filter(truthy).unwrap_or_else(|| json!([]));

    let writes = WriteSet::new()
        .set("userID", user_id.clone())
        .set("intro", or_text(req.intro))
        .set("ageRange", or_text(req.age_range))
        .set("hobbies", or_list(req.hobbies))
        .set("region", or_text(req.region))
        .set("languages", or_list(req.languages))
        .set("sayings", or_list(req.sayings))
        .set("username", or_text(req.username))
        .set("avatarUrl", or_text(req.avatar_url))
        .set("country", or_text(req.country));

    if let Err(e) = state
        .store
        .set(PROFILES, &user_id, writes, SetMode::Merge)
        .await
    {
        tracing::error!(user_id = %user_id, error = %e, "Error saving profile (edit)");
        return Err(e.into());
    }

    Ok(Json(MessageResponse::new("Profile (edit) saved successfully")))
}

/// GET /api/available_languages
pub async fn available_languages(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Value>>> {
    list_with_ids(state.store.as_ref(), AVAILABLE_LANGUAGES).await
}

/// GET /api/available_timezones
pub async fn available_timezones(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Value>>> {
    list_with_ids(state.store.as_ref(), AVAILABLE_COUNTRIES).await
}

/// GET /api/matchedUsers?userID=
///
/// Partners are derived from the profile's chat ids (`a_b`).
pub async fn matched_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing userID"))?;

    let profile = state
        .store
        .get(PROFILES, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User profile not found"))?;

    let chat_ids: Vec<&str> = profile
        .field("chats")
        .and_then(Value::as_array)
        .map(|chats| chats.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut timezones: Vec<String> = Vec::new();
    for chat_id in chat_ids {
        let Some(partner) = partner_from_chat_id(chat_id, &user_id) else {
            continue;
        };
        if let Some(doc) = state.store.get(PROFILES, partner).await? {
            if let Some(tz) = doc.str_field("timezone").filter(|tz| !tz.is_empty()) {
                if !timezones.iter().any(|seen| seen == tz) {
                    timezones.push(tz.to_string());
                }
            }
        }
    }

    Ok(Json(timezones))
}

/// The other user of a chat id `a_b`, `None` when there is none
fn partner_from_chat_id<'a>(chat_id: &'a str, user_id: &str) -> Option<&'a str> {
    let mut parts = chat_id.split('_');
    let a = parts.next().unwrap_or_default();
    let b = parts.next().unwrap_or_default();
    let partner = if a == user_id { b } else { a };
    Some(partner).filter(|p| !p.is_empty())
}

/// Turn a user id value into a document id
fn document_id(value: Option<&Value>) -> ApiResult<String> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ApiError::bad_request("userID must be a string")),
    }
}

/// Add `{name}` under the URL-encoded name unless it already exists
async fn register_name(store: &dyn DocumentStore, collection: &str, name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Ok(());
    }
    let doc_id = urlencoding::encode(name).into_owned();
    if store.get(collection, &doc_id).await?.is_none() {
        store
            .set(collection, &doc_id, WriteSet::new().set("name", name), SetMode::Overwrite)
            .await?;
    }
    Ok(())
}

/// Every document of a collection as `{id, ...fields}`
async fn list_with_ids(store: &dyn DocumentStore, collection: &str) -> ApiResult<Json<Vec<Value>>> {
    let docs = store.list(collection).await?;
    Ok(Json(
        docs.into_iter()
            .map(|doc| {
                let mut entry = serde_json::Map::new();
                entry.insert("id".to_string(), Value::String(doc.id));
                entry.extend(doc.data);
                Value::Object(entry)
            })
            .collect(),
    ))
}
