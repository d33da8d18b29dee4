use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::ApiError,
    state::AppState,
    users::{
        dto::{ProfileResponse, ProgressResponse, SaveAssignmentRequest, SaveProgressRequest},
        pictures,
        repo::{ProfileUpdate, User},
    },
};

const PRESIGN_TTL_SECS: u64 = 10 * 60;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/uploadProfilePicture", post(upload_profile_picture))
        .route("/profilePicture", get(get_profile_picture))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/saveProgress", post(save_progress))
        .route("/getProgress", get(get_progress))
        .route("/saveAssignmentProgress", post(save_assignment_progress))
        .route("/getAssignmentProgress", get(get_assignment_progress))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(ProfileResponse {
        name: user.name,
        email: user.email,
        profile_picture: user.profile_picture,
    }))
}

/// One multipart field read from a PUT /profile or upload request.
struct UploadedFile {
    file_name: Option<String>,
    content_type: String,
    body: Bytes,
}

/// PUT /profile: multipart form. Text fields overwrite only when present;
/// an uploaded file replaces the picture reference unconditionally.
#[instrument(skip(state, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut update = ProfileUpdate::default();
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("firstName") => update.first_name = Some(read_text(field).await?),
            Some("lastName") => update.last_name = Some(read_text(field).await?),
            Some("gender") => update.gender = Some(read_text(field).await?),
            Some("phone") => update.phone = Some(read_text(field).await?),
            Some("profilePicture") => file = Some(read_file(field).await?),
            other => {
                warn!(field = ?other, "ignoring unknown profile field");
            }
        }
    }

    if let Some(f) = file {
        let key = pictures::store_profile_picture(
            &state,
            user_id,
            f.file_name.as_deref(),
            &f.content_type,
            f.body,
        )
        .await?;
        update.profile_picture = Some(key);
    }

    if !User::update_profile(&state.db, user_id, &update).await? {
        return Err(ApiError::NotFound);
    }

    info!(user_id = %user_id, "profile updated");
    Ok(Json(MessageResponse::new("Profile updated successfully!")))
}

/// POST /uploadProfilePicture: multipart with a single `profilePicture`
/// file field. Bytes go to the object store first; the record keeps the key.
#[instrument(skip(state, mp))]
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut file: Option<UploadedFile> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("profilePicture") {
            file = Some(read_file(field).await?);
        }
    }
    let file = file.ok_or_else(|| ApiError::BadRequest("profilePicture is required".into()))?;

    let key = pictures::store_profile_picture(
        &state,
        user_id,
        file.file_name.as_deref(),
        &file.content_type,
        file.body,
    )
    .await?;

    if !User::set_profile_picture(&state.db, user_id, &key).await? {
        return Err(ApiError::NotFound);
    }

    info!(user_id = %user_id, key = %key, "profile picture uploaded");
    Ok(Json(MessageResponse::new(
        "Profile picture uploaded successfully!",
    )))
}

/// 302 to a short-lived presigned URL for the stored picture.
#[instrument(skip(state))]
pub async fn get_profile_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Redirect, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let key = user.profile_picture.ok_or(ApiError::NotFound)?;
    let url = state.storage.presign_get(&key, PRESIGN_TTL_SECS).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state, payload))]
pub async fn save_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SaveProgressRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !User::set_progress(&state.db, user_id, &payload.topic, payload.score).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = %user_id, topic = %payload.topic, score = payload.score, "progress saved");
    Ok(Json(MessageResponse::new("Progress saved successfully!")))
}

#[instrument(skip(state))]
pub async fn get_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProgressResponse>, ApiError> {
    let (quizzes, assignments) = User::progress_maps(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ProgressResponse {
        quizzes,
        assignments,
    }))
}

#[instrument(skip(state, payload))]
pub async fn save_assignment_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SaveAssignmentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !User::set_assignment_complete(&state.db, user_id, &payload.topic).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = %user_id, topic = %payload.topic, "assignment marked complete");
    Ok(Json(MessageResponse::new(
        "Assignment progress saved successfully!",
    )))
}

#[instrument(skip(state))]
pub async fn get_assignment_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<std::collections::HashMap<String, bool>>, ApiError> {
    let (_, assignments) = User::progress_maps(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(assignments))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<UploadedFile, ApiError> {
    let file_name = field.file_name().map(|s| s.to_string());
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let body = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(UploadedFile {
        file_name,
        content_type,
        body,
    })
}
