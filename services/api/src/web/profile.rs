//! services/api/src/web/profile.rs
//!
//! Profile endpoints: viewing and editing profiles, education and work
//! experience records, and the user search.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use prof_network_core::{
    EducationDetail, EducationInput, ProfileView, Relation, User, WorkExperience,
    WorkExperienceInput,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::rest::{error_response, port_error_response};
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: String,
    /// `own`, `connection` or `other`.
    pub relation: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub education: Vec<EducationResponse>,
    pub work_experience: Vec<ExperienceResponse>,
}

impl From<ProfileView> for ProfileResponse {
    fn from(view: ProfileView) -> Self {
        let relation = match view.relation {
            Relation::Own => "own",
            Relation::Connection => "connection",
            Relation::Other => "other",
        };
        Self {
            user_id: view.user_id,
            relation: relation.to_string(),
            name: view.name,
            email: view.email,
            date_of_birth: view.date_of_birth,
            education: view.education.into_iter().map(Into::into).collect(),
            work_experience: view.work_experience.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct UserSummary {
    pub user_id: String,
    pub name: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EducationPayload {
    pub institution_name: String,
    pub major: String,
    pub degree: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<EducationPayload> for EducationInput {
    fn from(p: EducationPayload) -> Self {
        Self {
            institution_name: p.institution_name,
            major: p.major,
            degree: p.degree,
            start_date: p.start_date,
            end_date: p.end_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EducationResponse {
    pub ordinal: i32,
    pub institution_name: String,
    pub major: String,
    pub degree: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<EducationDetail> for EducationResponse {
    fn from(d: EducationDetail) -> Self {
        Self {
            ordinal: d.ordinal,
            institution_name: d.institution_name,
            major: d.major,
            degree: d.degree,
            start_date: d.start_date,
            end_date: d.end_date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ExperiencePayload {
    pub company: String,
    pub role: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<ExperiencePayload> for WorkExperienceInput {
    fn from(p: ExperiencePayload) -> Self {
        Self {
            company: p.company,
            role: p.role,
            location: p.location,
            start_date: p.start_date,
            end_date: p.end_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ExperienceResponse {
    pub ordinal: i32,
    pub company: String,
    pub role: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<WorkExperience> for ExperienceResponse {
    fn from(w: WorkExperience) -> Self {
        Self {
            ordinal: w.ordinal,
            company: w.company,
            role: w.role,
            location: w.location,
            start_date: w.start_date,
            end_date: w.end_date,
        }
    }
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

/// GET /profile/{user_id} - View a profile as the caller is allowed to see it
#[utoipa::path(
    get,
    path = "/profile/{user_id}",
    params(("user_id" = String, Path, description = "The profile owner.")),
    responses(
        (status = 200, description = "Profile found", body = ProfileResponse),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .profiles
        .view(&viewer, &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ProfileResponse::from(view)))
}

/// PUT /profile - Replace the caller's name and date of birth
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserSummary)
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let name = req
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let user = state
        .directory
        .update_profile(&user_id, name, req.date_of_birth)
        .await
        .map_err(port_error_response)?;
    info!(user_id = %user_id, "profile updated");
    Ok(Json(UserSummary::from(user)))
}

/// GET /users?q= - Search users by id or name
#[utoipa::path(
    get,
    path = "/users",
    params(("q" = String, Query, description = "Case-insensitive fragment of an id or name.")),
    responses(
        (status = 200, description = "Matching users", body = [UserSummary])
    )
)]
pub async fn search_users_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut users: Vec<UserSummary> = state
        .directory
        .search_users(query.q.trim())
        .await
        .map_err(port_error_response)?
        .into_iter()
        .map(UserSummary::from)
        .collect();
    users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    Ok(Json(users))
}

//=========================================================================================
// Education Handlers
//=========================================================================================

/// GET /profile/education - The caller's education records
#[utoipa::path(
    get,
    path = "/profile/education",
    responses((status = 200, description = "Education records", body = [EducationResponse]))
)]
pub async fn list_education_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = state
        .directory
        .list_education(&user_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(
        records
            .into_iter()
            .map(EducationResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// POST /profile/education - Add an education record
#[utoipa::path(
    post,
    path = "/profile/education",
    request_body = EducationPayload,
    responses((status = 201, description = "Record added", body = EducationResponse))
)]
pub async fn add_education_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<EducationPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .directory
        .add_education(&user_id, payload.into())
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(EducationResponse::from(record))))
}

/// PUT /profile/education/{ordinal} - Replace an education record
#[utoipa::path(
    put,
    path = "/profile/education/{ordinal}",
    params(("ordinal" = i32, Path, description = "Stable record number.")),
    request_body = EducationPayload,
    responses(
        (status = 200, description = "Record updated", body = EducationResponse),
        (status = 404, description = "No such record")
    )
)]
pub async fn update_education_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(ordinal): Path<i32>,
    Json(payload): Json<EducationPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .directory
        .update_education(&user_id, ordinal, payload.into())
        .await
        .map_err(port_error_response)?;
    Ok(Json(EducationResponse::from(record)))
}

/// DELETE /profile/education/{ordinal} - Remove an education record
#[utoipa::path(
    delete,
    path = "/profile/education/{ordinal}",
    params(("ordinal" = i32, Path, description = "Stable record number.")),
    responses(
        (status = 204, description = "Record removed"),
        (status = 404, description = "No such record")
    )
)]
pub async fn delete_education_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(ordinal): Path<i32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .directory
        .delete_education(&user_id, ordinal)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Work Experience Handlers
//=========================================================================================

/// GET /profile/experience - The caller's work experience records
#[utoipa::path(
    get,
    path = "/profile/experience",
    responses((status = 200, description = "Work experience records", body = [ExperienceResponse]))
)]
pub async fn list_experience_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = state
        .directory
        .list_work_experience(&user_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(
        records
            .into_iter()
            .map(ExperienceResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// POST /profile/experience - Add a work experience record
#[utoipa::path(
    post,
    path = "/profile/experience",
    request_body = ExperiencePayload,
    responses((status = 201, description = "Record added", body = ExperienceResponse))
)]
pub async fn add_experience_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<ExperiencePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .directory
        .add_work_experience(&user_id, payload.into())
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(ExperienceResponse::from(record))))
}

/// PUT /profile/experience/{ordinal} - Replace a work experience record
#[utoipa::path(
    put,
    path = "/profile/experience/{ordinal}",
    params(("ordinal" = i32, Path, description = "Stable record number.")),
    request_body = ExperiencePayload,
    responses(
        (status = 200, description = "Record updated", body = ExperienceResponse),
        (status = 404, description = "No such record")
    )
)]
pub async fn update_experience_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(ordinal): Path<i32>,
    Json(payload): Json<ExperiencePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = state
        .directory
        .update_work_experience(&user_id, ordinal, payload.into())
        .await
        .map_err(port_error_response)?;
    Ok(Json(ExperienceResponse::from(record)))
}

/// DELETE /profile/experience/{ordinal} - Remove a work experience record
#[utoipa::path(
    delete,
    path = "/profile/experience/{ordinal}",
    params(("ordinal" = i32, Path, description = "Stable record number.")),
    responses(
        (status = 204, description = "Record removed"),
        (status = 404, description = "No such record")
    )
)]
pub async fn delete_experience_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(ordinal): Path<i32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .directory
        .delete_work_experience(&user_id, ordinal)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
