use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::hierarchy::{CourseTree, ModuleNode};
use crate::identity::Identity;
use crate::models::*;
use crate::quiz::Graded;
use crate::state::AppState;
use crate::stats::{CourseStats, LearnerStats};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        // content hierarchy + authoring
        .route("/api/courses", post(create_course))
        .route("/api/courses/:course_id", get(course_tree))
        .route("/api/courses/:course_id/modules", post(create_module))
        .route("/api/courses/:course_id/modules/:module_id", put(update_module))
        .route("/api/modules/:module_id", get(module_view))
        // enrollment + progress
        .route(
            "/api/courses/:course_id/enrollment",
            post(enroll).delete(unenroll),
        )
        .route("/api/courses/:course_id/progress", put(set_progress))
        .route("/api/courses/:course_id/module-progress", get(module_progress))
        .route(
            "/api/courses/:course_id/modules/:module_id/toggle",
            post(toggle_module),
        )
        .route("/api/me/enrollments", get(my_enrollments))
        // quizzes
        .route("/api/content/:item_id/submit", post(submit_quiz))
        .route("/api/me/quiz-attempts", get(my_quiz_attempts))
        // badges
        .route("/api/badges", get(list_badges).post(create_badge))
        .route("/api/users/:user_id/badges", get(user_badges))
        .route(
            "/api/users/:user_id/badges/:badge_id",
            post(assign_badge).delete(revoke_badge),
        )
        // admin CRM
        .route("/api/admin/courses/:course_id/stats", get(course_stats))
        .route(
            "/api/admin/courses/:course_id/enrollments",
            get(course_enrollments),
        )
        .route("/api/admin/users/:user_id/stats", get(learner_stats))
        .with_state(state)
}

// --- content ---

async fn create_course(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewCourse>,
) -> ApiResult<Course> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    let course = app.authoring.create_course(req).await.map_err(reject)?;
    Ok(Json(course))
}

async fn course_tree(
    State(app): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseTree> {
    Ok(Json(app.hierarchy.course_tree(course_id).await.map_err(reject)?))
}

async fn module_view(
    State(app): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<ModuleNode> {
    Ok(Json(app.hierarchy.module(module_id).await.map_err(reject)?))
}

async fn create_module(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
    Json(draft): Json<ModuleDraft>,
) -> ApiResult<ModuleNode> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    let node = app
        .authoring
        .save_module(course_id, None, draft)
        .await
        .map_err(reject)?;
    Ok(Json(node))
}

async fn update_module(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(draft): Json<ModuleDraft>,
) -> ApiResult<ModuleNode> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    let node = app
        .authoring
        .save_module(course_id, Some(module_id), draft)
        .await
        .map_err(reject)?;
    Ok(Json(node))
}

// --- enrollment + progress ---

async fn enroll(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
    Query(target): Query<TargetUser>,
) -> ApiResult<Enrollment> {
    let user_id = Identity::from_headers(&headers)
        .acting_on(target.user_id)
        .map_err(reject)?;
    let e = app.enrollments.enroll(user_id, course_id).await.map_err(reject)?;
    Ok(Json(e))
}

async fn unenroll(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
    Query(target): Query<TargetUser>,
) -> ApiResult<serde_json::Value> {
    let user_id = Identity::from_headers(&headers)
        .acting_on(target.user_id)
        .map_err(reject)?;
    app.enrollments.unenroll(user_id, course_id).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn set_progress(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
    Query(target): Query<TargetUser>,
    Json(req): Json<SetProgressReq>,
) -> ApiResult<serde_json::Value> {
    let user_id = Identity::from_headers(&headers)
        .acting_on(target.user_id)
        .map_err(reject)?;
    let stored = app
        .enrollments
        .set_progress(user_id, course_id, req.percent)
        .await
        .map_err(reject)?;
    Ok(Json(serde_json::json!({ "progress": stored })))
}

async fn my_enrollments(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<Enrollment>> {
    let user_id = Identity::from_headers(&headers).user().map_err(reject)?;
    Ok(Json(app.enrollments.enrollments_for_user(user_id).await.map_err(reject)?))
}

async fn module_progress(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<ModuleProgress>> {
    let user_id = Identity::from_headers(&headers).user().map_err(reject)?;
    let rows = app
        .completion
        .progress_for_course(user_id, course_id)
        .await
        .map_err(reject)?;
    Ok(Json(rows))
}

async fn toggle_module(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<ModuleProgress> {
    let user_id = Identity::from_headers(&headers).user().map_err(reject)?;
    let module = app.hierarchy.module(module_id).await.map_err(reject)?;
    if module.module.course_id != course_id {
        return Err(reject(Error::NotFound("module")));
    }
    let p = app
        .completion
        .toggle_completion(user_id, module_id, course_id)
        .await
        .map_err(reject)?;
    Ok(Json(p))
}

// --- quizzes ---

#[derive(Serialize)]
struct SubmitResp {
    #[serde(flatten)]
    graded: Graded,
    /// How long the client keeps the wrong answer on screen before clearing it.
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

async fn submit_quiz(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<Uuid>,
    Json(req): Json<SubmitQuizReq>,
) -> ApiResult<SubmitResp> {
    let user_id = Identity::from_headers(&headers).user().map_err(reject)?;
    let graded = app
        .quizzes
        .submit(user_id, item_id, &req.selections)
        .await
        .map_err(reject)?;
    let retry_after_ms =
        (!graded.correct).then(|| app.quiz_reset_delay.as_millis() as u64);
    Ok(Json(SubmitResp {
        graded,
        retry_after_ms,
    }))
}

async fn my_quiz_attempts(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<QuizAttempt>> {
    let user_id = Identity::from_headers(&headers).user().map_err(reject)?;
    Ok(Json(app.quizzes.attempts_for_user(user_id).await.map_err(reject)?))
}

// --- badges ---

async fn list_badges(State(app): State<AppState>) -> ApiResult<Vec<Badge>> {
    Ok(Json(app.badges.list_badges().await.map_err(reject)?))
}

async fn create_badge(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewBadge>,
) -> ApiResult<Badge> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    Ok(Json(app.badges.create_badge(req).await.map_err(reject)?))
}

async fn user_badges(
    State(app): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<AwardedBadge>> {
    Ok(Json(app.badges.badges_for_user(user_id).await.map_err(reject)?))
}

async fn assign_badge(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path((user_id, badge_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<UserBadge> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    Ok(Json(app.badges.assign(user_id, badge_id).await.map_err(reject)?))
}

async fn revoke_badge(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path((user_id, badge_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    app.badges.revoke(user_id, badge_id).await.map_err(reject)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// --- admin CRM ---

async fn course_stats(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseStats> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    Ok(Json(app.stats.course(course_id).await.map_err(reject)?))
}

async fn course_enrollments(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<Enrollment>> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    let rows = app
        .enrollments
        .enrollments_for_course(course_id)
        .await
        .map_err(reject)?;
    Ok(Json(rows))
}

async fn learner_stats(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> ApiResult<LearnerStats> {
    Identity::from_headers(&headers).require_admin().map_err(reject)?;
    Ok(Json(app.stats.learner(user_id).await.map_err(reject)?))
}

// --- helpers ---

fn reject(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyEnrolled
        | Error::NotEnrolled
        | Error::AlreadyAssigned
        | Error::NotAssigned => StatusCode::CONFLICT,
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Unauthenticated => StatusCode::UNAUTHORIZED,
        Error::Forbidden => StatusCode::FORBIDDEN,
        Error::Store(_) | Error::PartiallyApplied { .. } => return e500(e),
    };
    tracing::warn!(error = %e, status = status.as_u16(), "request rejected");
    (status, e.to_string())
}

fn e500<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn partial_writes_are_server_errors() {
        let (status, body) = reject(Error::PartiallyApplied {
            step: "module saved",
            source: StoreError::Other("connection reset".into()),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("module saved"));
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(reject(Error::NotFound("course")).0, StatusCode::NOT_FOUND);
        assert_eq!(reject(Error::NotEnrolled).0, StatusCode::CONFLICT);
        assert_eq!(reject(Error::validation("x")).0, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reject(Error::Unauthenticated).0, StatusCode::UNAUTHORIZED);
        assert_eq!(reject(Error::Forbidden).0, StatusCode::FORBIDDEN);
    }
}
