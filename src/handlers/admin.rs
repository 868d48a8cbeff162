use crate::models::*;
use crate::services::{AuditService, SubmitterService, WinnerService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use chrono::Utc;

// ---------- 中奖号码 ----------

#[utoipa::path(
    get,
    path = "/admin/winners",
    tag = "admin",
    params(WinningEntryQuery),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Winning entries, paginated", body = [WinningEntryResponse]),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
pub async fn list_winners(
    winner_service: web::Data<WinnerService>,
    query: web::Query<WinningEntryQuery>,
) -> Result<HttpResponse> {
    match winner_service.list_entries(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners",
    tag = "admin",
    request_body = CreateWinningEntryRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Raffle number drawn", body = WinningEntryResponse),
        (status = 400, description = "Invalid raffle number, prize or drawing time"),
        (status = 409, description = "Raffle number already drawn")
    )
)]
pub async fn create_winner(
    winner_service: web::Data<WinnerService>,
    request: web::Json<CreateWinningEntryRequest>,
) -> Result<HttpResponse> {
    match winner_service.draw(request.into_inner(), Utc::now()).await {
        Ok(entry) => Ok(HttpResponse::Created().json(ApiResponse::success(entry))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/winners/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Winning entry id")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Winning entry", body = WinningEntryResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_winner(
    winner_service: web::Data<WinnerService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match winner_service.get_entry(path.into_inner()).await {
        Ok(entry) => Ok(HttpResponse::Ok().json(ApiResponse::success(entry))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/winners/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Winning entry id")),
    request_body = UpdateWinningEntryRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Winning entry updated", body = WinningEntryResponse),
        (status = 404, description = "Not found"),
        (status = 409, description = "Raffle number already drawn")
    )
)]
pub async fn update_winner(
    winner_service: web::Data<WinnerService>,
    path: web::Path<i32>,
    request: web::Json<UpdateWinningEntryRequest>,
) -> Result<HttpResponse> {
    match winner_service
        .update_entry(path.into_inner(), request.into_inner(), Utc::now())
        .await
    {
        Ok(entry) => Ok(HttpResponse::Ok().json(ApiResponse::success(entry))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/winners/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Winning entry id")),
    security(("basic_auth" = [])),
    responses(
        (status = 204, description = "Winning entry deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_winner(
    winner_service: web::Data<WinnerService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match winner_service.delete_entry(path.into_inner(), Utc::now()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners/{id}/claim",
    tag = "admin",
    params(("id" = i32, Path, description = "Winning entry id")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Prize marked claimed", body = WinningEntryResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn claim_winner(
    winner_service: web::Data<WinnerService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match winner_service
        .set_claimed(path.into_inner(), true, Utc::now())
        .await
    {
        Ok(entry) => Ok(HttpResponse::Ok().json(ApiResponse::success(entry))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners/{id}/unclaim",
    tag = "admin",
    params(("id" = i32, Path, description = "Winning entry id")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Prize marked unclaimed", body = WinningEntryResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn unclaim_winner(
    winner_service: web::Data<WinnerService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match winner_service
        .set_claimed(path.into_inner(), false, Utc::now())
        .await
    {
        Ok(entry) => Ok(HttpResponse::Ok().json(ApiResponse::success(entry))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners/{id}/notify",
    tag = "admin",
    params(("id" = i32, Path, description = "Winning entry id")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Submitters of the number were texted", body = NotifyWinnerResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn notify_winner(
    winner_service: web::Data<WinnerService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match winner_service.notify_entry(path.into_inner(), Utc::now()).await {
        Ok(result) => {
            let message = result.warning.clone().unwrap_or_else(|| {
                format!("Notified {} submitter(s)", result.notified_count)
            });
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(result, message)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

// ---------- 提交者 ----------

#[utoipa::path(
    get,
    path = "/admin/submitters",
    tag = "admin",
    params(PaginationParams),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Submitters with their submissions", body = [SubmitterResponse])
    )
)]
pub async fn list_submitters(
    submitter_service: web::Data<SubmitterService>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match submitter_service.list_submitters(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/submitters",
    tag = "admin",
    request_body = CreateSubmitterRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Submitter created", body = SubmitterResponse),
        (status = 400, description = "Invalid phone or raffle number"),
        (status = 409, description = "Phone number already registered")
    )
)]
pub async fn create_submitter(
    submitter_service: web::Data<SubmitterService>,
    request: web::Json<CreateSubmitterRequest>,
) -> Result<HttpResponse> {
    match submitter_service
        .create_submitter(request.into_inner(), Utc::now())
        .await
    {
        Ok(submitter) => Ok(HttpResponse::Created().json(ApiResponse::success(submitter))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/submitters/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Submitter id")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Submitter", body = SubmitterResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_submitter(
    submitter_service: web::Data<SubmitterService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match submitter_service.get_submitter(path.into_inner()).await {
        Ok(submitter) => Ok(HttpResponse::Ok().json(ApiResponse::success(submitter))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/submitters/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Submitter id")),
    request_body = UpdateSubmitterRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Phone number changed", body = SubmitterResponse),
        (status = 404, description = "Not found"),
        (status = 409, description = "Phone number already registered")
    )
)]
pub async fn update_submitter(
    submitter_service: web::Data<SubmitterService>,
    path: web::Path<i32>,
    request: web::Json<UpdateSubmitterRequest>,
) -> Result<HttpResponse> {
    match submitter_service
        .update_phone(path.into_inner(), &request.phone_number, Utc::now())
        .await
    {
        Ok(submitter) => Ok(HttpResponse::Ok().json(ApiResponse::success(submitter))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/submitters/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Submitter id")),
    security(("basic_auth" = [])),
    responses(
        (status = 204, description = "Submitter and its submissions deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_submitter(
    submitter_service: web::Data<SubmitterService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match submitter_service
        .delete_submitter(path.into_inner(), Utc::now())
        .await
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/submitters/{id}/submissions",
    tag = "admin",
    params(("id" = i32, Path, description = "Submitter id")),
    request_body = AddSubmissionRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Submission added", body = SubmissionResponse),
        (status = 404, description = "Submitter not found"),
        (status = 409, description = "Already submitted")
    )
)]
pub async fn add_submission(
    submitter_service: web::Data<SubmitterService>,
    path: web::Path<i32>,
    request: web::Json<AddSubmissionRequest>,
) -> Result<HttpResponse> {
    match submitter_service
        .add_submission(path.into_inner(), &request.raffle_number, Utc::now())
        .await
    {
        Ok(submission) => Ok(HttpResponse::Created().json(ApiResponse::success(submission))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/submissions/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Submission id")),
    security(("basic_auth" = [])),
    responses(
        (status = 204, description = "Submission deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_submission(
    submitter_service: web::Data<SubmitterService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match submitter_service
        .delete_submission(path.into_inner(), Utc::now())
        .await
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

// ---------- 审计 ----------

#[utoipa::path(
    get,
    path = "/admin/audit",
    tag = "admin",
    params(PaginationParams),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Audit trail, newest first", body = [AuditRecordResponse])
    )
)]
pub async fn list_audit(
    audit_service: web::Data<AuditService>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match audit_service.list_records(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/winners", web::get().to(list_winners))
            .route("/winners", web::post().to(create_winner))
            .route("/winners/{id}", web::get().to(get_winner))
            .route("/winners/{id}", web::put().to(update_winner))
            .route("/winners/{id}", web::delete().to(delete_winner))
            .route("/winners/{id}/claim", web::post().to(claim_winner))
            .route("/winners/{id}/unclaim", web::post().to(unclaim_winner))
            .route("/winners/{id}/notify", web::post().to(notify_winner))
            .route("/submitters", web::get().to(list_submitters))
            .route("/submitters", web::post().to(create_submitter))
            .route("/submitters/{id}", web::get().to(get_submitter))
            .route("/submitters/{id}", web::put().to(update_submitter))
            .route("/submitters/{id}", web::delete().to(delete_submitter))
            .route("/submitters/{id}/submissions", web::post().to(add_submission))
            .route("/submissions/{id}", web::delete().to(delete_submission))
            .route("/audit", web::get().to(list_audit)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::external::testing::RecordingSender;
    use crate::utils::RaffleNumberPolicy;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn policy() -> RaffleNumberPolicy {
        RaffleNumberPolicy::new(r"^[0-9]{4,5}$").unwrap()
    }

    #[actix_web::test]
    async fn test_draw_submit_and_notify_flow() {
        let pool = create_test_pool().await;
        let sender = Arc::new(RecordingSender::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(WinnerService::new(
                    pool.clone(),
                    policy(),
                    DrawingWindow::default(),
                    sender.clone(),
                    "WINNER! WINNER! CHICKEN DINNER!".to_string(),
                )))
                .app_data(web::Data::new(SubmitterService::new(pool.clone(), policy())))
                .app_data(web::Data::new(AuditService::new(pool.clone())))
                .configure(admin_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/winners")
            .set_json(json!({"raffle_number": "4242", "item": "T-shirt"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let entry_id = body["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/admin/winners")
            .set_json(json!({"raffle_number": "4242", "item": "Mug"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/admin/submitters")
            .set_json(json!({"phone_number": "+18085551234", "raffle_numbers": ["4242"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri(&format!("/admin/winners/{entry_id}/notify"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["notified_count"], 1);
        assert_eq!(sender.sent().len(), 1);

        let req = test::TestRequest::post()
            .uri(&format!("/admin/winners/{entry_id}/claim"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["is_claimed"], true);

        let req = test::TestRequest::get().uri("/admin/audit").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["data"]["total"].as_u64().unwrap() >= 4);

        let req = test::TestRequest::get()
            .uri("/admin/winners/999")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
