use crate::models::{ApiResponse, WinnerBoardResponse};
use crate::services::WinnerService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/winners",
    tag = "public",
    responses(
        (status = 200, description = "Drawn numbers split by claim status", body = WinnerBoardResponse)
    )
)]
pub async fn winner_board(winner_service: web::Data<WinnerService>) -> Result<HttpResponse> {
    match winner_service.board().await {
        Ok(board) => Ok(HttpResponse::Ok().json(ApiResponse::success(board))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn public_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/winners", web::get().to(winner_board));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::external::testing::RecordingSender;
    use crate::models::{CreateWinningEntryRequest, DrawingWindow};
    use crate::utils::RaffleNumberPolicy;
    use actix_web::{App, test};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_board_splits_claimed() {
        let pool = create_test_pool().await;
        let service = WinnerService::new(
            pool.clone(),
            RaffleNumberPolicy::new(r"^[0-9]{4,5}$").unwrap(),
            DrawingWindow::default(),
            Arc::new(RecordingSender::default()),
            "win".to_string(),
        );
        let entry = service
            .draw(
                CreateWinningEntryRequest {
                    raffle_number: "4242".to_string(),
                    item: "T-shirt".to_string(),
                    raffle_time: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        service.set_claimed(entry.id, true, Utc::now()).await.unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(public_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/winners").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["claimed"][0]["raffle_number"], "4242");
        assert_eq!(body["data"]["unclaimed"].as_array().unwrap().len(), 0);
        assert!(body["data"]["claimed"][0].get("admin_notification_count").is_none());
    }
}
