use crate::{controller::health_check_controller, socket, AppState};
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Campaign Hub API"
        ),
        paths(
            health_check_controller::health_check,
            socket::handler::ws_handler,
        ),
        tags(
            (name = "campaign_hub", description = "Campaign real-time event hub")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(ws_routes(app_state))
        .merge(api_doc_routes())
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(socket::handler::ws_handler))
        .with_state(app_state)
}

fn api_doc_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use service::config::Config;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        let config = Config::try_parse_from(["campaign_hub", "--watch-assets", "false"]).unwrap();
        AppState::new(config)
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let response = define_routes(app_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"healthy");
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let response = define_routes(app_state())
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/health"].is_object());
        assert!(doc["paths"]["/ws"].is_object());
    }

    #[test]
    fn openapi_document_has_title() {
        assert_eq!(ApiDoc::openapi().info.title, "Campaign Hub API");
    }
}
