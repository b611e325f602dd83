pub mod auth;
pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    detect::COCO_CLASSES,
    model::{EngineHandle, EngineStatus},
    utils::error::DetectError,
    Config, Result,
};
use auth::AuthService;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 应用共享状态：配置、引擎句柄、认证服务
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: EngineHandle,
    pub auth: AuthService,
}

pub async fn serve(config: Config) -> Result<()> {
    // 引擎句柄显式构造，模型在后台加载；就绪前请求得到503
    let engine = EngineHandle::new();
    engine.spawn_load(config.clone());

    let auth = AuthService::new(
        config.auth_config.jwt_secret.clone(),
        config.auth_config.token_ttl_secs,
    );

    let state = AppState {
        config: config.clone(),
        engine,
        auth,
    };

    let app = create_app(state);

    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        DetectError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /api/auth/register - Create account");
    tracing::info!("  POST /api/auth/login    - Obtain JWT");
    tracing::info!("  POST /api/detect        - Multipart image upload (JWT)");
    tracing::info!("  POST /api/detect/base64 - JSON base64 upload (JWT)");
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  GET  /api/info          - Service information");

    // 启动服务器
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        DetectError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DetectError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

fn create_app(state: AppState) -> Router {
    // 检测路由需要有效的JWT
    let protected = Router::new()
        .route("/api/detect", post(handlers::detect_upload_handler))
        .route("/api/detect/base64", post(handlers::detect_json_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(protected)
        // 认证路由
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        // 添加中间件 - 使用分层模式避免复杂类型嵌套
        .layer(DefaultBodyLimit::max(state.config.server_config.max_request_size))
        .layer(RequestBodyLimitLayer::new(
            state.config.server_config.max_request_size,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server_config.request_timeout,
        )))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (status, model_status) = match state.engine.status() {
        EngineStatus::Ready => ("healthy", "ready"),
        EngineStatus::Loading => ("starting", "loading"),
        EngineStatus::Failed => ("unhealthy", "failed"),
    };

    Json(json!({
        "status": status,
        "model": model_status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": "COCO Detection Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": state.engine.stats(),
        "model_status": state.engine.status().as_str(),
        "classes": COCO_CLASSES.len(),
        "input_size": state.config.detect_config.input_size,
        "confidence_threshold": state.config.detect_config.confidence_threshold,
        "workers": state.config.workers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::new(
            "127.0.0.1:0".to_string(),
            "models/yolov8n.onnx".to_string(),
            None,
            true,
        )
        .unwrap();

        let auth = AuthService::new(
            config.auth_config.jwt_secret.clone(),
            config.auth_config.token_ttl_secs,
        );

        AppState {
            config,
            engine: EngineHandle::new(),
            auth,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn health_reports_model_loading() {
        let app = create_app(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "starting");
        assert_eq!(body["model"], "loading");
    }

    #[tokio::test]
    async fn register_and_login_over_http() {
        let state = test_state();
        let app = create_app(state);

        let credentials = serde_json::json!({"username": "alice", "password": "hunter2"});
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(credentials.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Registration successful");
        assert!(body["token"].as_str().is_some());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(credentials.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Login successful");

        // 错误密码
        let bad = serde_json::json!({"username": "alice", "password": "wrong"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(bad.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn detect_without_token_is_denied() {
        let app = create_app(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/detect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "No token, authorization denied");
    }

    #[tokio::test]
    async fn detect_before_model_ready_is_503() {
        let state = test_state();
        let token = state.auth.register("alice", "hunter2").unwrap();
        let app = create_app(state);

        let boundary = "test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"red.png\"\r\nContent-Type: image/png\r\n\r\n",
                boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(&png_bytes());
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/detect")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["code"], "MODEL_NOT_READY");
        assert_eq!(body["message"], "Model service temporarily unavailable.");
    }

    #[tokio::test]
    async fn invalid_token_is_denied() {
        let app = create_app(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/detect/base64")
                    .header(header::AUTHORIZATION, "Bearer not-a-real-token")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"image": "aGVsbG8="}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Token is not valid");
    }
}
