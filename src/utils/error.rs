use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model service temporarily unavailable.")]
    ModelNotReady,

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Output tensor shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DetectError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DetectError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DetectError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            DetectError::Base64(_) => StatusCode::BAD_REQUEST,
            DetectError::Json(_) => StatusCode::BAD_REQUEST,
            DetectError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DetectError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            DetectError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DetectError::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
            DetectError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            DetectError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DetectError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            DetectError::ModelNotReady => "MODEL_NOT_READY",
            DetectError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            DetectError::ShapeMismatch(_) => "SHAPE_MISMATCH",
            DetectError::Inference(_) => "INFERENCE_ERROR",
            DetectError::Ort(_) => "ORT_ERROR",
            DetectError::InvalidInput(_) => "INVALID_INPUT",
            DetectError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            DetectError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            DetectError::Unauthorized(_) => "UNAUTHORIZED",
            DetectError::Config(_) => "CONFIG_ERROR",
            DetectError::Io(_) => "IO_ERROR",
            DetectError::Json(_) => "JSON_ERROR",
            DetectError::Base64(_) => "BASE64_DECODE_ERROR",
            DetectError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for DetectError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 失败响应保持 {message} 结构，附带机器可读的错误码
        let error_response = serde_json::json!({
            "message": self.to_string(),
            "code": self.error_code(),
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(error_response)).into_response()
    }
}
