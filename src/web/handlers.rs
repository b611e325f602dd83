use crate::{
    detect::{DetectOptions, DetectOutcome, DetectPipeline},
    utils::error::DetectError,
    web::{
        auth::Claims,
        extractors::{RequestId, Validate, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct DetectJsonRequest {
    /// Base64编码的图像数据
    pub image: String,

    /// 最小置信度阈值
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

impl Validate for DetectJsonRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        if let Some(confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err("Confidence must be between 0.0 and 1.0".to_string());
            }
        }

        Ok(())
    }
}

/// 检测成功响应，保持原后端的字段契约
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub message: String,
    pub top_class_name: String,
    pub confidence: f32,
    pub raw_output_dims: Vec<usize>,
}

impl From<DetectOutcome> for DetectResponse {
    fn from(outcome: DetectOutcome) -> Self {
        Self {
            message: "YOLO Detection Complete".to_string(),
            top_class_name: outcome.detection.label.clone(),
            confidence: outcome.detection.rounded_confidence(),
            raw_output_dims: outcome.output_dims,
        }
    }
}

/// Multipart文件上传处理器
pub async fn detect_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing multipart detect request: request_id={}, user={}",
        request_id,
        claims.sub
    );

    let mut image_data: Option<Bytes> = None;
    let mut options = DetectOptions::default();

    // 解析multipart数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        DetectError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "image" | "file" => {
                // 验证内容类型
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(DetectError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    DetectError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(DetectError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "min_confidence" => {
                let value = field.text().await.unwrap_or_default();
                if let Ok(confidence) = value.parse::<f32>() {
                    options.min_confidence = Some(confidence.clamp(0.0, 1.0));
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    // 验证必需的图像数据
    let image_data = image_data
        .ok_or_else(|| DetectError::InvalidInput("No image file uploaded.".to_string()))?;

    // 引擎未就绪时快速失败
    let engine = state.engine.get()?;

    let outcome = DetectPipeline::process_bytes(&image_data, engine, &state.config, options).await?;

    tracing::info!(
        "Upload detect completed: request_id={}, label=\"{}\", time={:.3}s",
        request_id,
        outcome.detection.label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(DetectResponse::from(outcome)))
}

/// JSON base64上传处理器
pub async fn detect_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Extension(claims): Extension<Claims>,
    ValidatedJson(request): ValidatedJson<DetectJsonRequest>,
) -> Result<Json<DetectResponse>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON detect request: request_id={}, user={}",
        request_id,
        claims.sub
    );

    let engine = state.engine.get()?;

    let options = DetectOptions {
        min_confidence: request.min_confidence,
    };

    let outcome =
        DetectPipeline::process_base64(&request.image, engine, &state.config, options).await?;

    tracing::info!(
        "JSON detect completed: request_id={}, label=\"{}\", time={:.3}s",
        request_id,
        outcome.detection.label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(DetectResponse::from(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use std::time::Duration;

    #[test]
    fn response_reports_rounded_confidence() {
        let outcome = DetectOutcome {
            detection: Detection {
                label: "bus".to_string(),
                confidence: 0.876_54,
            },
            output_dims: vec![1, 84, 8400],
            elapsed: Duration::from_millis(12),
        };

        let response = DetectResponse::from(outcome);
        assert_eq!(response.message, "YOLO Detection Complete");
        assert_eq!(response.top_class_name, "bus");
        assert_eq!(response.confidence, 0.88);
        assert_eq!(response.raw_output_dims, vec![1, 84, 8400]);
    }

    #[test]
    fn json_request_validation() {
        let request = DetectJsonRequest {
            image: "  ".to_string(),
            min_confidence: None,
        };
        assert!(request.validate().is_err());

        let request = DetectJsonRequest {
            image: "aGVsbG8=".to_string(),
            min_confidence: Some(1.5),
        };
        assert!(request.validate().is_err());

        let request = DetectJsonRequest {
            image: "aGVsbG8=".to_string(),
            min_confidence: Some(0.4),
        };
        assert!(request.validate().is_ok());
    }
}
