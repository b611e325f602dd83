use crate::detect::{
    classes::COCO_CLASSES,
    decode::decode,
    loader::ImageLoader,
    preprocess::Preprocessor,
    types::{DetectOptions, DetectOutcome},
};
use crate::model::Engine;
use crate::{Config, Result};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// 检测处理流水线：图像字节 -> 输入张量 -> 推理 -> 最佳类别
pub struct DetectPipeline;

impl DetectPipeline {
    /// 处理multipart上传的图像字节
    pub async fn process_bytes(
        bytes: &[u8],
        engine: Arc<Engine>,
        config: &Config,
        options: DetectOptions,
    ) -> Result<DetectOutcome> {
        let image = ImageLoader::from_bytes(bytes, config.server_config.max_request_size)?;
        Self::process_image(image, engine, config, options).await
    }

    /// 处理base64编码的图像
    pub async fn process_base64(
        base64_data: &str,
        engine: Arc<Engine>,
        config: &Config,
        options: DetectOptions,
    ) -> Result<DetectOutcome> {
        let image = ImageLoader::from_base64(base64_data, config.server_config.max_request_size)?;
        Self::process_image(image, engine, config, options).await
    }

    /// 核心流水线
    async fn process_image(
        image: DynamicImage,
        engine: Arc<Engine>,
        config: &Config,
        options: DetectOptions,
    ) -> Result<DetectOutcome> {
        let start_time = Instant::now();

        // 预处理：拉伸缩放 + 归一化为CHW张量
        let preprocessor = Preprocessor::new(engine.input_size() as u32);
        let input = preprocessor.tensor_from_image(&image);

        // 推理是流水线中唯一的挂起点
        let (data, dims) = engine.infer(input)?;

        // 解码：全张量单遍扫描，取最高置信度的类别
        let threshold = options
            .min_confidence
            .unwrap_or(config.detect_config.confidence_threshold);
        let detection = decode(&data, &dims, &COCO_CLASSES, threshold)?;

        let elapsed = start_time.elapsed();
        tracing::info!(
            "Detection completed: label=\"{}\", confidence={:.3}, dims={:?}, time={:.3}s",
            detection.label,
            detection.confidence,
            dims,
            elapsed.as_secs_f32()
        );

        Ok(DetectOutcome {
            detection,
            output_dims: dims,
            elapsed,
        })
    }
}
