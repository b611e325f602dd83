use crate::utils::error::DetectError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str, max_size: usize) -> Result<DynamicImage> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_clean)
            .map_err(DetectError::Base64)?;

        Self::from_bytes(&image_bytes, max_size)
    }

    /// 从字节缓冲加载图像
    pub fn from_bytes(bytes: &[u8], max_size: usize) -> Result<DynamicImage> {
        if bytes.len() > max_size {
            return Err(DetectError::FileTooLarge(bytes.len(), max_size));
        }

        let image = image::load_from_memory(bytes).map_err(DetectError::ImageDecode)?;

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }
}
