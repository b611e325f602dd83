use crate::Result;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

/// YOLOv8模型输入边长（像素）
pub const INPUT_SIZE: usize = 640;

/// 图像预处理器：任意格式/分辨率的图像字节 -> [1, 3, S, S] 输入张量
///
/// 输出张量为CHW布局，每个值归一化到[0, 1]。无共享状态，可并发调用。
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input_size: u32,
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE as u32,
            // 插值算法只影响视觉保真度，不影响结构正确性，默认双线性
            filter: FilterType::Triangle,
        }
    }
}

impl Preprocessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            ..Self::default()
        }
    }

    /// 更换缩放插值算法
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// 完整预处理：解码字节并转换为输入张量
    pub fn preprocess(&self, image_bytes: &[u8]) -> Result<Array4<f32>> {
        let image = image::load_from_memory(image_bytes)?;
        Ok(self.tensor_from_image(&image))
    }

    /// 已解码图像 -> 输入张量
    ///
    /// 1. 拉伸缩放到 S×S（不保持宽高比、不加边）
    /// 2. 丢弃alpha通道，转换为RGB
    /// 3. 每个字节值除以255.0，按CHW布局写入：
    ///    R通道占平坦下标 [0, S²)，G占 [S², 2S²)，B占 [2S², 3S²)，
    ///    通道内像素 (row, col) 对应 row·S + col
    pub fn tensor_from_image(&self, image: &DynamicImage) -> Array4<f32> {
        let size = self.input_size as usize;
        let resized = image
            .resize_exact(self.input_size, self.input_size, self.filter)
            .to_rgb8();

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (col, row) = (x as usize, y as usize);
            tensor[[0, 0, row, col]] = f32::from(pixel[0]) / 255.0;
            tensor[[0, 1, row, col]] = f32::from(pixel[1]) / 255.0;
            tensor[[0, 2, row, col]] = f32::from(pixel[2]) / 255.0;
        }

        tensor
    }
}
