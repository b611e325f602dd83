use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单次检测的最终结果：全张量中置信度最高的类别
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// 类别名称，未超过阈值时为固定的哨兵文本
    pub label: String,
    /// 置信度分数 (0.0 - 1.0)，内部保留全精度
    pub confidence: f32,
}

impl Detection {
    /// 响应中置信度保留两位小数，内部比较仍使用全精度
    pub fn rounded_confidence(&self) -> f32 {
        (self.confidence * 100.0).round() / 100.0
    }
}

/// 检测处理选项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectOptions {
    /// 最小置信度阈值，省略时使用服务配置值
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

/// 完整的流水线处理结果
#[derive(Debug, Clone)]
pub struct DetectOutcome {
    /// 最佳检测结果
    pub detection: Detection,
    /// 模型原始输出张量的维度
    pub output_dims: Vec<usize>,
    /// 处理耗时
    pub elapsed: Duration,
}
