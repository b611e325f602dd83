use crate::utils::error::DetectError;
use crate::{Config, Result};
use ndarray::Array4;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// ONNX推理引擎封装
///
/// 输入/输出张量名称在加载时从模型元数据中发现：名称不匹配属于
/// 配置错误，在启动阶段暴露，而不是每个请求时。
pub struct Engine {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String, // 动态发现的输出名称
    input_size: usize,
}

impl Engine {
    pub fn load(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(DetectError::ModelLoad(format!(
                "Detection model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading detection model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(
                config.onnx_config.optimization_level,
            ))?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(model_path)?;

        // 动态发现输入名称
        let input_name = if session.inputs.is_empty() {
            return Err(DetectError::ModelLoad(
                "Detection model has no inputs".to_string(),
            ));
        } else {
            let input_name = session.inputs[0].name.clone();
            tracing::info!("Detection model input: '{}'", input_name);
            input_name
        };

        // 动态发现输出名称
        let output_name = if session.outputs.is_empty() {
            return Err(DetectError::ModelLoad(
                "Detection model has no outputs".to_string(),
            ));
        } else {
            let output_name = session.outputs[0].name.clone();
            tracing::info!("Detection model output: '{}'", output_name);

            // 记录所有可用输出用于调试
            for (i, output) in session.outputs.iter().enumerate() {
                tracing::debug!("Detection output[{}]: '{}'", i, output.name);
            }

            output_name
        };

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            input_size: config.detect_config.input_size,
        })
    }

    /// 执行一次推理，返回平坦的f32输出数据及其维度
    pub fn infer(&self, input: Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input_tensor = Tensor::from_array(input)?;

        // 立即提取数据避免生命周期冲突
        let prediction = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    // 提供详细的错误诊断信息
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(DetectError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        let dims = prediction.shape().to_vec();
        let (data, _) = prediction.into_raw_vec_and_offset();

        Ok((data, dims))
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            input_name: self.input_name.clone(),
            output_name: self.output_name.clone(),
            input_size: self.input_size,
        }
    }
}

/// 引擎统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub input_name: String,
    pub output_name: String,
    pub input_size: usize,
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}
