use crate::model::engine::{Engine, EngineStats};
use crate::utils::error::DetectError;
use crate::{Config, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// 引擎的可观测就绪状态
enum EngineState {
    Loading,
    Ready(Arc<Engine>),
    Failed(String),
}

/// 就绪状态摘要，供健康检查使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Loading,
    Ready,
    Failed,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Loading => "loading",
            EngineStatus::Ready => "ready",
            EngineStatus::Failed => "failed",
        }
    }
}

/// 显式构造、可注入的引擎句柄
///
/// 模型在进程启动时异步加载一次；就绪前到达的请求立即得到
/// 503，而不是阻塞等待。加载失败后状态固定为Failed，需要
/// 运维介入重启。
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<RwLock<EngineState>>,
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::Loading)),
        }
    }

    /// 在后台任务中加载模型，完成后更新状态
    pub fn spawn_load(&self, config: Config) {
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || Engine::load(&config)).await;

            let mut guard = state.write();
            match result {
                Ok(Ok(engine)) => {
                    tracing::info!("Detection model ready for inference");
                    *guard = EngineState::Ready(Arc::new(engine));
                }
                Ok(Err(e)) => {
                    tracing::error!("CRITICAL: Failed to load detection model: {}", e);
                    *guard = EngineState::Failed(e.to_string());
                }
                Err(e) => {
                    tracing::error!("CRITICAL: Model loading task panicked: {}", e);
                    *guard = EngineState::Failed(format!("model loading task panicked: {}", e));
                }
            }
        });
    }

    /// 获取就绪的引擎，未就绪时快速失败
    pub fn get(&self) -> Result<Arc<Engine>> {
        match &*self.state.read() {
            EngineState::Ready(engine) => Ok(Arc::clone(engine)),
            EngineState::Loading => Err(DetectError::ModelNotReady),
            EngineState::Failed(reason) => Err(DetectError::ModelLoad(reason.clone())),
        }
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.state.read() {
            EngineState::Loading => EngineStatus::Loading,
            EngineState::Ready(_) => EngineStatus::Ready,
            EngineState::Failed(_) => EngineStatus::Failed,
        }
    }

    /// 引擎统计信息，就绪前为None
    pub fn stats(&self) -> Option<EngineStats> {
        match &*self.state.read() {
            EngineState::Ready(engine) => Some(engine.stats()),
            _ => None,
        }
    }
}
