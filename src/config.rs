use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// ONNX模型文件路径
    pub model_path: PathBuf,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 检测配置
    pub detect_config: DetectConfig,

    /// 认证配置
    pub auth_config: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct DetectConfig {
    /// 模型输入边长（像素）
    pub input_size: usize,

    /// 置信度阈值，低于该值报告"未检测到目标"
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT签名密钥
    pub jwt_secret: String,

    /// Token有效期（秒）
    pub token_ttl_secs: u64,
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3, // 最高优化级别
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        let detect_config = DetectConfig {
            input_size: 640, // YOLOv8默认输入尺寸
            confidence_threshold: 0.5,
        };

        // JWT密钥从环境变量读取，开发模式允许使用内置默认值
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if dev_mode => "coco-detect-dev-secret".to_string(),
            _ => anyhow::bail!("JWT_SECRET must be set when not running in dev mode"),
        };

        let auth_config = AuthConfig {
            jwt_secret,
            token_ttl_secs: 24 * 60 * 60, // 1天
        };

        Ok(Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            workers,
            dev_mode,
            onnx_config,
            server_config,
            detect_config,
            auth_config,
        })
    }
}
