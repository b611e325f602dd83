use crate::{
    utils::error::DetectError,
    web::{
        extractors::{Validate, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// JWT声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户ID
    pub sub: String,
    /// 签发时间（Unix秒）
    pub iat: u64,
    /// 过期时间（Unix秒）
    pub exp: u64,
}

struct UserRecord {
    id: String,
    salt: String,
    digest: [u8; 32],
}

/// 用户注册/登录与JWT签发
///
/// 用户记录保存在进程内存中，进程退出即丢失。
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    token_ttl_secs: u64,
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl AuthService {
    pub fn new(secret: String, token_ttl_secs: u64) -> Self {
        Self {
            secret,
            token_ttl_secs,
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册新用户并签发token
    pub fn register(&self, username: &str, password: &str) -> Result<String> {
        let mut users = self.users.write();

        if users.contains_key(username) {
            return Err(DetectError::InvalidInput(
                "User already exists or other error.".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let salt = uuid::Uuid::new_v4().to_string();
        let digest = hash_password(&salt, password);

        users.insert(
            username.to_string(),
            UserRecord {
                id: id.clone(),
                salt,
                digest,
            },
        );

        self.issue_token(&id)
    }

    /// 校验用户凭据并签发token
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let users = self.users.read();

        let user = users
            .get(username)
            .ok_or_else(|| DetectError::Unauthorized("Invalid credentials".to_string()))?;

        if hash_password(&user.salt, password) != user.digest {
            return Err(DetectError::Unauthorized("Invalid credentials".to_string()));
        }

        self.issue_token(&user.id)
    }

    fn issue_token(&self, user_id: &str) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.token_ttl_secs,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| DetectError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// 校验token，无效或过期返回401
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| DetectError::Unauthorized("Token is not valid".to_string()))
    }
}

fn hash_password(salt: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// 认证中间件：校验Bearer token并把声明注入请求扩展
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = token.ok_or_else(|| {
        DetectError::Unauthorized("No token, authorization denied".to_string())
    })?;

    let claims = state.auth.verify_token(token)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// 注册/登录请求体
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

impl Validate for CredentialsRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("Username cannot be empty".to_string());
        }
        if self.password.is_empty() {
            return Err("Password cannot be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub message: String,
}

/// 用户注册处理器
pub async fn register_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let token = state.auth.register(&request.username, &request.password)?;

    tracing::info!("User registered: {}", request.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            message: "Registration successful".to_string(),
        }),
    ))
}

/// 用户登录处理器
pub async fn login_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CredentialsRequest>,
) -> Result<Json<AuthResponse>> {
    let token = state.auth.login(&request.username, &request.password)?;

    tracing::info!("User logged in: {}", request.username);

    Ok(Json(AuthResponse {
        token,
        message: "Login successful".to_string(),
    }))
}
