use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crawler_core::CrawlerError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Crawler(#[from] CrawlerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Crawler(
                CrawlerError::Store(_)
                | CrawlerError::Transport(_)
                | CrawlerError::HttpStatus { .. },
            ) => StatusCode::BAD_GATEWAY,
            ApiError::Crawler(
                CrawlerError::Validation(_)
                | CrawlerError::InvalidJobType(_)
                | CrawlerError::Serialization(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Crawler(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_message, error_type, suggestions) = match &self {
            ApiError::Crawler(CrawlerError::Store(msg)) => (
                format!("持久化失败: {msg}"),
                "STORE_ERROR",
                vec![
                    "队列未做任何修改，请重新提交整个批次".to_string(),
                    "查看 GET /health 检查系统状态".to_string(),
                ],
            ),
            ApiError::Crawler(
                err @ (CrawlerError::Transport(_) | CrawlerError::HttpStatus { .. }),
            ) => (
                err.to_string(),
                "UPSTREAM_ERROR",
                vec!["外部服务暂不可用，请稍后重试".to_string()],
            ),
            ApiError::Crawler(
                err @ (CrawlerError::Validation(_)
                | CrawlerError::InvalidJobType(_)
                | CrawlerError::Serialization(_)),
            ) => (
                err.to_string(),
                "VALIDATION_ERROR",
                vec!["请检查请求数据格式".to_string()],
            ),
            ApiError::BadRequest(msg) => (
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
                vec![
                    "请检查请求格式和参数".to_string(),
                    "确保Content-Type正确设置".to_string(),
                ],
            ),
            ApiError::NotFound => (
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
                vec!["请检查请求URL是否正确".to_string()],
            ),
            ApiError::Crawler(err) => (
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    format!("错误详情: {}", err.user_message()),
                ],
            ),
            ApiError::Internal(msg) => (
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    format!("错误详情: {msg}"),
                ],
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
