use thiserror::Error;

/// 爬取协调系统错误类型定义
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("网络错误: {0}")]
    Transport(String),

    #[error("服务器返回错误状态码 {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("存储错误: {0}")]
    Store(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("无效的任务类型: {0}")]
    InvalidJobType(i32),

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type CrawlerResult<T> = Result<T, CrawlerError>;

impl CrawlerError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn http_status<S: Into<String>>(status: u16, body: S) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }
    pub fn store_error<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// 启动阶段遇到即应终止进程的错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlerError::Configuration(_) | CrawlerError::Internal(_))
    }

    /// 调用方可以原样重试整个请求的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            CrawlerError::Transport(_) | CrawlerError::Store(_) | CrawlerError::Timeout(_) => {
                true
            }
            CrawlerError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            CrawlerError::Configuration(_) => "系统配置有误",
            CrawlerError::Transport(_) | CrawlerError::HttpStatus { .. } => {
                "外部服务暂不可用，请稍后重试"
            }
            CrawlerError::Store(_) => "数据持久化失败，请重试整个批次",
            CrawlerError::InvalidJobType(_) | CrawlerError::Validation(_) => "输入数据验证失败",
            CrawlerError::Timeout(_) => "操作超时，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for CrawlerError {
    fn from(err: serde_json::Error) -> Self {
        CrawlerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CrawlerError {
    fn from(err: anyhow::Error) -> Self {
        CrawlerError::Internal(err.to_string())
    }
}

impl From<::config::ConfigError> for CrawlerError {
    fn from(err: ::config::ConfigError) -> Self {
        CrawlerError::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for CrawlerError {
    fn from(err: toml::de::Error) -> Self {
        CrawlerError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CrawlerError::config_error("missing key").is_fatal());
        assert!(!CrawlerError::transport("connection refused").is_fatal());

        assert!(CrawlerError::transport("reset").is_retryable());
        assert!(CrawlerError::store_error("write failed").is_retryable());
        assert!(CrawlerError::http_status(503, "").is_retryable());
        assert!(!CrawlerError::http_status(404, "").is_retryable());
        assert!(!CrawlerError::InvalidJobType(7).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CrawlerError::http_status(500, "boom");
        assert_eq!(err.to_string(), "服务器返回错误状态码 500: boom");

        let err = CrawlerError::config_error("缺少环境变量 DOCUMENT_STORE_KEY");
        assert!(err.to_string().contains("DOCUMENT_STORE_KEY"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CrawlerError = parse_err.into();
        assert!(matches!(err, CrawlerError::Serialization(_)));
    }
}
