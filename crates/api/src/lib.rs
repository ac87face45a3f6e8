//! # Crawler Master API
//!
//! Master节点的HTTP接口，Worker通过它租约任务并回传结果。
//!
//! ## API 端点
//!
//! - `GET /master/job?count=N` - 租约最多N个任务，返回 `[{type, id}]`
//! - `PUT /master/job` - 提交完成的任务 `{data: [...]}`
//! - `GET /master/status` - 队列概况与失败任务
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus指标
//!
//! ## 错误响应
//!
//! ```json
//! {
//!   "error": {
//!     "message": "持久化失败: 1/2 条记录持久化失败",
//!     "type": "STORE_ERROR",
//!     "code": 502,
//!     "suggestions": ["队列未做任何修改，请重新提交整个批次"],
//!     "timestamp": "2024-01-01T00:00:00Z"
//!   }
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建带中间件的完整API应用
pub fn create_app(state: AppState) -> Router {
    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
