// ==========================================
// 火车模型收藏管理 - API层
// ==========================================
// 职责: 面向调用方的业务接口
// ==========================================

pub mod error;
pub mod import_api;
pub mod template_api;

pub use error::{ApiError, ApiResult};
pub use import_api::{FieldInfo, ImportApi, TableInfo};
pub use template_api::TemplateApi;
