// ==========================================
// 火车模型收藏管理 - 仓储层
// ==========================================
// 职责: SQLite 数据访问
// 模式: trait 定义接口 + Impl 提供 SQLite 实现
// ==========================================

pub mod error;
pub mod import_store;
pub mod import_store_impl;
pub mod template_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use import_store::{ImportStore, SqlValue};
pub use import_store_impl::ImportStoreImpl;
pub use template_repo::{ImportTemplate, TemplateRepository};
