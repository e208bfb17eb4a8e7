// ==========================================
// 火车模型收藏管理 - 核心库
// ==========================================
// 职责: 自定义 Excel 导入引擎 + 藏品数据持久化
// 技术栈: Rust + SQLite + calamine
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 表结构注册与导入实体
pub mod domain;

// 导入层 - 解析/映射/套装识别/执行
pub mod importer;

// 数据仓储层 - 数据访问
pub mod repository;

// API 层 - 业务接口
pub mod api;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::schema::{FieldKind, FieldRole, FieldSchema, SchemaRegistry, TableCategory, TableSchema};

pub use domain::import::{
    ColumnMapping, ColumnRule, Conflict, ConflictKind, ConflictMode, ExecuteResponse,
    ImportConfig, MappedRow, MergeRect, ParseResponse, PreviewResponse, RawRow,
    SetDetectionMode, SetGroup, Sheet, SheetMapping, TablePreview,
};

// 导入引擎
pub use importer::{
    ColumnMappingOutcome, ConflictDetector, ImportError, ImportExecutor, SetBuilder,
    WorkbookReader, evaluate_price, resolve_columns,
};

// 仓储
pub use repository::{
    ImportStore, ImportStoreImpl, ImportTemplate, RepositoryError, RepositoryResult, SqlValue,
    TemplateRepository,
};

// API
pub use api::{ApiError, ApiResult, ImportApi, TemplateApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "火车模型收藏管理";
