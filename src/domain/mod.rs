// ==========================================
// 火车模型收藏管理 - 领域层
// ==========================================
// 职责: 表结构注册表 + 导入过程实体
// 红线: 领域层不依赖数据库与文件系统
// ==========================================

pub mod import;
pub mod schema;

pub use import::{
    ColumnMapping, ColumnRule, Conflict, ConflictKind, ConflictMode, ExecuteResponse,
    ImportConfig, MappedRow, MergeRect, ParseResponse, PreviewResponse, RawRow,
    SetDetectionMode, SetGroup, Sheet, SheetMapping, SheetSummary, TablePreview,
};
pub use schema::{
    registry, FieldKind, FieldRole, FieldSchema, SchemaRegistry, TableCategory, TableSchema,
};
