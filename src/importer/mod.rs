// ==========================================
// 火车模型收藏管理 - 导入引擎
// ==========================================
// 流水线: 工作簿读取 -> 列映射 -> 套装识别 -> 冲突检测 -> 执行落库
// ==========================================

pub mod column_mapper;
pub mod conflict_detector;
pub mod error;
pub mod executor;
pub mod price;
pub mod set_builder;
pub mod workbook;

pub use column_mapper::{resolve_columns, ColumnMappingOutcome};
pub use conflict_detector::ConflictDetector;
pub use error::{ImportError, ImportModuleResult};
pub use executor::ImportExecutor;
pub use price::evaluate_price;
pub use set_builder::SetBuilder;
pub use workbook::WorkbookReader;
