// ==========================================
// 火车模型收藏管理 - 导入过程实体
// ==========================================
// 职责: 一次导入请求生命周期内的全部数据结构
// 约束: 请求结束即丢弃，一律不落库
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ==========================================
// 工作簿读取结果
// ==========================================

/// 合并单元格矩形（1-based 行列闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRect {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl MergeRect {
    /// 是否只跨一列（套装识别只认单列合并）
    pub fn single_column(&self) -> bool {
        self.min_col == self.max_col
    }

    /// 是否覆盖指定行
    pub fn covers_row(&self, row: u32) -> bool {
        self.min_row <= row && row <= self.max_row
    }
}

/// 原始数据行
///
/// row 为工作表内 1-based 行号。空白行已被过滤，但行号保留原值，
/// 套装边界识别依赖该行号与合并区间对齐。
#[derive(Debug, Clone)]
pub struct RawRow {
    pub row: u32,
    pub cells: HashMap<String, String>,
}

impl RawRow {
    /// 按表头取值（不存在或空白返回 None）
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }
}

/// 单个工作表
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub merge_ranges: Vec<MergeRect>,
}

// ==========================================
// 导入配置（来自调用方的 JSON）
// ==========================================

/// 工作表 → 目标表映射
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetMapping {
    pub sheet_name: String,
    pub table_name: String,
}

/// 冲突处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// 仅预览，不落库
    Preview,
    /// 跳过冲突行
    #[default]
    Skip,
    /// 覆盖已存在记录（仅更新映射到的字段）
    Overwrite,
}

/// 套装识别方式（仅车厢表有意义）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SetDetectionMode {
    /// 依据合并单元格几何识别套装（缺省）
    #[default]
    Merged,
    /// 每行一个独立套装
    Row,
}

/// 单列映射规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRule {
    /// 工作表表头文本（精确匹配，大小写敏感）
    pub source: String,
    /// 目标字段名
    pub target: String,
    #[serde(default)]
    pub required: bool,
}

/// 单表列映射配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub columns: Vec<ColumnRule>,
    #[serde(default)]
    pub conflict_mode: ConflictMode,
    #[serde(default)]
    pub set_detection_mode: SetDetectionMode,
}

/// 一次导入请求的完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub sheet_mappings: Vec<SheetMapping>,
    pub column_mappings: HashMap<String, ColumnMapping>,
}

// ==========================================
// 映射与冲突
// ==========================================

/// 映射后的行: 目标字段名 → 原始取值（外键解析发生在执行阶段）
pub type MappedRow = HashMap<String, String>;

/// 冲突类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// 全局唯一字段与已有记录重名
    #[serde(rename = "唯一名称冲突")]
    UniqueName,
    /// 比例内唯一字段与已有记录重复
    #[serde(rename = "比例内唯一冲突")]
    ScopedUnique,
}

/// 一条唯一性冲突（仅信息，无持久化身份）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub table_name: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub field: String,
    pub value: String,
    pub message: String,
}

/// 一个套装: 公共字段取值 + 明细行
#[derive(Debug, Clone)]
pub struct SetGroup {
    /// 套装公共字段（目标字段名 → 取值）
    pub header_values: MappedRow,
    /// 明细行（1-based 行号 + 映射后的明细字段取值）
    pub item_rows: Vec<(u32, MappedRow)>,
    /// 套装覆盖的行号区间（用于警告定位）
    pub start_row: u32,
    pub end_row: u32,
}

// ==========================================
// 响应结构
// ==========================================

/// parse 操作: 单个工作表概要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetSummary {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// parse 操作响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    pub sheets: Vec<SheetSummary>,
}

/// preview 操作: 单表预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePreview {
    pub table_name: String,
    pub display_name: String,
    pub row_count: usize,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub missing_required: Vec<String>,
}

/// preview 操作响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub previews: Vec<TablePreview>,
    pub has_conflicts: bool,
    pub can_proceed: bool,
}

/// execute 操作响应
///
/// 逐表提交: 失败的表回滚并记入 errors，成功的表保留在 summary 中
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecuteResponse {
    pub summary: BTreeMap<String, i64>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}
