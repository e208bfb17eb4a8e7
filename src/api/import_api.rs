// ==========================================
// 火车模型收藏管理 - 自定义导入API
// ==========================================
// 职责: 封装「看表结构 -> 看文件 -> 预览 -> 执行」四步导入流程
// 预览绝不写库；执行按表提交，单表失败不影响其它表
// ==========================================

use rust_i18n::t;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    registry, ExecuteResponse, FieldRole, ImportConfig, ParseResponse, PreviewResponse,
    SheetSummary, TableCategory, TablePreview,
};
use crate::importer::{
    resolve_columns, ConflictDetector, ImportExecutor, SetBuilder, WorkbookReader,
};
use crate::repository::ImportStoreImpl;

/// 可导入表描述（前端配置界面数据源）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub display_name: String,
    pub category: TableCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    pub fields: Vec<FieldInfo>,
}

/// 可导入字段描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub display: String,
    pub required: bool,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_in_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub is_set_field: bool,
    pub is_item_field: bool,
}

/// 自定义导入API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    /// 全部可导入表及字段配置
    ///
    /// 纯注册表数据，不访问数据库。
    pub fn tables(&self) -> Vec<TableInfo> {
        registry()
            .all()
            .iter()
            .map(|table| TableInfo {
                name: table.name.to_string(),
                display_name: table.display_name.to_string(),
                category: table.category,
                tooltip: table.tooltip.map(|t| t.to_string()),
                fields: table
                    .fields
                    .iter()
                    .map(|f| FieldInfo {
                        name: f.name.to_string(),
                        display: f.display.to_string(),
                        required: f.required,
                        unique: f.unique,
                        unique_in_scope: f.unique_in_scope.map(|s| s.to_string()),
                        reference: f.reference.map(|r| r.to_string()),
                        is_set_field: f.role == FieldRole::Header,
                        is_item_field: f.role == FieldRole::Item,
                    })
                    .collect(),
            })
            .collect()
    }

    /// 解析文件结构: 工作表名、列名、数据行数
    ///
    /// # 参数
    /// - file_path: Excel 文件路径（.xlsx/.xls）
    pub async fn parse(&self, file_path: &str) -> ApiResult<ParseResponse> {
        let sheets = WorkbookReader::read(file_path)?;
        Ok(ParseResponse {
            sheets: sheets
                .iter()
                .map(|s| SheetSummary {
                    name: s.name.clone(),
                    columns: s.headers.iter().filter(|h| !h.is_empty()).cloned().collect(),
                    row_count: s.rows.len(),
                })
                .collect(),
        })
    }

    /// 预览导入: 只读校验，汇总冲突/警告/必填缺失
    ///
    /// # 参数
    /// - file_path: Excel 文件路径
    /// - config: 导入配置（工作表映射 + 列映射）
    pub async fn preview(
        &self,
        file_path: &str,
        config: &ImportConfig,
    ) -> ApiResult<PreviewResponse> {
        let request_id = Uuid::new_v4();
        validate_config(config)?;

        let sheets = WorkbookReader::read(file_path)?;
        let store = ImportStoreImpl::new(&self.db_path)?;
        let detector = ConflictDetector::new(&store);

        let mut previews = Vec::new();
        for sheet_mapping in &config.sheet_mappings {
            // 未知目标表/缺映射与执行路径同口径: 跳过并警告，不整体拒绝
            let Some(table) = registry().get(&sheet_mapping.table_name) else {
                previews.push(TablePreview {
                    table_name: sheet_mapping.table_name.clone(),
                    display_name: sheet_mapping.table_name.clone(),
                    row_count: 0,
                    conflicts: Vec::new(),
                    warnings: vec![format!("未知目标表 {}，已跳过", sheet_mapping.table_name)],
                    missing_required: Vec::new(),
                });
                continue;
            };
            let Some(mapping) = config.column_mappings.get(table.name) else {
                previews.push(TablePreview {
                    table_name: table.name.to_string(),
                    display_name: table.display_name.to_string(),
                    row_count: 0,
                    conflicts: Vec::new(),
                    warnings: vec![format!("表 {} 缺少列映射配置，已跳过", table.display_name)],
                    missing_required: Vec::new(),
                });
                continue;
            };

            let Some(sheet) = sheets.iter().find(|s| s.name == sheet_mapping.sheet_name) else {
                previews.push(TablePreview {
                    table_name: table.name.to_string(),
                    display_name: table.display_name.to_string(),
                    row_count: 0,
                    conflicts: Vec::new(),
                    warnings: vec![format!("工作表 {} 不存在", sheet_mapping.sheet_name)],
                    missing_required: Vec::new(),
                });
                continue;
            };

            let outcome = resolve_columns(sheet, table, mapping);
            let blocked = outcome.is_blocked();
            let mut warnings = outcome.warnings;
            for field in &outcome.unmapped_optional {
                warnings.push(format!("可选字段 {} 未映射，导入后为空", field));
            }
            let mut conflicts = Vec::new();

            if !blocked {
                conflicts = detector.detect(table, &outcome.rows).await?;

                // 复合表提前跑一遍套装识别，把边界问题暴露在预览阶段
                if table.is_composite() {
                    let (groups, set_warnings) =
                        SetBuilder::build(sheet, table, mapping, &outcome.rows);
                    warnings.extend(set_warnings);
                    warnings.push(format!("识别到 {} 个套装", groups.len()));
                }
            }

            previews.push(TablePreview {
                table_name: table.name.to_string(),
                display_name: table.display_name.to_string(),
                row_count: outcome.rows.len(),
                conflicts,
                warnings,
                missing_required: outcome.missing_required,
            });
        }

        let has_conflicts = previews.iter().any(|p| !p.conflicts.is_empty());
        let can_proceed = previews.iter().all(|p| p.missing_required.is_empty());
        tracing::info!(
            request_id = %request_id,
            tables = previews.len(),
            has_conflicts,
            can_proceed,
            "{}", t!("import.preview_done")
        );

        Ok(PreviewResponse { previews, has_conflicts, can_proceed })
    }

    /// 执行导入
    ///
    /// # 参数
    /// - file_path: Excel 文件路径
    /// - config: 导入配置（与预览使用同一份）
    pub async fn execute(
        &self,
        file_path: &str,
        config: &ImportConfig,
    ) -> ApiResult<ExecuteResponse> {
        let request_id = Uuid::new_v4();
        validate_config(config)?;

        let sheets = WorkbookReader::read(file_path)?;
        let store = ImportStoreImpl::new(&self.db_path)?;
        let response = ImportExecutor::new(&store).execute(&sheets, config).await;

        tracing::info!(
            request_id = %request_id,
            summary = ?response.summary,
            warning_count = response.warnings.len(),
            error_count = response.errors.len(),
            "{}", t!("import.execute_done")
        );
        Ok(response)
    }
}

/// 配置形状校验（目标表存在性在逐表处理时再查）
fn validate_config(config: &ImportConfig) -> ApiResult<()> {
    if config.sheet_mappings.is_empty() {
        return Err(ApiError::InvalidInput(t!("import.bad_config").to_string()));
    }
    for mapping in config.column_mappings.values() {
        if mapping.columns.is_empty() {
            return Err(ApiError::InvalidInput(t!("import.bad_config").to_string()));
        }
    }
    Ok(())
}
