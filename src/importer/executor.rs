// ==========================================
// 火车模型收藏管理 - 导入执行器
// ==========================================
// 职责: 把映射后的数据落库
// 事务: 每张目标表一个事务，失败整表回滚，不影响其它表
// 取值转换: 外键名称->ID、价格表达式求值、日期规整，全部发生在写入时
// ==========================================

use chrono::{Local, NaiveDate};

use crate::domain::{
    registry, ColumnMapping, ConflictMode, FieldKind, FieldRole, FieldSchema, ImportConfig,
    MappedRow, Sheet, TableSchema,
};
use crate::domain::ExecuteResponse;
use crate::importer::column_mapper::resolve_columns;
use crate::importer::conflict_detector::conflict_keys;
use crate::importer::price::evaluate_price;
use crate::importer::set_builder::SetBuilder;
use crate::repository::{ImportStore, RepositoryResult, SqlValue};

/// 导入执行器
pub struct ImportExecutor<'a> {
    store: &'a dyn ImportStore,
}

impl<'a> ImportExecutor<'a> {
    pub fn new(store: &'a dyn ImportStore) -> Self {
        Self { store }
    }

    /// 执行导入
    ///
    /// 按 sheet_mappings 顺序逐表处理。单表失败回滚并记入 errors，
    /// 已提交的表保留在 summary 中，不做跨表回滚。
    pub async fn execute(&self, sheets: &[Sheet], config: &ImportConfig) -> ExecuteResponse {
        let mut response = ExecuteResponse::default();

        for sheet_mapping in &config.sheet_mappings {
            let Some(sheet) = sheets.iter().find(|s| s.name == sheet_mapping.sheet_name) else {
                response
                    .warnings
                    .push(format!("工作表 {} 不存在，已跳过", sheet_mapping.sheet_name));
                continue;
            };
            let Some(table) = registry().get(&sheet_mapping.table_name) else {
                response
                    .warnings
                    .push(format!("未知目标表 {}，已跳过", sheet_mapping.table_name));
                continue;
            };
            let Some(mapping) = config.column_mappings.get(table.name) else {
                response
                    .warnings
                    .push(format!("表 {} 缺少列映射配置，已跳过", table.display_name));
                continue;
            };

            if mapping.conflict_mode == ConflictMode::Preview {
                response.warnings.push(format!(
                    "表 {} 冲突策略为 preview，不执行写入，已跳过",
                    table.display_name
                ));
                continue;
            }

            let outcome = resolve_columns(sheet, table, mapping);
            let blocked = outcome.is_blocked();
            response.warnings.extend(outcome.warnings);
            if blocked {
                response.warnings.push(format!(
                    "表 {} 必填字段未映射: {}，已跳过",
                    table.display_name,
                    outcome.missing_required.join("、")
                ));
                continue;
            }

            match self
                .import_table(sheet, table, mapping, &outcome.rows, &mut response.warnings)
                .await
            {
                Ok(count) => {
                    tracing::info!(table = table.name, count, "单表导入完成");
                    response.summary.insert(table.name.to_string(), count);
                }
                Err(e) => {
                    if let Err(rollback_err) = self.store.rollback().await {
                        tracing::error!(table = table.name, error = %rollback_err, "回滚失败");
                    }
                    tracing::error!(table = table.name, error = %e, "单表导入失败，已回滚");
                    response
                        .errors
                        .push(format!("表 {} 导入失败: {}", table.display_name, e));
                }
            }
        }

        response
    }

    /// 单表导入（一个事务）
    async fn import_table(
        &self,
        sheet: &Sheet,
        table: &TableSchema,
        mapping: &ColumnMapping,
        rows: &[(u32, MappedRow)],
        warnings: &mut Vec<String>,
    ) -> RepositoryResult<i64> {
        self.store.begin().await?;

        let count = if table.is_composite() {
            self.import_sets(sheet, table, mapping, rows, warnings).await?
        } else {
            self.import_rows(table, mapping.conflict_mode, rows, warnings).await?
        };

        self.store.commit().await?;
        Ok(count)
    }

    /// 普通表: 逐行写入
    async fn import_rows(
        &self,
        table: &TableSchema,
        conflict_mode: ConflictMode,
        rows: &[(u32, MappedRow)],
        warnings: &mut Vec<String>,
    ) -> RepositoryResult<i64> {
        let mut count = 0;

        'rows: for (row, mapped) in rows {
            for field in &table.fields {
                if field.required && mapped.get(field.name).filter(|v| !v.is_empty()).is_none() {
                    warnings.push(format!(
                        "第 {} 行缺少必填字段 {}，已跳过",
                        row, field.display
                    ));
                    continue 'rows;
                }
            }

            // 事务内判重，文件内部的重复行同样会被拦下
            let mut hit = None;
            for key in conflict_keys(table, mapped) {
                if self.store.exists_where(table.storage_table, &key.conditions).await? {
                    hit = Some(key);
                    break;
                }
            }

            if let Some(key) = hit {
                match conflict_mode {
                    ConflictMode::Overwrite => {
                        if let Some(values) =
                            self.build_unit(table, None, mapped, *row, warnings).await?
                        {
                            self.store
                                .update_where(table.storage_table, &key.conditions, &values)
                                .await?;
                            count += 1;
                        }
                    }
                    ConflictMode::Skip | ConflictMode::Preview => {
                        warnings.push(format!(
                            "第 {} 行 {}「{}」与已有记录冲突，已跳过",
                            row, key.display, key.conditions[0].1
                        ));
                    }
                }
                continue;
            }

            if let Some(values) = self.build_unit(table, None, mapped, *row, warnings).await? {
                self.store.insert(table.storage_table, &values).await?;
                count += 1;
            }
        }

        Ok(count)
    }

    /// 复合表: 套装头 + 明细项
    ///
    /// 复合表没有唯一字段，不走判重分支。
    async fn import_sets(
        &self,
        sheet: &Sheet,
        table: &TableSchema,
        mapping: &ColumnMapping,
        rows: &[(u32, MappedRow)],
        warnings: &mut Vec<String>,
    ) -> RepositoryResult<i64> {
        let (groups, set_warnings) = SetBuilder::build(sheet, table, mapping, rows);
        warnings.extend(set_warnings);

        // 注册表保证复合表一定带存储信息
        let Some(composite) = table.composite else {
            return Ok(0);
        };

        let mut count = 0;
        'groups: for group in groups {
            for field in table.fields_by_role(FieldRole::Header) {
                if field.required
                    && group
                        .header_values
                        .get(field.name)
                        .filter(|v| !v.is_empty())
                        .is_none()
                {
                    warnings.push(format!(
                        "第 {}-{} 行套装缺少必填字段 {}，已跳过",
                        group.start_row, group.end_row, field.display
                    ));
                    continue 'groups;
                }
            }

            let Some(header_unit) = self
                .build_unit(
                    table,
                    Some(FieldRole::Header),
                    &group.header_values,
                    group.start_row,
                    warnings,
                )
                .await?
            else {
                continue;
            };

            let set_id = self.store.insert(table.storage_table, &header_unit).await?;
            for (row, item) in &group.item_rows {
                let Some(mut item_unit) = self
                    .build_unit(table, Some(FieldRole::Item), item, *row, warnings)
                    .await?
                else {
                    continue;
                };
                item_unit.push((composite.parent_fk.to_string(), SqlValue::Integer(set_id)));
                self.store.insert(composite.item_table, &item_unit).await?;
            }
            count += 1;
        }

        Ok(count)
    }

    /// 把一行/一组映射取值转换成写入单元
    ///
    /// 规则:
    /// - 外键字段按名称解析 ID（大小写不敏感）；必填外键解析失败整个单元作废
    /// - 价格字段双写: 原始表达式存 price，求值结果存 total_price
    /// - 日期字段规整为 YYYY-MM-DD，解析失败回退当天
    /// - 空白取值不写入（覆盖模式下不会抹掉已有字段）
    async fn build_unit(
        &self,
        table: &TableSchema,
        role: Option<FieldRole>,
        mapped: &MappedRow,
        row: u32,
        warnings: &mut Vec<String>,
    ) -> RepositoryResult<Option<Vec<(String, SqlValue)>>> {
        let fields: Vec<&FieldSchema> = match role {
            Some(r) => table.fields_by_role(r),
            None => table.fields.iter().collect(),
        };

        let mut values = Vec::new();
        for field in fields {
            let Some(raw) = mapped.get(field.name).filter(|v| !v.is_empty()) else {
                continue;
            };

            if let Some(ref_table) = field.reference {
                match self.store.find_id_by_name(ref_table, raw).await? {
                    Some(id) => values.push((field.name.to_string(), SqlValue::Integer(id))),
                    None if field.required => {
                        warnings.push(format!(
                            "第 {} 行{}「{}」不存在，已跳过",
                            row, field.display, raw
                        ));
                        return Ok(None);
                    }
                    None => {
                        warnings.push(format!(
                            "第 {} 行{}「{}」不存在，已置空",
                            row, field.display, raw
                        ));
                    }
                }
                continue;
            }

            match field.kind {
                FieldKind::Text => {
                    values.push((field.name.to_string(), SqlValue::Text(raw.to_string())));
                }
                FieldKind::Price => {
                    if field.name != "total_price" {
                        values.push((field.name.to_string(), SqlValue::Text(raw.to_string())));
                    }
                    values.push(("total_price".to_string(), SqlValue::Real(evaluate_price(raw))));
                }
                FieldKind::Date => {
                    values.push((field.name.to_string(), SqlValue::Text(normalize_date(raw))));
                }
            }
        }

        Ok(Some(values))
    }
}

/// 日期规整: 常见写法统一为 YYYY-MM-DD，解析失败回退当天
fn normalize_date(raw: &str) -> String {
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnMapping, ColumnRule, RawRow, SheetMapping};
    use crate::repository::ImportStoreImpl;
    use std::collections::HashMap;

    fn rule(source: &str, target: &str) -> ColumnRule {
        ColumnRule { source: source.into(), target: target.into(), required: false }
    }

    fn brand_sheet(names: &[&str]) -> Sheet {
        Sheet {
            name: "品牌".into(),
            headers: vec!["品牌名称".into()],
            rows: names
                .iter()
                .enumerate()
                .map(|(i, n)| RawRow {
                    row: i as u32 + 2,
                    cells: HashMap::from([("品牌名称".to_string(), n.to_string())]),
                })
                .collect(),
            merge_ranges: Vec::new(),
        }
    }

    fn brand_config(mode: ConflictMode) -> ImportConfig {
        ImportConfig {
            sheet_mappings: vec![SheetMapping {
                sheet_name: "品牌".into(),
                table_name: "brand".into(),
            }],
            column_mappings: HashMap::from([(
                "brand".to_string(),
                ColumnMapping {
                    columns: vec![rule("品牌名称", "name")],
                    conflict_mode: mode,
                    set_detection_mode: Default::default(),
                },
            )]),
        }
    }

    #[tokio::test]
    async fn test_import_brands() {
        let store = ImportStoreImpl::new_in_memory().unwrap();
        let sheets = vec![brand_sheet(&["百万城", "KATO"])];

        let response = ImportExecutor::new(&store)
            .execute(&sheets, &brand_config(ConflictMode::Skip))
            .await;

        assert!(response.errors.is_empty());
        assert_eq!(response.summary.get("brand"), Some(&2));
        assert!(store.find_id_by_name("brand", "KATO").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_skip_mode_skips_existing_and_in_file_duplicates() {
        let store = ImportStoreImpl::new_in_memory().unwrap();
        store
            .insert("brand", &[("name".to_string(), SqlValue::Text("百万城".into()))])
            .await
            .unwrap();

        let sheets = vec![brand_sheet(&["百万城", "KATO", "KATO"])];
        let response = ImportExecutor::new(&store)
            .execute(&sheets, &brand_config(ConflictMode::Skip))
            .await;

        assert_eq!(response.summary.get("brand"), Some(&1));
        assert_eq!(response.warnings.iter().filter(|w| w.contains("冲突")).count(), 2);
    }

    #[tokio::test]
    async fn test_overwrite_mode_updates_existing() {
        let store = ImportStoreImpl::new_in_memory().unwrap();
        store
            .insert(
                "brand",
                &[
                    ("name".to_string(), SqlValue::Text("百万城".into())),
                    ("search_url".to_string(), SqlValue::Text("https://old.example.com".into())),
                ],
            )
            .await
            .unwrap();

        let sheet = Sheet {
            name: "品牌".into(),
            headers: vec!["品牌名称".into(), "官网".into()],
            rows: vec![RawRow {
                row: 2,
                cells: HashMap::from([
                    ("品牌名称".to_string(), "百万城".to_string()),
                    ("官网".to_string(), "https://new.example.com".to_string()),
                ]),
            }],
            merge_ranges: Vec::new(),
        };
        let mut config = brand_config(ConflictMode::Overwrite);
        config
            .column_mappings
            .get_mut("brand")
            .unwrap()
            .columns
            .push(rule("官网", "search_url"));

        let response = ImportExecutor::new(&store).execute(&[sheet], &config).await;
        assert_eq!(response.summary.get("brand"), Some(&1));
    }

    #[tokio::test]
    async fn test_preview_conflict_mode_never_writes() {
        let store = ImportStoreImpl::new_in_memory().unwrap();
        let sheets = vec![brand_sheet(&["百万城", "KATO"])];

        let response = ImportExecutor::new(&store)
            .execute(&sheets, &brand_config(ConflictMode::Preview))
            .await;

        assert!(response.summary.get("brand").is_none());
        assert!(response.warnings.iter().any(|w| w.contains("preview")));
        assert!(store.find_id_by_name("brand", "KATO").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_required_reference_missing_skips_row() {
        let store = ImportStoreImpl::new_in_memory().unwrap();
        let sheet = Sheet {
            name: "机车".into(),
            headers: vec!["品牌".into(), "比例".into()],
            rows: vec![RawRow {
                row: 2,
                cells: HashMap::from([
                    ("品牌".to_string(), "不存在的品牌".to_string()),
                    ("比例".to_string(), "HO".to_string()),
                ]),
            }],
            merge_ranges: Vec::new(),
        };
        let config = ImportConfig {
            sheet_mappings: vec![SheetMapping {
                sheet_name: "机车".into(),
                table_name: "locomotive".into(),
            }],
            column_mappings: HashMap::from([(
                "locomotive".to_string(),
                ColumnMapping {
                    columns: vec![rule("品牌", "brand_id"), rule("比例", "scale")],
                    conflict_mode: Default::default(),
                    set_detection_mode: Default::default(),
                },
            )]),
        };

        let response = ImportExecutor::new(&store).execute(&[sheet], &config).await;
        assert_eq!(response.summary.get("locomotive"), Some(&0));
        assert!(response.warnings.iter().any(|w| w.contains("不存在的品牌")));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2024-03-01"), "2024-03-01");
        assert_eq!(normalize_date("2024/3/1"), "2024-03-01");
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(normalize_date("三月一日"), today);
    }
}
