// ==========================================
// 火车模型收藏管理 - 列映射解析
// ==========================================
// 职责: 按映射规则把工作表行转成目标字段键值
// 约束: 必填缺失是表级结论，行级空值留给执行阶段裁决
// ==========================================

use crate::domain::{ColumnMapping, MappedRow, Sheet, TableSchema};

/// 列映射结果
#[derive(Debug, Default)]
pub struct ColumnMappingOutcome {
    /// 映射后的行（保留 1-based 行号）
    pub rows: Vec<(u32, MappedRow)>,
    /// 未映射或源列缺失的必填字段（内部字段名），非空则该表整体阻断
    pub missing_required: Vec<String>,
    /// 未映射的可选字段（内部字段名），仅提示
    pub unmapped_optional: Vec<String>,
    /// 非阻断警告（未知目标字段、源列不存在等）
    pub warnings: Vec<String>,
}

impl ColumnMappingOutcome {
    /// 该表是否可以继续走预览/执行
    pub fn is_blocked(&self) -> bool {
        !self.missing_required.is_empty()
    }
}

/// 解析单表的列映射
///
/// # 参数
/// * `sheet` - 已读取的工作表
/// * `table` - 目标表配置
/// * `mapping` - 调用方提交的列映射
///
/// 表头文本精确匹配（区分大小写，读取时已去首尾空白）。
/// 指向未知目标字段的规则丢弃并警告，不阻断整表。
pub fn resolve_columns(
    sheet: &Sheet,
    table: &TableSchema,
    mapping: &ColumnMapping,
) -> ColumnMappingOutcome {
    let mut outcome = ColumnMappingOutcome::default();

    // 逐条校验规则，保留可用的 (源表头, 目标字段)
    let mut usable: Vec<(&str, &str)> = Vec::new();
    for rule in &mapping.columns {
        let Some(field) = table.field(&rule.target) else {
            outcome.warnings.push(format!(
                "表 {} 不存在字段 {}，已忽略该列映射",
                table.display_name, rule.target
            ));
            continue;
        };

        let source_present = sheet.headers.iter().any(|h| h == &rule.source);
        if !source_present {
            if field.required || rule.required {
                outcome.missing_required.push(field.name.to_string());
            } else {
                outcome.warnings.push(format!(
                    "工作表 {} 不存在列 {}，字段 {} 将为空",
                    sheet.name, rule.source, field.display
                ));
            }
            continue;
        }

        usable.push((rule.source.as_str(), field.name));
    }

    // 必填字段必须出现在映射规则里
    // missing_required / unmapped_optional 按字段内部名对外，显示名只进警告文案
    for field in &table.fields {
        let mapped = mapping.columns.iter().any(|r| r.target == field.name);
        if field.required && !mapped {
            outcome.missing_required.push(field.name.to_string());
        }
        if !field.required && !mapped {
            outcome.unmapped_optional.push(field.name.to_string());
        }
    }
    outcome.missing_required.dedup();

    if outcome.is_blocked() {
        tracing::warn!(
            table = table.name,
            missing = ?outcome.missing_required,
            "必填字段未映射，整表阻断"
        );
        return outcome;
    }

    // 逐行映射，只写入非空取值
    for raw in &sheet.rows {
        let mut mapped = MappedRow::new();
        for (source, target) in &usable {
            if let Some(value) = raw.get(source) {
                mapped.insert((*target).to_string(), value.to_string());
            }
        }
        outcome.rows.push((raw.row, mapped));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{registry, ColumnRule, RawRow, Sheet};
    use std::collections::HashMap;

    fn sheet_with(headers: &[&str], rows: Vec<(u32, Vec<(&str, &str)>)>) -> Sheet {
        Sheet {
            name: "测试".into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|(row, cells)| RawRow {
                    row,
                    cells: cells
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                })
                .collect(),
            merge_ranges: Vec::new(),
        }
    }

    fn rule(source: &str, target: &str) -> ColumnRule {
        ColumnRule { source: source.into(), target: target.into(), required: false }
    }

    #[test]
    fn test_basic_mapping() {
        let table = registry().get("brand").unwrap();
        let sheet = sheet_with(
            &["品牌名称", "官网"],
            vec![(2, vec![("品牌名称", "百万城"), ("官网", "https://example.com")])],
        );
        let mapping = ColumnMapping {
            columns: vec![rule("品牌名称", "name"), rule("官网", "search_url")],
            conflict_mode: Default::default(),
            set_detection_mode: Default::default(),
        };

        let outcome = resolve_columns(&sheet, table, &mapping);
        assert!(!outcome.is_blocked());
        assert_eq!(outcome.rows.len(), 1);
        let (row, mapped) = &outcome.rows[0];
        assert_eq!(*row, 2);
        assert_eq!(mapped.get("name").unwrap(), "百万城");
        assert_eq!(mapped.get("search_url").unwrap(), "https://example.com");
    }

    #[test]
    fn test_unmapped_required_blocks_table() {
        let table = registry().get("brand").unwrap();
        let sheet = sheet_with(&["官网"], vec![(2, vec![("官网", "https://example.com")])]);
        let mapping = ColumnMapping {
            columns: vec![rule("官网", "search_url")],
            conflict_mode: Default::default(),
            set_detection_mode: Default::default(),
        };

        let outcome = resolve_columns(&sheet, table, &mapping);
        assert!(outcome.is_blocked());
        assert_eq!(outcome.missing_required, vec!["name".to_string()]);
        assert!(outcome.rows.is_empty());
    }

    #[test]
    fn test_unmapped_optional_reported_by_field_name() {
        let table = registry().get("brand").unwrap();
        let sheet = sheet_with(&["品牌名称"], vec![(2, vec![("品牌名称", "KATO")])]);
        let mapping = ColumnMapping {
            columns: vec![rule("品牌名称", "name")],
            conflict_mode: Default::default(),
            set_detection_mode: Default::default(),
        };

        let outcome = resolve_columns(&sheet, table, &mapping);
        assert!(!outcome.is_blocked());
        assert_eq!(outcome.unmapped_optional, vec!["search_url".to_string()]);
    }

    #[test]
    fn test_missing_source_column_for_required_blocks() {
        let table = registry().get("brand").unwrap();
        let sheet = sheet_with(&["官网"], vec![]);
        let mapping = ColumnMapping {
            columns: vec![rule("品牌名称", "name")],
            conflict_mode: Default::default(),
            set_detection_mode: Default::default(),
        };

        let outcome = resolve_columns(&sheet, table, &mapping);
        assert!(outcome.is_blocked());
    }

    #[test]
    fn test_unknown_target_field_warns_without_blocking() {
        let table = registry().get("brand").unwrap();
        let sheet = sheet_with(&["品牌名称"], vec![(2, vec![("品牌名称", "KATO")])]);
        let mapping = ColumnMapping {
            columns: vec![rule("品牌名称", "name"), rule("品牌名称", "no_such_field")],
            conflict_mode: Default::default(),
            set_detection_mode: Default::default(),
        };

        let outcome = resolve_columns(&sheet, table, &mapping);
        assert!(!outcome.is_blocked());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.rows.len(), 1);
    }

    #[test]
    fn test_blank_cells_not_inserted() {
        let table = registry().get("brand").unwrap();
        let sheet = sheet_with(
            &["品牌名称", "官网"],
            vec![(3, vec![("品牌名称", "ROCO"), ("官网", "")])],
        );
        let mapping = ColumnMapping {
            columns: vec![rule("品牌名称", "name"), rule("官网", "search_url")],
            conflict_mode: Default::default(),
            set_detection_mode: Default::default(),
        };

        let outcome = resolve_columns(&sheet, table, &mapping);
        let (_, mapped) = &outcome.rows[0];
        assert!(mapped.contains_key("name"));
        assert!(!mapped.contains_key("search_url"));
    }
}
