// ==========================================
// 火车模型收藏管理 - 套装边界识别
// ==========================================
// 职责: 把车厢表的平铺数据行还原为「套装 + 明细」结构
// 依据: 首个有单列合并的表头字段列的合并几何；无合并时退化为
//       「表头字段全非空的行开新套装」启发式
// ==========================================

use std::collections::BTreeSet;

use crate::domain::{
    ColumnMapping, FieldRole, MappedRow, MergeRect, SetDetectionMode, SetGroup, Sheet,
    TableSchema,
};

/// 套装识别器（纯函数集合，不触存储）
pub struct SetBuilder;

impl SetBuilder {
    /// 识别套装边界
    ///
    /// # 参数
    /// * `sheet` - 工作表（行号与合并区间均为 1-based）
    /// * `table` - 目标复合表配置
    /// * `mapping` - 列映射（决定哪些表头字段参与识别）
    /// * `rows` - 映射后的数据行（行号升序）
    ///
    /// # 返回
    /// * 套装列表 + 非阻断警告
    pub fn build(
        sheet: &Sheet,
        table: &TableSchema,
        mapping: &ColumnMapping,
        rows: &[(u32, MappedRow)],
    ) -> (Vec<SetGroup>, Vec<String>) {
        if rows.is_empty() {
            return (Vec::new(), Vec::new());
        }

        match mapping.set_detection_mode {
            SetDetectionMode::Row => (Self::build_per_row(table, rows), Vec::new()),
            SetDetectionMode::Merged => Self::build_from_merges(sheet, table, mapping, rows),
        }
    }

    /// 行模式: 每行一个独立套装（单节车厢也按套装存储）
    fn build_per_row(table: &TableSchema, rows: &[(u32, MappedRow)]) -> Vec<SetGroup> {
        rows.iter()
            .map(|(row, mapped)| SetGroup {
                header_values: subset(mapped, table, FieldRole::Header),
                item_rows: vec![(*row, subset(mapped, table, FieldRole::Item))],
                start_row: *row,
                end_row: *row,
            })
            .collect()
    }

    /// 合并模式: 按边界列的单列合并切分行区间
    fn build_from_merges(
        sheet: &Sheet,
        table: &TableSchema,
        mapping: &ColumnMapping,
        rows: &[(u32, MappedRow)],
    ) -> (Vec<SetGroup>, Vec<String>) {
        let first_row = rows.iter().map(|(r, _)| *r).min().unwrap_or(0);
        let last_row = rows.iter().map(|(r, _)| *r).max().unwrap_or(0);

        let Some(boundary_merges) =
            boundary_column_merges(sheet, table, mapping, first_row, last_row)
        else {
            // 没有可用的合并几何，退化为启发式
            return Self::build_heuristic(table, mapping, rows);
        };

        // 切分点: 数据区首尾 + 每个合并区间的起止
        let mut cuts: BTreeSet<u32> = BTreeSet::new();
        cuts.insert(first_row);
        cuts.insert(last_row + 1);
        for rect in &boundary_merges {
            cuts.insert(rect.min_row.max(first_row));
            cuts.insert((rect.max_row + 1).min(last_row + 1));
        }
        let cuts: Vec<u32> = cuts.into_iter().collect();

        let mut warnings = Vec::new();
        let mut groups = Vec::new();
        for window in cuts.windows(2) {
            let (lo, hi) = (window[0], window[1]);
            let members: Vec<&(u32, MappedRow)> =
                rows.iter().filter(|(r, _)| lo <= *r && *r < hi).collect();
            let Some((anchor_row, anchor)) = members.first() else {
                continue;
            };

            let mut header_values = subset(anchor, table, FieldRole::Header);
            fill_from_merge_anchors(sheet, table, mapping, rows, *anchor_row, &mut header_values);

            // 同一套装内表头字段取值应当一致（非锚点行通常为空）
            for (row, mapped) in members.iter().skip(1) {
                for (field, value) in subset(mapped, table, FieldRole::Header) {
                    if header_values.get(&field).map(|v| v != &value).unwrap_or(true) {
                        warnings.push(format!(
                            "第 {} 行套装字段 {} 与套装首行取值不一致，以首行为准",
                            row, field
                        ));
                    }
                }
            }

            groups.push(SetGroup {
                header_values,
                item_rows: members
                    .iter()
                    .map(|(r, m)| (*r, subset(m, table, FieldRole::Item)))
                    .collect(),
                start_row: *anchor_row,
                end_row: members.last().map(|(r, _)| *r).unwrap_or(*anchor_row),
            });
        }

        (groups, warnings)
    }

    /// 启发式: 映射到的表头字段全部非空的行开启新套装
    fn build_heuristic(
        table: &TableSchema,
        mapping: &ColumnMapping,
        rows: &[(u32, MappedRow)],
    ) -> (Vec<SetGroup>, Vec<String>) {
        let header_targets: Vec<&str> = table
            .fields_by_role(FieldRole::Header)
            .into_iter()
            .filter(|f| mapping.columns.iter().any(|r| r.target == f.name))
            .map(|f| f.name)
            .collect();

        let mut warnings = Vec::new();
        let mut groups: Vec<SetGroup> = Vec::new();

        for (row, mapped) in rows {
            let starts_set = !header_targets.is_empty()
                && header_targets
                    .iter()
                    .all(|t| mapped.get(*t).map(|v| !v.is_empty()).unwrap_or(false));

            if starts_set {
                groups.push(SetGroup {
                    header_values: subset(mapped, table, FieldRole::Header),
                    item_rows: vec![(*row, subset(mapped, table, FieldRole::Item))],
                    start_row: *row,
                    end_row: *row,
                });
            } else if let Some(current) = groups.last_mut() {
                current.item_rows.push((*row, subset(mapped, table, FieldRole::Item)));
                current.end_row = *row;
            } else {
                warnings.push(format!("第 {} 行不属于任何套装，已跳过", row));
            }
        }

        (groups, warnings)
    }
}

/// 找边界列的单列合并区间
///
/// 按字段声明顺序取首个满足条件的表头字段: 已映射、源列存在、
/// 且该列上有覆盖数据区的单列合并。找不到返回 None。
fn boundary_column_merges(
    sheet: &Sheet,
    table: &TableSchema,
    mapping: &ColumnMapping,
    first_row: u32,
    last_row: u32,
) -> Option<Vec<MergeRect>> {
    for field in table.fields_by_role(FieldRole::Header) {
        let Some(rule) = mapping.columns.iter().find(|r| r.target == field.name) else {
            continue;
        };
        let Some(col_index) = sheet.headers.iter().position(|h| h == &rule.source) else {
            continue;
        };
        let col = col_index as u32 + 1;

        let merges: Vec<MergeRect> = sheet
            .merge_ranges
            .iter()
            .filter(|r| r.single_column() && r.min_col == col)
            .filter(|r| r.max_row >= first_row && r.min_row <= last_row)
            .copied()
            .collect();

        if !merges.is_empty() {
            return Some(merges);
        }
    }
    None
}

/// 窗口首行落在别的表头列更长合并区间的非锚点格时，该格读出来是空白，
/// 回退取该合并区间锚点行（min_row）的取值补齐套装字段。
fn fill_from_merge_anchors(
    sheet: &Sheet,
    table: &TableSchema,
    mapping: &ColumnMapping,
    rows: &[(u32, MappedRow)],
    window_start: u32,
    header_values: &mut MappedRow,
) {
    for field in table.fields_by_role(FieldRole::Header) {
        if header_values.contains_key(field.name) {
            continue;
        }
        let Some(rule) = mapping.columns.iter().find(|r| r.target == field.name) else {
            continue;
        };
        let Some(col_index) = sheet.headers.iter().position(|h| h == &rule.source) else {
            continue;
        };
        let col = col_index as u32 + 1;

        let Some(rect) = sheet.merge_ranges.iter().find(|r| {
            r.single_column() && r.min_col == col && r.covers_row(window_start) && r.min_row < window_start
        }) else {
            continue;
        };
        let anchor_value = rows
            .iter()
            .find(|(row, _)| *row == rect.min_row)
            .and_then(|(_, m)| m.get(field.name))
            .filter(|v| !v.is_empty());
        if let Some(value) = anchor_value {
            header_values.insert(field.name.to_string(), value.clone());
        }
    }
}

/// 取映射行中指定角色的字段子集
fn subset(mapped: &MappedRow, table: &TableSchema, role: FieldRole) -> MappedRow {
    table
        .fields_by_role(role)
        .into_iter()
        .filter_map(|f| mapped.get(f.name).map(|v| (f.name.to_string(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{registry, ColumnRule, SetDetectionMode};

    fn carriage_mapping(mode: SetDetectionMode) -> ColumnMapping {
        let rule = |source: &str, target: &str| ColumnRule {
            source: source.into(),
            target: target.into(),
            required: false,
        };
        ColumnMapping {
            columns: vec![
                rule("品牌", "brand_id"),
                rule("比例", "scale"),
                rule("车型", "model_id"),
                rule("车辆号", "car_number"),
            ],
            conflict_mode: Default::default(),
            set_detection_mode: mode,
        }
    }

    fn sheet(merges: Vec<MergeRect>) -> Sheet {
        Sheet {
            name: "车厢".into(),
            headers: vec!["品牌".into(), "比例".into(), "车型".into(), "车辆号".into()],
            rows: Vec::new(),
            merge_ranges: merges,
        }
    }

    fn mapped(pairs: &[(&str, &str)]) -> MappedRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// 合并 2-4 与 5-6 两段 -> 两个套装，3 + 2 节车厢
    #[test]
    fn test_merged_mode_splits_by_merge_geometry() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Merged);
        let sheet = sheet(vec![
            MergeRect { min_row: 2, max_row: 4, min_col: 1, max_col: 1 },
            MergeRect { min_row: 2, max_row: 4, min_col: 2, max_col: 2 },
            MergeRect { min_row: 5, max_row: 6, min_col: 1, max_col: 1 },
            MergeRect { min_row: 5, max_row: 6, min_col: 2, max_col: 2 },
        ]);
        let rows = vec![
            (2, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("model_id", "YZ25G"), ("car_number", "340001")])),
            (3, mapped(&[("model_id", "YZ25G"), ("car_number", "340002")])),
            (4, mapped(&[("model_id", "CA25G"), ("car_number", "890001")])),
            (5, mapped(&[("brand_id", "KATO"), ("scale", "N"), ("model_id", "YW25G"), ("car_number", "550001")])),
            (6, mapped(&[("model_id", "YW25G"), ("car_number", "550002")])),
        ];

        let (groups, warnings) = SetBuilder::build(&sheet, table, &mapping, &rows);
        assert!(warnings.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].item_rows.len(), 3);
        assert_eq!(groups[0].header_values.get("brand_id").unwrap(), "百万城");
        assert_eq!(groups[0].start_row, 2);
        assert_eq!(groups[0].end_row, 4);
        assert_eq!(groups[1].item_rows.len(), 2);
        assert_eq!(groups[1].header_values.get("scale").unwrap(), "N");
    }

    /// 别的表头列合并跨过边界列的切分点时，窗口首行是非锚点空白格，
    /// 取值回退到该合并区间的锚点行
    #[test]
    fn test_header_value_falls_back_to_merge_anchor() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Merged);
        // 品牌列 2-4 / 5-6 两段，比例列 2-6 一整段
        let sheet = sheet(vec![
            MergeRect { min_row: 2, max_row: 4, min_col: 1, max_col: 1 },
            MergeRect { min_row: 5, max_row: 6, min_col: 1, max_col: 1 },
            MergeRect { min_row: 2, max_row: 6, min_col: 2, max_col: 2 },
        ]);
        let rows = vec![
            (2, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("car_number", "340001")])),
            (3, mapped(&[("car_number", "340002")])),
            (4, mapped(&[("car_number", "890001")])),
            (5, mapped(&[("brand_id", "KATO"), ("car_number", "550001")])),
            (6, mapped(&[("car_number", "550002")])),
        ];

        let (groups, warnings) = SetBuilder::build(&sheet, table, &mapping, &rows);
        assert!(warnings.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].header_values.get("brand_id").unwrap(), "KATO");
        assert_eq!(groups[1].header_values.get("scale").unwrap(), "HO");
    }

    /// 行模式 -> 每行一个独立套装
    #[test]
    fn test_row_mode_each_row_is_a_set() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Row);
        let sheet = sheet(Vec::new());
        let rows = vec![
            (2, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("car_number", "340001")])),
            (3, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("car_number", "340002")])),
            (4, mapped(&[("brand_id", "KATO"), ("scale", "N"), ("car_number", "550001")])),
        ];

        let (groups, warnings) = SetBuilder::build(&sheet, table, &mapping, &rows);
        assert!(warnings.is_empty());
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.item_rows.len() == 1));
        assert_eq!(groups[2].header_values.get("brand_id").unwrap(), "KATO");
    }

    /// 无合并 -> 启发式: 表头字段全非空的行开新套装
    #[test]
    fn test_heuristic_fallback_without_merges() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Merged);
        let sheet = sheet(Vec::new());
        let rows = vec![
            (2, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("car_number", "340001")])),
            (3, mapped(&[("car_number", "340002")])),
            (4, mapped(&[("brand_id", "KATO"), ("scale", "N"), ("car_number", "550001")])),
        ];

        let (groups, warnings) = SetBuilder::build(&sheet, table, &mapping, &rows);
        assert!(warnings.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].item_rows.len(), 2);
        assert_eq!(groups[0].end_row, 3);
        assert_eq!(groups[1].item_rows.len(), 1);
    }

    /// 启发式下，首个套装之前的孤行跳过并警告
    #[test]
    fn test_heuristic_orphan_rows_warn() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Merged);
        let sheet = sheet(Vec::new());
        let rows = vec![
            (2, mapped(&[("car_number", "340001")])),
            (3, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("car_number", "340002")])),
        ];

        let (groups, warnings) = SetBuilder::build(&sheet, table, &mapping, &rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("第 2 行"));
    }

    /// 多列合并不参与套装识别
    #[test]
    fn test_multi_column_merges_ignored() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Merged);
        let sheet = sheet(vec![MergeRect { min_row: 2, max_row: 3, min_col: 1, max_col: 2 }]);
        let rows = vec![
            (2, mapped(&[("brand_id", "百万城"), ("scale", "HO"), ("car_number", "340001")])),
            (3, mapped(&[("car_number", "340002")])),
        ];

        // 没有单列合并 -> 走启发式
        let (groups, _) = SetBuilder::build(&sheet, table, &mapping, &rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].item_rows.len(), 2);
    }

    #[test]
    fn test_empty_rows_yield_nothing() {
        let table = registry().get("carriage").unwrap();
        let mapping = carriage_mapping(SetDetectionMode::Merged);
        let (groups, warnings) = SetBuilder::build(&sheet(Vec::new()), table, &mapping, &[]);
        assert!(groups.is_empty());
        assert!(warnings.is_empty());
    }
}
