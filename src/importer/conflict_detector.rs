// ==========================================
// 火车模型收藏管理 - 唯一性冲突检测
// ==========================================
// 职责: 预览/执行共用的只读判重
// 规则: unique 字段全局判重，unique_in_scope 字段与范围字段联合判重
// ==========================================

use crate::domain::{Conflict, ConflictKind, MappedRow, TableSchema};
use crate::repository::{ImportStore, RepositoryResult};

/// 一条待判重的键: 冲突类别 + 字段 + 等值条件
pub(crate) struct ConflictKey {
    pub kind: ConflictKind,
    pub field: &'static str,
    pub display: &'static str,
    pub conditions: Vec<(String, String)>,
}

/// 提取一行数据里全部可判重的键
///
/// 范围字段（如比例）在该行缺值时跳过范围判重，
/// 缺失语义交由必填校验处理。
pub(crate) fn conflict_keys(table: &TableSchema, mapped: &MappedRow) -> Vec<ConflictKey> {
    let mut keys = Vec::new();
    for field in &table.fields {
        let Some(value) = mapped.get(field.name).filter(|v| !v.is_empty()) else {
            continue;
        };

        if field.unique {
            keys.push(ConflictKey {
                kind: ConflictKind::UniqueName,
                field: field.name,
                display: field.display,
                conditions: vec![(field.name.to_string(), value.clone())],
            });
        }

        if let Some(scope) = field.unique_in_scope {
            let Some(scope_value) = mapped.get(scope).filter(|v| !v.is_empty()) else {
                continue;
            };
            keys.push(ConflictKey {
                kind: ConflictKind::ScopedUnique,
                field: field.name,
                display: field.display,
                conditions: vec![
                    (field.name.to_string(), value.clone()),
                    (scope.to_string(), scope_value.clone()),
                ],
            });
        }
    }
    keys
}

/// 冲突检测器（只读，不写库）
pub struct ConflictDetector<'a> {
    store: &'a dyn ImportStore,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(store: &'a dyn ImportStore) -> Self {
        Self { store }
    }

    /// 检测映射行与已有记录的唯一性冲突
    ///
    /// 同一组判重条件只报一次（大小写不敏感，与存储口径一致），
    /// 文件内部重复行不额外展开。
    pub async fn detect(
        &self,
        table: &TableSchema,
        rows: &[(u32, MappedRow)],
    ) -> RepositoryResult<Vec<Conflict>> {
        let mut seen: std::collections::HashSet<Vec<(String, String)>> =
            std::collections::HashSet::new();
        let mut conflicts = Vec::new();

        for (_, mapped) in rows {
            for key in conflict_keys(table, mapped) {
                let dedup_key: Vec<(String, String)> = key
                    .conditions
                    .iter()
                    .map(|(f, v)| (f.clone(), v.to_lowercase()))
                    .collect();
                if !seen.insert(dedup_key) {
                    continue;
                }
                if !self.store.exists_where(table.storage_table, &key.conditions).await? {
                    continue;
                }

                let cell_value = key.conditions[0].1.clone();
                let (value, message) = match key.kind {
                    ConflictKind::UniqueName => (
                        cell_value.clone(),
                        format!("{}「{}」已存在", key.display, cell_value),
                    ),
                    ConflictKind::ScopedUnique => {
                        let scope_value = &key.conditions[1].1;
                        (
                            format!("{} / {}", scope_value, cell_value),
                            format!("{} 比例下{}「{}」已存在", scope_value, key.display, cell_value),
                        )
                    }
                };
                conflicts.push(Conflict {
                    table_name: table.name.to_string(),
                    kind: key.kind,
                    field: key.field.to_string(),
                    value,
                    message,
                });
            }
        }

        Ok(conflicts)
    }
}
