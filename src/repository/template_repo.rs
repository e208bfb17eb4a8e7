// ==========================================
// 火车模型收藏管理 - 导入模板仓储
// ==========================================
// 职责: 导入配置的持久化（保存常用的列映射方案）
// 存储: import_template 表，config 列为 JSON 文本
// ==========================================

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{init_schema, open_in_memory_connection, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 导入模板
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportTemplate {
    pub id: i64,
    pub name: String,
    /// 导入配置（ImportConfig 的 JSON 形式，存取不改写内容）
    pub config: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// 导入模板仓储
pub struct TemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TemplateRepository {
    /// 打开数据库文件并确保表结构存在
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// 内存数据库（测试用）
    pub fn new_in_memory() -> RepositoryResult<Self> {
        let conn = open_in_memory_connection()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// 复用已有连接（与导入存储共享同一数据库时用）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn now() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// 全部模板（按更新时间倒序）
    pub async fn list(&self) -> RepositoryResult<Vec<ImportTemplate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, config, created_at, updated_at
             FROM import_template ORDER BY updated_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_template)?;
        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?);
        }
        Ok(templates)
    }

    /// 按 ID 查模板
    pub async fn get(&self, id: i64) -> RepositoryResult<ImportTemplate> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, config, created_at, updated_at
             FROM import_template WHERE id = ?1",
            [id],
            row_to_template,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "ImportTemplate".to_string(),
            id: id.to_string(),
        })
    }

    /// 新建模板
    pub async fn create(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> RepositoryResult<ImportTemplate> {
        if name.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "模板名称不能为空".to_string(),
            ));
        }

        let now = Self::now();
        let config_text = serde_json::to_string(config)?;
        let id = {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO import_template (name, config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name.trim(), config_text, now, now],
            )?;
            conn.last_insert_rowid()
        };

        tracing::info!(template_id = id, name = name.trim(), "导入模板已创建");
        self.get(id).await
    }

    /// 更新模板（名称与配置整体替换）
    pub async fn update(
        &self,
        id: i64,
        name: &str,
        config: &serde_json::Value,
    ) -> RepositoryResult<ImportTemplate> {
        if name.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "模板名称不能为空".to_string(),
            ));
        }

        let config_text = serde_json::to_string(config)?;
        let affected = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE import_template SET name = ?1, config = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![name.trim(), config_text, Self::now(), id],
            )?
        };
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportTemplate".to_string(),
                id: id.to_string(),
            });
        }
        self.get(id).await
    }

    /// 删除模板
    pub async fn delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM import_template WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportTemplate".to_string(),
                id: id.to_string(),
            });
        }
        tracing::info!(template_id = id, "导入模板已删除");
        Ok(())
    }

    /// 复制模板，命名为「<原名> (副本)」，重名时追加序号
    pub async fn copy(&self, id: i64) -> RepositoryResult<ImportTemplate> {
        let source = self.get(id).await?;

        let mut candidate = format!("{} (副本)", source.name);
        let mut n = 2;
        while self.name_exists(&candidate)? {
            candidate = format!("{} (副本{})", source.name, n);
            n += 1;
        }

        self.create(&candidate, &source.config).await
    }

    fn name_exists(&self, name: &str) -> RepositoryResult<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM import_template WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportTemplate> {
    let config_text: String = row.get(2)?;
    Ok(ImportTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        config: serde_json::from_str(&config_text).unwrap_or(serde_json::Value::Null),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> serde_json::Value {
        json!({
            "sheet_mappings": [{"sheet_name": "品牌", "table_name": "brand"}],
            "column_mappings": {
                "brand": {"columns": [{"source": "品牌名称", "target": "name", "required": true}]}
            }
        })
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let repo = TemplateRepository::new_in_memory().unwrap();
        let created = repo.create("品牌导入", &sample_config()).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(fetched.name, "品牌导入");
        assert_eq!(fetched.config, sample_config());

        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = TemplateRepository::new_in_memory().unwrap();
        repo.create("品牌导入", &sample_config()).await.unwrap();
        let err = repo.create("品牌导入", &sample_config()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = TemplateRepository::new_in_memory().unwrap();
        let created = repo.create("品牌导入", &sample_config()).await.unwrap();

        let updated = repo
            .update(created.id, "机车导入", &sample_config())
            .await
            .unwrap();
        assert_eq!(updated.name, "机车导入");

        repo.delete(created.id).await.unwrap();
        let err = repo.get(created.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_copy_appends_suffix() {
        let repo = TemplateRepository::new_in_memory().unwrap();
        let created = repo.create("品牌导入", &sample_config()).await.unwrap();

        let first = repo.copy(created.id).await.unwrap();
        assert_eq!(first.name, "品牌导入 (副本)");

        let second = repo.copy(created.id).await.unwrap();
        assert_eq!(second.name, "品牌导入 (副本2)");
        assert_eq!(second.config, sample_config());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let repo = TemplateRepository::new_in_memory().unwrap();
        let err = repo.delete(999).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
