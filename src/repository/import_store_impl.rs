// ==========================================
// 火车模型收藏管理 - 导入存储实现 (SQLite)
// ==========================================
// 并发模型: Arc<Mutex<Connection>>，接口异步、执行同步
// 事务: 显式 BEGIN/COMMIT/ROLLBACK，由导入执行器按表控制
// ==========================================

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{init_schema, open_in_memory_connection, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_store::{ImportStore, SqlValue};

/// SQLite 导入存储
pub struct ImportStoreImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportStoreImpl {
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

    /// 复用已有连接（与模板仓储共享同一数据库时用）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享连接句柄
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 校验 SQL 标识符
///
/// 表名/列名只应来自 domain::schema 注册表，这里兜底拦截
/// 任何越过注册表直接传入的异常标识符。
fn checked_ident(ident: &str) -> RepositoryResult<&str> {
    let valid = !ident.is_empty()
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(ident)
    } else {
        Err(RepositoryError::ValidationError(format!(
            "非法 SQL 标识符: {}",
            ident
        )))
    }
}

#[async_trait]
impl ImportStore for ImportStoreImpl {
    async fn begin(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    async fn commit(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("COMMIT")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("ROLLBACK")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    async fn find_id_by_name(&self, table: &str, name: &str) -> RepositoryResult<Option<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE name = ?1 COLLATE NOCASE LIMIT 1",
            checked_ident(table)?
        );
        let conn = self.lock()?;
        let id = conn
            .query_row(&sql, [name], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id)
    }

    async fn exists_where(
        &self,
        table: &str,
        conditions: &[(String, String)],
    ) -> RepositoryResult<bool> {
        if conditions.is_empty() {
            return Err(RepositoryError::ValidationError(
                "存在性查询至少需要一个条件".to_string(),
            ));
        }

        // 判重与按名查 ID 同口径: 大小写不敏感
        let mut clauses = Vec::with_capacity(conditions.len());
        for (i, (field, _)) in conditions.iter().enumerate() {
            clauses.push(format!("{} = ?{} COLLATE NOCASE", checked_ident(field)?, i + 1));
        }
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {})",
            checked_ident(table)?,
            clauses.join(" AND ")
        );

        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            &sql,
            rusqlite::params_from_iter(conditions.iter().map(|(_, v)| v.as_str())),
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn insert(
        &self,
        table: &str,
        values: &[(String, SqlValue)],
    ) -> RepositoryResult<i64> {
        if values.is_empty() {
            return Err(RepositoryError::ValidationError(
                "插入记录不能没有任何字段".to_string(),
            ));
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (i, (field, _)) in values.iter().enumerate() {
            columns.push(checked_ident(field)?.to_string());
            placeholders.push(format!("?{}", i + 1));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            checked_ident(table)?,
            columns.join(", "),
            placeholders.join(", ")
        );

        let conn = self.lock()?;
        conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|(_, v)| v)),
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn update_where(
        &self,
        table: &str,
        conditions: &[(String, String)],
        values: &[(String, SqlValue)],
    ) -> RepositoryResult<usize> {
        if conditions.is_empty() || values.is_empty() {
            return Err(RepositoryError::ValidationError(
                "更新语句的条件与取值均不能为空".to_string(),
            ));
        }

        let mut sets = Vec::with_capacity(values.len());
        for (i, (field, _)) in values.iter().enumerate() {
            sets.push(format!("{} = ?{}", checked_ident(field)?, i + 1));
        }
        let mut clauses = Vec::with_capacity(conditions.len());
        for (i, (field, _)) in conditions.iter().enumerate() {
            clauses.push(format!(
                "{} = ?{} COLLATE NOCASE",
                checked_ident(field)?,
                values.len() + i + 1
            ));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            checked_ident(table)?,
            sets.join(", "),
            clauses.join(" AND ")
        );

        let params: Vec<Box<dyn rusqlite::ToSql>> = values
            .iter()
            .map(|(_, v)| Box::new(v.clone()) as Box<dyn rusqlite::ToSql>)
            .chain(
                conditions
                    .iter()
                    .map(|(_, v)| Box::new(v.clone()) as Box<dyn rusqlite::ToSql>),
            )
            .collect();

        let conn = self.lock()?;
        let affected = conn.execute(
            &sql,
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
        )?;
        Ok(affected)
    }
}
