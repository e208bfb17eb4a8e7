// ==========================================
// 火车模型收藏管理 - 导入存储接口
// ==========================================
// 职责: 导入引擎需要的全部存储原语
// 约束: 表名/列名只允许来自 domain::schema 注册表，
//       接口内以标识符拼接 SQL，取值一律走参数绑定
// ==========================================

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;

use crate::repository::error::RepositoryResult;

/// 写入取值（执行阶段转换的终点）
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// 导入存储接口
///
/// 事务边界由调用方控制: 每张目标表一个 begin/commit，
/// 失败时 rollback，保证单表原子性。
#[async_trait]
pub trait ImportStore: Send + Sync {
    // ===== 事务控制 =====
    async fn begin(&self) -> RepositoryResult<()>;
    async fn commit(&self) -> RepositoryResult<()>;
    async fn rollback(&self) -> RepositoryResult<()>;

    // ===== 查询 =====

    /// 按名称查记录 ID（大小写不敏感，外键解析用）
    async fn find_id_by_name(&self, table: &str, name: &str) -> RepositoryResult<Option<i64>>;

    /// 按等值条件判断记录是否存在（冲突检测用，精确匹配）
    async fn exists_where(
        &self,
        table: &str,
        conditions: &[(String, String)],
    ) -> RepositoryResult<bool>;

    // ===== 写入 =====

    /// 插入一条记录，返回新记录 ID
    async fn insert(
        &self,
        table: &str,
        values: &[(String, SqlValue)],
    ) -> RepositoryResult<i64>;

    /// 按等值条件更新记录，返回受影响行数
    async fn update_where(
        &self,
        table: &str,
        conditions: &[(String, String)],
        values: &[(String, SqlValue)],
    ) -> RepositoryResult<usize>;
}
