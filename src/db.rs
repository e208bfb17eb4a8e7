// ==========================================
// 火车模型收藏管理 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表 DDL（与 domain::schema 的注册表对齐）
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库（测试用）
pub fn open_in_memory_connection() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化全部数据表
///
/// 幂等：全部使用 IF NOT EXISTS，可在每次启动时调用
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// 建表 DDL
///
/// 系统信息表: 名称唯一；模型数据表: 比例内唯一性由应用层检查
const SCHEMA_SQL: &str = r#"
-- ===== 系统信息表 =====
CREATE TABLE IF NOT EXISTS brand (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    search_url TEXT
);
CREATE TABLE IF NOT EXISTS depot (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS merchant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS power_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS chip_interface (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS chip_model (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS locomotive_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS carriage_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS trainset_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS locomotive_model (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    series_id INTEGER REFERENCES locomotive_series(id),
    power_type_id INTEGER REFERENCES power_type(id)
);
CREATE TABLE IF NOT EXISTS carriage_model (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    series_id INTEGER REFERENCES carriage_series(id),
    type TEXT
);
CREATE TABLE IF NOT EXISTS trainset_model (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    series_id INTEGER REFERENCES trainset_series(id),
    power_type_id INTEGER REFERENCES power_type(id)
);

-- ===== 模型数据表 =====
CREATE TABLE IF NOT EXISTS locomotive (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brand_id INTEGER REFERENCES brand(id),
    scale TEXT,
    series_id INTEGER REFERENCES locomotive_series(id),
    power_type_id INTEGER REFERENCES power_type(id),
    model_id INTEGER REFERENCES locomotive_model(id),
    depot_id INTEGER REFERENCES depot(id),
    plaque TEXT,
    color TEXT,
    locomotive_number TEXT,
    decoder_number TEXT,
    chip_interface_id INTEGER REFERENCES chip_interface(id),
    chip_model_id INTEGER REFERENCES chip_model(id),
    price TEXT,
    total_price REAL,
    item_number TEXT,
    purchase_date TEXT,
    merchant_id INTEGER REFERENCES merchant(id)
);
CREATE TABLE IF NOT EXISTS carriage_set (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brand_id INTEGER REFERENCES brand(id),
    scale TEXT,
    series_id INTEGER REFERENCES carriage_series(id),
    depot_id INTEGER REFERENCES depot(id),
    train_number TEXT,
    plaque TEXT,
    item_number TEXT,
    total_price REAL,
    purchase_date TEXT,
    merchant_id INTEGER REFERENCES merchant(id)
);
CREATE TABLE IF NOT EXISTS carriage_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    carriage_set_id INTEGER NOT NULL REFERENCES carriage_set(id) ON DELETE CASCADE,
    model_id INTEGER REFERENCES carriage_model(id),
    car_number TEXT,
    color TEXT,
    lighting TEXT
);
CREATE TABLE IF NOT EXISTS trainset (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brand_id INTEGER REFERENCES brand(id),
    scale TEXT,
    series_id INTEGER REFERENCES trainset_series(id),
    power_type_id INTEGER REFERENCES power_type(id),
    model_id INTEGER REFERENCES trainset_model(id),
    depot_id INTEGER REFERENCES depot(id),
    plaque TEXT,
    color TEXT,
    formation TEXT,
    trainset_number TEXT,
    decoder_number TEXT,
    head_light TEXT,
    interior_light TEXT,
    chip_interface_id INTEGER REFERENCES chip_interface(id),
    chip_model_id INTEGER REFERENCES chip_model(id),
    price TEXT,
    total_price REAL,
    item_number TEXT,
    purchase_date TEXT,
    merchant_id INTEGER REFERENCES merchant(id)
);
CREATE TABLE IF NOT EXISTS locomotive_head (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brand_id INTEGER REFERENCES brand(id),
    scale TEXT,
    model_id INTEGER REFERENCES trainset_model(id),
    special_color TEXT,
    head_light TEXT,
    interior_light TEXT,
    price TEXT,
    total_price REAL,
    item_number TEXT,
    purchase_date TEXT,
    merchant_id INTEGER REFERENCES merchant(id)
);

-- ===== 导入模板 =====
CREATE TABLE IF NOT EXISTS import_template (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    config TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = open_in_memory_connection().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='brand'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_brand_name_unique() {
        let conn = open_in_memory_connection().unwrap();
        init_schema(&conn).unwrap();

        conn.execute("INSERT INTO brand (name) VALUES ('百万城')", [])
            .unwrap();
        let dup = conn.execute("INSERT INTO brand (name) VALUES ('百万城')", []);
        assert!(dup.is_err());
    }
}
