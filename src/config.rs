// ==========================================
// 火车模型收藏管理 - 配置层
// ==========================================
// 职责: 应用级配置（数据库路径/语言）
// 来源: 环境变量优先，缺省落到系统数据目录
// ==========================================

use std::path::PathBuf;

/// 环境变量: 数据库文件路径
pub const ENV_DB_PATH: &str = "TMM_DB_PATH";

/// 环境变量: 界面语言（zh-CN / en）
pub const ENV_LOCALE: &str = "TMM_LOCALE";

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite 数据库文件路径
    pub db_path: String,
    /// 语言代码
    pub locale: String,
}

impl AppConfig {
    /// 从环境变量加载配置，缺省使用系统数据目录
    pub fn load() -> Self {
        let db_path = std::env::var(ENV_DB_PATH)
            .unwrap_or_else(|_| default_db_path().to_string_lossy().to_string());
        let locale = std::env::var(ENV_LOCALE).unwrap_or_else(|_| "zh-CN".to_string());

        Self { db_path, locale }
    }
}

/// 缺省数据库路径: <系统数据目录>/train-model-manager/tmm.db
pub fn default_db_path() -> PathBuf {
    let mut dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("train-model-manager");
    dir.push("tmm.db");
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path_ends_with_db_file() {
        let path = default_db_path();
        assert!(path.to_string_lossy().ends_with("tmm.db"));
    }
}
