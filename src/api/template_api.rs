// ==========================================
// 火车模型收藏管理 - 导入模板API
// ==========================================
// 职责: 导入配置的保存/复用（模板 CRUD + 复制）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::repository::{ImportTemplate, TemplateRepository};

/// 导入模板API
pub struct TemplateApi {
    db_path: String,
}

impl TemplateApi {
    /// 创建新的TemplateApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    fn repo(&self) -> ApiResult<TemplateRepository> {
        Ok(TemplateRepository::new(&self.db_path)?)
    }

    /// 全部模板
    pub async fn list(&self) -> ApiResult<Vec<ImportTemplate>> {
        Ok(self.repo()?.list().await?)
    }

    /// 按 ID 查模板
    pub async fn get(&self, id: i64) -> ApiResult<ImportTemplate> {
        Ok(self.repo()?.get(id).await?)
    }

    /// 新建模板
    ///
    /// config 只要求是 JSON 对象，字段细节留到导入时校验。
    pub async fn create(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> ApiResult<ImportTemplate> {
        validate_template_config(config)?;
        Ok(self.repo()?.create(name, config).await?)
    }

    /// 更新模板
    pub async fn update(
        &self,
        id: i64,
        name: &str,
        config: &serde_json::Value,
    ) -> ApiResult<ImportTemplate> {
        validate_template_config(config)?;
        Ok(self.repo()?.update(id, name, config).await?)
    }

    /// 删除模板
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        Ok(self.repo()?.delete(id).await?)
    }

    /// 复制模板（命名为「<原名> (副本)」）
    pub async fn copy(&self, id: i64) -> ApiResult<ImportTemplate> {
        Ok(self.repo()?.copy(id).await?)
    }
}

/// 模板配置允许存任意 JSON 对象（含空对象），非对象拒绝
fn validate_template_config(config: &serde_json::Value) -> ApiResult<()> {
    if config.is_object() {
        Ok(())
    } else {
        Err(ApiError::InvalidInput("模板配置必须是 JSON 对象".to_string()))
    }
}
