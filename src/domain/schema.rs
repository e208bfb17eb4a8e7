// ==========================================
// 火车模型收藏管理 - 表结构注册表
// ==========================================
// 职责: 声明所有可导入表及其字段配置
// 设计: 纯数据结构，新增表只追加数据，不新增类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ==========================================
// 字段配置
// ==========================================

/// 表类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableCategory {
    /// 系统信息表（品牌/配属/商家等）
    System,
    /// 模型数据表（机车/车厢/动车组/先头车）
    Model,
}

/// 字段角色（仅复合表有意义）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    /// 套装公共字段（整组共享）
    Header,
    /// 车厢项字段（每行独立）
    Item,
    /// 普通字段
    Plain,
}

/// 字段取值类别（决定执行阶段的取值转换）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// 文本（原样存储）
    Text,
    /// 价格表达式（安全求值后存数值）
    Price,
    /// 日期（YYYY-MM-DD，解析失败回退当天）
    Date,
}

/// 字段配置
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// 内部字段名（即存储列名）
    pub name: &'static str,
    /// 显示名称
    pub display: &'static str,
    /// 是否必填（必填字段未映射则该表整体阻断）
    pub required: bool,
    /// 全局唯一（按该字段单独判重）
    pub unique: bool,
    /// 范围内唯一（与指定字段联合判重，如机车号仅在同比例内唯一）
    pub unique_in_scope: Option<&'static str>,
    /// 外键引用的表名（取值需经名称解析为 ID）
    pub reference: Option<&'static str>,
    /// 字段角色
    pub role: FieldRole,
    /// 取值类别
    pub kind: FieldKind,
}

impl FieldSchema {
    /// 创建缺省字段（可选/非唯一/普通文本）
    fn new(name: &'static str, display: &'static str) -> Self {
        Self {
            name,
            display,
            required: false,
            unique: false,
            unique_in_scope: None,
            reference: None,
            role: FieldRole::Plain,
            kind: FieldKind::Text,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn scoped_by(mut self, scope_field: &'static str) -> Self {
        self.unique_in_scope = Some(scope_field);
        self
    }

    fn references(mut self, table: &'static str) -> Self {
        self.reference = Some(table);
        self
    }

    fn header(mut self) -> Self {
        self.role = FieldRole::Header;
        self
    }

    fn item(mut self) -> Self {
        self.role = FieldRole::Item;
        self
    }

    fn price(mut self) -> Self {
        self.kind = FieldKind::Price;
        self
    }

    fn date(mut self) -> Self {
        self.kind = FieldKind::Date;
        self
    }
}

// ==========================================
// 表配置
// ==========================================

/// 复合表（套装头 + 明细项）的存储信息
#[derive(Debug, Clone, Copy)]
pub struct CompositeStorage {
    /// 明细项存储表
    pub item_table: &'static str,
    /// 明细项指向套装头的外键列
    pub parent_fk: &'static str,
}

/// 表配置
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// 内部表名（导入配置中引用的 key）
    pub name: &'static str,
    /// 显示名称
    pub display_name: &'static str,
    /// 表类别
    pub category: TableCategory,
    /// 前端提示文案
    pub tooltip: Option<&'static str>,
    /// 存储表名（复合表为套装头存储表）
    pub storage_table: &'static str,
    /// 复合表存储信息（仅车厢）
    pub composite: Option<CompositeStorage>,
    /// 字段配置（顺序有意义：套装识别按此顺序取首个有合并的表头列）
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// 是否为复合表（套装头 + 明细项）
    pub fn is_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// 按名称查找字段
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 指定角色的字段列表
    pub fn fields_by_role(&self, role: FieldRole) -> Vec<&FieldSchema> {
        self.fields.iter().filter(|f| f.role == role).collect()
    }
}

// ==========================================
// 注册表
// ==========================================

/// 表结构注册表
///
/// 进程启动时构建一次，只读。未知表名返回 None，由调用方决定跳过或报错。
#[derive(Debug)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    /// 按名称查表
    pub fn get(&self, table_name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == table_name)
    }

    /// 全部表（系统表在前，模型表在后）
    pub fn all(&self) -> &[TableSchema] {
        &self.tables
    }

    /// 指定表中某个角色的字段
    pub fn fields_by_role(&self, table_name: &str, role: FieldRole) -> Vec<&FieldSchema> {
        self.get(table_name)
            .map(|t| t.fields_by_role(role))
            .unwrap_or_default()
    }

    /// 构建标准注册表（与线上表结构一一对应）
    pub fn standard() -> Self {
        use FieldSchema as F;

        let mut tables = Vec::new();

        // ===== 系统信息表 =====
        tables.push(TableSchema {
            name: "brand",
            display_name: "品牌",
            category: TableCategory::System,
            tooltip: None,
            storage_table: "brand",
            composite: None,
            fields: vec![
                F::new("name", "名称").required().unique(),
                F::new("search_url", "搜索地址"),
            ],
        });

        // 名称即全部内容的简单系统表
        let simple_system: [(&'static str, &'static str, Option<&'static str>); 8] = [
            ("depot", "配属", Some("即机务段/车辆段/动车段")),
            ("merchant", "商家", None),
            ("power_type", "动力类型", None),
            ("chip_interface", "芯片接口", None),
            ("chip_model", "芯片型号", None),
            ("locomotive_series", "机车系列", None),
            ("carriage_series", "车厢系列", None),
            ("trainset_series", "动车组系列", None),
        ];
        for (name, display, tooltip) in simple_system {
            tables.push(TableSchema {
                name,
                display_name: display,
                category: TableCategory::System,
                tooltip,
                storage_table: name,
                composite: None,
                fields: vec![F::new("name", "名称").required().unique()],
            });
        }

        tables.push(TableSchema {
            name: "locomotive_model",
            display_name: "机车车型",
            category: TableCategory::System,
            tooltip: None,
            storage_table: "locomotive_model",
            composite: None,
            fields: vec![
                F::new("name", "名称").required(),
                F::new("series_id", "系列").required().references("locomotive_series"),
                F::new("power_type_id", "动力类型").required().references("power_type"),
            ],
        });
        tables.push(TableSchema {
            name: "carriage_model",
            display_name: "车厢车型",
            category: TableCategory::System,
            tooltip: None,
            storage_table: "carriage_model",
            composite: None,
            fields: vec![
                F::new("name", "名称").required(),
                F::new("series_id", "系列").required().references("carriage_series"),
                F::new("type", "类型").required(),
            ],
        });
        tables.push(TableSchema {
            name: "trainset_model",
            display_name: "动车组车型",
            category: TableCategory::System,
            tooltip: None,
            storage_table: "trainset_model",
            composite: None,
            fields: vec![
                F::new("name", "名称").required(),
                F::new("series_id", "系列").required().references("trainset_series"),
                F::new("power_type_id", "动力类型").required().references("power_type"),
            ],
        });

        // ===== 模型数据表 =====
        tables.push(TableSchema {
            name: "locomotive",
            display_name: "机车模型",
            category: TableCategory::Model,
            tooltip: None,
            storage_table: "locomotive",
            composite: None,
            fields: vec![
                F::new("brand_id", "品牌").required().references("brand"),
                F::new("scale", "比例").required(),
                F::new("series_id", "系列").references("locomotive_series"),
                F::new("power_type_id", "动力").references("power_type"),
                F::new("model_id", "车型").references("locomotive_model"),
                F::new("depot_id", "配属").references("depot"),
                F::new("plaque", "挂牌"),
                F::new("color", "颜色"),
                F::new("locomotive_number", "机车号").scoped_by("scale"),
                F::new("decoder_number", "编号").scoped_by("scale"),
                F::new("chip_interface_id", "芯片接口").references("chip_interface"),
                F::new("chip_model_id", "芯片型号").references("chip_model"),
                F::new("price", "价格").price(),
                F::new("item_number", "货号"),
                F::new("purchase_date", "购买日期").date(),
                F::new("merchant_id", "购买商家").references("merchant"),
            ],
        });
        tables.push(TableSchema {
            name: "carriage",
            display_name: "车厢模型",
            category: TableCategory::Model,
            tooltip: None,
            storage_table: "carriage_set",
            composite: Some(CompositeStorage {
                item_table: "carriage_item",
                parent_fk: "carriage_set_id",
            }),
            fields: vec![
                // 套装公共字段
                F::new("brand_id", "品牌").required().references("brand").header(),
                F::new("scale", "比例").required().header(),
                F::new("series_id", "系列").references("carriage_series").header(),
                F::new("depot_id", "配属").references("depot").header(),
                F::new("train_number", "车次").header(),
                F::new("plaque", "挂牌").header(),
                F::new("item_number", "货号").header(),
                F::new("total_price", "总价").price().header(),
                F::new("purchase_date", "购买日期").date().header(),
                F::new("merchant_id", "购买商家").references("merchant").header(),
                // 车厢项字段
                F::new("model_id", "车型").references("carriage_model").item(),
                F::new("car_number", "车辆号").item(),
                F::new("color", "颜色").item(),
                F::new("lighting", "灯光").item(),
            ],
        });
        tables.push(TableSchema {
            name: "trainset",
            display_name: "动车组模型",
            category: TableCategory::Model,
            tooltip: None,
            storage_table: "trainset",
            composite: None,
            fields: vec![
                F::new("brand_id", "品牌").required().references("brand"),
                F::new("scale", "比例").required(),
                F::new("series_id", "系列").references("trainset_series"),
                F::new("power_type_id", "动力").references("power_type"),
                F::new("model_id", "车型").references("trainset_model"),
                F::new("depot_id", "配属").references("depot"),
                F::new("plaque", "挂牌"),
                F::new("color", "颜色"),
                F::new("formation", "编组"),
                F::new("trainset_number", "动车号").scoped_by("scale"),
                F::new("decoder_number", "编号"),
                F::new("head_light", "头车灯"),
                F::new("interior_light", "室内灯"),
                F::new("chip_interface_id", "芯片接口").references("chip_interface"),
                F::new("chip_model_id", "芯片型号").references("chip_model"),
                F::new("price", "价格").price(),
                F::new("item_number", "货号"),
                F::new("purchase_date", "购买日期").date(),
                F::new("merchant_id", "购买商家").references("merchant"),
            ],
        });
        tables.push(TableSchema {
            name: "locomotive_head",
            display_name: "先头车模型",
            category: TableCategory::Model,
            tooltip: None,
            storage_table: "locomotive_head",
            composite: None,
            fields: vec![
                F::new("brand_id", "品牌").required().references("brand"),
                F::new("scale", "比例").required(),
                F::new("model_id", "车型").references("trainset_model"),
                F::new("special_color", "涂装"),
                F::new("head_light", "头车灯"),
                F::new("interior_light", "室内灯"),
                F::new("price", "价格").price(),
                F::new("item_number", "货号"),
                F::new("purchase_date", "购买日期").date(),
                F::new("merchant_id", "购买商家").references("merchant"),
            ],
        });

        Self { tables }
    }
}

/// 进程级注册表单例
pub fn registry() -> &'static SchemaRegistry {
    static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SchemaRegistry::standard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_known_and_unknown_table() {
        let reg = registry();
        assert!(reg.get("brand").is_some());
        assert!(reg.get("locomotive").is_some());
        assert!(reg.get("unknown_table").is_none());
    }

    #[test]
    fn test_carriage_is_only_composite() {
        let reg = registry();
        for table in reg.all() {
            assert_eq!(table.is_composite(), table.name == "carriage");
        }
    }

    #[test]
    fn test_carriage_header_and_item_fields() {
        let reg = registry();
        let headers = reg.fields_by_role("carriage", FieldRole::Header);
        let items = reg.fields_by_role("carriage", FieldRole::Item);
        assert_eq!(headers.len(), 10);
        assert_eq!(items.len(), 4);
        assert!(headers.iter().any(|f| f.name == "train_number"));
        assert!(items.iter().any(|f| f.name == "car_number"));
    }

    #[test]
    fn test_unknown_table_fields_by_role_is_empty() {
        let reg = registry();
        assert!(reg.fields_by_role("nope", FieldRole::Header).is_empty());
    }

    #[test]
    fn test_locomotive_number_scoped_by_scale() {
        let reg = registry();
        let table = reg.get("locomotive").unwrap();
        let field = table.field("locomotive_number").unwrap();
        assert_eq!(field.unique_in_scope, Some("scale"));
        assert!(!field.unique);
    }

    #[test]
    fn test_system_tables_listed_before_model_tables() {
        let reg = registry();
        let first_model = reg
            .all()
            .iter()
            .position(|t| t.category == TableCategory::Model)
            .unwrap();
        assert!(reg.all()[..first_model]
            .iter()
            .all(|t| t.category == TableCategory::System));
        assert!(reg.all()[first_model..]
            .iter()
            .all(|t| t.category == TableCategory::Model));
    }
}
