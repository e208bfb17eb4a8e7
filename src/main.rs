// ==========================================
// 火车模型收藏管理 - 命令行入口
// ==========================================
// 子命令:
//   tables                      列出可导入表及字段配置
//   parse <文件>                查看文件结构
//   preview <文件> <配置.json>  预览导入（只读）
//   execute <文件> <配置.json>  执行导入
//   templates                   列出已保存的导入模板
// ==========================================

use anyhow::{bail, Context, Result};

use train_model_manager::config::AppConfig;
use train_model_manager::{i18n, logging, ImportApi, ImportConfig, TemplateApi, APP_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = AppConfig::load();
    i18n::set_locale(&config.locale);
    tracing::info!(app = APP_NAME, version = VERSION, db_path = %config.db_path, "启动");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    match command {
        "tables" => {
            let api = ImportApi::new(config.db_path);
            println!("{}", serde_json::to_string_pretty(&api.tables())?);
        }
        "parse" => {
            let file = arg(&args, 1, "文件路径")?;
            let api = ImportApi::new(config.db_path);
            let response = api.parse(&file).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "preview" => {
            let file = arg(&args, 1, "文件路径")?;
            let import_config = load_import_config(&arg(&args, 2, "配置文件")?)?;
            let api = ImportApi::new(config.db_path);
            let response = api.preview(&file, &import_config).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "execute" => {
            let file = arg(&args, 1, "文件路径")?;
            let import_config = load_import_config(&arg(&args, 2, "配置文件")?)?;
            let api = ImportApi::new(config.db_path);
            let response = api.execute(&file, &import_config).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.errors.is_empty() {
                bail!(i18n::t("common.failure"));
            }
        }
        "templates" => {
            let api = TemplateApi::new(config.db_path);
            let templates = api.list().await?;
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
        other => {
            print_usage();
            bail!("未知子命令: {}", other);
        }
    }

    Ok(())
}

fn arg(args: &[String], index: usize, what: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .with_context(|| format!("缺少参数: {}", what))
}

fn load_import_config(path: &str) -> Result<ImportConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("配置文件格式错误: {}", path))
}

fn print_usage() {
    println!("{} v{}", APP_NAME, VERSION);
    println!();
    println!("用法:");
    println!("  train-model-manager tables");
    println!("  train-model-manager parse <文件.xlsx>");
    println!("  train-model-manager preview <文件.xlsx> <配置.json>");
    println!("  train-model-manager execute <文件.xlsx> <配置.json>");
    println!("  train-model-manager templates");
    println!();
    println!("环境变量:");
    println!("  TMM_DB_PATH   数据库文件路径");
    println!("  TMM_LOCALE    界面语言 (zh-CN / en)");
    println!("  RUST_LOG      日志级别");
}
