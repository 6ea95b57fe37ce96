// ==========================================
// 合购后台系统 - 命令行入口
// ==========================================
// 用法: consorcio-backoffice <arquivo> [--db <caminho>]
// 输出: stdout 打印 JSON 导入结果；日志走 stderr
// ==========================================

use anyhow::{bail, Context};
use consorcio_backoffice::{logging, ImportApi, APP_NAME, VERSION};
use std::path::PathBuf;

const DB_PATH_ENV: &str = "CONSORCIO_DB_PATH";
const DB_FILE_NAME: &str = "consorcio_backoffice.db";

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    file: PathBuf,
    db_path: Option<String>,
}

fn parse_args<I>(args: I) -> anyhow::Result<CliArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut file = None;
    let mut db_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = args.next().context("--db requer um caminho")?;
                db_path = Some(value);
            }
            flag if flag.starts_with("--") => bail!("opção desconhecida: {}", flag),
            _ if file.is_none() => file = Some(PathBuf::from(arg)),
            _ => bail!("argumento inesperado: {}", arg),
        }
    }

    let file = file.context("uso: consorcio-backoffice <arquivo> [--db <caminho>]")?;
    Ok(CliArgs { file, db_path })
}

/// 默认数据库路径: 环境变量 → 用户数据目录 → 当前目录
fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(DB_FILE_NAME);
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("consorcio-backoffice");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;
    let db_path = args.db_path.clone().unwrap_or_else(default_db_path);

    tracing::info!("{} v{}", APP_NAME, VERSION);
    tracing::info!(db_path = %db_path, file = %args.file.display(), "开始导入");

    let api = ImportApi::new(&db_path).with_context(|| format!("无法打开数据库: {}", db_path))?;
    let response = api
        .import_file(&args.file)
        .await
        .with_context(|| format!("导入失败: {}", args.file.display()))?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.import.success {
        std::process::exit(2);
    }
    Ok(())
}
