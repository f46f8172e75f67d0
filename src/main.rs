// ==========================================
// 场站过磅管理 - 命令行入口
// ==========================================
// 用法:
//   yard-weighing init
//   yard-weighing stats <yard_id> <from> <to>
//   yard-weighing history <yard_id> [limit]
//   yard-weighing export <yard_id> <from> <to> <file>
//
// 数据库路径: 环境变量 YARD_WEIGHING_DB_PATH，缺省为用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use yard_weighing::app::{get_default_db_path, AppState};
use yard_weighing::db::DATE_FORMAT;
use yard_weighing::logging;

const USAGE: &str = "用法:
  yard-weighing init
  yard-weighing stats <yard_id> <from:YYYY-MM-DD> <to:YYYY-MM-DD>
  yard-weighing history <yard_id> [limit]
  yard-weighing export <yard_id> <from:YYYY-MM-DD> <to:YYYY-MM-DD> <file>";

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first() {
        Some(c) => c.as_str(),
        None => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let db_path = get_default_db_path();
    tracing::info!("{} v{} 使用数据库: {}", yard_weighing::APP_NAME, yard_weighing::VERSION, db_path);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match (command, &args[1..]) {
        ("init", []) => {
            println!("数据库已就绪: {}", state.get_db_path());
        }
        ("stats", [yard_id, from, to]) => {
            let stats = state
                .weighing_api
                .get_statistics(parse_id(yard_id)?, parse_date(from)?, parse_date(to)?)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        ("history", [yard_id, rest @ ..]) if rest.len() <= 1 => {
            let limit = rest
                .first()
                .map(|s| s.parse::<usize>().with_context(|| format!("无效的条数: {}", s)))
                .transpose()?;
            let history = state.weighing_api.get_history_by_yard(parse_id(yard_id)?, limit)?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        ("export", [yard_id, from, to, file]) => {
            let writer = std::fs::File::create(file).with_context(|| format!("无法创建文件: {}", file))?;
            let rows = state.weighing_api.export_history_csv(
                parse_id(yard_id)?,
                parse_date(from)?,
                parse_date(to)?,
                writer,
            )?;
            println!("已导出 {} 条记录到 {}", rows, file);
        }
        _ => bail!("无法识别的命令\n{}", USAGE),
    }

    Ok(())
}

fn parse_id(s: &str) -> Result<i64> {
    s.parse::<i64>().with_context(|| format!("无效的ID: {}", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("无效的日期: {}", s))
}
