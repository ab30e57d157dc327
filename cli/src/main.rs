//! 単位生成規則表を操作するコマンドラインツール
//!
//! ツリーバンクからの頻度表の作成、シャードごとの表の統合、
//! ラベルの組に対する判定、表の統計表示をサブコマンドとして提供します。

mod count;
mod merge;
mod query;
mod stats;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::{count::CountError, merge::MergeError, query::QueryError, stats::StatsError};

/// コマンドライン引数の構造体
#[derive(Parser, Debug)]
#[clap(name = "unitrules", version)]
struct Cli {
    /// 実行するサブコマンド
    #[clap(subcommand)]
    command: Command,
}

/// 利用可能なサブコマンド
#[derive(Subcommand, Debug)]
enum Command {
    /// ツリーバンクから頻度表を作成します
    Count(count::Args),

    /// 別々に作成した頻度表を加算します
    Merge(merge::Args),

    /// ラベルの組が信頼できない単位生成規則かどうかを判定します
    Query(query::Args),

    /// 頻度表の統計を表示します
    Stats(stats::Args),
}

/// 実行中に発生する可能性のあるエラー
///
/// 各サブコマンドで発生したエラーをラップします。
#[derive(Debug, Error)]
pub enum CliError {
    /// 頻度表作成中のエラー
    #[error(transparent)]
    CountError(#[from] CountError),
    /// 頻度表統合中のエラー
    #[error(transparent)]
    MergeError(#[from] MergeError),
    /// 判定中のエラー
    #[error(transparent)]
    QueryError(#[from] QueryError),
    /// 統計表示中のエラー
    #[error(transparent)]
    StatsError(#[from] StatsError),
}

/// メイン関数
///
/// ロガーを初期化し、指定されたサブコマンドを実行します。
/// ログの出力レベルは環境変数 `RUST_LOG` で指定できます。
fn main() -> Result<(), CliError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Count(args) => Ok(count::run(args)?),
        Command::Merge(args) => Ok(merge::run(args)?),
        Command::Query(args) => Ok(query::run(args)?),
        Command::Stats(args) => Ok(stats::run(args)?),
    }
}
