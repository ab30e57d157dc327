//! 頻度表統合モジュール
//!
//! 同じラベル一覧を使ってシャードごとに作成した頻度表を加算します。

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use unitrules::errors::UnitRulesError;
use unitrules::UnitRules;

/// 頻度表統合コマンドの引数
#[derive(Parser, Debug)]
#[clap(name = "merge", about = "Adds up unit rule tables built from corpus shards")]
pub struct Args {
    /// Input tables. All of them must share the same label list.
    #[clap(short = 'i', long, required = true)]
    table_in: Vec<PathBuf>,

    /// A file to which the merged table is output.
    #[clap(short = 'o', long)]
    table_out: PathBuf,

    /// Size of the label space.
    #[clap(short = 'n', long, default_value = "128")]
    num_labels: usize,
}

/// 頻度表統合中に発生する可能性のあるエラー
#[derive(Debug, Error)]
pub enum MergeError {
    /// 統合処理エラー
    #[error("Merging failed: {0}")]
    UnitRules(#[from] UnitRulesError),
}

/// 頻度表統合コマンドを実行する
///
/// # エラー
///
/// 表の読み込みに失敗した場合や、表の大きさが異なる場合、`MergeError`を返します。
pub fn run(args: Args) -> Result<(), MergeError> {
    let mut merged: Option<UnitRules> = None;
    for path in &args.table_in {
        eprintln!("Loading {}...", path.display());
        let rules = UnitRules::from_path(path, args.num_labels)?;
        merged = Some(match merged {
            Some(acc) => acc.merge(&rules)?,
            None => rules,
        });
    }

    if let Some(merged) = merged {
        eprintln!("Writing the merged table to {}...", args.table_out.display());
        merged.save(&args.table_out)?;
        eprintln!("{} distinct unit rules", merged.num_rules());
    }
    Ok(())
}
