//! 判定モジュール
//!
//! 保存済みの頻度表とラベル一覧を読み込み、指定されたラベルの組を判定します。

use std::fs::File;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use unitrules::errors::UnitRulesError;
use unitrules::{BadPairPolicy, LabelSet, UnitRules};

/// 判定コマンドの引数
#[derive(Parser, Debug)]
#[clap(name = "query", about = "Judges a unit rule against a table")]
pub struct Args {
    /// Table file created by the count command.
    #[clap(short = 'i', long)]
    table_in: PathBuf,

    /// Label list created by the count command.
    #[clap(short = 'l', long)]
    labels_in: PathBuf,

    /// Size of the label space.
    #[clap(short = 'n', long, default_value = "128")]
    num_labels: usize,

    /// Pairs seen fewer times than this are always judged bad.
    #[clap(long, default_value = "5")]
    min_count: u32,

    /// Pairs whose share of the parent's unit rules is below this are judged bad.
    #[clap(long, default_value = "0.01")]
    min_share: f64,

    /// Parent label.
    parent: String,

    /// Child label.
    child: String,
}

/// 判定中に発生する可能性のあるエラー
#[derive(Debug, Error)]
pub enum QueryError {
    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 判定処理エラー
    #[error("Query failed: {0}")]
    UnitRules(#[from] UnitRulesError),
}

/// 判定コマンドを実行する
///
/// 出現回数、親の総数、割合、判定結果をタブ区切りで標準出力に書き出します。
/// ラベル一覧にないラベルは出現回数0として扱います。
///
/// # エラー
///
/// ファイルの読み込みに失敗した場合や、閾値が不正な場合、`QueryError`を返します。
pub fn run(args: Args) -> Result<(), QueryError> {
    let policy = BadPairPolicy::default()
        .min_count(args.min_count)
        .min_share(args.min_share)?;
    let labels = LabelSet::from_reader(File::open(&args.labels_in)?, args.num_labels)?;
    let rules = UnitRules::from_path(&args.table_in, args.num_labels)?.with_policy(policy);

    let (count, total, bad) = match (labels.get(&args.parent), labels.get(&args.child)) {
        (Some(parent), Some(child)) => {
            let parent = rules.check(parent)?;
            let child = rules.check(child)?;
            (
                rules.tree_data(parent, child),
                rules.total(parent),
                rules.bad_pair(parent, child),
            )
        }
        (Some(parent), None) => (0, rules.total(rules.check(parent)?), true),
        _ => (0, 0, true),
    };
    let share = if total == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(total)
    };

    println!(
        "{}\t{}\t{count}\t{total}\t{share:.6}\t{}",
        args.parent,
        args.child,
        if bad { "bad" } else { "ok" }
    );
    Ok(())
}
