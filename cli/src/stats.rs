//! 統計表示モジュール

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use unitrules::errors::UnitRulesError;
use unitrules::{BadPairPolicy, LabelSet, UnitRules};

/// 統計表示コマンドの引数
#[derive(Parser, Debug)]
#[clap(name = "stats", about = "Shows the most frequent unit rules")]
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

    /// Pairs seen fewer times than this are judged bad.
    #[clap(long, default_value = "5")]
    min_count: u32,

    /// Pairs whose share of the parent's unit rules is below this are judged bad.
    #[clap(long, default_value = "0.01")]
    min_share: f64,

    /// Number of unit rules to show. Shows all of them if omitted.
    #[clap(long)]
    top: Option<usize>,
}

/// 統計表示中に発生する可能性のあるエラー
#[derive(Debug, Error)]
pub enum StatsError {
    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 読み込みエラー
    #[error("Loading failed: {0}")]
    UnitRules(#[from] UnitRulesError),
}

/// 統計表示コマンドを実行する
///
/// 出現回数の多い順に `親\t子\t回数\t割合\t判定` を標準出力に書き出します。
pub fn run(args: Args) -> Result<(), StatsError> {
    let policy = BadPairPolicy::default()
        .min_count(args.min_count)
        .min_share(args.min_share)?;
    let labels = LabelSet::from_reader(File::open(&args.labels_in)?, args.num_labels)?;
    let rules = UnitRules::from_path(&args.table_in, args.num_labels)?.with_policy(policy);

    eprintln!("{} distinct unit rules", rules.num_rules());

    let mut out = BufWriter::new(io::stdout().lock());
    let ranked = rules.ranked_pairs();
    let top = args.top.unwrap_or(ranked.len());
    for (parent, child, count) in ranked.into_iter().take(top) {
        let share = rules.share(parent, child).unwrap_or(0.0);
        writeln!(
            out,
            "{}\t{}\t{count}\t{share:.6}\t{}",
            labels.name(parent).unwrap_or("?"),
            labels.name(child).unwrap_or("?"),
            if rules.bad_pair(parent, child) { "bad" } else { "ok" },
        )?;
    }
    out.flush()?;
    Ok(())
}
