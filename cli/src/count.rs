//! 頻度表作成モジュール
//!
//! ツリーバンクを読み込んで単位生成規則を数え上げ、頻度表とラベル一覧を保存します。

use std::fs::File;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use unitrules::errors::UnitRulesError;
use unitrules::{LabelSet, TreeReaderOptions, UnitRulesBuilder};

/// 頻度表作成コマンドの引数
#[derive(Parser, Debug)]
#[clap(name = "count", about = "Unit rule counter")]
pub struct Args {
    /// Treebank files in the Penn Treebank bracket format. Can be given multiple times.
    #[clap(short = 't', long, required = true)]
    corpus: Vec<PathBuf>,

    /// A file to which the table is output.
    #[clap(short = 'o', long)]
    table_out: PathBuf,

    /// A file to which the label list is output, one label per line.
    #[clap(short = 'l', long)]
    labels_out: PathBuf,

    /// An existing label list. Indices of the listed labels are preserved.
    #[clap(long)]
    labels_in: Option<PathBuf>,

    /// Size of the label space.
    #[clap(short = 'n', long, default_value = "128")]
    num_labels: usize,

    /// Label given to the unlabeled outermost bracket.
    #[clap(long, default_value = "ROOT")]
    root_label: String,

    /// Keeps function tags such as NP-SBJ.
    #[clap(long)]
    keep_function_tags: bool,

    /// Keeps -NONE- elements.
    #[clap(long)]
    keep_empty_elements: bool,
}

/// 頻度表作成中に発生する可能性のあるエラー
#[derive(Debug, Error)]
pub enum CountError {
    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 集計処理エラー
    #[error("Counting failed: {0}")]
    UnitRules(#[from] UnitRulesError),
}

/// 頻度表作成コマンドを実行する
///
/// # エラー
///
/// ファイルの読み書きや集計に失敗した場合、`CountError`を返します。
pub fn run(args: Args) -> Result<(), CountError> {
    let mut labels = match &args.labels_in {
        Some(path) => LabelSet::from_reader(File::open(path)?, args.num_labels)?,
        None => LabelSet::new(args.num_labels)?,
    };
    let options = TreeReaderOptions::default()
        .root_label(args.root_label)
        .strip_function_tags(!args.keep_function_tags)
        .remove_empty_elements(!args.keep_empty_elements);

    let mut builder = UnitRulesBuilder::new(args.num_labels)?;
    for path in &args.corpus {
        eprintln!("Reading {}...", path.display());
        let stats = builder.read_trees_with_options(File::open(path)?, &mut labels, options.clone())?;
        eprintln!(
            "  {} trees, {} skipped",
            stats.num_trees, stats.num_skipped
        );
    }

    let rules = builder.finish();
    eprintln!(
        "Found {} distinct unit rules over {} labels",
        rules.num_rules(),
        labels.len()
    );

    eprintln!("Writing the table to {}...", args.table_out.display());
    rules.save(&args.table_out)?;

    eprintln!("Writing labels to {}...", args.labels_out.display());
    labels.write(File::create(&args.labels_out)?)?;

    Ok(())
}
