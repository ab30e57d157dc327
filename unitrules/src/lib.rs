//! # unitrules
//!
//! 句構造木コーパス(ツリーバンク)から単位生成規則の頻度表を作成し、
//! 親ラベルと子ラベルの組が信頼できる文法規則かどうかを判定するライブラリです。
//!
//! ## 概要
//!
//! 単位生成規則とは、非終端記号がちょうど1つの非終端記号に書き換わる規則 `A → B` です。
//! コーパス中の出現回数が少ない組は、注釈の揺れや退化した解析に由来する可能性が高いため、
//! パーザーはこの表を使って単項の展開を抑制できます。
//!
//! ## 主な機能
//!
//! - **頻度表の集計**: 括弧表記のコーパスを読み込み、`(親, 子)` ごとの出現回数を数える
//! - **信頼性の判定**: 出現回数と親の総数に占める割合に基づく判定
//! - **保存と読み込み**: rkyvフォーマットによる頻度表の保存
//! - **シャードの統合**: 分割して集計した表の加算
//!
//! ## 使用例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use unitrules::{BadPairPolicy, LabelSet, UnitRulesBuilder};
//!
//! let corpus = "\
//! (S (NP (DT The) (NN cat)) (VP (VBZ sleeps)))
//! (S (NP (PRP It)) (VP (VBZ purrs)))
//! ";
//!
//! let mut labels = LabelSet::new(64)?;
//! let mut builder = UnitRulesBuilder::new(64)?;
//! let stats = builder.read_trees(corpus.as_bytes(), &mut labels)?;
//! assert_eq!(stats.num_trees, 2);
//!
//! let policy = BadPairPolicy::default().min_count(2).min_share(0.1)?;
//! let rules = builder.finish_with_policy(policy);
//!
//! let vp = labels.get("VP").unwrap();
//! let vbz = labels.get("VBZ").unwrap();
//! let np = labels.get("NP").unwrap();
//! let prp = labels.get("PRP").unwrap();
//! assert_eq!(rules.tree_data(vp, vbz), 2);
//! assert!(!rules.bad_pair(vp, vbz));
//! assert!(rules.bad_pair(np, prp));
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("`target_pointer_width` must be 32 or 64");

/// エラー型の定義
pub mod errors;

/// ラベル空間
pub mod label;

/// 判定方針
pub mod policy;

/// 確定済みの単位生成規則表と集計用ビルダー
pub mod rules;

/// 頻度表
pub mod table;

/// 構文木と括弧表記リーダー
pub mod tree;


// Re-exports
pub use label::{LabelId, LabelSet};
pub use policy::BadPairPolicy;
pub use rules::{IngestStats, UnitRules, UnitRulesBuilder};
pub use tree::{Node, TreeReader, TreeReaderOptions};

/// このライブラリのバージョン番号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
