//! 頻度表を集計するビルダー。

use std::io::{BufReader, Read};
use std::ops::AddAssign;

use crate::errors::{Result, UnitRulesError};
use crate::label::{LabelId, LabelSet};
use crate::policy::BadPairPolicy;
use crate::rules::UnitRules;
use crate::table::PairTable;
use crate::tree::{Node, TreeReader, TreeReaderOptions};

/// コーパス読み込みの集計結果。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngestStats {
    /// 集計に使われた木の数
    pub num_trees: usize,

    /// 構文エラーで読み飛ばされた木の数
    pub num_skipped: usize,
}

impl IngestStats {
    /// 読み込んだトップレベル式の総数を返します。
    pub const fn total(&self) -> usize {
        self.num_trees + self.num_skipped
    }
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, rhs: Self) {
        self.num_trees += rhs.num_trees;
        self.num_skipped += rhs.num_skipped;
    }
}

/// 集計中の頻度表。
///
/// 木を与えるたびに単位生成規則を数え上げます。判定は行えず、
/// [`UnitRulesBuilder::finish`] で確定させた [`UnitRules`] からのみ問い合わせられます。
///
/// # 使用例
///
/// ```
/// use unitrules::{LabelSet, Node, UnitRulesBuilder};
///
/// let mut labels = LabelSet::new(16)?;
/// let mut builder = UnitRulesBuilder::new(16)?;
/// builder.gather_tree(&Node::parse("(S (NP (DT the) (NN rain)) (VP (VBZ falls)))")?, &mut labels)?;
/// builder.gather_tree(&Node::parse("(S (VP (VB go)))")?, &mut labels)?;
///
/// let rules = builder.finish();
/// let s = labels.get("S").unwrap();
/// let vp = labels.get("VP").unwrap();
/// assert_eq!(rules.tree_data(s, vp), 1);
/// assert!(labels.get("NN").is_none());
/// # Ok::<(), unitrules::errors::UnitRulesError>(())
/// ```
pub struct UnitRulesBuilder {
    table: PairTable,
    stats: IngestStats,
}

impl UnitRulesBuilder {
    /// ゼロで初期化されたビルダーを作成します。
    ///
    /// # 引数
    ///
    /// * `num_labels` - ラベル空間の大きさ
    ///
    /// # エラー
    ///
    /// `num_labels` が範囲外の場合、[`UnitRulesError`] が返されます。
    pub fn new(num_labels: usize) -> Result<Self> {
        Ok(Self {
            table: PairTable::new(num_labels)?,
            stats: IngestStats::default(),
        })
    }

    /// ラベル空間の大きさを返します。
    pub fn num_labels(&self) -> usize {
        self.table.num_labels()
    }

    /// これまでに読み込んだ木の集計結果を返します。
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// 単位生成規則 `parent → child` を1回分加算します。
    ///
    /// # エラー
    ///
    /// - インデックスがラベル空間の範囲外の場合、[`UnitRulesError`] が返されます。
    /// - 親の総数が `u32` の範囲を超える場合、[`UnitRulesError::CountOverflow`] が返されます。
    pub fn add(&mut self, parent: LabelId, child: LabelId) -> Result<()> {
        let parent = self.table.check(parent)?;
        let child = self.table.check(child)?;
        self.table.increment(parent, child)
    }

    /// 1本の木に含まれる単位生成規則を数え上げます。
    ///
    /// 子がちょうど1つで、その子が内部ノードであるノードだけを数えます。
    /// 単語1つを支配する品詞ノードは数えません。連鎖 `A → B → C` は
    /// `A → B` と `B → C` をそれぞれ1回ずつ数えます。
    ///
    /// ラベルは単位生成規則に現れたときに限り `labels` に登録されます。
    ///
    /// # エラー
    ///
    /// ラベル空間が足りない場合、[`UnitRulesError`] が返されます。
    pub fn gather_tree(&mut self, tree: &Node, labels: &mut LabelSet) -> Result<()> {
        let mut stack = vec![tree];
        while let Some(node) = stack.pop() {
            let Node::Internal { label, children } = node else {
                continue;
            };
            if let [Node::Internal {
                label: child_label, ..
            }] = children.as_slice()
            {
                let parent = labels.get_or_insert(label)?;
                let child = labels.get_or_insert(child_label)?;
                self.add(parent, child)?;
            }
            stack.extend(children);
        }
        Ok(())
    }

    /// 括弧表記のコーパスを既定の設定で読み込み、すべての木を集計します。
    ///
    /// 詳細は [`UnitRulesBuilder::read_trees_with_options`] を参照してください。
    pub fn read_trees<R>(&mut self, rdr: R, labels: &mut LabelSet) -> Result<IngestStats>
    where
        R: Read,
    {
        self.read_trees_with_options(rdr, labels, TreeReaderOptions::default())
    }

    /// 括弧表記のコーパスを読み込み、すべての木を集計します。
    ///
    /// 構文が壊れた木は警告を出して読み飛ばします。
    ///
    /// # 戻り値
    ///
    /// この呼び出しで読み込んだ木の集計結果
    ///
    /// # エラー
    ///
    /// - I/Oエラーが発生した場合、その時点で読み込みを中断します。
    /// - 過半数の木が壊れていた場合、[`UnitRulesError::CorpusCorrupt`] が返されます。
    /// - ラベル空間が足りない場合、[`UnitRulesError`] が返されます。
    pub fn read_trees_with_options<R>(
        &mut self,
        rdr: R,
        labels: &mut LabelSet,
        options: TreeReaderOptions,
    ) -> Result<IngestStats>
    where
        R: Read,
    {
        let mut stats = IngestStats::default();
        for tree in TreeReader::with_options(BufReader::new(rdr), options) {
            match tree {
                Ok(tree) => {
                    self.gather_tree(&tree, labels)?;
                    stats.num_trees += 1;
                }
                Err(e) if e.is_malformed_tree() => {
                    log::warn!("[unitrules] Skipping malformed tree: {e}");
                    stats.num_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        self.stats += stats;

        if stats.num_skipped * 2 > stats.total() {
            return Err(UnitRulesError::CorpusCorrupt {
                skipped: stats.num_skipped,
                total: stats.total(),
            });
        }
        log::info!(
            "[unitrules] Read {} trees ({} skipped)",
            stats.num_trees,
            stats.num_skipped,
        );
        Ok(stats)
    }

    /// 別のシャードで集計したビルダーを加算します。
    ///
    /// 両者は同じラベルの対応表を使って集計されている必要があります。
    ///
    /// # エラー
    ///
    /// ラベル空間の大きさが異なる場合、[`UnitRulesError::ShapeMismatch`] が返されます。
    pub fn merge(&mut self, other: UnitRulesBuilder) -> Result<()> {
        self.table.merge(&other.table)?;
        self.stats += other.stats;
        Ok(())
    }

    /// 既定の判定方針で集計を確定させます。
    pub fn finish(self) -> UnitRules {
        self.finish_with_policy(BadPairPolicy::default())
    }

    /// 判定方針を指定して集計を確定させます。
    pub fn finish_with_policy(self, policy: BadPairPolicy) -> UnitRules {
        let rules = UnitRules::from_table(self.table, policy);
        log::debug!(
            "[unitrules] Finished table over {} trees: {} distinct unit rules",
            self.stats.num_trees,
            rules.num_rules(),
        );
        rules
    }
}
