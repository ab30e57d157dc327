//! 確定済みの単位生成規則表。
//!
//! このモジュールは、集計を終えた頻度表に対する判定と、頻度表の保存・読み込みを提供します。
//!
//! # 表の作り方
//!
//! - [`UnitRules::from_corpus_path`]: 括弧表記のコーパスを読み込んで集計する
//! - [`UnitRules::from_path`]: [`UnitRules::save`] で保存した表を読み込む
//! - [`UnitRulesBuilder`]: 木を1本ずつ与えて集計する
//!
//! 集計中の [`UnitRulesBuilder`] には判定用のメソッドがなく、
//! 集計途中の表に問い合わせることはできません。
pub(crate) mod builder;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rkyv::rancor::Error;
use rkyv::util::AlignedVec;
use rkyv::{
    access, api::serialize_using, ser::allocator::Arena, ser::sharing::Share,
    ser::writer::IoWriter, ser::Serializer, util::with_arena,
};

use crate::errors::{Result, UnitRulesError};
use crate::label::{LabelId, LabelSet};
use crate::policy::BadPairPolicy;
use crate::table::{ArchivedPairTable, PairTable};

pub use crate::rules::builder::{IngestStats, UnitRulesBuilder};

/// 頻度表ファイルを識別するマジックバイト。
///
/// "0.1" はファイル形式のバージョンで、クレートのバージョンとは独立しています。
pub const TABLE_MAGIC: &[u8] = b"UnitRulesTable 0.1\n";

const TABLE_MAGIC_LEN: usize = TABLE_MAGIC.len();
const RKYV_ALIGNMENT: usize = 16;
const PADDING_LEN: usize = (RKYV_ALIGNMENT - (TABLE_MAGIC_LEN % RKYV_ALIGNMENT)) % RKYV_ALIGNMENT;

/// 確定済みの単位生成規則表。
///
/// 読み取り専用で、複数のスレッドから同時に問い合わせることができます。
#[derive(Debug)]
pub struct UnitRules {
    table: PairTable,
    policy: BadPairPolicy,
    num_rules: usize,
}

impl UnitRules {
    pub(crate) fn from_table(table: PairTable, policy: BadPairPolicy) -> Self {
        let num_rules = table.num_nonzero();
        Self {
            table,
            policy,
            num_rules,
        }
    }

    /// `parent → child` が信頼できない単位生成規則かどうかを返します。
    ///
    /// 親の総数が0であれば常に `true` です。それ以外では、[`BadPairPolicy`] の
    /// 閾値に従って判定します。
    ///
    /// # Panics
    ///
    /// どちらかのインデックスがラベル空間の範囲外の場合。
    pub fn bad_pair(&self, parent: LabelId, child: LabelId) -> bool {
        self.policy
            .is_bad(self.table.count(parent, child), self.table.total(parent))
    }

    /// `parent → child` の出現回数を返します。
    ///
    /// # Panics
    ///
    /// どちらかのインデックスがラベル空間の範囲外の場合。
    #[inline(always)]
    pub fn tree_data(&self, parent: LabelId, child: LabelId) -> u32 {
        self.table.count(parent, child)
    }

    /// `parent` を親とする単位生成規則の総数を返します。
    ///
    /// # Panics
    ///
    /// インデックスがラベル空間の範囲外の場合。
    #[inline(always)]
    pub fn total(&self, parent: LabelId) -> u32 {
        self.table.total(parent)
    }

    /// `parent → child` が親の総数に占める割合を返します。
    ///
    /// 親の総数が0の場合は `None` を返します。
    pub fn share(&self, parent: LabelId, child: LabelId) -> Option<f64> {
        match self.total(parent) {
            0 => None,
            total => Some(f64::from(self.tree_data(parent, child)) / f64::from(total)),
        }
    }

    /// 出現回数が1以上の組の数を返します。
    pub fn num_rules(&self) -> usize {
        self.num_rules
    }

    /// ラベル空間の大きさを返します。
    pub fn num_labels(&self) -> usize {
        self.table.num_labels()
    }

    /// インデックスがラベル空間の範囲内であることを確認します。
    ///
    /// # エラー
    ///
    /// 範囲外の場合、[`UnitRulesError`] が返されます。
    pub fn check(&self, id: LabelId) -> Result<LabelId> {
        self.table.check(id)
    }

    /// 判定方針を返します。
    pub fn policy(&self) -> &BadPairPolicy {
        &self.policy
    }

    /// 判定方針を差し替えます。
    pub fn with_policy(mut self, policy: BadPairPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 内部の頻度表を返します。
    pub fn table(&self) -> &PairTable {
        &self.table
    }

    /// 出現した組を出現回数の多い順に返します。
    ///
    /// 回数が同じ組は `(parent, child)` の昇順に並びます。
    pub fn ranked_pairs(&self) -> Vec<(LabelId, LabelId, u32)> {
        let mut pairs: Vec<_> = self.table.iter_nonzero().collect();
        pairs.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (a.0, a.1).cmp(&(b.0, b.1))));
        pairs
    }

    /// 別のシャードから作った表を加算した新しい表を返します。
    ///
    /// 判定方針は `self` のものを引き継ぎます。
    ///
    /// # エラー
    ///
    /// - ラベル空間の大きさが異なる場合、[`UnitRulesError::ShapeMismatch`] が返されます。
    /// - 加算後の総数が `u32` の範囲を超える場合、[`UnitRulesError::CountOverflow`] が返されます。
    pub fn merge(self, other: &UnitRules) -> Result<Self> {
        let mut table = self.table;
        table.merge(&other.table)?;
        Ok(Self::from_table(table, self.policy))
    }

    /// 括弧表記のコーパスファイルを読み込み、集計を確定させます。
    ///
    /// # 引数
    ///
    /// * `path` - コーパスファイルのパス
    /// * `labels` - ラベルの対応表。表の大きさには `labels.capacity()` が使われます。
    /// * `policy` - 判定方針
    ///
    /// # エラー
    ///
    /// - ファイルを開けない場合、I/Oエラーが返されます。
    /// - コーパスの過半数が壊れている場合、[`UnitRulesError::CorpusCorrupt`] が返されます。
    pub fn from_corpus_path<P>(
        path: P,
        labels: &mut LabelSet,
        policy: BadPairPolicy,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = open_file(path.as_ref())?;
        let mut builder = UnitRulesBuilder::new(labels.capacity())?;
        builder.read_trees(file, labels)?;
        Ok(builder.finish_with_policy(policy))
    }

    /// 頻度表を`rkyv`フォーマットでライターに書き出します。
    ///
    /// 出力は [`UnitRules::read`] で読み込むことができます。
    ///
    /// # エラー
    ///
    /// - 書き込みに失敗した場合(例: I/Oエラー)。
    /// - `rkyv`シリアライゼーションでエラーが発生した場合。
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(TABLE_MAGIC)?;

        let padding_bytes = vec![0xFF; PADDING_LEN];
        wtr.write_all(&padding_bytes)?;

        with_arena(|arena: &mut Arena| {
            let writer = IoWriter::new(&mut wtr);
            let mut serializer = Serializer::new(writer, arena.acquire(), Share::new());
            serialize_using::<_, Error>(&self.table, &mut serializer)
        })
        .map_err(|e| {
            UnitRulesError::invalid_state("rkyv serialization failed".to_string(), e.to_string())
        })?;

        wtr.flush()?;
        Ok(())
    }

    /// [`UnitRules::write`] の出力から頻度表を読み込みます。
    ///
    /// 判定方針は既定値になります。変更するには [`UnitRules::with_policy`] を使ってください。
    ///
    /// # 引数
    ///
    /// * `rdr` - 頻度表データのリーダー
    /// * `num_labels` - 期待されるラベル空間の大きさ
    ///
    /// # エラー
    ///
    /// - マジックナンバーが一致しない場合。
    /// - データが破損している場合。
    /// - 表の大きさが `num_labels` と異なる場合、[`UnitRulesError::ShapeMismatch`] が返されます。
    pub fn read<R>(mut rdr: R, num_labels: usize) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; TABLE_MAGIC_LEN];
        rdr.read_exact(&mut magic)?;
        if magic != TABLE_MAGIC {
            return Err(UnitRulesError::invalid_argument(
                "rdr",
                "The magic number of the input table mismatches.",
            ));
        }

        let mut padding_buf = vec![0; PADDING_LEN];
        rdr.read_exact(&mut padding_buf)?;

        let mut buffer = Vec::new();
        rdr.read_to_end(&mut buffer)?;

        let mut aligned_bytes: AlignedVec = AlignedVec::with_capacity(buffer.len());
        aligned_bytes.extend_from_slice(&buffer);

        let archived = access::<ArchivedPairTable, Error>(&aligned_bytes).map_err(|e| {
            UnitRulesError::invalid_format(
                "table",
                format!("rkyv validation failed. The table file may be corrupted: {e}"),
            )
        })?;
        let table = rkyv::deserialize::<PairTable, Error>(archived)?;
        table.validate()?;

        if table.num_labels() != num_labels {
            return Err(UnitRulesError::ShapeMismatch {
                expected: num_labels,
                found: table.num_labels(),
            });
        }
        log::debug!(
            "[unitrules] Loaded a table of {} labels",
            table.num_labels()
        );
        Ok(Self::from_table(table, BadPairPolicy::default()))
    }

    /// 保存済みの頻度表ファイルを読み込みます。
    ///
    /// 木の走査を行わないため、同じ表を複数回の実行で使い回す場合に高速です。
    ///
    /// # エラー
    ///
    /// - ファイルを開けない場合、I/Oエラーが返されます。
    /// - その他は [`UnitRules::read`] と同じです。
    pub fn from_path<P>(path: P, num_labels: usize) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = open_file(path.as_ref())?;
        Self::read(BufReader::new(file), num_labels)
    }

    /// 頻度表をファイルに保存します。
    ///
    /// 同じディレクトリに一時ファイルを書き出してから置き換えるため、
    /// 書き込み途中のファイルが残ることはありません。
    ///
    /// # エラー
    ///
    /// 書き込みや置き換えに失敗した場合、[`UnitRulesError`] が返されます。
    pub fn save<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(UnitRulesError::PathIsDirectory(path.to_path_buf()));
        }
        let parent_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)?;
        self.write(BufWriter::new(temp_file.as_file_mut()))?;
        temp_file.persist(path)?;
        Ok(())
    }
}

fn open_file(path: &Path) -> Result<File> {
    if path.is_dir() {
        return Err(UnitRulesError::PathIsDirectory(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_built(count: u32, other: u32) -> UnitRules {
        let mut builder = UnitRulesBuilder::new(4).unwrap();
        for _ in 0..count {
            builder.add(LabelId(0), LabelId(1)).unwrap();
        }
        for _ in 0..other {
            builder.add(LabelId(0), LabelId(2)).unwrap();
        }
        builder.finish()
    }

    #[test]
    fn test_bad_pair_zero_total() {
        let rules = hand_built(3, 0);
        for child in 0..4 {
            assert!(rules.bad_pair(LabelId(3), LabelId(child)));
        }
        assert_eq!(None, rules.share(LabelId(3), LabelId(0)));
    }

    #[test]
    fn test_bad_pair_share() {
        let policy = BadPairPolicy::default().min_count(5).min_share(0.01).unwrap();

        let rules = hand_built(1, 999).with_policy(policy);
        assert_eq!(1000, rules.total(LabelId(0)));
        assert!(rules.bad_pair(LabelId(0), LabelId(1)));

        let rules = hand_built(50, 950).with_policy(policy);
        assert_eq!(1000, rules.total(LabelId(0)));
        assert_eq!(Some(0.05), rules.share(LabelId(0), LabelId(1)));
        assert!(!rules.bad_pair(LabelId(0), LabelId(1)));
    }

    #[test]
    fn test_unseen_child_is_bad() {
        let rules = hand_built(10, 10);
        assert_eq!(0, rules.tree_data(LabelId(0), LabelId(3)));
        assert!(rules.bad_pair(LabelId(0), LabelId(3)));
        assert!(!rules.bad_pair(LabelId(0), LabelId(1)));
    }

    #[test]
    fn test_ranked_pairs() {
        let mut builder = UnitRulesBuilder::new(4).unwrap();
        builder.add(LabelId(2), LabelId(1)).unwrap();
        builder.add(LabelId(0), LabelId(3)).unwrap();
        builder.add(LabelId(1), LabelId(0)).unwrap();
        builder.add(LabelId(1), LabelId(0)).unwrap();
        let rules = builder.finish();
        assert_eq!(3, rules.num_rules());
        assert_eq!(
            vec![
                (LabelId(1), LabelId(0), 2),
                (LabelId(0), LabelId(3), 1),
                (LabelId(2), LabelId(1), 1),
            ],
            rules.ranked_pairs(),
        );
    }

    #[test]
    fn test_round_trip() {
        let rules = hand_built(7, 3);
        let mut buf = vec![];
        rules.write(&mut buf).unwrap();
        assert!(buf.starts_with(TABLE_MAGIC));
        assert_eq!(0, (TABLE_MAGIC_LEN + PADDING_LEN) % RKYV_ALIGNMENT);

        let loaded = UnitRules::read(buf.as_slice(), 4).unwrap();
        assert_eq!(rules.table(), loaded.table());
        assert_eq!(rules.num_rules(), loaded.num_rules());
    }

    #[test]
    fn test_read_shape_mismatch() {
        let rules = hand_built(1, 1);
        let mut buf = vec![];
        rules.write(&mut buf).unwrap();
        let err = UnitRules::read(buf.as_slice(), 8).unwrap_err();
        assert!(matches!(
            err,
            UnitRulesError::ShapeMismatch {
                expected: 8,
                found: 4,
            },
        ));
    }

    #[test]
    fn test_read_bad_magic() {
        let err = UnitRules::read(&b"SomeOtherTable 0.1\n\0\0\0\0\0\0\0\0\0\0\0\0\0"[..], 4).unwrap_err();
        assert!(matches!(err, UnitRulesError::InvalidArgument(_)));
    }

    #[test]
    fn test_read_truncated() {
        let rules = hand_built(2, 2);
        let mut buf = vec![];
        rules.write(&mut buf).unwrap();
        buf.truncate(buf.len() - 8);
        assert!(matches!(
            UnitRules::read(buf.as_slice(), 4),
            Err(UnitRulesError::InvalidFormat(_)),
        ));
    }

    #[test]
    fn test_merge_finalized() {
        let merged = hand_built(2, 1).merge(&hand_built(3, 4)).unwrap();
        assert_eq!(5, merged.tree_data(LabelId(0), LabelId(1)));
        assert_eq!(5, merged.tree_data(LabelId(0), LabelId(2)));
        assert_eq!(10, merged.total(LabelId(0)));

        let small = UnitRulesBuilder::new(2).unwrap().finish();
        assert!(hand_built(1, 1).merge(&small).is_err());
    }

    #[test]
    fn test_concurrent_queries() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UnitRules>();

        let rules = hand_built(20, 80);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| rules.bad_pair(LabelId(0), LabelId(1))))
                .collect();
            for handle in handles {
                assert!(!handle.join().unwrap());
            }
        });
    }
}
