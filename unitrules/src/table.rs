//! 単位生成規則の頻度表。
//!
//! 親ラベルと子ラベルの組ごとの出現回数を、`num_labels × num_labels` の
//! 行優先の平坦な配列として保持します。親ごとの合計は行和と常に一致します。

use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{Result, UnitRulesError};
use crate::label::{LabelId, MAX_NUM_LABELS};

/// 単位生成規則 `parent → child` の頻度表
#[derive(Clone, Debug, Eq, PartialEq, Archive, Serialize, Deserialize)]
pub struct PairTable {
    num_labels: u32,
    counts: Vec<u32>,
    totals: Vec<u32>,
}

impl PairTable {
    /// ゼロで初期化された頻度表を作成します。
    ///
    /// # エラー
    ///
    /// `num_labels` が0、または [`MAX_NUM_LABELS`] を超える場合、[`UnitRulesError`] が返されます。
    pub fn new(num_labels: usize) -> Result<Self> {
        if num_labels == 0 || num_labels > MAX_NUM_LABELS {
            return Err(UnitRulesError::invalid_argument(
                "num_labels",
                format!("must be in 1..={MAX_NUM_LABELS}"),
            ));
        }
        Ok(Self {
            num_labels: u32::try_from(num_labels)?,
            counts: vec![0; num_labels * num_labels],
            totals: vec![0; num_labels],
        })
    }

    /// ラベル空間の大きさを返します。
    #[inline(always)]
    pub fn num_labels(&self) -> usize {
        self.num_labels as usize
    }

    /// インデックスがこの表の範囲内であることを確認します。
    ///
    /// # エラー
    ///
    /// 範囲外の場合、[`UnitRulesError`] が返されます。
    pub fn check(&self, id: LabelId) -> Result<LabelId> {
        if id.index() < self.num_labels() {
            Ok(id)
        } else {
            Err(UnitRulesError::invalid_argument(
                "id",
                format!("label {} is out of range 0..{}", id.get(), self.num_labels),
            ))
        }
    }

    #[inline(always)]
    fn offset(&self, parent: LabelId, child: LabelId) -> usize {
        let n = self.num_labels();
        assert!(
            parent.index() < n && child.index() < n,
            "label out of range: ({}, {}) for {n} labels",
            parent.get(),
            child.get(),
        );
        parent.index() * n + child.index()
    }

    /// `parent → child` の出現回数を返します。
    ///
    /// # Panics
    ///
    /// どちらかのインデックスが範囲外の場合。
    #[inline(always)]
    pub fn count(&self, parent: LabelId, child: LabelId) -> u32 {
        self.counts[self.offset(parent, child)]
    }

    /// `parent` を親とする単位生成規則の総数を返します。
    ///
    /// # Panics
    ///
    /// インデックスが範囲外の場合。
    #[inline(always)]
    pub fn total(&self, parent: LabelId) -> u32 {
        self.totals[parent.index()]
    }

    /// `parent → child` を1回分加算します。
    ///
    /// # エラー
    ///
    /// 親の総数が `u32` の範囲を超える場合、[`UnitRulesError::CountOverflow`] が返され、
    /// 表は変更されません。
    ///
    /// # Panics
    ///
    /// どちらかのインデックスが範囲外の場合。
    pub fn increment(&mut self, parent: LabelId, child: LabelId) -> Result<()> {
        let offset = self.offset(parent, child);
        // 回数は総数以下なので、総数が溢れなければ回数も溢れない
        let total = self.totals[parent.index()]
            .checked_add(1)
            .ok_or(UnitRulesError::CountOverflow(parent.get()))?;
        self.totals[parent.index()] = total;
        self.counts[offset] += 1;
        Ok(())
    }

    /// 別の頻度表を要素ごとに加算します。
    ///
    /// # エラー
    ///
    /// - ラベル空間の大きさが異なる場合、[`UnitRulesError::ShapeMismatch`] が返されます。
    /// - 加算後の総数が `u32` の範囲を超える場合、[`UnitRulesError::CountOverflow`] が返されます。
    ///
    /// エラーの場合、表は変更されません。
    pub fn merge(&mut self, other: &PairTable) -> Result<()> {
        if self.num_labels != other.num_labels {
            return Err(UnitRulesError::ShapeMismatch {
                expected: self.num_labels(),
                found: other.num_labels(),
            });
        }
        let totals = self
            .totals
            .iter()
            .zip(&other.totals)
            .enumerate()
            .map(|(parent, (&dst, &src))| {
                dst.checked_add(src)
                    .ok_or(UnitRulesError::CountOverflow(parent as u16))
            })
            .collect::<Result<Vec<_>>>()?;
        self.totals = totals;
        for (dst, src) in self.counts.iter_mut().zip(&other.counts) {
            *dst += src;
        }
        Ok(())
    }

    /// 出現回数が1以上の組の数を返します。
    pub fn num_nonzero(&self) -> usize {
        self.counts.iter().filter(|&&c| c != 0).count()
    }

    /// 出現回数が1以上の組を `(parent, child, count)` として列挙します。
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (LabelId, LabelId, u32)> + '_ {
        let n = self.num_labels();
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c != 0)
            .map(move |(i, &c)| (LabelId((i / n) as u16), LabelId((i % n) as u16), c))
    }

    /// 読み込んだデータの整合性を検証します。
    ///
    /// 配列の長さと、親ごとの合計が行和と一致することを確認します。
    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.num_labels();
        if n == 0 || n > MAX_NUM_LABELS {
            return Err(UnitRulesError::invalid_format(
                "table",
                format!("invalid number of labels: {n}"),
            ));
        }
        if self.counts.len() != n * n || self.totals.len() != n {
            return Err(UnitRulesError::invalid_format(
                "table",
                "array lengths do not match the number of labels",
            ));
        }
        for (parent, row) in self.counts.chunks_exact(n).enumerate() {
            let sum: u64 = row.iter().map(|&c| u64::from(c)).sum();
            if sum != u64::from(self.totals[parent]) {
                return Err(UnitRulesError::invalid_format(
                    "table",
                    format!("total of label {parent} does not match its row sum"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_keeps_row_sums() {
        let mut table = PairTable::new(4).unwrap();
        table.increment(LabelId(0), LabelId(1)).unwrap();
        table.increment(LabelId(0), LabelId(1)).unwrap();
        table.increment(LabelId(0), LabelId(3)).unwrap();
        table.increment(LabelId(2), LabelId(2)).unwrap();

        assert_eq!(2, table.count(LabelId(0), LabelId(1)));
        assert_eq!(1, table.count(LabelId(0), LabelId(3)));
        assert_eq!(0, table.count(LabelId(1), LabelId(0)));
        assert_eq!(3, table.total(LabelId(0)));
        assert_eq!(0, table.total(LabelId(1)));
        assert_eq!(1, table.total(LabelId(2)));
        assert_eq!(3, table.num_nonzero());
        table.validate().unwrap();
    }

    #[test]
    fn test_iter_nonzero() {
        let mut table = PairTable::new(3).unwrap();
        table.increment(LabelId(2), LabelId(0)).unwrap();
        table.increment(LabelId(1), LabelId(2)).unwrap();
        table.increment(LabelId(1), LabelId(2)).unwrap();
        assert_eq!(
            vec![(LabelId(1), LabelId(2), 2), (LabelId(2), LabelId(0), 1)],
            table.iter_nonzero().collect::<Vec<_>>(),
        );
    }

    #[test]
    fn test_check() {
        let table = PairTable::new(3).unwrap();
        assert!(table.check(LabelId(2)).is_ok());
        assert!(table.check(LabelId(3)).is_err());
    }

    #[test]
    #[should_panic]
    fn test_count_out_of_range() {
        let table = PairTable::new(3).unwrap();
        table.count(LabelId(0), LabelId(3));
    }

    #[test]
    fn test_merge_shape_mismatch() {
        let mut a = PairTable::new(3).unwrap();
        let b = PairTable::new(4).unwrap();
        assert!(matches!(
            a.merge(&b),
            Err(UnitRulesError::ShapeMismatch { expected: 3, found: 4 }),
        ));
    }

    #[test]
    fn test_validate_broken_total() {
        let mut table = PairTable::new(2).unwrap();
        table.increment(LabelId(0), LabelId(1)).unwrap();
        table.totals[0] = 5;
        assert!(matches!(
            table.validate(),
            Err(UnitRulesError::InvalidFormat(_)),
        ));
    }

    fn nearly_full() -> PairTable {
        PairTable {
            num_labels: 2,
            counts: vec![u32::MAX - 1, 0, 0, 1],
            totals: vec![u32::MAX - 1, 1],
        }
    }

    #[test]
    fn test_increment_overflow() {
        let mut table = nearly_full();
        table.increment(LabelId(0), LabelId(1)).unwrap();
        assert!(matches!(
            table.increment(LabelId(0), LabelId(0)),
            Err(UnitRulesError::CountOverflow(0)),
        ));
        assert_eq!(u32::MAX - 1, table.count(LabelId(0), LabelId(0)));
        assert_eq!(u32::MAX, table.total(LabelId(0)));
        table.validate().unwrap();
    }

    #[test]
    fn test_merge_overflow() {
        let mut table = nearly_full();
        let other = nearly_full();
        assert!(matches!(
            table.merge(&other),
            Err(UnitRulesError::CountOverflow(0)),
        ));
        assert_eq!(nearly_full(), table);

        let mut small = PairTable::new(2).unwrap();
        small.increment(LabelId(1), LabelId(0)).unwrap();
        table.merge(&small).unwrap();
        assert_eq!(2, table.total(LabelId(1)));
        table.validate().unwrap();
    }

    #[test]
    fn test_invalid_size() {
        assert!(PairTable::new(0).is_err());
        assert!(PairTable::new(MAX_NUM_LABELS + 1).is_err());
    }
}
