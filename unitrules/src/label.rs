//! ラベル空間のモジュール。
//!
//! 非終端記号のカテゴリ名を、上限付きの密な整数インデックスに対応付けます。
//! 集計処理はインデックスだけを扱い、文字列には触れません。

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use hashbrown::HashMap;

use crate::errors::{Result, UnitRulesError};

/// ラベル空間の大きさの上限。
///
/// [`LabelId`] は `u16` なので、これを超えるラベルは表現できません。
pub const MAX_NUM_LABELS: usize = u16::MAX as usize + 1;

/// 非終端記号のラベルを表すインデックス。
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct LabelId(pub u16);

impl LabelId {
    /// インデックスの値を返します。
    #[inline(always)]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// `usize` として返します。
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<usize> for LabelId {
    type Error = UnitRulesError;

    fn try_from(value: usize) -> Result<Self> {
        Ok(Self(u16::try_from(value)?))
    }
}

/// カテゴリ名とインデックスの対応表。
///
/// 登録順にインデックスが割り当てられ、`capacity` 個を超えて登録することはできません。
/// 同じテーブルを保存・読み込みする間は、対応が安定している必要があります。
#[derive(Clone, Debug)]
pub struct LabelSet {
    ids: HashMap<String, LabelId>,
    names: Vec<String>,
    capacity: usize,
}

impl LabelSet {
    /// 空の対応表を作成します。
    ///
    /// # 引数
    ///
    /// * `capacity` - 登録できるラベルの最大数
    ///
    /// # エラー
    ///
    /// `capacity` が0、または [`MAX_NUM_LABELS`] を超える場合、[`UnitRulesError`] が返されます。
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_NUM_LABELS {
            return Err(UnitRulesError::invalid_argument(
                "capacity",
                format!("must be in 1..={MAX_NUM_LABELS}"),
            ));
        }
        Ok(Self {
            ids: HashMap::new(),
            names: vec![],
            capacity,
        })
    }

    /// 登録済みのラベルを検索します。
    pub fn get(&self, name: &str) -> Option<LabelId> {
        self.ids.get(name).copied()
    }

    /// ラベルを検索し、未登録であれば新しいインデックスを割り当てます。
    ///
    /// # エラー
    ///
    /// ラベル空間が埋まっている場合、[`UnitRulesError::LabelSpaceExhausted`] が返されます。
    pub fn get_or_insert(&mut self, name: &str) -> Result<LabelId> {
        if let Some(id) = self.get(name) {
            return Ok(id);
        }
        if self.names.len() >= self.capacity {
            return Err(UnitRulesError::LabelSpaceExhausted(self.capacity));
        }
        let id = LabelId::try_from(self.names.len())?;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        Ok(id)
    }

    /// インデックスに対応するラベル名を返します。
    pub fn name(&self, id: LabelId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// 登録済みのラベル数を返します。
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// ラベルが1つも登録されていなければ `true` を返します。
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 登録できるラベルの最大数を返します。
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// インデックス順にラベル名を列挙します。
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (LabelId(i as u16), name.as_str()))
    }

    /// 1行に1ラベルの形式で書き出します。
    ///
    /// # エラー
    ///
    /// 書き込みに失敗した場合、I/Oエラーが返されます。
    pub fn write<W>(&self, wtr: W) -> Result<()>
    where
        W: Write,
    {
        let mut wtr = BufWriter::new(wtr);
        for name in &self.names {
            writeln!(&mut wtr, "{name}")?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// [`LabelSet::write`] の出力から対応表を復元します。
    ///
    /// 空行は無視されます。
    ///
    /// # エラー
    ///
    /// ラベルが重複している場合や `capacity` を超える場合、[`UnitRulesError`] が返されます。
    pub fn from_reader<R>(rdr: R, capacity: usize) -> Result<Self>
    where
        R: Read,
    {
        let mut labels = Self::new(capacity)?;
        for line in BufReader::new(rdr).lines() {
            let line = line?;
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            if labels.get(name).is_some() {
                return Err(UnitRulesError::invalid_format(
                    "labels",
                    format!("duplicate label: {name}"),
                ));
            }
            if labels.len() >= capacity {
                return Err(UnitRulesError::invalid_format(
                    "labels",
                    format!("more than {capacity} labels"),
                ));
            }
            labels.get_or_insert(name)?;
        }
        Ok(labels)
    }
}
