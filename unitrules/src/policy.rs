//! 単位生成規則の信頼性判定の方針。

use crate::errors::{Result, UnitRulesError};

/// 信頼できない組を判定するための閾値。
///
/// `parent → child` は、出現回数が `min_count` 未満であるか、親の単位生成規則の
/// 総数に占める割合が `min_share` 未満であれば信頼できないと判定されます。
/// 親の総数が0の場合は常に信頼できません。
///
/// # 使用例
///
/// ```
/// use unitrules::BadPairPolicy;
///
/// let policy = BadPairPolicy::default().min_count(3).min_share(0.05)?;
/// assert!(policy.is_bad(2, 10));
/// assert!(policy.is_bad(4, 100));
/// assert!(!policy.is_bad(5, 100));
/// # Ok::<(), unitrules::errors::UnitRulesError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BadPairPolicy {
    min_count: u32,
    min_share: f64,
}

impl Default for BadPairPolicy {
    fn default() -> Self {
        Self {
            min_count: 5,
            min_share: 0.01,
        }
    }
}

impl BadPairPolicy {
    /// 出現回数の下限を指定します。これ未満の組は常に信頼できません。
    ///
    /// デフォルトは5です。
    pub const fn min_count(mut self, min_count: u32) -> Self {
        self.min_count = min_count;
        self
    }

    /// 親の総数に占める割合の下限を指定します。
    ///
    /// デフォルトは0.01です。
    ///
    /// # エラー
    ///
    /// 値が `[0, 1]` の範囲外またはNaNの場合、[`UnitRulesError`] が返されます。
    pub fn min_share(mut self, min_share: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&min_share) {
            return Err(UnitRulesError::invalid_argument(
                "min_share",
                "must be in [0, 1]",
            ));
        }
        self.min_share = min_share;
        Ok(self)
    }

    /// 出現回数の下限を返します。
    pub const fn get_min_count(&self) -> u32 {
        self.min_count
    }

    /// 割合の下限を返します。
    pub const fn get_min_share(&self) -> f64 {
        self.min_share
    }

    /// 組の出現回数と親の総数から、信頼できない組かどうかを判定します。
    pub fn is_bad(&self, count: u32, total: u32) -> bool {
        if total == 0 {
            return true;
        }
        count < self.min_count || f64::from(count) / f64::from(total) < self.min_share
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_total() {
        let policy = BadPairPolicy::default().min_count(0).min_share(0.0).unwrap();
        assert!(policy.is_bad(0, 0));
    }

    #[test]
    fn test_share_threshold() {
        let policy = BadPairPolicy::default().min_count(5).min_share(0.01).unwrap();
        assert!(policy.is_bad(1, 1000));
        assert!(!policy.is_bad(50, 1000));
        // 割合はちょうど下限なら信頼できる
        assert!(!policy.is_bad(10, 1000));
        assert!(policy.is_bad(9, 1000));
    }

    #[test]
    fn test_count_floor() {
        let policy = BadPairPolicy::default().min_count(5);
        // 割合が100%でも回数が足りなければ信頼できない
        assert!(policy.is_bad(4, 4));
        assert!(!policy.is_bad(5, 5));
    }

    #[test]
    fn test_invalid_share() {
        assert!(BadPairPolicy::default().min_share(-0.1).is_err());
        assert!(BadPairPolicy::default().min_share(1.5).is_err());
        assert!(BadPairPolicy::default().min_share(f64::NAN).is_err());
    }
}
