// ==========================================
// 合购后台系统 - 账期 (Competência)
// ==========================================
// 账期 = 自然月桶，字符串形式 YYYY-MM
// 数据库以 TEXT 存储，字典序与时间序一致
// ==========================================

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Competence {
    year: i32,
    month: u32, // 1..=12
}

impl Competence {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// 日期所在账期
    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// 今天所在账期（本地时区）
    pub fn current() -> Self {
        Self::of_date(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// 向后平移 n 个月
    pub fn add_months(&self, months: u32) -> Self {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.checked_add_months(Months::new(months)))
            .map(|d| Self {
                year: d.year(),
                month: d.month(),
            })
            .unwrap_or(*self)
    }
}

impl fmt::Display for Competence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Competence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| format!("账期格式错误（期望 YYYY-MM）: {}", trimmed))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("账期年份无效: {}", trimmed))?;
        let month: u32 = month
            .get(..2)
            .unwrap_or(month)
            .parse()
            .map_err(|_| format!("账期月份无效: {}", trimmed))?;
        Competence::new(year, month).ok_or_else(|| format!("账期月份越界: {}", trimmed))
    }
}

impl Serialize for Competence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Competence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_months_crosses_year() {
        let c = Competence::new(2024, 11).unwrap();
        assert_eq!(c.add_months(0).to_string(), "2024-11");
        assert_eq!(c.add_months(2).to_string(), "2025-01");
        assert_eq!(c.add_months(14).to_string(), "2026-01");
        assert_eq!(c.add_months(121).to_string(), "2034-12");
    }

    #[test]
    fn test_parse_and_order() {
        let a: Competence = "2024-03".parse().unwrap();
        let b: Competence = "2024-12".parse().unwrap();
        assert!(a < b);
        assert_eq!(a.month(), 3);
        assert!("2024-13".parse::<Competence>().is_err());
        assert!("202403".parse::<Competence>().is_err());
        // 允许带日的日期字符串
        assert_eq!("2024-03-15".parse::<Competence>().unwrap(), a);
    }

    #[test]
    fn test_of_date() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(Competence::of_date(d).to_string(), "2024-01");
    }
}
