//! 类别统计 - 每个类别出现的次数, 按首次出现顺序排列

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, u32)>,
}

impl Tally {
    /// 重新统计 (每个检测实例计一次)
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut entries: Vec<(String, u32)> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            match entries.iter_mut().find(|(name, _)| name == label) {
                Some((_, count)) => *count += 1,
                None => entries.push((label.to_string(), 1)),
            }
        }
        Self { entries }
    }

    pub fn get(&self, label: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.entries.iter().cloned().collect()
    }
}
