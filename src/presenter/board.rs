//! 统计面板 - 上一次渲染出的统计行
//!
//! 新的统计与已渲染的行比较, 只产生有变化的行, 界面层据此增量更新。

use super::Tally;

pub const PANEL_TITLE: &str = "识别结果输出区";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyRow {
    pub label: String,
    pub count: u32,
}

impl TallyRow {
    pub fn id_text(&self) -> String {
        format!("目标id: {}", self.label)
    }

    pub fn count_text(&self) -> String {
        format!("目标数量: {}", self.count)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowChange {
    Insert { index: usize, row: TallyRow },
    Update { index: usize, row: TallyRow },
    Remove { label: String },
}

impl RowChange {
    /// 把变化应用到一份已渲染的行上
    pub fn apply_to(&self, rows: &mut Vec<TallyRow>) {
        match self {
            RowChange::Remove { label } => rows.retain(|row| &row.label != label),
            RowChange::Insert { index, row } | RowChange::Update { index, row } => {
                rows.retain(|old| old.label != row.label);
                let index = (*index).min(rows.len());
                rows.insert(index, row.clone());
            }
        }
    }
}

#[derive(Debug)]
pub struct TallyBoard {
    rows: Vec<TallyRow>,
    max_rows: usize,
}

impl TallyBoard {
    pub fn new(max_rows: usize) -> Self {
        Self {
            rows: Vec::new(),
            max_rows: max_rows.max(1),
        }
    }

    pub fn rows(&self) -> &[TallyRow] {
        &self.rows
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// 用新的统计替换面板内容, 返回变化的行
    ///
    /// 行数超过上限时丢弃最早的行
    pub fn apply(&mut self, tally: &Tally) -> Vec<RowChange> {
        let skip = tally.len().saturating_sub(self.max_rows);
        let next: Vec<TallyRow> = tally
            .iter()
            .skip(skip)
            .map(|(label, count)| TallyRow {
                label: label.to_string(),
                count,
            })
            .collect();

        let mut changes = Vec::new();
        let mut work: Vec<TallyRow> = Vec::with_capacity(self.rows.len());
        for old in &self.rows {
            if next.iter().any(|row| row.label == old.label) {
                work.push(old.clone());
            } else {
                changes.push(RowChange::Remove {
                    label: old.label.clone(),
                });
            }
        }
        for (index, row) in next.iter().enumerate() {
            if work.get(index) == Some(row) {
                continue;
            }
            let change = if work.iter().any(|old| old.label == row.label) {
                RowChange::Update {
                    index,
                    row: row.clone(),
                }
            } else {
                RowChange::Insert {
                    index,
                    row: row.clone(),
                }
            };
            change.apply_to(&mut work);
            changes.push(change);
        }

        self.rows = next;
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, count: u32) -> TallyRow {
        TallyRow {
            label: label.to_string(),
            count,
        }
    }

    #[test]
    fn test_first_apply_inserts_rows() {
        let mut board = TallyBoard::new(20);
        let changes = board.apply(&Tally::from_labels(&["CA001", "CA001", "CB002"]));
        assert_eq!(
            changes,
            vec![
                RowChange::Insert { index: 0, row: row("CA001", 2) },
                RowChange::Insert { index: 1, row: row("CB002", 1) },
            ]
        );
        assert_eq!(board.rows()[0].id_text(), "目标id: CA001");
        assert_eq!(board.rows()[0].count_text(), "目标数量: 2");
    }

    #[test]
    fn test_reapply_is_idempotent() {
        let mut board = TallyBoard::new(20);
        let tally = Tally::from_labels(&["CA001", "CA001", "CB002"]);
        board.apply(&tally);
        let rows = board.rows().to_vec();
        assert!(board.apply(&tally).is_empty());
        assert_eq!(board.rows(), rows.as_slice());
    }

    #[test]
    fn test_diff_updates_and_removes() {
        let mut board = TallyBoard::new(20);
        board.apply(&Tally::from_labels(&["CA001", "CB002"]));
        let changes = board.apply(&Tally::from_labels(&["CA001", "CA001"]));
        assert_eq!(
            changes,
            vec![
                RowChange::Remove { label: "CB002".to_string() },
                RowChange::Update { index: 0, row: row("CA001", 2) },
            ]
        );
    }

    #[test]
    fn test_replaying_changes_rebuilds_rows() {
        let mut board = TallyBoard::new(20);
        let mut rendered: Vec<TallyRow> = Vec::new();
        let sequences: [&[&str]; 4] = [
            &["CA001", "CB002", "CC003"],
            &["CB002", "CA001", "CC003", "CC003"],
            &["CD004", "CA001"],
            &["CA001", "CD004", "CB002"],
        ];
        for labels in sequences {
            for change in board.apply(&Tally::from_labels(labels)) {
                change.apply_to(&mut rendered);
            }
            assert_eq!(rendered.as_slice(), board.rows());
        }
    }

    #[test]
    fn test_row_limit_drops_oldest() {
        let mut board = TallyBoard::new(3);
        board.apply(&Tally::from_labels(&["CA001", "CA002", "CA003", "CA004", "CA005"]));
        let labels: Vec<&str> = board.rows().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["CA003", "CA004", "CA005"]);
    }
}
