//! Player experience and the level table it is measured against.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum XpTableError {
    #[error("Failed to read XP table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid XP table row {line}: {reason}")]
    Parse { line: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRow {
    pub level: u32,
    pub next_required_xp: u64,
    /// Total XP needed to leave this level
    pub cumulative_xp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XpTable {
    rows: Vec<LevelRow>,
}

impl XpTable {
    pub fn new(rows: Vec<LevelRow>) -> Self {
        Self { rows }
    }

    /// Parse `level,<label>,next_required_xp,cumulative_xp` rows. The first
    /// line is a header; blank lines are skipped.
    pub fn parse(csv: &str) -> Result<Self, XpTableError> {
        let mut rows = Vec::new();

        for (index, line) in csv.lines().enumerate().skip(1) {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 1;
            let columns: Vec<&str> = line.split(',').map(str::trim).collect();
            if columns.len() < 4 {
                return Err(XpTableError::Parse {
                    line: line_no,
                    reason: format!("expected 4 columns, found {}", columns.len()),
                });
            }

            rows.push(LevelRow {
                level: parse_column(columns[0], line_no, "level")?,
                next_required_xp: parse_column(columns[2], line_no, "next_required_xp")?,
                cumulative_xp: parse_column(columns[3], line_no, "cumulative_xp")?,
            });
        }

        Ok(Self { rows })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, XpTableError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let table = Self::parse(&contents)?;
        tracing::info!(
            path = %path.as_ref().display(),
            levels = table.len(),
            "Loaded XP table"
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, level: u32) -> Option<&LevelRow> {
        self.rows.iter().find(|row| row.level == level)
    }
}

fn parse_column<T: std::str::FromStr>(raw: &str, line: usize, name: &str) -> Result<T, XpTableError> {
    raw.parse().map_err(|_| XpTableError::Parse {
        line,
        reason: format!("{} '{}' is not a number", name, raw),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpProgress {
    pub xp: u64,
    pub level: u32,
}

impl Default for XpProgress {
    fn default() -> Self {
        Self { xp: 0, level: 1 }
    }
}

impl XpProgress {
    /// Add one XP per elapsed second. Levels up at most once per call, when
    /// the total reaches the current level's cumulative threshold.
    pub fn advance(&mut self, table: &XpTable, elapsed_secs: u64) -> bool {
        self.xp = self.xp.saturating_add(elapsed_secs);

        let leveled = table
            .row(self.level)
            .is_some_and(|row| self.xp >= row.cumulative_xp);
        if leveled {
            self.level += 1;
            tracing::debug!(level = self.level, xp = self.xp, "Level up");
        }
        leveled
    }
}
