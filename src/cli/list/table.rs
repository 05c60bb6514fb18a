//! Plain-text tables for listings.
//!
//! Every row splits into exactly one field per column under `awk` or
//! `cut -w`: empty cells print as `-`, and whitespace inside a cell (a
//! declared model id, a feature value) is replaced by `_`. Numeric columns
//! can be right-aligned.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Right,
}

struct Column {
    name: &'static str,
    align: Align,
}

pub(crate) struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
    print_header: bool,
}

pub(crate) fn awk_safe(cell: &str) -> String {
    if cell.is_empty() {
        return "-".to_string();
    }

    cell.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

impl Table {
    pub(crate) fn new<H: IntoIterator<Item = &'static str>>(header: H) -> Table {
        Table {
            columns: header
                .into_iter()
                .map(|name| Column {
                    name,
                    align: Align::Left,
                })
                .collect(),
            rows: Vec::new(),
            print_header: true,
        }
    }

    /// Right-aligns the named columns.
    pub(crate) fn align_right(mut self, names: &[&str]) -> Table {
        for column in &mut self.columns {
            if names.contains(&column.name) {
                column.align = Align::Right;
            }
        }

        self
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    /// Appends a row. Rows are built next to their header, so a wrong cell
    /// count is a bug.
    pub(crate) fn add_row<R, S>(&mut self, row: R)
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let row: Vec<String> = row.into_iter().map(|cell| awk_safe(cell.as_ref())).collect();

        assert_eq!(
            row.len(),
            self.columns.len(),
            "table has {} columns but a row with {} cells was added",
            self.columns.len(),
            row.len()
        );

        self.rows.push(row);
    }

    fn header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }

    fn widths(&self, header: &[String]) -> Vec<usize> {
        let mut widths: Vec<usize> = match self.print_header {
            true => header.iter().map(|name| name.chars().count()).collect(),
            false => vec![0; self.columns.len()],
        };

        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        let widths = self.widths(&header);

        let header = self.print_header.then_some(&header);

        for row in header.into_iter().chain(&self.rows) {
            let last = row.len().saturating_sub(1);

            for (i, (cell, column)) in row.iter().zip(&self.columns).enumerate() {
                let width = widths[i];

                match column.align {
                    Align::Right => write!(f, "{:>width$}", cell, width = width)?,
                    // No trailing padding on the last column.
                    Align::Left if i == last => f.write_str(cell)?,
                    Align::Left => write!(f, "{:<width$}", cell, width = width)?,
                }

                if i != last {
                    f.write_str("  ")?;
                }
            }

            writeln!(f)?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}
