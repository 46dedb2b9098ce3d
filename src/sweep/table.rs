//! Result table produced by a sweep.
//!
//! The column schema is derived from the [`SweepConfig`] before the first row is
//! measured and never changes afterwards. Rows can only be created from the table
//! they belong to, so every row carries exactly one cell per column. Cells are
//! `Option<f64>`: an unavailable temperature reading, or a point not yet measured
//! when a sweep aborts, is `None`.

use super::config::SweepConfig;
use crate::error::{AppResult, DaqError};
use crate::measurement::{AveragedMeasurement, ParameterKind, ParameterPair, TemperatureReading};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// One column of a result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Column {
    Frequency,
    ElapsedTime,
    ProcessValue,
    SetValue,
    MajorMean(ParameterKind),
    MajorStdDev(ParameterKind),
    PairMean(ParameterPair),
    PairStdDev(ParameterPair),
}

impl Column {
    pub fn label(&self) -> String {
        match self {
            Column::Frequency => "Frequency (Hz)".to_string(),
            Column::ElapsedTime => "Time (s)".to_string(),
            Column::ProcessValue => "PV (degC)".to_string(),
            Column::SetValue => "SV (degC)".to_string(),
            Column::MajorMean(kind) => format!("{kind} Avg."),
            Column::MajorStdDev(kind) => format!("{kind} Std."),
            Column::PairMean(pair) => format!("{pair} Avg."),
            Column::PairStdDev(pair) => format!("{pair} Std."),
        }
    }
}

/// Column layout for `config`.
///
/// Key column, then PV/SV for temperature-aware modes, then for each major kind its
/// own statistics followed by one pair of columns per minor kind.
pub fn schema_for(config: &SweepConfig) -> Vec<Column> {
    let mut columns = vec![if config.mode.is_fixed_frequency() {
        Column::ElapsedTime
    } else {
        Column::Frequency
    }];
    if config.mode.uses_controller() {
        columns.push(Column::ProcessValue);
        columns.push(Column::SetValue);
    }
    for &major in &config.majors {
        if columns.contains(&Column::MajorMean(major)) {
            continue;
        }
        columns.push(Column::MajorMean(major));
        columns.push(Column::MajorStdDev(major));
        for &minor in &config.minors {
            let pair = ParameterPair::new(major, minor);
            if !columns.contains(&Column::PairMean(pair)) {
                columns.push(Column::PairMean(pair));
                columns.push(Column::PairStdDev(pair));
            }
        }
    }
    columns
}

/// One row of cells, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    cells: Vec<Option<f64>>,
    columns: Arc<[Column]>,
}

impl ResultRow {
    pub fn get(&self, column: Column) -> Option<f64> {
        self.position(column).and_then(|i| self.cells[i])
    }

    pub fn cells(&self) -> &[Option<f64>] {
        &self.cells
    }

    /// Set `column` if it is part of the schema. Returns whether it was.
    pub fn set(&mut self, column: Column, value: Option<f64>) -> bool {
        match self.position(column) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn set_temperature(&mut self, reading: Option<TemperatureReading>) {
        self.set(Column::ProcessValue, reading.map(|r| r.process_value));
        self.set(Column::SetValue, reading.map(|r| r.set_value));
    }

    /// Fill the major and pair statistics for `pair`.
    ///
    /// Several minors share one set of major columns; the latest write wins.
    pub fn set_measurement(&mut self, pair: ParameterPair, averaged: &AveragedMeasurement) {
        self.set(Column::MajorMean(pair.major), Some(averaged.major_mean));
        self.set(Column::MajorStdDev(pair.major), Some(averaged.major_std_dev));
        self.set(Column::PairMean(pair), Some(averaged.minor_mean));
        self.set(Column::PairStdDev(pair), Some(averaged.minor_std_dev));
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }
}

/// Ordered, append-only sweep output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Arc<[Column]>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    pub fn for_config(config: &SweepConfig) -> Self {
        Self::new(schema_for(config))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(Column::label).collect()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A row with every cell missing, bound to this table's schema.
    pub fn blank_row(&self) -> ResultRow {
        ResultRow {
            cells: vec![None; self.columns.len()],
            columns: self.columns.clone(),
        }
    }

    /// Append a row created by [`ResultTable::blank_row`] on a table with the same schema.
    pub fn push_row(&mut self, row: ResultRow) -> AppResult<()> {
        if row.columns != self.columns {
            return Err(DaqError::Storage(format!(
                "row schema ({} columns) does not match table schema ({} columns)",
                row.columns.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, column: Column) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.get(column)).collect()
    }

    /// Write the labelled table as CSV. Missing cells are written empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> AppResult<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.headers())?;
        for row in &self.rows {
            csv.write_record(
                row.cells
                    .iter()
                    .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
            )?;
        }
        csv.flush()?;
        Ok(())
    }
}

fn display_cell(column: Column, cell: Option<f64>) -> String {
    match (column, cell) {
        (_, None) => "-".to_string(),
        (Column::Frequency, Some(v)) => format!("{v:.0}"),
        (Column::ElapsedTime | Column::ProcessValue | Column::SetValue, Some(v)) => {
            format!("{v:.1}")
        }
        (_, Some(v)) => format!("{v:.6e}"),
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = self.headers();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&row.cells)
                    .map(|(column, cell)| display_cell(*column, *cell))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                body.iter()
                    .map(|cells| cells[i].len())
                    .chain(std::iter::once(header.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:>width$}"))
                .collect();
            writeln!(f, "{}", padded.join("  ").trim_end())
        };

        line(f, &headers)?;
        for cells in &body {
            line(f, cells)?;
        }
        Ok(())
    }
}

/// Receives the table after every appended row.
pub trait RowSink {
    fn row_appended(&mut self, table: &ResultTable) -> AppResult<()>;
}
