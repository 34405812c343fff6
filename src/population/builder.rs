//! Synthetic populations sampled from a table of attribute combinations.
//!
//! Each row of a [`ProportionTable`] is one combination of categorical values
//! (say age group and sex) with the share of the population it accounts for.
//! Agents are drawn from the rows with replacement, and each categorical value
//! is stored as an integer code, assigned per column in order of first
//! appearance in the table.

use std::fs::File;
use std::path::Path;

use approx::abs_diff_eq;
use indexmap::IndexMap;
use log::debug;

use super::{AttributeValues, Population};
use crate::error::EpinetError;
use crate::rand::distr::weighted::WeightedIndex;
use crate::random::Stream;

/// Name of the CSV column holding the row proportions.
const PROPORTION_COLUMN: &str = "proportion";

/// Value to integer code, per attribute column.
pub type CategoryCodes = IndexMap<String, IndexMap<String, i64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProportionTable {
    columns: Vec<String>,
    rows: Vec<(Vec<String>, f64)>,
}

impl ProportionTable {
    #[must_use]
    pub fn new<S: AsRef<str>>(columns: &[S]) -> ProportionTable {
        ProportionTable {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row<S: AsRef<str>>(
        &mut self,
        values: &[S],
        proportion: f64,
    ) -> Result<(), EpinetError> {
        if values.len() != self.columns.len() {
            return Err(EpinetError::SizeMismatch {
                what: "proportion table row".to_string(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        if !(0.0..=1.0).contains(&proportion) {
            return Err(EpinetError::InvalidProbability(proportion));
        }
        self.rows.push((
            values.iter().map(|v| v.as_ref().to_string()).collect(),
            proportion,
        ));
        Ok(())
    }

    /// Reads a CSV file with a header row. The `proportion` column holds the
    /// row shares; every other column is a categorical attribute.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<ProportionTable, EpinetError> {
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers = reader.headers()?.clone();
        let proportion_index = headers
            .iter()
            .position(|h| h == PROPORTION_COLUMN)
            .ok_or_else(|| EpinetError::UnknownAttribute(PROPORTION_COLUMN.to_string()))?;
        let columns: Vec<&str> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != proportion_index)
            .map(|(_, h)| h)
            .collect();

        let mut table = ProportionTable::new(&columns);
        for record in reader.records() {
            let record = record?;
            let proportion: f64 = record
                .get(proportion_index)
                .unwrap_or_default()
                .trim()
                .parse()
                .map_err(|e| {
                    EpinetError::InvalidParameter(format!("bad proportion in {record:?}: {e}"))
                })?;
            let values: Vec<&str> = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != proportion_index)
                .map(|(_, v)| v)
                .collect();
            table.add_row(&values, proportion)?;
        }
        Ok(table)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Integer codes of every categorical value, in first-appearance order.
    #[must_use]
    pub fn codes(&self) -> CategoryCodes {
        let mut codes: CategoryCodes = self
            .columns
            .iter()
            .map(|c| (c.clone(), IndexMap::new()))
            .collect();
        for (values, _) in &self.rows {
            for (column, value) in self.columns.iter().zip(values) {
                if let Some(column_codes) = codes.get_mut(column) {
                    let next = i64::try_from(column_codes.len()).unwrap_or(i64::MAX);
                    column_codes.entry(value.clone()).or_insert(next);
                }
            }
        }
        codes
    }
}

impl Population {
    /// Samples `size` agents from the rows of `table`, with replacement and
    /// weighted by the row proportions, which must sum to 1.
    ///
    /// Returns the population together with the code assigned to each
    /// categorical value.
    pub fn from_proportions(
        table: &ProportionTable,
        size: usize,
        stream: &mut Stream,
    ) -> Result<(Population, CategoryCodes), EpinetError> {
        if table.is_empty() {
            return Err(EpinetError::InvalidParameter(
                "proportion table has no rows".to_string(),
            ));
        }
        let total: f64 = table.rows.iter().map(|(_, p)| p).sum();
        if !abs_diff_eq!(total, 1.0, epsilon = 1e-6) {
            return Err(EpinetError::InvalidParameter(format!(
                "proportions sum to {total}, not 1"
            )));
        }

        let codes = table.codes();
        let row_codes: Vec<Vec<i64>> = table
            .rows
            .iter()
            .map(|(values, _)| {
                table
                    .columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| codes[column][value])
                    .collect()
            })
            .collect();

        let index = WeightedIndex::new(table.rows.iter().map(|(_, p)| *p))
            .map_err(|e| EpinetError::InvalidParameter(format!("proportions: {e}")))?;
        let mut columns: Vec<Vec<i64>> = vec![Vec::with_capacity(size); table.columns.len()];
        for _ in 0..size {
            let row = stream.sample_distr(&index);
            for (column, code) in columns.iter_mut().zip(&row_codes[row]) {
                column.push(*code);
            }
        }

        let mut population = Population::new(size);
        for (label, values) in table.columns.iter().zip(columns) {
            population.add_attribute(label, AttributeValues::Integer(values))?;
        }
        debug!(
            "sampled {size} agents from {} attribute combinations",
            table.len()
        );
        Ok((population, codes))
    }
}
