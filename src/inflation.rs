//! CPI-based inflation adjustment.
//!
//! Factors convert a dollar amount from its grant year into `currency_year`
//! dollars using CPI-U annual averages (1982-84 = 100). The built-in table
//! can be replaced with a YAML file of `year: index` pairs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use once_cell::sync::Lazy;

use crate::config::load_yaml;
use crate::error::PipelineError;

/// CPI-U, U.S. city average, all items, annual average.
static CPI_U_ANNUAL: Lazy<BTreeMap<i32, f64>> = Lazy::new(|| {
    [
        (1990, 130.7),
        (1991, 136.2),
        (1992, 140.3),
        (1993, 144.5),
        (1994, 148.2),
        (1995, 152.4),
        (1996, 156.9),
        (1997, 160.5),
        (1998, 163.0),
        (1999, 166.6),
        (2000, 172.2),
        (2001, 177.1),
        (2002, 179.9),
        (2003, 184.0),
        (2004, 188.9),
        (2005, 195.3),
        (2006, 201.6),
        (2007, 207.342),
        (2008, 215.303),
        (2009, 214.537),
        (2010, 218.056),
        (2011, 224.939),
        (2012, 229.594),
        (2013, 232.957),
        (2014, 236.736),
        (2015, 237.017),
        (2016, 240.007),
        (2017, 245.120),
        (2018, 251.107),
        (2019, 255.657),
        (2020, 258.811),
        (2021, 270.970),
        (2022, 292.655),
        (2023, 304.702),
        (2024, 313.689),
    ]
    .into_iter()
    .collect()
});

/// Year-indexed price levels.
#[derive(Debug, Clone)]
pub struct CpiTable {
    index: BTreeMap<i32, f64>,
}

impl Default for CpiTable {
    fn default() -> Self {
        Self {
            index: CPI_U_ANNUAL.clone(),
        }
    }
}

impl CpiTable {
    pub fn new(index: BTreeMap<i32, f64>) -> Self {
        Self { index }
    }

    /// Load a `year: index` YAML file.
    pub fn from_yaml(path: &Path) -> Result<Self, PipelineError> {
        Ok(Self::new(load_yaml(path)?))
    }

    fn level(&self, year: i32) -> Result<f64, PipelineError> {
        self.index
            .get(&year)
            .copied()
            .ok_or(PipelineError::MissingCpiYear(year))
    }

    /// Multiplier taking `year` dollars to `currency_year` dollars.
    pub fn factor(&self, year: i32, currency_year: i32) -> Result<f64, PipelineError> {
        Ok(self.level(currency_year)? / self.level(year)?)
    }

    /// Factors for each distinct year in `years`, so per-row adjustment is
    /// a lookup.
    ///
    /// # Arguments
    ///
    /// * `years` - grant years; repeats are fine
    /// * `currency_year` - year whose dollars the factors convert into
    ///
    /// # Returns
    ///
    /// One factor per distinct year. Only `currency_year` and years that
    /// occur need an index; gaps between them are never looked up.
    pub fn factors<I>(&self, years: I, currency_year: i32) -> Result<BTreeMap<i32, f64>, PipelineError>
    where
        I: IntoIterator<Item = i32>,
    {
        let target = self.level(currency_year)?;
        years
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|y| Ok((y, target / self.level(y)?)))
            .collect()
    }
}
