//! Join compiled grants with grantmaker, recipient and geography tables.
//!
//! The merge runs in a fixed order:
//!
//! 1. pad EINs, parse amounts, add the inflation-adjusted amount
//! 2. outer-join grantmaker attributes on EIN
//! 3. inner-join the recipient-organization mapping
//! 4. left-join Carnegie institution data and apply the configured filters
//! 5. left-join school coordinates
//! 6. add state-adjacency flags and grantmaker-to-recipient distance
//!
//! Every input table is checked for the columns it must provide as soon as
//! it is read.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use itertools::Itertools;
use polars::prelude::{DataFrame, JoinType};
use tracing::{info, instrument};

use crate::config::{MergeConfig, load_yaml};
use crate::ein::pad_ein;
use crate::error::PipelineError;
use crate::frame::{
    count_truthy, format_flag, format_number, is_truthy, join, map_strings, n_unique, read_csv, require_columns,
    retain, select, set_strings, strings, table_name, unique_first, write_csv,
};
use crate::inflation::CpiTable;
use crate::spatial::distance_km_from_text;

/// State to neighbouring states, as read from YAML.
pub type NeighborStates = BTreeMap<String, Vec<String>>;

/// `"$1,500"` -> `1500.0`. Blank amounts count as zero.
pub fn parse_amount(cell: &str) -> Result<f64, PipelineError> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != '$' && *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse()
        .map_err(|_| PipelineError::InvalidAmount(cell.to_string()))
}

/// Calendar year from a cell that may have been written as a float.
pub fn parse_year(cell: &str) -> Result<i32, PipelineError> {
    let cell = cell.trim();
    cell.parse::<i32>()
        .ok()
        .or_else(|| {
            cell.parse::<f64>()
                .ok()
                .filter(|y| y.fract() == 0.0 && y.abs() < 10_000.0)
                .map(|y| y as i32)
        })
        .ok_or_else(|| PipelineError::InvalidYear(cell.to_string()))
}

/// True when either state lists the other as a neighbour.
pub fn are_neighbors(neighbors: &NeighborStates, a: &str, b: &str) -> bool {
    let lists = |x: &str, y: &str| neighbors.get(x).is_some_and(|n| n.iter().any(|s| s == y));
    lists(a, b) || lists(b, a)
}

/// Name of the inflation-adjusted amount column.
pub fn inflated_column(cfg: &MergeConfig) -> String {
    format!("{}_{}_usd", cfg.grant_grant_amt_col, cfg.currency_year)
}

/// Pad EINs, parse amounts, and append the inflation-adjusted amount.
///
/// # Arguments
///
/// * `grants` - compiled grants, one row per grant
/// * `cfg` - names the EIN, year and amount columns and the currency year
/// * `cpi` - price index covering every grant year and the currency year
///
/// # Returns
///
/// The grants with EINs padded, the amount column rewritten as a plain
/// number, and a `{amount}_{currency_year}_usd` column appended. Fails
/// with [`PipelineError::InvalidAmount`], [`PipelineError::InvalidYear`] or
/// [`PipelineError::MissingCpiYear`] on the first bad row.
pub fn prepare_grants(mut grants: DataFrame, cfg: &MergeConfig, cpi: &CpiTable) -> Result<DataFrame, PipelineError> {
    require_columns(
        &grants,
        &table_name(&cfg.grant_data),
        &[&cfg.ein_col, &cfg.grant_year_col, &cfg.grant_grant_amt_col],
    )?;
    map_strings(&mut grants, &cfg.ein_col, pad_ein)?;

    let amounts: Vec<f64> = strings(&grants, &cfg.grant_grant_amt_col)?
        .iter()
        .map(|c| parse_amount(c))
        .collect::<Result<_, _>>()?;
    let years: Vec<i32> = strings(&grants, &cfg.grant_year_col)?
        .iter()
        .map(|c| parse_year(c))
        .collect::<Result<_, _>>()?;

    let factors = cpi.factors(years.iter().copied(), cfg.currency_year)?;
    let inflated = amounts
        .iter()
        .zip(&years)
        .map(|(amount, year)| format_number(amount * factors[year]))
        .collect();

    set_strings(&mut grants, &cfg.grant_grant_amt_col, amounts.iter().map(|a| format_number(*a)).collect())?;
    set_strings(&mut grants, &inflated_column(cfg), inflated)?;
    Ok(grants)
}

fn grantmaker_columns(cfg: &MergeConfig) -> Vec<String> {
    std::iter::once(cfg.ein_col.clone())
        .chain(cfg.grantmaker_df_cols.iter().filter(|c| **c != cfg.ein_col).cloned())
        .collect()
}

/// Grantmaker table reduced to one row per padded EIN and the configured columns.
pub fn prepare_grantmakers(mut grantmakers: DataFrame, cfg: &MergeConfig) -> Result<DataFrame, PipelineError> {
    let table = table_name(&cfg.grantmaker_data_file);
    let cols = grantmaker_columns(cfg);
    require_columns(&grantmakers, &table, &cols)?;
    map_strings(&mut grantmakers, &cfg.ein_col, pad_ein)?;
    let grantmakers = unique_first(&grantmakers, &cfg.ein_col)?;
    info!(grantmakers = n_unique(&grantmakers, &cfg.ein_col)?, "Read grantmaker characteristics");
    select(&grantmakers, &table, &cols)
}

/// Grant columns carried into the organization join, first occurrence order.
pub fn projected_columns(cfg: &MergeConfig) -> Vec<String> {
    cfg.grant_df_cols
        .iter()
        .chain(&cfg.grantmaker_df_cols)
        .cloned()
        .chain(std::iter::once(inflated_column(cfg)))
        .unique()
        .collect()
}

/// Rows passing the configured filters.
pub fn apply_filters(table: DataFrame, cfg: &MergeConfig) -> Result<DataFrame, PipelineError> {
    let mut table = table;
    if cfg.keep_only_open_higher_ed_orgs {
        require_columns(&table, "merged", &[&cfg.univ_bool_col])?;
        let keep: Vec<bool> = strings(&table, &cfg.univ_bool_col)?.iter().map(|c| is_truthy(c)).collect();
        table = retain(&table, &keep)?;
    }
    if cfg.keep_only_definite_fossil_fuel {
        require_columns(&table, "merged", &[&cfg.fossil_fuel_col])?;
        let keep: Vec<bool> = strings(&table, &cfg.fossil_fuel_col)?.iter().map(|c| is_truthy(c)).collect();
        table = retain(&table, &keep)?;
    }
    if let Some(min) = cfg.min_grant_size {
        let keep: Vec<bool> = strings(&table, &cfg.grant_grant_amt_col)?
            .iter()
            .map(|c| c.parse::<f64>().is_ok_and(|amount| amount >= min))
            .collect();
        table = retain(&table, &keep)?;
    }
    info!(rows = table.height(), "Applied filters");
    Ok(table)
}

/// Append the state-adjacency flags and the distance column.
pub fn add_geography(table: &mut DataFrame, cfg: &MergeConfig, neighbors: &NeighborStates) -> Result<(), PipelineError> {
    require_columns(
        table,
        "merged",
        &[
            &cfg.recipient_state_col,
            &cfg.org_state_col,
            &cfg.recipient_lat_col,
            &cfg.recipient_lon_col,
            &cfg.org_lat_col,
            &cfg.org_lon_col,
        ],
    )?;

    let recipient_states = strings(table, &cfg.recipient_state_col)?;
    let org_states = strings(table, &cfg.org_state_col)?;
    let (neighbor, same): (Vec<bool>, Vec<bool>) = recipient_states
        .iter()
        .zip(&org_states)
        .map(|(r, g)| {
            let (r, g) = (r.trim(), g.trim());
            (are_neighbors(neighbors, r, g), !r.is_empty() && r == g)
        })
        .unzip();
    let same_or_neighbor: Vec<bool> = neighbor.iter().zip(&same).map(|(n, s)| *n || *s).collect();

    fn flags(v: &[bool], invert: bool) -> Vec<String> {
        v.iter().map(|b| format_flag(*b != invert)).collect()
    }
    set_strings(table, "neighbor_state", flags(&neighbor, false))?;
    set_strings(table, "same_state", flags(&same, false))?;
    set_strings(table, "same_or_neighbor", flags(&same_or_neighbor, false))?;
    set_strings(table, "not_same_state", flags(&same, true))?;
    set_strings(table, "not_same_or_neighbor", flags(&same_or_neighbor, true))?;

    let rlat = strings(table, &cfg.recipient_lat_col)?;
    let rlon = strings(table, &cfg.recipient_lon_col)?;
    let glat = strings(table, &cfg.org_lat_col)?;
    let glon = strings(table, &cfg.org_lon_col)?;
    let distances = (0..table.height())
        .map(|i| {
            distance_km_from_text(&rlat[i], &rlon[i], &glat[i], &glon[i])
                .map(format_number)
                .unwrap_or_default()
        })
        .collect();
    set_strings(table, "distance_km", distances)
}

/// All input tables for a merge, already read.
#[derive(Debug, Clone)]
pub struct MergeInputs {
    pub grants: DataFrame,
    pub grantmakers: DataFrame,
    pub organizations: DataFrame,
    pub carnegie: DataFrame,
    pub school_locations: DataFrame,
    pub neighbors: NeighborStates,
}

impl MergeInputs {
    /// Read every input named in `cfg`, checking each table's columns.
    pub fn load(cfg: &MergeConfig) -> Result<Self, PipelineError> {
        let inputs = Self {
            grants: read_csv(&cfg.grant_data)?,
            grantmakers: read_csv(&cfg.grantmaker_data_file)?,
            organizations: read_csv(&cfg.org_mapping_data)?,
            carnegie: read_csv(&cfg.carnegie_data)?,
            school_locations: read_csv(&cfg.school_location_file)?,
            neighbors: load_neighbor_states(&cfg.neighbor_states_info)?,
        };
        inputs.check(cfg)?;
        Ok(inputs)
    }

    /// Fail on the first table missing a column the merge reads.
    pub fn check(&self, cfg: &MergeConfig) -> Result<(), PipelineError> {
        require_columns(
            &self.grants,
            &table_name(&cfg.grant_data),
            &[&cfg.ein_col, &cfg.grant_year_col, &cfg.grant_grant_amt_col],
        )?;
        require_columns(&self.grantmakers, &table_name(&cfg.grantmaker_data_file), &grantmaker_columns(cfg))?;

        let mut org_cols: Vec<&String> = cfg.cols_to_merge_grants_and_orgs.iter().collect();
        org_cols.extend([
            &cfg.org_uid_col,
            &cfg.matched_name_col,
            &cfg.multiple_institutions_bool_col,
            &cfg.univ_bool_col,
        ]);
        require_columns(&self.organizations, &table_name(&cfg.org_mapping_data), &org_cols)?;
        require_columns(
            &self.carnegie,
            &table_name(&cfg.carnegie_data),
            &[&cfg.org_uid_col, &cfg.carnegie_name_col],
        )?;
        require_columns(
            &self.school_locations,
            &table_name(&cfg.school_location_file),
            &[&cfg.matched_name_col, &cfg.recipient_lat_col, &cfg.recipient_lon_col],
        )
    }
}

pub fn load_neighbor_states(path: &Path) -> Result<NeighborStates, PipelineError> {
    load_yaml(path)
}

/// Run the whole merge in memory.
///
/// # Arguments
///
/// * `inputs` - every table the merge reads; columns are checked first
/// * `cfg` - column names, join keys and filters
/// * `cpi` - price index for the inflation adjustment
///
/// # Returns
///
/// One row per grant whose recipient appears in the organization mapping
/// and passes the filters, with geography columns appended.
#[instrument(level = "info", skip_all)]
pub fn merge_tables(inputs: MergeInputs, cfg: &MergeConfig, cpi: &CpiTable) -> Result<DataFrame, PipelineError> {
    inputs.check(cfg)?;
    let MergeInputs {
        grants,
        grantmakers,
        organizations,
        carnegie,
        school_locations,
        neighbors,
    } = inputs;

    let grants = prepare_grants(grants, cfg, cpi)?;
    info!(rows = grants.height(), "Read grant data and inflated dollar values");

    let n_univ = count_truthy(&organizations, &cfg.univ_bool_col)?;
    let n_multi = count_truthy(&organizations, &cfg.multiple_institutions_bool_col)?;
    info!(n_univ, n_multi, "Read receiving organizations");

    let grantmakers = prepare_grantmakers(grantmakers, cfg)?;
    let ein = [cfg.ein_col.as_str()];
    let mut grants = join(&grants, &grantmakers, &ein, &ein, JoinType::Full)?;
    map_strings(&mut grants, &cfg.ein_col, pad_ein)?;

    let projected = select(&grants, &table_name(&cfg.grant_data), &projected_columns(cfg))?;
    let merge_on: Vec<&str> = cfg.cols_to_merge_grants_and_orgs.iter().map(String::as_str).collect();
    let merged = join(&projected, &organizations, &merge_on, &merge_on, JoinType::Inner)?;

    let merged = join(
        &merged,
        &carnegie,
        &[cfg.org_uid_col.as_str(), cfg.matched_name_col.as_str()],
        &[cfg.org_uid_col.as_str(), cfg.carnegie_name_col.as_str()],
        JoinType::Left,
    )?;
    info!(rows = merged.height(), "Merged grants with organizations");

    let merged = apply_filters(merged, cfg)?;

    let locations = select(
        &school_locations,
        &table_name(&cfg.school_location_file),
        &[&cfg.matched_name_col, &cfg.recipient_lat_col, &cfg.recipient_lon_col],
    )?;
    let on = [cfg.matched_name_col.as_str()];
    let mut merged = join(&merged, &locations, &on, &on, JoinType::Left)?;

    let recipients: HashSet<String> = strings(&merged, &cfg.matched_name_col)?
        .into_iter()
        .filter(|c| !c.is_empty())
        .collect();
    info!(
        grantmakers = n_unique(&merged, &cfg.ein_col)?,
        recipients = recipients.len(),
        "Merged data summary"
    );

    add_geography(&mut merged, cfg, &neighbors)?;
    info!("Distance between grantmakers and recipients computed");
    Ok(merged)
}

/// Read inputs, merge, and write `cfg.output_file`.
#[instrument(level = "info", skip_all, fields(output = %cfg.output_file.display()))]
pub fn run_merge(cfg: &MergeConfig) -> Result<DataFrame, PipelineError> {
    let cpi = match &cfg.cpi_table_file {
        Some(path) => CpiTable::from_yaml(path)?,
        None => CpiTable::default(),
    };
    let mut merged = merge_tables(MergeInputs::load(cfg)?, cfg, &cpi)?;
    write_csv(&mut merged, &cfg.output_file)?;
    info!(rows = merged.height(), "Wrote merged data");
    Ok(merged)
}
