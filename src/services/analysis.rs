// src/services/analysis.rs
use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use thiserror::Error;

use crate::models::{AnalysisResult, Observation};

pub const DEFAULT_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Malformed observation: non-positive price, unparseable date, missing name.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ambiguous computation: {0}")]
    ComputationAmbiguous(String),

    #[error("No observations available for analysis")]
    EmptySeries,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// How many consecutive closes at or below the threshold make a breach.
///
/// Two observations are consecutive when they are at most `max_gap_days`
/// calendar days apart, so weekends and exchange holidays do not split a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreachConfirmation {
    pub days: usize,
    pub max_gap_days: i64,
}

impl Default for BreachConfirmation {
    fn default() -> Self {
        BreachConfirmation { days: 1, max_gap_days: 3 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub threshold_fraction: f64,
    /// Fail with `EmptySeries` instead of returning an empty list.
    pub require_data: bool,
    pub breach_confirmation: BreachConfirmation,
    /// Limit forward scans to this many calendar years past the peak year.
    pub horizon_years: Option<i32>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            threshold_fraction: DEFAULT_THRESHOLD,
            require_data: false,
            breach_confirmation: BreachConfirmation::default(),
            horizon_years: None,
        }
    }
}

impl AnalysisOptions {
    pub fn with_threshold(threshold_fraction: f64) -> Self {
        AnalysisOptions { threshold_fraction, ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.threshold_fraction;
        if !(t > 0.0 && t < 1.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "threshold fraction must be between 0 and 1, got {}", t
            )));
        }
        if self.breach_confirmation.days == 0 {
            return Err(AnalysisError::InvalidParameter(
                "breach confirmation needs at least one day".to_string(),
            ));
        }
        if self.breach_confirmation.max_gap_days < 1 {
            return Err(AnalysisError::InvalidParameter(format!(
                "calendar gap tolerance must be at least 1 day, got {}",
                self.breach_confirmation.max_gap_days
            )));
        }
        if let Some(h) = self.horizon_years {
            if h < 0 {
                return Err(AnalysisError::InvalidParameter(format!(
                    "horizon must not be negative, got {} years", h
                )));
            }
        }
        Ok(())
    }
}

/// One year of one index, as a range into that index's full series.
#[derive(Debug, Clone, PartialEq)]
struct YearGroup {
    year: i32,
    range: Range<usize>,
}

/// Runs the yearly peak / drawdown / recovery analysis over every index in `observations`.
///
/// Results come back ordered by index name, then year. Any malformed row aborts
/// the whole run; nothing is skipped or defaulted.
pub fn analyze(observations: Vec<Observation>, options: &AnalysisOptions) -> Result<Vec<AnalysisResult>> {
    options.validate()?;

    if observations.is_empty() {
        if options.require_data {
            return Err(AnalysisError::EmptySeries);
        }
        return Ok(Vec::new());
    }

    for obs in &observations {
        validate_observation(obs)?;
    }

    let series = partition_by_index(observations);
    let mut results = Vec::new();

    for (index_name, days) in &series {
        let groups = year_groups(days);
        debug!("Analyzing {}: {} observations across {} years", index_name, days.len(), groups.len());
        for group in &groups {
            results.push(analyze_group(index_name, days, group, options)?);
        }
    }

    Ok(results)
}

pub fn analyze_with_threshold(observations: Vec<Observation>, threshold_fraction: f64) -> Result<Vec<AnalysisResult>> {
    analyze(observations, &AnalysisOptions::with_threshold(threshold_fraction))
}

fn validate_observation(obs: &Observation) -> Result<()> {
    if obs.index_name.trim().is_empty() {
        return Err(AnalysisError::InvalidInput(format!(
            "observation on {} has no index name", obs.date
        )));
    }
    if !obs.high.is_finite() || obs.high <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "{} on {}: high must be positive, got {}", obs.index_name, obs.date, obs.high
        )));
    }
    if !obs.close.is_finite() || obs.close <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "{} on {}: close must be positive, got {}", obs.index_name, obs.date, obs.close
        )));
    }
    Ok(())
}

/// First pass: one ascending, duplicate-free series per index.
///
/// Duplicate dates keep the first row seen in input order.
fn partition_by_index(observations: Vec<Observation>) -> BTreeMap<String, Vec<Observation>> {
    let mut series: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        series.entry(obs.index_name.clone()).or_default().push(obs);
    }

    for (index_name, days) in series.iter_mut() {
        days.sort_by_key(|o| o.date);
        let before = days.len();
        days.dedup_by_key(|o| o.date);
        if days.len() < before {
            warn!("{}: dropped {} duplicate observations (first row per date kept)", index_name, before - days.len());
        }
    }

    series
}

fn year_groups(days: &[Observation]) -> Vec<YearGroup> {
    let mut groups: Vec<YearGroup> = Vec::new();
    for (i, obs) in days.iter().enumerate() {
        let year = obs.date.year();
        match groups.last_mut() {
            Some(group) if group.year == year => group.range.end = i + 1,
            _ => groups.push(YearGroup { year, range: i..i + 1 }),
        }
    }
    groups
}

/// Second pass: figures for one year group, scanning forward through the rest of the index.
fn analyze_group(
    index_name: &str,
    days: &[Observation],
    group: &YearGroup,
    options: &AnalysisOptions,
) -> Result<AnalysisResult> {
    let (peak_idx, yearly_high) = find_peak(days, &group.range);
    let peak_date = days[peak_idx].date;

    let end = scan_end(days, group.year, options.horizon_years);
    let tail = &days[peak_idx..end];
    let last_date = tail[tail.len() - 1].date;

    let threshold_value = yearly_high * (1.0 - options.threshold_fraction);
    let (days_to_threshold_breach, threshold_breached) =
        match find_breach(tail, threshold_value, &options.breach_confirmation) {
            Some(i) => (day_span(peak_date, tail[i].date), true),
            None => (day_span(peak_date, last_date), false),
        };

    let mut max_drawdown = 0.0;
    let mut drawdown_offset = 0;
    for (i, obs) in tail.iter().enumerate() {
        let drawdown = drawdown_pct(yearly_high, obs.close)?;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
            drawdown_offset = i;
        }
    }
    let drawdown_date = tail[drawdown_offset].date;

    let (recovery_days, recovered) = match tail[drawdown_offset..].iter().find(|o| o.close >= yearly_high) {
        Some(obs) => (day_span(drawdown_date, obs.date), true),
        None => (day_span(drawdown_date, last_date), false),
    };

    debug!(
        "{} {}: high {} on {}, drawdown {:.2}% on {}, breached={} recovered={}",
        index_name, group.year, yearly_high, peak_date, max_drawdown, drawdown_date, threshold_breached, recovered
    );

    Ok(AnalysisResult {
        index_name: index_name.to_string(),
        year: group.year,
        yearly_high,
        peak_date,
        max_drawdown_pct: max_drawdown,
        drawdown_date,
        days_to_threshold_breach,
        threshold_breached,
        recovery_days,
        recovered,
    })
}

/// Index of the earliest observation carrying the group's maximum high.
fn find_peak(days: &[Observation], range: &Range<usize>) -> (usize, f64) {
    let mut peak_idx = range.start;
    for i in range.clone() {
        if days[i].high > days[peak_idx].high {
            peak_idx = i;
        }
    }
    (peak_idx, days[peak_idx].high)
}

/// Exclusive end of the forward scan for a group in `year`.
fn scan_end(days: &[Observation], year: i32, horizon_years: Option<i32>) -> usize {
    match horizon_years {
        Some(h) => {
            let last_year = year.saturating_add(h);
            days.partition_point(|o| o.date.year() <= last_year)
        }
        None => days.len(),
    }
}

/// Offset into `tail` of the first day of the first confirmed breach run.
fn find_breach(tail: &[Observation], threshold_value: f64, confirmation: &BreachConfirmation) -> Option<usize> {
    let mut run_start: Option<usize> = None;
    let mut run_len = 0;

    for (i, obs) in tail.iter().enumerate() {
        if obs.close > threshold_value {
            run_start = None;
            run_len = 0;
            continue;
        }

        match run_start {
            Some(_) if day_span(tail[i - 1].date, obs.date) <= confirmation.max_gap_days => run_len += 1,
            _ => {
                run_start = Some(i);
                run_len = 1;
            }
        }

        if run_len >= confirmation.days {
            return run_start;
        }
    }

    None
}

pub fn drawdown_pct(peak: f64, value: f64) -> Result<f64> {
    if !peak.is_finite() || peak <= 0.0 {
        return Err(AnalysisError::ComputationAmbiguous(format!(
            "drawdown against a peak of {} is undefined", peak
        )));
    }
    Ok((peak - value) * 100.0 / peak)
}

fn day_span(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
