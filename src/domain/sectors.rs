//! Ticker -> sector classification and per-sector weight bounds.

use std::collections::BTreeMap;

use super::error::AllocatorError;
use super::portfolio::WeightVector;
use crate::ports::config_port::ConfigPort;

pub const MAPPER_SECTION: &str = "sector_mapper";
pub const LOWER_SECTION: &str = "sector_lower";
pub const UPPER_SECTION: &str = "sector_upper";

const DEFAULT_MAPPER: &[(&str, &str)] = &[
    ("MSFT", "Tech"),
    ("AMZN", "Consumer Discretionary"),
    ("KO", "Consumer Staples"),
    ("MA", "Financial Services"),
    ("COST", "Consumer Staples"),
    ("LUV", "Aerospace"),
    ("XOM", "Energy"),
    ("PFE", "Healthcare"),
    ("JPM", "Financial Services"),
    ("UNH", "Healthcare"),
    ("ACN", "Misc"),
    ("DIS", "Media"),
    ("GILD", "Healthcare"),
    ("F", "Auto"),
    ("TSLA", "Auto"),
];

const DEFAULT_LOWER: &[(&str, f64)] = &[("Consumer Staples", 0.1), ("Tech", 0.05)];

const DEFAULT_UPPER: &[(&str, f64)] = &[
    ("Tech", 0.2),
    ("Aerospace", 0.1),
    ("Energy", 0.1),
    ("Auto", 0.15),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SectorConstraints {
    mapper: BTreeMap<String, String>,
    lower: BTreeMap<String, f64>,
    upper: BTreeMap<String, f64>,
}

/// Bounds of one sector restricted to a concrete ticker list.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorBound {
    pub sector: String,
    /// Column indices of member tickers.
    pub members: Vec<usize>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Default for SectorConstraints {
    fn default() -> Self {
        Self {
            mapper: DEFAULT_MAPPER
                .iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect(),
            lower: DEFAULT_LOWER.iter().map(|(s, v)| (s.to_string(), *v)).collect(),
            upper: DEFAULT_UPPER.iter().map(|(s, v)| (s.to_string(), *v)).collect(),
        }
    }
}

fn parse_bounds(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<Option<BTreeMap<String, f64>>, AllocatorError> {
    let entries = config.section_entries(section);
    if entries.is_empty() {
        return Ok(None);
    }
    let mut bounds = BTreeMap::new();
    for (sector, raw) in entries {
        let value: f64 = raw.parse().map_err(|_| AllocatorError::ConfigInvalid {
            section: section.to_string(),
            key: sector.clone(),
            reason: format!("'{raw}' is not a number"),
        })?;
        if !(0.0..=1.0).contains(&value) {
            return Err(AllocatorError::ConfigInvalid {
                section: section.to_string(),
                key: sector,
                reason: format!("{value} is outside [0, 1]"),
            });
        }
        bounds.insert(sector, value);
    }
    Ok(Some(bounds))
}

impl SectorConstraints {
    /// Built-in tables, each replaced wholesale by its config section when present.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AllocatorError> {
        let mut constraints = Self::default();

        let mapper = config.section_entries(MAPPER_SECTION);
        if !mapper.is_empty() {
            constraints.mapper = mapper
                .into_iter()
                .map(|(ticker, sector)| (ticker.trim().to_uppercase(), sector))
                .collect();
        }
        if let Some(lower) = parse_bounds(config, LOWER_SECTION)? {
            constraints.lower = lower;
        }
        if let Some(upper) = parse_bounds(config, UPPER_SECTION)? {
            constraints.upper = upper;
        }

        for (sector, lo) in &constraints.lower {
            if let Some(up) = constraints.upper.get(sector) {
                if lo > up {
                    return Err(AllocatorError::ConfigInvalid {
                        section: LOWER_SECTION.to_string(),
                        key: sector.clone(),
                        reason: format!("lower bound {lo} exceeds upper bound {up}"),
                    });
                }
            }
        }
        Ok(constraints)
    }

    pub fn sector_of(&self, ticker: &str) -> Option<&str> {
        self.mapper.get(ticker).map(String::as_str)
    }

    pub fn lower_bound(&self, sector: &str) -> Option<f64> {
        self.lower.get(sector).copied()
    }

    pub fn upper_bound(&self, sector: &str) -> Option<f64> {
        self.upper.get(sector).copied()
    }

    pub fn mapped_tickers(&self) -> usize {
        self.mapper.len()
    }

    /// Bounds for every bounded sector that has at least one of `tickers`.
    pub fn active_bounds(&self, tickers: &[String]) -> Vec<SectorBound> {
        let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, ticker) in tickers.iter().enumerate() {
            if let Some(sector) = self.sector_of(ticker) {
                members.entry(sector).or_default().push(idx);
            }
        }

        members
            .into_iter()
            .filter_map(|(sector, members)| {
                let lower = self.lower_bound(sector);
                let upper = self.upper_bound(sector);
                (lower.is_some() || upper.is_some()).then(|| SectorBound {
                    sector: sector.to_string(),
                    members,
                    lower,
                    upper,
                })
            })
            .collect()
    }

    /// Aggregate weight per mapped sector.
    pub fn sector_weights(&self, weights: &WeightVector) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for (ticker, weight) in weights.iter() {
            if let Some(sector) = self.sector_of(ticker) {
                *totals.entry(sector.to_string()).or_insert(0.0) += weight;
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_tables() {
        let sc = SectorConstraints::default();
        assert_eq!(sc.mapped_tickers(), 15);
        assert_eq!(sc.sector_of("KO"), Some("Consumer Staples"));
        assert_eq!(sc.sector_of("TSLA"), Some("Auto"));
        assert_eq!(sc.sector_of("NVDA"), None);
        assert_eq!(sc.lower_bound("Tech"), Some(0.05));
        assert_eq!(sc.upper_bound("Tech"), Some(0.2));
        assert_eq!(sc.upper_bound("Consumer Staples"), None);
    }

    #[test]
    fn active_bounds_only_for_present_sectors() {
        let sc = SectorConstraints::default();
        let bounds = sc.active_bounds(&tickers(&["MSFT", "AMZN", "F", "TSLA", "NVDA"]));
        assert_eq!(bounds.len(), 2);

        let auto = bounds.iter().find(|b| b.sector == "Auto").unwrap();
        assert_eq!(auto.members, vec![2, 3]);
        assert_eq!(auto.lower, None);
        assert_eq!(auto.upper, Some(0.15));

        let tech = bounds.iter().find(|b| b.sector == "Tech").unwrap();
        assert_eq!(tech.members, vec![0]);
        assert_eq!(tech.lower, Some(0.05));
    }

    #[test]
    fn sector_weights_aggregate() {
        let sc = SectorConstraints::default();
        let w = WeightVector::from_pairs(vec![
            ("KO".into(), 0.2),
            ("COST".into(), 0.3),
            ("MSFT".into(), 0.5),
        ]);
        let totals = sc.sector_weights(&w);
        assert!((totals["Consumer Staples"] - 0.5).abs() < 1e-12);
        assert!((totals["Tech"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn config_sections_replace_tables() {
        let config = FileConfigAdapter::from_string(
            "[sector_mapper]\nnvda = Semis\nAMD = Semis\n[sector_upper]\nSemis = 0.4\n",
        )
        .unwrap();
        let sc = SectorConstraints::from_config(&config).unwrap();
        assert_eq!(sc.sector_of("NVDA"), Some("Semis"));
        assert_eq!(sc.sector_of("MSFT"), None);
        assert_eq!(sc.upper_bound("Semis"), Some(0.4));
        assert_eq!(sc.upper_bound("Tech"), None);
        // lower table untouched
        assert_eq!(sc.lower_bound("Tech"), Some(0.05));
    }

    #[test]
    fn config_rejects_bad_bounds() {
        let config = FileConfigAdapter::from_string("[sector_upper]\nTech = lots\n").unwrap();
        assert!(matches!(
            SectorConstraints::from_config(&config),
            Err(AllocatorError::ConfigInvalid { .. })
        ));

        let config = FileConfigAdapter::from_string("[sector_lower]\nAuto = 0.5\n").unwrap();
        assert!(matches!(
            SectorConstraints::from_config(&config),
            Err(AllocatorError::ConfigInvalid { .. })
        ));
    }
}
