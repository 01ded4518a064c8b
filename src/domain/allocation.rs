//! Continuous weights to whole-share positions.
//!
//! Longs are bought with the full budget and shorts are sold against
//! `budget * short_ratio`. Each side picks non-negative share counts `x`
//! minimizing `Σ|wᵢV - xᵢpᵢ| + leftover` with spend at most `V`.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::error::AllocatorError;
use super::portfolio::WeightVector;

pub const DEFAULT_SHORT_RATIO: f64 = 0.3;

const MAX_SWAP_ROUNDS: usize = 1_000;
/// Largest share count whose cost `f64` still tracks to the share (just under 2^53).
const MAX_SHARES: f64 = 9.0e15;

/// Signed share counts per ticker plus uninvested cash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationPlan {
    shares: Vec<(String, i64)>,
    leftover: f64,
}

/// Human-readable orders keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instructions(Vec<(String, String)>);

impl Instructions {
    pub fn get(&self, ticker: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, s)| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Instructions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (ticker, instruction) in &self.0 {
            map.serialize_entry(ticker, instruction)?;
        }
        map.end()
    }
}

impl AllocationPlan {
    /// Nothing bought; the whole budget is left over.
    pub fn unallocated(budget: f64) -> Self {
        Self {
            shares: Vec::new(),
            leftover: budget,
        }
    }

    pub fn shares(&self) -> &[(String, i64)] {
        &self.shares
    }

    pub fn shares_of(&self, ticker: &str) -> Option<i64> {
        self.shares
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, n)| *n)
    }

    pub fn leftover(&self) -> f64 {
        self.leftover
    }

    /// Gross traded value `Σ|xᵢ| pᵢ` at the given prices.
    pub fn exposure(&self, prices: &[(String, f64)]) -> f64 {
        self.shares
            .iter()
            .filter_map(|(ticker, n)| {
                prices
                    .iter()
                    .find(|(t, _)| t == ticker)
                    .map(|(_, p)| n.unsigned_abs() as f64 * p)
            })
            .sum()
    }

    pub fn instructions(&self) -> Instructions {
        Instructions(
            self.shares
                .iter()
                .map(|(ticker, n)| {
                    let action = if *n > 0 { "buy" } else { "sell" };
                    (
                        ticker.clone(),
                        format!("{action} {} shares of {ticker}", n.unsigned_abs()),
                    )
                })
                .collect(),
        )
    }
}

/// Integer allocation of one side (all targets non-negative, summing to 1).
#[derive(Debug)]
struct SideAllocation {
    counts: Vec<u64>,
    leftover: f64,
}

fn deviation(target: f64, count: u64, price: f64) -> f64 {
    (target - count as f64 * price).abs()
}

fn allocate_side(targets: &[f64], prices: &[f64], budget: f64) -> SideAllocation {
    let value: Vec<f64> = targets.iter().map(|w| w * budget).collect();
    let mut counts: Vec<u64> = value
        .iter()
        .zip(prices)
        .map(|(v, p)| (v / p).floor().max(0.0) as u64)
        .collect();
    let mut leftover =
        budget - counts.iter().zip(prices).map(|(c, p)| *c as f64 * p).sum::<f64>();

    let fill = |counts: &mut Vec<u64>, leftover: &mut f64| loop {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..counts.len() {
            if prices[i] > *leftover {
                continue;
            }
            let gain = deviation(value[i], counts[i], prices[i])
                - deviation(value[i], counts[i] + 1, prices[i])
                + prices[i];
            // an overweight position still ties, so spare cash keeps getting spent
            if gain > -1e-9 && best.is_none_or(|(_, g)| gain > g) {
                best = Some((i, gain));
            }
        }
        match best {
            Some((i, _)) => {
                counts[i] += 1;
                *leftover -= prices[i];
            }
            None => break,
        }
    };

    fill(&mut counts, &mut leftover);

    for _ in 0..MAX_SWAP_ROUNDS {
        let mut best: Option<(usize, usize, f64)> = None;
        for sell in 0..counts.len() {
            if counts[sell] == 0 {
                continue;
            }
            for buy in 0..counts.len() {
                if buy == sell || prices[buy] > leftover + prices[sell] {
                    continue;
                }
                let before = deviation(value[sell], counts[sell], prices[sell])
                    + deviation(value[buy], counts[buy], prices[buy]);
                let after = deviation(value[sell], counts[sell] - 1, prices[sell])
                    + deviation(value[buy], counts[buy] + 1, prices[buy]);
                // leftover moves by p_sell - p_buy
                let gain = before - after - (prices[sell] - prices[buy]);
                if gain > 1e-9 && best.is_none_or(|(_, _, g)| gain > g) {
                    best = Some((sell, buy, gain));
                }
            }
        }
        let Some((sell, buy, _)) = best else { break };
        counts[sell] -= 1;
        counts[buy] += 1;
        leftover += prices[sell] - prices[buy];
        fill(&mut counts, &mut leftover);
    }

    SideAllocation {
        counts,
        leftover: leftover.max(0.0),
    }
}

fn signed_count(n: u64) -> Result<i64, AllocatorError> {
    i64::try_from(n)
        .map_err(|_| AllocatorError::invalid_request(format!("{n} shares do not fit a position")))
}

fn normalized(side: &[(usize, f64)]) -> Vec<f64> {
    let total: f64 = side.iter().map(|(_, w)| w).sum();
    side.iter().map(|(_, w)| w / total).collect()
}

/// Convert `weights` into whole shares at `latest_prices`.
///
/// Every ticker with a non-zero weight needs a positive price. Tickers that
/// end up with zero shares are left out of the plan.
pub fn allocate(
    weights: &WeightVector,
    latest_prices: &[(String, f64)],
    total_portfolio_value: f64,
    short_ratio: f64,
) -> Result<AllocationPlan, AllocatorError> {
    if !total_portfolio_value.is_finite() || total_portfolio_value < 0.0 {
        return Err(AllocatorError::invalid_request(
            "total_portfolio_value must be a non-negative number",
        ));
    }
    if !short_ratio.is_finite() || short_ratio < 0.0 {
        return Err(AllocatorError::invalid_request("short ratio must be non-negative"));
    }

    let mut tickers = Vec::new();
    let mut prices = Vec::new();
    let mut longs = Vec::new();
    let mut shorts = Vec::new();
    for (ticker, weight) in weights.iter() {
        if weight == 0.0 {
            continue;
        }
        let price = latest_prices
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, p)| *p)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                AllocatorError::invalid_request(format!("no usable latest price for {ticker}"))
            })?;
        let side_budget = if weight > 0.0 {
            total_portfolio_value
        } else {
            total_portfolio_value * short_ratio
        };
        if side_budget / price > MAX_SHARES {
            return Err(AllocatorError::invalid_request(format!(
                "total_portfolio_value is too large for the latest price of {ticker}"
            )));
        }
        let idx = tickers.len();
        tickers.push(ticker.to_string());
        prices.push(price);
        if weight > 0.0 {
            longs.push((idx, weight));
        } else {
            shorts.push((idx, -weight));
        }
    }

    let mut counts = vec![0i64; tickers.len()];
    let mut leftover = total_portfolio_value;

    if !longs.is_empty() {
        let side_prices: Vec<f64> = longs.iter().map(|(i, _)| prices[*i]).collect();
        let side = allocate_side(&normalized(&longs), &side_prices, total_portfolio_value);
        for ((i, _), n) in longs.iter().zip(side.counts) {
            counts[*i] = signed_count(n)?;
        }
        leftover = side.leftover;
    }

    if !shorts.is_empty() {
        let short_value = total_portfolio_value * short_ratio;
        let side_prices: Vec<f64> = shorts.iter().map(|(i, _)| prices[*i]).collect();
        let side = allocate_side(&normalized(&shorts), &side_prices, short_value);
        for ((i, _), n) in shorts.iter().zip(side.counts) {
            counts[*i] = -signed_count(n)?;
        }
        leftover += side.leftover;
    }

    let shares = tickers
        .into_iter()
        .zip(counts)
        .filter(|(_, n)| *n != 0)
        .collect();
    Ok(AllocationPlan { shares, leftover })
}
