//! # Pattern Analyzer Module
//!
//! Frequency counts, keyword-based food categories and price aggregates over
//! normalized orders. The summary is derived on every request and never
//! stored.
//!
//! Ranking helpers are stable: ties keep first-seen order (items,
//! restaurants) or declaration order (categories).

use std::collections::HashMap;
use std::fmt;

use log::debug;
use rust_decimal::Decimal;

use crate::normalize::OrderRecord;

/// Number of items kept in [`AnalysisSummary::top_items`]
pub const TOP_ITEMS: usize = 3;

/// Food category matched by keywords in the item name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoodCategory {
    Burger,
    Pizza,
    Sandwich,
    Tacos,
    Chicken,
    Coffee,
}

impl FoodCategory {
    /// All categories in declaration order
    pub const ALL: [FoodCategory; 6] = [
        FoodCategory::Burger,
        FoodCategory::Pizza,
        FoodCategory::Sandwich,
        FoodCategory::Tacos,
        FoodCategory::Chicken,
        FoodCategory::Coffee,
    ];

    /// Case-sensitive substrings that place an item in this category
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            FoodCategory::Burger => &["Burger", "King", "Secret"],
            FoodCategory::Pizza => &["Pizza"],
            FoodCategory::Sandwich => &["Sandwich", "SANDWİCH", "Tost"],
            FoodCategory::Tacos => &["Tacos"],
            FoodCategory::Chicken => &["Chicken", "Tavuk"],
            FoodCategory::Coffee => &["Latte", "Caffe"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FoodCategory::Burger => "burger",
            FoodCategory::Pizza => "pizza",
            FoodCategory::Sandwich => "sandwich",
            FoodCategory::Tacos => "tacos",
            FoodCategory::Chicken => "chicken",
            FoodCategory::Coffee => "coffee",
        }
    }

    pub fn matches(self, item_name: &str) -> bool {
        self.keywords().iter().any(|kw| item_name.contains(kw))
    }
}

impl fmt::Display for FoodCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum, maximum and mean order price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: Decimal,
}

/// Derived ordering statistics
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    /// Most frequent items, at most three
    pub top_items: Vec<(String, usize)>,
    /// Mean ordering hour, absent when no time could be parsed
    pub average_hour: Option<f64>,
    pub price_range: PriceRange,
    /// Every category with its count, sorted descending
    pub category_counts: Vec<(FoodCategory, usize)>,
    pub record_count: usize,
}

impl AnalysisSummary {
    /// Category with the highest count, if any record matched one
    pub fn preferred_category(&self) -> Option<FoodCategory> {
        self.category_counts
            .first()
            .filter(|(_, count)| *count > 0)
            .map(|(category, _)| *category)
    }
}

/// Analyze a record set
pub fn analyze(records: &[OrderRecord]) -> AnalysisSummary {
    let mut top_items = rank_by_frequency(records.iter().map(|r| r.item_name.as_str()));
    top_items.truncate(TOP_ITEMS);

    let summary = AnalysisSummary {
        top_items,
        average_hour: average_hour(records),
        price_range: price_range(records),
        category_counts: category_counts(records),
        record_count: records.len(),
    };
    debug!("Analysis summary: {summary:?}");
    summary
}

/// Restaurants ranked by order count, keyed as `"Name (Location)"`
pub fn top_restaurants(records: &[OrderRecord], limit: usize) -> Vec<(String, usize)> {
    let keys: Vec<String> = records
        .iter()
        .map(|r| format!("{} ({})", r.restaurant_name, r.restaurant_location))
        .collect();
    let mut ranked = rank_by_frequency(keys.iter().map(String::as_str));
    ranked.truncate(limit);
    ranked
}

/// Count occurrences and sort by count, keeping first-seen order on ties
fn rank_by_frequency<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for value in values {
        match index.get(value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value.to_string(), 1));
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Parse the hour from an `HH:MM` time
pub fn parse_hour(time: &str) -> Option<u32> {
    time.split(':').next()?.trim().parse().ok()
}

fn average_hour(records: &[OrderRecord]) -> Option<f64> {
    let hours: Vec<u32> = records.iter().filter_map(|r| parse_hour(&r.time)).collect();
    if hours.is_empty() {
        return None;
    }
    let total: u64 = hours.iter().map(|&h| u64::from(h)).sum();
    Some(total as f64 / hours.len() as f64)
}

fn price_range(records: &[OrderRecord]) -> PriceRange {
    let mut prices = records.iter().map(|r| r.price);
    let Some(first) = prices.next() else {
        return PriceRange::default();
    };

    let (min, max) = prices.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));

    PriceRange {
        min,
        max,
        mean: mean_price(records),
    }
}

/// Mean price; totals past `Decimal::MAX` fall back to a running mean
fn mean_price(records: &[OrderRecord]) -> Decimal {
    let total = records
        .iter()
        .try_fold(Decimal::ZERO, |sum, r| sum.checked_add(r.price));

    match total {
        Some(sum) => sum / Decimal::from(records.len()),
        None => records
            .iter()
            .zip(1u64..)
            .fold(Decimal::ZERO, |mean, (r, n)| mean + (r.price - mean) / Decimal::from(n)),
    }
}

fn category_counts(records: &[OrderRecord]) -> Vec<(FoodCategory, usize)> {
    let mut counts: Vec<(FoodCategory, usize)> =
        FoodCategory::ALL.iter().map(|&c| (c, 0)).collect();

    for record in records {
        for (category, count) in counts.iter_mut() {
            if category.matches(&record.item_name) {
                *count += 1;
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
