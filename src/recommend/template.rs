//! Template recommendation strategy
//!
//! Fills fixed sections from an [`AnalysisSummary`]. The only sources of
//! variation are the dish picked for the preferred category and the current
//! local time, both injectable so output is reproducible in tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDateTime, Timelike, Weekday};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::RecommendationGenerator;
use crate::analysis::{analyze, AnalysisSummary, FoodCategory};
use crate::errors::Result;
use crate::history::TEMPLATE_RECOMMENDATION_FILE;
use crate::normalize::OrderRecord;

/// Hours either side of the usual ordering hour that count as "soon"
const SOON_WINDOW_HOURS: i64 = 2;

/// Categories listed in the preferences section
const PREFERENCES_SHOWN: usize = 3;

const FALLBACK_SUGGESTION: &str =
    "You might enjoy trying Turkish cuisine like Iskender Kebab or Manti (Turkish dumplings).";

/// Dishes suggested for a preferred category
pub fn suggestions_for(category: FoodCategory) -> &'static [&'static str; 4] {
    match category {
        FoodCategory::Burger => &["Smash Burger", "Gourmet Burger", "Vegetarian Burger", "Lokma Burger"],
        FoodCategory::Pizza => &["Neapolitan Pizza", "Chicago Deep Dish", "New York Style Pizza", "Turkish Pide"],
        FoodCategory::Sandwich => &["Cuban Sandwich", "Banh Mi", "Club Sandwich", "Pastrami Sandwich"],
        FoodCategory::Tacos => &["Birria Tacos", "Fish Tacos", "Korean Fusion Tacos", "Breakfast Tacos"],
        FoodCategory::Chicken => &["Korean Fried Chicken", "Nashville Hot Chicken", "Rotisserie Chicken", "Chicken Tikka"],
        FoodCategory::Coffee => &["Specialty Pour Over", "Cold Brew", "Turkish Coffee", "Flat White"],
    }
}

/// Render recommendation text for a summary at a given local time
pub fn render<R: Rng + ?Sized>(summary: &AnalysisSummary, now: NaiveDateTime, rng: &mut R) -> String {
    let mut sections = Vec::new();

    if let Some((favorite, _)) = summary.top_items.first() {
        sections.push(format!(
            "1. TODAY'S RECOMMENDATION:\nBased on your ordering history, you might enjoy ordering {favorite} again. \
             It's your most frequently ordered item."
        ));
    }

    let pick = summary
        .preferred_category()
        .and_then(|category| suggestions_for(category).choose(rng).map(|dish| (category, *dish)));
    match pick {
        Some((category, dish)) => sections.push(format!(
            "2. NEW RECOMMENDATION:\nSince you enjoy {category}, you might like to try {dish}. \
             It's a different take on your preferred food type."
        )),
        None => sections.push(format!("2. NEW RECOMMENDATION:\n{FALLBACK_SUGGESTION}")),
    }

    if let Some(avg_hour) = summary.average_hour {
        let hour = avg_hour.trunc() as i64;
        let hint = if (i64::from(now.hour()) - hour).abs() <= SOON_WINDOW_HOURS {
            "That's coming up soon!"
        } else {
            "Plan ahead for your usual mealtime."
        };
        sections.push(format!(
            "3. ORDERING PATTERN:\nYou typically order food around {hour}:00. {hint}"
        ));
    }

    let range = summary.price_range;
    if range.mean > rust_decimal::Decimal::ZERO {
        sections.push(format!(
            "4. SPENDING PATTERNS:\nYour orders usually range from {:.2} TL to {:.2} TL, \
             with an average of {:.2} TL per order.",
            range.min, range.max, range.mean
        ));
    }

    let preferences: Vec<String> = summary
        .category_counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .take(PREFERENCES_SHOWN)
        .map(|(category, count)| format!("{category} ({count} orders)"))
        .collect();
    if !preferences.is_empty() {
        sections.push(format!(
            "FOOD PREFERENCES:\nYour favorite food types appear to be: {}",
            preferences.join(", ")
        ));
    }

    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        sections.push(
            "WEEKEND SPECIAL:\nSince it's the weekend, consider treating yourself to something more upscale \
             or a relaxed brunch option!"
                .to_string(),
        );
    }

    sections.join("\n\n")
}

/// Template strategy with its own random source
pub struct TemplateRecommender {
    rng: Mutex<StdRng>,
    clock: fn() -> NaiveDateTime,
}

impl TemplateRecommender {
    /// Recommender seeded from OS entropy, using the local clock
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Recommender with a fixed seed, for reproducible output
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            clock: local_now,
        }
    }

    /// Replace the clock, e.g. to pin the weekday in tests
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Render text for an already computed summary
    pub fn recommend(&self, summary: &AnalysisSummary) -> String {
        let now = (self.clock)();
        // A poisoned lock still holds a usable generator
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        render(summary, now, &mut *rng)
    }
}

impl Default for TemplateRecommender {
    fn default() -> Self {
        Self::new()
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[async_trait]
impl RecommendationGenerator for TemplateRecommender {
    fn name(&self) -> &'static str {
        "template"
    }

    fn artifact_name(&self) -> &'static str {
        TEMPLATE_RECOMMENDATION_FILE
    }

    async fn generate(&self, records: &[OrderRecord]) -> Result<String> {
        Ok(self.recommend(&analyze(records)))
    }
}
