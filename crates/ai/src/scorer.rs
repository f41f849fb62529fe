//! Deterministic reply scorer.
//!
//! Given the value of a received gift, an optional recipient profile, and the
//! current season, rank the in-stock items that make a plausible reply.
//!
//! Model:
//! - hard price band: only items priced within [0.6·V, 1.2·V] are considered;
//! - base score 100, plus independent additive bonuses from the age, gender,
//!   and season rule tables (an item may match several rules at once);
//! - a continuous proximity bonus `max(0, 20 − 10·|price − V| / V)` rewarding
//!   prices close to V;
//! - stable descending sort, top 6. Ties keep input order.

use crate::season::Season;

/// Price band as fractions of the received value.
pub const PRICE_BAND_LOWER: f64 = 0.6;
pub const PRICE_BAND_UPPER: f64 = 1.2;

/// Maximum number of ranked candidates returned.
pub const MAX_RESULTS: usize = 6;

const BASE_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientGender {
    Male,
    Female,
}

/// What the scorer knows about the person being replied to.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipientProfile {
    pub age: Option<u32>,
    pub gender: Option<RecipientGender>,
}

/// Stock snapshot handed in by the caller (read-model data, not the
/// aggregate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub item_id: String,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    /// Price in fen.
    pub unit_price: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item: CandidateItem,
    pub score: f64,
}

// Rule tables. Matching is substring-based on the (Chinese) category text;
// the male rule additionally matches tea in the item *name*.

const KIDS_CATEGORIES: &[&str] = &["玩具", "文具", "零食"];
const YOUNG_ADULT_CATEGORIES: &[&str] = &["电子", "时尚", "美妆", "运动"];
const MIDDLE_AGED_CATEGORIES: &[&str] = &["茶", "酒", "保健", "礼品"];
const SENIOR_CATEGORIES: &[&str] = &["保健", "传统", "养生"];

const MALE_CATEGORIES: &[&str] = &["酒", "电子", "运动"];
const MALE_NAME_KEYWORD: &str = "茶";
const FEMALE_CATEGORIES: &[&str] = &["美妆", "鲜花", "首饰", "护肤"];

const SPRING_CATEGORIES: &[&str] = &["茶", "鲜花"];
const SUMMER_CATEGORIES: &[&str] = &["饮料", "水果"];
const AUTUMN_CATEGORIES: &[&str] = &["茶", "保健"];
const WINTER_CATEGORIES: &[&str] = &["酒", "保暖", "补品"];

fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

fn age_bonus(age: u32, category: &str) -> f64 {
    if age < 18 {
        if matches_any(category, KIDS_CATEGORIES) {
            return 30.0;
        }
    } else if age < 35 {
        if matches_any(category, YOUNG_ADULT_CATEGORIES) {
            return 25.0;
        }
    } else if age < 60 {
        if matches_any(category, MIDDLE_AGED_CATEGORIES) {
            return 25.0;
        }
    } else if matches_any(category, SENIOR_CATEGORIES) {
        return 30.0;
    }
    0.0
}

fn gender_bonus(gender: RecipientGender, item: &CandidateItem) -> f64 {
    match gender {
        RecipientGender::Male => {
            if matches_any(&item.category, MALE_CATEGORIES)
                || item.name.contains(MALE_NAME_KEYWORD)
            {
                20.0
            } else {
                0.0
            }
        }
        RecipientGender::Female => {
            if matches_any(&item.category, FEMALE_CATEGORIES) {
                20.0
            } else {
                0.0
            }
        }
    }
}

fn season_bonus(season: Season, category: &str) -> f64 {
    let keywords = match season {
        Season::Spring => SPRING_CATEGORIES,
        Season::Summer => SUMMER_CATEGORIES,
        Season::Autumn => AUTUMN_CATEGORIES,
        Season::Winter => WINTER_CATEGORIES,
    };
    if matches_any(category, keywords) { 15.0 } else { 0.0 }
}

fn proximity_bonus(total_value: u64, price: u64) -> f64 {
    if total_value == 0 {
        // The band has collapsed to [0,0]; there is no proximity signal.
        return 0.0;
    }
    let v = total_value as f64;
    let diff = (price as f64 - v).abs();
    (20.0 - (diff / v) * 10.0).max(0.0)
}

/// Rank the in-stock candidates for a reply to a gift worth `total_value`
/// fen. Returns at most [`MAX_RESULTS`] items; an empty result means no
/// suitable recommendation exists and the caller should say so rather than
/// error.
pub fn recommend_candidates(
    total_value: u64,
    profile: Option<&RecipientProfile>,
    season: Season,
    candidates: &[CandidateItem],
) -> Vec<ScoredCandidate> {
    let v = total_value as f64;
    let min_price = v * PRICE_BAND_LOWER;
    let max_price = v * PRICE_BAND_UPPER;

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|item| item.quantity > 0)
        .filter(|item| {
            let price = item.unit_price as f64;
            price >= min_price && price <= max_price
        })
        .map(|item| {
            let mut score = BASE_SCORE;

            if let Some(profile) = profile {
                if let Some(age) = profile.age {
                    score += age_bonus(age, &item.category);
                }
                if let Some(gender) = profile.gender {
                    score += gender_bonus(gender, item);
                }
            }

            score += season_bonus(season, &item.category);
            score += proximity_bonus(total_value, item.unit_price);

            ScoredCandidate {
                item: item.clone(),
                score,
            }
        })
        .collect();

    // sort_by is stable: equal scores keep their input order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(MAX_RESULTS);
    scored
}
