//! Generative multi-item reply packages.
//!
//! The model's output is an untrusted external payload: we extract the
//! largest bracket-delimited JSON array from the completion, deserialize it
//! against a strict shape, and validate every package against the stock
//! snapshot before accepting anything. Any failure along the way drops the
//! whole response and the deterministic scorer takes over.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::result::RecommendError;
use crate::scorer::{CandidateItem, RecipientProfile, ScoredCandidate, recommend_candidates};
use crate::season::{Season, nearby_holidays, season_label};
use crate::textgen::{ChatMessage, TextGenerator};

/// One line of a recommended package. Amounts in fen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLine {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub total: u64,
}

/// A recommended reply package: title, rationale, and 1–3 stock lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftPackage {
    pub title: String,
    pub reason: String,
    /// Suggested overall reply value (advisory, in fen).
    pub suggested_value: u64,
    pub match_score: u32,
    pub cultural_note: Option<String>,
    pub items: Vec<PackageLine>,
}

impl GiftPackage {
    /// Sum of the line totals, in fen.
    pub fn items_total(&self) -> u64 {
        self.items.iter().map(|l| l.total).sum()
    }
}

/// Contact details as fed to the prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContact {
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub company: Option<String>,
}

/// One past exchange with the same person: date plus (item name, unit price).
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub lines: Vec<(String, u64)>,
}

/// Everything the prompt builder needs, assembled by the caller from read
/// models.
#[derive(Debug, Clone)]
pub struct ReplyPromptContext {
    /// (category, name, quantity, unit price) of the received lines.
    pub gift_lines: Vec<(String, String, i64, u64)>,
    /// Total received value in fen.
    pub total_value: u64,
    pub contact: Option<PromptContact>,
    pub received_history: Vec<HistoryEntry>,
    pub sent_history: Vec<HistoryEntry>,
    pub today: NaiveDate,
    pub season: Season,
    /// In-stock items the model may draw from.
    pub inventory: Vec<CandidateItem>,
}

fn fmt_yuan(fen: u64) -> String {
    if fen % 100 == 0 {
        (fen / 100).to_string()
    } else {
        format!("{:.2}", fen as f64 / 100.0)
    }
}

fn history_block(entries: &[HistoryEntry], verb: &str, empty: &str) -> String {
    if entries.is_empty() {
        return empty.to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let items = h
                .lines
                .iter()
                .map(|(name, price)| format!("{name}(¥{})", fmt_yuan(*price)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}. {}: {verb} {items}", idx + 1, h.date)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the reply-recommendation prompt.
pub fn build_reply_prompt(ctx: &ReplyPromptContext) -> String {
    let gift_info = ctx
        .gift_lines
        .iter()
        .map(|(category, name, quantity, unit_price)| {
            format!("{category} - {name} x{quantity} (¥{})", fmt_yuan(*unit_price))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let contact_info = match &ctx.contact {
        Some(c) => format!(
            "姓名: {}, 性别: {}, 年龄: {}, 公司: {}",
            c.name,
            c.gender.as_deref().unwrap_or("未知"),
            c.age.map(|a| a.to_string()).unwrap_or_else(|| "未知".to_string()),
            c.company.as_deref().unwrap_or("未知"),
        ),
        None => "联系人信息未知".to_string(),
    };

    let received_history = history_block(&ctx.received_history, "收到", "无历史记录");
    let sent_history = history_block(&ctx.sent_history, "送出", "无送礼记录");

    let inventory_info = ctx
        .inventory
        .iter()
        .map(|item| {
            format!(
                "{} - {} (¥{}, 库存{})",
                item.category,
                item.name,
                fmt_yuan(item.unit_price),
                item.quantity
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let holidays = nearby_holidays(ctx.today);
    let holiday_info = if holidays.is_empty() {
        "无特殊节日".to_string()
    } else {
        format!("即将到来的节日: {}", holidays.join("、"))
    };

    format!(
        r#"你是一个专业的中国礼物推荐专家，精通中国送礼文化和人情世故。请根据以下信息，生成5个智能回礼推荐方案。

## 当前收到的礼物
- 礼物清单: {gift_info}
- 总价值: ¥{total}
- 送礼人: {contact_info}

## 历史往来记录
### 从该送礼人收到的礼物历史:
{received_history}

### 曾经送给该送礼人的礼物:
{sent_history}

## 时令信息
- 当前季节: {season}
- {holiday_info}

## 可用库存
{inventory_info}

## 中国送礼文化要点
1. 礼尚往来要对等，但不能完全相同
2. 避免重复送过的礼物（除非是消耗品）
3. 节日要结合节日文化选择礼物
4. 年龄、性别、关系要考虑周到
5. 避免送礼禁忌（如钟表、鞋子等）

## 要求
1. 每个方案包含 title、reason、suggestedValue、matchScore（85-98）、culturalNote、items。
2. items 从库存中选择，名称必须与库存完全一致，每个方案1-3件商品，数量不能超过库存数量；每件商品包含 name、category、quantity、unit_price、total（小计）。
3. 避免推荐历史上送过的同类商品（除非是消耗品）；如有节日，优先考虑节日特色礼物。

请以JSON数组格式返回，例如：
[
  {{
    "title": "春节特色回礼",
    "reason": "……",
    "suggestedValue": 1000,
    "matchScore": 95,
    "culturalNote": "春节送茶叶寓意清雅祥和",
    "items": [
      {{ "name": "大红袍", "category": "茶叶", "quantity": 2, "unit_price": 500, "total": 1000 }}
    ]
  }}
]"#,
        total = fmt_yuan(ctx.total_value),
        season = season_label(ctx.season),
    )
}

/// The largest bracket-delimited slice of `text`: from the first `[` to the
/// last `]`. `None` when no such slice exists.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

// Wire shape of the model output; amounts arrive in yuan.

#[derive(Debug, Deserialize)]
struct WireLine {
    name: String,
    category: String,
    quantity: f64,
    unit_price: f64,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct WirePackage {
    title: String,
    reason: String,
    #[serde(rename = "suggestedValue")]
    suggested_value: f64,
    #[serde(rename = "matchScore")]
    match_score: f64,
    #[serde(rename = "culturalNote", default)]
    cultural_note: Option<String>,
    items: Vec<WireLine>,
}

fn yuan_to_fen(yuan: f64, field: &str) -> Result<u64, RecommendError> {
    if !yuan.is_finite() || yuan < 0.0 {
        return Err(RecommendError::MalformedResponse(format!(
            "{field} must be a non-negative number, got {yuan}"
        )));
    }
    Ok((yuan * 100.0).round() as u64)
}

fn whole_number(value: f64, field: &str) -> Result<i64, RecommendError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(RecommendError::MalformedResponse(format!(
            "{field} must be a non-negative integer, got {value}"
        )));
    }
    Ok(value as i64)
}

/// Parse a completion into packages. Fails on missing array, bad JSON, or
/// non-numeric amounts; semantic checks happen in [`validate_packages`].
pub fn parse_packages(text: &str) -> Result<Vec<GiftPackage>, RecommendError> {
    let raw = extract_json_array(text).ok_or_else(|| {
        RecommendError::MalformedResponse("no JSON array in completion".to_string())
    })?;

    let wire: Vec<WirePackage> = serde_json::from_str(raw)
        .map_err(|e| RecommendError::MalformedResponse(format!("bad package JSON: {e}")))?;

    wire.into_iter()
        .map(|p| {
            let items = p
                .items
                .into_iter()
                .map(|l| {
                    Ok(PackageLine {
                        name: l.name,
                        category: l.category,
                        quantity: whole_number(l.quantity, "quantity")?,
                        unit_price: yuan_to_fen(l.unit_price, "unit_price")?,
                        total: yuan_to_fen(l.total, "total")?,
                    })
                })
                .collect::<Result<Vec<_>, RecommendError>>()?;

            Ok(GiftPackage {
                title: p.title,
                reason: p.reason,
                suggested_value: yuan_to_fen(p.suggested_value, "suggestedValue")?,
                match_score: whole_number(p.match_score, "matchScore")? as u32,
                cultural_note: p.cultural_note,
                items,
            })
        })
        .collect()
}

/// Check every package against the stock snapshot.
///
/// Accepts only packages whose lines (a) name items that exist in inventory
/// with enough stock — counting multiple lines drawing on the same item —
/// and (b) carry totals equal to quantity × unit price.
pub fn validate_packages(
    packages: &[GiftPackage],
    inventory: &[CandidateItem],
) -> Result<(), RecommendError> {
    if packages.is_empty() {
        return Err(RecommendError::Validation("no packages returned".to_string()));
    }

    let stock: HashMap<&str, i64> = inventory
        .iter()
        .map(|item| (item.name.as_str(), item.quantity))
        .collect();

    for package in packages {
        if package.items.is_empty() || package.items.len() > 3 {
            return Err(RecommendError::Validation(format!(
                "package '{}' must contain 1-3 items, has {}",
                package.title,
                package.items.len()
            )));
        }

        let mut drawn: HashMap<&str, i64> = HashMap::new();
        for line in &package.items {
            if line.quantity <= 0 {
                return Err(RecommendError::Validation(format!(
                    "package '{}' line '{}' has non-positive quantity",
                    package.title, line.name
                )));
            }

            let available = stock.get(line.name.as_str()).copied().ok_or_else(|| {
                RecommendError::Validation(format!(
                    "package '{}' references unknown item '{}'",
                    package.title, line.name
                ))
            })?;

            let total_drawn = drawn.entry(line.name.as_str()).or_insert(0);
            *total_drawn += line.quantity;
            if *total_drawn > available {
                return Err(RecommendError::Validation(format!(
                    "package '{}' draws {} of '{}' but only {} in stock",
                    package.title, total_drawn, line.name, available
                )));
            }

            let expected = (line.quantity as u64) * line.unit_price;
            if line.total != expected {
                return Err(RecommendError::Validation(format!(
                    "package '{}' line '{}' total {} does not equal quantity × unit price {}",
                    package.title, line.name, line.total, expected
                )));
            }
        }
    }

    Ok(())
}

/// Deterministic substitute when the generative path fails: a single
/// value-matched package drawn from the scorer's ranking.
pub fn fallback_packages(total_value: u64, scored: &[ScoredCandidate]) -> Vec<GiftPackage> {
    if scored.is_empty() {
        return Vec::new();
    }

    let items: Vec<PackageLine> = scored
        .iter()
        .take(3)
        .map(|s| PackageLine {
            name: s.item.name.clone(),
            category: s.item.category.clone(),
            quantity: 1,
            unit_price: s.item.unit_price,
            total: s.item.unit_price,
        })
        .collect();

    vec![GiftPackage {
        title: "等价回礼".to_string(),
        reason: format!(
            "建议回礼价值在 ¥{} - ¥{} 之间，礼尚往来，价值对等。",
            fmt_yuan(total_value * 9 / 10),
            fmt_yuan(total_value * 11 / 10)
        ),
        suggested_value: total_value,
        match_score: 85,
        cultural_note: Some("礼尚往来，价值对等".to_string()),
        items,
    }]
}

/// The generative path end-to-end: prompt → completion → parse → validate,
/// with scorer fallback on every failure mode.
pub struct PackageRecommender<G> {
    generator: G,
}

impl<G: TextGenerator> PackageRecommender<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub async fn recommend(
        &self,
        ctx: &ReplyPromptContext,
        profile: Option<&RecipientProfile>,
    ) -> Vec<GiftPackage> {
        match self.generate(ctx).await {
            Ok(packages) => packages,
            Err(err) => {
                tracing::warn!(error = %err, "package generation failed, using scorer fallback");
                let scored =
                    recommend_candidates(ctx.total_value, profile, ctx.season, &ctx.inventory);
                fallback_packages(ctx.total_value, &scored)
            }
        }
    }

    async fn generate(&self, ctx: &ReplyPromptContext) -> Result<Vec<GiftPackage>, RecommendError> {
        let prompt = build_reply_prompt(ctx);
        let completion = self
            .generator
            .complete(&[ChatMessage::user(prompt)], 0.8, 3000)
            .await
            .map_err(|e| RecommendError::Generation(e.to_string()))?;

        let packages = parse_packages(&completion)?;
        validate_packages(&packages, &ctx.inventory)?;
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(name: &str, quantity: i64, unit_price: u64) -> CandidateItem {
        CandidateItem {
            item_id: format!("id-{name}"),
            name: name.to_string(),
            category: "茶叶".to_string(),
            quantity,
            unit_price,
        }
    }

    fn line(name: &str, quantity: i64, unit_price: u64) -> PackageLine {
        PackageLine {
            name: name.to_string(),
            category: "茶叶".to_string(),
            quantity,
            unit_price,
            total: quantity as u64 * unit_price,
        }
    }

    fn package(items: Vec<PackageLine>) -> GiftPackage {
        GiftPackage {
            title: "品质升级方案".to_string(),
            reason: "以茶回酒，品味相承。".to_string(),
            suggested_value: 100_000,
            match_score: 92,
            cultural_note: None,
            items,
        }
    }

    #[test]
    fn extracts_largest_bracketed_array() {
        let text = "以下是推荐：\n[{\"a\":1}]\n祝好";
        assert_eq!(extract_json_array(text), Some("[{\"a\":1}]"));
        assert_eq!(extract_json_array("no json here"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn parses_wire_packages_with_yuan_amounts() {
        let completion = r#"推荐如下：
[
  {
    "title": "等价回礼",
    "reason": "礼尚往来",
    "suggestedValue": 1000,
    "matchScore": 95,
    "culturalNote": "寓意吉祥",
    "items": [
      { "name": "大红袍", "category": "茶叶", "quantity": 2, "unit_price": 500, "total": 1000 }
    ]
  }
]"#;
        let packages = parse_packages(completion).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].suggested_value, 100_000);
        assert_eq!(packages[0].items[0].unit_price, 50_000);
        assert_eq!(packages[0].items[0].total, 100_000);
        assert_eq!(packages[0].items_total(), 100_000);
    }

    #[test]
    fn rejects_completion_without_array() {
        assert!(matches!(
            parse_packages("抱歉，我无法给出推荐。"),
            Err(RecommendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn rejects_negative_amounts() {
        let completion = r#"[
  { "title": "t", "reason": "r", "suggestedValue": -5, "matchScore": 90, "items": [] }
]"#;
        assert!(matches!(
            parse_packages(completion),
            Err(RecommendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn validation_accepts_in_stock_consistent_packages() {
        let inventory = vec![stock("大红袍", 3, 50_000)];
        let packages = vec![package(vec![line("大红袍", 2, 50_000)])];
        assert!(validate_packages(&packages, &inventory).is_ok());
    }

    #[test]
    fn validation_rejects_unknown_item() {
        let inventory = vec![stock("大红袍", 3, 50_000)];
        let packages = vec![package(vec![line("金骏眉", 1, 50_000)])];
        assert!(matches!(
            validate_packages(&packages, &inventory),
            Err(RecommendError::Validation(_))
        ));
    }

    #[test]
    fn validation_rejects_overdrawn_stock() {
        let inventory = vec![stock("大红袍", 2, 50_000)];
        let packages = vec![package(vec![line("大红袍", 3, 50_000)])];
        assert!(matches!(
            validate_packages(&packages, &inventory),
            Err(RecommendError::Validation(_))
        ));
    }

    #[test]
    fn validation_sums_lines_drawing_on_the_same_item() {
        let inventory = vec![stock("大红袍", 3, 50_000)];
        let packages = vec![package(vec![
            line("大红袍", 2, 50_000),
            line("大红袍", 2, 50_000),
        ])];
        assert!(matches!(
            validate_packages(&packages, &inventory),
            Err(RecommendError::Validation(_))
        ));
    }

    #[test]
    fn validation_rejects_inconsistent_line_total() {
        let inventory = vec![stock("大红袍", 3, 50_000)];
        let mut bad = line("大红袍", 2, 50_000);
        bad.total = 99_000;
        let packages = vec![package(vec![bad])];
        assert!(matches!(
            validate_packages(&packages, &inventory),
            Err(RecommendError::Validation(_))
        ));
    }

    #[test]
    fn validation_limits_package_to_three_items() {
        let inventory = vec![stock("大红袍", 10, 50_000)];
        let packages = vec![package(vec![
            line("大红袍", 1, 50_000),
            line("大红袍", 1, 50_000),
            line("大红袍", 1, 50_000),
            line("大红袍", 1, 50_000),
        ])];
        assert!(matches!(
            validate_packages(&packages, &inventory),
            Err(RecommendError::Validation(_))
        ));
    }

    #[test]
    fn fallback_builds_one_value_matched_package() {
        let scored = vec![
            ScoredCandidate {
                item: stock("大红袍", 3, 90_000),
                score: 140.0,
            },
            ScoredCandidate {
                item: stock("金骏眉", 2, 80_000),
                score: 120.0,
            },
        ];
        let packages = fallback_packages(100_000, &scored);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].items.len(), 2);
        assert_eq!(packages[0].items[0].name, "大红袍");
        assert_eq!(packages[0].suggested_value, 100_000);
    }

    #[test]
    fn fallback_is_empty_when_nothing_scores() {
        assert!(fallback_packages(100_000, &[]).is_empty());
    }

    #[test]
    fn prompt_mentions_gift_value_and_inventory() {
        let ctx = ReplyPromptContext {
            gift_lines: vec![("酒类".to_string(), "茅台".to_string(), 1, 150_000)],
            total_value: 150_000,
            contact: Some(PromptContact {
                name: "李明".to_string(),
                gender: Some("男".to_string()),
                age: Some(45),
                company: None,
            }),
            received_history: vec![],
            sent_history: vec![],
            today: "2025-09-15".parse().unwrap(),
            season: Season::Autumn,
            inventory: vec![stock("大红袍", 3, 90_000)],
        };

        let prompt = build_reply_prompt(&ctx);
        assert!(prompt.contains("¥1500"));
        assert!(prompt.contains("大红袍"));
        assert!(prompt.contains("秋季"));
        assert!(prompt.contains("中秋节"));
        assert!(prompt.contains("李明"));
        assert!(prompt.contains("无历史记录"));
    }
}
