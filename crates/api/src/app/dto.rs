//! Request/response DTOs and JSON mapping helpers.
//!
//! Monetary fields travel as integer fen. Status, gender, and reminder-type
//! labels cross the wire in the same Chinese forms the UI shows.

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use renqing_ai::{GiftPackage, ScoredCandidate};
use renqing_contacts::Gender;
use renqing_gifts::{GiftLine, ReminderKind, ReplyLine};
use renqing_infra::projections::{
    ContactReadModel, GiftReadModel, InventoryReadModel, OutgoingReadModel, ReminderReadModel,
};
use renqing_inventory::{InventoryItemId, Provenance};
use renqing_outgoing::OutgoingLine;

use super::services::{
    NewGift, NewInventoryItem, NewOutgoingGift, StatsSummary, status_label,
};

// ── requests ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GiftLineRequest {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateGiftRequest {
    pub from_person: String,
    pub from_company: Option<String>,
    pub received_date: chrono::NaiveDate,
    pub notes: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub items: Vec<GiftLineRequest>,
}

impl CreateGiftRequest {
    pub fn into_new_gift(self) -> NewGift {
        NewGift {
            from_person: self.from_person,
            from_company: self.from_company,
            received_date: self.received_date,
            notes: self.notes,
            photos: self.photos,
            lines: self
                .items
                .into_iter()
                .map(|l| GiftLine {
                    item_name: l.item_name,
                    category: l.category,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateGiftRequest {
    pub from_person: Option<String>,
    pub from_company: Option<String>,
    pub received_date: Option<chrono::NaiveDate>,
    pub notes: Option<String>,
    pub photos: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyLineRequest {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub inventory_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply_date: chrono::NaiveDate,
    pub items: Vec<ReplyLineRequest>,
}

impl ReplyRequest {
    /// Fails with the offending id text when an inventory reference does not
    /// parse.
    pub fn into_reply_lines(self) -> Result<Vec<ReplyLine>, String> {
        self.items
            .into_iter()
            .map(|l| {
                let inventory_ref = match l.inventory_id {
                    Some(raw) => Some(
                        raw.parse()
                            .map(InventoryItemId::new)
                            .map_err(|_| raw)?,
                    ),
                    None => None,
                };
                Ok(ReplyLine {
                    item_name: l.item_name,
                    category: l.category,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    inventory_ref,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInventoryRequest {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub description: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl CreateInventoryRequest {
    pub fn into_new_item(self) -> NewInventoryItem {
        NewInventoryItem {
            name: self.name,
            category: self.category,
            quantity: self.quantity,
            unit_price: self.unit_price,
            description: self.description,
            photos: self.photos,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateInventoryRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<u64>,
    pub description: Option<String>,
    pub photos: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct BatchIdsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OutgoingLineRequest {
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub inventory_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOutgoingRequest {
    pub to_person: String,
    pub to_company: Option<String>,
    pub send_date: chrono::NaiveDate,
    pub notes: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub items: Vec<OutgoingLineRequest>,
}

impl CreateOutgoingRequest {
    pub fn into_new_outgoing(self) -> Result<NewOutgoingGift, String> {
        let lines = self
            .items
            .into_iter()
            .map(|l| {
                let inventory_ref = match l.inventory_id {
                    Some(raw) => Some(
                        raw.parse()
                            .map(InventoryItemId::new)
                            .map_err(|_| raw)?,
                    ),
                    None => None,
                };
                Ok(OutgoingLine {
                    item_name: l.item_name,
                    category: l.category,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    inventory_ref,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(NewOutgoingGift {
            to_person: self.to_person,
            to_company: self.to_company,
            send_date: self.send_date,
            notes: self.notes,
            photos: self.photos,
            lines,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub gift_id: String,
    pub reminder_type: String,
    pub reminder_date: chrono::NaiveDate,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessageRequest>,
}

// ── label mappings ────────────────────────────────────────────────────

pub fn parse_gender(label: &str) -> Option<Gender> {
    match label {
        "男" => Some(Gender::Male),
        "女" => Some(Gender::Female),
        "未知" => Some(Gender::Unknown),
        _ => None,
    }
}

pub fn gender_label(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "男",
        Gender::Female => "女",
        Gender::Unknown => "未知",
    }
}

pub fn parse_reminder_kind(label: &str) -> Option<ReminderKind> {
    match label {
        "待回礼" => Some(ReminderKind::PendingReply),
        "生日" => Some(ReminderKind::Birthday),
        "节日" => Some(ReminderKind::Holiday),
        "自定义" => Some(ReminderKind::Custom),
        _ => None,
    }
}

pub fn reminder_kind_label(kind: ReminderKind) -> &'static str {
    match kind {
        ReminderKind::PendingReply => "待回礼",
        ReminderKind::Birthday => "生日",
        ReminderKind::Holiday => "节日",
        ReminderKind::Custom => "自定义",
    }
}

// ── responses ─────────────────────────────────────────────────────────

pub fn gift_to_json(g: &GiftReadModel) -> JsonValue {
    json!({
        "id": g.gift_id.to_string(),
        "from_person": g.from_person,
        "from_company": g.from_company,
        "received_date": g.received_date.to_string(),
        "notes": g.notes,
        "photos": g.photos,
        "status": status_label(g.status),
        "estimated_value": g.estimated_value,
        "items": g.lines.iter().map(gift_line_to_json).collect::<Vec<_>>(),
        "reply_date": g.reply_date.map(|d| d.to_string()),
        "reply_cost": g.reply_cost,
        "reply_items": g.reply_items.iter().map(reply_line_to_json).collect::<Vec<_>>(),
    })
}

fn gift_line_to_json(l: &GiftLine) -> JsonValue {
    json!({
        "item_name": l.item_name,
        "category": l.category,
        "quantity": l.quantity,
        "unit_price": l.unit_price,
        "subtotal": l.subtotal(),
    })
}

fn reply_line_to_json(l: &ReplyLine) -> JsonValue {
    json!({
        "item_name": l.item_name,
        "category": l.category,
        "quantity": l.quantity,
        "unit_price": l.unit_price,
        "subtotal": l.subtotal(),
        "inventory_id": l.inventory_ref.map(|id| id.to_string()),
    })
}

pub fn inventory_to_json(i: &InventoryReadModel) -> JsonValue {
    let (source, gift_id) = match i.provenance {
        Provenance::Manual => ("manual", None),
        Provenance::Received { gift_id } => ("received", Some(gift_id.to_string())),
    };

    json!({
        "id": i.item_id.to_string(),
        "name": i.name,
        "category": i.category,
        "quantity": i.quantity,
        "price": i.unit_price,
        "description": i.description,
        "photos": i.photos,
        "source": source,
        "gift_id": gift_id,
    })
}

pub fn contact_to_json(c: &ContactReadModel) -> JsonValue {
    json!({
        "id": c.contact_id.to_string(),
        "name": c.name,
        "phone": c.profile.phone,
        "email": c.profile.email,
        "address": c.profile.address,
        "company": c.profile.company,
        "notes": c.profile.notes,
        "age": c.profile.age,
        "gender": c.profile.gender.map(gender_label),
    })
}

pub fn outgoing_to_json(g: &OutgoingReadModel) -> JsonValue {
    json!({
        "id": g.outgoing_id.to_string(),
        "to_person": g.to_person,
        "to_company": g.to_company,
        "send_date": g.send_date.to_string(),
        "notes": g.notes,
        "photos": g.photos,
        "total_cost": g.total_cost,
        "items": g.lines.iter().map(outgoing_line_to_json).collect::<Vec<_>>(),
    })
}

fn outgoing_line_to_json(l: &OutgoingLine) -> JsonValue {
    json!({
        "item_name": l.item_name,
        "category": l.category,
        "quantity": l.quantity,
        "unit_price": l.unit_price,
        "subtotal": l.subtotal(),
        "inventory_id": l.inventory_ref.map(|id| id.to_string()),
    })
}

pub fn reminder_to_json(r: &ReminderReadModel) -> JsonValue {
    json!({
        "id": r.reminder_id.to_string(),
        "gift_id": r.gift_id.to_string(),
        "reminder_type": reminder_kind_label(r.kind),
        "reminder_date": r.remind_on.to_string(),
        "message": r.message,
        "is_completed": r.completed,
    })
}

pub fn scored_candidate_to_json(s: &ScoredCandidate) -> JsonValue {
    json!({
        "inventory_id": s.item.item_id,
        "name": s.item.name,
        "category": s.item.category,
        "quantity": s.item.quantity,
        "price": s.item.unit_price,
        "score": s.score,
    })
}

pub fn package_to_json(p: &GiftPackage) -> JsonValue {
    json!({
        "title": p.title,
        "reason": p.reason,
        "suggested_value": p.suggested_value,
        "match_score": p.match_score,
        "cultural_note": p.cultural_note,
        "items_total": p.items_total(),
        "items": p.items.iter().map(|l| json!({
            "name": l.name,
            "category": l.category,
            "quantity": l.quantity,
            "unit_price": l.unit_price,
            "total": l.total,
        })).collect::<Vec<_>>(),
    })
}

pub fn stats_to_json(s: &StatsSummary) -> JsonValue {
    json!({
        "total_gifts": s.total_gifts,
        "pending_count": s.pending_count,
        "replied_count": s.replied_count,
        "sent_count": s.sent_count,
        "received_value": s.received_value,
        "sent_value": s.sent_value,
        "net_balance": s.net_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_labels_round_trip() {
        for gender in [Gender::Male, Gender::Female, Gender::Unknown] {
            assert_eq!(parse_gender(gender_label(gender)), Some(gender));
        }
        assert_eq!(parse_gender("其他"), None);
    }

    #[test]
    fn reminder_kind_labels_round_trip() {
        for kind in [
            ReminderKind::PendingReply,
            ReminderKind::Birthday,
            ReminderKind::Holiday,
            ReminderKind::Custom,
        ] {
            assert_eq!(parse_reminder_kind(reminder_kind_label(kind)), Some(kind));
        }
        assert_eq!(parse_reminder_kind("随便"), None);
    }

    #[test]
    fn reply_request_rejects_malformed_inventory_id() {
        let request = ReplyRequest {
            reply_date: "2025-09-20".parse().unwrap(),
            items: vec![ReplyLineRequest {
                item_name: "大红袍".to_string(),
                category: "茶叶".to_string(),
                quantity: 1,
                unit_price: 50_000,
                inventory_id: Some("not-a-uuid".to_string()),
            }],
        };

        assert_eq!(request.into_reply_lines().unwrap_err(), "not-a-uuid");
    }
}
