use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use renqing_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LedgerId};
use renqing_events::Event;

/// Inventory item identifier (ledger-scoped via `ledger_id` in events).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Where a stock item came from.
///
/// Items converted from a received gift keep the gift's aggregate id so that
/// deleting the gift can sweep its converted stock along with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Provenance {
    Manual,
    Received { gift_id: AggregateId },
}

impl Provenance {
    pub fn origin_gift(&self) -> Option<AggregateId> {
        match self {
            Provenance::Manual => None,
            Provenance::Received { gift_id } => Some(*gift_id),
        }
    }
}

/// Aggregate root: one stock line of a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    ledger_id: Option<LedgerId>,
    name: String,
    category: String,
    quantity: i64,
    /// Price in fen (cents of CNY).
    unit_price: u64,
    description: Option<String>,
    photos: Vec<String>,
    provenance: Provenance,
    deleted: bool,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Empty, not-yet-created instance for stream rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            ledger_id: None,
            name: String::new(),
            category: String::new(),
            quantity: 0,
            unit_price: 0,
            description: None,
            photos: Vec::new(),
            provenance: Provenance::Manual,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn ledger_id(&self) -> Option<LedgerId> {
        self.ledger_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub provenance: Provenance,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItemDetails. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemDetails {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<u64>,
    pub description: Option<String>,
    pub photos: Option<Vec<String>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (delta may be negative, result may not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItem {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    CreateItem(CreateItem),
    UpdateItemDetails(UpdateItemDetails),
    AdjustStock(AdjustStock),
    DeleteItem(DeleteItem),
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub provenance: Provenance,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsUpdated {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<u64>,
    pub description: Option<String>,
    pub photos: Option<Vec<String>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeleted {
    pub ledger_id: LedgerId,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    ItemDetailsUpdated(ItemDetailsUpdated),
    StockAdjusted(StockAdjusted),
    ItemDeleted(ItemDeleted),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::ItemDetailsUpdated(_) => "inventory.item.details_updated",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
            InventoryEvent::ItemDeleted(_) => "inventory.item.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::ItemDetailsUpdated(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
            InventoryEvent::ItemDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.ledger_id = Some(e.ledger_id);
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.quantity = e.quantity;
                self.unit_price = e.unit_price;
                self.description = e.description.clone();
                self.photos = e.photos.clone();
                self.provenance = e.provenance;
                self.deleted = false;
                self.created = true;
            }
            InventoryEvent::ItemDetailsUpdated(e) => {
                if let Some(name) = &e.name {
                    self.name = name.clone();
                }
                if let Some(category) = &e.category {
                    self.category = category.clone();
                }
                if let Some(unit_price) = e.unit_price {
                    self.unit_price = unit_price;
                }
                if let Some(description) = &e.description {
                    self.description = Some(description.clone());
                }
                if let Some(photos) = &e.photos {
                    self.photos = photos.clone();
                }
            }
            InventoryEvent::StockAdjusted(e) => {
                self.quantity += e.delta;
            }
            InventoryEvent::ItemDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::CreateItem(cmd) => self.handle_create(cmd),
            InventoryCommand::UpdateItemDetails(cmd) => self.handle_update(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            InventoryCommand::DeleteItem(cmd) => self.handle_delete(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_ledger(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.ledger_id != Some(ledger_id) {
            return Err(DomainError::invariant("ledger mismatch"));
        }
        Ok(())
    }

    fn ensure_item_id(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if cmd.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        Ok(vec![InventoryEvent::ItemCreated(ItemCreated {
            ledger_id: cmd.ledger_id,
            item_id: cmd.item_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            description: cmd.description.clone(),
            photos: cmd.photos.clone(),
            provenance: cmd.provenance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateItemDetails) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if let Some(name) = &cmd.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(category) = &cmd.category {
            if category.trim().is_empty() {
                return Err(DomainError::validation("category cannot be empty"));
            }
        }

        Ok(vec![InventoryEvent::ItemDetailsUpdated(ItemDetailsUpdated {
            ledger_id: cmd.ledger_id,
            item_id: cmd.item_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            unit_price: cmd.unit_price,
            description: cmd.description.clone(),
            photos: cmd.photos.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_quantity = self.quantity + cmd.delta;
        if new_quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stock cannot go negative (have {}, delta {})",
                self.quantity, cmd.delta
            )));
        }

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            ledger_id: cmd.ledger_id,
            item_id: cmd.item_id,
            delta: cmd.delta,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_ledger(cmd.ledger_id)?;
        self.ensure_item_id(cmd.item_id)?;

        Ok(vec![InventoryEvent::ItemDeleted(ItemDeleted {
            ledger_id: cmd.ledger_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ledger_id() -> LedgerId {
        LedgerId::new()
    }

    fn test_item_id() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_item(ledger_id: LedgerId, item_id: InventoryItemId, quantity: i64) -> InventoryItem {
        let mut item = InventoryItem::empty(item_id);
        let cmd = CreateItem {
            ledger_id,
            item_id,
            name: "大红袍".to_string(),
            category: "茶叶".to_string(),
            quantity,
            unit_price: 50_000,
            description: None,
            photos: vec![],
            provenance: Provenance::Manual,
            occurred_at: test_time(),
        };
        let events = item.handle(&InventoryCommand::CreateItem(cmd)).unwrap();
        item.apply(&events[0]);
        item
    }

    #[test]
    fn create_item_emits_item_created() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let item = InventoryItem::empty(item_id);

        let cmd = CreateItem {
            ledger_id,
            item_id,
            name: "五粮液".to_string(),
            category: "酒类".to_string(),
            quantity: 3,
            unit_price: 120_000,
            description: Some("客户答谢备货".to_string()),
            photos: vec![],
            provenance: Provenance::Manual,
            occurred_at: test_time(),
        };

        let events = item.handle(&InventoryCommand::CreateItem(cmd)).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            InventoryEvent::ItemCreated(e) => {
                assert_eq!(e.ledger_id, ledger_id);
                assert_eq!(e.quantity, 3);
                assert_eq!(e.unit_price, 120_000);
            }
            other => panic!("expected ItemCreated, got {other:?}"),
        }
    }

    #[test]
    fn create_twice_conflicts() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let item = created_item(ledger_id, item_id, 1);

        let cmd = CreateItem {
            ledger_id,
            item_id,
            name: "again".to_string(),
            category: "礼品".to_string(),
            quantity: 1,
            unit_price: 100,
            description: None,
            photos: vec![],
            provenance: Provenance::Manual,
            occurred_at: test_time(),
        };
        let err = item
            .handle(&InventoryCommand::CreateItem(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn negative_initial_quantity_rejected() {
        let item_id = test_item_id();
        let item = InventoryItem::empty(item_id);
        let cmd = CreateItem {
            ledger_id: test_ledger_id(),
            item_id,
            name: "x".to_string(),
            category: "礼品".to_string(),
            quantity: -1,
            unit_price: 100,
            description: None,
            photos: vec![],
            provenance: Provenance::Manual,
            occurred_at: test_time(),
        };
        assert!(matches!(
            item.handle(&InventoryCommand::CreateItem(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn adjust_cannot_cross_zero() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let item = created_item(ledger_id, item_id, 2);

        let cmd = AdjustStock {
            ledger_id,
            item_id,
            delta: -3,
            occurred_at: test_time(),
        };
        let err = item
            .handle(&InventoryCommand::AdjustStock(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        // Decision-time rejection: no event, state untouched.
        assert_eq!(item.quantity(), 2);
    }

    #[test]
    fn adjust_to_exactly_zero_is_allowed() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let mut item = created_item(ledger_id, item_id, 2);

        let cmd = AdjustStock {
            ledger_id,
            item_id,
            delta: -2,
            occurred_at: test_time(),
        };
        let events = item.handle(&InventoryCommand::AdjustStock(cmd)).unwrap();
        item.apply(&events[0]);
        assert_eq!(item.quantity(), 0);
    }

    #[test]
    fn zero_delta_rejected() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let item = created_item(ledger_id, item_id, 2);

        let cmd = AdjustStock {
            ledger_id,
            item_id,
            delta: 0,
            occurred_at: test_time(),
        };
        assert!(matches!(
            item.handle(&InventoryCommand::AdjustStock(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn deleted_item_rejects_further_commands() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let mut item = created_item(ledger_id, item_id, 2);

        let delete = DeleteItem {
            ledger_id,
            item_id,
            occurred_at: test_time(),
        };
        let events = item.handle(&InventoryCommand::DeleteItem(delete)).unwrap();
        item.apply(&events[0]);
        assert!(item.is_deleted());

        let adjust = AdjustStock {
            ledger_id,
            item_id,
            delta: 1,
            occurred_at: test_time(),
        };
        assert!(matches!(
            item.handle(&InventoryCommand::AdjustStock(adjust)),
            Err(DomainError::NotFound)
        ));
    }

    #[test]
    fn update_details_patches_only_present_fields() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();
        let mut item = created_item(ledger_id, item_id, 2);

        let cmd = UpdateItemDetails {
            ledger_id,
            item_id,
            name: None,
            category: None,
            unit_price: Some(60_000),
            description: Some("改价".to_string()),
            photos: None,
            occurred_at: test_time(),
        };
        let events = item
            .handle(&InventoryCommand::UpdateItemDetails(cmd))
            .unwrap();
        item.apply(&events[0]);

        assert_eq!(item.unit_price(), 60_000);
        assert_eq!(item.name(), "大红袍");
        assert_eq!(item.category(), "茶叶");
    }

    #[test]
    fn received_provenance_keeps_gift_link() {
        let gift_id = AggregateId::new();
        let provenance = Provenance::Received { gift_id };
        assert_eq!(provenance.origin_gift(), Some(gift_id));
        assert_eq!(Provenance::Manual.origin_gift(), None);
    }

    #[test]
    fn apply_is_deterministic() {
        let ledger_id = test_ledger_id();
        let item_id = test_item_id();

        let created = InventoryEvent::ItemCreated(ItemCreated {
            ledger_id,
            item_id,
            name: "茅台".to_string(),
            category: "酒类".to_string(),
            quantity: 5,
            unit_price: 300_000,
            description: None,
            photos: vec![],
            provenance: Provenance::Manual,
            occurred_at: test_time(),
        });
        let adjusted = InventoryEvent::StockAdjusted(StockAdjusted {
            ledger_id,
            item_id,
            delta: -2,
            occurred_at: test_time(),
        });

        let mut a = InventoryItem::empty(item_id);
        let mut b = InventoryItem::empty(item_id);
        for e in [&created, &adjusted] {
            a.apply(e);
            b.apply(e);
        }

        assert_eq!(a, b);
        assert_eq!(a.quantity(), 3);
        assert_eq!(a.version(), 2);
    }
}
