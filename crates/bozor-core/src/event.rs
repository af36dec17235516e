//! # Change Events
//!
//! Transient notifications pushed to live dashboards after a commit.
//!
//! | Channel        | Payload                                   |
//! |----------------|-------------------------------------------|
//! | `newSale`      | full `Sale`                               |
//! | `saleUpdate`   | full `Sale` or `{ id, deleted: true }`    |
//! | `stockUpdate`  | full `StockItem` or `{ id, deleted: true }` |
//! | `debtorUpdate` | full `Debtor` or `{ id, deleted: true }`  |

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use crate::types::{Debtor, Sale, StockItem};

/// A named pub/sub channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    NewSale,
    SaleUpdate,
    StockUpdate,
    DebtorUpdate,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::NewSale,
        Channel::SaleUpdate,
        Channel::StockUpdate,
        Channel::DebtorUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::NewSale => "newSale",
            Channel::SaleUpdate => "saleUpdate",
            Channel::StockUpdate => "stockUpdate",
            Channel::DebtorUpdate => "debtorUpdate",
        }
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either the entity after the change, or a marker that it is gone.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    Updated(T),
    Deleted { id: String },
}

impl<T: Serialize> Snapshot<T> {
    fn to_payload(&self) -> serde_json::Result<Value> {
        match self {
            Snapshot::Updated(entity) => serde_json::to_value(entity),
            Snapshot::Deleted { id } => Ok(json!({ "id": id, "deleted": true })),
        }
    }
}

/// Something that changed and who should hear about it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    NewSale(Sale),
    SaleChanged(Snapshot<Sale>),
    StockChanged(Snapshot<StockItem>),
    DebtorChanged(Snapshot<Debtor>),
}

impl ChangeEvent {
    pub fn channel(&self) -> Channel {
        match self {
            ChangeEvent::NewSale(_) => Channel::NewSale,
            ChangeEvent::SaleChanged(_) => Channel::SaleUpdate,
            ChangeEvent::StockChanged(_) => Channel::StockUpdate,
            ChangeEvent::DebtorChanged(_) => Channel::DebtorUpdate,
        }
    }

    /// JSON body sent on the wire.
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            ChangeEvent::NewSale(sale) => serde_json::to_value(sale),
            ChangeEvent::SaleChanged(s) => s.to_payload(),
            ChangeEvent::StockChanged(s) => s.to_payload(),
            ChangeEvent::DebtorChanged(s) => s.to_payload(),
        }
    }

    /// Id of the entity the event is about.
    pub fn entity_id(&self) -> &str {
        match self {
            ChangeEvent::NewSale(sale) | ChangeEvent::SaleChanged(Snapshot::Updated(sale)) => {
                &sale.id
            }
            ChangeEvent::StockChanged(Snapshot::Updated(item)) => &item.id,
            ChangeEvent::DebtorChanged(Snapshot::Updated(debtor)) => &debtor.id,
            ChangeEvent::SaleChanged(Snapshot::Deleted { id })
            | ChangeEvent::StockChanged(Snapshot::Deleted { id })
            | ChangeEvent::DebtorChanged(Snapshot::Deleted { id }) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::Utc;

    #[test]
    fn test_channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_name(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::from_name("unknown"), None);
    }

    #[test]
    fn test_deleted_payload() {
        let event = ChangeEvent::SaleChanged(Snapshot::Deleted {
            id: "s1".to_string(),
        });
        assert_eq!(event.channel(), Channel::SaleUpdate);
        assert_eq!(event.entity_id(), "s1");
        assert_eq!(
            event.payload().unwrap(),
            json!({ "id": "s1", "deleted": true })
        );
    }

    #[test]
    fn test_stock_payload_is_full_snapshot() {
        let now = Utc::now();
        let item = StockItem {
            id: "apple".to_string(),
            name: "Apple".to_string(),
            unit_price: Money::from_minor(5000),
            unit: "kg".to_string(),
            quantity: 6,
            description: None,
            created_by: None,
            updated_by: Some("u1".to_string()),
            created_at: now,
            updated_at: now,
        };
        let event = ChangeEvent::StockChanged(Snapshot::Updated(item));
        let payload = event.payload().unwrap();
        assert_eq!(event.channel().as_str(), "stockUpdate");
        assert_eq!(payload["quantity"], 6);
        assert_eq!(payload["unitPrice"], 5000);
        assert_eq!(payload["name"], "Apple");
    }
}
