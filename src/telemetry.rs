use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct StockEvent {
    pub ts: i64,
    pub stock_items: Vec<StockItem>,
}

impl StockEvent {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.ts, 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StockItem {
    pub location: Option<String>,
    pub workpiece: Map<String, Value>,
}

impl StockItem {
    fn from_value(raw: &Value) -> Self {
        let location = raw
            .get("location")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|location| !location.is_empty());
        let workpiece = raw
            .get("workpiece")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self {
            location,
            workpiece,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEvent {
    #[error("event is not a JSON object")]
    NotAnObject,
    #[error("timestamp `ts` is missing")]
    MissingTimestamp,
    #[error("timestamp `ts` is not an integer: {0}")]
    NonIntegerTimestamp(String),
    #[error("`stockItems` is missing")]
    MissingStockItems,
    #[error("`stockItems` is not a list")]
    StockItemsNotAList,
    #[error("`stockItems` is empty")]
    EmptyStockItems,
}

/// Checks the envelope of an inbound event and extracts its stock items.
///
/// `ts` must be a JSON integer that fits in an `i64`; floats, strings,
/// booleans and `null` are rejected. `stockItems` must be a non-empty list.
/// Individual items are not validated here.
pub fn validate_event(event: &Value) -> Result<StockEvent, InvalidEvent> {
    let event = event.as_object().ok_or(InvalidEvent::NotAnObject)?;

    let ts = match event.get("ts") {
        None | Some(Value::Null) => return Err(InvalidEvent::MissingTimestamp),
        Some(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| InvalidEvent::NonIntegerTimestamp(number.to_string()))?,
        Some(other) => return Err(InvalidEvent::NonIntegerTimestamp(other.to_string())),
    };

    let raw_items = match event.get("stockItems") {
        None | Some(Value::Null) => return Err(InvalidEvent::MissingStockItems),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(InvalidEvent::StockItemsNotAList),
    };
    if raw_items.is_empty() {
        return Err(InvalidEvent::EmptyStockItems);
    }

    Ok(StockEvent {
        ts,
        stock_items: raw_items.iter().map(StockItem::from_value).collect(),
    })
}
