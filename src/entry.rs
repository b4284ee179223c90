use crate::location_table::{Attribute, LocationTable};
use crate::telemetry::StockItem;
use serde_json::Value;

pub const EMPTY_VALUE: &str = "EMPTY";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quality {
    Good,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryTimestamp {
    pub time_in_seconds: i64,
    pub offset_in_nanos: i32,
}

impl EntryTimestamp {
    pub fn from_seconds(time_in_seconds: i64) -> Self {
        Self {
            time_in_seconds,
            offset_in_nanos: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSeriesEntry {
    pub entry_id: String,
    pub asset_id: String,
    pub property_id: String,
    pub value: String,
    pub timestamp: EntryTimestamp,
    pub quality: Quality,
}

#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub entries: Vec<TimeSeriesEntry>,
    pub skipped_items: usize,
    pub skipped_attributes: usize,
}

/// Turns a raw workpiece value into the string forwarded to the store.
///
/// Absent, `null`, `""` and empty containers become [`EMPTY_VALUE`].
/// Numbers keep their JSON form, so a reading of `0` is forwarded as `"0"`.
pub fn coerce_value(raw: Option<&Value>) -> String {
    match raw {
        None | Some(Value::Null) => EMPTY_VALUE.to_string(),
        Some(Value::String(s)) if s.is_empty() => EMPTY_VALUE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if items.is_empty() => EMPTY_VALUE.to_string(),
        Some(Value::Object(fields)) if fields.is_empty() => EMPTY_VALUE.to_string(),
        Some(other) => other.to_string(),
    }
}

pub struct EntryBuilder<'a> {
    table: &'a LocationTable,
}

impl<'a> EntryBuilder<'a> {
    pub fn new(table: &'a LocationTable) -> Self {
        Self { table }
    }

    pub fn build(&self, ts: i64, items: &[StockItem]) -> BuildOutcome {
        let timestamp = EntryTimestamp::from_seconds(ts);
        let mut outcome = BuildOutcome {
            entries: Vec::with_capacity(items.len() * Attribute::ALL.len()),
            ..BuildOutcome::default()
        };

        for item in items {
            let Some((location, record)) = item
                .location
                .as_deref()
                .and_then(|location| self.table.get(location).map(|record| (location, record)))
            else {
                tracing::warn!(location = ?item.location, "unknown or missing location; skipping item");
                outcome.skipped_items += 1;
                continue;
            };

            for attribute in Attribute::ALL {
                let value = coerce_value(item.workpiece.get(attribute.as_str()));
                let Some(property_id) = record.property_id(attribute) else {
                    tracing::warn!(location, %attribute, "no property id mapped; skipping attribute");
                    outcome.skipped_attributes += 1;
                    continue;
                };

                outcome.entries.push(TimeSeriesEntry {
                    entry_id: format!("{location}_{attribute}"),
                    asset_id: record.asset_id.clone(),
                    property_id: property_id.to_string(),
                    value,
                    timestamp,
                    quality: Quality::Good,
                });
            }
        }

        outcome
    }
}
