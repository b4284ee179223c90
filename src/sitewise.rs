use crate::config::Config;
use crate::entry::{Quality, TimeSeriesEntry};
use crate::store::{EntryError, PropertyValueStore, StoreError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iotsitewise::error::DisplayErrorContext;
use aws_sdk_iotsitewise::types::{
    AssetPropertyValue, PutAssetPropertyValueEntry, Quality as SiteWiseQuality, TimeInNanos,
    Variant,
};
use aws_sdk_iotsitewise::Client;

#[derive(Clone)]
pub struct SiteWiseStore {
    client: Client,
}

impl SiteWiseStore {
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.aws_region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.sitewise_endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;
        tracing::info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            "SiteWise client configured"
        );
        Self {
            client: Client::new(&sdk_config),
        }
    }
}

fn encode_entry(entry: &TimeSeriesEntry) -> Result<PutAssetPropertyValueEntry, StoreError> {
    let encode_err = |err: aws_sdk_iotsitewise::error::BuildError| StoreError::Encode {
        entry_id: entry.entry_id.clone(),
        message: err.to_string(),
    };

    let timestamp = TimeInNanos::builder()
        .time_in_seconds(entry.timestamp.time_in_seconds)
        .offset_in_nanos(entry.timestamp.offset_in_nanos)
        .build()
        .map_err(encode_err)?;
    let quality = match entry.quality {
        Quality::Good => SiteWiseQuality::Good,
    };
    let value = AssetPropertyValue::builder()
        .value(Variant::builder().string_value(entry.value.clone()).build())
        .timestamp(timestamp)
        .quality(quality)
        .build();

    PutAssetPropertyValueEntry::builder()
        .entry_id(entry.entry_id.clone())
        .asset_id(entry.asset_id.clone())
        .property_id(entry.property_id.clone())
        .property_values(value)
        .build()
        .map_err(encode_err)
}

#[async_trait]
impl PropertyValueStore for SiteWiseStore {
    async fn batch_put(&self, entries: &[TimeSeriesEntry]) -> Result<Vec<EntryError>, StoreError> {
        let encoded = entries
            .iter()
            .map(encode_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .batch_put_asset_property_value()
            .set_entries(Some(encoded))
            .send()
            .await
            .map_err(|err| StoreError::Call(DisplayErrorContext(&err).to_string()))?;

        let rejected = output
            .error_entries()
            .iter()
            .flat_map(|error_entry| {
                error_entry.errors().iter().map(move |error| EntryError {
                    entry_id: error_entry.entry_id().to_string(),
                    error_code: error.error_code().as_str().to_string(),
                    error_message: error.error_message().to_string(),
                })
            })
            .collect();
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryTimestamp;

    #[test]
    fn encodes_entry_as_single_good_string_value() {
        let entry = TimeSeriesEntry {
            entry_id: "A1_state".to_string(),
            asset_id: "asset-a1".to_string(),
            property_id: "p-state".to_string(),
            value: "raw".to_string(),
            timestamp: EntryTimestamp::from_seconds(1_700_000_000),
            quality: Quality::Good,
        };

        let encoded = encode_entry(&entry).expect("encoded");
        assert_eq!(encoded.entry_id(), "A1_state");
        assert_eq!(encoded.asset_id(), Some("asset-a1"));
        assert_eq!(encoded.property_id(), Some("p-state"));

        let values = encoded.property_values();
        assert_eq!(values.len(), 1);
        let value = &values[0];
        assert_eq!(
            value.value().and_then(|v| v.string_value()),
            Some("raw")
        );
        let timestamp = value.timestamp().expect("timestamp");
        assert_eq!(timestamp.time_in_seconds(), 1_700_000_000);
        assert_eq!(timestamp.offset_in_nanos(), Some(0));
        assert_eq!(value.quality(), Some(&SiteWiseQuality::Good));
    }
}
