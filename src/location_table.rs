use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const WORKPIECE_ID_PROPERTY: &str = "6f85f8bc-e85b-45d7-b999-5e6948e6b2ae";
const WORKPIECE_TYPE_PROPERTY: &str = "12b72c1a-aff6-4667-9a6c-f4f07a548f2b";
const WORKPIECE_STATE_PROPERTY: &str = "64de9a70-58ee-4e01-9333-68cbc5b2d54a";

/// Workpiece attributes forwarded per location, in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    Id,
    Type,
    State,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Id, Attribute::Type, Attribute::State];

    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Id => "id",
            Attribute::Type => "type",
            Attribute::State => "state",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "id" => Ok(Attribute::Id),
            "type" => Ok(Attribute::Type),
            "state" => Ok(Attribute::State),
            other => bail!("unknown workpiece attribute {other:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationRecord {
    pub asset_id: String,
    pub properties: BTreeMap<Attribute, String>,
}

impl LocationRecord {
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, attribute: Attribute, property_id: impl Into<String>) -> Self {
        self.properties.insert(attribute, property_id.into());
        self
    }

    /// Property id for `attribute`; blank ids are treated as unmapped.
    pub fn property_id(&self, attribute: Attribute) -> Option<&str> {
        self.properties
            .get(&attribute)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }
}

/// Immutable location code -> SiteWise identifier table, built once per process.
#[derive(Clone, Debug, Default)]
pub struct LocationTable {
    records: HashMap<String, LocationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationRecordFile {
    asset_id: String,
    #[serde(default)]
    properties: HashMap<String, String>,
}

impl LocationTable {
    pub fn new(records: impl IntoIterator<Item = (String, LocationRecord)>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Locations provisioned in the production SiteWise asset model.
    pub fn builtin() -> Self {
        let slot = |asset_id: &str| {
            LocationRecord::new(asset_id)
                .with_property(Attribute::Id, WORKPIECE_ID_PROPERTY)
                .with_property(Attribute::Type, WORKPIECE_TYPE_PROPERTY)
                .with_property(Attribute::State, WORKPIECE_STATE_PROPERTY)
        };
        Self::new([
            (
                "A1".to_string(),
                slot("d5b83296-409a-4b05-a09a-fb2bb4ce9852"),
            ),
            (
                "C3".to_string(),
                slot("81b62d80-3092-4499-8806-58e17ffd2634"),
            ),
        ])
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read location table {}", path.display()))?;
        Self::from_json_bytes(contents.into_bytes())
            .with_context(|| format!("parse location table {}", path.display()))
    }

    fn from_json_bytes(mut bytes: Vec<u8>) -> Result<Self> {
        let raw: HashMap<String, LocationRecordFile> = simd_json::serde::from_slice(&mut bytes)?;
        let mut records = HashMap::with_capacity(raw.len());
        for (location, file_record) in raw {
            let location = location.trim().to_string();
            if location.is_empty() {
                bail!("location code must not be blank");
            }
            let asset_id = file_record.asset_id.trim();
            if asset_id.is_empty() {
                bail!("location {location} has a blank assetId");
            }
            let mut record = LocationRecord::new(asset_id);
            for (attribute, property_id) in file_record.properties {
                let attribute = attribute
                    .parse::<Attribute>()
                    .with_context(|| format!("location {location}"))?;
                record = record.with_property(attribute, property_id.trim());
            }
            records.insert(location, record);
        }
        Ok(Self { records })
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let table = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::builtin(),
        };
        tracing::info!(
            locations = table.len(),
            source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".into()),
            "location table loaded"
        );
        Ok(table)
    }

    pub fn get(&self, location: &str) -> Option<&LocationRecord> {
        self.records.get(location)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
