//! Device objects: the generic property map plus kind-specific wrappers.

pub mod fujitsu;
pub mod softener;
pub mod vacuum;

pub use fujitsu::{
    Capabilities, FanSpeed, FujitsuHvac, ModelType, OpMode, SwingMode,
};
pub use softener::{BypassDuration, Softener};
pub use vacuum::{OperatingMode, PowerMode, Vacuum};

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::AylaClient;
use crate::error::AylaError;
use crate::Result;

/// Timestamp format used by the device service.
pub(crate) const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Product names the vendor reports for Shark vacuums.
const VACUUM_PRODUCT_NAMES: &[&str] = &["Vacuum", "SharkIQ"];
/// Product names the vendor reports for water softeners.
const SOFTENER_PRODUCT_NAMES: &[&str] = &["Softener", "Smart HE", "Water Softener"];

/// One device as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    /// Device serial number, stable for the life of the registration.
    pub dsn: String,
    /// Numeric device key used by some per-device endpoints.
    pub key: u64,
    /// Vendor product name, used to classify the device kind.
    pub product_name: String,
    #[serde(default)]
    pub oem_model: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub lan_ip: Option<String>,
    #[serde(default)]
    pub connection_status: Option<String>,
}

/// Full property record from the properties endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Property {
    /// Raw vendor name, prefix included (e.g. `SET_Operating_Mode`).
    pub name: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub value: Option<Value>,
    /// Numeric property key, needed for file-property lookups.
    #[serde(default)]
    pub key: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyEnvelope {
    property: Property,
}

/// A property value cast to the type the vendor declares in `base_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Str(String),
    /// Cast failed or the base type is unknown; raw JSON value.
    Raw(Value),
}

impl PropertyValue {
    /// Cast a raw JSON value per the vendor base type. Falls back to the
    /// raw value when the cast does not apply.
    fn cast(value: &Value, base_type: Option<&str>) -> PropertyValue {
        let cast = match base_type {
            Some("boolean") => match value {
                Value::Bool(b) => Some(PropertyValue::Bool(*b)),
                Value::Number(n) => n.as_i64().map(|i| PropertyValue::Bool(i != 0)),
                Value::String(s) => s.parse().ok().map(PropertyValue::Bool),
                _ => None,
            },
            Some("integer") => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(PropertyValue::Int),
                Value::String(s) => s.parse().ok().map(PropertyValue::Int),
                _ => None,
            },
            Some("decimal") => match value {
                Value::Number(n) => n.as_f64().map(PropertyValue::Decimal),
                Value::String(s) => s.parse().ok().map(PropertyValue::Decimal),
                _ => None,
            },
            Some("string") => match value {
                Value::String(s) => Some(PropertyValue::Str(s.clone())),
                Value::Number(n) => Some(PropertyValue::Str(n.to_string())),
                _ => None,
            },
            _ => None,
        };

        cast.unwrap_or_else(|| {
            if base_type.is_some() {
                tracing::warn!(?value, ?base_type, "could not cast property value");
            }
            PropertyValue::Raw(value.clone())
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Int(i) => Some(*i != 0),
            PropertyValue::Raw(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::Decimal(f) => Some(*f as i64),
            PropertyValue::Raw(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Decimal(f) => Some(*f),
            PropertyValue::Str(s) => s.parse().ok(),
            PropertyValue::Raw(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            PropertyValue::Raw(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Strip the access prefix (`SET_`/`GET_`, any case) from a raw name.
/// Names are vendor data and not guaranteed ASCII, so the prefix check
/// works on bytes.
pub(crate) fn clean_property_name(raw: &str) -> &str {
    let prefixed = raw
        .as_bytes()
        .get(..4)
        .is_some_and(|p| p.eq_ignore_ascii_case(b"SET_") || p.eq_ignore_ascii_case(b"GET_"));
    if prefixed {
        &raw[4..]
    } else {
        raw
    }
}

/// Newest datapoint in a versioned-datapoint listing, by `updated_at`.
pub(crate) fn most_recent_datum<'a>(data: &'a [Value], date_field: &str) -> Option<&'a Value> {
    data.iter()
        .filter_map(|d| d.get("datapoint"))
        .filter_map(|dp| {
            let ts = dp.get(date_field)?.as_str()?;
            let t = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FMT).ok()?;
            Some((t, dp))
        })
        .max_by_key(|(t, _)| *t)
        .map(|(_, dp)| dp)
}

/// Generic device entity: identity fields plus the last-fetched property
/// map. Kind-specific wrappers deref to this.
#[derive(Debug)]
pub struct Device {
    api: AylaClient,
    dsn: String,
    key: u64,
    product_name: String,
    oem_model: Option<String>,
    model: Option<String>,
    serial_number: Option<String>,
    mac: Option<String>,
    lan_ip: Option<String>,
    connection_status: Option<String>,
    /// Cleaned property name → full record.
    properties: HashMap<String, Property>,
    /// Cleaned names that have a SET-prefixed counterpart.
    settable: HashSet<String>,
    /// Trigger key → trigger record.
    triggers: HashMap<u64, Value>,
}

impl Device {
    pub(crate) fn new(api: AylaClient, entry: DeviceEntry) -> Self {
        Self {
            api,
            serial_number: Some(entry.dsn.clone()),
            dsn: entry.dsn,
            key: entry.key,
            product_name: entry.product_name,
            oem_model: entry.oem_model,
            model: entry.model,
            mac: entry.mac,
            lan_ip: entry.lan_ip,
            connection_status: entry.connection_status,
            properties: HashMap::new(),
            settable: HashSet::new(),
            triggers: HashMap::new(),
        }
    }

    /// Device serial number; the stable identifier for this registration.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Numeric device key for the per-device endpoints.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Vendor product name.
    pub fn name(&self) -> &str {
        &self.product_name
    }

    pub fn oem_model(&self) -> Option<&str> {
        self.oem_model.as_deref()
    }

    /// Device model; for Shark vacuums refined by [`Device::update_metadata`].
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Unit serial number. Defaults to the DSN; Shark vacuums carry the
    /// real one in metadata.
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn mac(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    pub fn lan_ip(&self) -> Option<&str> {
        self.lan_ip.as_deref()
    }

    pub fn connection_status(&self) -> Option<&str> {
        self.connection_status.as_deref()
    }

    pub(crate) fn api(&self) -> &AylaClient {
        &self.api
    }

    /// The full property map, keyed by cleaned name.
    pub fn properties(&self) -> &HashMap<String, Property> {
        &self.properties
    }

    /// Cleaned names of properties that accept writes.
    pub fn settable_properties(&self) -> &HashSet<String> {
        &self.settable
    }

    /// Triggers accumulated by [`Device::update_property_triggers`].
    pub fn triggers(&self) -> &HashMap<u64, Value> {
        &self.triggers
    }

    /// Full record for one property, if known.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Typed value for one property, if known.
    pub fn property_value(&self, name: &str) -> Option<PropertyValue> {
        self.properties
            .get(name)
            .and_then(|p| p.value.as_ref().map(|v| (v, p.base_type.as_deref())))
            .map(|(v, t)| PropertyValue::cast(v, t))
    }

    /// Typed value for one property; `NotFound` when it is unknown.
    pub fn get_property_value(&self, name: &str) -> Result<PropertyValue> {
        self.property_value(name)
            .ok_or_else(|| AylaError::NotFound(format!("property {name}")))
    }

    // ------------------------------------------------------------------
    // Endpoints
    // ------------------------------------------------------------------

    fn properties_url(&self) -> String {
        self.api
            .ads_url(&format!("/apiv1/dsns/{}/properties.json", self.dsn))
    }

    pub(crate) fn datapoints_url(&self, raw_name: &str) -> String {
        self.api.ads_url(&format!(
            "/apiv1/dsns/{}/properties/{}/datapoints.json",
            self.dsn, raw_name
        ))
    }

    fn metadata_url(&self) -> String {
        self.api.ads_url(&format!("/apiv1/dsns/{}/data.json", self.dsn))
    }

    fn triggers_url(&self, property_name: &str) -> String {
        self.api.ads_url(&format!(
            "/apiv1/dsns/{}/properties/{}/triggers.json",
            self.dsn, property_name
        ))
    }

    // ------------------------------------------------------------------
    // Property refresh
    // ------------------------------------------------------------------

    /// Fetch all properties and rebuild the property map.
    pub async fn update(&mut self) -> Result<()> {
        self.update_properties(None).await
    }

    /// Fetch a subset of properties (or all with `None`). A full fetch
    /// replaces the map; a filtered one merges into it.
    pub async fn update_properties(&mut self, names: Option<&[&str]>) -> Result<()> {
        let query: Vec<(String, String)> = names
            .unwrap_or_default()
            .iter()
            .map(|n| ("names[]".to_string(), n.to_string()))
            .collect();
        let value = self.api.get_query(self.properties_url(), &query).await?;
        let envelopes: Vec<PropertyEnvelope> = serde_json::from_value(value)?;
        self.apply_properties(names.is_none(), envelopes.into_iter().map(|e| e.property));
        Ok(())
    }

    /// Categorize fetched properties: track which cleaned names are
    /// settable and index the records by cleaned name.
    fn apply_properties(&mut self, full: bool, props: impl IntoIterator<Item = Property>) {
        if full {
            self.properties.clear();
            self.settable.clear();
        }
        for prop in props {
            let cleaned = clean_property_name(&prop.name).to_string();
            let set_prefixed = prop
                .name
                .as_bytes()
                .get(..3)
                .is_some_and(|p| p.eq_ignore_ascii_case(b"SET"));
            if set_prefixed {
                let _ = self.settable.insert(cleaned.clone());
            }
            let _ = self.properties.insert(cleaned, prop);
        }
    }

    // ------------------------------------------------------------------
    // Property writes
    // ------------------------------------------------------------------

    /// Raw vendor name for a write, after the read-only check.
    pub(crate) fn writable_property_name(&self, name: &str) -> Result<&str> {
        let prop = self
            .properties
            .get(name)
            .ok_or_else(|| AylaError::NotFound(format!("property {name}")))?;
        if prop.read_only {
            return Err(AylaError::ReadOnlyProperty(name.to_string()));
        }
        Ok(&prop.name)
    }

    /// Merge a datapoint acknowledgement back into the property map.
    pub(crate) fn merge_datapoint(&mut self, name: &str, response: &Value) {
        let Some(datapoint) = response.get("datapoint") else {
            return;
        };
        if let Some(prop) = self.properties.get_mut(name) {
            prop.value = datapoint.get("value").cloned();
            if let Some(updated) = datapoint.get("updated_at").and_then(Value::as_str) {
                prop.updated_at = Some(updated.to_string());
            }
        }
    }

    /// Create a datapoint for a property, i.e. set its value. The
    /// acknowledged value is merged back into the local map.
    pub async fn set_property_value(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let raw_name = self.writable_property_name(name)?.to_string();
        let body = json!({"datapoint": {"value": value.into()}});
        let response = self
            .api
            .post_json(self.datapoints_url(&raw_name), &body)
            .await?;
        self.merge_datapoint(name, &response);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Metadata, triggers, file properties
    // ------------------------------------------------------------------

    /// Raw device metadata. Not needed for basic operation.
    pub async fn get_metadata(&self) -> Result<Value> {
        self.api.get(self.metadata_url()).await
    }

    /// Refresh model and serial number from metadata. Shark vacuums store
    /// both in a JSON-encoded `sharkDeviceMobileData` datum.
    pub async fn update_metadata(&mut self) -> Result<()> {
        let metadata = self.get_metadata().await?;
        let Some(items) = metadata.as_array() else {
            return Ok(());
        };
        let datum = items.iter().filter_map(|d| d.get("datum")).find(|d| {
            d.get("key").and_then(Value::as_str) == Some("sharkDeviceMobileData")
        });
        let Some(datum) = datum else {
            return Ok(());
        };
        let values: Value = match datum.get("value").and_then(Value::as_str) {
            Some(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
            None => Value::Null,
        };
        if let Some(model) = values.get("vacModelNumber").and_then(Value::as_str) {
            self.model = Some(model.to_string());
        }
        if let Some(serial) = values.get("vacSerialNumber").and_then(Value::as_str) {
            self.serial_number = Some(serial.to_string());
        }
        Ok(())
    }

    /// Fetch the triggers attached to a property and record them by key.
    pub async fn update_property_triggers(&mut self, property_name: &str) -> Result<()> {
        let value = self.api.get(self.triggers_url(property_name)).await?;
        let Some(items) = value.as_array() else {
            return Err(AylaError::Api(format!("unexpected triggers body: {value}")));
        };
        for item in items {
            let Some(trigger) = item.get("trigger") else {
                continue;
            };
            if let Some(key) = trigger.get("key").and_then(Value::as_u64) {
                let _ = self.triggers.entry(key).or_insert_with(|| trigger.clone());
            }
        }
        Ok(())
    }

    /// Versioned-lookup endpoint for a file property. Errors when the
    /// property is unknown or not of base type `file`.
    fn file_property_url(&self, name: &str) -> Result<String> {
        let prop = self
            .properties
            .get(name)
            .ok_or_else(|| AylaError::NotFound(format!("property {name}")))?;
        if prop.base_type.as_deref() != Some("file") {
            return Err(AylaError::Api(format!("{name} is not a file property")));
        }
        let key = prop
            .key
            .ok_or_else(|| AylaError::Api(format!("{name} has no property key")))?;
        Ok(self
            .api
            .ads_url(&format!("/apiv1/properties/{key}/datapoints.json")))
    }

    /// URL of the newest file for a file property. File properties are
    /// versioned and need this extra lookup.
    pub async fn get_file_property_url(&self, name: &str) -> Result<Option<String>> {
        let url = self.file_property_url(name)?;
        let value = self.api.get(url).await?;
        let data = value.as_array().cloned().unwrap_or_default();
        Ok(most_recent_datum(&data, "updated_at")
            .and_then(|dp| dp.get("file"))
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// Download the newest file for a file property. The file URL itself
    /// is pre-signed and fetched without the auth header.
    pub async fn get_file_property(&self, name: &str) -> Result<Vec<u8>> {
        let url = self
            .get_file_property_url(name)
            .await?
            .ok_or_else(|| AylaError::NotFound(format!("file for property {name}")))?;
        let resp = self.api.http().get(&url).send().await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

/// A device classified by product kind, exposing the matching convenience
/// wrapper.
#[derive(Debug)]
pub enum TypedDevice {
    Vacuum(Vacuum),
    Softener(Softener),
    FujitsuHvac(FujitsuHvac),
    Generic(Device),
}

impl TypedDevice {
    pub(crate) fn classify(api: AylaClient, entry: DeviceEntry) -> Self {
        if VACUUM_PRODUCT_NAMES.contains(&entry.product_name.as_str()) {
            TypedDevice::Vacuum(Vacuum::new(Device::new(api, entry)))
        } else if SOFTENER_PRODUCT_NAMES.contains(&entry.product_name.as_str()) {
            TypedDevice::Softener(Softener::new(Device::new(api, entry)))
        } else if let Some(model) = entry
            .oem_model
            .as_deref()
            .and_then(ModelType::from_oem_model)
        {
            TypedDevice::FujitsuHvac(FujitsuHvac::with_model(Device::new(api, entry), model))
        } else {
            TypedDevice::Generic(Device::new(api, entry))
        }
    }

    /// The underlying generic device.
    pub fn device(&self) -> &Device {
        match self {
            TypedDevice::Vacuum(v) => v,
            TypedDevice::Softener(s) => s,
            TypedDevice::FujitsuHvac(h) => h,
            TypedDevice::Generic(d) => d,
        }
    }

    /// Mutable access to the underlying generic device.
    pub fn device_mut(&mut self) -> &mut Device {
        match self {
            TypedDevice::Vacuum(v) => &mut *v,
            TypedDevice::Softener(s) => &mut *s,
            TypedDevice::FujitsuHvac(h) => &mut *h,
            TypedDevice::Generic(d) => d,
        }
    }

    pub fn dsn(&self) -> &str {
        self.device().dsn()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    pub(crate) fn test_api() -> AylaClient {
        AylaClient::new("user@example.com", "pw", "app-id", "app-secret").unwrap()
    }

    pub(crate) fn entry(product_name: &str, oem_model: Option<&str>) -> DeviceEntry {
        DeviceEntry {
            dsn: "AC000W000000001".into(),
            key: 1234,
            product_name: product_name.into(),
            oem_model: oem_model.map(String::from),
            model: Some("AY001MRT1".into()),
            mac: Some("c0ffee000001".into()),
            lan_ip: Some("192.168.1.23".into()),
            connection_status: Some("Online".into()),
        }
    }

    pub(crate) fn device(product_name: &str) -> Device {
        Device::new(test_api(), entry(product_name, None))
    }

    pub(crate) fn property(name: &str, base_type: &str, read_only: bool, value: Value) -> Property {
        Property {
            name: name.into(),
            base_type: Some(base_type.into()),
            read_only,
            value: Some(value),
            key: None,
            updated_at: None,
        }
    }
}
