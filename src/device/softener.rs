//! Water softener support (Culligan and compatible units).

use std::ops::{Deref, DerefMut};

use serde_json::{json, Value};

use super::{Device, PropertyValue};
use crate::Result;

/// Map a Culligan property name to the variant some firmwares report
/// instead. Consulted when the primary name is absent.
fn alternate_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "aqua_sensor_Zmin" => "aqua_sensor_Zmin_1",
        "aqua_sensor_Zratio_current" => "aqua_sensor_Zratio_curr_1",
        "BD_rinse" => "bd_rinse",
        "capacity_remaining_gallons" => "capacity_remaining_volume_1",
        "days_since_last_regen" => "days_since_last_regen_1",
        "error_flags" => "system_error_flags",
        "flow_profiles_max_flow" => "flow_profiles_max_flow_lim",
        "flow_profiles_min_flow" => "flow_profiles_min_flow_lim",
        "gbe_fw_version" => "gbx_fw_version",
        "hardness_in_grains_per_gal" => "hardness_value",
        "iron_setting" => "iron",
        "last_regen_date_time" => "last_regen_date_time_1",
        "next_regen_on_date" => "next_regen_date_time",
        "regen_interval_days_setting" => "regen_interval_days",
        "salt_dosage_in_lbs" => "salt_dosage",
        "sbt_salt_level_low" => "low_salt_level",
        "set_vacation_mode" => "set_away_mode",
        "vacation_mode" => "away_mode",
        "total_gallons_since_install" => "water_usage_since_install_1",
        "total_gallons_today" => "total_water_usage_today_1",
        "unit_status" => "unit_status_1",
        "valve_position" => "valve_position_1",
        _ => return None,
    })
}

/// Bypass durations accepted by `standard_bypass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassDuration {
    Minutes30 = 1,
    Minutes60 = 2,
    Minutes90 = 3,
    Minutes120 = 4,
    Minutes180 = 5,
    Indefinite = 6,
}

/// Water softener. Derefs to [`Device`] for the generic operations.
///
/// Writes go through the batch-datapoints endpoint (the per-property
/// endpoint does not acknowledge values on these units), followed by a
/// full refresh.
#[derive(Debug)]
pub struct Softener {
    base: Device,
    avg_daily_properties: Vec<String>,
    daily_usage_properties: Vec<String>,
    hourly_usage_properties: Vec<String>,
}

impl Softener {
    pub(crate) fn new(base: Device) -> Self {
        Self {
            base,
            avg_daily_properties: ["avg_sun", "avg_mon", "avg_tue", "avg_wed", "avg_thr", "avg_fri", "avg_sat"]
                .map(String::from)
                .to_vec(),
            daily_usage_properties: (1..=7).map(|d| format!("daily_usage_day_{d}")).collect(),
            hourly_usage_properties: (1..=24).map(|h| format!("hourly_usage_hour_{h}")).collect(),
        }
    }

    fn batch_datapoints_url(&self) -> String {
        self.base.api().ads_url("/apiv1/batch_datapoints.json")
    }

    fn batch_datapoint_payload(&self, raw_name: &str, value: Value) -> Value {
        json!({
            "batch_datapoints": [
                {
                    "datapoint": {"value": value},
                    "dsn": self.base.dsn(),
                    "name": raw_name,
                }
            ]
        })
    }

    /// Typed value for a property, falling back to the alternate firmware
    /// name when the primary one is absent.
    pub fn property_value(&self, name: &str) -> Option<PropertyValue> {
        self.base
            .property_value(name)
            .or_else(|| alternate_name(name).and_then(|alt| self.base.property_value(alt)))
    }

    /// Cleaned name under which a property is actually tracked, honoring
    /// the alternate mapping.
    fn resolve_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.base.property(name).is_some() {
            return Some(name);
        }
        alternate_name(name).filter(|alt| self.base.property(alt).is_some())
    }

    /// Set a property through the batch-datapoints endpoint, then refresh
    /// the property map (the batch call does not echo the value back).
    pub async fn set_property_value(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let resolved = self.resolve_name(name).unwrap_or(name).to_string();
        let raw_name = self.base.writable_property_name(&resolved)?.to_string();
        let payload = self.batch_datapoint_payload(&raw_name, value.into());
        let _ = self
            .base
            .api()
            .post_json(self.batch_datapoints_url(), &payload)
            .await?;
        self.base.update().await
    }

    /// Ask the unit to push fresh property values (a `wifi_report`
    /// datapoint). Returns whether the service acknowledged the request.
    pub async fn send_poll(&self) -> Result<bool> {
        let payload = self.batch_datapoint_payload("wifi_report", Value::from(1));
        let response = self
            .base
            .api()
            .post_json(self.batch_datapoints_url(), &payload)
            .await?;
        Ok(!response.is_null())
    }

    /// Enable vacation/away mode. The property name varies per
    /// manufacturer; whichever of the two is present is used.
    pub async fn start_vacation_mode(&mut self) -> Result<()> {
        let name = self.vacation_property();
        self.set_property_value(name, 1).await
    }

    /// Disable vacation/away mode.
    pub async fn stop_vacation_mode(&mut self) -> Result<()> {
        let name = self.vacation_property();
        self.set_property_value(name, 0).await
    }

    fn vacation_property(&self) -> &'static str {
        if self.base.property("vacation_mode").is_some() {
            "vacation_mode"
        } else {
            "away_mode"
        }
    }

    /// Start an indefinite bypass.
    pub async fn start_bypass_mode(&mut self) -> Result<bool> {
        self.start_bypass_timed_mode(BypassDuration::Indefinite).await
    }

    /// Start a timed bypass. Returns false when the unit has no
    /// `standard_bypass` property.
    pub async fn start_bypass_timed_mode(&mut self, duration: BypassDuration) -> Result<bool> {
        if self.base.property("standard_bypass").is_none() {
            return Ok(false);
        }
        self.set_property_value("standard_bypass", duration as i64)
            .await?;
        Ok(true)
    }

    /// End a bypass. Returns false when the unit has no `standard_bypass`
    /// property.
    pub async fn stop_bypass_mode(&mut self) -> Result<bool> {
        if self.base.property("standard_bypass").is_none() {
            return Ok(false);
        }
        self.set_property_value("standard_bypass", 0).await?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Convenience accessors over the property map
    // ------------------------------------------------------------------

    pub fn avg_daily_usage(&self) -> Option<PropertyValue> {
        self.property_value("avg_daily_usage")
    }

    pub fn current_flow_rate(&self) -> Option<PropertyValue> {
        self.property_value("current_flow_rate")
    }

    pub fn capacity_remaining_gallons(&self) -> Option<PropertyValue> {
        self.property_value("capacity_remaining_gallons")
    }

    pub fn hardness_in_grains_per_gal(&self) -> Option<PropertyValue> {
        self.property_value("hardness_in_grains_per_gal")
    }

    pub fn days_since_last_regen(&self) -> Option<PropertyValue> {
        self.property_value("days_since_last_regen")
    }

    pub fn last_regen_date_time(&self) -> Option<PropertyValue> {
        self.property_value("last_regen_date_time")
    }

    pub fn away_mode_water_use(&self) -> Option<PropertyValue> {
        self.property_value("away_mode_water_use")
    }

    pub fn valve_position(&self) -> Option<PropertyValue> {
        self.property_value("valve_position")
    }

    pub fn total_gallons_today(&self) -> Option<PropertyValue> {
        self.property_value("total_gallons_today")
    }

    pub fn error_flags(&self) -> Option<PropertyValue> {
        self.property_value("error_flags")
    }

    pub fn total_gallons_since_install(&self) -> Option<PropertyValue> {
        self.property_value("total_gallons_since_install")
    }

    pub fn total_regens_since_install(&self) -> Option<PropertyValue> {
        self.property_value("total_regens_since_install")
    }

    // ------------------------------------------------------------------
    // Usage property-name lists (Culligan defaults, overridable)
    // ------------------------------------------------------------------

    pub fn avg_daily_properties(&self) -> &[String] {
        &self.avg_daily_properties
    }

    pub fn set_avg_daily_properties(&mut self, names: Vec<String>) {
        self.avg_daily_properties = names;
    }

    pub fn daily_usage_properties(&self) -> &[String] {
        &self.daily_usage_properties
    }

    pub fn set_daily_usage_properties(&mut self, names: Vec<String>) {
        self.daily_usage_properties = names;
    }

    pub fn hourly_usage_properties(&self) -> &[String] {
        &self.hourly_usage_properties
    }

    pub fn set_hourly_usage_properties(&mut self, names: Vec<String>) {
        self.hourly_usage_properties = names;
    }
}

impl Deref for Softener {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.base
    }
}

impl DerefMut for Softener {
    fn deref_mut(&mut self) -> &mut Device {
        &mut self.base
    }
}
