//! Fujitsu FGLair HVAC support.

mod consts;

pub use consts::{
    fglair_app_credentials, Capabilities, FanSpeed, ModelType, OpMode, SwingMode,
    ADJUST_TEMPERATURE, DEVICE_CAPABILITIES, DEVICE_NAME, DISPLAY_TEMP, FAN_SPEED,
    MAX_TEMP_COOL, MAX_TEMP_HEAT, MIN_TEMP_COOL, MIN_TEMP_HEAT, OPERATION_MODE, REFRESH,
};

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use serde_json::{json, Value};

use super::{Device, DeviceEntry};
use crate::error::AylaError;
use crate::Result;

use consts::{
    MAX_SENSED_CELSIUS, MAX_SENSED_TEMP, MIN_SENSED_CELSIUS, MIN_SENSED_TEMP,
};

/// Attempts and delay when polling for a datapoint echo.
const POLL_ATTEMPTS: u32 = 10;
const POLL_DELAY: Duration = Duration::from_secs(1);

/// Map the raw `display_temperature` span onto Celsius.
fn sensed_temp_to_celsius(raw: i64) -> f64 {
    let source_span = (MAX_SENSED_TEMP - MIN_SENSED_TEMP) as f64;
    let celsius_span = MAX_SENSED_CELSIUS - MIN_SENSED_CELSIUS;
    let scaled = (raw - MIN_SENSED_TEMP) as f64 / source_span;
    MIN_SENSED_CELSIUS + scaled * celsius_span
}

/// Fujitsu FGLair HVAC unit. Derefs to [`Device`] for the generic
/// operations; control calls are refused while the cloud reports the unit
/// offline.
#[derive(Debug)]
pub struct FujitsuHvac {
    base: Device,
    model: ModelType,
}

impl FujitsuHvac {
    /// Whether a listing entry is an FGLair unit this wrapper handles.
    pub fn supports(entry: &DeviceEntry) -> bool {
        entry
            .oem_model
            .as_deref()
            .and_then(ModelType::from_oem_model)
            .is_some()
    }

    /// Wrap a generic device. Fails with `DeviceNotSupported` when the
    /// OEM model is unknown.
    pub fn from_device(device: Device) -> Result<Self> {
        let model = device
            .oem_model()
            .and_then(ModelType::from_oem_model)
            .ok_or(AylaError::DeviceNotSupported)?;
        Ok(Self::with_model(device, model))
    }

    pub(crate) fn with_model(base: Device, model: ModelType) -> Self {
        Self { base, model }
    }

    pub fn model_type(&self) -> ModelType {
        self.model
    }

    /// The cloud's view of connectivity at listing time.
    pub fn is_online(&self) -> bool {
        self.base.connection_status() != Some("Offline")
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(AylaError::DeviceOffline)
        }
    }

    /// Refresh the property map, then the sensed temperature on models
    /// that report it.
    pub async fn update(&mut self) -> Result<()> {
        self.ensure_online()?;
        self.base.update().await?;
        self.refresh_sensed_temp().await
    }

    /// Set a property with the offline guard applied.
    pub async fn set_property_value(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_online()?;
        self.base.set_property_value(name, value).await
    }

    /// Set a property without echo and poll until the unit acknowledges
    /// the datapoint, up to ten attempts one second apart.
    pub async fn set_property_value_polled(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.ensure_online()?;
        let keep_polling_value = Value::from(
            self.base
                .property_value(name)
                .and_then(|v| v.as_i64())
                .unwrap_or_default(),
        );
        let raw_name = self.base.writable_property_name(name)?.to_string();
        let body = json!({"datapoint": {"value": value.into(), "echo": 0}});
        let _ = self
            .base
            .api()
            .post_json(self.base.datapoints_url(&raw_name), &body)
            .await?;
        self.poll_while(&raw_name, &keep_polling_value).await
    }

    /// Newest datapoint for a property (`limit=1` fetch on the datapoints
    /// endpoint).
    pub async fn get_last_datapoint(&self, name: &str) -> Result<Option<Value>> {
        let raw_name = match self.base.property(name) {
            Some(prop) => prop.name.clone(),
            None => name.to_string(),
        };
        let value = self
            .base
            .api()
            .get_query(
                self.base.datapoints_url(&raw_name),
                &[("limit".to_string(), "1".to_string())],
            )
            .await?;
        Ok(value
            .as_array()
            .and_then(|items| items.last())
            .and_then(|item| item.get("datapoint"))
            .cloned())
    }

    async fn poll_while(&self, raw_name: &str, keep_polling_value: &Value) -> Result<()> {
        for _ in 0..POLL_ATTEMPTS {
            let datapoint = self.get_last_datapoint(raw_name).await?;
            if let Some(dp) = datapoint {
                let echoed = dp.get("echo").and_then(Value::as_bool).unwrap_or(false);
                if echoed && dp.get("value") != Some(keep_polling_value) {
                    return Ok(());
                }
            }
            tokio::time::sleep(POLL_DELAY).await;
        }
        tracing::warn!(property = raw_name, "datapoint echo not observed, giving up");
        Ok(())
    }

    /// Ask the unit to re-sense the display temperature and refetch it.
    /// No-op on models without the sensor.
    pub async fn refresh_sensed_temp(&mut self) -> Result<()> {
        if !self.model.sensed_temp_supported() {
            return Ok(());
        }
        self.set_property_value(REFRESH, 1).await?;
        self.base.update_properties(Some(&[DISPLAY_TEMP])).await
    }

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    pub fn device_name(&self) -> Option<String> {
        self.base
            .property_value(DEVICE_NAME)
            .and_then(|v| v.as_str().map(String::from))
    }

    /// Capability bitfield from `device_capabilities` (empty until the
    /// first update).
    pub fn capabilities(&self) -> Capabilities {
        Capabilities(
            self.base
                .property_value(DEVICE_CAPABILITIES)
                .and_then(|v| v.as_i64())
                .unwrap_or_default() as u32,
        )
    }

    pub fn has_capability(&self, bit: u32) -> bool {
        self.capabilities().has(bit)
    }

    // ------------------------------------------------------------------
    // Operation mode
    // ------------------------------------------------------------------

    /// Modes this unit supports. Off and On are always included.
    pub fn supported_op_modes(&self) -> Vec<OpMode> {
        let caps = self.capabilities();
        OpMode::ALL
            .into_iter()
            .filter(|mode| match mode.capability_bit() {
                Some(bit) => caps.has(bit),
                None => true,
            })
            .collect()
    }

    pub fn op_mode(&self) -> Result<OpMode> {
        let value = self
            .base
            .get_property_value(OPERATION_MODE)?
            .as_i64()
            .ok_or_else(|| AylaError::Api("operation_mode is not an integer".into()))?;
        OpMode::from_value(value)
            .ok_or_else(|| AylaError::Api(format!("unknown operation mode {value}")))
    }

    pub async fn set_op_mode(&mut self, mode: OpMode) -> Result<()> {
        if !self.supported_op_modes().contains(&mode) {
            return Err(AylaError::SettingNotSupported(format!(
                "operation mode {mode:?}"
            )));
        }
        self.set_property_value(OPERATION_MODE, mode as i64).await
    }

    // ------------------------------------------------------------------
    // Fan speed
    // ------------------------------------------------------------------

    pub fn supported_fan_speeds(&self) -> Vec<FanSpeed> {
        let caps = self.capabilities();
        FanSpeed::ALL
            .into_iter()
            .filter(|speed| caps.has(speed.capability_bit()))
            .collect()
    }

    pub fn fan_speed(&self) -> Result<FanSpeed> {
        let value = self
            .base
            .get_property_value(FAN_SPEED)?
            .as_i64()
            .ok_or_else(|| AylaError::Api("fan_speed is not an integer".into()))?;
        FanSpeed::from_value(value)
            .ok_or_else(|| AylaError::Api(format!("unknown fan speed {value}")))
    }

    pub async fn set_fan_speed(&mut self, speed: FanSpeed) -> Result<()> {
        if !self.supported_fan_speeds().contains(&speed) {
            return Err(AylaError::SettingNotSupported(format!(
                "fan speed {speed:?}"
            )));
        }
        self.set_property_value(FAN_SPEED, speed as i64).await
    }

    // ------------------------------------------------------------------
    // Temperature
    // ------------------------------------------------------------------

    /// Room temperature sensed at the unit, rounded to 0.5 °C. `None` on
    /// models without the sensor or before the first update.
    pub fn sensed_temp(&self) -> Option<f64> {
        if !self.model.sensed_temp_supported() {
            return None;
        }
        let raw = self.base.property_value(DISPLAY_TEMP)?.as_i64()?;
        Some((sensed_temp_to_celsius(raw) * 2.0).round() / 2.0)
    }

    /// Valid target-temperature range for a mode.
    pub fn temperature_range_for_mode(&self, mode: OpMode) -> Result<(f64, f64)> {
        if !self.supported_op_modes().contains(&mode) {
            return Err(AylaError::SettingNotSupported(format!(
                "operation mode {mode:?}"
            )));
        }
        if mode == OpMode::Heat {
            Ok((MIN_TEMP_HEAT, MAX_TEMP_HEAT))
        } else {
            Ok((MIN_TEMP_COOL, MAX_TEMP_COOL))
        }
    }

    /// Valid target-temperature range for the current mode.
    pub fn temperature_range(&self) -> Result<(f64, f64)> {
        self.temperature_range_for_mode(self.op_mode()?)
    }

    /// Target temperature in °C (the wire carries tenths of a degree).
    pub fn target_temperature(&self) -> Result<f64> {
        let value = self
            .base
            .get_property_value(ADJUST_TEMPERATURE)?
            .as_f64()
            .ok_or_else(|| AylaError::Api("adjust_temperature is not numeric".into()))?;
        Ok(value / 10.0)
    }

    pub async fn set_target_temperature(&mut self, celsius: f64) -> Result<()> {
        self.set_property_value(ADJUST_TEMPERATURE, (celsius * 10.0) as i64)
            .await
    }

    // ------------------------------------------------------------------
    // Swing
    // ------------------------------------------------------------------

    /// Swing modes this unit supports; Both appears when both axes do,
    /// Off whenever any swing exists.
    pub fn supported_swing_modes(&self) -> Vec<SwingMode> {
        let caps = self.capabilities();
        let mut modes = Vec::new();
        if caps.has(Capabilities::SWING_VERTICAL) {
            modes.push(SwingMode::SwingVertical);
        }
        if caps.has(Capabilities::SWING_HORIZONTAL) {
            modes.push(SwingMode::SwingHorizontal);
        }
        if modes.contains(&SwingMode::SwingVertical) && modes.contains(&SwingMode::SwingHorizontal)
        {
            modes.push(SwingMode::SwingBoth);
        }
        if !modes.is_empty() {
            modes.push(SwingMode::Off);
        }
        modes
    }

    pub fn swing_mode(&self) -> SwingMode {
        match (self.horizontal_swing(), self.vertical_swing()) {
            (true, true) => SwingMode::SwingBoth,
            (true, false) => SwingMode::SwingHorizontal,
            (false, true) => SwingMode::SwingVertical,
            (false, false) => SwingMode::Off,
        }
    }

    pub async fn set_swing_mode(&mut self, mode: SwingMode) -> Result<()> {
        if !self.supported_swing_modes().contains(&mode) {
            return Err(AylaError::SettingNotSupported(format!(
                "swing mode {mode:?}"
            )));
        }
        let (horizontal, vertical) = match mode {
            SwingMode::SwingBoth => (true, true),
            SwingMode::SwingHorizontal => (true, false),
            SwingMode::SwingVertical => (false, true),
            SwingMode::Off => (false, false),
        };
        self.set_horizontal_swing(horizontal).await?;
        self.set_vertical_swing(vertical).await
    }

    pub fn horizontal_swing(&self) -> bool {
        if !self.has_capability(Capabilities::SWING_HORIZONTAL) {
            return false;
        }
        self.base
            .property_value(self.model.horizontal_swing_property())
            .and_then(|v| v.as_i64())
            == Some(self.model.swing_value(true))
    }

    pub async fn set_horizontal_swing(&mut self, on: bool) -> Result<()> {
        if !self.has_capability(Capabilities::SWING_HORIZONTAL) {
            return Err(AylaError::SettingNotSupported("horizontal swing".into()));
        }
        let property = self.model.horizontal_swing_property();
        let value = self.model.swing_value(on);
        self.set_property_value(property, value).await
    }

    pub fn vertical_swing(&self) -> bool {
        if !self.has_capability(Capabilities::SWING_VERTICAL) {
            return false;
        }
        self.base
            .property_value(self.model.vertical_swing_property())
            .and_then(|v| v.as_i64())
            == Some(self.model.swing_value(true))
    }

    pub async fn set_vertical_swing(&mut self, on: bool) -> Result<()> {
        if !self.has_capability(Capabilities::SWING_VERTICAL) {
            return Err(AylaError::SettingNotSupported("vertical swing".into()));
        }
        let property = self.model.vertical_swing_property();
        let value = self.model.swing_value(on);
        self.set_property_value(property, value).await
    }
}

impl Deref for FujitsuHvac {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.base
    }
}

impl DerefMut for FujitsuHvac {
    fn deref_mut(&mut self) -> &mut Device {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;

    fn hvac(caps: u32, oem_model: &str) -> FujitsuHvac {
        let mut device = Device::new(test_api(), entry("FGLair", Some(oem_model)));
        device.apply_properties(
            true,
            vec![
                property("device_name", "string", true, Value::from("Bedroom")),
                property(
                    "device_capabilities",
                    "integer",
                    true,
                    Value::from(caps as i64),
                ),
                property("operation_mode", "integer", false, Value::from(3)),
                property("fan_speed", "integer", false, Value::from(4)),
                property("adjust_temperature", "integer", false, Value::from(245)),
                property("display_temperature", "integer", true, Value::from(6750)),
                property("af_horizontal_swing", "integer", false, Value::from(1)),
                property("af_vertical_swing", "integer", false, Value::from(0)),
            ],
        );
        FujitsuHvac::from_device(device).unwrap()
    }

    const FULL_CAPS: u32 = Capabilities::OP_COOL
        | Capabilities::OP_DRY
        | Capabilities::OP_FAN
        | Capabilities::OP_HEAT
        | Capabilities::OP_AUTO
        | Capabilities::FAN_QUIET
        | Capabilities::FAN_LOW
        | Capabilities::FAN_MEDIUM
        | Capabilities::FAN_HIGH
        | Capabilities::FAN_AUTO
        | Capabilities::SWING_VERTICAL
        | Capabilities::SWING_HORIZONTAL;

    #[test]
    fn test_from_device_rejects_unknown_models() {
        let device = Device::new(test_api(), entry("FGLair", Some("NOT-A-MODEL")));
        assert!(matches!(
            FujitsuHvac::from_device(device),
            Err(AylaError::DeviceNotSupported)
        ));

        let device = Device::new(test_api(), entry("FGLair", None));
        assert!(matches!(
            FujitsuHvac::from_device(device),
            Err(AylaError::DeviceNotSupported)
        ));
    }

    #[test]
    fn test_supports_checks_oem_model() {
        assert!(FujitsuHvac::supports(&entry("FGLair", Some("AP-WB1E"))));
        assert!(!FujitsuHvac::supports(&entry("FGLair", Some("RV1001AE"))));
        assert!(!FujitsuHvac::supports(&entry("FGLair", None)));
    }

    #[test]
    fn test_offline_guard() {
        let mut device = Device::new(test_api(), entry("FGLair", Some("AP-WA1E")));
        device.connection_status = Some("Offline".into());
        let unit = FujitsuHvac::from_device(device).unwrap();
        assert!(!unit.is_online());
        assert!(matches!(unit.ensure_online(), Err(AylaError::DeviceOffline)));

        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert!(unit.is_online());
        assert!(unit.ensure_online().is_ok());
    }

    #[test]
    fn test_capabilities_decode() {
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert!(unit.has_capability(Capabilities::OP_HEAT));
        assert!(unit.has_capability(Capabilities::SWING_VERTICAL));
        assert!(!unit.has_capability(Capabilities::POWERFUL_MODE));
        assert_eq!(unit.device_name().as_deref(), Some("Bedroom"));
    }

    #[test]
    fn test_supported_op_modes_follow_capabilities() {
        let unit = hvac(Capabilities::OP_COOL | Capabilities::OP_HEAT, "AP-WA1E");
        let modes = unit.supported_op_modes();
        assert!(modes.contains(&OpMode::Off));
        assert!(modes.contains(&OpMode::On));
        assert!(modes.contains(&OpMode::Cool));
        assert!(modes.contains(&OpMode::Heat));
        assert!(!modes.contains(&OpMode::Dry));
        assert!(!modes.contains(&OpMode::Auto));
    }

    #[test]
    fn test_supported_fan_speeds_follow_capabilities() {
        let unit = hvac(Capabilities::FAN_LOW | Capabilities::FAN_HIGH, "AP-WA1E");
        assert_eq!(
            unit.supported_fan_speeds(),
            vec![FanSpeed::Low, FanSpeed::High]
        );
    }

    #[test]
    fn test_current_mode_and_speed() {
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert_eq!(unit.op_mode().unwrap(), OpMode::Cool);
        assert_eq!(unit.fan_speed().unwrap(), FanSpeed::Auto);
    }

    #[test]
    fn test_sensed_temp_conversion() {
        // Span endpoints.
        assert_eq!(sensed_temp_to_celsius(4000), -10.0);
        assert_eq!(sensed_temp_to_celsius(9500), 45.0);

        // 6750 sits halfway: 17.5 C exactly, surviving the 0.5 rounding.
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert_eq!(unit.sensed_temp(), Some(17.5));

        // B-generation units have no sensor.
        let unit = hvac(FULL_CAPS, "AP-WB1E");
        assert_eq!(unit.sensed_temp(), None);
    }

    #[test]
    fn test_target_temperature_scaling() {
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert_eq!(unit.target_temperature().unwrap(), 24.5);
    }

    #[test]
    fn test_temperature_ranges() {
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert_eq!(
            unit.temperature_range_for_mode(OpMode::Heat).unwrap(),
            (MIN_TEMP_HEAT, MAX_TEMP_HEAT)
        );
        assert_eq!(
            unit.temperature_range_for_mode(OpMode::Cool).unwrap(),
            (MIN_TEMP_COOL, MAX_TEMP_COOL)
        );
        // Current mode is Cool in the fixture.
        assert_eq!(
            unit.temperature_range().unwrap(),
            (MIN_TEMP_COOL, MAX_TEMP_COOL)
        );

        let unit = hvac(Capabilities::OP_COOL, "AP-WA1E");
        assert!(matches!(
            unit.temperature_range_for_mode(OpMode::Heat),
            Err(AylaError::SettingNotSupported(_))
        ));
    }

    #[test]
    fn test_swing_state_and_supported_modes() {
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        // Fixture: horizontal on (1), vertical off (0).
        assert!(unit.horizontal_swing());
        assert!(!unit.vertical_swing());
        assert_eq!(unit.swing_mode(), SwingMode::SwingHorizontal);

        let modes = unit.supported_swing_modes();
        assert!(modes.contains(&SwingMode::SwingVertical));
        assert!(modes.contains(&SwingMode::SwingHorizontal));
        assert!(modes.contains(&SwingMode::SwingBoth));
        assert!(modes.contains(&SwingMode::Off));

        // Without swing capabilities the state reads off and nothing is
        // supported.
        let unit = hvac(Capabilities::OP_COOL, "AP-WA1E");
        assert!(!unit.horizontal_swing());
        assert_eq!(unit.swing_mode(), SwingMode::Off);
        assert!(unit.supported_swing_modes().is_empty());
    }

    #[test]
    fn test_deref_reaches_generic_device() {
        let unit = hvac(FULL_CAPS, "AP-WA1E");
        assert_eq!(unit.dsn(), "AC000W000000001");
        assert_eq!(unit.model_type(), ModelType::A);
    }
}
