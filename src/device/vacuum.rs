//! Shark robot vacuum support.

use std::ops::{Deref, DerefMut};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::Device;
use crate::error::AylaError;
use crate::Result;

/// Property names the vacuums expose (cleaned, prefix stripped).
pub mod props {
    pub const AREAS_TO_CLEAN: &str = "Areas_To_Clean";
    pub const BATTERY_CAPACITY: &str = "Battery_Capacity";
    pub const CHARGING_STATUS: &str = "Charging_Status";
    pub const CLEAN_COMPLETE: &str = "CleanComplete";
    pub const CLEANING_STATISTICS: &str = "Cleaning_Statistics";
    pub const DOCKED_STATUS: &str = "DockedStatus";
    pub const ERROR_CODE: &str = "Error_Code";
    pub const FIND_DEVICE: &str = "Find_Device";
    pub const LOW_LIGHT_MISSION: &str = "LowLightMission";
    pub const NAV_MODULE_FW_VERSION: &str = "Nav_Module_FW_Version";
    pub const OPERATING_MODE: &str = "Operating_Mode";
    pub const POWER_MODE: &str = "Power_Mode";
    pub const RECHARGE_RESUME: &str = "Recharge_Resume";
    pub const RECHARGING_TO_RESUME: &str = "Recharging_To_Resume";
    pub const ROBOT_FIRMWARE_VERSION: &str = "Robot_Firmware_Version";
    pub const ROBOT_ROOM_LIST: &str = "Robot_Room_List";
    pub const RSSI: &str = "RSSI";
}

/// Vacuum suction power modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Normal = 0,
    Eco = 1,
    Max = 2,
}

/// Vacuum operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Stop = 0,
    Pause = 1,
    Start = 2,
    Return = 3,
}

/// Vendor error-code table.
pub fn error_message(code: i64) -> Option<&'static str> {
    Some(match code {
        1 => "Side wheel is stuck",
        2 => "Side brush is stuck",
        3 => "Suction motor failed",
        4 => "Brushroll stuck",
        5 => "Side wheel is stuck (2)",
        6 => "Bumper is stuck",
        7 => "Cliff sensor is blocked",
        8 => "Battery power is low",
        9 => "No Dustbin",
        10 => "Fall sensor is blocked",
        11 => "Front wheel is stuck",
        13 => "Switched off",
        14 => "Magnetic strip error",
        16 => "Top bumper is stuck",
        18 => "Wheel encoder error",
        _ => return None,
    })
}

/// Room list as reported by `Robot_Room_List`: a map identifier followed
/// by the room names, colon-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomList {
    /// Ties the room names to the robot's onboard map.
    pub identifier: String,
    pub rooms: Vec<String>,
}

/// Shark vacuum. Derefs to [`Device`] for the generic operations.
#[derive(Debug)]
pub struct Vacuum {
    base: Device,
}

impl Vacuum {
    pub(crate) fn new(base: Device) -> Self {
        Self { base }
    }

    /// Pull the real model and serial number from device metadata. Needed
    /// once after construction for SharkIQ units.
    pub async fn refresh_metadata(&mut self) -> Result<()> {
        self.base.update_metadata().await
    }

    fn device_room_list(&self) -> Result<RoomList> {
        let value = self.base.get_property_value(props::ROBOT_ROOM_LIST)?;
        let raw = value
            .as_str()
            .ok_or_else(|| AylaError::Api("Robot_Room_List is not a string".into()))?;
        let mut split = raw.split(':').map(String::from);
        let identifier = split
            .next()
            .ok_or_else(|| AylaError::Api("empty Robot_Room_List".into()))?;
        Ok(RoomList {
            identifier,
            rooms: split.collect(),
        })
    }

    /// Rooms the robot knows about.
    pub fn room_list(&self) -> Result<Vec<String>> {
        Ok(self.device_room_list()?.rooms)
    }

    /// Clean the given rooms (all rooms when the slice is empty).
    pub async fn clean_rooms(&mut self, rooms: &[&str]) -> Result<()> {
        let payload = if rooms.is_empty() {
            // The wildcard cleans every room.
            "*".to_string()
        } else {
            let list = self.device_room_list()?;
            tracing::debug!(identifier = %list.identifier, "encoding room list");
            encode_room_list(&list.identifier, rooms)?
        };
        self.base
            .set_property_value(props::AREAS_TO_CLEAN, payload)
            .await?;
        self.set_operating_mode(OperatingMode::Start).await
    }

    /// Set the operating mode.
    pub async fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<()> {
        self.base
            .set_property_value(props::OPERATING_MODE, mode as i64)
            .await
    }

    /// Set the suction power mode.
    pub async fn set_power_mode(&mut self, mode: PowerMode) -> Result<()> {
        self.base
            .set_property_value(props::POWER_MODE, mode as i64)
            .await
    }

    /// Make the device chirp so it can be located.
    pub async fn find_device(&mut self) -> Result<()> {
        self.base.set_property_value(props::FIND_DEVICE, 1).await
    }

    /// Last reported error code, if any.
    pub fn error_code(&self) -> Option<i64> {
        self.base
            .property_value(props::ERROR_CODE)
            .and_then(|v| v.as_i64())
            .filter(|c| *c != 0)
    }

    /// Human-readable form of [`Vacuum::error_code`].
    pub fn error_text(&self) -> Option<String> {
        let code = self.error_code()?;
        Some(
            error_message(code)
                .map(String::from)
                .unwrap_or_else(|| format!("Unknown error ({code})")),
        )
    }

    /// Battery charge percentage.
    pub fn battery_capacity(&self) -> Option<i64> {
        self.base
            .property_value(props::BATTERY_CAPACITY)
            .and_then(|v| v.as_i64())
    }

    /// True while docked.
    pub fn docked(&self) -> Option<bool> {
        self.base
            .property_value(props::DOCKED_STATUS)
            .and_then(|v| v.as_bool())
    }
}

impl Deref for Vacuum {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.base
    }
}

impl DerefMut for Vacuum {
    fn deref_mut(&mut self) -> &mut Device {
        &mut self.base
    }
}

/// Base64-encode the room selection the way the Shark mobile app does.
///
/// Layout: header `80 01 0b ca 02`, one byte for the length of everything
/// that follows, a newline, then each room as a length byte plus the name
/// (rooms joined by newlines), and a footer of `1a` plus the
/// length-prefixed map identifier. Every length field is a single byte,
/// so oversized names are rejected rather than truncated.
fn encode_room_list(identifier: &str, rooms: &[&str]) -> Result<String> {
    let mut rooms_enc: Vec<u8> = Vec::new();
    for (i, room) in rooms.iter().enumerate() {
        if room.len() > u8::MAX as usize {
            return Err(AylaError::Api(format!("room name too long: {room}")));
        }
        if i > 0 {
            rooms_enc.push(b'\n');
        }
        rooms_enc.push(room.len() as u8);
        rooms_enc.extend_from_slice(room.as_bytes());
    }

    if identifier.len() > u8::MAX as usize {
        return Err(AylaError::Api("room list identifier too long".into()));
    }
    let mut footer: Vec<u8> = vec![0x1a, identifier.len() as u8];
    footer.extend_from_slice(identifier.as_bytes());

    // One extra byte for the newline that follows the length marker.
    let body_len = 1 + rooms_enc.len() + footer.len();
    if body_len > u8::MAX as usize {
        return Err(AylaError::Api("room selection too long to encode".into()));
    }

    let mut payload: Vec<u8> = vec![0x80, 0x01, 0x0b, 0xca, 0x02];
    payload.push(body_len as u8);
    payload.push(b'\n');
    payload.extend_from_slice(&rooms_enc);
    payload.extend_from_slice(&footer);

    Ok(BASE64.encode(payload))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::PropertyValue;
    use super::*;
    use base64::Engine as _;
    use serde_json::Value;

    fn vacuum_with_props() -> Vacuum {
        let mut device = device("Vacuum");
        device.apply_properties(true, vec![
            property("SET_Operating_Mode", "integer", false, Value::from(0)),
            property("SET_Power_Mode", "integer", false, Value::from(0)),
            property("SET_Areas_To_Clean", "string", false, Value::from("")),
            property("Battery_Capacity", "integer", true, Value::from(91)),
            property("Error_Code", "integer", true, Value::from(0)),
            property(
                "Robot_Room_List",
                "string",
                true,
                Value::from("map01:Kitchen:Living Room"),
            ),
        ]);
        Vacuum::new(device)
    }

    #[test]
    fn test_room_list_parses_identifier_and_rooms() {
        let vacuum = vacuum_with_props();
        let list = vacuum.device_room_list().unwrap();
        assert_eq!(list.identifier, "map01");
        assert_eq!(list.rooms, vec!["Kitchen", "Living Room"]);
        assert_eq!(
            vacuum.room_list().unwrap(),
            vec!["Kitchen".to_string(), "Living Room".to_string()]
        );
    }

    #[test]
    fn test_encode_room_list_layout() {
        let encoded = encode_room_list("map01", &["Kitchen", "Den"]).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();

        // Header and the mode/length preamble.
        assert_eq!(&bytes[..5], &[0x80, 0x01, 0x0b, 0xca, 0x02]);
        let rooms_len = 1 + "Kitchen".len() + 1 + 1 + "Den".len();
        let footer_len = 2 + "map01".len();
        assert_eq!(bytes[5] as usize, 1 + rooms_len + footer_len);
        assert_eq!(bytes[6], b'\n');

        // First room entry: length byte then the name.
        assert_eq!(bytes[7] as usize, "Kitchen".len());
        assert_eq!(&bytes[8..15], b"Kitchen");
        assert_eq!(bytes[15], b'\n');
        assert_eq!(bytes[16] as usize, "Den".len());
        assert_eq!(&bytes[17..20], b"Den");

        // Footer: 0x1a, identifier length, identifier.
        assert_eq!(bytes[20], 0x1a);
        assert_eq!(bytes[21] as usize, "map01".len());
        assert_eq!(&bytes[22..], b"map01");
    }

    #[test]
    fn test_encode_room_list_rejects_oversized_names() {
        // Length fields are single bytes; anything over 255 bytes cannot
        // be represented and must not be truncated into a corrupt payload.
        let long = "x".repeat(256);
        assert!(matches!(
            encode_room_list("map01", &[long.as_str()]),
            Err(AylaError::Api(_))
        ));
        assert!(matches!(
            encode_room_list(&long, &["Kitchen"]),
            Err(AylaError::Api(_))
        ));

        // Many short rooms can still overflow the single body-length byte.
        let rooms: Vec<&str> = std::iter::repeat("Bedroom").take(40).collect();
        assert!(matches!(
            encode_room_list("map01", &rooms),
            Err(AylaError::Api(_))
        ));
    }

    #[test]
    fn test_error_reporting() {
        let mut vacuum = vacuum_with_props();
        assert_eq!(vacuum.error_code(), None);
        assert_eq!(vacuum.error_text(), None);

        vacuum.base.apply_properties(
            false,
            vec![property("Error_Code", "integer", true, Value::from(4))],
        );
        assert_eq!(vacuum.error_code(), Some(4));
        assert_eq!(vacuum.error_text().as_deref(), Some("Brushroll stuck"));

        vacuum.base.apply_properties(
            false,
            vec![property("Error_Code", "integer", true, Value::from(99))],
        );
        assert_eq!(vacuum.error_text().as_deref(), Some("Unknown error (99)"));
    }

    #[test]
    fn test_error_message_table() {
        assert_eq!(error_message(1), Some("Side wheel is stuck"));
        assert_eq!(error_message(18), Some("Wheel encoder error"));
        assert_eq!(error_message(12), None);
    }

    #[test]
    fn test_deref_reaches_generic_device() {
        let vacuum = vacuum_with_props();
        assert_eq!(vacuum.dsn(), "AC000W000000001");
        assert_eq!(
            vacuum.property_value("Battery_Capacity"),
            Some(PropertyValue::Int(91))
        );
        assert_eq!(vacuum.battery_capacity(), Some(91));
    }
}
