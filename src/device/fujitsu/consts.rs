//! FGLair property names, capability bits and per-model tables.

/// Property set every FGLair unit exposes.
pub const REFRESH: &str = "refresh";
pub const DISPLAY_TEMP: &str = "display_temperature";
pub const DEVICE_NAME: &str = "device_name";
pub const DEVICE_CAPABILITIES: &str = "device_capabilities";
pub const OPERATION_MODE: &str = "operation_mode";
pub const FAN_SPEED: &str = "fan_speed";
pub const ADJUST_TEMPERATURE: &str = "adjust_temperature";

const AF_HORIZONTAL_MOVE_STEP1: &str = "af_horizontal_move_step1";
const AF_HORIZONTAL_SWING: &str = "af_horizontal_swing";
const AF_VERTICAL_MOVE_STEP1: &str = "af_vertical_move_step1";
const AF_VERTICAL_SWING: &str = "af_vertical_swing";

pub const MIN_TEMP_HEAT: f64 = 16.0;
pub const MAX_TEMP_HEAT: f64 = 30.0;
pub const MIN_TEMP_COOL: f64 = 18.0;
pub const MAX_TEMP_COOL: f64 = 30.0;

/// Raw span of the `display_temperature` property and the Celsius span it
/// maps onto.
pub(crate) const MIN_SENSED_TEMP: i64 = 4000;
pub(crate) const MAX_SENSED_TEMP: i64 = 9500;
pub(crate) const MIN_SENSED_CELSIUS: f64 = -10.0;
pub(crate) const MAX_SENSED_CELSIUS: f64 = 45.0;

/// Application credentials the FGLair mobile app ships per region
/// (`app_id`, `app_secret`). Keys: `"cn"`, `"eu"`, anything else gets the
/// default pair.
pub fn fglair_app_credentials(region: &str) -> (&'static str, &'static str) {
    match region {
        "cn" => ("FGLairField-cn-id", "FGLairField-cn-zezg7Y60YpAvy3HPwxvWLnd4Oh4"),
        "eu" => ("FGLair-eu-id", "FGLair-eu-gpFbVBRoiJ8E3QWJ-QRULLL3j3U"),
        _ => ("CJIOSP-id", "CJIOSP-Vb8MQL_lFiYQ7DKjN0eCFXznKZE"),
    }
}

/// Hardware generation, inferred from the OEM model string. Determines
/// which swing properties and values apply and whether the sensed
/// temperature is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    A,
    B,
    F,
}

impl ModelType {
    pub fn from_oem_model(oem_model: &str) -> Option<Self> {
        match oem_model {
            "AP-WA1E" | "AP-WA2E" | "AP-WA3E" | "AP-WA4E" | "AP-WA5E" | "AP-WA6E"
            | "AP-WC1E" | "AP-WC2E" | "AP-WC3E" | "AP-WC4E" | "AP-WD1E" => Some(ModelType::A),
            "AP-WB1E" | "AP-WB2E" | "AP-WB3E" | "AP-WB4E" => Some(ModelType::B),
            "AP-WF1E" | "AP-WF2E" | "AP-WF3E" | "AP-WF4E" => Some(ModelType::F),
            _ => None,
        }
    }

    pub fn sensed_temp_supported(self) -> bool {
        matches!(self, ModelType::A | ModelType::F)
    }

    pub(crate) fn horizontal_swing_property(self) -> &'static str {
        match self {
            ModelType::B => AF_HORIZONTAL_MOVE_STEP1,
            ModelType::A | ModelType::F => AF_HORIZONTAL_SWING,
        }
    }

    pub(crate) fn vertical_swing_property(self) -> &'static str {
        match self {
            ModelType::B => AF_VERTICAL_MOVE_STEP1,
            ModelType::A | ModelType::F => AF_VERTICAL_SWING,
        }
    }

    pub(crate) fn swing_value(self, on: bool) -> i64 {
        match (self, on) {
            (ModelType::B, true) => 3,
            (_, true) => 1,
            (_, false) => 0,
        }
    }
}

/// Fan speeds, in the vendor's wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Quiet = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Auto = 4,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 5] = [
        FanSpeed::Quiet,
        FanSpeed::Low,
        FanSpeed::Medium,
        FanSpeed::High,
        FanSpeed::Auto,
    ];

    pub fn from_value(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as i64 == value)
    }

    pub(crate) fn capability_bit(self) -> u32 {
        match self {
            FanSpeed::Quiet => Capabilities::FAN_QUIET,
            FanSpeed::Low => Capabilities::FAN_LOW,
            FanSpeed::Medium => Capabilities::FAN_MEDIUM,
            FanSpeed::High => Capabilities::FAN_HIGH,
            FanSpeed::Auto => Capabilities::FAN_AUTO,
        }
    }
}

/// Operation modes, in the vendor's wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    Off = 0,
    On = 1,
    Auto = 2,
    Cool = 3,
    Dry = 4,
    Fan = 5,
    Heat = 6,
}

impl OpMode {
    pub const ALL: [OpMode; 7] = [
        OpMode::Off,
        OpMode::On,
        OpMode::Auto,
        OpMode::Cool,
        OpMode::Dry,
        OpMode::Fan,
        OpMode::Heat,
    ];

    pub fn from_value(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|m| *m as i64 == value)
    }

    /// Capability bit guarding this mode. Off and On are always allowed.
    pub(crate) fn capability_bit(self) -> Option<u32> {
        match self {
            OpMode::Off | OpMode::On => None,
            OpMode::Auto => Some(Capabilities::OP_AUTO),
            OpMode::Cool => Some(Capabilities::OP_COOL),
            OpMode::Dry => Some(Capabilities::OP_DRY),
            OpMode::Fan => Some(Capabilities::OP_FAN),
            OpMode::Heat => Some(Capabilities::OP_HEAT),
        }
    }
}

/// Louver swing selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingMode {
    Off = 0,
    SwingVertical = 1,
    SwingHorizontal = 2,
    SwingBoth = 3,
}

/// Capability bitfield reported through `device_capabilities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(pub u32);

impl Capabilities {
    pub const OP_COOL: u32 = 1;
    pub const OP_DRY: u32 = 1 << 1;
    pub const OP_FAN: u32 = 1 << 2;
    pub const OP_HEAT: u32 = 1 << 3;
    pub const OP_AUTO: u32 = 1 << 4;
    pub const OP_MIN_HEAT: u32 = 1 << 13;

    pub const FAN_AUTO: u32 = 1 << 5;
    pub const FAN_HIGH: u32 = 1 << 6;
    pub const FAN_MEDIUM: u32 = 1 << 7;
    pub const FAN_LOW: u32 = 1 << 8;
    pub const FAN_QUIET: u32 = 1 << 9;

    pub const SWING_VERTICAL: u32 = 1 << 10;
    pub const SWING_HORIZONTAL: u32 = 1 << 11;
    pub const ECO_MODE: u32 = 1 << 12;
    pub const ENERGY_SWING_FAN: u32 = 1 << 14;
    pub const POWERFUL_MODE: u32 = 1 << 16;
    pub const OUTDOOR_LOW_NOISE: u32 = 1 << 17;
    pub const COIL_DRY: u32 = 1 << 18;

    pub fn has(self, bit: u32) -> bool {
        self.0 & bit == bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_from_oem_model() {
        assert_eq!(ModelType::from_oem_model("AP-WA1E"), Some(ModelType::A));
        assert_eq!(ModelType::from_oem_model("AP-WD1E"), Some(ModelType::A));
        assert_eq!(ModelType::from_oem_model("AP-WB4E"), Some(ModelType::B));
        assert_eq!(ModelType::from_oem_model("AP-WF2E"), Some(ModelType::F));
        assert_eq!(ModelType::from_oem_model("RV1001AE"), None);
    }

    #[test]
    fn test_swing_tables_per_model() {
        assert_eq!(
            ModelType::B.horizontal_swing_property(),
            "af_horizontal_move_step1"
        );
        assert_eq!(
            ModelType::A.horizontal_swing_property(),
            "af_horizontal_swing"
        );
        assert_eq!(
            ModelType::F.vertical_swing_property(),
            "af_vertical_swing"
        );
        assert_eq!(ModelType::B.swing_value(true), 3);
        assert_eq!(ModelType::B.swing_value(false), 0);
        assert_eq!(ModelType::A.swing_value(true), 1);
        assert_eq!(ModelType::F.swing_value(false), 0);
    }

    #[test]
    fn test_sensed_temp_support_per_model() {
        assert!(ModelType::A.sensed_temp_supported());
        assert!(!ModelType::B.sensed_temp_supported());
        assert!(ModelType::F.sensed_temp_supported());
    }

    #[test]
    fn test_wire_value_round_trips() {
        assert_eq!(OpMode::from_value(6), Some(OpMode::Heat));
        assert_eq!(OpMode::from_value(42), None);
        assert_eq!(FanSpeed::from_value(4), Some(FanSpeed::Auto));
        assert_eq!(FanSpeed::from_value(-1), None);
    }

    #[test]
    fn test_capability_bits() {
        let caps = Capabilities(
            Capabilities::OP_COOL | Capabilities::OP_HEAT | Capabilities::FAN_AUTO,
        );
        assert!(caps.has(Capabilities::OP_COOL));
        assert!(caps.has(Capabilities::OP_HEAT));
        assert!(caps.has(Capabilities::FAN_AUTO));
        assert!(!caps.has(Capabilities::OP_DRY));
        assert!(!caps.has(Capabilities::SWING_VERTICAL));
    }

    #[test]
    fn test_fglair_app_credentials() {
        assert_eq!(fglair_app_credentials("eu").0, "FGLair-eu-id");
        assert_eq!(fglair_app_credentials("cn").0, "FGLairField-cn-id");
        assert_eq!(fglair_app_credentials("us").0, "CJIOSP-id");
    }
}
