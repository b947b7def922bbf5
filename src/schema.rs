//! Writable attributes of the device-control clusters.
//!
//! Only attributes that accept a remote write are listed. Each entry carries
//! the value type, nullability and constraint used to validate a write before
//! anything is sent, and whether the node demands a timed interaction.

use crate::data_model::{AttributeType, Constraint, IntWidth, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSchema {
    pub name: &'static str,
    pub id: u32,
    pub ty: AttributeType,
    pub constraint: Constraint,
    pub timed: bool,
}

impl AttributeSchema {
    pub const fn new(name: &'static str, id: u32, value_type: ValueType) -> Self {
        Self {
            name,
            id,
            ty: AttributeType::new(value_type),
            constraint: Constraint::None,
            timed: false,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            ty: AttributeType::nullable(self.ty.value_type),
            ..self
        }
    }

    pub const fn range(self, min: i64, max: i64) -> Self {
        Self {
            constraint: Constraint::Range { min, max },
            ..self
        }
    }

    pub const fn max_len(self, len: usize) -> Self {
        Self {
            constraint: Constraint::MaxLength(len),
            ..self
        }
    }

    pub const fn timed(self) -> Self {
        Self {
            timed: true,
            ..self
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ClusterSchema {
    pub name: &'static str,
    pub id: u32,
    pub attributes: &'static [AttributeSchema],
}

impl ClusterSchema {
    pub fn attribute(&self, id: u32) -> Option<&'static AttributeSchema> {
        self.attributes.iter().find(|attribute| attribute.id == id)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&'static AttributeSchema> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }
}

pub fn cluster(id: u32) -> Option<&'static ClusterSchema> {
    CLUSTERS.iter().find(|cluster| cluster.id == id)
}

pub fn cluster_by_name(name: &str) -> Option<&'static ClusterSchema> {
    CLUSTERS
        .iter()
        .find(|cluster| cluster.name.eq_ignore_ascii_case(name))
}

/// Look up the schema of one attribute by ids.
pub fn attribute(cluster_id: u32, attribute_id: u32) -> Option<&'static AttributeSchema> {
    cluster(cluster_id).and_then(|cluster| cluster.attribute(attribute_id))
}

use IntWidth::*;
use ValueType::*;

const BOOL: ValueType = Boolean;
const U8: ValueType = UInt(W8);
const U16: ValueType = UInt(W16);
const U24: ValueType = UInt(W24);
const U32: ValueType = UInt(W32);
const U40: ValueType = UInt(W40);
const U48: ValueType = UInt(W48);
const U56: ValueType = UInt(W56);
const U64: ValueType = UInt(W64);
const I8: ValueType = Int(W8);
const I16: ValueType = Int(W16);
const I24: ValueType = Int(W24);
const I32: ValueType = Int(W32);
const I40: ValueType = Int(W40);
const I48: ValueType = Int(W48);
const I56: ValueType = Int(W56);
const I64: ValueType = Int(W64);
// Enums and bitmaps travel as unsigned integers
const ENUM8: ValueType = U8;
const ENUM16: ValueType = U16;
const MAP8: ValueType = U8;
const MAP16: ValueType = U16;
const MAP32: ValueType = U32;
const MAP64: ValueType = U64;
const STR: ValueType = CharString;

const fn attr(name: &'static str, id: u32, value_type: ValueType) -> AttributeSchema {
    AttributeSchema::new(name, id, value_type)
}

pub const IDENTIFY: ClusterSchema = ClusterSchema {
    name: "Identify",
    id: 0x0003,
    attributes: &[attr("IdentifyTime", 0x0000, U16)],
};

pub const ON_OFF: ClusterSchema = ClusterSchema {
    name: "OnOff",
    id: 0x0006,
    attributes: &[
        attr("OnTime", 0x4001, U16),
        attr("OffWaitTime", 0x4002, U16),
        attr("StartUpOnOff", 0x4003, ENUM8).nullable(),
    ],
};

pub const ON_OFF_SWITCH_CONFIGURATION: ClusterSchema = ClusterSchema {
    name: "OnOffSwitchConfiguration",
    id: 0x0007,
    attributes: &[attr("SwitchActions", 0x0010, ENUM8)],
};

pub const LEVEL_CONTROL: ClusterSchema = ClusterSchema {
    name: "LevelControl",
    id: 0x0008,
    attributes: &[
        attr("Options", 0x000F, MAP8),
        attr("OnOffTransitionTime", 0x0010, U16),
        attr("OnLevel", 0x0011, U8).nullable(),
        attr("OnTransitionTime", 0x0012, U16).nullable(),
        attr("OffTransitionTime", 0x0013, U16).nullable(),
        attr("DefaultMoveRate", 0x0014, U8).nullable(),
        attr("StartUpCurrentLevel", 0x4000, U8).nullable(),
    ],
};

pub const BINARY_INPUT_BASIC: ClusterSchema = ClusterSchema {
    name: "BinaryInputBasic",
    id: 0x000F,
    attributes: &[
        attr("ActiveText", 0x0004, STR).max_len(16),
        attr("Description", 0x001C, STR).max_len(16),
        attr("InactiveText", 0x002E, STR).max_len(16),
        attr("OutOfService", 0x0051, BOOL),
        attr("PresentValue", 0x0055, BOOL),
        attr("Reliability", 0x0067, ENUM8),
    ],
};

pub const BASIC_INFORMATION: ClusterSchema = ClusterSchema {
    name: "BasicInformation",
    id: 0x0028,
    attributes: &[
        attr("NodeLabel", 0x0005, STR).max_len(32),
        attr("Location", 0x0006, STR).max_len(2),
        attr("LocalConfigDisabled", 0x0010, BOOL),
    ],
};

pub const LOCALIZATION_CONFIGURATION: ClusterSchema = ClusterSchema {
    name: "LocalizationConfiguration",
    id: 0x002B,
    attributes: &[attr("ActiveLocale", 0x0000, STR).max_len(35)],
};

pub const TIME_FORMAT_LOCALIZATION: ClusterSchema = ClusterSchema {
    name: "TimeFormatLocalization",
    id: 0x002C,
    attributes: &[
        attr("HourFormat", 0x0000, ENUM8),
        attr("ActiveCalendarType", 0x0001, ENUM8),
    ],
};

pub const UNIT_LOCALIZATION: ClusterSchema = ClusterSchema {
    name: "UnitLocalization",
    id: 0x002D,
    attributes: &[attr("TemperatureUnit", 0x0000, ENUM8)],
};

pub const GENERAL_COMMISSIONING: ClusterSchema = ClusterSchema {
    name: "GeneralCommissioning",
    id: 0x0030,
    attributes: &[attr("Breadcrumb", 0x0000, U64)],
};

pub const NETWORK_COMMISSIONING: ClusterSchema = ClusterSchema {
    name: "NetworkCommissioning",
    id: 0x0031,
    attributes: &[attr("InterfaceEnabled", 0x0004, BOOL)],
};

pub const BRIDGED_DEVICE_BASIC_INFORMATION: ClusterSchema = ClusterSchema {
    name: "BridgedDeviceBasicInformation",
    id: 0x0039,
    attributes: &[attr("NodeLabel", 0x0005, STR).max_len(32)],
};

pub const MODE_SELECT: ClusterSchema = ClusterSchema {
    name: "ModeSelect",
    id: 0x0050,
    attributes: &[
        attr("StartUpMode", 0x0004, U8).nullable(),
        attr("OnMode", 0x0005, U8).nullable(),
    ],
};

pub const DOOR_LOCK: ClusterSchema = ClusterSchema {
    name: "DoorLock",
    id: 0x0101,
    attributes: &[
        attr("DoorOpenEvents", 0x0004, U32),
        attr("DoorClosedEvents", 0x0005, U32),
        attr("OpenPeriod", 0x0006, U16),
        attr("Language", 0x0021, STR).max_len(3),
        attr("LEDSettings", 0x0022, ENUM8),
        attr("AutoRelockTime", 0x0023, U32),
        attr("SoundVolume", 0x0024, ENUM8),
        attr("OperatingMode", 0x0025, ENUM8),
        attr("EnableLocalProgramming", 0x0028, BOOL),
        attr("EnableOneTouchLocking", 0x0029, BOOL),
        attr("EnableInsideStatusLED", 0x002A, BOOL),
        attr("EnablePrivacyModeButton", 0x002B, BOOL),
        attr("LocalProgrammingFeatures", 0x002C, MAP8),
        attr("WrongCodeEntryLimit", 0x0030, U8).range(1, 255),
        attr("UserCodeTemporaryDisableTime", 0x0031, U8).range(1, 255),
        attr("SendPINOverTheAir", 0x0032, BOOL),
        attr("RequirePINforRemoteOperation", 0x0033, BOOL),
        attr("ExpiringUserTimeout", 0x0035, U16).range(1, 2880),
    ],
};

pub const WINDOW_COVERING: ClusterSchema = ClusterSchema {
    name: "WindowCovering",
    id: 0x0102,
    attributes: &[attr("Mode", 0x0017, MAP8)],
};

pub const BARRIER_CONTROL: ClusterSchema = ClusterSchema {
    name: "BarrierControl",
    id: 0x0103,
    attributes: &[
        attr("BarrierOpenEvents", 0x0004, U16),
        attr("BarrierCloseEvents", 0x0005, U16),
        attr("BarrierCommandOpenEvents", 0x0006, U16),
        attr("BarrierCommandCloseEvents", 0x0007, U16),
        attr("BarrierOpenPeriod", 0x0008, U16),
        attr("BarrierClosePeriod", 0x0009, U16),
    ],
};

pub const PUMP_CONFIGURATION_AND_CONTROL: ClusterSchema = ClusterSchema {
    name: "PumpConfigurationAndControl",
    id: 0x0200,
    attributes: &[
        attr("LifetimeRunningHours", 0x0015, U24).nullable(),
        attr("LifetimeEnergyConsumed", 0x0017, U32).nullable(),
        attr("OperationMode", 0x0020, ENUM8),
        attr("ControlMode", 0x0021, ENUM8),
    ],
};

pub const THERMOSTAT: ClusterSchema = ClusterSchema {
    name: "Thermostat",
    id: 0x0201,
    attributes: &[
        attr("HVACSystemTypeConfiguration", 0x0009, MAP8),
        attr("LocalTemperatureCalibration", 0x0010, I8).range(-25, 25),
        attr("OccupiedCoolingSetpoint", 0x0011, I16),
        attr("OccupiedHeatingSetpoint", 0x0012, I16),
        attr("UnoccupiedCoolingSetpoint", 0x0013, I16),
        attr("UnoccupiedHeatingSetpoint", 0x0014, I16),
        attr("MinHeatSetpointLimit", 0x0015, I16),
        attr("MaxHeatSetpointLimit", 0x0016, I16),
        attr("MinCoolSetpointLimit", 0x0017, I16),
        attr("MaxCoolSetpointLimit", 0x0018, I16),
        attr("MinSetpointDeadBand", 0x0019, I8).range(0, 25),
        attr("RemoteSensing", 0x001A, MAP8),
        attr("ControlSequenceOfOperation", 0x001B, ENUM8),
        attr("SystemMode", 0x001C, ENUM8),
        attr("TemperatureSetpointHold", 0x0023, ENUM8),
        attr("TemperatureSetpointHoldDuration", 0x0024, U16)
            .nullable()
            .range(0, 1440),
        attr("ThermostatProgrammingOperationMode", 0x0025, MAP8),
        attr("OccupiedSetback", 0x0034, U8).nullable(),
        attr("UnoccupiedSetback", 0x0037, U8).nullable(),
        attr("EmergencyHeatDelta", 0x003A, U8),
        attr("ACType", 0x0040, ENUM8),
        attr("ACCapacity", 0x0041, U16),
        attr("ACRefrigerantType", 0x0042, ENUM8),
        attr("ACCompressorType", 0x0043, ENUM8),
        attr("ACErrorCode", 0x0044, MAP32),
        attr("ACLouverPosition", 0x0045, ENUM8),
        attr("ACCapacityformat", 0x0047, ENUM8),
    ],
};

pub const FAN_CONTROL: ClusterSchema = ClusterSchema {
    name: "FanControl",
    id: 0x0202,
    attributes: &[
        attr("FanMode", 0x0000, ENUM8),
        attr("FanModeSequence", 0x0001, ENUM8),
        attr("PercentSetting", 0x0002, U8).nullable().range(0, 100),
        attr("SpeedSetting", 0x0005, U8).nullable(),
        attr("RockSetting", 0x0008, MAP8),
        attr("WindSetting", 0x000A, MAP8),
    ],
};

pub const THERMOSTAT_USER_INTERFACE_CONFIGURATION: ClusterSchema = ClusterSchema {
    name: "ThermostatUserInterfaceConfiguration",
    id: 0x0204,
    attributes: &[
        attr("TemperatureDisplayMode", 0x0000, ENUM8),
        attr("KeypadLockout", 0x0001, ENUM8),
        attr("ScheduleProgrammingVisibility", 0x0002, ENUM8),
    ],
};

pub const COLOR_CONTROL: ClusterSchema = ClusterSchema {
    name: "ColorControl",
    id: 0x0300,
    attributes: &[
        attr("Options", 0x000F, MAP8),
        attr("WhitePointX", 0x0030, U16).range(0, 0xFEFF),
        attr("WhitePointY", 0x0031, U16).range(0, 0xFEFF),
        attr("ColorPointRX", 0x0032, U16).range(0, 0xFEFF),
        attr("ColorPointRY", 0x0033, U16).range(0, 0xFEFF),
        attr("ColorPointRIntensity", 0x0034, U8).nullable(),
        attr("ColorPointGX", 0x0036, U16).range(0, 0xFEFF),
        attr("ColorPointGY", 0x0037, U16).range(0, 0xFEFF),
        attr("ColorPointGIntensity", 0x0038, U8).nullable(),
        attr("ColorPointBX", 0x003A, U16).range(0, 0xFEFF),
        attr("ColorPointBY", 0x003B, U16).range(0, 0xFEFF),
        attr("ColorPointBIntensity", 0x003C, U8).nullable(),
        attr("StartUpColorTemperatureMireds", 0x4010, U16)
            .nullable()
            .range(0, 0xFEFF),
    ],
};

pub const BALLAST_CONFIGURATION: ClusterSchema = ClusterSchema {
    name: "BallastConfiguration",
    id: 0x0301,
    attributes: &[
        attr("MinLevel", 0x0010, U8).range(1, 254),
        attr("MaxLevel", 0x0011, U8).range(1, 254),
        attr("IntrinsicBallastFactor", 0x0014, U8).nullable(),
        attr("BallastFactorAdjustment", 0x0015, U8).nullable().range(100, 254),
        attr("LampType", 0x0030, STR).max_len(16),
        attr("LampManufacturer", 0x0031, STR).max_len(16),
        attr("LampRatedHours", 0x0032, U24).nullable(),
        attr("LampBurnHours", 0x0033, U24).nullable(),
        attr("LampAlarmMode", 0x0034, MAP8),
        attr("LampBurnHoursTripPoint", 0x0035, U24).nullable(),
    ],
};

pub const OCCUPANCY_SENSING: ClusterSchema = ClusterSchema {
    name: "OccupancySensing",
    id: 0x0406,
    attributes: &[
        attr("PIROccupiedToUnoccupiedDelay", 0x0010, U16),
        attr("PIRUnoccupiedToOccupiedDelay", 0x0011, U16),
        attr("PIRUnoccupiedToOccupiedThreshold", 0x0012, U8).range(1, 254),
        attr("UltrasonicOccupiedToUnoccupiedDelay", 0x0020, U16),
        attr("UltrasonicUnoccupiedToOccupiedDelay", 0x0021, U16),
        attr("UltrasonicUnoccupiedToOccupiedThreshold", 0x0022, U8).range(1, 254),
        attr("PhysicalContactOccupiedToUnoccupiedDelay", 0x0030, U16),
        attr("PhysicalContactUnoccupiedToOccupiedDelay", 0x0031, U16),
        attr("PhysicalContactUnoccupiedToOccupiedThreshold", 0x0032, U8).range(1, 254),
    ],
};

pub const CONTENT_LAUNCHER: ClusterSchema = ClusterSchema {
    name: "ContentLauncher",
    id: 0x050A,
    attributes: &[attr("SupportedStreamingProtocols", 0x0001, MAP32)],
};

pub const ELECTRICAL_MEASUREMENT: ClusterSchema = ClusterSchema {
    name: "ElectricalMeasurement",
    id: 0x0B04,
    attributes: &[
        attr("AverageRmsVoltageMeasurementPeriod", 0x0511, U16),
        attr("AverageRmsUnderVoltageCounter", 0x0513, U16),
        attr("RmsExtremeOverVoltagePeriod", 0x0514, U16),
        attr("RmsExtremeUnderVoltagePeriod", 0x0515, U16),
        attr("RmsVoltageSagPeriod", 0x0516, U16),
        attr("RmsVoltageSwellPeriod", 0x0517, U16),
        attr("OverloadAlarmsMask", 0x0700, MAP8),
        attr("AcOverloadAlarmsMask", 0x0800, MAP16),
    ],
};

/// Test cluster exercising every value type, nullable variants at
/// `0x4000 + id`, range restricted integers and a timed-only attribute.
pub const UNIT_TESTING: ClusterSchema = ClusterSchema {
    name: "UnitTesting",
    id: 0xFFF1_FC05,
    attributes: &[
        attr("Boolean", 0x0000, BOOL),
        attr("Bitmap8", 0x0001, MAP8),
        attr("Bitmap16", 0x0002, MAP16),
        attr("Bitmap32", 0x0003, MAP32),
        attr("Bitmap64", 0x0004, MAP64),
        attr("Int8u", 0x0005, U8),
        attr("Int16u", 0x0006, U16),
        attr("Int24u", 0x0007, U24),
        attr("Int32u", 0x0008, U32),
        attr("Int40u", 0x0009, U40),
        attr("Int48u", 0x000A, U48),
        attr("Int56u", 0x000B, U56),
        attr("Int64u", 0x000C, U64),
        attr("Int8s", 0x000D, I8),
        attr("Int16s", 0x000E, I16),
        attr("Int24s", 0x000F, I24),
        attr("Int32s", 0x0010, I32),
        attr("Int40s", 0x0011, I40),
        attr("Int48s", 0x0012, I48),
        attr("Int56s", 0x0013, I56),
        attr("Int64s", 0x0014, I64),
        attr("Enum8", 0x0015, ENUM8),
        attr("Enum16", 0x0016, ENUM16),
        attr("FloatSingle", 0x0017, Float32),
        attr("FloatDouble", 0x0018, Float64),
        attr("OctetString", 0x0019, OctetString).max_len(10),
        attr("LongOctetString", 0x001D, LongOctetString).max_len(1000),
        attr("CharString", 0x001E, STR).max_len(10),
        attr("LongCharString", 0x001F, LongCharString).max_len(1000),
        attr("EpochUs", 0x0020, U64),
        attr("EpochS", 0x0021, U32),
        attr("VendorId", 0x0022, U16),
        attr("EnumAttr", 0x0024, ENUM8),
        attr("RangeRestrictedInt8u", 0x0026, U8).range(20, 100),
        attr("RangeRestrictedInt8s", 0x0027, I8).range(-40, 50),
        attr("RangeRestrictedInt16u", 0x0028, U16).range(100, 1000),
        attr("RangeRestrictedInt16s", 0x0029, I16).range(-150, 200),
        attr("WriteOnlyInt8u", 0x002A, U8),
        attr("TimedWriteBoolean", 0x0030, BOOL).timed(),
        attr("GeneralErrorBoolean", 0x0031, BOOL),
        attr("ClusterErrorBoolean", 0x0032, BOOL),
        attr("Unsupported", 0x00FF, BOOL),
        attr("NullableBoolean", 0x4000, BOOL).nullable(),
        attr("NullableBitmap8", 0x4001, MAP8).nullable(),
        attr("NullableBitmap16", 0x4002, MAP16).nullable(),
        attr("NullableBitmap32", 0x4003, MAP32).nullable(),
        attr("NullableBitmap64", 0x4004, MAP64).nullable(),
        attr("NullableInt8u", 0x4005, U8).nullable(),
        attr("NullableInt16u", 0x4006, U16).nullable(),
        attr("NullableInt24u", 0x4007, U24).nullable(),
        attr("NullableInt32u", 0x4008, U32).nullable(),
        attr("NullableInt40u", 0x4009, U40).nullable(),
        attr("NullableInt48u", 0x400A, U48).nullable(),
        attr("NullableInt56u", 0x400B, U56).nullable(),
        attr("NullableInt64u", 0x400C, U64).nullable(),
        attr("NullableInt8s", 0x400D, I8).nullable(),
        attr("NullableInt16s", 0x400E, I16).nullable(),
        attr("NullableInt24s", 0x400F, I24).nullable(),
        attr("NullableInt32s", 0x4010, I32).nullable(),
        attr("NullableInt40s", 0x4011, I40).nullable(),
        attr("NullableInt48s", 0x4012, I48).nullable(),
        attr("NullableInt56s", 0x4013, I56).nullable(),
        attr("NullableInt64s", 0x4014, I64).nullable(),
        attr("NullableEnum8", 0x4015, ENUM8).nullable(),
        attr("NullableEnum16", 0x4016, ENUM16).nullable(),
        attr("NullableFloatSingle", 0x4017, Float32).nullable(),
        attr("NullableFloatDouble", 0x4018, Float64).nullable(),
        attr("NullableOctetString", 0x4019, OctetString).nullable().max_len(10),
        attr("NullableCharString", 0x401E, STR).nullable().max_len(10),
        attr("NullableEnumAttr", 0x4024, ENUM8).nullable(),
        attr("NullableRangeRestrictedInt8u", 0x4026, U8)
            .nullable()
            .range(20, 100),
        attr("NullableRangeRestrictedInt8s", 0x4027, I8)
            .nullable()
            .range(-40, 50),
        attr("NullableRangeRestrictedInt16u", 0x4028, U16)
            .nullable()
            .range(100, 1000),
        attr("NullableRangeRestrictedInt16s", 0x4029, I16)
            .nullable()
            .range(-150, 200),
    ],
};

pub static CLUSTERS: &[ClusterSchema] = &[
    IDENTIFY,
    ON_OFF,
    ON_OFF_SWITCH_CONFIGURATION,
    LEVEL_CONTROL,
    BINARY_INPUT_BASIC,
    BASIC_INFORMATION,
    LOCALIZATION_CONFIGURATION,
    TIME_FORMAT_LOCALIZATION,
    UNIT_LOCALIZATION,
    GENERAL_COMMISSIONING,
    NETWORK_COMMISSIONING,
    BRIDGED_DEVICE_BASIC_INFORMATION,
    MODE_SELECT,
    DOOR_LOCK,
    WINDOW_COVERING,
    BARRIER_CONTROL,
    PUMP_CONFIGURATION_AND_CONTROL,
    THERMOSTAT,
    FAN_CONTROL,
    THERMOSTAT_USER_INTERFACE_CONFIGURATION,
    COLOR_CONTROL,
    BALLAST_CONFIGURATION,
    OCCUPANCY_SENSING,
    CONTENT_LAUNCHER,
    ELECTRICAL_MEASUREMENT,
    UNIT_TESTING,
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut clusters = HashSet::new();
        for cluster in CLUSTERS {
            assert!(clusters.insert(cluster.id), "duplicate cluster {}", cluster.name);
            let mut attributes = HashSet::new();
            for attribute in cluster.attributes {
                assert!(
                    attributes.insert(attribute.id),
                    "duplicate attribute {}.{}",
                    cluster.name,
                    attribute.name
                );
            }
        }
    }

    #[test]
    fn test_lookup() {
        let on_time = attribute(0x0006, 0x4001).unwrap();
        assert_eq!(on_time.name, "OnTime");
        assert_eq!(on_time.ty, AttributeType::new(ValueType::UInt(IntWidth::W16)));

        let cluster = cluster_by_name("unitTesting").unwrap();
        let timed = cluster.attribute_by_name("timedWriteBoolean").unwrap();
        assert!(timed.timed);
        assert_eq!(
            cluster.attributes.iter().filter(|attribute| attribute.timed).count(),
            1
        );
        assert!(attribute(0x0006, 0x0000).is_none());
    }
}
