//! Decoding of the three status words at 0x3200-0x3202.
//!
//! Coded fields keep out of range values as `Unknown` instead of
//! clamping them. Single bit conditions are independent flags.

use crate::decode::{bit, bits};
use bitflags::bitflags;
use serde_derive::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemperatureCondition {
    Normal,
    OverTemp,
    LowTemp,
    Unknown(u8),
}

impl From<u16> for TemperatureCondition {
    fn from(code: u16) -> Self {
        match code {
            0 => TemperatureCondition::Normal,
            1 => TemperatureCondition::OverTemp,
            2 => TemperatureCondition::LowTemp,
            c => TemperatureCondition::Unknown(c as u8),
        }
    }
}

impl TemperatureCondition {
    pub fn code(&self) -> u8 {
        match *self {
            TemperatureCondition::Normal => 0,
            TemperatureCondition::OverTemp => 1,
            TemperatureCondition::LowTemp => 2,
            TemperatureCondition::Unknown(c) => c,
        }
    }
}

impl fmt::Display for TemperatureCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemperatureCondition::Normal => write!(f, "NormalTemp"),
            TemperatureCondition::OverTemp => write!(f, "OverTemp"),
            TemperatureCondition::LowTemp => write!(f, "LowTemp"),
            TemperatureCondition::Unknown(c) => write!(f, "UnknownTemp({})", c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoltageCondition {
    Normal,
    Over,
    Under,
    LowVoltageDisconnect,
    Fault,
    Unknown(u8),
}

impl From<u16> for VoltageCondition {
    fn from(code: u16) -> Self {
        match code {
            0 => VoltageCondition::Normal,
            1 => VoltageCondition::Over,
            2 => VoltageCondition::Under,
            3 => VoltageCondition::LowVoltageDisconnect,
            4 => VoltageCondition::Fault,
            c => VoltageCondition::Unknown(c as u8),
        }
    }
}

impl VoltageCondition {
    pub fn code(&self) -> u8 {
        match *self {
            VoltageCondition::Normal => 0,
            VoltageCondition::Over => 1,
            VoltageCondition::Under => 2,
            VoltageCondition::LowVoltageDisconnect => 3,
            VoltageCondition::Fault => 4,
            VoltageCondition::Unknown(c) => c,
        }
    }
}

impl fmt::Display for VoltageCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VoltageCondition::Normal => write!(f, "NormalVolt"),
            VoltageCondition::Over => write!(f, "OverVolt"),
            VoltageCondition::Under => write!(f, "UnderVolt"),
            VoltageCondition::LowVoltageDisconnect => write!(f, "LowVoltDisconnect"),
            VoltageCondition::Fault => write!(f, "FaultVolt"),
            VoltageCondition::Unknown(c) => write!(f, "UnknownVolt({})", c),
        }
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct BatteryFlags: u16 {
        const WRONG_ID            = 1 << 15;
        const RESISTANCE_ABNORMAL = 1 << 8;
    }
}

const BATTERY_FLAG_NAMES: [(BatteryFlags, &str); 2] = [
    (BatteryFlags::WRONG_ID, "WrongID"),
    (BatteryFlags::RESISTANCE_ABNORMAL, "ResAbnormal"),
];

/// Battery status word, register 0x3200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    pub raw: u16,
    pub temperature: TemperatureCondition,
    pub voltage: VoltageCondition,
    pub flags: BatteryFlags,
}

impl From<u16> for BatteryStatus {
    fn from(raw: u16) -> Self {
        BatteryStatus {
            raw,
            temperature: TemperatureCondition::from(bits(raw, 4, 4)),
            voltage: VoltageCondition::from(bits(raw, 0, 4)),
            flags: BatteryFlags::from_bits_truncate(raw),
        }
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.temperature, self.voltage)?;
        for (flag, name) in BATTERY_FLAG_NAMES.iter() {
            if self.flags.contains(*flag) {
                write!(f, " {}", name)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChargingMode {
    NoCharging,
    Float,
    Boost,
    Equalization,
}

impl From<u16> for ChargingMode {
    fn from(code: u16) -> Self {
        match code & 0b11 {
            0 => ChargingMode::NoCharging,
            1 => ChargingMode::Float,
            2 => ChargingMode::Boost,
            _ => ChargingMode::Equalization,
        }
    }
}

impl ChargingMode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ChargingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChargingMode::NoCharging => write!(f, "NoCharging"),
            ChargingMode::Float => write!(f, "FloatCharging"),
            ChargingMode::Boost => write!(f, "BoostCharging"),
            ChargingMode::Equalization => write!(f, "EqualizationCharging"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputVoltageCondition {
    Normal,
    NoPower,
    Higher,
    Error,
}

impl From<u16> for InputVoltageCondition {
    fn from(code: u16) -> Self {
        match code & 0b11 {
            0 => InputVoltageCondition::Normal,
            1 => InputVoltageCondition::NoPower,
            2 => InputVoltageCondition::Higher,
            _ => InputVoltageCondition::Error,
        }
    }
}

impl InputVoltageCondition {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for InputVoltageCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputVoltageCondition::Normal => write!(f, "NormalInputVolt"),
            InputVoltageCondition::NoPower => write!(f, "NoPowerInputVolt"),
            InputVoltageCondition::Higher => write!(f, "HigherInputVolt"),
            InputVoltageCondition::Error => write!(f, "ErrorInputVolt"),
        }
    }
}

bitflags! {
    /// Single bit conditions of the charging status word.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct ChargingFlags: u16 {
        const RUNNING                                = 1 << 0;
        const FAULT                                  = 1 << 1;
        const PV_INPUT_SHORT                         = 1 << 4;
        const LOAD_OPEN_CIRCUIT                      = 1 << 5;
        const LOAD_MOSFET_SHORT                      = 1 << 7;
        const LOAD_SHORT                             = 1 << 8;
        const LOAD_OVER_CURRENT                      = 1 << 9;
        const INPUT_OVER_CURRENT                     = 1 << 10;
        const ANTI_REVERSE_MOSFET_SHORT              = 1 << 11;
        const CHARGING_OR_ANTI_REVERSE_MOSFET_SHORT  = 1 << 12;
        const CHARGING_MOSFET_SHORT                  = 1 << 13;
    }
}

const CHARGING_FLAG_NAMES: [(ChargingFlags, &str); 11] = [
    (ChargingFlags::RUNNING, "Running"),
    (ChargingFlags::FAULT, "Fault"),
    (ChargingFlags::PV_INPUT_SHORT, "PvInputShort"),
    (ChargingFlags::LOAD_OPEN_CIRCUIT, "LoadOpenCircuit"),
    (ChargingFlags::LOAD_MOSFET_SHORT, "LoadMosfetShort"),
    (ChargingFlags::LOAD_SHORT, "LoadShort"),
    (ChargingFlags::LOAD_OVER_CURRENT, "LoadOverCurrent"),
    (ChargingFlags::INPUT_OVER_CURRENT, "InputOverCurrent"),
    (ChargingFlags::ANTI_REVERSE_MOSFET_SHORT, "AntiReverseMosfetShort"),
    (ChargingFlags::CHARGING_OR_ANTI_REVERSE_MOSFET_SHORT, "ChargingOrAntiReverseMosfetShort"),
    (ChargingFlags::CHARGING_MOSFET_SHORT, "ChargingMosfetShort"),
];

impl ChargingFlags {
    /// Display name of a single flag.
    pub fn name(&self) -> Option<&'static str> {
        CHARGING_FLAG_NAMES.iter().find(|(f, _)| f == self).map(|(_, n)| *n)
    }
}

/// Charging equipment status word, register 0x3201.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChargingStatus {
    pub raw: u16,
    pub mode: ChargingMode,
    pub input_voltage: InputVoltageCondition,
    pub flags: ChargingFlags,
}

impl ChargingStatus {
    pub fn is_running(&self) -> bool {
        bit(self.raw, 0)
    }
}

impl From<u16> for ChargingStatus {
    fn from(raw: u16) -> Self {
        ChargingStatus {
            raw,
            mode: ChargingMode::from(bits(raw, 2, 2)),
            input_voltage: InputVoltageCondition::from(bits(raw, 14, 2)),
            flags: ChargingFlags::from_bits_truncate(raw),
        }
    }
}

impl fmt::Display for ChargingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.mode, self.input_voltage)?;
        for (flag, name) in CHARGING_FLAG_NAMES.iter() {
            if self.flags.contains(*flag) {
                write!(f, " {}", name)?;
            }
        }
        Ok(())
    }
}

/// Discharging equipment status word, register 0x3202. Kept raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DischargingStatus {
    pub raw: u16,
}

impl DischargingStatus {
    pub fn bits(&self, position: u8, width: u8) -> u16 {
        bits(self.raw, position, width)
    }
}

impl From<u16> for DischargingStatus {
    fn from(raw: u16) -> Self {
        DischargingStatus { raw }
    }
}

impl fmt::Display for DischargingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016b}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_resistance_abnormal() {
        let s = BatteryStatus::from(0x0100);
        assert_eq!(s.temperature, TemperatureCondition::Normal);
        assert_eq!(s.voltage, VoltageCondition::Normal);
        assert_eq!(s.flags, BatteryFlags::RESISTANCE_ABNORMAL);
        assert_eq!(s.to_string(), "NormalTemp,NormalVolt ResAbnormal");
    }

    #[test]
    fn battery_flags_render_in_fixed_order() {
        let s = BatteryStatus::from(0x8113);
        assert_eq!(s.temperature, TemperatureCondition::OverTemp);
        assert_eq!(s.voltage, VoltageCondition::LowVoltageDisconnect);
        assert_eq!(s.to_string(), "OverTemp,LowVoltDisconnect WrongID ResAbnormal");
        assert_eq!(BatteryStatus::from(0x0024).to_string(), "LowTemp,FaultVolt");
    }

    #[test]
    fn out_of_range_codes_are_preserved() {
        let s = BatteryStatus::from(0x00A7);
        assert_eq!(s.temperature, TemperatureCondition::Unknown(0xA));
        assert_eq!(s.voltage, VoltageCondition::Unknown(7));
        assert_eq!(s.temperature.code(), 0xA);
        assert_eq!(s.voltage.code(), 7);
        assert_eq!(s.to_string(), "UnknownTemp(10),UnknownVolt(7)");
    }

    #[test]
    fn charging_mode_and_input() {
        let s = ChargingStatus::from(0b01_000000_0000_1001);
        assert!(s.is_running());
        assert_eq!(s.mode, ChargingMode::Boost);
        assert_eq!(s.input_voltage, InputVoltageCondition::NoPower);
        assert_eq!(s.flags, ChargingFlags::RUNNING);
        assert_eq!(s.to_string(), "BoostCharging,NoPowerInputVolt Running");
        assert_eq!(ChargingStatus::from(0).to_string(), "NoCharging,NormalInputVolt");
        assert_eq!(ChargingStatus::from(0xC00C).to_string(), "EqualizationCharging,ErrorInputVolt");
    }

    #[test]
    fn ambiguous_bits_are_independent() {
        let s = ChargingStatus::from(0x0012);
        assert!(s.flags.contains(ChargingFlags::FAULT));
        assert!(s.flags.contains(ChargingFlags::PV_INPUT_SHORT));
        assert!(!s.flags.contains(ChargingFlags::RUNNING));
        // bit 4 does not leak into the mode code
        assert_eq!(s.mode, ChargingMode::NoCharging);
        assert_eq!(s.to_string(), "NoCharging,NormalInputVolt Fault PvInputShort");
    }

    #[test]
    fn every_fault_flag_renders_in_bit_order() {
        let s = ChargingStatus::from(0x3FA1);
        assert_eq!(s.mode, ChargingMode::NoCharging);
        assert_eq!(
            s.to_string(),
            "NoCharging,NormalInputVolt Running LoadOpenCircuit LoadMosfetShort LoadShort \
             LoadOverCurrent InputOverCurrent AntiReverseMosfetShort \
             ChargingOrAntiReverseMosfetShort ChargingMosfetShort"
        );
        assert_eq!(ChargingFlags::LOAD_SHORT.name(), Some("LoadShort"));
        assert_eq!((ChargingFlags::LOAD_SHORT | ChargingFlags::RUNNING).name(), None);
    }

    #[test]
    fn discharging_is_raw() {
        let s = DischargingStatus::from(0x0C01);
        assert_eq!(s.raw, 0x0C01);
        assert_eq!(s.bits(0, 1), 1);
        assert_eq!(s.bits(10, 2), 0b11);
        assert_eq!(s.to_string(), "0000110000000001");
    }
}
