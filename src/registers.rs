//! The Tracer register map.
//!
//! Telemetry lives in the input bank (function code 0x04, addresses
//! 0x3000-0x33FF), settings in the holding bank (function code 0x03,
//! addresses 0x9000 and up). Double width values are stored low word
//! first.

use serde_derive::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bank {
    /// Read only measurements.
    Input,
    /// Device settings.
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Single,
    /// Two consecutive registers, low word at the lower address.
    Double,
}

impl Width {
    pub const fn registers(self) -> u16 {
        match self {
            Width::Single => 1,
            Width::Double => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Unsigned,
    /// Two's complement over the full width of the field.
    Signed,
}

/// Static description of one value in the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterField {
    pub address: u16,
    pub width: Width,
    /// Divisor applied to the raw integer.
    pub scale: u16,
    pub encoding: Encoding,
    pub bank: Bank,
}

impl RegisterField {
    const fn input(address: u16, width: Width, scale: u16) -> Self {
        RegisterField { address, width, scale, encoding: Encoding::Unsigned, bank: Bank::Input }
    }

    const fn holding(address: u16, scale: u16) -> Self {
        RegisterField {
            address,
            width: Width::Single,
            scale,
            encoding: Encoding::Unsigned,
            bank: Bank::Holding,
        }
    }

    const fn signed(self) -> Self {
        RegisterField { encoding: Encoding::Signed, ..self }
    }

    /// Address of the last register this field occupies.
    pub const fn last_address(&self) -> u16 {
        self.address + self.width.registers() - 1
    }
}

const CENTI: u16 = 100;
const UNIT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    RatedInputVoltage,
    RatedInputCurrent,
    RatedInputPower,
    RatedBatteryVoltage,
    RatedBatteryCurrent,
    RatedBatteryPower,

    ChargingVoltage,
    ChargingCurrent,
    ChargingPower,
    BatteryVoltage,
    BatteryCurrent,
    BatteryPower,
    LoadVoltage,
    LoadCurrent,
    LoadPower,
    BatteryTemperature,
    InsideTemperature,
    HeatsinkTemperature,
    BatterySoc,
    RemoteBatteryTemperature,
    BatteryTemperature2,

    BatteryStatus,
    ChargingStatus,
    DischargingStatus,

    BatteryVoltageMaxToday,
    BatteryVoltageMinToday,
    ConsumedToday,
    ConsumedMonth,
    ConsumedYear,
    ConsumedTotal,
    GeneratedToday,
    GeneratedMonth,
    GeneratedYear,
    GeneratedTotal,
    BatteryNetVoltage,
    BatteryNetCurrent,

    BatteryType,
    BatteryCapacity,
    TemperatureCompensation,
    OverVoltageDisconnect,
    ChargingLimitVoltage,
    OverVoltageReconnect,
    EqualizeChargingVoltage,
    BoostChargingVoltage,
    FloatChargingVoltage,
    BoostReconnectChargingVoltage,
    LowVoltageReconnect,
    UnderVoltageWarningRecover,
    UnderVoltageWarning,
    LowVoltageDisconnect,
    DischargingLimitVoltage,
    RealTimeClockSecondMinute,
    RealTimeClockHourDay,
    RealTimeClockMonthYear,
    EqualizePeriod,
    EqualizeDuration,
    BoostDuration,
}

impl Register {
    pub const fn field(self) -> RegisterField {
        use Register::*;
        use Width::*;
        match self {
            RatedInputVoltage => RegisterField::input(0x3000, Single, CENTI),
            RatedInputCurrent => RegisterField::input(0x3001, Single, CENTI),
            RatedInputPower => RegisterField::input(0x3002, Double, CENTI),
            RatedBatteryVoltage => RegisterField::input(0x3004, Single, CENTI),
            RatedBatteryCurrent => RegisterField::input(0x3005, Single, CENTI),
            RatedBatteryPower => RegisterField::input(0x3006, Double, CENTI),

            ChargingVoltage => RegisterField::input(0x3100, Single, CENTI),
            ChargingCurrent => RegisterField::input(0x3101, Single, CENTI),
            ChargingPower => RegisterField::input(0x3102, Double, CENTI),
            BatteryVoltage => RegisterField::input(0x3104, Single, CENTI),
            BatteryCurrent => RegisterField::input(0x3105, Single, CENTI),
            BatteryPower => RegisterField::input(0x3106, Double, CENTI),
            LoadVoltage => RegisterField::input(0x310C, Single, CENTI),
            LoadCurrent => RegisterField::input(0x310D, Single, CENTI),
            LoadPower => RegisterField::input(0x310E, Double, CENTI),
            BatteryTemperature => RegisterField::input(0x3110, Single, CENTI),
            InsideTemperature => RegisterField::input(0x3111, Single, CENTI),
            HeatsinkTemperature => RegisterField::input(0x3112, Single, CENTI),
            BatterySoc => RegisterField::input(0x311A, Single, UNIT),
            RemoteBatteryTemperature => RegisterField::input(0x311B, Single, CENTI),
            BatteryTemperature2 => RegisterField::input(0x311D, Single, CENTI),

            BatteryStatus => RegisterField::input(0x3200, Single, UNIT),
            ChargingStatus => RegisterField::input(0x3201, Single, UNIT),
            DischargingStatus => RegisterField::input(0x3202, Single, UNIT),

            BatteryVoltageMaxToday => RegisterField::input(0x3302, Single, CENTI),
            BatteryVoltageMinToday => RegisterField::input(0x3303, Single, CENTI),
            ConsumedToday => RegisterField::input(0x3304, Double, CENTI),
            ConsumedMonth => RegisterField::input(0x3306, Double, CENTI),
            ConsumedYear => RegisterField::input(0x3308, Double, CENTI),
            ConsumedTotal => RegisterField::input(0x330A, Double, CENTI),
            GeneratedToday => RegisterField::input(0x330C, Double, CENTI),
            GeneratedMonth => RegisterField::input(0x330E, Double, CENTI),
            GeneratedYear => RegisterField::input(0x3310, Double, CENTI),
            GeneratedTotal => RegisterField::input(0x3312, Double, CENTI),
            BatteryNetVoltage => RegisterField::input(0x331A, Single, CENTI),
            BatteryNetCurrent => RegisterField::input(0x331B, Double, CENTI).signed(),

            BatteryType => RegisterField::holding(0x9000, UNIT),
            BatteryCapacity => RegisterField::holding(0x9001, UNIT),
            TemperatureCompensation => RegisterField::holding(0x9002, CENTI),
            OverVoltageDisconnect => RegisterField::holding(0x9003, CENTI),
            ChargingLimitVoltage => RegisterField::holding(0x9004, CENTI),
            OverVoltageReconnect => RegisterField::holding(0x9005, CENTI),
            EqualizeChargingVoltage => RegisterField::holding(0x9006, CENTI),
            BoostChargingVoltage => RegisterField::holding(0x9007, CENTI),
            FloatChargingVoltage => RegisterField::holding(0x9008, CENTI),
            BoostReconnectChargingVoltage => RegisterField::holding(0x9009, CENTI),
            LowVoltageReconnect => RegisterField::holding(0x900A, CENTI),
            UnderVoltageWarningRecover => RegisterField::holding(0x900B, CENTI),
            UnderVoltageWarning => RegisterField::holding(0x900C, CENTI),
            LowVoltageDisconnect => RegisterField::holding(0x900D, CENTI),
            DischargingLimitVoltage => RegisterField::holding(0x900E, CENTI),
            RealTimeClockSecondMinute => RegisterField::holding(0x9013, UNIT),
            RealTimeClockHourDay => RegisterField::holding(0x9014, UNIT),
            RealTimeClockMonthYear => RegisterField::holding(0x9015, UNIT),
            EqualizePeriod => RegisterField::holding(0x9016, UNIT),
            EqualizeDuration => RegisterField::holding(0x906B, UNIT),
            BoostDuration => RegisterField::holding(0x906C, UNIT),
        }
    }
}

/// One contiguous read of `count` registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    pub bank: Bank,
    pub start: u16,
    pub count: u16,
}

impl BlockSpec {
    const fn input(start: u16, count: u16) -> Self {
        BlockSpec { bank: Bank::Input, start, count }
    }

    const fn holding(start: u16, count: u16) -> Self {
        BlockSpec { bank: Bank::Holding, start, count }
    }

    pub fn contains(&self, field: RegisterField) -> bool {
        field.bank == self.bank
            && field.address >= self.start
            && u32::from(field.last_address()) < u32::from(self.start) + u32::from(self.count)
    }
}

pub const RATED_INPUT: BlockSpec = BlockSpec::input(0x3000, 4);
pub const RATED_BATTERY: BlockSpec = BlockSpec::input(0x3004, 4);
pub const CHARGING: BlockSpec = BlockSpec::input(0x3100, 4);
pub const BATTERY: BlockSpec = BlockSpec::input(0x3104, 4);
pub const LOAD: BlockSpec = BlockSpec::input(0x310C, 4);
pub const TEMPERATURES: BlockSpec = BlockSpec::input(0x3110, 3);
pub const BATTERY_SOC: BlockSpec = BlockSpec::input(0x311A, 1);
pub const REMOTE_BATTERY_TEMPERATURE: BlockSpec = BlockSpec::input(0x311B, 1);
pub const BATTERY_TEMPERATURE_2: BlockSpec = BlockSpec::input(0x311D, 1);
pub const STATUS: BlockSpec = BlockSpec::input(0x3200, 3);
pub const HISTORY: BlockSpec = BlockSpec::input(0x3302, 18);
pub const BATTERY_NET: BlockSpec = BlockSpec::input(0x331A, 3);

pub const BATTERY_SETTINGS: BlockSpec = BlockSpec::holding(0x9000, 15);
pub const EQUALIZE_DURATION: BlockSpec = BlockSpec::holding(0x906B, 1);
pub const BOOST_DURATION: BlockSpec = BlockSpec::holding(0x906C, 1);
pub const EQUALIZE_PERIOD: BlockSpec = BlockSpec::holding(0x9016, 1);
pub const REAL_TIME_CLOCK: BlockSpec = BlockSpec::holding(0x9013, 3);
