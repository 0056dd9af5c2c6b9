//! The result of one complete poll cycle.

use crate::decode::RawRegisterBlock;
use crate::registers::{self, Register};
use crate::status::{BatteryStatus, ChargingStatus, DischargingStatus};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_derive::Serialize;
use std::fmt;
use uom::si::{
    electric_charge::ampere_hour,
    electric_current::ampere,
    electric_potential::volt,
    energy::kilowatt_hour,
    f64::{
        ElectricCharge, ElectricCurrent, ElectricPotential, Energy, Power, Ratio,
        ThermodynamicTemperature, Time,
    },
    power::watt,
    ratio::percent,
    thermodynamic_temperature::degree_celsius,
    time::{day, minute},
};

fn potential(block: &RawRegisterBlock, r: Register) -> ElectricPotential {
    ElectricPotential::new::<volt>(block.value(r.field()))
}

fn current(block: &RawRegisterBlock, r: Register) -> ElectricCurrent {
    ElectricCurrent::new::<ampere>(block.value(r.field()))
}

fn power(block: &RawRegisterBlock, r: Register) -> Power {
    Power::new::<watt>(block.value(r.field()))
}

fn energy(block: &RawRegisterBlock, r: Register) -> Energy {
    Energy::new::<kilowatt_hour>(block.value(r.field()))
}

fn temperature(block: &RawRegisterBlock, r: Register) -> ThermodynamicTemperature {
    ThermodynamicTemperature::new::<degree_celsius>(block.value(r.field()))
}

/// Voltage, current and power of one side of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Electrical {
    pub voltage: ElectricPotential,
    pub current: ElectricCurrent,
    pub power: Power,
}

impl Electrical {
    pub fn decode(block: &RawRegisterBlock, v: Register, i: Register, p: Register) -> Self {
        Electrical { voltage: potential(block, v), current: current(block, i), power: power(block, p) }
    }
}

impl fmt::Display for Electrical {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.2}V {:.2}A {:.2}W",
            self.voltage.get::<volt>(),
            self.current.get::<ampere>(),
            self.power.get::<watt>()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperatures {
    pub battery: ThermodynamicTemperature,
    pub inside: ThermodynamicTemperature,
    pub heatsink: ThermodynamicTemperature,
    pub remote_battery: ThermodynamicTemperature,
    pub battery_2: ThermodynamicTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyCounters {
    pub today: Energy,
    pub month: Energy,
    pub year: Energy,
    pub total: Energy,
}

impl fmt::Display for EnergyCounters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.2}kWh day {:.2}kWh month {:.2}kWh year {:.2}kWh total",
            self.today.get::<kilowatt_hour>(),
            self.month.get::<kilowatt_hour>(),
            self.year.get::<kilowatt_hour>(),
            self.total.get::<kilowatt_hour>()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct History {
    pub battery_voltage_max_today: ElectricPotential,
    pub battery_voltage_min_today: ElectricPotential,
    pub consumed: EnergyCounters,
    pub generated: EnergyCounters,
}

impl History {
    pub fn decode(block: &RawRegisterBlock) -> Self {
        use Register::*;
        History {
            battery_voltage_max_today: potential(block, BatteryVoltageMaxToday),
            battery_voltage_min_today: potential(block, BatteryVoltageMinToday),
            consumed: EnergyCounters {
                today: energy(block, ConsumedToday),
                month: energy(block, ConsumedMonth),
                year: energy(block, ConsumedYear),
                total: energy(block, ConsumedTotal),
            },
            generated: EnergyCounters {
                today: energy(block, GeneratedToday),
                month: energy(block, GeneratedMonth),
                year: energy(block, GeneratedYear),
                total: energy(block, GeneratedTotal),
            },
        }
    }
}

/// Net battery values, current is positive while charging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetBattery {
    pub voltage: ElectricPotential,
    pub current: ElectricCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatteryType {
    UserDefined,
    Sealed,
    Gel,
    Flooded,
    Unknown(u16),
}

impl From<u16> for BatteryType {
    fn from(i: u16) -> BatteryType {
        match i {
            0 => BatteryType::UserDefined,
            1 => BatteryType::Sealed,
            2 => BatteryType::Gel,
            3 => BatteryType::Flooded,
            i => BatteryType::Unknown(i),
        }
    }
}

impl fmt::Display for BatteryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BatteryType::UserDefined => write!(f, "user"),
            BatteryType::Sealed => write!(f, "sealed"),
            BatteryType::Gel => write!(f, "gel"),
            BatteryType::Flooded => write!(f, "flooded"),
            BatteryType::Unknown(i) => write!(f, "unknown({})", i),
        }
    }
}

/// Battery voltage set points, 0x9003-0x900E.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageThresholds {
    pub over_voltage_disconnect: ElectricPotential,
    pub charging_limit: ElectricPotential,
    pub over_voltage_reconnect: ElectricPotential,
    pub equalize_charging: ElectricPotential,
    pub boost_charging: ElectricPotential,
    pub float_charging: ElectricPotential,
    pub boost_reconnect_charging: ElectricPotential,
    pub low_voltage_reconnect: ElectricPotential,
    pub under_voltage_warning_recover: ElectricPotential,
    pub under_voltage_warning: ElectricPotential,
    pub low_voltage_disconnect: ElectricPotential,
    pub discharging_limit: ElectricPotential,
}

/// Device clock. Registers 0x9013-0x9015 hold the bytes
/// `[minute, second, day, hour, year, month]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RealTimeClock {
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    /// Years since 2000.
    pub year: u8,
}

impl RealTimeClock {
    pub fn decode(block: &RawRegisterBlock) -> Self {
        assert!(
            block.satisfies(&registers::REAL_TIME_CLOCK),
            "real time clock decoded from block {:#06x}+{}",
            block.start(),
            block.len()
        );
        RealTimeClock {
            minute: block.byte(0),
            second: block.byte(1),
            day: block.byte(2),
            hour: block.byte(3),
            year: block.byte(4),
            month: block.byte(5),
        }
    }

    /// `None` when the device clock holds an impossible date.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2000 + i32::from(self.year), self.month.into(), self.day.into())?
            .and_hms_opt(self.hour.into(), self.minute.into(), self.second.into())
    }
}

impl fmt::Display for RealTimeClock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            2000 + u16::from(self.year),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        )
    }
}

/// Holding bank settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceConfiguration {
    pub battery_type: BatteryType,
    pub capacity: ElectricCharge,
    /// mV/°C/2V
    pub temperature_compensation: f64,
    pub thresholds: VoltageThresholds,
    pub equalize_duration: Time,
    pub boost_duration: Time,
    pub equalize_period: Time,
    pub clock: RealTimeClock,
}

/// Raw input bank blocks of one cycle.
#[derive(Debug, Clone)]
pub struct InputBlocks {
    pub rated_input: RawRegisterBlock,
    pub rated_battery: RawRegisterBlock,
    pub charging: RawRegisterBlock,
    pub battery: RawRegisterBlock,
    pub load: RawRegisterBlock,
    pub temperatures: RawRegisterBlock,
    pub battery_soc: RawRegisterBlock,
    pub remote_battery_temperature: RawRegisterBlock,
    pub battery_temperature_2: RawRegisterBlock,
    pub status: RawRegisterBlock,
    pub history: RawRegisterBlock,
    pub battery_net: RawRegisterBlock,
}

/// Raw holding bank blocks of one cycle.
#[derive(Debug, Clone)]
pub struct HoldingBlocks {
    pub battery_settings: RawRegisterBlock,
    pub equalize_duration: RawRegisterBlock,
    pub boost_duration: RawRegisterBlock,
    pub equalize_period: RawRegisterBlock,
    pub real_time_clock: RawRegisterBlock,
}

impl DeviceConfiguration {
    pub fn decode(blocks: &HoldingBlocks) -> Self {
        use Register as R;
        let settings = &blocks.battery_settings;
        DeviceConfiguration {
            battery_type: BatteryType::from(settings.word(R::BatteryType.field())),
            capacity: ElectricCharge::new::<ampere_hour>(settings.value(R::BatteryCapacity.field())),
            temperature_compensation: settings.value(R::TemperatureCompensation.field()),
            thresholds: VoltageThresholds {
                over_voltage_disconnect: potential(settings, R::OverVoltageDisconnect),
                charging_limit: potential(settings, R::ChargingLimitVoltage),
                over_voltage_reconnect: potential(settings, R::OverVoltageReconnect),
                equalize_charging: potential(settings, R::EqualizeChargingVoltage),
                boost_charging: potential(settings, R::BoostChargingVoltage),
                float_charging: potential(settings, R::FloatChargingVoltage),
                boost_reconnect_charging: potential(settings, R::BoostReconnectChargingVoltage),
                low_voltage_reconnect: potential(settings, R::LowVoltageReconnect),
                under_voltage_warning_recover: potential(settings, R::UnderVoltageWarningRecover),
                under_voltage_warning: potential(settings, R::UnderVoltageWarning),
                low_voltage_disconnect: potential(settings, R::LowVoltageDisconnect),
                discharging_limit: potential(settings, R::DischargingLimitVoltage),
            },
            equalize_duration: Time::new::<minute>(
                blocks.equalize_duration.value(R::EqualizeDuration.field()),
            ),
            boost_duration: Time::new::<minute>(blocks.boost_duration.value(R::BoostDuration.field())),
            equalize_period: Time::new::<day>(blocks.equalize_period.value(R::EqualizePeriod.field())),
            clock: RealTimeClock::decode(&blocks.real_time_clock),
        }
    }
}

/// Everything read from the controller in one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub taken_at: DateTime<Utc>,
    pub rated_input: Electrical,
    pub rated_battery: Electrical,
    /// PV array side.
    pub charging: Electrical,
    pub battery: Electrical,
    pub load: Electrical,
    pub temperatures: Temperatures,
    pub battery_soc: Ratio,
    pub battery_status: BatteryStatus,
    pub charging_status: ChargingStatus,
    pub discharging_status: DischargingStatus,
    pub history: History,
    pub battery_net: NetBattery,
    pub configuration: Option<DeviceConfiguration>,
}

impl TelemetrySnapshot {
    pub fn decode(
        input: &InputBlocks,
        holding: Option<&HoldingBlocks>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        use Register as R;
        let status = &input.status;
        TelemetrySnapshot {
            taken_at,
            rated_input: Electrical::decode(
                &input.rated_input,
                R::RatedInputVoltage,
                R::RatedInputCurrent,
                R::RatedInputPower,
            ),
            rated_battery: Electrical::decode(
                &input.rated_battery,
                R::RatedBatteryVoltage,
                R::RatedBatteryCurrent,
                R::RatedBatteryPower,
            ),
            charging: Electrical::decode(
                &input.charging,
                R::ChargingVoltage,
                R::ChargingCurrent,
                R::ChargingPower,
            ),
            battery: Electrical::decode(&input.battery, R::BatteryVoltage, R::BatteryCurrent, R::BatteryPower),
            load: Electrical::decode(&input.load, R::LoadVoltage, R::LoadCurrent, R::LoadPower),
            temperatures: Temperatures {
                battery: temperature(&input.temperatures, R::BatteryTemperature),
                inside: temperature(&input.temperatures, R::InsideTemperature),
                heatsink: temperature(&input.temperatures, R::HeatsinkTemperature),
                remote_battery: temperature(
                    &input.remote_battery_temperature,
                    R::RemoteBatteryTemperature,
                ),
                battery_2: temperature(&input.battery_temperature_2, R::BatteryTemperature2),
            },
            battery_soc: Ratio::new::<percent>(input.battery_soc.value(R::BatterySoc.field())),
            battery_status: BatteryStatus::from(status.word(R::BatteryStatus.field())),
            charging_status: ChargingStatus::from(status.word(R::ChargingStatus.field())),
            discharging_status: DischargingStatus::from(
                status.word(R::DischargingStatus.field()),
            ),
            history: History::decode(&input.history),
            battery_net: NetBattery {
                voltage: potential(&input.battery_net, R::BatteryNetVoltage),
                current: current(&input.battery_net, R::BatteryNetCurrent),
            },
            configuration: holding.map(DeviceConfiguration::decode),
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.configuration {
            Some(c) => writeln!(f, "EPEVER {} (clock {})", self.taken_at, c.clock)?,
            None => writeln!(f, "EPEVER {}", self.taken_at)?,
        }
        writeln!(f, "Rated input {}", self.rated_input)?;
        writeln!(f, "Rated battery {}", self.rated_battery)?;
        writeln!(
            f,
            "Charge {} [{:016b}] {}",
            self.charging, self.charging_status.raw, self.charging_status
        )?;
        writeln!(
            f,
            "Battery {} ({:.0} percent) [{:016b}] {}",
            self.battery,
            self.battery_soc.get::<percent>(),
            self.battery_status.raw,
            self.battery_status
        )?;
        writeln!(
            f,
            "Battery net {:.2}V {:.2}A day range {:.2}V - {:.2}V",
            self.battery_net.voltage.get::<volt>(),
            self.battery_net.current.get::<ampere>(),
            self.history.battery_voltage_min_today.get::<volt>(),
            self.history.battery_voltage_max_today.get::<volt>()
        )?;
        writeln!(f, "Load {} [{}]", self.load, self.discharging_status)?;
        let t = &self.temperatures;
        writeln!(
            f,
            "Temp battery:{:.2}C inside:{:.2}C heatsink:{:.2}C remote:{:.2}C battery2:{:.2}C",
            t.battery.get::<degree_celsius>(),
            t.inside.get::<degree_celsius>(),
            t.heatsink.get::<degree_celsius>(),
            t.remote_battery.get::<degree_celsius>(),
            t.battery_2.get::<degree_celsius>()
        )?;
        writeln!(f, "Generated {}", self.history.generated)?;
        write!(f, "Consumed {}", self.history.consumed)?;
        if let Some(c) = &self.configuration {
            let v = &c.thresholds;
            writeln!(f)?;
            writeln!(
                f,
                "Battery {} {:.0}Ah, compensation {:.2}",
                c.battery_type,
                c.capacity.get::<ampere_hour>(),
                c.temperature_compensation
            )?;
            writeln!(
                f,
                " - over voltage disconnect {:.2} reconnect {:.2}",
                v.over_voltage_disconnect.get::<volt>(),
                v.over_voltage_reconnect.get::<volt>()
            )?;
            writeln!(
                f,
                " - low voltage disconnect {:.2} reconnect {:.2}",
                v.low_voltage_disconnect.get::<volt>(),
                v.low_voltage_reconnect.get::<volt>()
            )?;
            writeln!(
                f,
                " - under voltage warning {:.2} recover {:.2}",
                v.under_voltage_warning.get::<volt>(),
                v.under_voltage_warning_recover.get::<volt>()
            )?;
            writeln!(
                f,
                " - charge boost {:.2} float {:.2} equalize {:.2}",
                v.boost_charging.get::<volt>(),
                v.float_charging.get::<volt>(),
                v.equalize_charging.get::<volt>()
            )?;
            writeln!(
                f,
                " - charging limit {:.2} boost reconnect {:.2} discharging limit {:.2}",
                v.charging_limit.get::<volt>(),
                v.boost_reconnect_charging.get::<volt>(),
                v.discharging_limit.get::<volt>()
            )?;
            write!(
                f,
                "Charge config equalize {:.0} min boost {:.0} min, equalize every {:.0} days",
                c.equalize_duration.get::<minute>(),
                c.boost_duration.get::<minute>(),
                c.equalize_period.get::<day>()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::registers::{Bank, BlockSpec};

    fn block(spec: BlockSpec, registers: &[u16]) -> RawRegisterBlock {
        assert_eq!(registers.len(), usize::from(spec.count));
        RawRegisterBlock::new(spec.bank, spec.start, registers.to_vec())
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    pub(crate) fn input_blocks() -> InputBlocks {
        use registers::*;
        InputBlocks {
            rated_input: block(RATED_INPUT, &[0x0927, 0x0064, 0x0190, 0x0000]),
            rated_battery: block(RATED_BATTERY, &[2400, 4000, 0x86A0, 0x0001]),
            charging: block(CHARGING, &[3650, 215, 7848, 0]),
            battery: block(BATTERY, &[1325, 592, 7844, 0]),
            load: block(LOAD, &[1324, 150, 1986, 0]),
            temperatures: block(TEMPERATURES, &[2550, 3100, 2990]),
            battery_soc: block(BATTERY_SOC, &[87]),
            remote_battery_temperature: block(REMOTE_BATTERY_TEMPERATURE, &[2475]),
            battery_temperature_2: block(BATTERY_TEMPERATURE_2, &[2500]),
            status: block(STATUS, &[0x0100, 0x0009, 0x0001]),
            history: block(
                HISTORY,
                &[1440, 1210, 150, 0, 4210, 0, 0xFFFF, 0x0001, 0x4240, 0x000F, 85, 0, 2500, 0, 30000, 0, 0, 0x0010],
            ),
            battery_net: block(BATTERY_NET, &[1325, 0xFF9C, 0xFFFF]),
        }
    }

    pub(crate) fn holding_blocks() -> HoldingBlocks {
        use registers::*;
        HoldingBlocks {
            battery_settings: block(
                BATTERY_SETTINGS,
                &[1, 200, 300, 1600, 1500, 1500, 1460, 1440, 1380, 1320, 1260, 1220, 1200, 1110, 1060],
            ),
            equalize_duration: block(EQUALIZE_DURATION, &[120]),
            boost_duration: block(BOOST_DURATION, &[90]),
            equalize_period: block(EQUALIZE_PERIOD, &[30]),
            real_time_clock: block(REAL_TIME_CLOCK, &[0x1E2D, 0x0E09, 0x180A]),
        }
    }

    #[test]
    fn rated_values() {
        let s = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        assert_eq!(s.rated_input.voltage.get::<volt>(), 23.43);
        assert_eq!(s.rated_input.current.get::<ampere>(), 1.00);
        assert_eq!(s.rated_input.power.get::<watt>(), 4.00);
        assert_eq!(s.rated_battery.power.get::<watt>(), 1000.00);
    }

    #[test]
    fn live_values_and_status() {
        let s = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        assert_eq!(s.charging.voltage.get::<volt>(), 36.5);
        assert_eq!(s.battery.current.get::<ampere>(), 5.92);
        assert_eq!(s.load.power.get::<watt>(), 19.86);
        assert!(close(s.temperatures.battery.get::<degree_celsius>(), 25.5));
        assert!(close(s.temperatures.remote_battery.get::<degree_celsius>(), 24.75));
        assert!(close(s.battery_soc.get::<percent>(), 87.0));
        assert_eq!(s.battery_status.to_string(), "NormalTemp,NormalVolt ResAbnormal");
        assert_eq!(s.charging_status.to_string(), "BoostCharging,NormalInputVolt Running");
        assert_eq!(s.discharging_status.raw, 1);
        assert!(s.configuration.is_none());
    }

    #[test]
    fn history_combines_pairs() {
        let s = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        let h = &s.history;
        assert_eq!(h.battery_voltage_max_today.get::<volt>(), 14.40);
        assert_eq!(h.battery_voltage_min_today.get::<volt>(), 12.10);
        assert!(close(h.consumed.today.get::<kilowatt_hour>(), 1.50));
        assert!(close(h.consumed.year.get::<kilowatt_hour>(), 1310.71));
        assert!(close(h.consumed.total.get::<kilowatt_hour>(), 10000.0));
        assert!(close(h.generated.total.get::<kilowatt_hour>(), 10485.76));
    }

    #[test]
    fn net_current_is_signed() {
        let s = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        assert_eq!(s.battery_net.voltage.get::<volt>(), 13.25);
        assert_eq!(s.battery_net.current.get::<ampere>(), -1.00);
    }

    #[test]
    fn configuration_bank() {
        let holding = holding_blocks();
        let s = TelemetrySnapshot::decode(&input_blocks(), Some(&holding), Utc::now());
        let c = s.configuration.expect("configuration was decoded");
        assert_eq!(c.battery_type, BatteryType::Sealed);
        assert!(close(c.capacity.get::<ampere_hour>(), 200.0));
        assert_eq!(c.temperature_compensation, 3.0);
        assert_eq!(c.thresholds.over_voltage_disconnect.get::<volt>(), 16.0);
        assert_eq!(c.thresholds.float_charging.get::<volt>(), 13.8);
        assert_eq!(c.thresholds.discharging_limit.get::<volt>(), 10.6);
        assert!(close(c.equalize_duration.get::<minute>(), 120.0));
        assert!(close(c.boost_duration.get::<minute>(), 90.0));
        assert!(close(c.equalize_period.get::<day>(), 30.0));
    }

    #[test]
    fn clock_byte_layout() {
        let clock = RealTimeClock::decode(&holding_blocks().real_time_clock);
        assert_eq!(
            clock,
            RealTimeClock { second: 45, minute: 30, hour: 9, day: 14, month: 10, year: 24 }
        );
        assert_eq!(clock.to_string(), "2024-10-14 09:30:45");
        let dt = clock.to_datetime().unwrap();
        assert_eq!(dt, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap().and_hms_opt(9, 30, 45).unwrap());
        let bogus = RealTimeClock { month: 13, ..clock };
        assert_eq!(bogus.to_datetime(), None);
    }

    #[test]
    #[should_panic(expected = "real time clock")]
    fn clock_needs_its_own_block() {
        RealTimeClock::decode(&RawRegisterBlock::new(Bank::Holding, 0x9013, vec![0, 0]));
    }

    #[test]
    fn renders_summary() {
        let holding = holding_blocks();
        let s = TelemetrySnapshot::decode(&input_blocks(), Some(&holding), Utc::now());
        let text = s.to_string();
        assert!(text.contains("clock 2024-10-14 09:30:45"));
        assert!(text.contains("Rated input 23.43V 1.00A 4.00W"));
        assert!(text.contains("Battery net 13.25V -1.00A day range 12.10V - 14.40V"));
        assert!(text.contains("(87 percent)"));
        assert!(text.contains("Battery sealed 200Ah"));
        assert!(text.ends_with("equalize every 30 days"));
    }
}
