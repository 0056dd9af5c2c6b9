//! Prometheus gauges derived from a snapshot.
//!
//! The registry is an ordinary value; whoever exposes the metrics owns
//! one, feeds it snapshots and gathers from [`MetricsRegistry::registry`].
//! Gauges are registered the first time a snapshot provides them.

use crate::snapshot::TelemetrySnapshot;
use crate::status::{BatteryFlags, ChargingFlags};
use prometheus::{Gauge, Opts, Registry};
use std::collections::BTreeMap;
use uom::si::{
    electric_current::ampere, electric_potential::volt, energy::kilowatt_hour, power::watt,
    ratio::ratio, thermodynamic_temperature::degree_celsius, time::{day, minute},
};

#[derive(Clone, Default)]
pub struct MetricsRegistry {
    registry: Registry,
    gauges: BTreeMap<&'static str, Gauge>,
}

fn flag(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

const CHARGING_FLAG_METRICS: [(ChargingFlags, &str, &str); 11] = [
    (ChargingFlags::RUNNING, "status_charging_running", "Status Charging Running"),
    (ChargingFlags::FAULT, "status_charging_fault", "Status Charging Fault"),
    (ChargingFlags::PV_INPUT_SHORT, "status_charging_pv_input_short", "Status Charging PV Input Short"),
    (ChargingFlags::LOAD_OPEN_CIRCUIT, "status_charging_load_open_circuit", "Status Charging Load Open Circuit"),
    (ChargingFlags::LOAD_MOSFET_SHORT, "status_charging_load_mosfet_short", "Status Charging Load Mosfet Short"),
    (ChargingFlags::LOAD_SHORT, "status_charging_load_short", "Status Charging Load Short"),
    (ChargingFlags::LOAD_OVER_CURRENT, "status_charging_load_over_current", "Status Charging Load Over Current"),
    (ChargingFlags::INPUT_OVER_CURRENT, "status_charging_input_over_current", "Status Charging Input Over Current"),
    (
        ChargingFlags::ANTI_REVERSE_MOSFET_SHORT,
        "status_charging_anti_reverse_mosfet_short",
        "Status Charging Anti Reverse Mosfet Short",
    ),
    (
        ChargingFlags::CHARGING_OR_ANTI_REVERSE_MOSFET_SHORT,
        "status_charging_or_anti_reverse_mosfet_short",
        "Status Charging Or Anti Reverse Mosfet Short",
    ),
    (ChargingFlags::CHARGING_MOSFET_SHORT, "status_charging_mosfet_short", "Status Charging Mosfet Short"),
];

impl MetricsRegistry {
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Register gauges in an existing registry.
    pub fn with_registry(registry: Registry) -> Self {
        MetricsRegistry { registry, gauges: BTreeMap::new() }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn set(&mut self, name: &'static str, help: &'static str, value: f64) -> prometheus::Result<()> {
        match self.gauges.get(name) {
            Some(g) => g.set(value),
            None => {
                let g = Gauge::with_opts(Opts::new(name, help))?;
                self.registry.register(Box::new(g.clone()))?;
                g.set(value);
                self.gauges.insert(name, g);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).map(|g| g.get())
    }

    /// Current gauge values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.gauges.iter().map(|(name, g)| (*name, g.get()))
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }

    /// Update every gauge from `s`. Settings gauges keep their last
    /// value when `s` carries no configuration. Fails only when a name
    /// is already taken in the registry by another collector.
    pub fn record(&mut self, s: &TelemetrySnapshot) -> prometheus::Result<()> {
        self.set("solar_rated_input_voltage", "Rated input voltage", s.rated_input.voltage.get::<volt>())?;
        self.set("solar_rated_input_current", "Rated input current", s.rated_input.current.get::<ampere>())?;
        self.set("solar_rated_input_power", "Rated input power", s.rated_input.power.get::<watt>())?;

        self.set("solar_pv_voltage", "PV array voltage", s.charging.voltage.get::<volt>())?;
        self.set("solar_pv_current", "PV array current", s.charging.current.get::<ampere>())?;
        self.set("solar_pv_power", "PV array power", s.charging.power.get::<watt>())?;
        self.set("solar_load_voltage", "Load voltage", s.load.voltage.get::<volt>())?;
        self.set("solar_load_current", "Load current", s.load.current.get::<ampere>())?;
        self.set("solar_load_power", "Load power", s.load.power.get::<watt>())?;
        self.set("solar_bat_voltage", "Battery array voltage", s.battery.voltage.get::<volt>())?;
        self.set("solar_bat_current", "Battery array current", s.battery.current.get::<ampere>())?;
        self.set("solar_bat_power", "Battery array power", s.battery.power.get::<watt>())?;

        let t = &s.temperatures;
        self.set("solar_temp_battery", "Temperature battery", t.battery.get::<degree_celsius>())?;
        self.set("solar_temp_inside", "Temperature inside", t.inside.get::<degree_celsius>())?;
        self.set("solar_temp_heatsink", "Temperature heatsink", t.heatsink.get::<degree_celsius>())?;
        self.set(
            "solar_temp_remote_battery",
            "Temperature remote battery",
            t.remote_battery.get::<degree_celsius>(),
        )?;
        self.set("solar_battery_percent", "Battery percent", s.battery_soc.get::<ratio>())?;

        let h = &s.history;
        self.set("solar_consumed_today", "Consumed today", h.consumed.today.get::<kilowatt_hour>())?;
        self.set("solar_consumed_month", "Consumed month", h.consumed.month.get::<kilowatt_hour>())?;
        self.set("solar_consumed_year", "Consumed year", h.consumed.year.get::<kilowatt_hour>())?;
        self.set("solar_consumed_total", "Consumed total", h.consumed.total.get::<kilowatt_hour>())?;
        self.set("solar_generated_today", "Generated today", h.generated.today.get::<kilowatt_hour>())?;
        self.set("solar_generated_month", "Generated month", h.generated.month.get::<kilowatt_hour>())?;
        self.set("solar_generated_year", "Generated year", h.generated.year.get::<kilowatt_hour>())?;
        self.set("solar_generated_total", "Generated total", h.generated.total.get::<kilowatt_hour>())?;

        self.set("solar_battery_net_current", "Battery net current", s.battery_net.current.get::<ampere>())?;
        self.set("solar_battery_net_voltage", "Battery net voltage", s.battery_net.voltage.get::<volt>())?;

        let b = &s.battery_status;
        self.set("status_battery_wrong_id", "Status Battery Wrong ID", flag(b.flags.contains(BatteryFlags::WRONG_ID)))?;
        self.set(
            "status_battery_resistance_abnormal",
            "Status Battery Resistance Abnormal",
            flag(b.flags.contains(BatteryFlags::RESISTANCE_ABNORMAL)),
        )?;
        self.set("status_battery_temp", "Status Battery Temp", f64::from(b.temperature.code()))?;
        self.set("status_battery_volt", "Status Battery Volt", f64::from(b.voltage.code()))?;

        let c = &s.charging_status;
        for &(f, name, help) in CHARGING_FLAG_METRICS.iter() {
            self.set(name, help, flag(c.flags.contains(f)))?;
        }
        self.set("status_charging_status", "Status Charging Status", f64::from(c.mode.code()))?;
        self.set(
            "status_charging_input_volt_status",
            "Status Charging Input Volt Status",
            f64::from(c.input_voltage.code()),
        )?;
        self.set("status_discharging", "Status Discharging raw word", f64::from(s.discharging_status.raw))?;

        if let Some(cfg) = &s.configuration {
            self.set(
                "solar_config_equalization_duration",
                "Config Equalization Duration",
                cfg.equalize_duration.get::<minute>(),
            )?;
            self.set("solar_config_boost_duration", "Config Boost Duration", cfg.boost_duration.get::<minute>())?;
            self.set(
                "solar_config_equalization_period",
                "Config Equalization Period",
                cfg.equalize_period.get::<day>(),
            )?;

            let v = &cfg.thresholds;
            let thresholds = [
                ("solar_battery_config_over_voltage_disconnect", "Config Over Voltage Disconnect", v.over_voltage_disconnect),
                ("solar_battery_config_charging_limit_voltage", "Config Charging Limit Voltage", v.charging_limit),
                ("solar_battery_config_over_voltage_reconnect", "Config Over Voltage Reconnect", v.over_voltage_reconnect),
                ("solar_battery_config_equalize_charging_voltage", "Config Equalize Charging Voltage", v.equalize_charging),
                ("solar_battery_config_boost_charging_voltage", "Config Boost Charging Voltage", v.boost_charging),
                ("solar_battery_config_float_charging_voltage", "Config Float Charging Voltage", v.float_charging),
                (
                    "solar_battery_config_boost_reconnect_charging_voltage",
                    "Config Boost Reconnect Charging Voltage",
                    v.boost_reconnect_charging,
                ),
                (
                    "solar_battery_config_low_voltage_reconnect_voltage",
                    "Config Low Voltage Reconnect Voltage",
                    v.low_voltage_reconnect,
                ),
                (
                    "solar_battery_config_under_voltage_warning_reconnect_voltage",
                    "Config Under Voltage Warning Reconnect Voltage",
                    v.under_voltage_warning_recover,
                ),
                (
                    "solar_battery_config_under_voltage_warning_voltage",
                    "Config Under Voltage Warning Voltage",
                    v.under_voltage_warning,
                ),
                (
                    "solar_battery_config_low_voltage_disconnect_voltage",
                    "Config Low Voltage Disconnect Voltage",
                    v.low_voltage_disconnect,
                ),
                (
                    "solar_battery_config_discharging_limit_voltage",
                    "Config Discharging Limit Voltage",
                    v.discharging_limit,
                ),
            ];
            for &(name, help, value) in thresholds.iter() {
                self.set(name, help, value.get::<volt>())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::{holding_blocks, input_blocks};
    use chrono::Utc;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn telemetry_gauges() {
        let s = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        let mut m = MetricsRegistry::new();
        m.record(&s).unwrap();
        assert_eq!(m.get("solar_rated_input_power"), Some(4.0));
        assert_eq!(m.get("solar_pv_voltage"), Some(36.5));
        assert_eq!(m.get("solar_battery_net_current"), Some(-1.0));
        assert!(close(m.get("solar_battery_percent").unwrap(), 0.87));
        assert!(close(m.get("solar_temp_battery").unwrap(), 25.5));
        assert!(close(m.get("solar_generated_total").unwrap(), 10485.76));
        assert_eq!(m.get("status_battery_resistance_abnormal"), Some(1.0));
        assert_eq!(m.get("status_battery_wrong_id"), Some(0.0));
        assert_eq!(m.get("status_charging_running"), Some(1.0));
        assert_eq!(m.get("status_charging_load_short"), Some(0.0));
        assert_eq!(m.get("status_charging_status"), Some(2.0));
        assert_eq!(m.get("solar_config_boost_duration"), None);
        assert_eq!(m.get("solar_battery_config_float_charging_voltage"), None);
    }

    #[test]
    fn configuration_gauges() {
        let holding = holding_blocks();
        let s = TelemetrySnapshot::decode(&input_blocks(), Some(&holding), Utc::now());
        let mut m = MetricsRegistry::new();
        m.record(&s).unwrap();
        assert!(close(m.get("solar_config_equalization_duration").unwrap(), 120.0));
        assert!(close(m.get("solar_config_equalization_period").unwrap(), 30.0));
        assert_eq!(m.get("solar_battery_config_float_charging_voltage"), Some(13.8));
        assert_eq!(m.get("solar_battery_config_discharging_limit_voltage"), Some(10.6));

        // a later telemetry-only snapshot leaves the settings in place
        let without = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        m.record(&without).unwrap();
        assert_eq!(m.get("solar_battery_config_float_charging_voltage"), Some(13.8));
    }

    #[test]
    fn gathered_families_match_the_gauges() {
        let holding = holding_blocks();
        let s = TelemetrySnapshot::decode(&input_blocks(), Some(&holding), Utc::now());
        let mut m = MetricsRegistry::new();
        m.record(&s).unwrap();
        let names: Vec<_> = m.iter().map(|(n, _)| n.to_string()).collect();
        let families = m.registry().gather();
        let gathered: Vec<_> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert_eq!(names, gathered);
        assert_eq!(names.len(), m.len());
        assert!(families.iter().all(|f| !f.get_help().is_empty()));

        let pv = families.iter().find(|f| f.get_name() == "solar_pv_voltage").unwrap();
        assert_eq!(pv.get_metric()[0].get_gauge().get_value(), 36.5);

        // recording again reuses the registered gauges
        m.record(&s).unwrap();
        assert_eq!(m.registry().gather().len(), names.len());
    }

    #[test]
    fn name_taken_by_another_collector() {
        let registry = Registry::new();
        let other = Gauge::new("solar_pv_voltage", "someone else").unwrap();
        registry.register(Box::new(other)).unwrap();
        let mut m = MetricsRegistry::with_registry(registry);
        let s = TelemetrySnapshot::decode(&input_blocks(), None, Utc::now());
        assert!(m.record(&s).is_err());
    }
}
