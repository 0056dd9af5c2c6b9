#![allow(dead_code)]

use async_trait::async_trait;
use epever::error::{Result, TransportError};
use epever::registers::Bank;
use epever::transport::{Connector, RegisterLink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_modbus::ExceptionCode;

/// A simulated controller with injectable faults.
#[derive(Debug, Default)]
pub struct Device {
    pub input: HashMap<u16, u16>,
    pub holding: HashMap<u16, u16>,
    /// Connection attempts to refuse before accepting one.
    pub fail_connects: u32,
    /// Reads to time out.
    pub fail_reads: u32,
    /// Reads to answer with one register missing.
    pub short_reads: u32,
    /// Reads to answer with an illegal data address exception.
    pub exception_reads: u32,
    pub connect_attempts: u32,
    pub closes: u32,
    pub reads: Vec<(Bank, u16, u16)>,
}

impl Device {
    pub fn set(&mut self, bank: Bank, start: u16, registers: &[u16]) {
        let map = match bank {
            Bank::Input => &mut self.input,
            Bank::Holding => &mut self.holding,
        };
        for (i, v) in registers.iter().enumerate() {
            map.insert(start + i as u16, *v);
        }
    }

    /// A 12V system in boost charge on a sunny morning.
    pub fn charging() -> Device {
        let mut d = Device::default();
        d.set(Bank::Input, 0x3000, &[0x0927, 0x0064, 0x0190, 0x0000]);
        d.set(Bank::Input, 0x3004, &[2400, 4000, 0x86A0, 0x0001]);
        d.set(Bank::Input, 0x3100, &[3650, 215, 7848, 0]);
        d.set(Bank::Input, 0x3104, &[1325, 592, 7844, 0]);
        d.set(Bank::Input, 0x310C, &[1324, 150, 1986, 0]);
        d.set(Bank::Input, 0x3110, &[2550, 3100, 2990]);
        d.set(Bank::Input, 0x311A, &[87, 2475]);
        d.set(Bank::Input, 0x311D, &[2500]);
        d.set(Bank::Input, 0x3200, &[0x0100, 0x0009, 0x0001]);
        d.set(
            Bank::Input,
            0x3302,
            &[1440, 1210, 150, 0, 4210, 0, 0xFFFF, 0x0001, 0x4240, 0x000F, 85, 0, 2500, 0, 30000, 0, 0, 0x0010],
        );
        d.set(Bank::Input, 0x331A, &[1325, 0xFF9C, 0xFFFF]);
        d.set(
            Bank::Holding,
            0x9000,
            &[1, 200, 300, 1600, 1500, 1500, 1460, 1440, 1380, 1320, 1260, 1220, 1200, 1110, 1060],
        );
        d.set(Bank::Holding, 0x9013, &[0x1E2D, 0x0E09, 0x180A, 30]);
        d.set(Bank::Holding, 0x906B, &[120, 90]);
        d
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    pub device: Arc<Mutex<Device>>,
}

impl FakeConnector {
    pub fn new(device: Device) -> FakeConnector {
        FakeConnector { device: Arc::new(Mutex::new(device)) }
    }

    pub fn device(&self) -> std::sync::MutexGuard<'_, Device> {
        self.device.lock().unwrap()
    }
}

pub struct FakeLink {
    device: Arc<Mutex<Device>>,
    closed: bool,
}

#[async_trait]
impl Connector for FakeConnector {
    type Link = FakeLink;

    async fn connect(&mut self) -> Result<FakeLink> {
        let mut d = self.device.lock().unwrap();
        d.connect_attempts += 1;
        if d.fail_connects > 0 {
            d.fail_connects -= 1;
            return Err(TransportError::Open {
                device: "/dev/fake".into(),
                source: tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "unplugged"),
            });
        }
        Ok(FakeLink { device: self.device.clone(), closed: false })
    }
}

#[async_trait]
impl RegisterLink for FakeLink {
    async fn read(&mut self, bank: Bank, address: u16, count: u16) -> Result<Vec<u16>> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut d = self.device.lock().unwrap();
        d.reads.push((bank, address, count));
        if d.fail_reads > 0 {
            d.fail_reads -= 1;
            return Err(TransportError::Timeout { bank, address, count, timeout: Duration::from_secs(10) });
        }
        if d.exception_reads > 0 {
            d.exception_reads -= 1;
            return Err(TransportError::Exception { bank, address, code: ExceptionCode::IllegalDataAddress });
        }
        let map = match bank {
            Bank::Input => &d.input,
            Bank::Holding => &d.holding,
        };
        let mut registers: Vec<u16> =
            (address..address + count).map(|a| map.get(&a).copied().unwrap_or(0)).collect();
        if d.short_reads > 0 {
            d.short_reads -= 1;
            registers.pop();
        }
        Ok(registers)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.device.lock().unwrap().closes += 1;
        }
    }
}
