//! The physical link to the controller.
//!
//! A [`Connector`] knows how to open a link, a [`RegisterLink`] performs
//! block reads over it. The RTU implementation talks to a real serial
//! device; tests substitute their own.

use crate::config::{Parity, SerialConfig};
use crate::error::{Result, TransportError};
use crate::registers::Bank;
use async_trait::async_trait;
use std::time::Duration;
use tokio_modbus::client::{rtu, Client, Context, Reader};
use tokio_modbus::Slave;
use tokio_serial::SerialPortBuilderExt;

#[async_trait]
pub trait RegisterLink: Send {
    /// Read `count` consecutive registers of `bank` starting at `address`.
    async fn read(&mut self, bank: Bank, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Release the underlying handle.
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send {
    type Link: RegisterLink;

    async fn connect(&mut self) -> Result<Self::Link>;
}

/// Opens Modbus RTU links over a serial device.
#[derive(Debug, Clone)]
pub struct RtuConnector {
    config: SerialConfig,
}

impl RtuConnector {
    pub fn new(config: SerialConfig) -> RtuConnector {
        RtuConnector { config }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

fn data_bits(bits: u8) -> tokio_serial::DataBits {
    match bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> tokio_serial::StopBits {
    match bits {
        2 => tokio_serial::StopBits::Two,
        _ => tokio_serial::StopBits::One,
    }
}

fn parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

#[async_trait]
impl Connector for RtuConnector {
    type Link = RtuLink;

    async fn connect(&mut self) -> Result<RtuLink> {
        let cfg = &self.config;
        let serial = tokio_serial::new(cfg.device.as_str(), cfg.baud_rate)
            .data_bits(data_bits(cfg.data_bits))
            .parity(parity(cfg.parity))
            .stop_bits(stop_bits(cfg.stop_bits))
            .timeout(cfg.timeout())
            .open_native_async()
            .map_err(|source| TransportError::Open { device: cfg.device.clone(), source })?;
        let ctx = rtu::attach_slave(serial, Slave(cfg.slave));
        Ok(RtuLink { ctx: Some(ctx), timeout: cfg.timeout() })
    }
}

/// An attached Modbus RTU client context.
pub struct RtuLink {
    ctx: Option<Context>,
    timeout: Duration,
}

#[async_trait]
impl RegisterLink for RtuLink {
    async fn read(&mut self, bank: Bank, address: u16, count: u16) -> Result<Vec<u16>> {
        let timeout = self.timeout;
        let ctx = self.ctx.as_mut().ok_or(TransportError::Closed)?;
        let request = async {
            match bank {
                Bank::Input => ctx.read_input_registers(address, count).await,
                Bank::Holding => ctx.read_holding_registers(address, count).await,
            }
        };
        let registers = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| TransportError::Timeout { bank, address, count, timeout })??
            .map_err(|code| TransportError::Exception { bank, address, code })?;
        if registers.len() != usize::from(count) {
            return Err(TransportError::ShortResponse {
                bank,
                address,
                expected: count,
                actual: registers.len(),
            });
        }
        Ok(registers)
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::debug!(error = %e, "error closing modbus context");
            }
        }
    }
}
