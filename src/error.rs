use crate::registers::Bank;
use std::time::Duration;
use thiserror::Error;

/// Failures of the serial link. These never leave the register reader,
/// which logs them and reconnects.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to open serial device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: tokio_serial::Error,
    },
    #[error("modbus transport: {0}")]
    Modbus(#[from] tokio_modbus::Error),
    #[error("device answered {bank:?} read at {address:#06x} with exception {code:?}")]
    Exception { bank: Bank, address: u16, code: tokio_modbus::ExceptionCode },
    #[error("{bank:?} read of {count} registers at {address:#06x} timed out after {timeout:?}")]
    Timeout { bank: Bank, address: u16, count: u16, timeout: Duration },
    #[error("{bank:?} read at {address:#06x} returned {actual} of {expected} registers")]
    ShortResponse { bank: Bank, address: u16, expected: u16, actual: usize },
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
