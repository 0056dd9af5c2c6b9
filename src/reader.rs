//! Block reads that always succeed eventually.
//!
//! The reader owns the only link to the device and moves it through
//! `Disconnected -> Connecting -> Connected`. Connection attempts are
//! retried forever, paced by a [`RetryPolicy`]. A failed read drops the
//! link and repeats the same read on a fresh one, so callers never see
//! an error. Repeated failures of one read are paced by the same policy.

use crate::decode::RawRegisterBlock;
use crate::registers::{Bank, BlockSpec};
use crate::retry::RetryPolicy;
use crate::transport::{Connector, RegisterLink};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{}", s)
    }
}

pub struct RegisterReader<C: Connector, P> {
    connector: C,
    policy: P,
    link: Option<C::Link>,
    state: ConnectionState,
    connections: u64,
    read_failures: u64,
}

impl<C: Connector, P: RetryPolicy> RegisterReader<C, P> {
    pub fn new(connector: C, policy: P) -> Self {
        RegisterReader {
            connector,
            policy,
            link: None,
            state: ConnectionState::Disconnected,
            connections: 0,
            read_failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of links opened so far.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Number of reads that failed and were retried.
    pub fn read_failures(&self) -> u64 {
        self.read_failures
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "link state");
            self.state = state;
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Establish a new link, waiting as long as it takes. Blocks until
    /// the device answers a connection attempt.
    async fn connect(&mut self) -> C::Link {
        self.set_state(ConnectionState::Connecting);
        let mut attempt: u32 = 0;
        loop {
            match self.connector.connect().await {
                Ok(link) => {
                    self.policy.reset();
                    self.connections += 1;
                    self.set_state(ConnectionState::Connected);
                    info!(attempts = attempt + 1, "connected to charge controller");
                    return link;
                }
                Err(e) => {
                    let delay = self.policy.delay(attempt);
                    warn!(error = %e, attempt, ?delay, "connect failed, waiting");
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Close the current link, if any, and open a new one.
    pub async fn reconnect(&mut self) {
        self.disconnect().await;
        let link = self.connect().await;
        self.link = Some(link);
    }

    /// Read `count` registers of `bank` starting at `address`.
    ///
    /// Does not return until the read has succeeded. The first retry
    /// after a failed read is immediate, later ones for the same request
    /// wait `policy.delay(n)` before reconnecting.
    pub async fn read(&mut self, bank: Bank, address: u16, count: u16) -> RawRegisterBlock {
        let mut failures: u32 = 0;
        loop {
            let mut link = match self.link.take() {
                Some(link) => link,
                None => self.connect().await,
            };
            match link.read(bank, address, count).await {
                Ok(registers) if registers.len() == usize::from(count) => {
                    debug!(?bank, address = format_args!("{:#06x}", address), count, "read block");
                    self.link = Some(link);
                    return RawRegisterBlock::new(bank, address, registers);
                }
                Ok(registers) => warn!(
                    ?bank,
                    address = format_args!("{:#06x}", address),
                    expected = count,
                    actual = registers.len(),
                    failures = failures + 1,
                    "short read, reconnecting"
                ),
                Err(e) => warn!(
                    ?bank,
                    address = format_args!("{:#06x}", address),
                    error = %e,
                    failures = failures + 1,
                    "read failed, reconnecting"
                ),
            }
            self.read_failures += 1;
            link.close().await;
            self.set_state(ConnectionState::Disconnected);
            if failures > 0 {
                let delay = self.policy.delay(failures - 1);
                debug!(?delay, "repeated read failure, waiting");
                tokio::time::sleep(delay).await;
            }
            failures = failures.saturating_add(1);
        }
    }

    pub async fn read_block(&mut self, spec: &BlockSpec) -> RawRegisterBlock {
        self.read(spec.bank, spec.start, spec.count).await
    }

    /// Close the link. The next read reconnects.
    pub async fn close(&mut self) {
        self.disconnect().await
    }
}
