// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::{iface::PhysicalInterface, socket::RawSocket, ErrorKind, PdError};

/// Receive timeout of the capture socket; bounds how long a shutdown
/// request can stay unobserved.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-interface capture worker. Does no parsing itself: every frame the
/// kernel filter lets through is forwarded to the handler queue.
pub(crate) struct Listener {
    iface: Arc<PhysicalInterface>,
    socket: RawSocket,
    handler_tx: Sender<(Arc<PhysicalInterface>, Vec<u8>)>,
}

impl Listener {
    pub(crate) fn new(
        iface: Arc<PhysicalInterface>,
        handler_tx: Sender<(Arc<PhysicalInterface>, Vec<u8>)>,
    ) -> Result<Self, PdError> {
        let socket = RawSocket::new_capture(&iface, CAPTURE_TIMEOUT)?;
        Ok(Self {
            iface,
            socket,
            handler_tx,
        })
    }

    pub(crate) fn run(&self, kill_flag: Arc<AtomicBool>) {
        while !kill_flag.load(Ordering::Relaxed) {
            match self.socket.recv() {
                Ok(frame) => {
                    if self
                        .handler_tx
                        .send((self.iface.clone(), frame))
                        .is_err()
                    {
                        log::debug!(
                            "Handler queue closed, stopping listener on {}",
                            self.iface
                        );
                        return;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Timeout => (),
                Err(e) => {
                    log::error!(
                        "Unexpected error in listener on {}: {e}",
                        self.iface
                    );
                }
            }
        }
    }
}
