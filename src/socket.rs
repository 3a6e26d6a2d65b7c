// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;

use crate::{
    bpf::{apply_capture_bpf, apply_reject_all_bpf},
    iface::PhysicalInterface,
    msg::DHCPV6_MULTICAST_MAC,
    ErrorKind, PdError, ETH_ALEN,
};

const PACKET_HOST: u8 = 0; // a packet addressed to the local host
const RECV_BUFFER_LEN: usize = 1500;

/// AF_PACKET socket bound to one physical interface.
#[derive(Debug)]
pub(crate) struct RawSocket {
    raw_fd: libc::c_int,
    iface_index: u32,
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        if self.raw_fd >= 0 {
            unsafe {
                libc::close(self.raw_fd);
            }
        }
    }
}

impl RawSocket {
    /// Capture socket for a listener: DHCPv6 reply filter attached and a
    /// receive timeout so the cancellation flag is observed.
    pub(crate) fn new_capture(
        iface: &PhysicalInterface,
        recv_timeout: Duration,
    ) -> Result<Self, PdError> {
        let ret = Self::open(iface)?;
        set_recv_timeout(ret.raw_fd, recv_timeout)?;
        apply_capture_bpf(ret.raw_fd)?;
        log::debug!("Capture socket created on {iface}: fd {}", ret.raw_fd);
        Ok(ret)
    }

    /// Transmit-only socket used by the manager to send client messages.
    pub(crate) fn new_transmit(
        iface: &PhysicalInterface,
    ) -> Result<Self, PdError> {
        let ret = Self::open(iface)?;
        apply_reject_all_bpf(ret.raw_fd)?;
        log::debug!("Transmit socket created on {iface}: fd {}", ret.raw_fd);
        Ok(ret)
    }

    fn open(iface: &PhysicalInterface) -> Result<Self, PdError> {
        let eth_protocol = libc::ETH_P_ALL;
        let raw_fd = unsafe {
            match libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                (eth_protocol as u16).to_be() as libc::c_int,
            ) {
                -1 => {
                    return Err(PdError::new(
                        ErrorKind::Bug,
                        format!(
                            "Failed to create AF_PACKET socket: {}",
                            Errno::last()
                        ),
                    ));
                }
                fd => fd,
            }
        };

        let ret = Self {
            raw_fd,
            iface_index: iface.index,
        };
        // `ret` owns the fd now; an early error below closes it on drop.
        bind_to_iface(raw_fd, eth_protocol, iface)?;
        Ok(ret)
    }

    pub(crate) fn recv(&self) -> Result<Vec<u8>, PdError> {
        let mut buffer = [0u8; RECV_BUFFER_LEN];
        let rc = unsafe {
            libc::recv(
                self.raw_fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0, // flags
            )
        };
        if rc <= 0 {
            let errno = Errno::last();
            return Err(if errno == Errno::EAGAIN {
                PdError::new(
                    ErrorKind::Timeout,
                    "Timeout on receiving data from socket".to_string(),
                )
            } else {
                PdError::new(
                    ErrorKind::Bug,
                    format!(
                        "Failed to recv from socket {}: {errno}",
                        self.raw_fd
                    ),
                )
            });
        }
        Ok(buffer[..rc as usize].to_vec())
    }

    pub(crate) fn send(&self, frame: &[u8]) -> Result<(), PdError> {
        let mut dst_addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        dst_addr.sll_halen = ETH_ALEN as u8;
        dst_addr.sll_addr[..ETH_ALEN].copy_from_slice(&DHCPV6_MULTICAST_MAC);
        dst_addr.sll_ifindex = self.iface_index as i32;
        let addr_ptr = (&dst_addr as *const libc::sockaddr_ll).cast();

        let sent_bytes = unsafe {
            libc::sendto(
                self.raw_fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0, // flags
                addr_ptr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if sent_bytes <= 0 {
            return Err(PdError::new(
                ErrorKind::Bug,
                format!(
                    "Failed to send frame on socket {}: {}",
                    self.raw_fd,
                    Errno::last()
                ),
            ));
        }
        log::debug!("Raw socket {} sent {sent_bytes} bytes", self.raw_fd);
        Ok(())
    }
}

fn bind_to_iface(
    fd: libc::c_int,
    eth_protocol: libc::c_int,
    iface: &PhysicalInterface,
) -> Result<(), PdError> {
    let mut sll_addr: [libc::c_uchar; 8] = [0; 8];
    sll_addr[..ETH_ALEN].copy_from_slice(&iface.mac.octets());

    let socket_addr = libc::sockaddr_ll {
        sll_family: libc::AF_PACKET as libc::c_ushort,
        sll_protocol: (eth_protocol as libc::c_ushort).to_be(),
        sll_ifindex: iface.index as libc::c_int,
        sll_hatype: libc::ARPHRD_ETHER as libc::c_ushort,
        sll_pkttype: PACKET_HOST as libc::c_uchar,
        sll_halen: libc::ETH_ALEN as libc::c_uchar,
        sll_addr,
    };
    let addr_ptr = (&socket_addr as *const libc::sockaddr_ll).cast();
    let rc = unsafe {
        libc::bind(
            fd,
            addr_ptr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(PdError::new(
            ErrorKind::Bug,
            format!("Failed to bind socket to {iface}: {}", Errno::last()),
        ));
    }
    Ok(())
}

fn set_recv_timeout(
    fd: libc::c_int,
    timeout: Duration,
) -> Result<(), PdError> {
    let tmo = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            (&tmo as *const libc::timeval) as *const libc::c_void,
            std::mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(PdError::new(
            ErrorKind::Bug,
            format!("Failed to set SO_RCVTIMEO on socket {fd}: {rc}"),
        ));
    }
    Ok(())
}

/// Outbound frame facade: the manager only knows this trait, so the state
/// machine is testable without raw sockets.
pub(crate) trait FrameTx: Send + Sync {
    fn send_frame(
        &self,
        iface: &PhysicalInterface,
        frame: &[u8],
    ) -> Result<(), PdError>;
}

/// Production transmitter: one transmit-only AF_PACKET socket per
/// configured interface, created at bootstrap.
pub(crate) struct RawFrameTx {
    sockets: HashMap<String, RawSocket>,
}

impl RawFrameTx {
    pub(crate) fn new(
        ifaces: &[Arc<PhysicalInterface>],
    ) -> Result<Self, PdError> {
        let mut sockets = HashMap::new();
        for iface in ifaces {
            sockets
                .insert(iface.name.clone(), RawSocket::new_transmit(iface)?);
        }
        Ok(Self { sockets })
    }
}

impl FrameTx for RawFrameTx {
    fn send_frame(
        &self,
        iface: &PhysicalInterface,
        frame: &[u8],
    ) -> Result<(), PdError> {
        match self.sockets.get(&iface.name) {
            Some(socket) => socket.send(frame),
            None => Err(PdError::new(
                ErrorKind::Bug,
                format!("No transmit socket for interface {iface}"),
            )),
        }
    }
}
