// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    duid::DhcpV6Duid,
    iface::PhysicalInterface,
    msg::DhcpV6Message,
    store::PrefixStore,
    Duid,
};

/// How often the handler wakes from an empty queue to check the
/// cancellation flag.
const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Single demux worker between the listeners and the manager. Validates
/// link-level addressing, derives the client DUID from the Client ID option
/// and routes the decoded message to the manager's channel.
pub(crate) struct Handler {
    prefixes: Arc<PrefixStore>,
    manager_tx: Sender<(Duid, DhcpV6Message)>,
}

impl Handler {
    pub(crate) fn new(
        prefixes: Arc<PrefixStore>,
        manager_tx: Sender<(Duid, DhcpV6Message)>,
    ) -> Self {
        Self {
            prefixes,
            manager_tx,
        }
    }

    pub(crate) fn run(
        &self,
        frame_rx: Receiver<(Arc<PhysicalInterface>, Vec<u8>)>,
        kill_flag: Arc<AtomicBool>,
    ) {
        while !kill_flag.load(Ordering::Relaxed) {
            match frame_rx.recv_timeout(QUEUE_POLL_TIMEOUT) {
                Ok((iface, frame)) => self.process_frame(&iface, &frame),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Frame queue closed, stopping handler");
                    return;
                }
            }
        }
    }

    pub(crate) fn process_frame(
        &self,
        iface: &Arc<PhysicalInterface>,
        frame: &[u8],
    ) {
        let msg = match DhcpV6Message::from_eth_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("Dropped undecodable frame on {iface}: {e}");
                return;
            }
        };

        // The capture is promiscuous at link layer; keep only frames
        // unicast to this interface.
        if msg.eth_dst != Some(iface.mac.octets()) {
            log::debug!("Dropped frame not addressed to {iface}");
            return;
        }

        let client_duid = {
            let client_id = match msg.client_id() {
                Some(raw) => raw,
                None => {
                    log::debug!(
                        "Dropped packet without Client ID option on {iface}"
                    );
                    return;
                }
            };
            let wire_duid = DhcpV6Duid::parse(client_id);
            match wire_duid.lladdr() {
                Some(lladdr) => Duid::new_link_layer(lladdr),
                None => {
                    log::debug!(
                        "Dropped packet with opaque client DUID on {iface}"
                    );
                    return;
                }
            }
        };

        if self.prefixes.get_by_duid(&client_duid).is_none() {
            log::debug!("Dropped packet with invalid DUID: {client_duid}");
            return;
        }

        if self.manager_tx.send((client_duid, msg)).is_err() {
            log::debug!("Manager channel closed, dropping packet");
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv6Addr;
    use std::str::FromStr;
    use std::sync::mpsc::channel;

    use super::*;
    use crate::{
        buffer::BufferMut,
        iface::ConfiguredPrefix,
        msg::{
            DhcpV6MessageType, DHCPV6_CLIENT_PORT, DHCPV6_SERVER_PORT,
        },
        option::DhcpV6Option,
        MacAddr, PrefixLen, TransactionId,
    };

    const IFACE_MAC: &str = "aa:bb:cc:dd:ee:01";
    const CLIENT_DUID: &str = "00:03:00:01:aa:bb:cc:dd:ee:02";

    fn test_iface() -> Arc<PhysicalInterface> {
        Arc::new(PhysicalInterface {
            name: "eth0".to_string(),
            index: 2,
            mac: MacAddr::new(IFACE_MAC).unwrap(),
            link_local: Ipv6Addr::from_str("fe80::1").unwrap(),
        })
    }

    fn test_prefixes() -> Arc<PrefixStore> {
        let mut store = PrefixStore::new();
        store.add(ConfiguredPrefix {
            iface_name: "eth0".to_string(),
            client_duid: Duid::new(CLIENT_DUID).unwrap(),
            address: Ipv6Addr::from_str("2001:db8::").unwrap(),
            length: PrefixLen::new(56).unwrap(),
        });
        Arc::new(store)
    }

    /// Server-to-client frame: unicast to `dst_mac`, UDP 547 -> 546.
    fn server_frame(dst_mac: [u8; 6], msg: &DhcpV6Message) -> Vec<u8> {
        let mut payload = BufferMut::new();
        msg.emit(&mut payload);
        let builder = etherparse::PacketBuilder::ethernet2(
            [0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa],
            dst_mac,
        )
        .ipv6(
            Ipv6Addr::from_str("fe80::53").unwrap().octets(),
            Ipv6Addr::from_str("fe80::1").unwrap().octets(),
            64,
        )
        .udp(DHCPV6_SERVER_PORT, DHCPV6_CLIENT_PORT);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload.data).unwrap();
        frame
    }

    fn reply_with_client_id(client_id: &[u8]) -> DhcpV6Message {
        let mut msg = DhcpV6Message::new(
            DhcpV6MessageType::Reply,
            TransactionId::new(0x123456).unwrap(),
        );
        msg.options
            .push(DhcpV6Option::ClientId(client_id.to_vec()));
        msg
    }

    #[test]
    fn matching_frame_is_forwarded_with_derived_duid() {
        let (tx, rx) = channel();
        let handler = Handler::new(test_prefixes(), tx);
        let iface = test_iface();

        let msg = reply_with_client_id(
            &Duid::new(CLIENT_DUID).unwrap().to_bytes(),
        );
        handler.process_frame(
            &iface,
            &server_frame(iface.mac.octets(), &msg),
        );

        let (duid, forwarded) = rx.try_recv().unwrap();
        assert_eq!(duid.to_string(), CLIENT_DUID);
        assert_eq!(forwarded.msg_type, DhcpV6MessageType::Reply);
    }

    #[test]
    fn client_duid_is_normalised_from_llt_to_ll_form() {
        let (tx, rx) = channel();
        let handler = Handler::new(test_prefixes(), tx);
        let iface = test_iface();

        // DUID-LLT with the same link-layer address maps to the same
        // configured prefix
        let llt_client_id = [
            0x00, 0x01, 0x00, 0x01, 0x2a, 0x9f, 0x11, 0x04, 0xaa, 0xbb, 0xcc,
            0xdd, 0xee, 0x02,
        ];
        let msg = reply_with_client_id(&llt_client_id);
        handler.process_frame(
            &iface,
            &server_frame(iface.mac.octets(), &msg),
        );

        let (duid, _) = rx.try_recv().unwrap();
        assert_eq!(duid.to_string(), CLIENT_DUID);
    }

    #[test]
    fn frame_for_other_mac_is_dropped() {
        let (tx, rx) = channel();
        let handler = Handler::new(test_prefixes(), tx);
        let iface = test_iface();

        let msg = reply_with_client_id(
            &Duid::new(CLIENT_DUID).unwrap().to_bytes(),
        );
        handler.process_frame(
            &iface,
            &server_frame([0x33, 0x33, 0x00, 0x01, 0x00, 0x02], &msg),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn frame_without_client_id_is_dropped() {
        let (tx, rx) = channel();
        let handler = Handler::new(test_prefixes(), tx);
        let iface = test_iface();

        let msg = DhcpV6Message::new(
            DhcpV6MessageType::Reply,
            TransactionId::new(1).unwrap(),
        );
        handler.process_frame(
            &iface,
            &server_frame(iface.mac.octets(), &msg),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn frame_with_unknown_duid_is_dropped() {
        let (tx, rx) = channel();
        let handler = Handler::new(test_prefixes(), tx);
        let iface = test_iface();

        let msg = reply_with_client_id(
            &Duid::new("00:03:00:01:00:00:00:00:00:09")
                .unwrap()
                .to_bytes(),
        );
        handler.process_frame(
            &iface,
            &server_frame(iface.mac.octets(), &msg),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn garbage_frame_is_dropped() {
        let (tx, rx) = channel();
        let handler = Handler::new(test_prefixes(), tx);
        let iface = test_iface();

        handler.process_frame(&iface, &[0x00, 0x01, 0x02]);
        assert!(rx.try_recv().is_err());
    }
}
