// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    msg::{DhcpV6Message, DhcpV6MessageType},
    socket::FrameTx,
    time::LeaseTimer,
    viface::{PdState, VirtualInterface},
    Duid, TransactionId,
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

// RFC 3633 section 9: defaults applied when the server leaves T1/T2 zero
const DERIVED_T1_FACTOR: f64 = 0.5;
const DERIVED_T2_FACTOR: f64 = 0.8;

/// Owner of all virtual interfaces. Runs on its own worker and is the only
/// place VirtualInterface state is ever mutated: inbound packets arrive
/// through an mpsc channel fed by the handler, timer-driven transitions
/// happen on a one second tick.
pub struct Manager {
    pub(crate) vifaces: Vec<VirtualInterface>,
    retry_time: Duration,
    expire_time_multi: f64,
    frame_tx: Arc<dyn FrameTx>,
}

impl Manager {
    pub(crate) fn new(
        vifaces: Vec<VirtualInterface>,
        retry_time: Duration,
        expire_time_multi: f64,
        frame_tx: Arc<dyn FrameTx>,
    ) -> Self {
        Self {
            vifaces,
            retry_time,
            expire_time_multi,
            frame_tx,
        }
    }

    pub(crate) fn run(
        &mut self,
        packet_rx: Receiver<(Duid, DhcpV6Message)>,
        kill_flag: Arc<AtomicBool>,
    ) {
        // Let the listener workers come up before the first solicit
        std::thread::sleep(TICK_INTERVAL);

        let mut next_tick = Instant::now();
        while !kill_flag.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= next_tick {
                self.tick();
                next_tick = now + TICK_INTERVAL;
            }
            let wait = next_tick.saturating_duration_since(Instant::now());
            match packet_rx.recv_timeout(wait) {
                Ok((client_duid, msg)) => {
                    self.handle_packet(&client_duid, &msg)
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Packet channel closed, stopping manager");
                    break;
                }
            }
        }
    }

    /// One scheduler pass. Order matters: fresh solicits first, then
    /// requests, then lease-expiry evaluation, then retransmission
    /// timeouts.
    pub(crate) fn tick(&mut self) {
        for viface in self.vifaces.iter_mut() {
            if matches!(
                viface.state(),
                PdState::Initial | PdState::Withdrawn
            ) {
                solicit(viface, &*self.frame_tx);
            }
        }

        for viface in self.vifaces.iter_mut() {
            if viface.state() == PdState::Advertised {
                request(viface, &*self.frame_tx);
            }
        }

        for viface in self.vifaces.iter_mut() {
            if viface.state() == PdState::Confirmed {
                evaluate_confirmed(viface, &*self.frame_tx);
            }
        }

        let trigger = self.retry_time;
        for viface in self.vifaces.iter_mut() {
            apply_retry_timeout(viface, trigger);
        }
    }

    /// Entry point for inbound packets routed by the handler.
    pub(crate) fn handle_packet(
        &mut self,
        client_duid: &Duid,
        msg: &DhcpV6Message,
    ) {
        let viface = match self
            .vifaces
            .iter_mut()
            .find(|viface| &viface.client_duid == client_duid)
        {
            Some(v) => v,
            None => {
                log::warn!(
                    "Could not find virtual interface with client DUID \
                     {client_duid}"
                );
                return;
            }
        };

        match msg.msg_type {
            DhcpV6MessageType::Advertise => {
                handle_advertise(viface, msg, self.expire_time_multi)
            }
            DhcpV6MessageType::Reply => {
                handle_reply(viface, msg, self.expire_time_multi)
            }
            msg_type => {
                log::debug!(
                    "Ignoring {msg_type} message on virtual interface {viface}"
                );
            }
        }
    }
}

fn send(viface: &VirtualInterface, msg: &DhcpV6Message, frame_tx: &dyn FrameTx) {
    let frame = match msg
        .to_eth_frame(viface.physical.mac.octets(), viface.physical.link_local)
    {
        Ok(f) => f,
        Err(e) => {
            log::warn!(
                "Failed to build {} frame on virtual interface {viface}: {e}",
                msg.msg_type
            );
            return;
        }
    };
    match frame_tx.send_frame(&viface.physical, &frame) {
        Ok(()) => {
            log::info!(
                "Sent {} message on virtual interface {viface}",
                msg.msg_type
            );
            log::debug!("> Client DUID: {}", viface.client_duid);
            if let Some(server_duid) = viface.server_duid.as_ref() {
                log::debug!("> Server DUID: {server_duid}");
            }
            log::debug!("> Prefix: {}", viface.prefix);
        }
        Err(e) => {
            log::warn!(
                "Failed to send {} message on virtual interface {viface}: \
                 {e}",
                msg.msg_type
            );
        }
    }
}

fn solicit(viface: &mut VirtualInterface, frame_tx: &dyn FrameTx) {
    viface.set_state(PdState::Solicited);
    viface.last_action = Some(Instant::now());
    viface.transaction_id = Some(TransactionId::random());

    match DhcpV6Message::new_solicit(viface) {
        Ok(msg) => send(viface, &msg, frame_tx),
        Err(e) => log::warn!(
            "Failed to build SOLICIT on virtual interface {viface}: {e}"
        ),
    }
}

fn request(viface: &mut VirtualInterface, frame_tx: &dyn FrameTx) {
    viface.set_state(PdState::Requested);
    viface.last_action = Some(Instant::now());

    match DhcpV6Message::new_request(viface) {
        Ok(msg) => {
            send(viface, &msg, frame_tx);
            log_timers(viface);
        }
        Err(e) => log::warn!(
            "Failed to build REQUEST on virtual interface {viface}: {e}"
        ),
    }
}

fn renew(viface: &mut VirtualInterface, frame_tx: &dyn FrameTx) {
    viface.set_state(PdState::Renewing);
    viface.last_action = Some(Instant::now());

    match DhcpV6Message::new_renew(viface) {
        Ok(msg) => {
            send(viface, &msg, frame_tx);
            log_timers(viface);
        }
        Err(e) => log::warn!(
            "Failed to build RENEW on virtual interface {viface}: {e}"
        ),
    }
}

fn rebind(viface: &mut VirtualInterface, frame_tx: &dyn FrameTx) {
    viface.set_state(PdState::Rebinding);
    viface.last_action = Some(Instant::now());

    match DhcpV6Message::new_rebind(viface) {
        Ok(msg) => {
            send(viface, &msg, frame_tx);
            log_timers(viface);
        }
        Err(e) => log::warn!(
            "Failed to build REBIND on virtual interface {viface}: {e}"
        ),
    }
}

fn log_timers(viface: &VirtualInterface) {
    if let (Some(t1), Some(t2), Some(expire)) =
        (viface.t1, viface.t2, viface.expire)
    {
        log::debug!("> Timeouts: T1={t1}, T2={t2}, Expire={expire}");
    }
}

/// Highest severity first: a lost lease outranks rebinding outranks
/// renewing.
fn evaluate_confirmed(viface: &mut VirtualInterface, frame_tx: &dyn FrameTx) {
    let (last_confirm, t1, t2, expire) = match (
        viface.last_confirm,
        viface.t1,
        viface.t2,
        viface.expire,
    ) {
        (Some(last_confirm), Some(t1), Some(t2), Some(expire)) => {
            (last_confirm, t1, t2, expire)
        }
        _ => {
            log::warn!(
                "Virtual interface {viface} is confirmed without lease \
                 timers, resetting state to initial"
            );
            viface.set_state(PdState::Initial);
            return;
        }
    };

    if expire.has_elapsed(last_confirm) {
        log::warn!(
            "Unable to renew or rebind prefix {} - resetting state to initial",
            viface.prefix
        );
        viface.set_state(PdState::Initial);
    } else if t2.has_elapsed(last_confirm) {
        rebind(viface, frame_tx);
    } else if t1.has_elapsed(last_confirm) {
        renew(viface, frame_tx);
    }
}

fn apply_retry_timeout(viface: &mut VirtualInterface, retry_time: Duration) {
    if !matches!(
        viface.state(),
        PdState::Solicited
            | PdState::Requested
            | PdState::Renewing
            | PdState::Rebinding
    ) {
        return;
    }
    let last_action = match viface.last_action {
        Some(t) => t,
        None => return,
    };
    if last_action.elapsed() <= retry_time {
        return;
    }

    log::info!(
        "State {} of prefix {} timeouted.",
        viface.state(),
        viface.prefix
    );
    match viface.state() {
        PdState::Solicited | PdState::Requested => {
            viface.set_state(PdState::Initial);
        }
        // Fall back to Confirmed without touching last_confirm: the expire
        // timer keeps running from the original confirmation (RFC 3633
        // section 12.1), so the next ticks re-escalate to Rebinding or give
        // the lease up.
        PdState::Renewing | PdState::Rebinding => {
            viface.set_state(PdState::Confirmed);
        }
        _ => (),
    }
}

fn handle_advertise(
    viface: &mut VirtualInterface,
    msg: &DhcpV6Message,
    expire_time_multi: f64,
) {
    if viface.state() != PdState::Solicited {
        return;
    }

    let server_duid = match msg.server_duid() {
        Some(duid) => duid,
        None => {
            log::warn!(
                "Dropped ADVERTISE message without Server ID on virtual \
                 interface {viface}"
            );
            return;
        }
    };

    let (ia_pd, ia_prefix) = match (msg.ia_pd(), msg.ia_prefix()) {
        (Some(ia_pd), Some(ia_prefix)) => (ia_pd, ia_prefix),
        _ => {
            log::warn!(
                "ADVERTISE message on virtual interface {viface} does not \
                 contain any prefixes"
            );
            viface.set_state(PdState::Initial);
            return;
        }
    };

    if let Some(status) = msg.status() {
        if !status.is_success() {
            log::warn!(
                "Dropped ADVERTISE message with status: {}",
                status.message
            );
            return;
        }
    }

    if !viface.prefix.matches(ia_prefix.prefix, ia_prefix.prefix_len) {
        viface.set_state(PdState::Initial);
        log::warn!("Announced prefix does not match configured prefix!");
        log::info!("> Virtual interface: {viface}");
        log::info!(
            "> Announced prefix: {}/{}",
            ia_prefix.prefix,
            ia_prefix.prefix_len
        );
        log::info!("> Configured prefix: {}", viface.prefix);
        return;
    }

    if ia_pd.t1_sec > ia_pd.t2_sec {
        log::warn!(
            "Dropped ADVERTISE message with invalid timeouts: T1={}, T2={}",
            ia_pd.t1_sec,
            ia_pd.t2_sec
        );
        viface.set_state(PdState::Initial);
        return;
    }

    if ia_prefix.preferred_time_sec == 0 || ia_prefix.valid_time_sec == 0 {
        log::warn!(
            "Dropped ADVERTISE message with invalid lifetime: preflft={}, \
             validlft={}",
            ia_prefix.preferred_time_sec,
            ia_prefix.valid_time_sec
        );
        viface.set_state(PdState::Initial);
        return;
    }

    viface.set_state(PdState::Advertised);
    viface.server_duid = Some(server_duid);
    viface.t1 = Some(LeaseTimer::new(ia_pd.t1_sec));
    viface.t2 = Some(LeaseTimer::new(ia_pd.t2_sec));
    viface.expire =
        Some(LeaseTimer::new_expire(ia_pd.t2_sec, expire_time_multi));

    log::info!("Received ADVERTISE message on virtual interface {viface}");
    log::debug!("> Client DUID: {}", viface.client_duid);
    if let Some(server_duid) = viface.server_duid.as_ref() {
        log::debug!("> Server DUID: {server_duid}");
    }
    log::debug!("> Prefix: {}", viface.prefix);
}

fn handle_reply(
    viface: &mut VirtualInterface,
    msg: &DhcpV6Message,
    expire_time_multi: f64,
) {
    if !matches!(
        viface.state(),
        PdState::Requested | PdState::Renewing | PdState::Rebinding
    ) {
        return;
    }

    let server_duid = match msg.server_duid() {
        Some(duid) => duid,
        None => {
            log::warn!(
                "Dropped REPLY message without Server ID on virtual \
                 interface {viface}"
            );
            return;
        }
    };

    // While rebinding any responding server is acceptable and its DUID is
    // adopted; otherwise the Reply must come from the lease provider.
    if viface.state() == PdState::Rebinding {
        viface.server_duid = Some(server_duid);
    } else if viface.server_duid.as_ref() != Some(&server_duid) {
        log::debug!(
            "Dropped REPLY message from unknown server DUID: {server_duid}"
        );
        return;
    }

    if let Some(status) = msg.status() {
        if !status.is_success() {
            log::warn!(
                "Dropped REPLY message with status: {}",
                status.message
            );
            return;
        }
    }

    let (ia_pd, ia_prefix) = match (msg.ia_pd(), msg.ia_prefix()) {
        (Some(ia_pd), Some(ia_prefix)) => (ia_pd, ia_prefix),
        _ => {
            log::warn!(
                "REPLY message on virtual interface {viface} did not \
                 confirm any prefixes"
            );
            if viface.state() == PdState::Rebinding {
                viface.set_state(PdState::Withdrawn);
                log::warn!(
                    "Prefix {} was marked as withdrawn by server",
                    viface.prefix
                );
            } else {
                viface.set_state(PdState::Initial);
            }
            return;
        }
    };

    if !viface.prefix.matches(ia_prefix.prefix, ia_prefix.prefix_len) {
        viface.set_state(PdState::Initial);
        log::warn!("Confirmed prefix does not match configured prefix!");
        log::info!("> Virtual interface: {viface}");
        log::info!(
            "> Confirmed prefix: {}/{}",
            ia_prefix.prefix,
            ia_prefix.prefix_len
        );
        log::info!("> Configured prefix: {}", viface.prefix);
        return;
    }

    if ia_pd.t1_sec > ia_pd.t2_sec {
        log::warn!(
            "Dropped REPLY message with invalid timeouts: T1={}, T2={}",
            ia_pd.t1_sec,
            ia_pd.t2_sec
        );
        viface.set_state(PdState::Initial);
        return;
    }

    if ia_prefix.preferred_time_sec == 0 || ia_prefix.valid_time_sec == 0 {
        log::warn!(
            "Prefix {} was marked as withdrawn by server",
            viface.prefix
        );
        viface.set_state(PdState::Withdrawn);
        return;
    }

    let (t1_sec, t2_sec) = if ia_pd.t1_sec == 0 || ia_pd.t2_sec == 0 {
        (
            (f64::from(ia_prefix.preferred_time_sec) * DERIVED_T1_FACTOR)
                as u32,
            (f64::from(ia_prefix.preferred_time_sec) * DERIVED_T2_FACTOR)
                as u32,
        )
    } else {
        (ia_pd.t1_sec, ia_pd.t2_sec)
    };

    viface.set_state(PdState::Confirmed);
    viface.last_confirm = Some(Instant::now());
    viface.t1 = Some(LeaseTimer::new(t1_sec));
    viface.t2 = Some(LeaseTimer::new(t2_sec));
    viface.expire = Some(LeaseTimer::new_expire(t2_sec, expire_time_multi));

    log::info!("Received REPLY message on virtual interface {viface}");
    log::debug!("> Client DUID: {}", viface.client_duid);
    if let Some(server_duid) = viface.server_duid.as_ref() {
        log::debug!("> Server DUID: {server_duid}");
    }
    log::debug!("> Prefix: {}", viface.prefix);
    log_timers(viface);
}

#[cfg(test)]
mod test {
    use std::net::Ipv6Addr;
    use std::str::FromStr;
    use std::sync::Mutex;

    use super::*;
    use crate::{
        iface::{ConfiguredPrefix, PhysicalInterface},
        option::DhcpV6Option,
        option_ia::{DhcpV6OptionIaPd, DhcpV6OptionIaPrefix},
        option_status::{DhcpV6OptionStatus, DhcpV6OptionStatusCode},
        Iaid, MacAddr, PdError, PrefixLen,
    };

    const SERVER_DUID: &str = "00:03:00:01:ff:ff:ff:ff:ff:01";
    const OTHER_SERVER_DUID: &str = "00:03:00:01:ff:ff:ff:ff:ff:02";
    const CLIENT_DUID: &str = "00:03:00:01:aa:bb:cc:dd:ee:02";

    #[derive(Default)]
    struct RecordingTx {
        frames: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl FrameTx for RecordingTx {
        fn send_frame(
            &self,
            iface: &PhysicalInterface,
            frame: &[u8],
        ) -> Result<(), PdError> {
            self.frames
                .lock()
                .unwrap()
                .push((iface.name.clone(), frame.to_vec()));
            Ok(())
        }
    }

    impl RecordingTx {
        fn sent(&self) -> Vec<DhcpV6Message> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|(_, frame)| {
                    DhcpV6Message::from_eth_frame(frame).unwrap()
                })
                .collect()
        }
    }

    fn test_manager() -> (Manager, Arc<RecordingTx>) {
        let physical = Arc::new(PhysicalInterface {
            name: "eth0".to_string(),
            index: 2,
            mac: MacAddr::new("aa:bb:cc:dd:ee:01").unwrap(),
            link_local: Ipv6Addr::from_str("fe80::1").unwrap(),
        });
        let prefix = ConfiguredPrefix {
            iface_name: "eth0".to_string(),
            client_duid: Duid::new(CLIENT_DUID).unwrap(),
            address: Ipv6Addr::from_str("2001:db8::").unwrap(),
            length: PrefixLen::new(56).unwrap(),
        };
        let viface =
            VirtualInterface::new(Iaid::new(25000).unwrap(), prefix, physical);
        let frame_tx = Arc::new(RecordingTx::default());
        let manager = Manager::new(
            vec![viface],
            Duration::from_secs(60),
            1.5,
            frame_tx.clone(),
        );
        (manager, frame_tx)
    }

    fn client_duid() -> Duid {
        Duid::new(CLIENT_DUID).unwrap()
    }

    fn reply_like_msg(
        msg_type: DhcpV6MessageType,
        server_duid: Option<&str>,
        prefix: Option<(&str, u8, u32, u32)>,
        t1_sec: u32,
        t2_sec: u32,
    ) -> DhcpV6Message {
        let mut msg =
            DhcpV6Message::new(msg_type, TransactionId::new(0x123456).unwrap());
        if let Some(duid) = server_duid {
            msg.options.push(DhcpV6Option::ServerId(
                Duid::new(duid).unwrap().to_bytes(),
            ));
        }
        msg.options.push(DhcpV6Option::IaPd(DhcpV6OptionIaPd {
            iaid: 25000,
            t1_sec,
            t2_sec,
            prefix: prefix.map(|(addr, plen, pref, valid)| {
                DhcpV6OptionIaPrefix {
                    preferred_time_sec: pref,
                    valid_time_sec: valid,
                    prefix_len: plen,
                    prefix: Ipv6Addr::from_str(addr).unwrap(),
                }
            }),
            status: None,
        }));
        msg
    }

    fn advertise(
        prefix: (&str, u8, u32, u32),
        t1_sec: u32,
        t2_sec: u32,
    ) -> DhcpV6Message {
        reply_like_msg(
            DhcpV6MessageType::Advertise,
            Some(SERVER_DUID),
            Some(prefix),
            t1_sec,
            t2_sec,
        )
    }

    fn reply(
        prefix: (&str, u8, u32, u32),
        t1_sec: u32,
        t2_sec: u32,
    ) -> DhcpV6Message {
        reply_like_msg(
            DhcpV6MessageType::Reply,
            Some(SERVER_DUID),
            Some(prefix),
            t1_sec,
            t2_sec,
        )
    }

    #[test]
    fn happy_path_solicit_to_confirmed() {
        let (mut manager, frame_tx) = test_manager();

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, DhcpV6MessageType::Solicit);
        assert_eq!(
            sent[0].client_id(),
            Some(client_duid().to_bytes().as_slice())
        );
        let ia_pd = sent[0].ia_pd().unwrap();
        assert_eq!(ia_pd.iaid, 25000);
        let ia_prefix = sent[0].ia_prefix().unwrap();
        assert_eq!(ia_prefix.prefix.to_string(), "2001:db8::");
        assert_eq!(ia_prefix.prefix_len, 56);

        manager.handle_packet(
            &client_duid(),
            &advertise(("2001:db8::", 56, 300, 400), 100, 200),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Advertised);
        assert_eq!(
            manager.vifaces[0].server_duid.as_ref().unwrap().to_string(),
            SERVER_DUID
        );

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Requested);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].msg_type, DhcpV6MessageType::Request);
        assert_eq!(
            sent[1].server_duid().unwrap().to_string(),
            SERVER_DUID
        );

        manager.handle_packet(
            &client_duid(),
            &reply(("2001:db8::", 56, 300, 400), 100, 200),
        );
        let viface = &manager.vifaces[0];
        assert_eq!(viface.state(), PdState::Confirmed);
        assert!(viface.last_confirm.is_some());
        assert_eq!(viface.t1.unwrap().secs(), 100);
        assert_eq!(viface.t2.unwrap().secs(), 200);
        assert_eq!(viface.expire.unwrap().secs(), 300);
        // expire > t2 >= t1 > 0
        assert!(viface.expire.unwrap().secs() > viface.t2.unwrap().secs());
        assert!(viface.t2.unwrap().secs() >= viface.t1.unwrap().secs());
        assert!(viface.t1.unwrap().secs() > 0);
    }

    #[test]
    fn advertise_with_mismatched_prefix_resets_to_initial() {
        let (mut manager, frame_tx) = test_manager();

        manager.tick();
        manager.handle_packet(
            &client_duid(),
            &advertise(("2001:db8:1::", 56, 300, 400), 100, 200),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Initial);

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].msg_type, DhcpV6MessageType::Solicit);
    }

    #[test]
    fn reply_without_prefix_while_rebinding_withdraws() {
        let (mut manager, frame_tx) = test_manager();
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Rebinding);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_action = Some(Instant::now());
            viface.t1 = Some(LeaseTimer::new(100));
            viface.t2 = Some(LeaseTimer::new(200));
            viface.expire = Some(LeaseTimer::new_expire(200, 1.5));
        }

        let mut msg = DhcpV6Message::new(
            DhcpV6MessageType::Reply,
            TransactionId::new(1).unwrap(),
        );
        msg.options.push(DhcpV6Option::ServerId(
            Duid::new(OTHER_SERVER_DUID).unwrap().to_bytes(),
        ));
        msg.options.push(DhcpV6Option::IaPd(DhcpV6OptionIaPd {
            iaid: 25000,
            t1_sec: 0,
            t2_sec: 0,
            prefix: None,
            status: None,
        }));
        manager.handle_packet(&client_duid(), &msg);

        let viface = &manager.vifaces[0];
        assert_eq!(viface.state(), PdState::Withdrawn);
        // While rebinding the responding server's DUID is adopted
        assert_eq!(
            viface.server_duid.as_ref().unwrap().to_string(),
            OTHER_SERVER_DUID
        );
        assert!(frame_tx.sent().is_empty());

        // The next tick re-solicits a withdrawn prefix
        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, DhcpV6MessageType::Solicit);
    }

    #[test]
    fn solicit_retry_timeout_resolicits_with_fresh_transaction_id() {
        let (mut manager, frame_tx) = test_manager();

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
        let first_xid = manager.vifaces[0].transaction_id.unwrap();

        manager.vifaces[0].last_action =
            Some(Instant::now() - Duration::from_secs(61));
        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Initial);
        assert_eq!(frame_tx.sent().len(), 1);

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].msg_type, DhcpV6MessageType::Solicit);
        assert_ne!(manager.vifaces[0].transaction_id.unwrap(), first_xid);
        assert_eq!(sent[1].xid, manager.vifaces[0].transaction_id.unwrap());
    }

    #[test]
    fn reply_from_unknown_server_is_dropped_while_renewing() {
        let (mut manager, _frame_tx) = test_manager();
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Renewing);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_action = Some(Instant::now());
        }

        let msg = reply_like_msg(
            DhcpV6MessageType::Reply,
            Some(OTHER_SERVER_DUID),
            Some(("2001:db8::", 56, 300, 400)),
            100,
            200,
        );
        manager.handle_packet(&client_duid(), &msg);

        let viface = &manager.vifaces[0];
        assert_eq!(viface.state(), PdState::Renewing);
        assert_eq!(
            viface.server_duid.as_ref().unwrap().to_string(),
            SERVER_DUID
        );
    }

    #[test]
    fn zero_timers_in_reply_are_derived_from_preferred_lifetime() {
        let (mut manager, _frame_tx) = test_manager();
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Requested);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_action = Some(Instant::now());
        }

        manager.handle_packet(
            &client_duid(),
            &reply(("2001:db8::", 56, 1000, 2000), 0, 0),
        );

        let viface = &manager.vifaces[0];
        assert_eq!(viface.state(), PdState::Confirmed);
        assert_eq!(viface.t1.unwrap().secs(), 500);
        assert_eq!(viface.t2.unwrap().secs(), 800);
        assert_eq!(viface.expire.unwrap().secs(), 1200);
    }

    #[test]
    fn advertise_in_wrong_state_is_silently_dropped() {
        let (mut manager, _frame_tx) = test_manager();
        manager.handle_packet(
            &client_duid(),
            &advertise(("2001:db8::", 56, 300, 400), 100, 200),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Initial);
    }

    #[test]
    fn advertise_with_error_status_is_dropped() {
        let (mut manager, _frame_tx) = test_manager();
        manager.tick();

        let mut msg = advertise(("2001:db8::", 56, 300, 400), 100, 200);
        msg.options
            .push(DhcpV6Option::StatusCode(DhcpV6OptionStatus {
                status: DhcpV6OptionStatusCode::NoPrefixAvail,
                message: "no prefixes left".to_string(),
            }));
        manager.handle_packet(&client_duid(), &msg);
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
    }

    #[test]
    fn advertise_without_server_id_is_dropped() {
        let (mut manager, _frame_tx) = test_manager();
        manager.tick();

        let msg = reply_like_msg(
            DhcpV6MessageType::Advertise,
            None,
            Some(("2001:db8::", 56, 300, 400)),
            100,
            200,
        );
        manager.handle_packet(&client_duid(), &msg);
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
    }

    #[test]
    fn advertise_with_t1_bigger_than_t2_resets_to_initial() {
        let (mut manager, _frame_tx) = test_manager();
        manager.tick();

        manager.handle_packet(
            &client_duid(),
            &advertise(("2001:db8::", 56, 300, 400), 200, 100),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Initial);
    }

    #[test]
    fn advertise_with_zero_lifetime_resets_to_initial() {
        let (mut manager, _frame_tx) = test_manager();
        manager.tick();

        manager.handle_packet(
            &client_duid(),
            &advertise(("2001:db8::", 56, 0, 400), 100, 200),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Initial);
    }

    #[test]
    fn zero_lifetime_reply_withdraws_the_prefix() {
        let (mut manager, _frame_tx) = test_manager();
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Requested);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_action = Some(Instant::now());
        }

        manager.handle_packet(
            &client_duid(),
            &reply(("2001:db8::", 56, 0, 400), 100, 200),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Withdrawn);
    }

    #[test]
    fn confirmed_escalates_to_renew_then_falls_back_on_timeout() {
        let (mut manager, frame_tx) = test_manager();
        let confirm_time = Instant::now() - Duration::from_secs(101);
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Confirmed);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_confirm = Some(confirm_time);
            viface.t1 = Some(LeaseTimer::new(100));
            viface.t2 = Some(LeaseTimer::new(200));
            viface.expire = Some(LeaseTimer::new_expire(200, 1.5));
        }

        // T1 elapsed, T2 not yet
        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Renewing);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, DhcpV6MessageType::Renew);

        // Retry timeout falls back to Confirmed and keeps last_confirm, so
        // the expire timer still runs from the original confirmation
        manager.vifaces[0].last_action =
            Some(Instant::now() - Duration::from_secs(61));
        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Confirmed);
        assert_eq!(manager.vifaces[0].last_confirm, Some(confirm_time));
    }

    #[test]
    fn confirmed_escalates_to_rebind_when_t2_elapsed() {
        let (mut manager, frame_tx) = test_manager();
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Confirmed);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_confirm =
                Some(Instant::now() - Duration::from_secs(201));
            viface.t1 = Some(LeaseTimer::new(100));
            viface.t2 = Some(LeaseTimer::new(200));
            viface.expire = Some(LeaseTimer::new_expire(200, 1.5));
        }

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Rebinding);
        let sent = frame_tx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, DhcpV6MessageType::Rebind);
        // Rebind is multicast to any server
        assert!(sent[0].server_duid().is_none());
    }

    #[test]
    fn confirmed_expires_to_initial_when_expire_elapsed() {
        let (mut manager, frame_tx) = test_manager();
        {
            let viface = &mut manager.vifaces[0];
            viface.set_state(PdState::Confirmed);
            viface.server_duid = Some(Duid::new(SERVER_DUID).unwrap());
            viface.transaction_id = Some(TransactionId::new(1).unwrap());
            viface.last_confirm =
                Some(Instant::now() - Duration::from_secs(301));
            viface.t1 = Some(LeaseTimer::new(100));
            viface.t2 = Some(LeaseTimer::new(200));
            viface.expire = Some(LeaseTimer::new_expire(200, 1.5));
        }

        manager.tick();
        assert_eq!(manager.vifaces[0].state(), PdState::Initial);
        assert!(frame_tx.sent().is_empty());
    }

    #[test]
    fn packet_for_unknown_duid_is_dropped() {
        let (mut manager, _frame_tx) = test_manager();
        manager.tick();
        let unknown = Duid::new("00:03:00:01:00:00:00:00:00:01").unwrap();
        manager.handle_packet(
            &unknown,
            &advertise(("2001:db8::", 56, 300, 400), 100, 200),
        );
        assert_eq!(manager.vifaces[0].state(), PdState::Solicited);
    }
}
