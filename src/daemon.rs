// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::{
    config::Config,
    handler::Handler,
    iface::{ConfiguredPrefix, PhysicalInterface},
    listener::Listener,
    manager::Manager,
    netlink,
    socket::RawFrameTx,
    store::{InterfaceStore, PrefixStore},
    viface::VirtualInterface,
    Duid, ErrorKind, Iaid, MacAddr, PdError, PrefixLen,
};

const IAID_BASE: u64 = 25000;

struct Worker {
    kill_flag: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

fn spawn_worker<F>(name: &str, work: F) -> Result<Worker, PdError>
where
    F: FnOnce(Arc<AtomicBool>) + Send + 'static,
{
    let kill_flag = Arc::new(AtomicBool::new(false));
    let thread_flag = kill_flag.clone();
    let handle = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || work(thread_flag))
        .map_err(|e| {
            PdError::new(
                ErrorKind::Bug,
                format!("Failed to spawn {name} thread: {e}"),
            )
        })?;
    Ok(Worker { kill_flag, handle })
}

/// Daemon bootstrap: loads and validates the configuration, resolves the
/// physical interfaces, builds the virtual interfaces and supervises the
/// workers until a termination signal arrives.
pub struct Daemon;

impl Daemon {
    pub fn run(config_path: &Path) -> Result<(), PdError> {
        let config = Config::load(config_path)?;
        log::info!(
            "Loaded configuration file: {}",
            config_path.display()
        );

        let interfaces = init_interfaces(&config)?;
        let prefixes = Arc::new(prefixes_from_config(&config, &interfaces)?);
        let vifaces = build_virtual_interfaces(&prefixes, &interfaces)?;
        dump_virtual_interfaces(&vifaces);

        let iface_list: Vec<Arc<PhysicalInterface>> =
            interfaces.iter().cloned().collect();
        let frame_tx = Arc::new(RawFrameTx::new(&iface_list)?);

        let (manager_tx, manager_rx) = channel();
        let (handler_tx, handler_rx) = channel();

        let mut manager = Manager::new(
            vifaces,
            Duration::from_secs(config.retry_time),
            config.expire_time_multi,
            frame_tx,
        );
        let mut workers = vec![spawn_worker("manager", move |kill_flag| {
            manager.run(manager_rx, kill_flag)
        })?];
        log::info!("Started manager thread");
        log::info!("> Retry time: {} second(s)", config.retry_time);
        log::info!("> Expire time multi: T2 x {}", config.expire_time_multi);

        let handler = Handler::new(prefixes, manager_tx);
        workers.push(spawn_worker("handler", move |kill_flag| {
            handler.run(handler_rx, kill_flag)
        })?);
        log::info!("Started packet handler thread");

        for iface in interfaces.iter() {
            let listener = Listener::new(iface.clone(), handler_tx.clone())?;
            workers.push(spawn_worker(
                &format!("listener-{}", iface.name),
                move |kill_flag| listener.run(kill_flag),
            )?);
            log::info!("Started listener on interface {iface}");
        }
        // The workers hold all remaining senders
        drop(handler_tx);

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        if let Some(signal) = signals.forever().next() {
            log::warn!(
                "Received signal {signal}. Stopping all threads..."
            );
        }
        log::debug!("> Thread count: {} thread(s)", workers.len());

        for worker in &workers {
            worker.kill_flag.store(true, Ordering::Relaxed);
        }
        for worker in workers {
            if worker.handle.join().is_err() {
                log::error!("A worker thread panicked during shutdown");
            }
        }
        Ok(())
    }
}

fn init_interfaces(config: &Config) -> Result<InterfaceStore, PdError> {
    let mut store = InterfaceStore::new();
    for iface_conf in &config.interfaces {
        let link = netlink::resolve_link(&iface_conf.name)?;
        let mac = match iface_conf.mac.as_deref() {
            Some(text) => MacAddr::new(text)?,
            None => match link.mac.as_deref() {
                Some(raw) => MacAddr::from_octets(raw)?,
                None => {
                    return Err(PdError::new(
                        ErrorKind::Environment,
                        format!(
                            "Could not determine mac address of interface {}",
                            iface_conf.name
                        ),
                    ));
                }
            },
        };
        let link_local = match iface_conf.ip.as_deref() {
            Some(text) => text.parse::<Ipv6Addr>().map_err(|e| {
                PdError::new(
                    ErrorKind::InvalidConfig,
                    format!(
                        "Invalid link-local address {text} of interface {}: \
                         {e}",
                        iface_conf.name
                    ),
                )
            })?,
            None => netlink::resolve_link_local(link.index)?.ok_or_else(
                || {
                    PdError::new(
                        ErrorKind::Environment,
                        format!(
                            "Could not determine link local address of \
                             interface {}",
                            iface_conf.name
                        ),
                    )
                },
            )?,
        };

        let iface = store.add(PhysicalInterface {
            name: iface_conf.name.clone(),
            index: link.index,
            mac,
            link_local,
        });
        log::info!("Initialized interface {iface}");
        log::info!("> MAC address: {}", iface.mac);
        log::info!("> Link-local address: {}", iface.link_local);
    }
    check_interface_uniqueness(&store)?;
    Ok(store)
}

fn check_interface_uniqueness(
    store: &InterfaceStore,
) -> Result<(), PdError> {
    let ifaces: Vec<&Arc<PhysicalInterface>> = store.iter().collect();
    for (i, iface) in ifaces.iter().enumerate() {
        for other in &ifaces[..i] {
            if iface.name == other.name {
                return Err(PdError::new(
                    ErrorKind::InvalidConfig,
                    format!(
                        "Duplicate interface name detected: {}",
                        iface.name
                    ),
                ));
            }
            if iface.mac == other.mac {
                return Err(PdError::new(
                    ErrorKind::InvalidConfig,
                    format!(
                        "Duplicate interface mac address detected: {}",
                        iface.mac
                    ),
                ));
            }
            if iface.link_local == other.link_local {
                return Err(PdError::new(
                    ErrorKind::InvalidConfig,
                    format!(
                        "Duplicate interface ip address detected: {}",
                        iface.link_local
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn prefixes_from_config(
    config: &Config,
    interfaces: &InterfaceStore,
) -> Result<PrefixStore, PdError> {
    let mut store = PrefixStore::new();
    for prefix_conf in &config.prefixes {
        let client_duid = Duid::new(&prefix_conf.duid)?;
        let address =
            prefix_conf.address.parse::<Ipv6Addr>().map_err(|e| {
                PdError::new(
                    ErrorKind::InvalidConfig,
                    format!(
                        "Invalid prefix address {}: {e}",
                        prefix_conf.address
                    ),
                )
            })?;
        let length = PrefixLen::new(prefix_conf.length)?;

        let prefix = ConfiguredPrefix {
            iface_name: prefix_conf.interface.clone(),
            client_duid,
            address,
            length,
        };
        if interfaces.get_by_name(&prefix.iface_name).is_none() {
            return Err(PdError::new(
                ErrorKind::InvalidConfig,
                format!(
                    "Prefix {prefix} requires inexistent physical interface \
                     {}",
                    prefix.iface_name
                ),
            ));
        }
        if store.get_by_duid(&prefix.client_duid).is_some() {
            return Err(PdError::new(
                ErrorKind::InvalidConfig,
                format!(
                    "You can only specify one prefix per interface and DUID: \
                     {prefix}"
                ),
            ));
        }

        log::info!("Initialized prefix {prefix}");
        log::info!("> Interface: {}", prefix.iface_name);
        log::info!("> Client DUID: {}", prefix.client_duid);
        store.add(prefix);
    }
    Ok(store)
}

fn build_virtual_interfaces(
    prefixes: &PrefixStore,
    interfaces: &InterfaceStore,
) -> Result<Vec<VirtualInterface>, PdError> {
    let mut ret = Vec::new();
    for (i, prefix) in prefixes.iter().enumerate() {
        let physical = interfaces
            .get_by_name(&prefix.iface_name)
            .ok_or_else(|| {
                PdError::new(
                    ErrorKind::Bug,
                    format!(
                        "Prefix {prefix} references unresolved interface {}",
                        prefix.iface_name
                    ),
                )
            })?
            .clone();
        ret.push(VirtualInterface::new(
            Iaid::new(IAID_BASE + i as u64)?,
            prefix.clone(),
            physical,
        ));
    }
    Ok(ret)
}

fn dump_virtual_interfaces(vifaces: &[VirtualInterface]) {
    for viface in vifaces {
        log::debug!("Virtual interface #{}", viface.iaid);
        log::debug!("> Physical device: {}", viface.physical.name);
        log::debug!("> MAC address: {}", viface.physical.mac);
        log::debug!("> Link-local address: {}", viface.physical.link_local);
        log::debug!("> Client DUID: {}", viface.client_duid);
        log::debug!("> Prefix: {}", viface.prefix);
    }
}
