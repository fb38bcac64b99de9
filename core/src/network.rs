//! Network interface enumeration and connection strategy selection.
//!
//! # Design
//! Whether outbound sockets can be pinned to an interface is a platform
//! capability. `select_strategy` queries it once per call and returns a
//! `ConnectionStrategy`; the rest of the executor never branches on the
//! platform again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::BridgeError;

const SYSFS_NET: &str = "/sys/class/net";

const ARPHRD_ETHER: u32 = 1;
const ARPHRD_LOOPBACK: u32 = 772;

const CELLULAR_PREFIXES: &[&str] = &["rmnet", "ccmni", "wwan"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Wifi,
    Cellular,
    Ethernet,
    Loopback,
    Other,
}

/// An active OS network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub index: u32,
    pub kind: InterfaceKind,
}

/// Source of the interfaces a request may be bound to.
pub trait NetworkProvider {
    /// Whether this platform can bind an outbound connection to a chosen
    /// interface.
    fn supports_binding(&self) -> bool;

    /// Currently active interfaces, in enumeration order.
    fn active_interfaces(&self) -> io::Result<Vec<NetworkInterface>>;
}

/// How the transport should route a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Bind the socket to this interface.
    InterfaceBound(NetworkInterface),
    /// Let the OS pick the default route.
    Default,
}

/// Pick the connection strategy for one request.
///
/// Without binding support the default route is used and interfaces are
/// not enumerated. Otherwise the first WiFi interface in enumeration order
/// wins; there is no further tie-break.
pub fn select_strategy<P>(provider: &P) -> Result<ConnectionStrategy, BridgeError>
where
    P: NetworkProvider + ?Sized,
{
    if !provider.supports_binding() {
        debug!("interface binding unsupported on this platform, using default route");
        return Ok(ConnectionStrategy::Default);
    }

    trace!("selecting network");
    let interfaces = provider
        .active_interfaces()
        .map_err(|e| BridgeError::NetworkQuery(e.to_string()))?;
    interfaces
        .into_iter()
        .find(|iface| iface.kind == InterfaceKind::Wifi)
        .map(ConnectionStrategy::InterfaceBound)
        .ok_or(BridgeError::InterfaceUnavailable)
}

/// Reads interfaces from the Linux sysfs network class directory.
#[derive(Debug, Clone)]
pub struct SysfsNetworkProvider {
    root: PathBuf,
}

impl Default for SysfsNetworkProvider {
    fn default() -> Self {
        Self::new(SYSFS_NET)
    }
}

impl SysfsNetworkProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_interface(&self, dir: &Path, name: String) -> Option<NetworkInterface> {
        if !is_active(dir) {
            trace!(interface = %name, "skipping inactive interface");
            return None;
        }
        let index = read_trimmed(&dir.join("ifindex"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(u32::MAX);
        let kind = classify(dir, &name);
        Some(NetworkInterface { name, index, kind })
    }
}

impl NetworkProvider for SysfsNetworkProvider {
    fn supports_binding(&self) -> bool {
        cfg!(any(target_os = "linux", target_os = "android"))
    }

    fn active_interfaces(&self) -> io::Result<Vec<NetworkInterface>> {
        let mut interfaces = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(iface) = self.read_interface(&entry.path(), name) {
                interfaces.push(iface);
            }
        }
        interfaces.sort_by_key(|iface| iface.index);
        debug!(count = interfaces.len(), "enumerated active interfaces");
        Ok(interfaces)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn is_active(dir: &Path) -> bool {
    match read_trimmed(&dir.join("operstate")).as_deref() {
        Some("up") => true,
        Some("unknown") => read_trimmed(&dir.join("carrier")).as_deref() == Some("1"),
        _ => false,
    }
}

fn classify(dir: &Path, name: &str) -> InterfaceKind {
    let devtype = read_trimmed(&dir.join("uevent")).and_then(|uevent| {
        uevent
            .lines()
            .find_map(|line| line.strip_prefix("DEVTYPE=").map(str::to_string))
    });

    if dir.join("wireless").exists() || dir.join("phy80211").exists() || devtype.as_deref() == Some("wlan") {
        return InterfaceKind::Wifi;
    }
    if devtype.as_deref() == Some("wwan") || CELLULAR_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return InterfaceKind::Cellular;
    }
    match read_trimmed(&dir.join("type")).and_then(|s| s.parse::<u32>().ok()) {
        Some(ARPHRD_LOOPBACK) => InterfaceKind::Loopback,
        Some(ARPHRD_ETHER) => InterfaceKind::Ethernet,
        _ => InterfaceKind::Other,
    }
}
