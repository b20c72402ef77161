use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use acorn_core::SharedClock;
use acorn_grove::Grove;
use acorn_tangle::Direction;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// Literal prefix every discovery datagram carries ahead of its JSON
/// body (§6 "UDP discovery datagram").
const MAGIC: &str = "CANOPY:";

/// Entries older than this are pruned from `DiscoveredNodes` (§4.9).
const STALE_AFTER: Duration = Duration::from_secs(30);

/// One broadcast datagram's JSON body (§4.9). `tree_types` is best-effort:
/// a receiver that only decodes `node_id`/`http_port` still admits the
/// sender, per the truncated-safe requirement in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub node_id: String,
    pub http_port: u16,
    pub tree_count: usize,
    #[serde(default)]
    pub tree_types: Vec<String>,
    pub timestamp: u64,
    /// Set only on the final datagram a node sends before stopping.
    #[serde(default)]
    pub leaving: bool,
}

impl Announcement {
    fn now(node_id: &str, http_port: u16, tree_types: &[String], leaving: bool) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Announcement {
            node_id: node_id.to_string(),
            http_port,
            tree_count: tree_types.len(),
            tree_types: tree_types.to_vec(),
            timestamp,
            leaving,
        }
    }
}

#[derive(Debug, Clone)]
struct DiscoveredNode {
    endpoint: String,
    tree_types: Vec<String>,
    last_seen: SystemTime,
}

/// `node_id -> {endpoint, tree_types, last_seen}`, read concurrently
/// and written only by the listener task (§5).
#[derive(Default)]
pub struct DiscoveredNodes {
    inner: Mutex<HashMap<String, DiscoveredNode>>,
}

impl DiscoveredNodes {
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(id, node)| (id.clone(), node.endpoint.clone()))
            .collect()
    }

    fn record(&self, node_id: &str, endpoint: String, tree_types: Vec<String>, now: SystemTime) {
        self.inner.lock().unwrap().insert(
            node_id.to_string(),
            DiscoveredNode {
                endpoint,
                tree_types,
                last_seen: now,
            },
        );
    }

    fn forget(&self, node_id: &str) {
        self.inner.lock().unwrap().remove(node_id);
    }

    fn prune(&self, now: SystemTime) {
        self.inner
            .lock()
            .unwrap()
            .retain(|_, node| now.duration_since(node.last_seen).unwrap_or_default() <= STALE_AFTER);
    }
}

/// Runtime configuration for one Canopy node (§6 environment options).
#[derive(Debug, Clone)]
pub struct CanopyConfig {
    pub discovery_port: u16,
    pub http_port: u16,
    pub auto_connect: bool,
    pub broadcast_interval: Duration,
}

impl Default for CanopyConfig {
    fn default() -> Self {
        CanopyConfig {
            discovery_port: 50505,
            http_port: 5000,
            auto_connect: true,
            broadcast_interval: Duration::from_secs(5),
        }
    }
}

/// UDP broadcast discovery and auto-tangling over a [`Grove`] (§4.9).
pub struct Canopy {
    node_id: String,
    config: CanopyConfig,
    grove: std::sync::Arc<Grove>,
    discovered: std::sync::Arc<DiscoveredNodes>,
    entangled: Mutex<HashSet<String>>,
    clock: SharedClock,
}

impl Canopy {
    pub fn new(grove: std::sync::Arc<Grove>, config: CanopyConfig) -> Self {
        Canopy {
            node_id: uuid::Uuid::new_v4().to_string(),
            config,
            grove,
            discovered: std::sync::Arc::new(DiscoveredNodes::default()),
            entangled: Mutex::new(HashSet::new()),
            clock: acorn_core::system_clock(),
        }
    }

    pub fn discovered(&self) -> std::sync::Arc<DiscoveredNodes> {
        self.discovered.clone()
    }

    /// Runs the broadcaster and listener until `stop` resolves, then
    /// sends one final "leaving" datagram before returning (§4.9).
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) -> std::io::Result<()> {
        let socket = UdpSocket::bind(("0.0.0.0", self.config.discovery_port)).await?;
        socket.set_broadcast(true)?;

        self.send_announcement(&socket, false).await;

        let mut ticker = tokio::time::interval(self.config.broadcast_interval);
        ticker.tick().await; // first tick fires immediately; already announced above

        let mut buf = [0u8; 2048];
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.send_announcement(&socket, false).await;
                    self.discovered.prune(self.clock.now());
                }
                received = socket.recv_from(&mut buf) => {
                    if let Ok((len, addr)) = received {
                        self.handle_datagram(&buf[..len], addr).await;
                    }
                }
                _ = &mut stop => {
                    self.send_announcement(&socket, true).await;
                    break;
                }
            }
        }
        Ok(())
    }

    async fn send_announcement(&self, socket: &UdpSocket, leaving: bool) {
        let tree_types: Vec<String> = self
            .grove
            .get_tree_info()
            .map(|infos| infos.into_iter().map(|i| i.type_name).collect())
            .unwrap_or_default();
        let announcement = Announcement::now(&self.node_id, self.config.http_port, &tree_types, leaving);
        let Ok(body) = serde_json::to_string(&announcement) else { return };
        let datagram = format!("{MAGIC}{body}");
        let broadcast_addr = (std::net::Ipv4Addr::BROADCAST, self.config.discovery_port);
        let _ = socket.send_to(datagram.as_bytes(), broadcast_addr).await;
    }

    async fn handle_datagram(&self, bytes: &[u8], sender: std::net::SocketAddr) {
        let Ok(text) = std::str::from_utf8(bytes) else { return };
        let Some(body) = text.strip_prefix(MAGIC) else { return };
        let Ok(announcement) = serde_json::from_str::<Announcement>(body) else { return };

        if announcement.node_id == self.node_id {
            return;
        }

        if announcement.leaving {
            self.discovered.forget(&announcement.node_id);
            self.entangled.lock().unwrap().remove(&announcement.node_id);
            return;
        }

        // The announcement only carries the sender's HTTP port, not its
        // host; the UDP datagram's own source address supplies that, so
        // this works across real hosts on a LAN, not just same-host.
        let endpoint = format!("http://{}:{}", sender.ip(), announcement.http_port);
        self.discovered
            .record(&announcement.node_id, endpoint.clone(), announcement.tree_types, self.clock.now());

        if !self.config.auto_connect {
            return;
        }
        let first_sighting = self.entangled.lock().unwrap().insert(announcement.node_id.clone());
        if first_sighting {
            let created = self.grove.entangle_all(&endpoint, Direction::Bidirectional);
            tracing::info!(peer = %announcement.node_id, %endpoint, created, "auto-entangled newly discovered node");
        }
    }
}
