//! UDP connection pool with idle timeout management
//!
//! Maps a peer address string to its live connection. Entries idle for
//! longer than the TTL are evicted by a background sweep; entries whose
//! connection was closed are dropped on next access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::conn::ConnHandle;

type ConnMap = Arc<Mutex<HashMap<String, ConnHandle>>>;

/// Pool of demuxed UDP peers
pub struct ConnPool {
    ttl: Duration,
    conns: ConnMap,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ConnPool {
    /// Create a pool evicting peers idle for `ttl`.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(ttl: Duration) -> Self {
        let conns: ConnMap = Arc::new(Mutex::new(HashMap::new()));
        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&conns), ttl));

        Self {
            ttl,
            conns,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the live connection for `key`, or register the one `create`
    /// returns. Lookup and registration happen under one lock.
    pub(crate) fn get_or_insert_with<F>(&self, key: &str, create: F) -> Option<ConnHandle>
    where
        F: FnOnce() -> Option<ConnHandle>,
    {
        let mut conns = self.conns.lock();
        if let Some(conn) = lookup(&mut conns, key) {
            return Some(conn);
        }

        let conn = create()?;
        trace!(peer = key, "pool: new connection");
        conns.insert(key.to_string(), conn.clone());
        Some(conn)
    }

    /// Evict idle and closed connections
    pub fn cleanup(&self) {
        cleanup(&self.conns, self.ttl);
    }

    /// Number of pooled connections
    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }

    /// Close every pooled connection and stop the sweep. Idempotent.
    pub fn close(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }

        let drained: Vec<ConnHandle> = self.conns.lock().drain().map(|(_, c)| c).collect();
        for conn in &drained {
            conn.close();
        }
        if !drained.is_empty() {
            debug!("Pool: closed {} connections", drained.len());
        }
    }
}

impl Drop for ConnPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn lookup(conns: &mut HashMap<String, ConnHandle>, key: &str) -> Option<ConnHandle> {
    match conns.get(key) {
        Some(conn) if !conn.is_closed() => Some(conn.clone()),
        Some(_) => {
            conns.remove(key);
            None
        }
        None => None,
    }
}

fn cleanup(conns: &ConnMap, ttl: Duration) {
    let mut conns = conns.lock();
    let before = conns.len();

    conns.retain(|peer, conn| {
        let keep = !conn.is_closed() && conn.idle() <= ttl;
        if !keep {
            trace!(peer = peer.as_str(), "pool: evicting connection");
            conn.close();
        }
        keep
    });

    let removed = before - conns.len();
    if removed > 0 {
        debug!("Pool: cleaned up {} expired connections", removed);
    }
}

async fn sweep_loop(conns: ConnMap, ttl: Duration) {
    let period = ttl.max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        cleanup(&conns, ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udp::conn::ConnHandle;
    use crate::udp::UdpConn;
    use tokio::net::UdpSocket;

    async fn new_conn() -> (UdpConn, ConnHandle) {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let local = socket.local_addr().unwrap();
        UdpConn::new(Arc::downgrade(&socket), local, "127.0.0.1:9".parse().unwrap(), 4)
    }

    #[tokio::test]
    async fn test_get_or_insert_reuses_entry() {
        let pool = ConnPool::new(Duration::from_secs(60));
        let (_conn, handle) = new_conn().await;

        let mut created = 0;
        let first = pool.get_or_insert_with("127.0.0.1:9", || {
            created += 1;
            Some(handle)
        });
        assert!(first.is_some());
        let second = pool.get_or_insert_with("127.0.0.1:9", || {
            created += 1;
            None
        });
        assert!(second.is_some());
        assert_eq!(created, 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_creation_not_registered() {
        let pool = ConnPool::new(Duration::from_secs(60));
        assert!(pool.get_or_insert_with("127.0.0.1:9", || None).is_none());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_closed_entry_removed_on_access() {
        let pool = ConnPool::new(Duration::from_secs(60));
        let (conn, handle) = new_conn().await;
        pool.get_or_insert_with("127.0.0.1:9", || Some(handle));

        drop(conn);
        assert!(pool.get_or_insert_with("127.0.0.1:9", || None).is_none());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_idle_entries_evicted() {
        let pool = ConnPool::new(Duration::from_millis(50));
        let (conn, handle) = new_conn().await;
        pool.get_or_insert_with("127.0.0.1:9", || Some(handle));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(pool.is_empty());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_close_poisons_all() {
        let pool = ConnPool::new(Duration::from_secs(60));
        let (conn, handle) = new_conn().await;
        pool.get_or_insert_with("127.0.0.1:9", || Some(handle));

        pool.close();
        pool.close();
        assert!(pool.is_empty());
        assert!(conn.is_closed());
    }
}
