use dashmap::DashMap;

use crate::connection::Connection;

/// Live server-side connections, keyed by connection id.
///
/// Used only to enumerate connections for shutdown and to count them;
/// never for routing.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: DashMap<u64, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: Connection) {
        self.conns.insert(conn.id(), conn);
    }

    pub fn remove(&self, id: u64) -> Option<Connection> {
        self.conns.remove(&id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Connection> {
        self.conns.iter().map(|r| r.value().clone()).collect()
    }
}
