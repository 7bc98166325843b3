//! Sink-side topology table
//!
//! Maps every source that reported to the sink onto the parent it last
//! announced. The table is allocated once at a fixed capacity; a full table
//! refuses unseen sources rather than evicting known ones.

use serde::{Deserialize, Serialize};

use treecollect_protocol::NodeAddr;

use crate::error::{Result, RoutingError};

/// Last known parent of one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub source: NodeAddr,
    pub parent: NodeAddr,
    /// Seqn of the report that last refreshed this entry
    pub seqn: u16,
    /// Number of reports merged into this entry
    pub refreshes: u32,
}

/// Effect of [`RoutingTable::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New source stored in a free slot
    Inserted,
    /// Known source refreshed in place
    Updated { previous_parent: NodeAddr },
}

/// Fixed-capacity source → parent table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    capacity: usize,
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    /// Create an empty table with room for `capacity` sources
    pub fn new(capacity: usize) -> Self {
        RoutingTable {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    pub fn get(&self, source: &NodeAddr) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| &e.source == source)
    }

    pub fn parent_of(&self, source: &NodeAddr) -> Option<NodeAddr> {
        self.get(source).map(|e| e.parent)
    }

    /// Record that `source` now uses `parent`
    ///
    /// An existing entry is overwritten in place. An unknown source takes the
    /// first free slot, or is refused with [`RoutingError::RoutingTableFull`].
    pub fn upsert(&mut self, source: NodeAddr, parent: NodeAddr, seqn: u16) -> Result<Upsert> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.source == source) {
            let previous_parent = entry.parent;
            entry.parent = parent;
            entry.seqn = seqn;
            entry.refreshes = entry.refreshes.saturating_add(1);
            return Ok(Upsert::Updated { previous_parent });
        }

        if self.is_full() {
            return Err(RoutingError::RoutingTableFull {
                capacity: self.capacity,
            });
        }

        self.entries.push(RouteEntry {
            source,
            parent,
            seqn,
            refreshes: 1,
        });
        Ok(Upsert::Inserted)
    }

    /// Sources whose last report named `parent`
    pub fn children_of(&self, parent: &NodeAddr) -> Vec<NodeAddr> {
        self.entries
            .iter()
            .filter(|e| &e.parent == parent)
            .map(|e| e.source)
            .collect()
    }

    /// Reconstruct the route from `source` up to `sink`, both ends included
    ///
    /// Returns `None` when the chain breaks on an unknown node or loops, which
    /// happens while reports about a re-parented subtree are still in flight.
    pub fn path_to_sink(&self, source: NodeAddr, sink: NodeAddr) -> Option<Vec<NodeAddr>> {
        let mut path = vec![source];
        let mut current = source;

        while current != sink {
            current = self.parent_of(&current)?;
            if path.contains(&current) {
                return None;
            }
            path.push(current);
        }

        Some(path)
    }

    /// Hop distance of `source` from `sink` according to the table
    pub fn depth_of(&self, source: NodeAddr, sink: NodeAddr) -> Option<usize> {
        self.path_to_sink(source, sink).map(|p| p.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: u8) -> NodeAddr {
        NodeAddr::from_id(id)
    }

    #[test]
    fn test_empty_table() {
        let table = RoutingTable::new(4);
        assert!(table.is_empty());
        assert!(!table.is_full());
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.parent_of(&addr(2)), None);
    }

    #[test]
    fn test_insert() {
        let mut table = RoutingTable::new(4);
        assert_eq!(table.upsert(addr(2), addr(1), 0).unwrap(), Upsert::Inserted);
        assert_eq!(table.len(), 1);
        assert_eq!(table.parent_of(&addr(2)), Some(addr(1)));
    }

    #[test]
    fn test_update_in_place() {
        let mut table = RoutingTable::new(4);
        table.upsert(addr(2), addr(1), 0).unwrap();
        table.upsert(addr(3), addr(2), 0).unwrap();

        let outcome = table.upsert(addr(3), addr(1), 1).unwrap();
        assert_eq!(
            outcome,
            Upsert::Updated {
                previous_parent: addr(2)
            }
        );
        assert_eq!(table.len(), 2);

        let entry = table.get(&addr(3)).unwrap();
        assert_eq!(entry.parent, addr(1));
        assert_eq!(entry.seqn, 1);
        assert_eq!(entry.refreshes, 2);
    }

    #[test]
    fn test_full_table_refuses_unknown_sources() {
        let mut table = RoutingTable::new(2);
        table.upsert(addr(2), addr(1), 0).unwrap();
        table.upsert(addr(3), addr(1), 0).unwrap();
        assert!(table.is_full());

        let err = table.upsert(addr(4), addr(1), 0).unwrap_err();
        assert_eq!(err, RoutingError::RoutingTableFull { capacity: 2 });
        assert_eq!(table.len(), 2);
        assert_eq!(table.parent_of(&addr(4)), None);

        // Known sources can still be refreshed
        assert!(table.upsert(addr(3), addr(2), 1).is_ok());
        assert_eq!(table.parent_of(&addr(3)), Some(addr(2)));
    }

    #[test]
    fn test_keys_stay_distinct() {
        let mut table = RoutingTable::new(8);
        for round in 0..5u16 {
            for id in 2..6 {
                let _ = table.upsert(addr(id), addr(id - 1), round);
            }
        }

        assert_eq!(table.len(), 4);
        let mut sources: Vec<_> = table.iter().map(|e| e.source).collect();
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), table.len());
    }

    #[test]
    fn test_slot_order_preserved() {
        let mut table = RoutingTable::new(4);
        table.upsert(addr(5), addr(1), 0).unwrap();
        table.upsert(addr(2), addr(1), 0).unwrap();
        table.upsert(addr(5), addr(2), 1).unwrap();

        let order: Vec<_> = table.iter().map(|e| e.source).collect();
        assert_eq!(order, vec![addr(5), addr(2)]);
    }

    #[test]
    fn test_children_of() {
        let mut table = RoutingTable::new(8);
        table.upsert(addr(2), addr(1), 0).unwrap();
        table.upsert(addr(3), addr(1), 0).unwrap();
        table.upsert(addr(4), addr(2), 0).unwrap();

        assert_eq!(table.children_of(&addr(1)), vec![addr(2), addr(3)]);
        assert_eq!(table.children_of(&addr(2)), vec![addr(4)]);
        assert!(table.children_of(&addr(4)).is_empty());
    }

    #[test]
    fn test_path_to_sink() {
        let sink = addr(1);
        let mut table = RoutingTable::new(8);
        table.upsert(addr(2), sink, 0).unwrap();
        table.upsert(addr(3), addr(2), 0).unwrap();
        table.upsert(addr(4), addr(3), 0).unwrap();

        assert_eq!(
            table.path_to_sink(addr(4), sink),
            Some(vec![addr(4), addr(3), addr(2), sink])
        );
        assert_eq!(table.depth_of(addr(4), sink), Some(3));
        assert_eq!(table.depth_of(sink, sink), Some(0));
    }

    #[test]
    fn test_path_to_sink_broken_chain() {
        let sink = addr(1);
        let mut table = RoutingTable::new(8);
        table.upsert(addr(4), addr(3), 0).unwrap();

        assert_eq!(table.path_to_sink(addr(4), sink), None);
        assert_eq!(table.path_to_sink(addr(9), sink), None);
    }

    #[test]
    fn test_path_to_sink_loop() {
        let sink = addr(1);
        let mut table = RoutingTable::new(8);
        table.upsert(addr(2), addr(3), 0).unwrap();
        table.upsert(addr(3), addr(2), 0).unwrap();

        assert_eq!(table.path_to_sink(addr(2), sink), None);
    }
}
