// ============================================================================
// DocumentDb — Embedded canonical store (redb)
// ============================================================================
// Holds the authoritative message and memory-node records, bincode-encoded
// and keyed by UUID. Vector and full-text indexes are derived from this.
// Per-user listings are linear scans; tenant cardinality is the bound.
// ============================================================================

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use redb::{Database, TableDefinition};
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversation::types::Message;
use crate::error::StoreError;
use crate::memory::types::MemoryNode;

const MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("messages");
const MEMORY_NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("memory_nodes");

/// Embedded database for canonical documents
pub struct DocumentDb {
    db: Database,
    path: PathBuf,
}

impl DocumentDb {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::new("open db", anyhow!("create {}: {}", parent.display(), e)))?;
        }

        info!("Opening document db at: {}", path.display());

        let db = Database::create(&path).map_err(|e| StoreError::new("open db", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db.begin_write().map_err(|e| StoreError::new("open db", e))?;
        {
            write_txn
                .open_table(MESSAGES)
                .map_err(|e| StoreError::new("open db", e))?;
            write_txn
                .open_table(MEMORY_NODES)
                .map_err(|e| StoreError::new("open db", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::new("open db", e))?;

        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    pub fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let key = message.id.to_string();
        let value =
            bincode::serialize(message).map_err(|e| StoreError::new("put message", e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::new("put message", e))?;
        {
            let mut table = write_txn
                .open_table(MESSAGES)
                .map_err(|e| StoreError::new("put message", e))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(|e| StoreError::new("put message", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::new("put message", e))?;

        debug!("Stored message: {}", message.id);
        Ok(())
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let key = id.to_string();

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::new("get message", e))?;
        let table = read_txn
            .open_table(MESSAGES)
            .map_err(|e| StoreError::new("get message", e))?;

        match table
            .get(key.as_str())
            .map_err(|e| StoreError::new("get message", e))?
        {
            Some(value) => {
                let message = bincode::deserialize(value.value())
                    .map_err(|e| StoreError::new("get message", e))?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    /// Messages for a user, optionally restricted to one conversation.
    /// Unordered; callers sort by timestamp.
    pub fn list_messages(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<Vec<Message>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::new("list messages", e))?;
        let table = read_txn
            .open_table(MESSAGES)
            .map_err(|e| StoreError::new("list messages", e))?;

        let mut results = Vec::new();
        let iter = table
            .range::<&str>(..)
            .map_err(|e| StoreError::new("list messages", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| StoreError::new("list messages", e))?;
            let message: Message = bincode::deserialize(value.value())
                .map_err(|e| StoreError::new("list messages", e))?;

            if message.user_id != user_id {
                continue;
            }
            if let Some(conv) = conversation_id {
                if message.conversation_id != conv {
                    continue;
                }
            }
            results.push(message);
        }
        Ok(results)
    }

    // ========================================================================
    // Memory Node Operations
    // ========================================================================

    pub fn put_node(&self, node: &MemoryNode) -> Result<(), StoreError> {
        let key = node.id.to_string();
        let value = bincode::serialize(node).map_err(|e| StoreError::new("put node", e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::new("put node", e))?;
        {
            let mut table = write_txn
                .open_table(MEMORY_NODES)
                .map_err(|e| StoreError::new("put node", e))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(|e| StoreError::new("put node", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::new("put node", e))?;

        debug!("Stored memory node: {}", node.id);
        Ok(())
    }

    pub fn get_node(&self, id: Uuid) -> Result<Option<MemoryNode>, StoreError> {
        let key = id.to_string();

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::new("get node", e))?;
        let table = read_txn
            .open_table(MEMORY_NODES)
            .map_err(|e| StoreError::new("get node", e))?;

        match table
            .get(key.as_str())
            .map_err(|e| StoreError::new("get node", e))?
        {
            Some(value) => {
                let node = bincode::deserialize(value.value())
                    .map_err(|e| StoreError::new("get node", e))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    pub fn delete_node(&self, id: Uuid) -> Result<bool, StoreError> {
        let key = id.to_string();

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::new("delete node", e))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(MEMORY_NODES)
                .map_err(|e| StoreError::new("delete node", e))?;
            removed = table
                .remove(key.as_str())
                .map_err(|e| StoreError::new("delete node", e))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::new("delete node", e))?;

        if removed {
            debug!("Deleted memory node: {}", id);
        }
        Ok(removed)
    }

    pub fn list_nodes(&self, user_id: &str) -> Result<Vec<MemoryNode>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::new("list nodes", e))?;
        let table = read_txn
            .open_table(MEMORY_NODES)
            .map_err(|e| StoreError::new("list nodes", e))?;

        let mut results = Vec::new();
        let iter = table
            .range::<&str>(..)
            .map_err(|e| StoreError::new("list nodes", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| StoreError::new("list nodes", e))?;
            let node: MemoryNode = bincode::deserialize(value.value())
                .map_err(|e| StoreError::new("list nodes", e))?;
            if node.user_id == user_id {
                results.push(node);
            }
        }
        Ok(results)
    }

    pub fn count_nodes(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.list_nodes(user_id)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::MessageKind;

    fn temp_db() -> DocumentDb {
        let dir = std::env::temp_dir().join(format!("memtree-test-{}", Uuid::new_v4()));
        DocumentDb::open(dir.join("docs.redb")).unwrap()
    }

    #[test]
    fn message_round_trip() {
        let db = temp_db();
        let message = Message {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            conversation_id: "c1".into(),
            kind: MessageKind::Human,
            text: "I moved to Lisbon last spring".into(),
            timestamp: 1_700_000_000,
            embedding: vec![0.1, 0.2, 0.3],
        };

        db.put_message(&message).unwrap();
        let loaded = db.get_message(message.id).unwrap().unwrap();
        assert_eq!(loaded.text, message.text);
        assert_eq!(loaded.embedding, message.embedding);
        assert!(db.get_message(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn node_listing_is_tenant_scoped() {
        let db = temp_db();
        for user in ["alice", "alice", "bob"] {
            let node = MemoryNode::new(user.into(), "content".into(), "summary".into(), 0.5);
            db.put_node(&node).unwrap();
        }

        assert_eq!(db.count_nodes("alice").unwrap(), 2);
        assert_eq!(db.count_nodes("bob").unwrap(), 1);
        assert_eq!(db.count_nodes("carol").unwrap(), 0);
    }

    #[test]
    fn node_delete_reports_presence() {
        let db = temp_db();
        let node = MemoryNode::new("alice".into(), "c".into(), "s".into(), 0.5);
        db.put_node(&node).unwrap();

        assert!(db.delete_node(node.id).unwrap());
        assert!(!db.delete_node(node.id).unwrap());
    }
}
