//! Narrow façade over the excluded consensus/storage collaborator. The core
//! never reaches into the real chain's internals — it only ever sees these
//! three read-only operations.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainStats {
    pub tip_height: u64,
    pub tip_hash: String,
    pub genesis_hash: String,
}

/// The only surface the core is allowed to call on the chain/consensus/P2P
/// layer. Implementations live outside this crate; this trait is the
/// contract, not a storage engine.
pub trait ChainView: Send + Sync {
    fn get_tip(&self) -> Result<Block>;
    fn get_block_by_height(&self, height: u64) -> Result<Block>;
    fn get_stats(&self) -> Result<ChainStats>;
}

/// A minimal in-memory stand-in, useful for tests and for composing the
/// proof/mempool pipeline in isolation from a real chain.
#[derive(Debug, Default)]
pub struct InMemoryChainView {
    blocks: Vec<Block>,
}

impl InMemoryChainView {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }
}

impl ChainView for InMemoryChainView {
    fn get_tip(&self) -> Result<Block> {
        self.blocks
            .last()
            .cloned()
            .ok_or_else(|| crate::error::ShadowyError::State("chain is empty".to_string()))
    }

    fn get_block_by_height(&self, height: u64) -> Result<Block> {
        self.blocks
            .iter()
            .find(|b| b.height == height)
            .cloned()
            .ok_or_else(|| {
                crate::error::ShadowyError::State(format!("no block at height {height}"))
            })
    }

    fn get_stats(&self) -> Result<ChainStats> {
        let tip = self.get_tip()?;
        let genesis = self.get_block_by_height(0)?;
        Ok(ChainStats {
            tip_height: tip.height,
            tip_hash: tip.hash,
            genesis_hash: genesis.hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn block(height: u64, hash: &str) -> Block {
        Block {
            height,
            hash: hash.to_string(),
            previous_hash: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn get_tip_returns_last_pushed_block() {
        let mut chain = InMemoryChainView::default();
        chain.push(block(0, "genesis"));
        chain.push(block(1, "second"));
        assert_eq!(chain.get_tip().unwrap().hash, "second");
    }

    #[test]
    fn get_stats_reports_genesis_and_tip() {
        let mut chain = InMemoryChainView::default();
        chain.push(block(0, "genesis"));
        chain.push(block(1, "second"));
        let stats = chain.get_stats().unwrap();
        assert_eq!(stats.tip_height, 1);
        assert_eq!(stats.genesis_hash, "genesis");
    }

    #[test]
    fn missing_height_is_a_state_error() {
        let chain = InMemoryChainView::default();
        assert!(chain.get_block_by_height(5).is_err());
    }
}
