use std::time::Instant;

use argus_common::{ether::provider::ChainSource, Error};
use tracing::{debug, info};

use crate::ContractDatabase;

/// Number of most recent blocks scanned by one sync.
pub const SYNC_BLOCKS: u64 = 256;

/// What a [`sync`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Blocks whose receipts were scanned.
    pub blocks: u64,
    /// Contracts added to the database.
    pub added: usize,
    /// Contracts skipped because they hold no ether.
    pub skipped: usize,
}

/// Scan up to `blocks` blocks back from the chain head for newly created
/// contracts and record them in `database`. Blocks at or below the last synced
/// block are not scanned again. Unless `sync_all` is set, contracts with a zero
/// balance are skipped.
pub async fn sync(
    source: &dyn ChainSource,
    database: &mut ContractDatabase,
    blocks: u64,
    sync_all: bool,
) -> Result<SyncReport, Error> {
    let start_time = Instant::now();
    let latest = source.latest_block_number().await?;

    let mut lowest = latest.saturating_sub(blocks.saturating_sub(1));
    if let Some(last) = database.last_block {
        lowest = lowest.max(last.saturating_add(1));
    }

    let mut report = SyncReport::default();
    if lowest > latest {
        info!("contract database is already synced to block {}", latest);
        return Ok(report);
    }

    info!("syncing blocks {} to {}", lowest, latest);
    for number in (lowest..=latest).rev() {
        for address in source.created_contracts(number).await? {
            let code = source.get_code(address).await?;
            if code.is_empty() {
                continue;
            }

            let balance = source.get_balance(address).await?;
            if balance.is_zero() && !sync_all {
                report.skipped += 1;
                continue;
            }

            database.insert(address, code.to_vec(), balance);
            report.added += 1;
        }

        report.blocks += 1;
        if report.blocks % 32 == 0 {
            debug!("scanned {} blocks, {} contracts added", report.blocks, report.added);
        }
    }

    database.last_block = Some(latest);
    info!(
        "synced {} blocks: {} contracts added, {} skipped with zero balance",
        report.blocks, report.added, report.skipped
    );
    debug!("sync took {:?}", start_time.elapsed());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, U256};
    use argus_common::ether::provider::{BlockTag, NodeConnector};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A chain at block 10 where block `n` created the contract `0xnn..nn`.
    /// Contracts at even blocks hold one wei.
    #[derive(Debug, Default)]
    struct MockChain {
        receipt_calls: AtomicUsize,
    }

    #[async_trait]
    impl NodeConnector for MockChain {
        async fn get_code(&self, address: Address) -> Result<Bytes, Error> {
            if address == Address::repeat_byte(3) {
                return Ok(Bytes::new());
            }
            Ok(Bytes::from(vec![0x60, 0x80]))
        }

        async fn get_storage_at(&self, _: Address, _: U256, _: BlockTag) -> Result<U256, Error> {
            Ok(U256::ZERO)
        }
    }

    #[async_trait]
    impl ChainSource for MockChain {
        async fn latest_block_number(&self) -> Result<u64, Error> {
            Ok(10)
        }

        async fn created_contracts(&self, number: u64) -> Result<Vec<Address>, Error> {
            self.receipt_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Address::repeat_byte(number as u8)])
        }

        async fn get_balance(&self, address: Address) -> Result<U256, Error> {
            Ok(U256::from(u8::from(address.0[0] % 2 == 0)))
        }
    }

    #[tokio::test]
    async fn test_sync_skips_empty_accounts() {
        let chain = MockChain::default();
        let mut database = ContractDatabase::default();

        let report = sync(&chain, &mut database, 4, false).await.expect("sync succeeds");
        assert_eq!(report, SyncReport { blocks: 4, added: 2, skipped: 2 });
        assert_eq!(database.last_block, Some(10));
        assert!(database.contracts.contains_key(&Address::repeat_byte(10)));
        assert!(database.contracts.contains_key(&Address::repeat_byte(8)));
    }

    #[tokio::test]
    async fn test_sync_all() {
        let chain = MockChain::default();
        let mut database = ContractDatabase::default();

        // block 3's contract has no code
        let report = sync(&chain, &mut database, 100, true).await.expect("sync succeeds");
        assert_eq!(report.blocks, 11);
        assert_eq!(report.added, 10);
        assert!(!database.contracts.contains_key(&Address::repeat_byte(3)));
    }

    #[tokio::test]
    async fn test_sync_resumes() {
        let chain = MockChain::default();
        let mut database = ContractDatabase { last_block: Some(9), ..Default::default() };

        let report = sync(&chain, &mut database, 100, true).await.expect("sync succeeds");
        assert_eq!(report.blocks, 1);
        assert_eq!(chain.receipt_calls.load(Ordering::SeqCst), 1);

        let report = sync(&chain, &mut database, 100, true).await.expect("sync succeeds");
        assert_eq!(report, SyncReport::default());
    }
}
