//! RocksDB-backed persistent farm state.
//!
//! Implements [`FarmStore`] using column families for pools, stake records,
//! locks and metadata. Each commit writes exactly the records named in the
//! transaction's [`Journal`] as one atomic [`WriteBatch`].

use std::collections::HashMap;
use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

use weir_core::error::WeirError;
use weir_core::state::{FarmState, Journal};
use weir_core::traits::FarmStore;
use weir_core::types::{AccountId, Lock, Params, Pool, PoolId, UserStake};

// --- Column family names ---

const CF_POOLS: &str = "pools";
const CF_STAKES: &str = "stakes";
const CF_LOCKS: &str = "locks";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_POOLS, CF_STAKES, CF_LOCKS, CF_METADATA];

// --- Metadata keys ---

const META_PARAMS: &[u8] = b"params";
const META_TOTAL_LOCKED: &[u8] = b"total_locked";
const META_LOCKED_USERS: &[u8] = b"locked_users";

fn storage_err(e: impl std::fmt::Display) -> WeirError {
    WeirError::Storage(e.to_string())
}

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, WeirError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(storage_err)
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, WeirError> {
    let (value, _) =
        bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(storage_err)?;
    Ok(value)
}

/// RocksDB-backed [`FarmStore`].
pub struct RocksFarmStore {
    db: DB,
}

impl RocksFarmStore {
    /// Open or create a database at `path`, creating missing column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WeirError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(storage_err)?;
        tracing::debug!(path = %path.as_ref().display(), "farm store opened");
        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), WeirError> {
        self.db.flush().map_err(storage_err)
    }

    /// Whether no farm has been committed yet.
    pub fn is_empty(&self) -> Result<bool, WeirError> {
        let cf = self.cf_handle(CF_METADATA)?;
        Ok(self.db.get_cf(cf, META_PARAMS).map_err(storage_err)?.is_none())
    }

    // --- Internal helpers ---

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, WeirError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| WeirError::Storage(format!("missing column family: {name}")))
    }

    fn get_meta<T: bincode::Decode<()>>(&self, key: &[u8]) -> Result<Option<T>, WeirError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pool key: index as big-endian bytes for ordered iteration.
    fn pool_key(id: PoolId) -> [u8; 4] {
        id.to_be_bytes()
    }

    /// Stake key: pool(BE) || account.
    fn stake_key(pool: PoolId, user: &AccountId) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[0..4].copy_from_slice(&pool.to_be_bytes());
        key[4..36].copy_from_slice(user.as_bytes());
        key
    }

    fn decode_stake_key(key: &[u8]) -> Result<(PoolId, AccountId), WeirError> {
        if key.len() != 36 {
            return Err(WeirError::Storage("invalid stake key length".into()));
        }
        let mut pool = [0u8; 4];
        pool.copy_from_slice(&key[0..4]);
        let mut user = [0u8; 32];
        user.copy_from_slice(&key[4..36]);
        Ok((PoolId::from_be_bytes(pool), AccountId(user)))
    }

    fn decode_account(key: &[u8]) -> Result<AccountId, WeirError> {
        let bytes: [u8; 32] = key
            .try_into()
            .map_err(|_| WeirError::Storage("invalid lock key length".into()))?;
        Ok(AccountId(bytes))
    }

    fn load_pools(&self) -> Result<Vec<Pool>, WeirError> {
        let cf = self.cf_handle(CF_POOLS)?;
        let mut pools = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(storage_err)?;
            let expected = Self::pool_key(pools.len() as PoolId);
            if key[..] != expected[..] {
                return Err(WeirError::Storage(format!(
                    "pool list has a gap at index {}",
                    pools.len()
                )));
            }
            pools.push(decode(&value)?);
        }
        Ok(pools)
    }

    fn load_stakes(&self) -> Result<HashMap<(PoolId, AccountId), UserStake>, WeirError> {
        let cf = self.cf_handle(CF_STAKES)?;
        let mut stakes = HashMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(storage_err)?;
            stakes.insert(Self::decode_stake_key(&key)?, decode(&value)?);
        }
        Ok(stakes)
    }

    fn load_locks(&self) -> Result<HashMap<AccountId, Lock>, WeirError> {
        let cf = self.cf_handle(CF_LOCKS)?;
        let mut locks = HashMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(storage_err)?;
            locks.insert(Self::decode_account(&key)?, decode(&value)?);
        }
        Ok(locks)
    }
}

impl FarmStore for RocksFarmStore {
    fn load(&self) -> Result<Option<FarmState>, WeirError> {
        let Some(params) = self.get_meta::<Params>(META_PARAMS)? else {
            return Ok(None);
        };
        let total_locked = self.get_meta::<u128>(META_TOTAL_LOCKED)?.unwrap_or(0);
        let locked_users = self.get_meta::<u64>(META_LOCKED_USERS)?.unwrap_or(0);
        let state = FarmState::from_parts(
            params,
            self.load_pools()?,
            self.load_stakes()?,
            self.load_locks()?,
            total_locked,
            locked_users,
        );
        tracing::debug!(
            pools = state.pool_count(),
            stakes = state.stakes().len(),
            locks = state.locks().len(),
            "farm state loaded"
        );
        Ok(Some(state))
    }

    fn commit(&self, state: &FarmState, journal: &Journal) -> Result<(), WeirError> {
        if journal.is_empty() {
            return Ok(());
        }
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let cf_pools = self.cf_handle(CF_POOLS)?;
        let cf_stakes = self.cf_handle(CF_STAKES)?;
        let cf_locks = self.cf_handle(CF_LOCKS)?;
        let mut batch = WriteBatch::default();

        if journal.params {
            batch.put_cf(cf_meta, META_PARAMS, encode(state.params())?);
        }
        if journal.totals {
            batch.put_cf(cf_meta, META_TOTAL_LOCKED, encode(&state.total_locked())?);
            batch.put_cf(cf_meta, META_LOCKED_USERS, encode(&state.locked_users())?);
        }
        for &id in &journal.pools {
            batch.put_cf(cf_pools, Self::pool_key(id), encode(state.pool(id)?)?);
        }
        for (pool, user) in &journal.stakes {
            let key = Self::stake_key(*pool, user);
            batch.put_cf(cf_stakes, key, encode(&state.stake(*pool, user))?);
        }
        for user in &journal.locks {
            let lock = state.lock(user);
            if lock.locked_amount == 0 {
                batch.delete_cf(cf_locks, user.as_bytes());
            } else {
                batch.put_cf(cf_locks, user.as_bytes(), encode(&lock)?);
            }
        }

        self.db.write(batch).map_err(storage_err)?;
        tracing::trace!(
            pools = journal.pools.len(),
            stakes = journal.stakes.len(),
            locks = journal.locks.len(),
            "farm state committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::types::UnitId;

    fn genesis() -> FarmState {
        FarmState::genesis(Params::genesis(5, 0), UnitId::from_symbol("WEIR"), 100)
    }

    fn open(dir: &tempfile::TempDir) -> RocksFarmStore {
        RocksFarmStore::open(dir.path().join("farm")).unwrap()
    }

    #[test]
    fn empty_store_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.is_empty().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn genesis_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let mut state = genesis();
        let journal = state.take_journal();
        store.commit(&state, &journal).unwrap();
        assert!(!store.is_empty().unwrap());
        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn commit_writes_only_journaled_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let mut state = genesis();
        let journal = state.take_journal();
        store.commit(&state, &journal).unwrap();

        let user = AccountId::from_name("alice");
        state.stake_mut(0, &user).amount = 9;
        // A journal naming only the stake; the params edit below is left out.
        let journal = Journal {
            stakes: [(0, user)].into_iter().collect(),
            ..Journal::default()
        };
        state.take_journal();
        state.params_mut().emission_rate = 77;
        store.commit(&state, &journal).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.stake(0, &user).amount, 9);
        assert_eq!(loaded.params().emission_rate, 5);
    }

    #[test]
    fn emptied_lock_deleted_and_stake_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let mut state = genesis();
        let user = AccountId::from_name("alice");
        state.lock_mut(&user).locked_amount = 10;
        state.stake_mut(0, &user).amount = 10;
        state.set_totals(10, 1);
        let journal = state.take_journal();
        store.commit(&state, &journal).unwrap();
        assert_eq!(store.load().unwrap().unwrap().locks().len(), 1);

        *state.lock_mut(&user) = Lock::default();
        *state.stake_mut(0, &user) = UserStake::default();
        state.set_totals(0, 0);
        let journal = state.take_journal();
        store.commit(&state, &journal).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.locks().is_empty());
        assert_eq!(loaded.stakes().get(&(0, user)), Some(&UserStake::default()));
        assert_eq!(loaded.total_locked(), 0);
        assert_eq!(loaded, state);
    }

    #[test]
    fn persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = genesis();
        for (i, symbol) in ["A", "B", "C"].iter().enumerate() {
            state.push_pool(Pool::new(UnitId::from_symbol(symbol), 10 * i as u64 + 1, 100));
        }
        let user = AccountId::from_name("bob");
        state.stake_mut(2, &user).amount = 1_000;
        state.stake_mut(2, &user).reward_debt = u128::MAX / 3;
        state.lock_mut(&user).locked_amount = 42;
        state.lock_mut(&user).unlock_time = 1_000_000;
        state.set_totals(42, 1);
        {
            let store = open(&dir);
            let journal = state.take_journal();
            store.commit(&state, &journal).unwrap();
            store.flush().unwrap();
        }

        let store = open(&dir);
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.pool_count(), 4);
        assert_eq!(loaded.stake(2, &user).reward_debt, u128::MAX / 3);
    }

    #[test]
    fn stake_key_round_trips() {
        let user = AccountId::from_name("carol");
        let key = RocksFarmStore::stake_key(7, &user);
        assert_eq!(RocksFarmStore::decode_stake_key(&key).unwrap(), (7, user));
        assert!(RocksFarmStore::decode_stake_key(&key[..10]).is_err());
    }
}
