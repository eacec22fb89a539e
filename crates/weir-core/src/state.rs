//! Engine state and its change journal.
//!
//! [`FarmState`] holds every persisted record: parameters, the append-only
//! pool list, stake records, locks and the lock-pool aggregates. Mutable
//! accessors record the touched key in a [`Journal`] so a [`FarmStore`]
//! can persist exactly what one transaction changed.
//!
//! [`MemoryFarmStore`] keeps committed state in memory and is suitable for
//! testing; the node uses RocksDB (weir-node).

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::error::{FarmError, WeirError};
use crate::traits::FarmStore;
use crate::types::{AccountId, Lock, Params, Pool, PoolId, UnitId, UserStake};

/// Keys written by one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Journal {
    /// Parameters changed.
    pub params: bool,
    /// Lock-pool aggregates (`total_locked`, `locked_users`) changed.
    pub totals: bool,
    /// Pools created or modified.
    pub pools: BTreeSet<PoolId>,
    /// Stake records created or modified.
    pub stakes: BTreeSet<(PoolId, AccountId)>,
    /// Locks created or modified.
    pub locks: BTreeSet<AccountId>,
}

impl Journal {
    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        !self.params
            && !self.totals
            && self.pools.is_empty()
            && self.stakes.is_empty()
            && self.locks.is_empty()
    }

    /// Mark every record in `state` as written.
    pub fn everything(state: &FarmState) -> Self {
        Self {
            params: true,
            totals: true,
            pools: (0..state.pools.len() as PoolId).collect(),
            stakes: state.stakes.keys().copied().collect(),
            locks: state.locks.keys().copied().collect(),
        }
    }
}

/// The complete engine state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FarmState {
    params: Params,
    pools: Vec<Pool>,
    stakes: HashMap<(PoolId, AccountId), UserStake>,
    locks: HashMap<AccountId, Lock>,
    /// Sum of every lock's `locked_amount`.
    total_locked: u128,
    /// Number of accounts with a non-empty lock.
    locked_users: u64,
    journal: Journal,
}

impl FarmState {
    /// Fresh state containing only the lock pool.
    ///
    /// The lock pool starts accruing at `max(now, params.reward_start_time)`.
    pub fn genesis(params: Params, reward_unit: UnitId, now: u64) -> Self {
        let start = now.max(params.reward_start_time);
        let mut state = Self {
            params,
            pools: vec![Pool::lock_pool(reward_unit, start)],
            stakes: HashMap::new(),
            locks: HashMap::new(),
            total_locked: 0,
            locked_users: 0,
            journal: Journal::default(),
        };
        state.journal = Journal::everything(&state);
        state
    }

    /// Reassemble state from persisted records.
    pub fn from_parts(
        params: Params,
        pools: Vec<Pool>,
        stakes: HashMap<(PoolId, AccountId), UserStake>,
        locks: HashMap<AccountId, Lock>,
        total_locked: u128,
        locked_users: u64,
    ) -> Self {
        Self {
            params,
            pools,
            stakes,
            locks,
            total_locked,
            locked_users,
            journal: Journal::default(),
        }
    }

    // --- Read access ---

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Look up a pool.
    ///
    /// # Errors
    ///
    /// [`FarmError::InvalidPool`] if `id` is out of range.
    pub fn pool(&self, id: PoolId) -> Result<&Pool, FarmError> {
        self.pools
            .get(id as usize)
            .ok_or(FarmError::InvalidPool(id))
    }

    /// Stake record for `(pool, user)`, zeroed if absent.
    pub fn stake(&self, pool: PoolId, user: &AccountId) -> UserStake {
        self.stakes.get(&(pool, *user)).copied().unwrap_or_default()
    }

    pub fn stakes(&self) -> &HashMap<(PoolId, AccountId), UserStake> {
        &self.stakes
    }

    /// Lock held by `user`, zeroed if absent.
    pub fn lock(&self, user: &AccountId) -> Lock {
        self.locks.get(user).copied().unwrap_or_default()
    }

    pub fn locks(&self) -> &HashMap<AccountId, Lock> {
        &self.locks
    }

    pub fn total_locked(&self) -> u128 {
        self.total_locked
    }

    pub fn locked_users(&self) -> u64 {
        self.locked_users
    }

    /// Whether `unit` backs any pool.
    pub fn has_unit(&self, unit: &UnitId) -> bool {
        self.pools.iter().any(|p| &p.stake_unit == unit)
    }

    /// Sum of weights of every pool except the lock pool.
    pub fn other_weights(&self) -> u64 {
        self.pools.iter().skip(1).map(|p| p.weight).sum()
    }

    /// Whether `params.total_weight` equals the sum of pool weights.
    pub fn weights_consistent(&self) -> bool {
        let sum: u64 = self.pools.iter().map(|p| p.weight).sum();
        sum == self.params.total_weight
    }

    /// Changes recorded since the last [`take_journal`](Self::take_journal).
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // --- Journaled write access ---

    pub fn params_mut(&mut self) -> &mut Params {
        self.journal.params = true;
        &mut self.params
    }

    /// Mutable pool.
    ///
    /// # Errors
    ///
    /// [`FarmError::InvalidPool`] if `id` is out of range.
    pub fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool, FarmError> {
        let pool = self
            .pools
            .get_mut(id as usize)
            .ok_or(FarmError::InvalidPool(id))?;
        self.journal.pools.insert(id);
        Ok(pool)
    }

    /// Append a pool and return its index.
    pub fn push_pool(&mut self, pool: Pool) -> PoolId {
        let id = self.pools.len() as PoolId;
        self.pools.push(pool);
        self.journal.pools.insert(id);
        id
    }

    /// Mutable stake record, created zeroed on first access.
    pub fn stake_mut(&mut self, pool: PoolId, user: &AccountId) -> &mut UserStake {
        self.journal.stakes.insert((pool, *user));
        self.stakes.entry((pool, *user)).or_default()
    }

    /// Mutable lock, created zeroed on first access.
    pub fn lock_mut(&mut self, user: &AccountId) -> &mut Lock {
        self.journal.locks.insert(*user);
        self.locks.entry(*user).or_default()
    }

    /// Set the lock-pool aggregates.
    pub fn set_totals(&mut self, total_locked: u128, locked_users: u64) {
        self.journal.totals = true;
        self.total_locked = total_locked;
        self.locked_users = locked_users;
    }

    /// Drain the journal, leaving it empty.
    ///
    /// Journaled locks that ended up empty are dropped, matching what a store
    /// keeps after deleting them. Stake records stay, zeroed if need be.
    pub fn take_journal(&mut self) -> Journal {
        let journal = std::mem::take(&mut self.journal);
        for user in &journal.locks {
            if self.locks.get(user).is_some_and(|lock| lock.locked_amount == 0) {
                self.locks.remove(user);
            }
        }
        journal
    }
}

/// In-memory [`FarmStore`] for testing.
///
/// Keeps a copy of the last committed state. Not suitable for production use
/// (no crash recovery).
#[derive(Debug, Default)]
pub struct MemoryFarmStore {
    committed: RwLock<Option<FarmState>>,
    commits: RwLock<u64>,
}

impl MemoryFarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        *self.commits.read()
    }
}

impl FarmStore for MemoryFarmStore {
    fn load(&self) -> Result<Option<FarmState>, WeirError> {
        Ok(self.committed.read().clone())
    }

    fn commit(&self, state: &FarmState, journal: &Journal) -> Result<(), WeirError> {
        if journal.is_empty() {
            return Ok(());
        }
        let mut snapshot = state.clone();
        snapshot.journal = Journal::default();
        *self.committed.write() = Some(snapshot);
        *self.commits.write() += 1;
        Ok(())
    }
}
