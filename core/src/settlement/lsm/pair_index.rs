//! Incremental pair index for bilateral LSM offsetting (§4.10).
//!
//! Groups Queue 2 transactions by unordered agent pair once per pass so
//! `bilateral_offset` doesn't rescan the whole queue while popping pairs in
//! priority order.

use crate::models::state::SimulationState;
use std::collections::BTreeMap;

/// A ready-to-offset agent pair, canonically ordered `agent_a < agent_b`
/// lexicographically so the same unordered pair always yields the same key
/// regardless of which side happened to be the sender on a given leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairKey {
    agent_a: String,
    agent_b: String,
    liquidity_release: i64,
}

impl PairKey {
    pub fn agent_a(&self) -> &str {
        &self.agent_a
    }

    pub fn agent_b(&self) -> &str {
        &self.agent_b
    }

    /// `min(sum_a_to_b, sum_b_to_a)` - the liquidity this pair's offset
    /// would release. Used to prioritize which ready pair to settle first.
    pub fn liquidity_release(&self) -> i64 {
        self.liquidity_release
    }
}

struct PairEntry {
    txs_ab: Vec<String>,
    txs_ba: Vec<String>,
    sum_ab: i64,
    sum_ba: i64,
}

struct CurrentPair {
    agent_a: String,
    agent_b: String,
    txs_ab: Vec<String>,
    txs_ba: Vec<String>,
    sum_ab: i64,
    sum_ba: i64,
}

/// Queue-2 transactions grouped by unordered agent pair, built once per
/// bilateral offset pass.
pub struct PairIndex {
    pairs: BTreeMap<(String, String), PairEntry>,
    current: Option<CurrentPair>,
}

impl PairIndex {
    /// Build the index from the current Queue 2 contents. Settled
    /// transactions are skipped defensively, though none should be present
    /// in Queue 2 to begin with.
    pub fn from_queue(state: &SimulationState) -> Self {
        let mut pairs: BTreeMap<(String, String), PairEntry> = BTreeMap::new();

        for tx_id in state.rtgs_queue() {
            let tx = match state.get_transaction(tx_id) {
                Some(tx) => tx,
                None => continue,
            };
            if tx.is_fully_settled() {
                continue;
            }

            let (sender, receiver) = (tx.sender_id(), tx.receiver_id());
            let (a, b) = if sender <= receiver {
                (sender.to_string(), receiver.to_string())
            } else {
                (receiver.to_string(), sender.to_string())
            };

            let entry = pairs.entry((a.clone(), b.clone())).or_insert_with(|| PairEntry {
                txs_ab: Vec::new(),
                txs_ba: Vec::new(),
                sum_ab: 0,
                sum_ba: 0,
            });

            if sender == a {
                entry.txs_ab.push(tx_id.clone());
                entry.sum_ab += tx.remaining_amount();
            } else {
                entry.txs_ba.push(tx_id.clone());
                entry.sum_ba += tx.remaining_amount();
            }
        }

        Self {
            pairs,
            current: None,
        }
    }

    /// Number of pairs with flow in both directions (eligible to offset).
    pub fn ready_count(&self) -> usize {
        self.pairs
            .values()
            .filter(|e| !e.txs_ab.is_empty() && !e.txs_ba.is_empty())
            .count()
    }

    /// Pop the highest-priority ready pair: largest liquidity release first,
    /// ties broken by the lexicographically smallest `(agent_a, agent_b)`
    /// pair, so the search order is fully deterministic.
    pub fn pop_ready(&mut self) -> Option<PairKey> {
        let mut ready: Vec<(i64, String, String)> = self
            .pairs
            .iter()
            .filter(|(_, e)| !e.txs_ab.is_empty() && !e.txs_ba.is_empty())
            .map(|((a, b), e)| (e.sum_ab.min(e.sum_ba), a.clone(), b.clone()))
            .collect();

        if ready.is_empty() {
            self.current = None;
            return None;
        }

        ready.sort_by(|x, y| y.0.cmp(&x.0).then_with(|| x.1.cmp(&y.1)).then_with(|| x.2.cmp(&y.2)));
        let (liquidity_release, agent_a, agent_b) = ready.into_iter().next().unwrap();

        let entry = self
            .pairs
            .get_mut(&(agent_a.clone(), agent_b.clone()))
            .expect("key came from this map");

        let txs_ab = std::mem::take(&mut entry.txs_ab);
        let txs_ba = std::mem::take(&mut entry.txs_ba);
        let sum_ab = entry.sum_ab;
        let sum_ba = entry.sum_ba;
        // Zero out so this pair is no longer "ready" on a subsequent pop.
        entry.sum_ab = 0;
        entry.sum_ba = 0;

        self.current = Some(CurrentPair {
            agent_a: agent_a.clone(),
            agent_b: agent_b.clone(),
            txs_ab,
            txs_ba,
            sum_ab,
            sum_ba,
        });

        Some(PairKey {
            agent_a,
            agent_b,
            liquidity_release,
        })
    }

    /// Transaction ids for the pair last returned by `pop_ready`, as
    /// `(agent_a -> agent_b legs, agent_b -> agent_a legs)`.
    pub fn get_transactions(&self, key: &PairKey) -> (Vec<String>, Vec<String>) {
        match &self.current {
            Some(current) if current.agent_a == key.agent_a && current.agent_b == key.agent_b => {
                (current.txs_ab.clone(), current.txs_ba.clone())
            }
            _ => (Vec::new(), Vec::new()),
        }
    }

    /// Total remaining amount flowing from `from` to `to` in the pair last
    /// returned by `pop_ready`. `(from, to)` may be given in either order.
    pub fn flow_sum(&self, from: &str, to: &str) -> i64 {
        match &self.current {
            Some(current) if from == current.agent_a && to == current.agent_b => current.sum_ab,
            Some(current) if from == current.agent_b && to == current.agent_a => current.sum_ba,
            _ => 0,
        }
    }
}
