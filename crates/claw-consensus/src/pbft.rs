use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use claw_core::constants::{CHECKPOINT_INTERVAL, DEFAULT_VIEW_TIMEOUT_MS};
use claw_core::error::ClawError;
use claw_core::transaction::Transaction;
use claw_core::types::{PublicKey, TimestampMs, TxDigest};
use claw_crypto::{verify_transaction, KeyPair};
use claw_ledger::LedgerEngine;

use crate::message::{ConsensusMessage, MessagePhase};

// ── Validator set ────────────────────────────────────────────────────────────

/// One member of the fixed validator set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorPeer {
    pub id: String,
    pub public_key: PublicKey,
}

/// Static configuration of a consensus node.
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// This node's stable validator id.
    pub node_id: String,
    /// The other members of the validator set.
    pub peers: Vec<ValidatorPeer>,
    /// Leader inactivity window before a view change.
    pub view_timeout_ms: u64,
}

impl ConsensusConfig {
    pub fn single(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            peers: Vec::new(),
            view_timeout_ms: DEFAULT_VIEW_TIMEOUT_MS,
        }
    }
}

// ── Pending entries ──────────────────────────────────────────────────────────

/// An in-flight transaction and its phase flags. Created on submission,
/// erased once committed and applied (or cancelled / discarded).
#[derive(Clone, Debug)]
struct PendingEntry {
    transaction: Transaction,
    received_at: TimestampMs,
    sequence: u64,
    pre_prepared: bool,
    prepared: bool,
    committed: bool,
}

/// Invoked synchronously with every committed transaction, before the next
/// message is processed.
pub type CommitCallback = Box<dyn FnMut(&Transaction)>;

// ── PbftNode ─────────────────────────────────────────────────────────────────

/// PBFT-style three-phase agreement over transaction digests.
///
/// With n members the Byzantine bound is f = ⌊(n−1)/3⌋ and the quorum is
/// 2f + 1, counted as votes recorded from peers plus the node's own implicit
/// vote. Commits hand the transaction to the ledger engine behind one coarse
/// lock; outbound messages accumulate in an outbox the embedding transport
/// drains.
pub struct PbftNode {
    node_id: String,
    keypair: KeyPair,
    members: Vec<ValidatorPeer>,
    /// Member ids in rotation order (lexicographic), shared by every honest
    /// replica regardless of local peer configuration.
    rotation: Vec<String>,
    view: u64,
    /// High-water mark of committed sequences.
    sequence: u64,
    /// Next sequence this node will assign when proposing as leader.
    next_sequence: u64,
    view_timeout_ms: u64,
    last_progress: TimestampMs,
    last_checkpoint: u64,
    pending: HashMap<TxDigest, PendingEntry>,
    prepares: HashMap<TxDigest, BTreeSet<String>>,
    commits: HashMap<TxDigest, BTreeSet<String>>,
    message_log: Vec<ConsensusMessage>,
    outbox: VecDeque<ConsensusMessage>,
    callbacks: Vec<CommitCallback>,
    ledger: Arc<Mutex<LedgerEngine>>,
}

impl PbftNode {
    pub fn new(
        config: ConsensusConfig,
        keypair: KeyPair,
        ledger: Arc<Mutex<LedgerEngine>>,
    ) -> Self {
        let mut members = vec![ValidatorPeer {
            id: config.node_id.clone(),
            public_key: keypair.public_key(),
        }];
        members.extend(config.peers);

        let mut rotation: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
        rotation.sort();

        Self {
            node_id: config.node_id,
            keypair,
            members,
            rotation,
            view: 0,
            sequence: 0,
            next_sequence: 0,
            view_timeout_ms: config.view_timeout_ms,
            last_progress: 0,
            last_checkpoint: 0,
            pending: HashMap::new(),
            prepares: HashMap::new(),
            commits: HashMap::new(),
            message_log: Vec::new(),
            outbox: VecDeque::new(),
            callbacks: Vec::new(),
            ledger,
        }
    }

    // ── Introspection ────────────────────────────────────────────────────────

    pub fn view(&self) -> u64 {
        self.view
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn message_log(&self) -> &[ConsensusMessage] {
        &self.message_log
    }

    /// Messages awaiting delivery to the other validators.
    pub fn drain_outbox(&mut self) -> Vec<ConsensusMessage> {
        self.outbox.drain(..).collect()
    }

    /// Leader id for the current view: deterministic modular rotation.
    pub fn leader_id(&self) -> &str {
        &self.rotation[(self.view % self.rotation.len() as u64) as usize]
    }

    pub fn is_leader(&self) -> bool {
        self.leader_id() == self.node_id
    }

    /// Byzantine fault bound for the configured set size.
    pub fn fault_bound(&self) -> usize {
        (self.members.len() - 1) / 3
    }

    /// 2f + 1, including this node's own implicit vote.
    pub fn quorum(&self) -> usize {
        2 * self.fault_bound() + 1
    }

    /// Register a callback invoked synchronously on every commit.
    pub fn on_commit(&mut self, callback: CommitCallback) {
        self.callbacks.push(callback);
    }

    fn member_key(&self, id: &str) -> Option<&PublicKey> {
        self.members.iter().find(|m| m.id == id).map(|m| &m.public_key)
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Accept a signed transaction into consensus. The leader proposes it
    /// immediately; a follower parks it until the leader's PRE-PREPARE
    /// arrives.
    pub fn submit_transaction(
        &mut self,
        tx: Transaction,
        now_ms: TimestampMs,
    ) -> Result<TxDigest, ClawError> {
        let digest = verify_transaction(&tx)?;

        {
            let ledger = self
                .ledger
                .lock()
                .map_err(|_| ClawError::Storage("ledger lock poisoned".into()))?;
            let sender = ledger
                .get_account(&tx.from)
                .ok_or_else(|| ClawError::UnknownSender(tx.from.to_hex()))?;
            let expected = sender.nonce + 1;
            if tx.nonce != expected {
                return Err(ClawError::InvalidNonce { expected, got: tx.nonce });
            }
            if ledger.get_transaction_by_hash(&digest).is_some() {
                return Err(ClawError::DuplicateTransaction(digest.to_hex()));
            }
        }
        if self.pending.contains_key(&digest) {
            return Err(ClawError::DuplicateTransaction(digest.to_hex()));
        }

        self.pending.insert(
            digest,
            PendingEntry {
                transaction: tx,
                received_at: now_ms,
                sequence: 0,
                pre_prepared: false,
                prepared: false,
                committed: false,
            },
        );
        self.last_progress = now_ms;
        debug!(digest = %digest, leader = self.is_leader(), "transaction pending");

        if self.is_leader() {
            self.propose(digest, now_ms)?;
        }
        Ok(digest)
    }

    /// Drop a pending transaction that has not committed. Returns whether an
    /// entry was removed.
    pub fn cancel_pending(&mut self, digest: &TxDigest) -> bool {
        self.prepares.remove(digest);
        self.commits.remove(digest);
        self.pending.remove(digest).is_some()
    }

    // ── Leader proposal ──────────────────────────────────────────────────────

    fn propose(&mut self, digest: TxDigest, now_ms: TimestampMs) -> Result<(), ClawError> {
        self.next_sequence += 1;
        let sequence = self.next_sequence;

        let mut msg = ConsensusMessage::unsigned(
            MessagePhase::PrePrepare,
            self.view,
            sequence,
            digest,
            self.node_id.clone(),
        );
        msg.sign(&self.keypair)?;
        self.record_and_send(msg);

        let entry = self.pending.get_mut(&digest).expect("pending inserted by caller");
        entry.pre_prepared = true;
        entry.sequence = sequence;
        info!(digest = %digest, sequence, view = self.view, "proposed");

        self.send_prepare(digest, sequence, now_ms)
    }

    fn send_prepare(
        &mut self,
        digest: TxDigest,
        sequence: u64,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        let mut msg = ConsensusMessage::unsigned(
            MessagePhase::Prepare,
            self.view,
            sequence,
            digest,
            self.node_id.clone(),
        );
        msg.sign(&self.keypair)?;
        self.record_and_send(msg);
        self.try_advance(digest, now_ms)
    }

    fn record_and_send(&mut self, msg: ConsensusMessage) {
        self.message_log.push(msg.clone());
        self.outbox.push_back(msg);
    }

    // ── Handlers ─────────────────────────────────────────────────────────────

    /// Leader's proposal. Recording it is the precondition for any later
    /// PREPARE quorum on this digest.
    pub fn handle_pre_prepare(
        &mut self,
        msg: ConsensusMessage,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        if !self.accept_message(&msg) {
            return Ok(());
        }
        if msg.validator != self.leader_id() {
            debug!(from = %msg.validator, "dropping pre-prepare from non-leader");
            return Ok(());
        }
        let Some(entry) = self.pending.get_mut(&msg.digest) else {
            debug!(digest = %msg.digest, "pre-prepare for unknown transaction");
            return Ok(());
        };
        if entry.pre_prepared {
            return Ok(());
        }
        entry.pre_prepared = true;
        entry.sequence = msg.sequence;
        let sequence = msg.sequence;
        let digest = msg.digest;
        self.message_log.push(msg);

        self.send_prepare(digest, sequence, now_ms)
    }

    /// A peer's readiness vote. Votes are set-semantics idempotent.
    pub fn handle_prepare(
        &mut self,
        msg: ConsensusMessage,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        if !self.accept_message(&msg) {
            return Ok(());
        }
        let digest = msg.digest;
        if !self.pending.contains_key(&digest) {
            debug!(digest = %digest, "prepare for unknown or settled digest");
            return Ok(());
        }
        self.prepares.entry(digest).or_default().insert(msg.validator.clone());
        self.message_log.push(msg);
        self.try_advance(digest, now_ms)
    }

    /// A peer's commit vote. Quorum here applies the transaction.
    pub fn handle_commit(
        &mut self,
        msg: ConsensusMessage,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        if !self.accept_message(&msg) {
            return Ok(());
        }
        let digest = msg.digest;
        if !self.pending.contains_key(&digest) {
            debug!(digest = %digest, "commit for unknown or settled digest");
            return Ok(());
        }
        self.commits.entry(digest).or_default().insert(msg.validator.clone());
        self.message_log.push(msg);
        self.try_advance(digest, now_ms)
    }

    /// Shared drop rules: out-of-view, self-origin, unknown validator, bad
    /// signature. Dropped messages are logged at debug level only.
    fn accept_message(&self, msg: &ConsensusMessage) -> bool {
        if msg.view != self.view {
            debug!(msg_view = msg.view, view = self.view, "dropping out-of-view message");
            return false;
        }
        if msg.validator == self.node_id {
            return false;
        }
        let Some(public_key) = self.member_key(&msg.validator) else {
            debug!(from = %msg.validator, "dropping message from unknown validator");
            return false;
        };
        if !msg.verify(public_key) {
            debug!(from = %msg.validator, "dropping message with bad signature");
            return false;
        }
        true
    }

    // ── Phase advancement ────────────────────────────────────────────────────

    fn try_advance(&mut self, digest: TxDigest, now_ms: TimestampMs) -> Result<(), ClawError> {
        let quorum = self.quorum();

        let Some(entry) = self.pending.get(&digest) else {
            return Ok(());
        };
        if entry.committed {
            return Ok(());
        }
        let (pre_prepared, mut prepared, sequence) =
            (entry.pre_prepared, entry.prepared, entry.sequence);

        // PREPARE quorum → emit COMMIT. Never before the leader's
        // PRE-PREPARE has been recorded.
        if pre_prepared && !prepared {
            let votes = self.prepares.get(&digest).map_or(0, BTreeSet::len);
            if votes + 1 >= quorum {
                if let Some(e) = self.pending.get_mut(&digest) {
                    e.prepared = true;
                }
                prepared = true;
                let mut msg = ConsensusMessage::unsigned(
                    MessagePhase::Commit,
                    self.view,
                    sequence,
                    digest,
                    self.node_id.clone(),
                );
                msg.sign(&self.keypair)?;
                self.record_and_send(msg);
            }
        }

        // COMMIT quorum → apply.
        if prepared {
            let votes = self.commits.get(&digest).map_or(0, BTreeSet::len);
            if votes + 1 >= quorum {
                self.commit_transaction(digest, now_ms)?;
            }
        }
        Ok(())
    }

    fn commit_transaction(
        &mut self,
        digest: TxDigest,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        let Some(mut entry) = self.pending.remove(&digest) else {
            return Ok(());
        };
        entry.committed = true;
        self.prepares.remove(&digest);
        self.commits.remove(&digest);
        self.sequence = self.sequence.max(entry.sequence);
        self.last_progress = now_ms;

        let applied = {
            let mut ledger = self
                .ledger
                .lock()
                .map_err(|_| ClawError::Storage("ledger lock poisoned".into()))?;
            ledger.apply_transaction(&entry.transaction, now_ms)
        };
        match applied {
            Ok(_) => {
                info!(digest = %digest, sequence = entry.sequence, "committed");
                for callback in self.callbacks.iter_mut() {
                    callback(&entry.transaction);
                }
            }
            Err(e) => {
                warn!(digest = %digest, error = %e, "committed transaction rejected by ledger");
            }
        }

        if self.sequence >= self.last_checkpoint + CHECKPOINT_INTERVAL {
            self.last_checkpoint = self.sequence;
            let checkpoint = self.last_checkpoint;
            self.message_log.retain(|m| m.sequence > checkpoint);
            debug!(checkpoint, "truncated message log");
        }
        Ok(())
    }

    // ── View change ──────────────────────────────────────────────────────────

    /// Advance the view if the leader has made no progress within the
    /// timeout while work is pending. Uncommitted digests keep their
    /// transactions but lose all phase state and votes; the new leader
    /// re-proposes them. Returns whether a view change fired.
    pub fn check_view_timeout(&mut self, now_ms: TimestampMs) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        if now_ms.saturating_sub(self.last_progress) < self.view_timeout_ms {
            return false;
        }

        self.view += 1;
        self.prepares.clear();
        self.commits.clear();
        for entry in self.pending.values_mut() {
            entry.pre_prepared = false;
            entry.prepared = false;
            entry.sequence = 0;
        }
        self.next_sequence = self.sequence;
        self.last_progress = now_ms;
        warn!(
            view = self.view,
            leader = %self.leader_id(),
            pending = self.pending.len(),
            "view change: leader timed out"
        );

        if self.is_leader() {
            if let Err(e) = self.repropose_pending(now_ms) {
                warn!(error = %e, "re-proposal after view change failed");
            }
        }
        true
    }

    /// As the new leader, re-propose every pending transaction in arrival
    /// order.
    fn repropose_pending(&mut self, now_ms: TimestampMs) -> Result<(), ClawError> {
        let mut digests: Vec<(TimestampMs, TxDigest)> = self
            .pending
            .iter()
            .map(|(d, e)| (e.received_at, *d))
            .collect();
        digests.sort();
        for (_, digest) in digests {
            self.propose(digest, now_ms)?;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use claw_core::transaction::{Transaction, TxType};
    use std::path::PathBuf;

    const NOW: u64 = 1_700_000_000_000;

    fn temp_ledger(name: &str) -> (Arc<Mutex<LedgerEngine>>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("claw_pbft_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        (Arc::new(Mutex::new(LedgerEngine::open(&dir).unwrap())), dir)
    }

    fn signed_transfer(kp: &KeyPair, to: PublicKey, amount: u64, nonce: u64) -> Transaction {
        let mut tx = Transaction {
            version: 1,
            tx_type: TxType::Transfer,
            from: kp.public_key(),
            to: Some(to),
            amount,
            nonce,
            timestamp: NOW,
            data: None,
            signature: None,
        };
        kp.sign_transaction(&mut tx).unwrap();
        tx
    }

    fn seed_accounts(ledger: &Arc<Mutex<LedgerEngine>>, sender: &KeyPair, recipient: &KeyPair) {
        let mut l = ledger.lock().unwrap();
        l.create_account(sender.public_key(), 1_000, NOW).unwrap();
        l.create_account(recipient.public_key(), 100, NOW).unwrap();
    }

    #[test]
    fn quorum_math() {
        let (ledger, dir) = temp_ledger("quorum");
        let kp = KeyPair::generate();
        let peers: Vec<ValidatorPeer> = (1..4)
            .map(|i| ValidatorPeer {
                id: format!("v{i}"),
                public_key: KeyPair::generate().public_key(),
            })
            .collect();
        let node = PbftNode::new(
            ConsensusConfig { node_id: "v0".into(), peers, view_timeout_ms: 1_000 },
            kp,
            ledger,
        );
        // n = 4 → f = 1 → quorum = 3
        assert_eq!(node.fault_bound(), 1);
        assert_eq!(node.quorum(), 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn single_node_commits_immediately() {
        let (ledger, dir) = temp_ledger("single");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        seed_accounts(&ledger, &sender, &recipient);

        let node_key = KeyPair::generate();
        let mut node = PbftNode::new(
            ConsensusConfig::single("solo"),
            node_key,
            Arc::clone(&ledger),
        );
        assert!(node.is_leader());
        assert_eq!(node.quorum(), 1);

        let tx = signed_transfer(&sender, recipient.public_key(), 100, 1);
        node.submit_transaction(tx, NOW).unwrap();

        // Immediate commit: ledger mutated, nothing pending.
        assert_eq!(node.pending_count(), 0);
        let l = ledger.lock().unwrap();
        assert_eq!(l.get_balance(&sender.public_key()), 899);
        assert_eq!(l.get_balance(&recipient.public_key()), 200);
        drop(l);

        // The log holds all three phases, all from this validator.
        let phases: Vec<MessagePhase> = node.message_log().iter().map(|m| m.phase).collect();
        assert_eq!(
            phases,
            vec![MessagePhase::PrePrepare, MessagePhase::Prepare, MessagePhase::Commit]
        );
        assert!(node.message_log().iter().all(|m| m.validator == "solo"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn commit_callback_runs_synchronously() {
        let (ledger, dir) = temp_ledger("callback");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        seed_accounts(&ledger, &sender, &recipient);

        let mut node =
            PbftNode::new(ConsensusConfig::single("solo"), KeyPair::generate(), ledger);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        node.on_commit(Box::new(move |tx| {
            sink.lock().unwrap().push(tx.amount);
        }));

        node.submit_transaction(signed_transfer(&sender, recipient.public_key(), 42, 1), NOW)
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicate_submission_rejected() {
        let (ledger, dir) = temp_ledger("dup_submit");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        seed_accounts(&ledger, &sender, &recipient);

        let mut node =
            PbftNode::new(ConsensusConfig::single("solo"), KeyPair::generate(), ledger);
        let tx = signed_transfer(&sender, recipient.public_key(), 100, 1);
        node.submit_transaction(tx.clone(), NOW).unwrap();

        // Already applied by the single-node commit → duplicate.
        assert!(matches!(
            node.submit_transaction(tx, NOW).unwrap_err(),
            ClawError::DuplicateTransaction(_)
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn submit_rejects_bad_nonce_and_unknown_sender() {
        let (ledger, dir) = temp_ledger("submit_checks");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();

        let mut node = PbftNode::new(
            ConsensusConfig::single("solo"),
            KeyPair::generate(),
            Arc::clone(&ledger),
        );

        let tx = signed_transfer(&sender, recipient.public_key(), 10, 1);
        assert!(matches!(
            node.submit_transaction(tx, NOW).unwrap_err(),
            ClawError::UnknownSender(_)
        ));

        seed_accounts(&ledger, &sender, &recipient);
        let gap = signed_transfer(&sender, recipient.public_key(), 10, 4);
        assert!(matches!(
            node.submit_transaction(gap, NOW).unwrap_err(),
            ClawError::InvalidNonce { expected: 1, got: 4 }
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_view_and_non_leader_preprepare_dropped() {
        let (ledger, dir) = temp_ledger("drops");
        let node_key = KeyPair::generate();
        let peer_key = KeyPair::generate();
        let peer = ValidatorPeer { id: "b".into(), public_key: peer_key.public_key() };
        let mut node = PbftNode::new(
            ConsensusConfig { node_id: "a".into(), peers: vec![peer], view_timeout_ms: 1_000 },
            node_key,
            ledger,
        );
        // Rotation is ["a", "b"]; view 0 leader is "a".
        assert_eq!(node.leader_id(), "a");

        let digest = TxDigest::from_bytes([7; 32]);

        // Wrong view.
        let mut stale =
            ConsensusMessage::unsigned(MessagePhase::Prepare, 9, 1, digest, "b");
        stale.sign(&peer_key).unwrap();
        node.handle_prepare(stale, NOW).unwrap();
        assert!(node.message_log().is_empty());

        // PRE-PREPARE from a non-leader.
        let mut rogue =
            ConsensusMessage::unsigned(MessagePhase::PrePrepare, 0, 1, digest, "b");
        rogue.sign(&peer_key).unwrap();
        node.handle_pre_prepare(rogue, NOW).unwrap();
        assert!(node.message_log().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn prepare_votes_cannot_commit_without_pre_prepare() {
        let (ledger, dir) = temp_ledger("no_preprep");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        seed_accounts(&ledger, &sender, &recipient);

        // Three peers + self; peer "a" leads view 0, so this node parks the
        // transaction and waits.
        let peer_keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let peers: Vec<ValidatorPeer> = peer_keys
            .iter()
            .enumerate()
            .map(|(i, k)| ValidatorPeer {
                id: format!("a{i}"),
                public_key: k.public_key(),
            })
            .collect();
        let mut node = PbftNode::new(
            ConsensusConfig { node_id: "z".into(), peers, view_timeout_ms: 1_000 },
            KeyPair::generate(),
            Arc::clone(&ledger),
        );
        assert!(!node.is_leader());

        let tx = signed_transfer(&sender, recipient.public_key(), 100, 1);
        let digest = node.submit_transaction(tx, NOW).unwrap();
        assert_eq!(node.pending_count(), 1);

        // A full round of PREPARE and COMMIT votes arrives, but no
        // PRE-PREPARE from the leader was ever recorded.
        for (i, key) in peer_keys.iter().enumerate() {
            let mut p = ConsensusMessage::unsigned(
                MessagePhase::Prepare, 0, 1, digest, format!("a{i}"),
            );
            p.sign(key).unwrap();
            node.handle_prepare(p, NOW).unwrap();
            let mut c = ConsensusMessage::unsigned(
                MessagePhase::Commit, 0, 1, digest, format!("a{i}"),
            );
            c.sign(key).unwrap();
            node.handle_commit(c, NOW).unwrap();
        }

        // Still pending; the ledger saw nothing.
        assert_eq!(node.pending_count(), 1);
        assert_eq!(ledger.lock().unwrap().get_balance(&sender.public_key()), 1_000);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn view_change_resets_votes_and_rotates_leader() {
        let (ledger, dir) = temp_ledger("view_change");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        seed_accounts(&ledger, &sender, &recipient);

        let peer = ValidatorPeer {
            id: "a-leader".into(),
            public_key: KeyPair::generate().public_key(),
        };
        let mut node = PbftNode::new(
            ConsensusConfig {
                node_id: "b-follower".into(),
                peers: vec![peer],
                view_timeout_ms: 1_000,
            },
            KeyPair::generate(),
            Arc::clone(&ledger),
        );
        assert_eq!(node.leader_id(), "a-leader");

        let tx = signed_transfer(&sender, recipient.public_key(), 100, 1);
        node.submit_transaction(tx, NOW).unwrap();

        // No progress before the timeout elapses.
        assert!(!node.check_view_timeout(NOW + 999));
        assert_eq!(node.view(), 0);

        // Timeout: view advances, this node becomes leader and re-proposes;
        // as the only live validator of quorum 1 it commits.
        assert!(node.check_view_timeout(NOW + 1_000));
        assert_eq!(node.view(), 1);
        assert_eq!(node.leader_id(), "b-follower");
        assert_eq!(node.pending_count(), 0);
        assert_eq!(ledger.lock().unwrap().get_balance(&recipient.public_key()), 200);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicate_votes_are_idempotent() {
        let (ledger, dir) = temp_ledger("idempotent");
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        seed_accounts(&ledger, &sender, &recipient);

        // Validator set of 4 (f = 1, quorum = 3); this node follows.
        let leader_key = KeyPair::generate();
        let other_keys: Vec<KeyPair> = (0..2).map(|_| KeyPair::generate()).collect();
        let mut peers = vec![ValidatorPeer { id: "a".into(), public_key: leader_key.public_key() }];
        peers.extend(other_keys.iter().enumerate().map(|(i, k)| ValidatorPeer {
            id: format!("c{i}"),
            public_key: k.public_key(),
        }));
        let mut node = PbftNode::new(
            ConsensusConfig { node_id: "b".into(), peers, view_timeout_ms: 1_000 },
            KeyPair::generate(),
            Arc::clone(&ledger),
        );
        assert_eq!(node.leader_id(), "a");
        assert_eq!(node.quorum(), 3);

        let tx = signed_transfer(&sender, recipient.public_key(), 100, 1);
        let digest = node.submit_transaction(tx, NOW).unwrap();

        let mut pp = ConsensusMessage::unsigned(MessagePhase::PrePrepare, 0, 1, digest, "a");
        pp.sign(&leader_key).unwrap();
        node.handle_pre_prepare(pp, NOW).unwrap();

        // The same PREPARE replayed three times counts once: 1 vote + self
        // = 2 < 3, so no COMMIT is emitted yet.
        let mut p = ConsensusMessage::unsigned(MessagePhase::Prepare, 0, 1, digest, "a");
        p.sign(&leader_key).unwrap();
        for _ in 0..3 {
            node.handle_prepare(p.clone(), NOW).unwrap();
        }
        assert!(node
            .message_log()
            .iter()
            .all(|m| m.phase != MessagePhase::Commit || m.validator != "b"));

        // A second distinct vote reaches quorum.
        let mut p2 = ConsensusMessage::unsigned(MessagePhase::Prepare, 0, 1, digest, "c0");
        p2.sign(&other_keys[0]).unwrap();
        node.handle_prepare(p2, NOW).unwrap();
        assert!(node
            .message_log()
            .iter()
            .any(|m| m.phase == MessagePhase::Commit && m.validator == "b"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
