//! End-to-end tests for the Ember execution core.
//!
//! Each test runs real transactions through the mempool and block producer
//! against a sled-backed ledger in its own temporary directory, the same
//! stack the node binary wires up.

use std::path::Path;
use std::sync::Arc;

use ember_protocol::auth::ProofOfOwnership;
use ember_protocol::block::{block_hash, BlockProducer, ProducedBlock};
use ember_protocol::config::{DEFAULT_CONSTANT_FEE, ONE_EMBER};
use ember_protocol::crypto::hash::sha256_array;
use ember_protocol::crypto::keys::{NodeKeypair, NodePublicKey};
use ember_protocol::governance::ScheduledVotePhase;
use ember_protocol::ledger::{EscrowStatus, LedgerDB, LedgerState, StateView};
use ember_protocol::mempool::{Mempool, MempoolConfig, MempoolError};
use ember_protocol::processor::TransactionProcessor;
use ember_protocol::transaction::kinds::approval_escrow::ApprovalEscrowBody;
use ember_protocol::transaction::kinds::claim_node_registration::ClaimNodeRegistrationBody;
use ember_protocol::transaction::kinds::fee_vote_commit::FeeVoteCommitBody;
use ember_protocol::transaction::kinds::fee_vote_reveal::{vote_info_bytes, FeeVoteRevealBody};
use ember_protocol::transaction::kinds::node_registration::NodeRegistrationBody;
use ember_protocol::transaction::kinds::remove_node_registration::RemoveNodeRegistrationBody;
use ember_protocol::transaction::kinds::send_money::SendMoneyBody;
use ember_protocol::transaction::kinds::update_node_registration::UpdateNodeRegistrationBody;
use ember_protocol::transaction::{
    AccountAddress, Dependencies, EscrowApproval, EscrowTerms, Reason, Transaction,
    TransactionBuilder, TransactionType, TypeDispatcher,
};

const FEE: i64 = DEFAULT_CONSTANT_FEE;
const GENESIS_TS: i64 = 1_700_000_000;
const START: i64 = 100 * ONE_EMBER;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Chain {
    producer: BlockProducer<LedgerDB>,
    phases: Arc<ScheduledVotePhase>,
    height: u32,
    timestamp: i64,
}

impl Chain {
    /// Open the ledger at `dir`, seed `accounts`, and record a genesis block.
    fn open(dir: &Path, accounts: &[&str]) -> Self {
        let ledger = Arc::new(LedgerDB::open(dir).expect("open ledger"));
        for account in accounts {
            ledger.seed_balance(&(*account).into(), START).unwrap();
        }
        ledger.put_block_hash(0, block_hash(0, GENESIS_TS, &[])).unwrap();

        let phases = Arc::new(ScheduledVotePhase::new(600, 600));
        let deps = Dependencies::default().with_vote_phase(phases.clone());
        let processor = TransactionProcessor::new(ledger, TypeDispatcher::new(deps));
        let mempool = Mempool::new(Arc::new(processor), MempoolConfig::default());
        Self {
            producer: BlockProducer::new(Arc::new(mempool)),
            phases,
            height: 0,
            timestamp: GENESIS_TS,
        }
    }

    fn ledger(&self) -> &Arc<LedgerDB> {
        self.producer.mempool().processor().ledger()
    }

    fn submit(&self, tx: Transaction) -> Result<(), MempoolError> {
        self.producer.mempool().add(tx)
    }

    fn next_block(&mut self, seconds: i64) -> ProducedBlock {
        self.height += 1;
        self.timestamp += seconds;
        self.producer
            .produce_block(self.height, self.timestamp, 100)
            .expect("produce block")
    }

    fn tip_hash(&self) -> [u8; 32] {
        self.ledger().block_hash(self.height).unwrap().expect("tip hash")
    }

    /// Builder for a transaction aimed at the next block.
    fn tx(&self, kind: TransactionType, sender: &str) -> TransactionBuilder {
        TransactionBuilder::new(kind)
            .sender(sender)
            .fee(FEE)
            .height(self.height + 1)
            .timestamp(self.timestamp)
    }

    fn poown(&self, keypair: &NodeKeypair, account: &str) -> ProofOfOwnership {
        ProofOfOwnership::sign(keypair, account.into(), self.tip_hash(), self.height)
    }

    fn balance(&self, account: &str) -> (i64, i64) {
        self.ledger()
            .account_balance(&account.into())
            .unwrap()
            .map_or((0, 0), |b| (b.balance, b.spendable_balance))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn transfer_confirms_and_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tx_id;
    let hash;
    {
        let mut chain = Chain::open(dir.path(), &["alice"]);
        let tx = chain
            .tx(TransactionType::SendMoney, "alice")
            .recipient("bob")
            .body(SendMoneyBody { amount: 25_000 })
            .build();
        tx_id = tx.id;
        chain.submit(tx).unwrap();
        assert_eq!(chain.balance("alice"), (START, START - 25_000 - FEE));

        let block = chain.next_block(60);
        assert_eq!(block.transactions.len(), 1);
        hash = block.hash;
        chain.ledger().flush().unwrap();
    }

    let ledger = LedgerDB::open(dir.path()).expect("reopen");
    let alice = ledger.account_balance(&"alice".into()).unwrap().unwrap();
    assert_eq!(alice.balance, START - 25_000 - FEE);
    assert_eq!(alice.spendable_balance, alice.balance);
    let bob = ledger.account_balance(&"bob".into()).unwrap().unwrap();
    assert_eq!(bob.balance, 25_000);
    assert!(ledger.transaction(tx_id).unwrap().is_some());
    assert_eq!(ledger.block_hash(1).unwrap(), Some(hash));
    assert_eq!(ledger.account_ledger(&"bob".into()).unwrap().len(), 1);
}

#[test]
fn overspend_is_rejected_at_admission() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chain = Chain::open(dir.path(), &["alice"]);
    let first = chain
        .tx(TransactionType::SendMoney, "alice")
        .recipient("bob")
        .body(SendMoneyBody { amount: START - FEE })
        .build();
    chain.submit(first).unwrap();

    let second = chain
        .tx(TransactionType::SendMoney, "alice")
        .recipient("carol")
        .body(SendMoneyBody { amount: 1 })
        .build();
    match chain.submit(second) {
        Err(MempoolError::Rejected(err)) => {
            assert_eq!(err.reason(), Some(Reason::InsufficientSpendableBalance))
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn node_registry_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice", "bob"]);
    let node = NodeKeypair::from_seed(&[1; 32]);
    let alice: AccountAddress = "alice".into();

    // Register with 500 locked.
    let register = chain
        .tx(TransactionType::NodeRegistration, "alice")
        .body(NodeRegistrationBody {
            node_public_key: node.public_key(),
            account: alice.clone(),
            node_address: "127.0.0.1:7000".into(),
            locked_balance: 500,
            poown: chain.poown(&node, "alice"),
        })
        .build();
    chain.submit(register.clone()).unwrap();
    chain.next_block(60);
    let row = chain.ledger().node_by_account(&alice).unwrap().expect("registered");
    assert_eq!(row.node_id, register.id);
    assert_eq!(row.locked_balance, 500);

    // Raise the stake to 800 and move the node.
    let update = chain
        .tx(TransactionType::UpdateNodeRegistration, "alice")
        .body(UpdateNodeRegistrationBody {
            node_public_key: node.public_key(),
            node_address: "10.0.0.1:7000".into(),
            locked_balance: 800,
            poown: chain.poown(&node, "alice"),
        })
        .build();
    chain.submit(update).unwrap();
    chain.next_block(60);
    let row = chain.ledger().node_by_account(&alice).unwrap().unwrap();
    assert_eq!(row.locked_balance, 800);
    assert_eq!(row.address, "10.0.0.1:7000");
    let history = chain.ledger().node_history(&alice).unwrap();
    assert_eq!(history.iter().filter(|r| r.latest).count(), 1);

    // Remove: the stake comes back.
    let remove = chain
        .tx(TransactionType::RemoveNodeRegistration, "alice")
        .body(RemoveNodeRegistrationBody {
            node_public_key: node.public_key(),
        })
        .build();
    chain.submit(remove).unwrap();
    chain.next_block(60);
    assert!(chain.ledger().node_by_account(&alice).unwrap().is_none());
    assert_eq!(chain.balance("alice"), (START - 3 * FEE, START - 3 * FEE));

    // Bob claims the released key with a fresh stake.
    let claim = chain
        .tx(TransactionType::ClaimNodeRegistration, "bob")
        .body(ClaimNodeRegistrationBody {
            node_public_key: node.public_key(),
            account: "bob".into(),
            locked_balance: 300,
            poown: chain.poown(&node, "bob"),
        })
        .build();
    chain.submit(claim).unwrap();
    let block = chain.next_block(60);
    assert!(block.tx_results.iter().all(|r| r.success));

    let row = chain.ledger().node_by_account(&"bob".into()).unwrap().expect("claimed");
    assert_eq!(row.public_key, node.public_key());
    assert_eq!(row.locked_balance, 300);
    assert_eq!(chain.balance("bob"), (START - 300 - FEE, START - 300 - FEE));
}

/// Register `node` for alice with `locked` staked and confirm it.
fn register_alice(chain: &mut Chain, node: &NodeKeypair, locked: i64) {
    let register = chain
        .tx(TransactionType::NodeRegistration, "alice")
        .body(NodeRegistrationBody {
            node_public_key: node.public_key(),
            account: "alice".into(),
            node_address: String::new(),
            locked_balance: locked,
            poown: chain.poown(node, "alice"),
        })
        .build();
    chain.submit(register).unwrap();
    chain.next_block(60);
}

fn raise_stake(chain: &Chain, node: &NodeKeypair, locked: i64) -> Transaction {
    chain
        .tx(TransactionType::UpdateNodeRegistration, "alice")
        .body(UpdateNodeRegistrationBody {
            node_public_key: NodePublicKey::default(),
            node_address: String::new(),
            locked_balance: locked,
            poown: chain.poown(node, "alice"),
        })
        .build()
}

#[test]
fn stacked_updates_wait_their_turn() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice"]);
    let node = NodeKeypair::from_seed(&[4; 32]);
    register_alice(&mut chain, &node, 300);

    let to_500 = raise_stake(&chain, &node, 500);
    chain.submit(to_500.clone()).unwrap();
    match chain.submit(raise_stake(&chain, &node, 600)) {
        Err(MempoolError::RegistryChangePending { pending }) => assert_eq!(pending, to_500.id),
        other => panic!("expected pending registry change, got {:?}", other),
    }
    chain.next_block(60);

    chain.submit(raise_stake(&chain, &node, 600)).unwrap();
    chain.next_block(60);

    let row = chain.ledger().node_by_account(&"alice".into()).unwrap().unwrap();
    assert_eq!(row.locked_balance, 600);
    let left = START - 600 - 3 * FEE;
    assert_eq!(chain.balance("alice"), (left, left));
    assert!(chain.producer.mempool().is_empty());
}

#[test]
fn competing_claims_on_one_node() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice", "bob", "carol"]);
    let node = NodeKeypair::from_seed(&[5; 32]);
    register_alice(&mut chain, &node, 0);

    let remove = chain
        .tx(TransactionType::RemoveNodeRegistration, "alice")
        .body(RemoveNodeRegistrationBody {
            node_public_key: node.public_key(),
        })
        .build();
    chain.submit(remove).unwrap();
    chain.next_block(60);

    let claim = |claimant: &str| {
        chain
            .tx(TransactionType::ClaimNodeRegistration, claimant)
            .body(ClaimNodeRegistrationBody {
                node_public_key: node.public_key(),
                account: claimant.into(),
                locked_balance: 100,
                poown: chain.poown(&node, claimant),
            })
            .build()
    };
    let by_bob = claim("bob");
    let by_carol = claim("carol");
    chain.submit(by_bob.clone()).unwrap();
    match chain.submit(by_carol) {
        Err(MempoolError::RegistryChangePending { pending }) => assert_eq!(pending, by_bob.id),
        other => panic!("expected pending registry change, got {:?}", other),
    }
    chain.next_block(60);

    let row = chain.ledger().node_by_account(&"bob".into()).unwrap().expect("claimed");
    assert_eq!(row.public_key, node.public_key());
    assert_eq!(chain.balance("bob"), (START - 100 - FEE, START - 100 - FEE));
    assert_eq!(chain.balance("carol"), (START, START));
}

#[test]
fn escrowed_transfer_is_approved() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice", "carol"]);
    let escrow_fee = ONE_EMBER / 10;

    let escrowed = chain
        .tx(TransactionType::SendMoney, "alice")
        .recipient("bob")
        .fee(escrow_fee)
        .escrow(EscrowTerms {
            approver: "carol".into(),
            commission: 5,
            timeout: 20,
            instruction: "release on delivery".into(),
        })
        .body(SendMoneyBody { amount: 100 })
        .build();
    chain.submit(escrowed.clone()).unwrap();
    chain.next_block(60);
    assert_eq!(chain.balance("bob"), (0, 0));
    assert_eq!(
        chain.ledger().escrow(escrowed.id).unwrap().unwrap().status,
        EscrowStatus::Pending
    );

    let approve = chain
        .tx(TransactionType::ApprovalEscrow, "carol")
        .body(ApprovalEscrowBody {
            approval: EscrowApproval::Approve,
            transaction_id: escrowed.id,
        })
        .build();
    chain.submit(approve).unwrap();
    chain.next_block(60);

    assert_eq!(chain.balance("bob"), (100, 100));
    assert_eq!(chain.balance("carol").0, START + 5 - FEE);
    let left = START - 100 - 5 - escrow_fee;
    assert_eq!(chain.balance("alice"), (left, left));
    assert_eq!(
        chain.ledger().escrow(escrowed.id).unwrap().unwrap().status,
        EscrowStatus::Approved
    );
}

#[test]
fn unanswered_escrow_expires() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice"]);
    let escrow_fee = ONE_EMBER / 10;
    let escrowed = chain
        .tx(TransactionType::SendMoney, "alice")
        .recipient("bob")
        .fee(escrow_fee)
        .escrow(EscrowTerms {
            approver: "carol".into(),
            commission: 5,
            timeout: 2,
            instruction: String::new(),
        })
        .body(SendMoneyBody { amount: 100 })
        .build();
    chain.submit(escrowed.clone()).unwrap();
    chain.next_block(60);
    assert_eq!(chain.next_block(60).expired_escrows, 0);
    assert_eq!(chain.next_block(60).expired_escrows, 1);

    assert_eq!(
        chain.ledger().escrow(escrowed.id).unwrap().unwrap().status,
        EscrowStatus::Expired
    );
    assert_eq!(chain.balance("alice").0, START - escrow_fee);
}

#[test]
fn late_approval_loses_to_expiry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice", "carol"]);
    let escrow_fee = ONE_EMBER / 10;
    let escrowed = chain
        .tx(TransactionType::SendMoney, "alice")
        .recipient("bob")
        .fee(escrow_fee)
        .escrow(EscrowTerms {
            approver: "carol".into(),
            commission: 5,
            timeout: 2,
            instruction: String::new(),
        })
        .body(SendMoneyBody { amount: 100 })
        .build();
    chain.submit(escrowed.clone()).unwrap();
    chain.next_block(60);

    let approve = chain
        .tx(TransactionType::ApprovalEscrow, "carol")
        .body(ApprovalEscrowBody {
            approval: EscrowApproval::Approve,
            transaction_id: escrowed.id,
        })
        .build();
    chain.submit(approve).unwrap();

    // No block at height 2; the approval reaches the chain at height 3.
    chain.height += 1;
    let block = chain.next_block(120);
    assert!(block.transactions.is_empty());
    assert_eq!(block.expired_escrows, 1);

    assert_eq!(
        chain.ledger().escrow(escrowed.id).unwrap().unwrap().status,
        EscrowStatus::Expired
    );
    assert_eq!(chain.balance("bob"), (0, 0));
    assert_eq!(chain.balance("carol"), (START, START));
}

#[test]
fn fee_vote_commit_then_reveal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chain = Chain::open(dir.path(), &["alice"]);
    let node = NodeKeypair::from_seed(&[9; 32]);

    let register = chain
        .tx(TransactionType::NodeRegistration, "alice")
        .body(NodeRegistrationBody {
            node_public_key: node.public_key(),
            account: "alice".into(),
            node_address: "127.0.0.1:7000".into(),
            locked_balance: 0,
            poown: chain.poown(&node, "alice"),
        })
        .build();
    chain.submit(register).unwrap();
    chain.next_block(60);

    // Block 2 opens a voting period.
    chain.phases.begin_period(2, chain.timestamp + 60);
    chain.next_block(60);
    let period_start = chain.height;
    let recent_hash = chain.tip_hash();

    let vote = 250_000;
    let info = vote_info_bytes(&recent_hash, period_start, vote);
    let commit = chain
        .tx(TransactionType::FeeVoteCommit, "alice")
        .timestamp(chain.timestamp + 60)
        .body(FeeVoteCommitBody {
            vote_hash: sha256_array(&info),
        })
        .build();
    chain.submit(commit).unwrap();
    assert_eq!(chain.next_block(60).transactions.len(), 1);

    // Move into the reveal phase.
    chain.next_block(600);
    let reveal = chain
        .tx(TransactionType::FeeVoteReveal, "alice")
        .body(FeeVoteRevealBody {
            recent_block_hash: recent_hash,
            recent_block_height: period_start,
            fee_vote: vote,
            voter_signature: node.sign(&info),
        })
        .build();
    chain.submit(reveal).unwrap();
    assert_eq!(chain.next_block(60).transactions.len(), 1);

    let alice: AccountAddress = "alice".into();
    let record = chain
        .ledger()
        .fee_vote_reveal(&alice, period_start)
        .unwrap()
        .expect("reveal recorded");
    assert_eq!(record.fee_vote, vote);
    assert!(chain.ledger().fee_vote_commit(&alice, period_start).unwrap().is_some());
}
