//! Property tests for body encoding, balance accounting and the node
//! registry.

use std::sync::Arc;

use proptest::prelude::*;

use ember_protocol::auth::ProofOfOwnership;
use ember_protocol::block::{block_hash, BlockProducer};
use ember_protocol::config::{DEFAULT_CONSTANT_FEE, ONE_EMBER};
use ember_protocol::crypto::keys::{NodeKeypair, NodePublicKey};
use ember_protocol::ledger::{LedgerState, MemoryLedger, StateView};
use ember_protocol::mempool::{Mempool, MempoolConfig};
use ember_protocol::processor::TransactionProcessor;
use ember_protocol::transaction::kinds::approval_escrow::ApprovalEscrowBody;
use ember_protocol::transaction::kinds::claim_node_registration::ClaimNodeRegistrationBody;
use ember_protocol::transaction::kinds::liquid_payment::LiquidPaymentBody;
use ember_protocol::transaction::kinds::liquid_payment_stop::LiquidPaymentStopBody;
use ember_protocol::transaction::kinds::node_registration::NodeRegistrationBody;
use ember_protocol::transaction::kinds::remove_node_registration::RemoveNodeRegistrationBody;
use ember_protocol::transaction::kinds::send_money::SendMoneyBody;
use ember_protocol::transaction::kinds::update_node_registration::UpdateNodeRegistrationBody;
use ember_protocol::transaction::{
    Dependencies, EscrowApproval, Transaction, TransactionBody, TransactionBuilder,
    TransactionType, TypeDispatcher,
};

const FEE: i64 = DEFAULT_CONSTANT_FEE;
const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

fn arb_body() -> impl Strategy<Value = TransactionBody> {
    prop_oneof![
        any::<i64>().prop_map(|amount| TransactionBody::from(SendMoneyBody { amount })),
        (any::<i64>(), any::<u64>()).prop_map(|(amount, complete_minutes)| {
            TransactionBody::from(LiquidPaymentBody {
                amount,
                complete_minutes,
            })
        }),
        (any::<bool>(), any::<i64>()).prop_map(|(approve, transaction_id)| {
            TransactionBody::from(ApprovalEscrowBody {
                approval: if approve {
                    EscrowApproval::Approve
                } else {
                    EscrowApproval::Reject
                },
                transaction_id,
            })
        }),
        (any::<u8>(), "[a-z]{1,12}", "[a-z0-9.:]{0,24}", any::<i64>(), any::<u32>()).prop_map(
            |(seed, account, node_address, locked_balance, height)| {
                let keypair = NodeKeypair::from_seed(&[seed; 32]);
                TransactionBody::from(NodeRegistrationBody {
                    node_public_key: keypair.public_key(),
                    account: account.as_str().into(),
                    node_address,
                    locked_balance,
                    poown: ProofOfOwnership::sign(
                        &keypair,
                        account.as_str().into(),
                        [seed; 32],
                        height,
                    ),
                })
            }
        ),
    ]
}

const START: i64 = 20 * ONE_EMBER;
const GENESIS_TS: i64 = 1_700_000_000;

/// One thing that can happen to the chain: a submitted transaction or a
/// produced block.
#[derive(Debug, Clone)]
enum Step {
    Send { from: usize, to: usize, amount: i64 },
    Pay { from: usize, to: usize, amount: i64, minutes: u64 },
    Stop { who: usize, payment: prop::sample::Index },
    Register { who: usize, key: usize, locked: i64 },
    Update { who: usize, locked: i64 },
    Remove { who: usize },
    Claim { who: usize, key: usize, locked: i64 },
    Block,
}

fn arb_step() -> impl Strategy<Value = Step> {
    let who = 0..ACCOUNTS.len();
    let key = 0..KEY_SEEDS.len();
    let amount = 1i64..ONE_EMBER;
    prop_oneof![
        (who.clone(), who.clone(), amount.clone())
            .prop_map(|(from, to, amount)| Step::Send { from, to, amount }),
        (who.clone(), who.clone(), amount.clone(), 1u64..4).prop_map(|(from, to, amount, minutes)| {
            Step::Pay {
                from,
                to,
                amount,
                minutes,
            }
        }),
        (who.clone(), any::<prop::sample::Index>())
            .prop_map(|(who, payment)| Step::Stop { who, payment }),
        (who.clone(), key.clone(), 0i64..ONE_EMBER)
            .prop_map(|(who, key, locked)| Step::Register { who, key, locked }),
        (who.clone(), 0i64..2 * ONE_EMBER).prop_map(|(who, locked)| Step::Update { who, locked }),
        who.clone().prop_map(|who| Step::Remove { who }),
        (who, key, 0i64..2 * ONE_EMBER).prop_map(|(who, key, locked)| Step::Claim { who, key, locked }),
        Just(Step::Block),
        Just(Step::Block),
    ]
}

const KEY_SEEDS: [u8; 3] = [11, 12, 13];

/// A small chain driven through the mempool and block producer.
struct Net {
    producer: BlockProducer<MemoryLedger>,
    keys: Vec<NodeKeypair>,
    payments: Vec<i64>,
    height: u32,
    timestamp: i64,
}

impl Net {
    fn new() -> Self {
        let ledger = MemoryLedger::new();
        for account in ACCOUNTS {
            ledger.seed_balance(&account.into(), START).unwrap();
        }
        ledger.put_block_hash(0, block_hash(0, GENESIS_TS, &[])).unwrap();
        let processor = TransactionProcessor::new(
            Arc::new(ledger),
            TypeDispatcher::new(Dependencies::default()),
        );
        Self {
            producer: BlockProducer::new(Arc::new(Mempool::new(
                Arc::new(processor),
                MempoolConfig::default(),
            ))),
            keys: KEY_SEEDS.iter().map(|s| NodeKeypair::from_seed(&[*s; 32])).collect(),
            payments: Vec::new(),
            height: 0,
            timestamp: GENESIS_TS,
        }
    }

    fn ledger(&self) -> &Arc<MemoryLedger> {
        self.producer.mempool().processor().ledger()
    }

    fn tx(&self, kind: TransactionType, sender: &str) -> TransactionBuilder {
        TransactionBuilder::new(kind)
            .sender(sender)
            .fee(FEE)
            .height(self.height + 1)
            .timestamp(self.timestamp)
    }

    fn poown(&self, key: &NodeKeypair, account: &str) -> ProofOfOwnership {
        let tip = self.ledger().block_hash(self.height).unwrap().expect("tip hash");
        ProofOfOwnership::sign(key, account.into(), tip, self.height)
    }

    /// Keypair of the node `account` currently owns.
    fn owned_key(&self, account: &str) -> Option<&NodeKeypair> {
        let row = self.ledger().node_by_account(&account.into()).unwrap()?;
        self.keys.iter().find(|k| k.public_key() == row.public_key)
    }

    fn build(&self, step: &Step) -> Option<Transaction> {
        let tx = match step {
            Step::Send { from, to, amount } => self
                .tx(TransactionType::SendMoney, ACCOUNTS[*from])
                .recipient(ACCOUNTS[*to])
                .body(SendMoneyBody { amount: *amount })
                .build(),
            Step::Pay {
                from,
                to,
                amount,
                minutes,
            } => self
                .tx(TransactionType::LiquidPayment, ACCOUNTS[*from])
                .recipient(ACCOUNTS[*to])
                .body(LiquidPaymentBody {
                    amount: *amount,
                    complete_minutes: *minutes,
                })
                .build(),
            Step::Stop { who, payment } => {
                if self.payments.is_empty() {
                    return None;
                }
                self.tx(TransactionType::LiquidPaymentStop, ACCOUNTS[*who])
                    .body(LiquidPaymentStopBody {
                        transaction_id: self.payments[payment.index(self.payments.len())],
                    })
                    .build()
            }
            Step::Register { who, key, locked } => {
                let account = ACCOUNTS[*who];
                self.tx(TransactionType::NodeRegistration, account)
                    .body(NodeRegistrationBody {
                        node_public_key: self.keys[*key].public_key(),
                        account: account.into(),
                        node_address: String::new(),
                        locked_balance: *locked,
                        poown: self.poown(&self.keys[*key], account),
                    })
                    .build()
            }
            Step::Update { who, locked } => {
                let account = ACCOUNTS[*who];
                let key = self.owned_key(account)?;
                self.tx(TransactionType::UpdateNodeRegistration, account)
                    .body(UpdateNodeRegistrationBody {
                        node_public_key: NodePublicKey::default(),
                        node_address: String::new(),
                        locked_balance: *locked,
                        poown: self.poown(key, account),
                    })
                    .build()
            }
            Step::Remove { who } => {
                let account = ACCOUNTS[*who];
                let key = self.owned_key(account)?;
                self.tx(TransactionType::RemoveNodeRegistration, account)
                    .body(RemoveNodeRegistrationBody {
                        node_public_key: key.public_key(),
                    })
                    .build()
            }
            Step::Claim { who, key, locked } => {
                let account = ACCOUNTS[*who];
                self.tx(TransactionType::ClaimNodeRegistration, account)
                    .body(ClaimNodeRegistrationBody {
                        node_public_key: self.keys[*key].public_key(),
                        account: account.into(),
                        locked_balance: *locked,
                        poown: self.poown(&self.keys[*key], account),
                    })
                    .build()
            }
            Step::Block => return None,
        };
        Some(tx)
    }

    fn run(&mut self, step: &Step) {
        if let Step::Block = step {
            self.height += 1;
            self.timestamp += 60;
            self.producer
                .produce_block(self.height, self.timestamp, 100)
                .expect("produce block");
            return;
        }
        if let Some(tx) = self.build(step) {
            let id = tx.id;
            if self.producer.mempool().add(tx).is_ok() && matches!(step, Step::Pay { .. }) {
                self.payments.push(id);
            }
        }
    }

    fn balances(&self) -> Vec<(i64, i64)> {
        ACCOUNTS
            .iter()
            .map(|a| {
                self.ledger()
                    .account_balance(&(*a).into())
                    .unwrap()
                    .map_or((0, 0), |b| (b.balance, b.spendable_balance))
            })
            .collect()
    }

    fn check_sound(&self) -> Result<(), TestCaseError> {
        for (balance, spendable) in self.balances() {
            prop_assert!(spendable >= 0, "spendable {} went negative", spendable);
            prop_assert!(spendable <= balance, "spendable {} above balance {}", spendable, balance);
        }
        let mut latest_keys = Vec::new();
        for account in ACCOUNTS {
            let latest: Vec<_> = self
                .ledger()
                .node_history(&account.into())
                .unwrap()
                .into_iter()
                .filter(|r| r.latest)
                .collect();
            prop_assert!(latest.len() <= 1, "{} owns {} latest rows", account, latest.len());
            latest_keys.extend(latest.into_iter().map(|r| r.public_key));
        }
        let count = latest_keys.len();
        latest_keys.sort();
        latest_keys.dedup();
        prop_assert_eq!(latest_keys.len(), count, "two owners share a node key");
        Ok(())
    }

    /// Drop everything still pending.
    fn drain(&self) {
        for account in ACCOUNTS {
            for tx in self.producer.mempool().pending_for_sender(&account.into()) {
                self.producer.mempool().remove(tx.id);
            }
        }
    }
}

proptest! {
    /// The declared size is the encoded length, and decoding gives the
    /// body back.
    #[test]
    fn body_size_matches_encoding(body in arb_body()) {
        let bytes = body.to_bytes();
        prop_assert_eq!(body.size() as usize, bytes.len());
        prop_assert_eq!(TransactionBody::parse(body.kind(), &bytes).unwrap(), body);
    }

    /// Any strict prefix of a body is rejected.
    #[test]
    fn truncated_body_is_rejected(body in arb_body(), cut in any::<prop::sample::Index>()) {
        let bytes = body.to_bytes();
        let len = cut.index(bytes.len());
        prop_assert!(TransactionBody::parse(body.kind(), &bytes[..len]).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any mix of transfers, liquid payments and registry changes keeps
    /// spendable within `[0, balance]`, leaves each account at most one
    /// latest node row, and nets out once the pool is emptied.
    #[test]
    fn mixed_sequences_keep_ledger_sound(steps in prop::collection::vec(arb_step(), 1..40)) {
        let mut net = Net::new();
        for step in &steps {
            net.run(step);
            net.check_sound()?;
        }
        net.drain();
        for (balance, spendable) in net.balances() {
            prop_assert_eq!(balance, spendable);
        }
    }

    /// Admitting then removing one transaction of any kind restores every
    /// spendable balance, whatever came before it.
    #[test]
    fn undo_restores_spendable(
        prefix in prop::collection::vec(arb_step(), 0..20),
        last in arb_step(),
    ) {
        let mut net = Net::new();
        for step in &prefix {
            net.run(step);
        }
        let before = net.balances();
        if let Some(tx) = net.build(&last) {
            let id = tx.id;
            if net.producer.mempool().add(tx).is_ok() {
                net.producer.mempool().remove(id);
            }
        }
        prop_assert_eq!(net.balances(), before);
    }
}
