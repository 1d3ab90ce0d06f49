#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use tokio::sync::Notify;

use settlement::{ChainAccessor, ChainError, Confirmation, FundingCall, Invoice, TxHandle};

pub const PAYER: Address = Address::repeat_byte(0xa1);
pub const REGISTRAR: Address = Address::repeat_byte(0xb2);
pub const DAI: Address = Address::repeat_byte(0xda);
pub const USDC: Address = Address::repeat_byte(0xc5);

/// How the mock answers a confirmation wait for transactions of one kind.
#[derive(Debug, Clone)]
pub enum Script {
    Success,
    Revert(Option<String>),
    /// Never mined within the wait; can be mined later with [`MockChain::mine`].
    Timeout,
    /// Mined successfully once the gate is opened.
    Gated(Arc<Notify>),
    /// The receipt lookup fails, as on a dropped node connection.
    ReadError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadAllowance {
        token: Address,
        owner: Address,
        spender: Address,
    },
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    Fund(FundingCall),
    Await(TxHandle),
}

#[derive(Debug, Clone)]
enum Receipt {
    Pending,
    Mined(Confirmation),
    Gated(Arc<Notify>),
    Unreachable,
}

#[derive(Debug, Default)]
struct State {
    allowances: HashMap<(Address, Address, Address), U256>,
    journal: Vec<Call>,
    receipts: HashMap<TxHandle, Receipt>,
    approvals: HashMap<TxHandle, (Address, Address, U256)>,
    next_tx: u64,
    fail_reads: bool,
    fail_approval_submit: bool,
    fail_funding_submit: bool,
    // Leave allowances untouched when approvals confirm.
    ignore_approvals: bool,
    signer: Option<Address>,
}

/// In-memory chain for a single payer account.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<State>>,
    approval: Arc<Mutex<Script>>,
    funding: Arc<Mutex<Script>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            approval: Arc::new(Mutex::new(Script::Success)),
            funding: Arc::new(Mutex::new(Script::Success)),
        }
    }

    pub fn with_allowance(self, token: Address, spender: Address, amount: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, PAYER, spender), U256::from(amount));
        self
    }

    pub fn approvals_answer(self, script: Script) -> Self {
        *self.approval.lock().unwrap() = script;
        self
    }

    pub fn funding_answers(self, script: Script) -> Self {
        *self.funding.lock().unwrap() = script;
        self
    }

    pub fn failing_reads(self) -> Self {
        self.state.lock().unwrap().fail_reads = true;
        self
    }

    pub fn failing_approval_submit(self) -> Self {
        self.state.lock().unwrap().fail_approval_submit = true;
        self
    }

    pub fn failing_funding_submit(self) -> Self {
        self.state.lock().unwrap().fail_funding_submit = true;
        self
    }

    pub fn ignoring_approvals(self) -> Self {
        self.state.lock().unwrap().ignore_approvals = true;
        self
    }

    pub fn signing_as(self, signer: Address) -> Self {
        self.state.lock().unwrap().signer = Some(signer);
        self
    }

    pub fn set_funding_script(&self, script: Script) {
        *self.funding.lock().unwrap() = script;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn allowance(&self, token: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, PAYER, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn journal(&self) -> Vec<Call> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn approvals(&self) -> Vec<Call> {
        self.journal()
            .into_iter()
            .filter(|c| matches!(c, Call::Approve { .. }))
            .collect()
    }

    pub fn fundings(&self) -> Vec<FundingCall> {
        self.journal()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fund(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Mine a transaction that previously timed out.
    pub fn mine(&self, handle: TxHandle, confirmation: Confirmation) {
        self.state
            .lock()
            .unwrap()
            .receipts
            .insert(handle, Receipt::Mined(confirmation));
    }

    fn submit(&self, script: &Mutex<Script>) -> TxHandle {
        let mut state = self.state.lock().unwrap();
        state.next_tx += 1;
        let handle = TxHandle(B256::from(U256::from(state.next_tx)));
        let receipt = match script.lock().unwrap().clone() {
            Script::Success => Receipt::Mined(Confirmation::success()),
            Script::Revert(reason) => Receipt::Mined(Confirmation::reverted(reason)),
            Script::Timeout => Receipt::Pending,
            Script::Gated(gate) => Receipt::Gated(gate),
            Script::ReadError => Receipt::Unreachable,
        };
        state.receipts.insert(handle, receipt);
        handle
    }

    fn apply(&self, handle: TxHandle, confirmation: &Confirmation) {
        let mut state = self.state.lock().unwrap();
        if !confirmation.success || state.ignore_approvals {
            return;
        }
        if let Some((token, spender, amount)) = state.approvals.remove(&handle) {
            state.allowances.insert((token, PAYER, spender), amount);
        }
    }
}

impl ChainAccessor for MockChain {
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(Call::ReadAllowance {
            token,
            owner,
            spender,
        });
        if state.fail_reads {
            return Err(ChainError::Read("connection refused".into()));
        }
        Ok(state
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHandle, ChainError> {
        {
            let mut state = self.state.lock().unwrap();
            state.journal.push(Call::Approve {
                token,
                spender,
                amount,
            });
            if state.fail_approval_submit {
                return Err(ChainError::Submission("user rejected the request".into()));
            }
        }
        let handle = self.submit(&self.approval);
        self.state
            .lock()
            .unwrap()
            .approvals
            .insert(handle, (token, spender, amount));
        Ok(handle)
    }

    async fn submit_funding(&self, call: FundingCall) -> Result<TxHandle, ChainError> {
        {
            let mut state = self.state.lock().unwrap();
            state.journal.push(Call::Fund(call));
            if state.fail_funding_submit {
                return Err(ChainError::Submission("insufficient funds for gas".into()));
            }
        }
        Ok(self.submit(&self.funding))
    }

    async fn await_confirmation(
        &self,
        handle: TxHandle,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let receipt = {
            let mut state = self.state.lock().unwrap();
            state.journal.push(Call::Await(handle));
            state.receipts.get(&handle).cloned()
        };
        let confirmation = match receipt {
            Some(Receipt::Mined(confirmation)) => confirmation,
            Some(Receipt::Gated(gate)) => {
                gate.notified().await;
                Confirmation::success()
            }
            Some(Receipt::Pending) => {
                return Err(ChainError::Timeout {
                    handle,
                    waited: timeout,
                })
            }
            Some(Receipt::Unreachable) => {
                return Err(ChainError::Read("connection reset by peer".into()))
            }
            None => return Err(ChainError::Read(format!("unknown transaction {handle}"))),
        };
        self.apply(handle, &confirmation);
        Ok(confirmation)
    }

    fn funding_payload(&self, invoice: &Invoice) -> Bytes {
        Bytes::copy_from_slice(invoice.payer.as_slice())
    }

    fn signer(&self) -> Option<Address> {
        self.state.lock().unwrap().signer
    }
}

pub fn invoice(id: u64, currency: &str, amount: &str) -> Invoice {
    Invoice::parse(&id.to_string(), currency, amount, PAYER, REGISTRAR).unwrap()
}

/// Poll `condition` for up to a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
