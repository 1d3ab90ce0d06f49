use std::fmt;

use alloy::primitives::{Address, U256};

use crate::chain::ChainAccessor;
use crate::error::ChainError;
use crate::invoice::ResolvedToken;

/// Result of an allowance check. Computed fresh per attempt, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceState {
    pub required: bool,
    /// Zero for the native currency, which has no allowance.
    pub current_allowance: U256,
}

/// Integer comparison deciding whether an approval must precede funding.
pub fn approval_required(amount: U256, current_allowance: U256) -> bool {
    amount > current_allowance
}

/// Read-only allowance check against a [`ChainAccessor`].
pub struct AllowanceEvaluator<'a, A> {
    accessor: &'a A,
}

impl<'a, A: ChainAccessor> AllowanceEvaluator<'a, A> {
    pub fn new(accessor: &'a A) -> Self {
        Self { accessor }
    }

    /// Decide whether `owner` must approve `spender` before paying `amount` of `token`.
    pub async fn evaluate(
        &self,
        token: &ResolvedToken,
        amount: U256,
        owner: Address,
        spender: Address,
    ) -> Result<AllowanceState, ChainError> {
        let address = match token {
            ResolvedToken::Native => {
                return Ok(AllowanceState {
                    required: false,
                    current_allowance: U256::ZERO,
                })
            }
            ResolvedToken::Erc20 { address, .. } => *address,
        };

        let current_allowance = self.accessor.read_allowance(address, owner, spender).await?;
        let required = approval_required(amount, current_allowance);

        tracing::debug!(
            token = %token.symbol(),
            owner = %owner,
            spender = %spender,
            allowance = %current_allowance,
            amount = %amount,
            required,
            "allowance evaluated"
        );

        Ok(AllowanceState {
            required,
            current_allowance,
        })
    }

    /// What a pay button for this invoice should offer next.
    pub async fn next_action(
        &self,
        token: &ResolvedToken,
        amount: U256,
        owner: Address,
        spender: Address,
    ) -> Result<NextAction, ChainError> {
        let state = self.evaluate(token, amount, owner, spender).await?;
        Ok(if state.required {
            NextAction::Approve {
                symbol: token.symbol().to_string(),
            }
        } else {
            NextAction::Pay
        })
    }
}

/// The step a payer would take next for an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    Approve { symbol: String },
    Pay,
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAction::Approve { symbol } => write!(f, "Approve {symbol}"),
            NextAction::Pay => f.write_str("Pay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_iff_amount_exceeds_allowance() {
        assert!(approval_required(U256::from(500), U256::ZERO));
        assert!(approval_required(U256::from(500), U256::from(499)));
        assert!(!approval_required(U256::from(500), U256::from(500)));
        assert!(!approval_required(U256::from(500), U256::MAX));
    }

    #[test]
    fn test_next_action_labels() {
        assert_eq!(
            NextAction::Approve {
                symbol: "DAI".into()
            }
            .to_string(),
            "Approve DAI"
        );
        assert_eq!(NextAction::Pay.to_string(), "Pay");
    }
}
