use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, I256, U256};

use crate::constants::NATIVE_SYMBOL;
use crate::error::InvoiceError;

/// Nota identifier as indexed by the registrar contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvoiceId(pub U256);

impl InvoiceId {
    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for InvoiceId {
    fn from(id: u64) -> Self {
        Self(U256::from(id))
    }
}

impl FromStr for InvoiceId {
    type Err = InvoiceError;

    /// Accepts decimal or `0x`-prefixed hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<U256>()
            .map(Self)
            .map_err(|e| InvoiceError::InvalidId(format!("{s:?}: {e}")))
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency an invoice is denominated in, as written on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Currency {
    Native,
    /// Symbolic token name, resolved through [`ChainConfig::resolve`](crate::ChainConfig::resolve).
    Token(String),
}

impl FromStr for Currency {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = s.trim();
        if symbol.is_empty() {
            return Err(InvoiceError::InvalidCurrency("empty symbol".to_string()));
        }
        if symbol.eq_ignore_ascii_case(NATIVE_SYMBOL) {
            return Ok(Currency::Native);
        }
        Ok(Currency::Token(symbol.to_ascii_uppercase()))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Native => f.write_str(NATIVE_SYMBOL),
            Currency::Token(symbol) => f.write_str(symbol),
        }
    }
}

/// A currency after registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedToken {
    Native,
    Erc20 { symbol: String, address: Address },
}

impl ResolvedToken {
    /// Contract address, `None` for the native currency.
    pub fn address(&self) -> Option<Address> {
        match self {
            ResolvedToken::Native => None,
            ResolvedToken::Erc20 { address, .. } => Some(*address),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            ResolvedToken::Native => NATIVE_SYMBOL,
            ResolvedToken::Erc20 { symbol, .. } => symbol,
        }
    }
}

/// An invoice to be settled. Immutable for the duration of a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: InvoiceId,
    pub currency: Currency,
    /// Amount in the token's smallest unit. Signed so that malformed
    /// upstream data (zero, negative) reaches the orchestrator and is rejected there.
    pub amount_raw: I256,
    pub payer: Address,
    /// Registrar contract that receives the funding call and spends the allowance.
    pub registrar: Address,
}

impl Invoice {
    /// Build an invoice from the textual fields a front-end or backend hands over.
    pub fn parse(
        id: &str,
        currency: &str,
        amount_raw: &str,
        payer: Address,
        registrar: Address,
    ) -> Result<Self, InvoiceError> {
        let amount_raw = I256::from_dec_str(amount_raw.trim())
            .map_err(|e| InvoiceError::InvalidAmount(format!("{amount_raw:?}: {e}")))?;
        Ok(Self {
            id: id.parse()?,
            currency: currency.parse()?,
            amount_raw,
            payer,
            registrar,
        })
    }

    /// Key under which in-flight and settled state is tracked.
    pub fn key(&self) -> InvoiceKey {
        InvoiceKey {
            registrar: self.registrar,
            id: self.id,
        }
    }

    /// Amount as an unsigned integer, `None` unless strictly positive.
    pub fn payable_amount(&self) -> Option<U256> {
        if self.amount_raw > I256::ZERO {
            Some(self.amount_raw.into_raw())
        } else {
            None
        }
    }
}

/// Notas are unique per registrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvoiceKey {
    pub registrar: Address,
    pub id: InvoiceId,
}

impl fmt::Display for InvoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.registrar, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_decimal_ids() {
        assert_eq!("42".parse::<InvoiceId>().unwrap(), InvoiceId::from(42));
        assert_eq!("0x2a".parse::<InvoiceId>().unwrap(), InvoiceId::from(42));
        assert!("forty-two".parse::<InvoiceId>().is_err());
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("native".parse::<Currency>().unwrap(), Currency::Native);
        assert_eq!("dai".parse::<Currency>().unwrap(), Currency::Token("DAI".into()));
        assert!("  ".parse::<Currency>().is_err());
    }

    #[test]
    fn test_payable_amount_rejects_zero_and_negative() {
        let payer = Address::repeat_byte(1);
        let registrar = Address::repeat_byte(2);

        let zero = Invoice::parse("1", "NATIVE", "0", payer, registrar).unwrap();
        assert_eq!(zero.payable_amount(), None);

        let negative = Invoice::parse("1", "NATIVE", "-5", payer, registrar).unwrap();
        assert_eq!(negative.payable_amount(), None);

        let one_ether = Invoice::parse("1", "NATIVE", "1000000000000000000", payer, registrar).unwrap();
        assert_eq!(
            one_ether.payable_amount(),
            Some(U256::from(1_000_000_000_000_000_000u128))
        );
    }

    #[test]
    fn test_amount_beyond_u128() {
        let payer = Address::repeat_byte(1);
        let registrar = Address::repeat_byte(2);
        let big = "340282366920938463463374607431768211456"; // 2^128
        let invoice = Invoice::parse("7", "DAI", big, payer, registrar).unwrap();
        assert_eq!(invoice.payable_amount(), Some(U256::from(1u8) << 128usize));
    }

    #[test]
    fn test_malformed_amount() {
        let err = Invoice::parse("1", "DAI", "1.5", Address::ZERO, Address::ZERO).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidAmount(_)));
    }
}
