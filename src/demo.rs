//! Simulated incoming transfers for the demo binary
//!
//! Unsafe tokens get an address with a `1111` prefix, which the mock Deep3
//! analyzer scores as high risk.

use crate::services::IncomingTransaction;
use parking_lot::Mutex;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const ADDRESS_LEN: usize = 44;
const SUSPICIOUS_PREFIX: &str = "1111";

/// Token offered by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoToken {
    pub name: &'static str,
    pub symbol: &'static str,
    pub safe: bool,
}

pub const DEMO_TOKENS: [DemoToken; 6] = [
    DemoToken { name: "Bonk Token", symbol: "BONK", safe: true },
    DemoToken { name: "Free Airdrop SOL", symbol: "SCAM", safe: false },
    DemoToken { name: "Jupiter", symbol: "JUP", safe: true },
    DemoToken { name: "Double Your Money", symbol: "XXX", safe: false },
    DemoToken { name: "Raydium", symbol: "RAY", safe: true },
    DemoToken { name: "Mystery Box Reward", symbol: "FAKE", safe: false },
];

pub struct DemoGenerator {
    rng: Mutex<fastrand::Rng>,
}

impl Default for DemoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Reproducible sequence
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Random 44-character base58 address
    pub fn wallet_address(&self) -> String {
        let mut rng = self.rng.lock();
        random_base58(&mut rng, ADDRESS_LEN)
    }

    /// Random transfer of a demo token into `wallet_address`
    pub fn next_transaction(&self, wallet_address: &str) -> IncomingTransaction {
        let mut rng = self.rng.lock();
        let token = DEMO_TOKENS[rng.usize(..DEMO_TOKENS.len())];

        let token_address = if token.safe {
            random_base58(&mut rng, ADDRESS_LEN)
        } else {
            let mut address = String::with_capacity(ADDRESS_LEN);
            address.push_str(SUSPICIOUS_PREFIX);
            address.push_str(&random_base58(&mut rng, ADDRESS_LEN - SUSPICIOUS_PREFIX.len()));
            address
        };
        let amount = format!("{:.2}", rng.f64() * 1_000_000.0);

        IncomingTransaction::new(wallet_address, token_address)
            .with_token(token.name, token.symbol)
            .with_amount(amount)
    }
}

fn random_base58(rng: &mut fastrand::Rng, len: usize) -> String {
    (0..len)
        .map(|_| BASE58_ALPHABET[rng.usize(..BASE58_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_base58() {
        let gen = DemoGenerator::with_seed(7);
        let address = gen.wallet_address();
        assert_eq!(address.len(), ADDRESS_LEN);
        assert!(bs58::decode(&address).into_vec().is_ok());
    }

    #[test]
    fn test_unsafe_tokens_get_suspicious_prefix() {
        let gen = DemoGenerator::with_seed(42);
        for _ in 0..50 {
            let tx = gen.next_transaction("Wallet");
            let symbol = tx.token_symbol.as_deref().unwrap();
            let token = DEMO_TOKENS.iter().find(|t| t.symbol == symbol).unwrap();
            assert_eq!(tx.token_address.len(), ADDRESS_LEN);
            assert_eq!(tx.wallet_address, "Wallet");
            if !token.safe {
                assert!(tx.token_address.starts_with(SUSPICIOUS_PREFIX));
            }
            let amount: f64 = tx.amount.as_deref().unwrap().parse().unwrap();
            assert!((0.0..=1_000_000.0).contains(&amount));
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let a = DemoGenerator::with_seed(3);
        let b = DemoGenerator::with_seed(3);
        assert_eq!(a.next_transaction("W"), b.next_transaction("W"));
    }
}
