// File: src/lock/kind.rs

/// One coordination key per privileged periodic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Genesis,
    Calendar,
    Nist,
    BtcAnchor,
    BtcConfirm,
    EthAnchor,
    EthConfirm,

    /// Held around every block write, inside the writer's own kind
    Ledger,
}

impl LockKind {
    pub const ALL: [LockKind; 8] = [
        LockKind::Genesis,
        LockKind::Calendar,
        LockKind::Nist,
        LockKind::BtcAnchor,
        LockKind::BtcConfirm,
        LockKind::EthAnchor,
        LockKind::EthConfirm,
        LockKind::Ledger,
    ];

    /// Lock key shared by all replicas
    pub fn key(&self) -> &'static str {
        match self {
            LockKind::Genesis => "genesis",
            LockKind::Calendar => "calendar",
            LockKind::Nist => "nist",
            LockKind::BtcAnchor => "btc-anchor",
            LockKind::BtcConfirm => "btc-confirm",
            LockKind::EthAnchor => "eth-anchor",
            LockKind::EthConfirm => "eth-confirm",
            LockKind::Ledger => "ledger",
        }
    }

    /// Informational value stored with a held lease
    pub fn operation(&self) -> &'static str {
        match self {
            LockKind::Genesis => "write genesis block",
            LockKind::Calendar => "write cal block",
            LockKind::Nist => "write nist block",
            LockKind::BtcAnchor => "btc anchor rollup",
            LockKind::BtcConfirm => "write btc-confirm block",
            LockKind::EthAnchor => "eth anchor rollup",
            LockKind::EthConfirm => "write eth-confirm block",
            LockKind::Ledger => "append block",
        }
    }
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::BlockType;

    #[test]
    fn test_keys_are_unique_and_match_block_types() {
        let keys: std::collections::HashSet<_> = LockKind::ALL.iter().map(|k| k.key()).collect();
        assert_eq!(keys.len(), LockKind::ALL.len());

        // Every block type has a lock of the same name
        for t in BlockType::ALL {
            assert!(keys.contains(t.as_str()), "{t}");
        }
    }
}
