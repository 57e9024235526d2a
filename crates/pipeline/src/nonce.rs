//! Per account nonce allocation.

/// Hands out monotonically increasing nonces for a single submitting account.
///
/// Seeded once per run from the account's pending transaction count. Every
/// transaction built afterwards reserves its slot here instead of the caller
/// juggling manual offsets, so queueing several transactions before the
/// first receipt arrives cannot produce a collision or a gap.
#[derive(Debug)]
pub struct NonceAllocator {
    next: u64,
}

impl NonceAllocator {
    /// Create an allocator whose first reservation will be `next`.
    pub const fn new(next: u64) -> Self {
        Self { next }
    }

    /// Reserve the next nonce. Reservations are never handed out twice.
    pub fn reserve(&mut self) -> u64 {
        let nonce = self.next;
        self.next += 1;
        nonce
    }

    /// The nonce the next reservation would return.
    pub const fn peek(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod test {
    use super::NonceAllocator;
    use alloy::{network::TransactionBuilder, primitives::Address, rpc::types::TransactionRequest};

    #[test]
    fn reservations_are_sequential() {
        let mut nonces = NonceAllocator::new(7);
        assert_eq!(nonces.peek(), 7);
        assert_eq!(nonces.reserve(), 7);
        assert_eq!(nonces.reserve(), 8);
        assert_eq!(nonces.reserve(), 9);
        assert_eq!(nonces.peek(), 10);
    }

    #[test]
    fn envelopes_carry_reserved_nonces() {
        let mut nonces = NonceAllocator::new(3);

        let first = TransactionRequest::default()
            .with_to(Address::ZERO)
            .with_nonce(nonces.reserve());
        let second = TransactionRequest::default()
            .with_to(Address::ZERO)
            .with_nonce(nonces.reserve());

        assert_eq!(first.nonce, Some(3));
        assert_eq!(second.nonce, Some(4));
    }
}
