//! Exchanges opened by a session, one per submitted write.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::{message::Message, pending::CorrelationId};

/// Where a write stands on its exchange.
#[derive(Debug)]
pub(crate) enum Stage {
    /// The `TimedRequest` is out. `write` goes once the node accepts it, as
    /// long as `window_closes` hasn't passed.
    AwaitingTimedAck {
        write: Message,
        window_closes: Instant,
    },
    AwaitingWriteResponse,
}

#[derive(Debug)]
pub(crate) struct Exchange {
    pub correlation: CorrelationId,
    pub sequence: u64,
    pub stage: Stage,
    /// The node acknowledged a message on this exchange
    pub acked: bool,
}

impl Exchange {
    pub fn write(correlation: CorrelationId, sequence: u64) -> Self {
        Self {
            correlation,
            sequence,
            stage: Stage::AwaitingWriteResponse,
            acked: false,
        }
    }

    pub fn timed(
        correlation: CorrelationId,
        sequence: u64,
        write: Message,
        window_closes: Instant,
    ) -> Self {
        Self {
            correlation,
            sequence,
            stage: Stage::AwaitingTimedAck {
                write,
                window_closes,
            },
            acked: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ExchangeTable {
    next_id: u16,
    exchanges: HashMap<u16, Exchange>,
}

impl ExchangeTable {
    /// Exchange ids start at a random value (4.10.2)
    pub fn new() -> Self {
        Self::starting_at(rand::random())
    }

    pub fn starting_at(first_id: u16) -> Self {
        Self {
            next_id: first_id,
            exchanges: HashMap::new(),
        }
    }

    /// The next id not held by an open exchange.
    pub fn allocate(&mut self) -> Option<u16> {
        for _ in 0..=u16::MAX {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.exchanges.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }

    pub fn insert(&mut self, id: u16, exchange: Exchange) {
        self.exchanges.insert(id, exchange);
    }

    pub fn get(&self, id: u16) -> Option<&Exchange> {
        self.exchanges.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Exchange> {
        self.exchanges.get_mut(&id)
    }

    pub fn remove(&mut self, id: u16) -> Option<Exchange> {
        self.exchanges.remove(&id)
    }

    /// Drop exchanges whose write is no longer pending, such as expired ones.
    pub fn retain(&mut self, mut pending: impl FnMut(CorrelationId) -> bool) {
        self.exchanges
            .retain(|_, exchange| pending(exchange.correlation));
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

/// Counter for messages sent on a secure unicast session, starting at a
/// random value in `1..=2^28` (4.5.1.1).
#[derive(Debug)]
pub(crate) struct MessageCounter(u32);

impl MessageCounter {
    pub fn new() -> Self {
        Self(rand::random::<u32>() % (1 << 28) + 1)
    }

    pub fn next(&mut self) -> u32 {
        let counter = self.0;
        self.0 = self.0.wrapping_add(1);
        counter
    }
}
