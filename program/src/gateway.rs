// Lottery Program - Randomness oracle boundary
use std::collections::BTreeMap;

use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::{
    engine::{PrizeVault, RaffleEngine},
    error::LotteryError,
    events::LotteryEvent,
};

/// What a consumer asks the oracle for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessParams {
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Request/fulfil protocol of a verifiable randomness oracle.
///
/// Requests are answered asynchronously; the answer arrives through
/// [`deliver`], which checks it against the pending request first.
pub trait RandomnessGateway {
    type Error: From<LotteryError>;

    /// Registers a request and returns its id. Ids are unique and start at 1.
    fn request_randomness(
        &mut self,
        consumer: &Pubkey,
        params: &RandomnessParams,
    ) -> Result<u64, Self::Error>;

    /// Consumer of a request still waiting for its answer
    fn pending_consumer(&self, request_id: u64) -> Option<Pubkey>;

    /// Marks the request as answered. A consumed id is never pending again.
    fn consume(&mut self, request_id: u64) -> Result<(), Self::Error>;
}

/// Hands the oracle's answer to the engine that requested it.
///
/// The request is consumed only after the engine settled successfully.
pub fn deliver<G, V>(
    gateway: &mut G,
    engine: &mut RaffleEngine,
    request_id: u64,
    random_words: &[u64],
    now: UnixTimestamp,
    vault: &mut V,
) -> Result<LotteryEvent, G::Error>
where
    G: RandomnessGateway + ?Sized,
    V: PrizeVault + ?Sized,
{
    match gateway.pending_consumer(request_id) {
        Some(consumer) if consumer == *engine.consumer() => {}
        _ => return Err(LotteryError::UnknownRequest.into()),
    }
    let event = engine.fulfill_randomness(request_id, random_words, now, vault)?;
    gateway.consume(request_id)?;
    Ok(event)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub consumer: Pubkey,
    pub params: RandomnessParams,
}

/// In-memory coordinator for tests and local development; requests are
/// answered synchronously whenever the caller decides to.
#[derive(Clone, Debug)]
pub struct MockCoordinator {
    next_request_id: u64,
    pending: BTreeMap<u64, PendingRequest>,
}

impl Default for MockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCoordinator {
    pub fn new() -> Self {
        Self {
            next_request_id: 1,
            pending: BTreeMap::new(),
        }
    }

    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn pending_request(&self, request_id: u64) -> Option<&PendingRequest> {
        self.pending.get(&request_id)
    }

    pub fn fulfill_random_words<V>(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        engine: &mut RaffleEngine,
        now: UnixTimestamp,
        vault: &mut V,
    ) -> Result<LotteryEvent, LotteryError>
    where
        V: PrizeVault + ?Sized,
    {
        deliver(self, engine, request_id, random_words, now, vault)
    }
}

impl RandomnessGateway for MockCoordinator {
    type Error = LotteryError;

    fn request_randomness(
        &mut self,
        consumer: &Pubkey,
        params: &RandomnessParams,
    ) -> Result<u64, LotteryError> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.insert(
            request_id,
            PendingRequest {
                consumer: *consumer,
                params: *params,
            },
        );
        Ok(request_id)
    }

    fn pending_consumer(&self, request_id: u64) -> Option<Pubkey> {
        self.pending.get(&request_id).map(|request| request.consumer)
    }

    fn consume(&mut self, request_id: u64) -> Result<(), LotteryError> {
        self.pending
            .remove(&request_id)
            .map(|_| ())
            .ok_or(LotteryError::UnknownRequest)
    }
}
