// Lottery Program - State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::error::LotteryError;

/// Random words requested per round
pub const NUM_WORDS: u32 = 1;
/// Confirmations the oracle waits before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;
/// Consumers one subscription can fund
pub const MAX_CONSUMERS: usize = 8;

/// Lifecycle of a lottery round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the oracle to deliver randomness
    Calculating,
}

impl Default for RaffleState {
    fn default() -> Self {
        RaffleState::Open
    }
}

/// Construction parameters of a lottery, fixed for its whole life
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LotteryParams {
    /// Minimum payment per entry in lamports
    pub entrance_fee: u64,
    /// Seconds between settlements
    pub interval: u64,
    /// Oracle key hash selecting the priority lane
    pub gas_lane: [u8; 32],
    /// Subscription paying for randomness requests
    pub subscription_id: u64,
    /// Compute budget the oracle reserves for the callback
    pub callback_gas_limit: u32,
    /// Entries one round can hold
    pub max_players: u32,
}

impl LotteryParams {
    pub fn validate(&self) -> Result<(), LotteryError> {
        if self.entrance_fee == 0 || self.interval == 0 || self.max_players == 0 {
            return Err(LotteryError::InvalidConfig);
        }
        Ok(())
    }
}

/// Lottery account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Lottery {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Deployer of the lottery
    pub authority: Pubkey,
    /// Coordinator account serving randomness requests
    pub coordinator: Pubkey,
    pub subscription_id: u64,
    pub gas_lane: [u8; 32],
    pub callback_gas_limit: u32,
    /// Minimum payment per entry in lamports
    pub entrance_fee: u64,
    /// Seconds that must pass between settlements
    pub interval: u64,
    pub state: RaffleState,
    /// Initialization or last settlement time
    pub last_timestamp: UnixTimestamp,
    /// Winner of the last settled round
    pub recent_winner: Option<Pubkey>,
    /// Randomness request in flight for this round
    pub pending_request_id: Option<u64>,
    pub max_players: u32,
    /// Entries in order of arrival, one per paid entry
    pub players: Vec<Pubkey>,
}

impl Lottery {
    /// Size of everything except the player entries
    pub const FIXED_LEN: usize = 1 + 32 + 32 + 8 + 32 + 4 + 8 + 8 + 1 + 8 + 33 + 9 + 4 + 4;

    /// Account size able to hold `max_players` entries
    pub fn space(max_players: u32) -> usize {
        Self::FIXED_LEN + 32 * max_players as usize
    }

    pub fn new(
        authority: Pubkey,
        coordinator: Pubkey,
        params: &LotteryParams,
        now: UnixTimestamp,
    ) -> Result<Self, LotteryError> {
        params.validate()?;
        Ok(Self {
            is_initialized: true,
            authority,
            coordinator,
            subscription_id: params.subscription_id,
            gas_lane: params.gas_lane,
            callback_gas_limit: params.callback_gas_limit,
            entrance_fee: params.entrance_fee,
            interval: params.interval,
            state: RaffleState::Open,
            last_timestamp: now,
            recent_winner: None,
            pending_request_id: None,
            max_players: params.max_players,
            players: Vec::with_capacity(params.max_players as usize),
        })
    }

    /// Reads the account data, ignoring unused trailing capacity
    pub fn unpack(src: &[u8]) -> Result<Self, ProgramError> {
        let lottery =
            Self::deserialize(&mut &src[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !lottery.is_initialized {
            return Err(LotteryError::NotInitialized.into());
        }
        Ok(lottery)
    }

    pub fn pack_into(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut &mut dst[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn number_of_players(&self) -> u64 {
        self.players.len() as u64
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.players.get(index)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }
}

/// Randomness subscription, funded in lamports and shared by its consumers
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct Subscription {
    pub is_initialized: bool,
    pub id: u64,
    pub owner: Pubkey,
    /// Funded lamports not yet spent on fulfilments
    pub balance: u64,
    pub request_count: u64,
    pub consumers: Vec<Pubkey>,
}

impl Subscription {
    pub const LEN: usize = 1 + 8 + 32 + 8 + 8 + 4 + 32 * MAX_CONSUMERS;

    pub fn unpack(src: &[u8]) -> Result<Self, ProgramError> {
        let subscription =
            Self::deserialize(&mut &src[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !subscription.is_initialized {
            return Err(LotteryError::NotInitialized.into());
        }
        Ok(subscription)
    }

    pub fn pack_into(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut &mut dst[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn is_consumer(&self, consumer: &Pubkey) -> bool {
        self.consumers.contains(consumer)
    }

    /// Registers a consumer; registering twice is a no-op
    pub fn add_consumer(&mut self, consumer: Pubkey) -> Result<(), LotteryError> {
        if self.is_consumer(&consumer) {
            return Ok(());
        }
        if self.consumers.len() >= MAX_CONSUMERS {
            return Err(LotteryError::ConsumerCapacityReached);
        }
        self.consumers.push(consumer);
        Ok(())
    }
}

/// Randomness coordinator, the on-chain side of the oracle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coordinator {
    pub is_initialized: bool,
    /// Oracle key allowed to fulfil requests
    pub authority: Pubkey,
    /// Lamports charged to a subscription per fulfilment
    pub fee_per_request: u64,
    /// Id handed to the next request, starts at 1
    pub next_request_id: u64,
    /// Id handed to the next subscription, starts at 1
    pub next_subscription_id: u64,
}

/// Pending randomness request; the account is closed once fulfilled
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RandomnessRequest {
    pub is_initialized: bool,
    pub request_id: u64,
    pub subscription_id: u64,
    /// Lottery account the answer is delivered to
    pub consumer: Pubkey,
    /// Payer of the request account, refunded on close
    pub requester: Pubkey,
    pub num_words: u32,
    pub callback_gas_limit: u32,
    pub gas_lane: [u8; 32],
    pub request_slot: u64,
}

impl Sealed for Coordinator {}
impl Sealed for RandomnessRequest {}

impl IsInitialized for Coordinator {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl IsInitialized for RandomnessRequest {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Coordinator {
    const LEN: usize = 1 + 32 + 8 + 8 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Coordinator::LEN];
        let (is_initialized, authority, fee_per_request, next_request_id, next_subscription_id) =
            array_refs![src, 1, 32, 8, 8, 8];

        Ok(Coordinator {
            is_initialized: is_initialized[0] != 0,
            authority: Pubkey::new_from_array(*authority),
            fee_per_request: u64::from_le_bytes(*fee_per_request),
            next_request_id: u64::from_le_bytes(*next_request_id),
            next_subscription_id: u64::from_le_bytes(*next_subscription_id),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Coordinator::LEN];
        let (
            is_initialized_dst,
            authority_dst,
            fee_per_request_dst,
            next_request_id_dst,
            next_subscription_id_dst,
        ) = mut_array_refs![dst, 1, 32, 8, 8, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        authority_dst.copy_from_slice(self.authority.as_ref());
        *fee_per_request_dst = self.fee_per_request.to_le_bytes();
        *next_request_id_dst = self.next_request_id.to_le_bytes();
        *next_subscription_id_dst = self.next_subscription_id.to_le_bytes();
    }
}

impl Pack for RandomnessRequest {
    const LEN: usize = 1 + 8 + 8 + 32 + 32 + 4 + 4 + 32 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RandomnessRequest::LEN];
        let (
            is_initialized,
            request_id,
            subscription_id,
            consumer,
            requester,
            num_words,
            callback_gas_limit,
            gas_lane,
            request_slot,
        ) = array_refs![src, 1, 8, 8, 32, 32, 4, 4, 32, 8];

        Ok(RandomnessRequest {
            is_initialized: is_initialized[0] != 0,
            request_id: u64::from_le_bytes(*request_id),
            subscription_id: u64::from_le_bytes(*subscription_id),
            consumer: Pubkey::new_from_array(*consumer),
            requester: Pubkey::new_from_array(*requester),
            num_words: u32::from_le_bytes(*num_words),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            gas_lane: *gas_lane,
            request_slot: u64::from_le_bytes(*request_slot),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RandomnessRequest::LEN];
        let (
            is_initialized_dst,
            request_id_dst,
            subscription_id_dst,
            consumer_dst,
            requester_dst,
            num_words_dst,
            callback_gas_limit_dst,
            gas_lane_dst,
            request_slot_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 32, 4, 4, 32, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        *request_id_dst = self.request_id.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        consumer_dst.copy_from_slice(self.consumer.as_ref());
        requester_dst.copy_from_slice(self.requester.as_ref());
        *num_words_dst = self.num_words.to_le_bytes();
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        gas_lane_dst.copy_from_slice(&self.gas_lane);
        *request_slot_dst = self.request_slot.to_le_bytes();
    }
}
