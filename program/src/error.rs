use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use thiserror::Error;

use crate::state::RaffleState;

/// Errors that may be returned by the Lottery program
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Entry attempted while the round is calculating a winner
    #[error("Lottery is not open")]
    NotOpen,

    /// Payment below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientEntry,

    /// Upkeep requested while the readiness check is false
    #[error("Upkeep not needed (balance: {balance}, players: {num_players}, state: {state:?})")]
    UpkeepNotNeeded {
        balance: u64,
        num_players: u64,
        state: RaffleState,
    },

    /// Fulfilment for a request this round never issued, or already consumed
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// Transfer of the pool to the winner failed
    #[error("Payout to the winner failed")]
    PayoutFailed,

    #[error("Account already initialized")]
    AlreadyInitialized,

    #[error("Account not initialized")]
    NotInitialized,

    /// Zero fee, zero interval or zero capacity
    #[error("Invalid lottery configuration")]
    InvalidConfig,

    #[error("Player capacity reached")]
    PlayerCapacityReached,

    #[error("No random words supplied")]
    MissingRandomWords,

    /// Fulfilment not signed by the coordinator's oracle authority
    #[error("Signer is not the oracle authority")]
    NotOracleAuthority,

    #[error("Consumer is not registered on the subscription")]
    ConsumerNotRegistered,

    #[error("Subscription consumer list is full")]
    ConsumerCapacityReached,

    #[error("Subscription balance cannot cover the request fee")]
    InsufficientSubscriptionBalance,

    /// Settlement attempted on a round without entries
    #[error("Round has no players")]
    NoPlayers,
}

impl LotteryError {
    /// Stable custom error code reported through `ProgramError::Custom`.
    pub fn code(&self) -> u32 {
        match self {
            LotteryError::InvalidInstruction => 0,
            LotteryError::NotOpen => 1,
            LotteryError::InsufficientEntry => 2,
            LotteryError::UpkeepNotNeeded { .. } => 3,
            LotteryError::UnknownRequest => 4,
            LotteryError::PayoutFailed => 5,
            LotteryError::AlreadyInitialized => 6,
            LotteryError::NotInitialized => 7,
            LotteryError::InvalidConfig => 8,
            LotteryError::PlayerCapacityReached => 9,
            LotteryError::MissingRandomWords => 10,
            LotteryError::NotOracleAuthority => 11,
            LotteryError::ConsumerNotRegistered => 12,
            LotteryError::ConsumerCapacityReached => 13,
            LotteryError::InsufficientSubscriptionBalance => 14,
            LotteryError::NoPlayers => 15,
        }
    }
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for LotteryError {
    fn type_of() -> &'static str {
        "Lottery Error"
    }
}
