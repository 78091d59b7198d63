// Lottery Program - Instructions
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;

use crate::{
    error::LotteryError,
    state::LotteryParams,
    utils::{find_coordinator_address, find_request_address, find_subscription_address},
};

/// Most random words one fulfilment may carry
pub const MAX_RANDOM_WORDS: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum LotteryInstruction {
    /// Create the randomness coordinator; the signer becomes the oracle authority
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Oracle authority, pays for the coordinator account
    /// 1. `[writable]` Coordinator account (PDA)
    /// 2. `[]` The system program
    InitializeCoordinator {
        /// Lamports charged to a subscription per fulfilment
        fee_per_request: u64,
    },

    /// Open a randomness subscription owned by the signer
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Subscription owner, pays for the account
    /// 1. `[writable]` Coordinator account
    /// 2. `[writable]` Subscription account (PDA of the next subscription id)
    /// 3. `[]` The system program
    CreateSubscription,

    /// Move lamports into a subscription's balance
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Funder
    /// 1. `[writable]` Subscription account
    /// 2. `[]` The system program
    FundSubscription { amount: u64 },

    /// Allow a lottery to request randomness on a subscription
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription account
    AddConsumer { consumer: Pubkey },

    /// Create a lottery
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Deployer, pays for the lottery account
    /// 1. `[signer, writable]` Lottery account, must not exist yet
    /// 2. `[]` Coordinator account
    /// 3. `[]` The system program
    InitializeLottery { params: LotteryParams },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Player, pays the entry
    /// 1. `[writable]` Lottery account
    /// 2. `[]` The system program
    Enter {
        /// Payment in lamports, at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is needed as one byte of return data
    ///
    /// Accounts expected:
    /// 0. `[]` Lottery account
    CheckUpkeep,

    /// Close the round and request randomness
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Caller, pays for the request account
    /// 1. `[writable]` Lottery account
    /// 2. `[writable]` Coordinator account
    /// 3. `[writable]` Subscription account
    /// 4. `[writable]` Request account (PDA of the coordinator's next request id)
    /// 5. `[]` The system program
    PerformUpkeep,

    /// Deliver the oracle's answer and settle the round
    ///
    /// Accounts expected:
    /// 0. `[signer]` Oracle authority
    /// 1. `[writable]` Coordinator account
    /// 2. `[writable]` Subscription account
    /// 3. `[writable]` Request account
    /// 4. `[writable]` Requester, receives the request account's rent
    /// 5. `[writable]` Lottery account
    /// 6. `[writable]` Winner
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl LotteryInstruction {
    /// Unpacks a byte buffer into a LotteryInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(LotteryError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let (fee_per_request, _) = Self::unpack_u64(rest)?;
                Self::InitializeCoordinator { fee_per_request }
            }
            1 => Self::CreateSubscription,
            2 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::FundSubscription { amount }
            }
            3 => {
                let (consumer, _) = Self::unpack_fixed_bytes::<32>(rest)?;
                Self::AddConsumer {
                    consumer: Pubkey::new_from_array(consumer),
                }
            }
            4 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (gas_lane, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (max_players, _) = Self::unpack_u32(rest)?;
                Self::InitializeLottery {
                    params: LotteryParams {
                        entrance_fee,
                        interval,
                        gas_lane,
                        subscription_id,
                        callback_gas_limit,
                        max_players,
                    },
                }
            }
            5 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::Enter { amount }
            }
            6 => Self::CheckUpkeep,
            7 => Self::PerformUpkeep,
            8 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = rest
                    .split_first()
                    .ok_or(LotteryError::InvalidInstruction)?;
                if *count as usize > MAX_RANDOM_WORDS {
                    return Err(LotteryError::InvalidInstruction.into());
                }
                let mut random_words = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    let (word, next) = Self::unpack_u64(rest)?;
                    random_words.push(word);
                    rest = next;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            _ => return Err(LotteryError::InvalidInstruction.into()),
        })
    }

    /// Packs a LotteryInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeCoordinator { fee_per_request } => {
                buf.push(0);
                buf.extend_from_slice(&fee_per_request.to_le_bytes());
            }
            Self::CreateSubscription => buf.push(1),
            Self::FundSubscription { amount } => {
                buf.push(2);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::AddConsumer { consumer } => {
                buf.push(3);
                buf.extend_from_slice(consumer.as_ref());
            }
            Self::InitializeLottery { params } => {
                buf.push(4);
                buf.extend_from_slice(&params.entrance_fee.to_le_bytes());
                buf.extend_from_slice(&params.interval.to_le_bytes());
                buf.extend_from_slice(&params.gas_lane);
                buf.extend_from_slice(&params.subscription_id.to_le_bytes());
                buf.extend_from_slice(&params.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&params.max_players.to_le_bytes());
            }
            Self::Enter { amount } => {
                buf.push(5);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(6),
            Self::PerformUpkeep => buf.push(7),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(8);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.push(random_words.len() as u8);
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(LotteryError::InvalidInstruction.into());
        }
        let (bytes, rest) = input.split_at(N);
        let bytes: [u8; N] = bytes
            .try_into()
            .map_err(|_| LotteryError::InvalidInstruction)?;
        Ok((bytes, rest))
    }
}

/// Create initialize_coordinator instruction
pub fn initialize_coordinator(
    program_id: &Pubkey,
    oracle_authority: &Pubkey,
    fee_per_request: u64,
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*oracle_authority, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::InitializeCoordinator { fee_per_request }.pack(),
    }
}

/// Create create_subscription instruction; `subscription_id` is the
/// coordinator's next subscription id
pub fn create_subscription(program_id: &Pubkey, owner: &Pubkey, subscription_id: u64) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::CreateSubscription.pack(),
    }
}

/// Create fund_subscription instruction
pub fn fund_subscription(
    program_id: &Pubkey,
    funder: &Pubkey,
    subscription_id: u64,
    amount: u64,
) -> Instruction {
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::FundSubscription { amount }.pack(),
    }
}

/// Create add_consumer instruction
pub fn add_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
    consumer: &Pubkey,
) -> Instruction {
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(subscription, false),
        ],
        data: LotteryInstruction::AddConsumer {
            consumer: *consumer,
        }
        .pack(),
    }
}

/// Create initialize_lottery instruction
pub fn initialize_lottery(
    program_id: &Pubkey,
    authority: &Pubkey,
    lottery: &Pubkey,
    params: LotteryParams,
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(*lottery, true),
            AccountMeta::new_readonly(coordinator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::InitializeLottery { params }.pack(),
    }
}

/// Create enter instruction
pub fn enter(program_id: &Pubkey, player: &Pubkey, lottery: &Pubkey, amount: u64) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(*lottery, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::Enter { amount }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, lottery: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*lottery, false)],
        data: LotteryInstruction::CheckUpkeep.pack(),
    }
}

/// Create perform_upkeep instruction; `request_id` is the coordinator's next
/// request id
pub fn perform_upkeep(
    program_id: &Pubkey,
    caller: &Pubkey,
    lottery: &Pubkey,
    subscription_id: u64,
    request_id: u64,
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let (request, _) = find_request_address(program_id, request_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*caller, true),
            AccountMeta::new(*lottery, false),
            AccountMeta::new(coordinator, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new(request, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::PerformUpkeep.pack(),
    }
}

/// Create fulfill_random_words instruction
#[allow(clippy::too_many_arguments)]
pub fn fulfill_random_words(
    program_id: &Pubkey,
    oracle_authority: &Pubkey,
    subscription_id: u64,
    request_id: u64,
    requester: &Pubkey,
    lottery: &Pubkey,
    winner: &Pubkey,
    random_words: Vec<u64>,
) -> Instruction {
    let (coordinator, _) = find_coordinator_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let (request, _) = find_request_address(program_id, request_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*oracle_authority, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new(request, false),
            AccountMeta::new(*requester, false),
            AccountMeta::new(*lottery, false),
            AccountMeta::new(*winner, false),
        ],
        data: LotteryInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lottery_params_survive_the_codec() {
        let instruction = LotteryInstruction::InitializeLottery {
            params: LotteryParams {
                entrance_fee: 10_000_000,
                interval: 30,
                gas_lane: [9; 32],
                subscription_id: 4,
                callback_gas_limit: 500_000,
                max_players: 100,
            },
        };
        assert_eq!(
            LotteryInstruction::unpack(&instruction.pack()).unwrap(),
            instruction
        );
    }

    #[test]
    fn random_words_are_length_prefixed() {
        let instruction = LotteryInstruction::FulfillRandomWords {
            request_id: 1,
            random_words: vec![42, u64::MAX],
        };
        let data = instruction.pack();
        assert_eq!(data.len(), 1 + 8 + 1 + 16);
        assert_eq!(LotteryInstruction::unpack(&data).unwrap(), instruction);
    }

    #[test]
    fn truncated_or_unknown_data_is_rejected() {
        let invalid = ProgramError::from(LotteryError::InvalidInstruction);
        assert_eq!(LotteryInstruction::unpack(&[]).unwrap_err(), invalid);
        assert_eq!(LotteryInstruction::unpack(&[5, 1, 2]).unwrap_err(), invalid);
        assert_eq!(LotteryInstruction::unpack(&[42]).unwrap_err(), invalid);

        let mut words = LotteryInstruction::FulfillRandomWords {
            request_id: 1,
            random_words: vec![1, 2],
        }
        .pack();
        words.truncate(words.len() - 1);
        assert_eq!(LotteryInstruction::unpack(&words).unwrap_err(), invalid);
    }
}
