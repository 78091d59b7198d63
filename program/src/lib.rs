// Lottery Program
// A provably fair, automated lottery on Solana

// Round logic
pub mod engine;
pub mod state;
pub mod upkeep;

// Randomness oracle and prize payout
pub mod coordinator;
pub mod gateway;
pub mod vault;

pub mod config;
pub mod error;
pub mod events;
pub mod instruction;
pub mod processor;
pub mod utils;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
