// Lottery Program - Prize pool held as lamports on the lottery account
use solana_program::{account_info::AccountInfo, msg, pubkey::Pubkey};

use crate::{engine::PrizeVault, error::LotteryError, utils::transfer_lamports};

/// The lottery account's lamports above its rent-exempt minimum are the pool.
pub struct LotteryVault<'a, 'b> {
    lottery_info: &'b AccountInfo<'a>,
    winner_info: &'b AccountInfo<'a>,
    rent_exempt_minimum: u64,
}

impl<'a, 'b> LotteryVault<'a, 'b> {
    pub fn new(
        lottery_info: &'b AccountInfo<'a>,
        winner_info: &'b AccountInfo<'a>,
        rent_exempt_minimum: u64,
    ) -> Self {
        Self {
            lottery_info,
            winner_info,
            rent_exempt_minimum,
        }
    }

    /// Pool size of any lottery account
    pub fn pool_balance(lottery_info: &AccountInfo, rent_exempt_minimum: u64) -> u64 {
        lottery_info.lamports().saturating_sub(rent_exempt_minimum)
    }
}

impl<'a, 'b> PrizeVault for LotteryVault<'a, 'b> {
    fn balance(&self) -> u64 {
        Self::pool_balance(self.lottery_info, self.rent_exempt_minimum)
    }

    fn pay(&mut self, winner: &Pubkey, amount: u64) -> Result<(), LotteryError> {
        if self.winner_info.key != winner {
            msg!(
                "Winner account {} does not match drawn winner {}",
                self.winner_info.key,
                winner
            );
            return Err(LotteryError::PayoutFailed);
        }
        if !self.winner_info.is_writable {
            msg!("Winner account must be writable");
            return Err(LotteryError::PayoutFailed);
        }
        if amount > self.balance() {
            return Err(LotteryError::PayoutFailed);
        }
        transfer_lamports(self.lottery_info, self.winner_info, amount).map_err(|e| {
            msg!("Lamport transfer failed: {}", e);
            LotteryError::PayoutFailed
        })
    }
}
