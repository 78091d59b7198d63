// Lottery Program - Upkeep readiness
use solana_program::clock::UnixTimestamp;

use crate::state::{Lottery, RaffleState};

/// Outcome of the upkeep readiness check.
///
/// Upkeep is needed only when all four conditions hold. Each one is kept
/// separately so callers can report which one failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepCheck {
    /// At least `interval` seconds since the last settlement
    pub time_passed: bool,
    pub is_open: bool,
    pub has_players: bool,
    /// Pooled lamports above rent exemption
    pub has_balance: bool,
}

impl UpkeepCheck {
    pub fn evaluate(lottery: &Lottery, now: UnixTimestamp, balance: u64) -> Self {
        let time_passed = now
            .checked_sub(lottery.last_timestamp)
            .map_or(false, |elapsed| {
                elapsed >= 0 && elapsed as u64 >= lottery.interval
            });

        Self {
            time_passed,
            is_open: lottery.state == RaffleState::Open,
            has_players: !lottery.players.is_empty(),
            has_balance: balance > 0,
        }
    }

    pub fn is_needed(&self) -> bool {
        self.time_passed && self.is_open && self.has_players && self.has_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LotteryParams;
    use solana_program::pubkey::Pubkey;

    const START: UnixTimestamp = 1_000;

    fn lottery_with_player() -> Lottery {
        let params = LotteryParams {
            entrance_fee: 10_000_000,
            interval: 30,
            gas_lane: [0; 32],
            subscription_id: 1,
            callback_gas_limit: 500_000,
            max_players: 8,
        };
        let mut lottery = Lottery::new(Pubkey::new_unique(), Pubkey::new_unique(), &params, START)
            .unwrap();
        lottery.players.push(Pubkey::new_unique());
        lottery
    }

    #[test]
    fn needed_when_all_conditions_hold() {
        let lottery = lottery_with_player();
        let check = UpkeepCheck::evaluate(&lottery, START + 30, 10_000_000);
        assert!(check.is_needed());
    }

    #[test]
    fn not_needed_before_interval_elapses() {
        let lottery = lottery_with_player();
        let check = UpkeepCheck::evaluate(&lottery, START + 29, 10_000_000);
        assert!(!check.time_passed);
        assert!(!check.is_needed());
    }

    #[test]
    fn not_needed_while_calculating() {
        let mut lottery = lottery_with_player();
        lottery.state = RaffleState::Calculating;
        let check = UpkeepCheck::evaluate(&lottery, START + 60, 10_000_000);
        assert!(!check.is_open);
        assert!(!check.is_needed());
    }

    #[test]
    fn not_needed_without_players() {
        let mut lottery = lottery_with_player();
        lottery.players.clear();
        let check = UpkeepCheck::evaluate(&lottery, START + 60, 10_000_000);
        assert!(!check.has_players);
        assert!(!check.is_needed());
    }

    #[test]
    fn not_needed_without_balance() {
        let lottery = lottery_with_player();
        let check = UpkeepCheck::evaluate(&lottery, START + 60, 0);
        assert!(!check.has_balance);
        assert!(!check.is_needed());
    }

    #[test]
    fn clock_behind_last_settlement_counts_as_not_elapsed() {
        let lottery = lottery_with_player();
        let check = UpkeepCheck::evaluate(&lottery, START - 100, 10_000_000);
        assert!(!check.time_passed);
    }
}
