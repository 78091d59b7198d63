// Lottery Program - Round state machine
//
// OPEN --perform_upkeep--> CALCULATING --fulfill_randomness--> OPEN
use solana_program::{clock::UnixTimestamp, msg, pubkey::Pubkey};

use crate::{
    error::LotteryError,
    events::LotteryEvent,
    gateway::{RandomnessGateway, RandomnessParams},
    state::{Lottery, RaffleState, NUM_WORDS, REQUEST_CONFIRMATIONS},
    upkeep::UpkeepCheck,
};

/// Holds the pooled entry payments and pays out the winner.
pub trait PrizeVault {
    /// Lamports available for the prize
    fn balance(&self) -> u64;

    fn pay(&mut self, winner: &Pubkey, amount: u64) -> Result<(), LotteryError>;
}

/// Owns one lottery round and applies every transition to it.
#[derive(Debug, Clone)]
pub struct RaffleEngine {
    consumer: Pubkey,
    round: Lottery,
}

impl RaffleEngine {
    /// `consumer` is the identity the oracle answers to, the lottery account key
    pub fn new(consumer: Pubkey, round: Lottery) -> Self {
        Self { consumer, round }
    }

    pub fn consumer(&self) -> &Pubkey {
        &self.consumer
    }

    pub fn round(&self) -> &Lottery {
        &self.round
    }

    pub fn into_round(self) -> Lottery {
        self.round
    }

    pub fn randomness_params(&self) -> RandomnessParams {
        RandomnessParams {
            gas_lane: self.round.gas_lane,
            subscription_id: self.round.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: self.round.callback_gas_limit,
            num_words: NUM_WORDS,
        }
    }

    /// Records one entry for `participant`. The same participant may enter
    /// any number of times.
    pub fn enter(&mut self, payment: u64, participant: Pubkey) -> Result<LotteryEvent, LotteryError> {
        if self.round.state != RaffleState::Open {
            return Err(LotteryError::NotOpen);
        }
        if payment < self.round.entrance_fee {
            msg!(
                "Entry of {} lamports is below the fee of {} lamports",
                payment,
                self.round.entrance_fee
            );
            return Err(LotteryError::InsufficientEntry);
        }
        if self.round.is_full() {
            return Err(LotteryError::PlayerCapacityReached);
        }

        self.round.players.push(participant);
        Ok(LotteryEvent::EntryRecorded { participant })
    }

    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> bool {
        UpkeepCheck::evaluate(&self.round, now, balance).is_needed()
    }

    /// Closes the round to entries and asks the oracle for randomness.
    pub fn perform_upkeep<G>(
        &mut self,
        now: UnixTimestamp,
        balance: u64,
        gateway: &mut G,
    ) -> Result<LotteryEvent, G::Error>
    where
        G: RandomnessGateway + ?Sized,
    {
        let check = UpkeepCheck::evaluate(&self.round, now, balance);
        if !check.is_needed() {
            let err = LotteryError::UpkeepNotNeeded {
                balance,
                num_players: self.round.number_of_players(),
                state: self.round.state,
            };
            msg!("{} {:?}", err, check);
            return Err(err.into());
        }

        let request_id = gateway.request_randomness(&self.consumer, &self.randomness_params())?;
        self.round.state = RaffleState::Calculating;
        self.round.pending_request_id = Some(request_id);
        Ok(LotteryEvent::RequestedRaffleWinner { request_id })
    }

    /// Settles the round with the oracle's answer.
    ///
    /// Winner selection, reset and payout are staged on a copy of the round
    /// and committed only after the vault has paid, so a failed payout
    /// leaves the round exactly as it was.
    pub fn fulfill_randomness<V>(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
        vault: &mut V,
    ) -> Result<LotteryEvent, LotteryError>
    where
        V: PrizeVault + ?Sized,
    {
        if self.round.pending_request_id != Some(request_id) {
            return Err(LotteryError::UnknownRequest);
        }
        let word = *random_words.first().ok_or(LotteryError::MissingRandomWords)?;

        let index = word
            .checked_rem(self.round.number_of_players())
            .ok_or(LotteryError::NoPlayers)? as usize;
        let winner = self.round.players[index];

        let mut settled = self.round.clone();
        settled.recent_winner = Some(winner);
        settled.players.clear();
        settled.state = RaffleState::Open;
        settled.last_timestamp = now;
        settled.pending_request_id = None;

        let prize = vault.balance();
        vault.pay(&winner, prize).map_err(|e| {
            msg!("Payout of {} lamports to {} failed: {}", prize, winner, e);
            LotteryError::PayoutFailed
        })?;

        self.round = settled;
        msg!("Winner index {} paid {} lamports", index, prize);
        Ok(LotteryEvent::WinnerPicked { winner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gateway::MockCoordinator, state::LotteryParams};
    use std::collections::BTreeMap;

    const START: UnixTimestamp = 1_700_000_000;
    const FEE: u64 = 10_000_000;
    const INTERVAL: u64 = 30;

    #[derive(Default)]
    struct TestVault {
        balance: u64,
        paid: BTreeMap<Pubkey, u64>,
        reject: bool,
    }

    impl TestVault {
        fn deposit(&mut self, amount: u64) {
            self.balance += amount;
        }
    }

    impl PrizeVault for TestVault {
        fn balance(&self) -> u64 {
            self.balance
        }

        fn pay(&mut self, winner: &Pubkey, amount: u64) -> Result<(), LotteryError> {
            if self.reject {
                return Err(LotteryError::PayoutFailed);
            }
            self.balance -= amount;
            *self.paid.entry(*winner).or_default() += amount;
            Ok(())
        }
    }

    fn engine(max_players: u32) -> RaffleEngine {
        let params = LotteryParams {
            entrance_fee: FEE,
            interval: INTERVAL,
            gas_lane: [1; 32],
            subscription_id: 1,
            callback_gas_limit: 500_000,
            max_players,
        };
        let round = Lottery::new(Pubkey::new_unique(), Pubkey::new_unique(), &params, START).unwrap();
        RaffleEngine::new(Pubkey::new_unique(), round)
    }

    fn enter(engine: &mut RaffleEngine, vault: &mut TestVault, payment: u64) -> Pubkey {
        let player = Pubkey::new_unique();
        engine.enter(payment, player).unwrap();
        vault.deposit(payment);
        player
    }

    #[test]
    fn entry_below_fee_is_rejected() {
        let mut engine = engine(8);
        assert_eq!(
            engine.enter(FEE - 1, Pubkey::new_unique()),
            Err(LotteryError::InsufficientEntry)
        );
        assert_eq!(engine.round().number_of_players(), 0);
    }

    #[test]
    fn entries_are_recorded_in_order() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let first = enter(&mut engine, &mut vault, FEE);
        let second = enter(&mut engine, &mut vault, FEE * 2);

        let event = engine.enter(FEE, first).unwrap();
        assert_eq!(event, LotteryEvent::EntryRecorded { participant: first });
        assert_eq!(engine.round().players, vec![first, second, first]);
        assert_eq!(engine.round().player(1), Some(&second));
    }

    #[test]
    fn entry_rejected_while_calculating() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 31, vault.balance, &mut coordinator)
            .unwrap();

        assert_eq!(
            engine.enter(FEE, Pubkey::new_unique()),
            Err(LotteryError::NotOpen)
        );
        assert_eq!(engine.round().number_of_players(), 1);
    }

    #[test]
    fn entry_rejected_when_round_is_full() {
        let mut engine = engine(1);
        let mut vault = TestVault::default();
        enter(&mut engine, &mut vault, FEE);
        assert_eq!(
            engine.enter(FEE, Pubkey::new_unique()),
            Err(LotteryError::PlayerCapacityReached)
        );
    }

    #[test]
    fn upkeep_not_needed_leaves_round_untouched() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        let before = engine.round().clone();

        let err = engine
            .perform_upkeep(START + 10, vault.balance, &mut coordinator)
            .unwrap_err();
        assert_eq!(
            err,
            LotteryError::UpkeepNotNeeded {
                balance: FEE,
                num_players: 1,
                state: RaffleState::Open,
            }
        );
        assert_eq!(engine.round(), &before);
        assert!(!coordinator.is_pending(1));
    }

    #[test]
    fn upkeep_issues_distinct_request_ids() {
        let mut coordinator = MockCoordinator::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut engine = engine(8);
            let mut vault = TestVault::default();
            enter(&mut engine, &mut vault, FEE);
            match engine
                .perform_upkeep(START + 30, vault.balance, &mut coordinator)
                .unwrap()
            {
                LotteryEvent::RequestedRaffleWinner { request_id } => ids.push(request_id),
                other => panic!("unexpected event {:?}", other),
            }
            assert_eq!(engine.round().state, RaffleState::Calculating);
        }
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn single_player_round_settles_in_full() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        let player = enter(&mut engine, &mut vault, FEE);

        assert!(!engine.check_upkeep(START + 29, vault.balance));
        assert!(engine.check_upkeep(START + 30, vault.balance));

        let event = engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();
        assert_eq!(event, LotteryEvent::RequestedRaffleWinner { request_id: 1 });
        assert_eq!(engine.round().pending_request_id, Some(1));

        let event = coordinator
            .fulfill_random_words(1, &[42], &mut engine, START + 31, &mut vault)
            .unwrap();
        assert_eq!(event, LotteryEvent::WinnerPicked { winner: player });

        let round = engine.round();
        assert_eq!(round.recent_winner, Some(player));
        assert!(round.players.is_empty());
        assert_eq!(round.state, RaffleState::Open);
        assert_eq!(round.last_timestamp, START + 31);
        assert_eq!(round.pending_request_id, None);
        assert_eq!(vault.paid[&player], FEE);
        assert_eq!(vault.balance, 0);
    }

    #[test]
    fn winner_is_picked_by_first_word_modulo_players() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        let players: Vec<Pubkey> = (0..3)
            .map(|_| enter(&mut engine, &mut vault, FEE + 5))
            .collect();

        engine
            .perform_upkeep(START + 40, vault.balance, &mut coordinator)
            .unwrap();
        coordinator
            .fulfill_random_words(1, &[7, 0], &mut engine, START + 41, &mut vault)
            .unwrap();

        assert_eq!(engine.round().recent_winner, Some(players[1]));
        assert_eq!(vault.paid[&players[1]], 3 * (FEE + 5));
    }

    #[test]
    fn unknown_request_is_rejected_by_engine() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();
        let before = engine.round().clone();

        assert_eq!(
            engine.fulfill_randomness(2, &[1], START + 31, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
        assert_eq!(engine.round(), &before);
    }

    #[test]
    fn fulfilment_without_request_is_rejected_by_coordinator() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);

        assert_eq!(
            coordinator.fulfill_random_words(1, &[1], &mut engine, START + 31, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
    }

    #[test]
    fn replayed_fulfilment_is_rejected_at_both_layers() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();
        coordinator
            .fulfill_random_words(1, &[3], &mut engine, START + 31, &mut vault)
            .unwrap();

        assert_eq!(
            coordinator.fulfill_random_words(1, &[3], &mut engine, START + 32, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
        assert_eq!(
            engine.fulfill_randomness(1, &[3], START + 32, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
    }

    #[test]
    fn request_of_another_lottery_is_not_delivered() {
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        let mut requester = engine(8);
        enter(&mut requester, &mut vault, FEE);
        requester
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();

        let mut other = engine(8);
        enter(&mut other, &mut vault, FEE);
        assert_eq!(
            coordinator.fulfill_random_words(1, &[1], &mut other, START + 31, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
        assert!(coordinator.is_pending(1));
    }

    #[test]
    fn failed_payout_rolls_back_settlement() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();
        let before = engine.round().clone();

        vault.reject = true;
        assert_eq!(
            coordinator.fulfill_random_words(1, &[5], &mut engine, START + 31, &mut vault),
            Err(LotteryError::PayoutFailed)
        );
        assert_eq!(engine.round(), &before);
        assert!(coordinator.is_pending(1));
        assert_eq!(vault.balance, 2 * FEE);

        vault.reject = false;
        coordinator
            .fulfill_random_words(1, &[5], &mut engine, START + 31, &mut vault)
            .unwrap();
        assert_eq!(engine.round().state, RaffleState::Open);
    }

    #[test]
    fn empty_words_are_rejected() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();

        assert_eq!(
            engine.fulfill_randomness(1, &[], START + 31, &mut vault),
            Err(LotteryError::MissingRandomWords)
        );
    }

    #[test]
    fn settlement_without_players_is_rejected() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();
        engine.round.players.clear();
        let before = engine.round().clone();

        assert_eq!(
            coordinator.fulfill_random_words(1, &[7], &mut engine, START + 31, &mut vault),
            Err(LotteryError::NoPlayers)
        );
        assert_eq!(engine.round(), &before);
        assert!(coordinator.is_pending(1));
        assert!(vault.paid.is_empty());
    }

    #[test]
    fn round_reopens_for_the_next_interval() {
        let mut engine = engine(8);
        let mut vault = TestVault::default();
        let mut coordinator = MockCoordinator::new();
        enter(&mut engine, &mut vault, FEE);
        engine
            .perform_upkeep(START + 30, vault.balance, &mut coordinator)
            .unwrap();
        coordinator
            .fulfill_random_words(1, &[0], &mut engine, START + 35, &mut vault)
            .unwrap();

        enter(&mut engine, &mut vault, FEE);
        assert!(!engine.check_upkeep(START + 60, vault.balance));
        assert!(engine.check_upkeep(START + 65, vault.balance));
        assert_eq!(
            engine
                .perform_upkeep(START + 65, vault.balance, &mut coordinator)
                .unwrap(),
            LotteryEvent::RequestedRaffleWinner { request_id: 2 }
        );
    }
}
