// Lottery Program - Instruction Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};

use crate::{
    coordinator::AccountCoordinator,
    engine::RaffleEngine,
    error::LotteryError,
    events,
    gateway,
    instruction::LotteryInstruction,
    state::{Coordinator, Lottery, LotteryParams, Subscription},
    upkeep::UpkeepCheck,
    utils::{
        create_pda_account, find_coordinator_address, find_subscription_address, lamports_to_sol,
        COORDINATOR_SEED, SUBSCRIPTION_SEED,
    },
    vault::LotteryVault,
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::InitializeCoordinator { fee_per_request } => {
                msg!("Instruction: Initialize Coordinator");
                Self::process_initialize_coordinator(accounts, fee_per_request, program_id)
            }
            LotteryInstruction::CreateSubscription => {
                msg!("Instruction: Create Subscription");
                Self::process_create_subscription(accounts, program_id)
            }
            LotteryInstruction::FundSubscription { amount } => {
                msg!("Instruction: Fund Subscription");
                Self::process_fund_subscription(accounts, amount, program_id)
            }
            LotteryInstruction::AddConsumer { consumer } => {
                msg!("Instruction: Add Consumer");
                Self::process_add_consumer(accounts, consumer, program_id)
            }
            LotteryInstruction::InitializeLottery { params } => {
                msg!("Instruction: Initialize Lottery");
                Self::process_initialize_lottery(accounts, params, program_id)
            }
            LotteryInstruction::Enter { amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(accounts, amount, program_id)
            }
            LotteryInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            LotteryInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            LotteryInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
        }
    }

    /// Creates the coordinator PDA. Only called once per program deployment.
    fn process_initialize_coordinator(
        accounts: &[AccountInfo],
        fee_per_request: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Oracle authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_coordinator, bump_seed) = find_coordinator_address(program_id);
        if *coordinator_info.key != expected_coordinator {
            msg!("Invalid coordinator account address");
            return Err(ProgramError::InvalidArgument);
        }
        if coordinator_info.owner == program_id {
            return Err(LotteryError::AlreadyInitialized.into());
        }

        create_pda_account(
            authority_info,
            coordinator_info,
            system_program_info,
            program_id,
            Coordinator::LEN,
            &Rent::get()?,
            &[COORDINATOR_SEED, &[bump_seed]],
        )?;

        let coordinator = Coordinator {
            is_initialized: true,
            authority: *authority_info.key,
            fee_per_request,
            next_request_id: 1,
            next_subscription_id: 1,
        };
        Coordinator::pack(coordinator, &mut coordinator_info.data.borrow_mut())?;

        msg!(
            "Coordinator initialized: Oracle={}, Fee={} lamports",
            authority_info.key,
            fee_per_request
        );
        Ok(())
    }

    fn process_create_subscription(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_coordinator(coordinator_info, program_id)?;

        let mut coordinator = Coordinator::unpack(&coordinator_info.data.borrow())?;
        let subscription_id = coordinator.next_subscription_id;
        let (expected_subscription, bump_seed) =
            find_subscription_address(program_id, subscription_id);
        if *subscription_info.key != expected_subscription {
            msg!("Subscription account must be the address of subscription {}", subscription_id);
            return Err(ProgramError::InvalidArgument);
        }

        create_pda_account(
            owner_info,
            subscription_info,
            system_program_info,
            program_id,
            Subscription::LEN,
            &Rent::get()?,
            &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes(), &[bump_seed]],
        )?;

        let subscription = Subscription {
            is_initialized: true,
            id: subscription_id,
            owner: *owner_info.key,
            balance: 0,
            request_count: 0,
            consumers: Vec::new(),
        };
        subscription.pack_into(&mut subscription_info.data.borrow_mut())?;

        coordinator.next_subscription_id = subscription_id
            .checked_add(1)
            .ok_or(ProgramError::InvalidAccountData)?;
        Coordinator::pack(coordinator, &mut coordinator_info.data.borrow_mut())?;

        msg!("Subscription {} created for {}", subscription_id, owner_info.key);
        Ok(())
    }

    fn process_fund_subscription(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let funder_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !funder_info.is_signer {
            msg!("Funder must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if subscription_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        subscription.balance = subscription
            .balance
            .checked_add(amount)
            .ok_or(ProgramError::InvalidArgument)?;

        invoke(
            &system_instruction::transfer(funder_info.key, subscription_info.key, amount),
            &[
                funder_info.clone(),
                subscription_info.clone(),
                system_program_info.clone(),
            ],
        )?;
        subscription.pack_into(&mut subscription_info.data.borrow_mut())?;

        msg!(
            "Subscription {} funded with {} SOL, balance {} SOL",
            subscription.id,
            lamports_to_sol(amount),
            lamports_to_sol(subscription.balance)
        );
        Ok(())
    }

    fn process_add_consumer(
        accounts: &[AccountInfo],
        consumer: Pubkey,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if subscription_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut subscription = Subscription::unpack(&subscription_info.data.borrow())?;
        if subscription.owner != *owner_info.key {
            msg!("Only the subscription owner can add consumers");
            return Err(ProgramError::InvalidAccountData);
        }
        subscription.add_consumer(consumer)?;
        subscription.pack_into(&mut subscription_info.data.borrow_mut())?;

        msg!("Consumer {} added to subscription {}", consumer, subscription.id);
        Ok(())
    }

    fn process_initialize_lottery(
        accounts: &[AccountInfo],
        params: LotteryParams,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer || !lottery_info.is_signer {
            msg!("Authority and lottery account must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if lottery_info.owner != &system_program::id() || lottery_info.lamports() > 0 {
            return Err(LotteryError::AlreadyInitialized.into());
        }
        Self::check_coordinator(coordinator_info, program_id)?;
        params.validate()?;

        let clock = Clock::get()?;
        let lottery = Lottery::new(
            *authority_info.key,
            *coordinator_info.key,
            &params,
            clock.unix_timestamp,
        )?;

        let space = Lottery::space(params.max_players);
        invoke(
            &system_instruction::create_account(
                authority_info.key,
                lottery_info.key,
                Rent::get()?.minimum_balance(space),
                space as u64,
                program_id,
            ),
            &[
                authority_info.clone(),
                lottery_info.clone(),
                system_program_info.clone(),
            ],
        )?;
        lottery.pack_into(&mut lottery_info.data.borrow_mut())?;

        msg!(
            "Lottery initialized: Fee={} SOL, Interval={}s, Subscription={}, MaxPlayers={}",
            lamports_to_sol(params.entrance_fee),
            params.interval,
            params.subscription_id,
            params.max_players
        );
        Ok(())
    }

    fn process_enter(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        let mut engine = Self::load_engine(lottery_info, program_id)?;

        let event = engine.enter(amount, *player_info.key)?;
        invoke(
            &system_instruction::transfer(player_info.key, lottery_info.key, amount),
            &[
                player_info.clone(),
                lottery_info.clone(),
                system_program_info.clone(),
            ],
        )?;
        engine.round().pack_into(&mut lottery_info.data.borrow_mut())?;

        events::emit(&event)
    }

    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let lottery_info = next_account_info(account_info_iter)?;

        let engine = Self::load_engine(lottery_info, program_id)?;
        let balance = Self::pool_balance(lottery_info)?;
        let check = UpkeepCheck::evaluate(engine.round(), Clock::get()?.unix_timestamp, balance);

        msg!("Upkeep needed: {} {:?}", check.is_needed(), check);
        set_return_data(&[check.is_needed() as u8]);
        Ok(())
    }

    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        // Anyone can trigger upkeep; the caller only pays for the request account
        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut engine = Self::load_engine(lottery_info, program_id)?;
        if engine.round().coordinator != *coordinator_info.key {
            msg!("Coordinator does not match the one registered with this lottery");
            return Err(ProgramError::InvalidArgument);
        }
        let balance = Self::pool_balance(lottery_info)?;

        let mut coordinator = AccountCoordinator::new(
            program_id,
            coordinator_info,
            subscription_info,
            request_info,
            caller_info,
            Some(system_program_info),
        )?;
        let event =
            engine.perform_upkeep(Clock::get()?.unix_timestamp, balance, &mut coordinator)?;
        engine.round().pack_into(&mut lottery_info.data.borrow_mut())?;

        events::emit(&event)
    }

    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let requester_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut engine = Self::load_engine(lottery_info, program_id)?;
        if engine.round().coordinator != *coordinator_info.key {
            msg!("Coordinator does not match the one registered with this lottery");
            return Err(ProgramError::InvalidArgument);
        }

        let mut coordinator = AccountCoordinator::new(
            program_id,
            coordinator_info,
            subscription_info,
            request_info,
            requester_info,
            None,
        )?;
        coordinator.verify_oracle(oracle_info)?;

        let rent_exempt_minimum = Rent::get()?.minimum_balance(lottery_info.data_len());
        let mut vault = LotteryVault::new(lottery_info, winner_info, rent_exempt_minimum);

        let event = gateway::deliver(
            &mut coordinator,
            &mut engine,
            request_id,
            random_words,
            Clock::get()?.unix_timestamp,
            &mut vault,
        )?;
        engine.round().pack_into(&mut lottery_info.data.borrow_mut())?;

        events::emit(&event)
    }

    fn check_coordinator(coordinator_info: &AccountInfo, program_id: &Pubkey) -> ProgramResult {
        let (expected_coordinator, _) = find_coordinator_address(program_id);
        if *coordinator_info.key != expected_coordinator {
            msg!("Invalid coordinator account address");
            return Err(ProgramError::InvalidArgument);
        }
        if coordinator_info.owner != program_id {
            return Err(LotteryError::NotInitialized.into());
        }
        Ok(())
    }

    fn load_engine(lottery_info: &AccountInfo, program_id: &Pubkey) -> Result<RaffleEngine, ProgramError> {
        if lottery_info.owner != program_id {
            msg!("Lottery account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let lottery = Lottery::unpack(&lottery_info.data.borrow())?;
        Ok(RaffleEngine::new(*lottery_info.key, lottery))
    }

    fn pool_balance(lottery_info: &AccountInfo) -> Result<u64, ProgramError> {
        let rent_exempt_minimum = Rent::get()?.minimum_balance(lottery_info.data_len());
        Ok(LotteryVault::pool_balance(lottery_info, rent_exempt_minimum))
    }
}
