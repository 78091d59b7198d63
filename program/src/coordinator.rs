// Lottery Program - Randomness coordinator backed by program accounts
use solana_program::{
    account_info::AccountInfo,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    sysvar::Sysvar,
};

use crate::{
    error::LotteryError,
    gateway::{RandomnessGateway, RandomnessParams},
    state::{Coordinator, RandomnessRequest, Subscription},
    utils::{
        create_pda_account, find_coordinator_address, find_request_address, transfer_lamports,
        REQUEST_SEED,
    },
};

/// Serves randomness requests out of the coordinator, subscription and
/// per-request accounts of one instruction.
///
/// `payer` funds a new request account when requesting and receives its
/// rent back when the request is consumed.
pub struct AccountCoordinator<'a, 'b> {
    program_id: &'b Pubkey,
    coordinator_info: &'b AccountInfo<'a>,
    subscription_info: &'b AccountInfo<'a>,
    request_info: &'b AccountInfo<'a>,
    payer_info: &'b AccountInfo<'a>,
    system_program_info: Option<&'b AccountInfo<'a>>,
}

impl<'a, 'b> AccountCoordinator<'a, 'b> {
    pub fn new(
        program_id: &'b Pubkey,
        coordinator_info: &'b AccountInfo<'a>,
        subscription_info: &'b AccountInfo<'a>,
        request_info: &'b AccountInfo<'a>,
        payer_info: &'b AccountInfo<'a>,
        system_program_info: Option<&'b AccountInfo<'a>>,
    ) -> Result<Self, ProgramError> {
        let (expected_coordinator, _) = find_coordinator_address(program_id);
        if *coordinator_info.key != expected_coordinator {
            msg!("Invalid coordinator account address");
            return Err(ProgramError::InvalidArgument);
        }
        if coordinator_info.owner != program_id || subscription_info.owner != program_id {
            msg!("Coordinator and subscription must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        Ok(Self {
            program_id,
            coordinator_info,
            subscription_info,
            request_info,
            payer_info,
            system_program_info,
        })
    }

    /// Only the coordinator's oracle authority may answer requests
    pub fn verify_oracle(&self, oracle_info: &AccountInfo) -> ProgramResult {
        if !oracle_info.is_signer {
            msg!("Oracle authority must sign the fulfilment");
            return Err(ProgramError::MissingRequiredSignature);
        }
        let coordinator = Coordinator::unpack(&self.coordinator_info.data.borrow())?;
        if coordinator.authority != *oracle_info.key {
            return Err(LotteryError::NotOracleAuthority.into());
        }
        Ok(())
    }

    fn pending_request(&self, request_id: u64) -> Option<RandomnessRequest> {
        let (expected, _) = find_request_address(self.program_id, request_id);
        if *self.request_info.key != expected
            || self.request_info.owner != self.program_id
            || self.request_info.lamports() == 0
        {
            return None;
        }
        let request = RandomnessRequest::unpack(&self.request_info.data.borrow()).ok()?;
        (request.request_id == request_id).then(|| request)
    }
}

impl<'a, 'b> RandomnessGateway for AccountCoordinator<'a, 'b> {
    type Error = ProgramError;

    fn request_randomness(
        &mut self,
        consumer: &Pubkey,
        params: &RandomnessParams,
    ) -> Result<u64, ProgramError> {
        let mut coordinator = Coordinator::unpack(&self.coordinator_info.data.borrow())?;
        let mut subscription = Subscription::unpack(&self.subscription_info.data.borrow())?;

        if subscription.id != params.subscription_id {
            msg!(
                "Subscription {} does not match requested subscription {}",
                subscription.id,
                params.subscription_id
            );
            return Err(ProgramError::InvalidArgument);
        }
        if !subscription.is_consumer(consumer) {
            msg!("Consumer {} is not registered on subscription {}", consumer, subscription.id);
            return Err(LotteryError::ConsumerNotRegistered.into());
        }

        let request_id = coordinator.next_request_id;
        let (expected_request, bump_seed) = find_request_address(self.program_id, request_id);
        if *self.request_info.key != expected_request {
            msg!("Request account must be the address of request {}", request_id);
            return Err(ProgramError::InvalidArgument);
        }
        if !self.payer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        let system_program_info = self
            .system_program_info
            .ok_or(ProgramError::NotEnoughAccountKeys)?;

        let rent = Rent::get()?;
        create_pda_account(
            self.payer_info,
            self.request_info,
            system_program_info,
            self.program_id,
            RandomnessRequest::LEN,
            &rent,
            &[REQUEST_SEED, &request_id.to_le_bytes(), &[bump_seed]],
        )?;

        let request = RandomnessRequest {
            is_initialized: true,
            request_id,
            subscription_id: subscription.id,
            consumer: *consumer,
            requester: *self.payer_info.key,
            num_words: params.num_words,
            callback_gas_limit: params.callback_gas_limit,
            gas_lane: params.gas_lane,
            request_slot: Clock::get()?.slot,
        };
        RandomnessRequest::pack(request, &mut self.request_info.data.borrow_mut())?;

        coordinator.next_request_id = request_id
            .checked_add(1)
            .ok_or(ProgramError::InvalidAccountData)?;
        Coordinator::pack(coordinator, &mut self.coordinator_info.data.borrow_mut())?;

        subscription.request_count = subscription.request_count.saturating_add(1);
        subscription.pack_into(&mut self.subscription_info.data.borrow_mut())?;

        msg!(
            "Randomness request {} queued for {} ({} words, {} confirmations)",
            request_id,
            consumer,
            params.num_words,
            params.request_confirmations
        );
        Ok(request_id)
    }

    fn pending_consumer(&self, request_id: u64) -> Option<Pubkey> {
        self.pending_request(request_id).map(|request| request.consumer)
    }

    /// Charges the subscription and closes the request account.
    fn consume(&mut self, request_id: u64) -> Result<(), ProgramError> {
        let request = self
            .pending_request(request_id)
            .ok_or(LotteryError::UnknownRequest)?;
        if request.requester != *self.payer_info.key {
            msg!("Rent refund must go to the requester {}", request.requester);
            return Err(ProgramError::InvalidArgument);
        }

        let coordinator = Coordinator::unpack(&self.coordinator_info.data.borrow())?;
        let mut subscription = Subscription::unpack(&self.subscription_info.data.borrow())?;
        if subscription.id != request.subscription_id {
            msg!("Request {} is not billed to subscription {}", request_id, subscription.id);
            return Err(ProgramError::InvalidArgument);
        }

        let fee = coordinator.fee_per_request;
        subscription.balance = subscription
            .balance
            .checked_sub(fee)
            .ok_or(LotteryError::InsufficientSubscriptionBalance)?;
        transfer_lamports(self.subscription_info, self.coordinator_info, fee)?;
        subscription.pack_into(&mut self.subscription_info.data.borrow_mut())?;

        let refund = self.request_info.lamports();
        transfer_lamports(self.request_info, self.payer_info, refund)?;
        self.request_info.data.borrow_mut().fill(0);

        msg!("Randomness request {} fulfilled, fee {} lamports", request_id, fee);
        Ok(())
    }
}
