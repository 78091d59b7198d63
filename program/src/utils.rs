// Lottery Program - Utility Functions
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    native_token::LAMPORTS_PER_SOL,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
};

pub const COORDINATOR_SEED: &[u8] = b"coordinator";
pub const SUBSCRIPTION_SEED: &[u8] = b"subscription";
pub const REQUEST_SEED: &[u8] = b"request";

/// Find the program derived address of the randomness coordinator
pub fn find_coordinator_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_SEED], program_id)
}

/// Find the program derived address of a subscription
pub fn find_subscription_address(program_id: &Pubkey, subscription_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes()],
        program_id,
    )
}

/// Find the program derived address of a pending randomness request
pub fn find_request_address(program_id: &Pubkey, request_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REQUEST_SEED, &request_id.to_le_bytes()], program_id)
}

/// Create a rent-exempt account at a program derived address, owned by the program.
///
/// The address is predictable, so it may already hold lamports sent by anyone.
/// Such an account is topped up to rent exemption, then allocated and assigned.
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    new_account: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    program_id: &Pubkey,
    space: usize,
    rent: &Rent,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let required_lamports = rent.minimum_balance(space).max(1);
    let current_lamports = new_account.lamports();

    if current_lamports == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                new_account.key,
                required_lamports,
                space as u64,
                program_id,
            ),
            &[payer.clone(), new_account.clone(), system_program.clone()],
            &[signer_seeds],
        );
    }

    let top_up = required_lamports.saturating_sub(current_lamports);
    if top_up > 0 {
        invoke(
            &system_instruction::transfer(payer.key, new_account.key, top_up),
            &[payer.clone(), new_account.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(new_account.key, space as u64),
        &[new_account.clone(), system_program.clone()],
        &[signer_seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(new_account.key, program_id),
        &[new_account.clone(), system_program.clone()],
        &[signer_seeds],
    )
}

/// Move lamports out of an account owned by this program
pub fn transfer_lamports(from: &AccountInfo, to: &AccountInfo, amount: u64) -> ProgramResult {
    if from.key == to.key {
        return Ok(());
    }
    let from_balance = from
        .lamports()
        .checked_sub(amount)
        .ok_or(ProgramError::InsufficientFunds)?;
    let to_balance = to
        .lamports()
        .checked_add(amount)
        .ok_or(ProgramError::InvalidArgument)?;
    **from.try_borrow_mut_lamports()? = from_balance;
    **to.try_borrow_mut_lamports()? = to_balance;
    Ok(())
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_addresses_differ_per_id() {
        let program_id = Pubkey::new_unique();
        let (first, _) = find_request_address(&program_id, 1);
        let (second, _) = find_request_address(&program_id, 2);
        assert_ne!(first, second);
        assert_ne!(first, find_subscription_address(&program_id, 1).0);
    }

    #[test]
    fn sol_conversions() {
        assert_eq!(sol_to_lamports(0.01), 10_000_000);
        assert_eq!(lamports_to_sol(3 * LAMPORTS_PER_SOL), 3.0);
    }
}
