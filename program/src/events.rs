use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult, log::sol_log_data, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

/// Events observable by off-chain indexers
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum LotteryEvent {
    EntryRecorded { participant: Pubkey },
    RequestedRaffleWinner { request_id: u64 },
    WinnerPicked { winner: Pubkey },
}

/// Logs the event twice: a readable line and borsh-encoded program data.
pub fn emit(event: &LotteryEvent) -> ProgramResult {
    match event {
        LotteryEvent::EntryRecorded { participant } => {
            msg!("EntryRecorded: participant={}", participant);
        }
        LotteryEvent::RequestedRaffleWinner { request_id } => {
            msg!("RequestedRaffleWinner: request_id={}", request_id);
        }
        LotteryEvent::WinnerPicked { winner } => {
            msg!("WinnerPicked: winner={}", winner);
        }
    }
    let data = event
        .try_to_vec()
        .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
    sol_log_data(&[&data]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_events_decode_back() {
        let event = LotteryEvent::RequestedRaffleWinner { request_id: 9 };
        assert_eq!(emit(&event), Ok(()));

        let data = event.try_to_vec().unwrap();
        assert_eq!(data[0], 1);
        assert_eq!(LotteryEvent::try_from_slice(&data).unwrap(), event);
    }
}
