use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

/// Observable round events
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RoundEvent {
    /// A slot was taken
    Entered { participant: Pubkey },
    /// The round closed and a randomness request went out
    ResolutionRequested { request_id: u64 },
    /// The pool was paid out and the round reopened
    WinnerPicked { winner: Pubkey },
}

/// Receives events as the coordinator produces them
pub trait EventSink {
    fn emit(&mut self, event: RoundEvent);
}

/// Append-only log the caller can poll
impl EventSink for Vec<RoundEvent> {
    fn emit(&mut self, event: RoundEvent) {
        self.push(event);
    }
}

/// Writes events to the program log: a readable line plus the borsh
/// encoding as a `Program data:` entry for indexers.
pub struct ProgramLog;

impl EventSink for ProgramLog {
    fn emit(&mut self, event: RoundEvent) {
        match &event {
            RoundEvent::Entered { participant } => msg!("Event: Entered {}", participant),
            RoundEvent::ResolutionRequested { request_id } => {
                msg!("Event: ResolutionRequested {}", request_id)
            }
            RoundEvent::WinnerPicked { winner } => msg!("Event: WinnerPicked {}", winner),
        }
        match event.try_to_vec() {
            Ok(bytes) => sol_log_data(&[&bytes]),
            Err(e) => msg!("Failed to encode event: {}", e),
        }
    }
}
