// Lottery round coordinator
// Participants pay an entrance fee, a Switchboard VRF result picks the winner
// of the pool once the round interval has passed, and the round reopens.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod instruction;
pub mod payout;
pub mod processor;
pub mod state;
pub mod utils;
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub use solana_program;

/// Program entry used by tests and by programs linking this crate
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
