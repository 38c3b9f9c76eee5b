use solana_program::{decode_error::DecodeError, msg, program_error::ProgramError};
use thiserror::Error;

use crate::state::RoundState;

/// Errors that may be returned by the lottery coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Payment is below the entrance fee
    #[error("Payment of {payment} lamports is below the entrance fee of {entrance_fee}")]
    InsufficientPayment { payment: u64, entrance_fee: u64 },

    /// Entry attempted while the round is not open
    #[error("Round is not open")]
    RoundNotOpen,

    /// Resolution attempted while the readiness predicate is false
    #[error("Upkeep not ready: pool={pool_balance} participants={participant_count} state={state:?}")]
    UpkeepNotReady {
        pool_balance: u64,
        participant_count: u32,
        state: RoundState,
    },

    /// Transfer of the pool to the winner was rejected
    #[error("Payout to the winner failed")]
    PayoutFailed,

    /// Callback from something other than the registered provider, or for a stale request
    #[error("Unauthorized randomness callback")]
    UnauthorizedCallback,

    /// Winner selection over an empty participant set
    #[error("Participant set is empty")]
    DegenerateParticipantSet,

    /// Slot table is at capacity
    #[error("Round has reached its participant capacity")]
    RoundFull,

    /// The randomness provider refused the request
    #[error("Randomness request failed")]
    RandomnessRequestFailed,

    /// The randomness account holds no result yet
    #[error("Randomness result is not available yet")]
    RandomnessNotReady,

    /// Callback delivered no random values
    #[error("No random values supplied")]
    MissingRandomness,

    /// Pool balance would overflow
    #[error("Pool balance overflow")]
    PoolOverflow,

    /// Only the round operator can perform this action
    #[error("Only the round operator can perform this action")]
    NotOperator,

    /// Recovery attempted on a round that is not waiting for randomness
    #[error("Round is not calculating")]
    RoundNotCalculating,
}

impl LotteryError {
    /// Stable custom error code reported on chain
    pub fn code(&self) -> u32 {
        match self {
            LotteryError::InvalidInstructionData => 0,
            LotteryError::InsufficientPayment { .. } => 1,
            LotteryError::RoundNotOpen => 2,
            LotteryError::UpkeepNotReady { .. } => 3,
            LotteryError::PayoutFailed => 4,
            LotteryError::UnauthorizedCallback => 5,
            LotteryError::DegenerateParticipantSet => 6,
            LotteryError::RoundFull => 7,
            LotteryError::RandomnessRequestFailed => 8,
            LotteryError::RandomnessNotReady => 9,
            LotteryError::MissingRandomness => 10,
            LotteryError::PoolOverflow => 11,
            LotteryError::NotOperator => 12,
            LotteryError::RoundNotCalculating => 13,
        }
    }
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        msg!("{}", e);
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for LotteryError {
    fn type_of() -> &'static str {
        "Lottery Error"
    }
}
