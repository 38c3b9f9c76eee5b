//! Round state machine.
//!
//! ```text
//! OPEN --begin_resolution (ready)--> CALCULATING --resolve (paid)--> OPEN
//! ```
//!
//! Each operation is a single atomic step on an owned [`Round`]. The
//! randomness provider and the fund transfer are reached only through the
//! traits below so the rules can be exercised without a cluster.
use solana_program::{
    clock::UnixTimestamp, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::{
    error::LotteryError,
    events::{EventSink, RoundEvent},
    state::{Round, RoundState, MAX_PARTICIPANTS, NUM_WORDS, REQUEST_CONFIRMATIONS},
};

/// Parameters of one randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    /// Sequence number of this request within the round account
    pub request_id: u64,
    pub num_words: u32,
    pub request_confirmations: u16,
    /// Compute budget for the callback, for providers that accept one
    pub callback_resource_limit: u32,
}

/// Source of verifiable randomness. Delivery happens later through
/// [`Round::resolve`].
pub trait RandomnessProvider {
    /// Submit the request and return the id the delivery will carry. The
    /// provider may answer with its own id rather than `request.request_id`.
    fn request(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError>;
}

/// Moves the pool to the winner. On error nothing may have been transferred.
pub trait FundTransfer {
    fn pay(&mut self, recipient: &Pubkey, amount: u64) -> ProgramResult;
}

impl Round {
    /// Take one slot in the current round.
    pub fn enter(
        &mut self,
        caller: Pubkey,
        payment: u64,
        events: &mut impl EventSink,
    ) -> Result<(), LotteryError> {
        if payment < self.config.entrance_fee {
            return Err(LotteryError::InsufficientPayment {
                payment,
                entrance_fee: self.config.entrance_fee,
            });
        }
        if self.state != RoundState::Open {
            return Err(LotteryError::RoundNotOpen);
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(LotteryError::RoundFull);
        }
        let pool_balance = self
            .pool_balance
            .checked_add(payment)
            .ok_or(LotteryError::PoolOverflow)?;

        self.participants.push(caller);
        self.pool_balance = pool_balance;
        events.emit(RoundEvent::Entered { participant: caller });
        Ok(())
    }

    /// Readiness predicate. All four conditions must hold.
    pub fn is_ready(&self, now: UnixTimestamp) -> bool {
        let interval_elapsed = now
            .checked_sub(self.last_resolution_time)
            .and_then(|elapsed| u64::try_from(elapsed).ok())
            .map_or(false, |elapsed| elapsed > self.config.round_interval);

        self.state == RoundState::Open
            && interval_elapsed
            && !self.participants.is_empty()
            && self.pool_balance > 0
    }

    /// Close entry and ask the provider for randomness.
    ///
    /// Readiness is re-evaluated here regardless of what the trigger saw.
    pub fn begin_resolution(
        &mut self,
        now: UnixTimestamp,
        provider: &mut impl RandomnessProvider,
        events: &mut impl EventSink,
    ) -> Result<u64, LotteryError> {
        if !self.is_ready(now) {
            return Err(LotteryError::UpkeepNotReady {
                pool_balance: self.pool_balance,
                participant_count: self.participant_count(),
                state: self.state,
            });
        }

        let request = RandomnessRequest {
            request_id: self
                .request_nonce
                .checked_add(1)
                .ok_or(LotteryError::RandomnessRequestFailed)?,
            num_words: NUM_WORDS,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_resource_limit: self.config.callback_resource_limit,
        };

        // Entry closes before the request leaves
        self.state = RoundState::Calculating;

        let request_id = match provider.request(&request) {
            Ok(request_id) => request_id,
            Err(e) => {
                msg!("Randomness provider rejected request {}: {}", request.request_id, e);
                self.state = RoundState::Open;
                return Err(LotteryError::RandomnessRequestFailed);
            }
        };

        self.request_nonce = request.request_id;
        self.pending_request = Some(request_id);
        events.emit(RoundEvent::ResolutionRequested { request_id });
        Ok(request_id)
    }

    /// Consume the randomness for the outstanding request, pay the winner the
    /// whole pool and reopen.
    ///
    /// The payout happens before any state is touched: a failed transfer
    /// leaves the round calculating with participants and pool intact.
    pub fn resolve(
        &mut self,
        request_id: u64,
        random_values: &[u64],
        now: UnixTimestamp,
        transfer: &mut impl FundTransfer,
        events: &mut impl EventSink,
    ) -> Result<Pubkey, LotteryError> {
        if self.state != RoundState::Calculating || self.pending_request != Some(request_id) {
            msg!(
                "Rejecting callback for request {} (outstanding: {:?})",
                request_id,
                self.pending_request
            );
            return Err(LotteryError::UnauthorizedCallback);
        }
        let random_value = *random_values.first().ok_or(LotteryError::MissingRandomness)?;
        if self.participants.is_empty() {
            msg!("Calculating round {} has no participants", request_id);
            return Err(LotteryError::DegenerateParticipantSet);
        }

        let winner_index = (random_value % self.participants.len() as u64) as usize;
        let winner = self.participants[winner_index];
        let prize = self.pool_balance;

        if let Err(e) = transfer.pay(&winner, prize) {
            msg!("Payout of {} lamports to {} failed: {}", prize, winner, e);
            return Err(LotteryError::PayoutFailed);
        }

        self.recent_winner = winner;
        self.state = RoundState::Open;
        self.participants.clear();
        self.pool_balance = 0;
        self.last_resolution_time = now;
        self.pending_request = None;

        msg!("Winner index {} paid {} lamports", winner_index, prize);
        events.emit(RoundEvent::WinnerPicked { winner });
        Ok(winner)
    }

    /// Operator recovery for a provider that never answers: reopen the round
    /// and forget the outstanding request. Participants and pool carry over.
    pub fn force_reopen(&mut self, operator: &Pubkey) -> Result<(), LotteryError> {
        if *operator != self.config.operator {
            return Err(LotteryError::NotOperator);
        }
        if self.state != RoundState::Calculating {
            return Err(LotteryError::RoundNotCalculating);
        }
        msg!("Abandoning request {:?}", self.pending_request);
        self.state = RoundState::Open;
        self.pending_request = None;
        Ok(())
    }
}
