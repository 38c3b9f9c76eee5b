use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use std::convert::TryFrom;

/// Seed of the singleton round account
pub const ROUND_SEED: &[u8] = b"round";

/// Block confirmations the randomness provider must wait before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Random values requested per round
pub const NUM_WORDS: u32 = 1;

/// Slot capacity of the round account
pub const MAX_PARTICIPANTS: usize = 100;

/// Phase of the current round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Accepting entries
    Open,
    /// Entry closed, waiting for the randomness callback
    Calculating,
}

impl TryFrom<u8> for RoundState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RoundState::Open),
            1 => Ok(RoundState::Calculating),
            _ => Err("Invalid round state"),
        }
    }
}

impl From<RoundState> for u8 {
    fn from(state: RoundState) -> Self {
        match state {
            RoundState::Open => 0,
            RoundState::Calculating => 1,
        }
    }
}

/// Deployment configuration, fixed at initialization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundConfig {
    /// Account allowed to force a stuck round back open
    pub operator: Pubkey,
    /// Switchboard VRF account answering for this deployment
    pub randomness_account: Pubkey,
    /// Minimum payment, in lamports, to take a slot
    pub entrance_fee: u64,
    /// Seconds that must elapse after a reset before the round can resolve
    pub round_interval: u64,
    /// Compute budget handed to the provider for the callback
    pub callback_resource_limit: u32,
}

impl RoundConfig {
    const LEN: usize = 32 + 32 + 8 + 8 + 4;

    fn unpack_from(src: &[u8; RoundConfig::LEN]) -> Self {
        let (operator, randomness_account, entrance_fee, round_interval, callback_resource_limit) =
            array_refs![src, 32, 32, 8, 8, 4];
        RoundConfig {
            operator: Pubkey::new_from_array(*operator),
            randomness_account: Pubkey::new_from_array(*randomness_account),
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            round_interval: u64::from_le_bytes(*round_interval),
            callback_resource_limit: u32::from_le_bytes(*callback_resource_limit),
        }
    }

    fn pack_into(&self, dst: &mut [u8; RoundConfig::LEN]) {
        let (
            operator_dst,
            randomness_account_dst,
            entrance_fee_dst,
            round_interval_dst,
            callback_resource_limit_dst,
        ) = mut_array_refs![dst, 32, 32, 8, 8, 4];
        operator_dst.copy_from_slice(self.operator.as_ref());
        randomness_account_dst.copy_from_slice(self.randomness_account.as_ref());
        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        *round_interval_dst = self.round_interval.to_le_bytes();
        *callback_resource_limit_dst = self.callback_resource_limit.to_le_bytes();
    }
}

/// The singleton round account.
///
/// Only the coordinator mutates it; everything else reads through the
/// query methods below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub(crate) is_initialized: bool,
    pub(crate) bump: u8,
    pub(crate) config: RoundConfig,
    pub(crate) state: RoundState,
    pub(crate) last_resolution_time: UnixTimestamp,
    pub(crate) pool_balance: u64,
    pub(crate) recent_winner: Pubkey,
    /// Id of the last request issued; the next one is `request_nonce + 1`
    pub(crate) request_nonce: u64,
    /// Outstanding request, only set while calculating
    pub(crate) pending_request: Option<u64>,
    pub(crate) participants: Vec<Pubkey>,
}

impl Round {
    /// A fresh, open round with no entries
    pub fn new(config: RoundConfig, bump: u8, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            config,
            state: RoundState::Open,
            last_resolution_time: now,
            pool_balance: 0,
            recent_winner: Pubkey::default(),
            request_nonce: 0,
            pending_request: None,
            participants: Vec::new(),
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn round_interval(&self) -> u64 {
        self.config.round_interval
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    pub fn participant_count(&self) -> u32 {
        self.participants.len() as u32
    }

    pub fn participant(&self, index: usize) -> Option<&Pubkey> {
        self.participants.get(index)
    }

    pub fn participants(&self) -> &[Pubkey] {
        &self.participants
    }

    /// Default pubkey until the first round pays out
    pub fn recent_winner(&self) -> &Pubkey {
        &self.recent_winner
    }

    pub fn last_resolution_time(&self) -> UnixTimestamp {
        self.last_resolution_time
    }

    pub fn pending_request(&self) -> Option<u64> {
        self.pending_request
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }
}

impl Sealed for Round {}

impl IsInitialized for Round {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

const PARTICIPANTS_LEN: usize = 32 * MAX_PARTICIPANTS;

impl Pack for Round {
    const LEN: usize = 1 + 1 + RoundConfig::LEN + 1 + 8 + 8 + 32 + 8 + 1 + 8 + 4 + PARTICIPANTS_LEN;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Round::LEN];
        let (
            is_initialized,
            bump,
            config,
            state,
            last_resolution_time,
            pool_balance,
            recent_winner,
            request_nonce,
            has_pending_request,
            pending_request,
            participant_count,
            participants,
        ) = array_refs![src, 1, 1, RoundConfig::LEN, 1, 8, 8, 32, 8, 1, 8, 4, PARTICIPANTS_LEN];

        let state = RoundState::try_from(state[0]).map_err(|_| ProgramError::InvalidAccountData)?;

        let participant_count = u32::from_le_bytes(*participant_count) as usize;
        if participant_count > MAX_PARTICIPANTS {
            return Err(ProgramError::InvalidAccountData);
        }
        let participants = participants
            .chunks_exact(32)
            .take(participant_count)
            .map(|slot| Pubkey::new_from_array(*array_ref![slot, 0, 32]))
            .collect();

        let pending_request = match has_pending_request[0] {
            0 => None,
            1 => Some(u64::from_le_bytes(*pending_request)),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Round {
            is_initialized: is_initialized[0] != 0,
            bump: bump[0],
            config: RoundConfig::unpack_from(config),
            state,
            last_resolution_time: UnixTimestamp::from_le_bytes(*last_resolution_time),
            pool_balance: u64::from_le_bytes(*pool_balance),
            recent_winner: Pubkey::new_from_array(*recent_winner),
            request_nonce: u64::from_le_bytes(*request_nonce),
            pending_request,
            participants,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Round::LEN];
        let (
            is_initialized_dst,
            bump_dst,
            config_dst,
            state_dst,
            last_resolution_time_dst,
            pool_balance_dst,
            recent_winner_dst,
            request_nonce_dst,
            has_pending_request_dst,
            pending_request_dst,
            participant_count_dst,
            participants_dst,
        ) = mut_array_refs![dst, 1, 1, RoundConfig::LEN, 1, 8, 8, 32, 8, 1, 8, 4, PARTICIPANTS_LEN];

        is_initialized_dst[0] = self.is_initialized as u8;
        bump_dst[0] = self.bump;
        self.config.pack_into(config_dst);
        state_dst[0] = self.state.into();
        *last_resolution_time_dst = self.last_resolution_time.to_le_bytes();
        *pool_balance_dst = self.pool_balance.to_le_bytes();
        recent_winner_dst.copy_from_slice(self.recent_winner.as_ref());
        *request_nonce_dst = self.request_nonce.to_le_bytes();
        has_pending_request_dst[0] = self.pending_request.is_some() as u8;
        *pending_request_dst = self.pending_request.unwrap_or_default().to_le_bytes();
        *participant_count_dst = (self.participants.len() as u32).to_le_bytes();

        // Stale slots past the count are zeroed
        participants_dst.fill(0);
        for (slot, participant) in participants_dst
            .chunks_exact_mut(32)
            .zip(self.participants.iter())
        {
            slot.copy_from_slice(participant.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RoundConfig {
        RoundConfig {
            operator: Pubkey::new_unique(),
            randomness_account: Pubkey::new_unique(),
            entrance_fee: 100,
            round_interval: 30,
            callback_resource_limit: 500_000,
        }
    }

    #[test]
    fn test_fresh_round_is_open_and_empty() {
        let round = Round::new(sample_config(), 254, 1_700_000_000);

        assert!(round.is_initialized());
        assert_eq!(round.state(), RoundState::Open);
        assert_eq!(round.participant_count(), 0);
        assert_eq!(round.pool_balance(), 0);
        assert_eq!(round.last_resolution_time(), 1_700_000_000);
        assert_eq!(*round.recent_winner(), Pubkey::default());
        assert_eq!(round.pending_request(), None);
        assert_eq!(round.request_confirmations(), 3);
        assert_eq!(round.num_words(), 1);
    }

    #[test]
    fn test_pack_preserves_calculating_round() {
        let mut round = Round::new(sample_config(), 251, 1_700_000_000);
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        round.participants = vec![alice, bob, alice];
        round.pool_balance = 300;
        round.state = RoundState::Calculating;
        round.request_nonce = 4;
        round.pending_request = Some(4);
        round.recent_winner = bob;

        let mut data = vec![0u8; Round::LEN];
        Round::pack(round.clone(), &mut data).unwrap();
        let unpacked = Round::unpack(&data).unwrap();

        assert_eq!(unpacked, round);
        assert_eq!(unpacked.participant(2), Some(&alice));
        assert_eq!(unpacked.participant(3), None);
    }

    #[test]
    fn test_pack_clears_slots_of_previous_round() {
        let mut round = Round::new(sample_config(), 255, 0);
        round.participants = vec![Pubkey::new_unique(); 5];

        let mut data = vec![0u8; Round::LEN];
        Round::pack(round.clone(), &mut data).unwrap();

        round.participants.clear();
        Round::pack(round, &mut data).unwrap();

        assert!(data[Round::LEN - PARTICIPANTS_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_unpack_rejects_unknown_state() {
        let round = Round::new(sample_config(), 255, 0);
        let mut data = vec![0u8; Round::LEN];
        Round::pack(round, &mut data).unwrap();

        let state_offset = 1 + 1 + RoundConfig::LEN;
        data[state_offset] = 7;

        assert_eq!(Round::unpack(&data), Err(ProgramError::InvalidAccountData));
    }

    #[test]
    fn test_unpack_rejects_uninitialized_account() {
        let data = vec![0u8; Round::LEN];
        assert_eq!(Round::unpack(&data), Err(ProgramError::UninitializedAccount));
    }
}
