use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;

use crate::{error::LotteryError, vrf::VrfParams};

/// Instructions supported by the lottery coordinator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LotteryInstruction {
    /// Create and initialize the round account
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The operator, pays for the round account
    /// 1. `[writable]` The round account (PDA)
    /// 2. `[]` The Switchboard VRF account whose authority is the round PDA
    /// 3. `[]` The system program
    InitializeRound {
        /// Minimum payment per slot in lamports
        entrance_fee: u64,
        /// Seconds between resets before the round may resolve
        round_interval: u64,
        /// Compute budget passed to the randomness provider
        callback_resource_limit: u32,
    },

    /// Take a slot in the open round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The entrant
    /// 1. `[writable]` The round account
    /// 2. `[]` The system program
    Enter {
        /// Lamports paid, at least the entrance fee
        payment: u64,
    },

    /// Evaluate the readiness predicate and publish it as return data
    ///
    /// Accounts expected:
    /// 0. `[]` The round account
    CheckUpkeep,

    /// Close the round and request randomness
    ///
    /// Accounts expected:
    /// 0. `[signer]` The trigger (anyone)
    /// 1. `[writable]` The round account, authority of the VRF account
    /// 2. `[writable]` The Switchboard VRF account
    /// 3. `[writable]` The oracle queue
    /// 4. `[]` The queue authority
    /// 5. `[]` The queue data buffer
    /// 6. `[writable]` The Switchboard permission account
    /// 7. `[writable]` The Switchboard escrow token account
    /// 8. `[writable]` The payer token wallet
    /// 9. `[signer]` The payer wallet authority
    /// 10. `[]` The recent blockhashes sysvar
    /// 11. `[]` The Switchboard program state
    /// 12. `[]` The token program
    /// 13. `[]` The Switchboard program
    BeginResolution {
        /// Provider parameters, passed through untouched
        vrf_params: VrfParams,
        /// Opaque data from the trigger, ignored by the program
        trigger_payload: Vec<u8>,
    },

    /// Randomness callback: pick and pay the winner, then reopen
    ///
    /// Accounts expected:
    /// 0. `[writable]` The round account
    /// 1. `[]` The registered Switchboard VRF account
    /// 2. `[writable]` The winning participant
    FulfillRandomness {
        /// VRF request counter the result was produced for
        request_id: u64,
    },

    /// Operator-only: reopen a round whose randomness never arrived
    ///
    /// Accounts expected:
    /// 0. `[signer]` The operator
    /// 1. `[writable]` The round account
    ForceReopen,
}

impl LotteryInstruction {
    /// Unpacks a byte buffer into a LotteryInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(LotteryError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (round_interval, rest) = Self::unpack_u64(rest)?;
                let (callback_resource_limit, _) = Self::unpack_u32(rest)?;
                Self::InitializeRound {
                    entrance_fee,
                    round_interval,
                    callback_resource_limit,
                }
            }
            1 => {
                let (payment, _) = Self::unpack_u64(rest)?;
                Self::Enter { payment }
            }
            2 => Self::CheckUpkeep,
            3 => {
                let (permission_bump, rest) = Self::unpack_u8(rest)?;
                let (state_bump, rest) = Self::unpack_u8(rest)?;
                Self::BeginResolution {
                    vrf_params: VrfParams {
                        permission_bump,
                        state_bump,
                    },
                    trigger_payload: rest.to_vec(),
                }
            }
            4 => {
                let (request_id, _) = Self::unpack_u64(rest)?;
                Self::FulfillRandomness { request_id }
            }
            5 => Self::ForceReopen,
            _ => return Err(LotteryError::InvalidInstructionData.into()),
        })
    }

    /// Packs a LotteryInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRound {
                entrance_fee,
                round_interval,
                callback_resource_limit,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&round_interval.to_le_bytes());
                buf.extend_from_slice(&callback_resource_limit.to_le_bytes());
            }
            Self::Enter { payment } => {
                buf.push(1);
                buf.extend_from_slice(&payment.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::BeginResolution {
                vrf_params,
                trigger_payload,
            } => {
                buf.push(3);
                buf.push(vrf_params.permission_bump);
                buf.push(vrf_params.state_bump);
                buf.extend_from_slice(trigger_payload);
            }
            Self::FulfillRandomness { request_id } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
            }
            Self::ForceReopen => buf.push(5),
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(LotteryError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let value = input
            .get(..4)
            .and_then(|slice| slice.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or(LotteryError::InvalidInstructionData)?;
        Ok((value, &input[4..]))
    }

    fn unpack_u8(input: &[u8]) -> Result<(u8, &[u8]), ProgramError> {
        let (value, rest) = input
            .split_first()
            .ok_or(LotteryError::InvalidInstructionData)?;
        Ok((*value, rest))
    }
}

/// Create initialize_round instruction
pub fn initialize_round(
    program_id: &Pubkey,
    operator: &Pubkey,
    round_account: &Pubkey,
    vrf_account: &Pubkey,
    entrance_fee: u64,
    round_interval: u64,
    callback_resource_limit: u32,
) -> Instruction {
    let data = LotteryInstruction::InitializeRound {
        entrance_fee,
        round_interval,
        callback_resource_limit,
    }
    .pack();

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*operator, true),
            AccountMeta::new(*round_account, false),
            AccountMeta::new_readonly(*vrf_account, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Create enter instruction
pub fn enter(
    program_id: &Pubkey,
    entrant: &Pubkey,
    round_account: &Pubkey,
    payment: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*entrant, true),
            AccountMeta::new(*round_account, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::Enter { payment }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, round_account: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*round_account, false)],
        data: LotteryInstruction::CheckUpkeep.pack(),
    }
}

/// Switchboard accounts needed to request randomness
#[derive(Clone, Debug)]
pub struct VrfRequestAccounts {
    pub vrf: Pubkey,
    pub oracle_queue: Pubkey,
    pub queue_authority: Pubkey,
    pub data_buffer: Pubkey,
    pub permission: Pubkey,
    pub escrow: Pubkey,
    pub payer_wallet: Pubkey,
    pub payer_authority: Pubkey,
    pub program_state: Pubkey,
    pub switchboard_program: Pubkey,
}

/// Create begin_resolution instruction
pub fn begin_resolution(
    program_id: &Pubkey,
    trigger: &Pubkey,
    round_account: &Pubkey,
    vrf_accounts: &VrfRequestAccounts,
    vrf_params: VrfParams,
    trigger_payload: Vec<u8>,
) -> Instruction {
    #[allow(deprecated)]
    let recent_blockhashes = solana_program::sysvar::recent_blockhashes::id();

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*trigger, true),
            AccountMeta::new(*round_account, false),
            AccountMeta::new(vrf_accounts.vrf, false),
            AccountMeta::new(vrf_accounts.oracle_queue, false),
            AccountMeta::new_readonly(vrf_accounts.queue_authority, false),
            AccountMeta::new_readonly(vrf_accounts.data_buffer, false),
            AccountMeta::new(vrf_accounts.permission, false),
            AccountMeta::new(vrf_accounts.escrow, false),
            AccountMeta::new(vrf_accounts.payer_wallet, false),
            AccountMeta::new_readonly(vrf_accounts.payer_authority, true),
            AccountMeta::new_readonly(recent_blockhashes, false),
            AccountMeta::new_readonly(vrf_accounts.program_state, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(vrf_accounts.switchboard_program, false),
        ],
        data: LotteryInstruction::BeginResolution {
            vrf_params,
            trigger_payload,
        }
        .pack(),
    }
}

/// Create fulfill_randomness instruction
pub fn fulfill_randomness(
    program_id: &Pubkey,
    round_account: &Pubkey,
    vrf_account: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*round_account, false),
            AccountMeta::new_readonly(*vrf_account, false),
            AccountMeta::new(*winner, false),
        ],
        data: LotteryInstruction::FulfillRandomness { request_id }.pack(),
    }
}

/// Create force_reopen instruction
pub fn force_reopen(program_id: &Pubkey, operator: &Pubkey, round_account: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*operator, true),
            AccountMeta::new(*round_account, false),
        ],
        data: LotteryInstruction::ForceReopen.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_initialize_round_layout() {
        let mut data = vec![0u8];
        data.extend_from_slice(&100u64.to_le_bytes());
        data.extend_from_slice(&30u64.to_le_bytes());
        data.extend_from_slice(&500_000u32.to_le_bytes());

        assert_eq!(
            LotteryInstruction::unpack(&data).unwrap(),
            LotteryInstruction::InitializeRound {
                entrance_fee: 100,
                round_interval: 30,
                callback_resource_limit: 500_000,
            }
        );
    }

    #[test]
    fn test_begin_resolution_keeps_trigger_payload() {
        let instruction = LotteryInstruction::BeginResolution {
            vrf_params: VrfParams {
                permission_bump: 254,
                state_bump: 253,
            },
            trigger_payload: b"cron".to_vec(),
        };
        let data = instruction.pack();

        assert_eq!(&data[..3], &[3, 254, 253]);
        assert_eq!(LotteryInstruction::unpack(&data).unwrap(), instruction);
    }

    #[test]
    fn test_unpack_rejects_truncated_data() {
        let err = ProgramError::from(LotteryError::InvalidInstructionData);

        assert_eq!(LotteryInstruction::unpack(&[]), Err(err.clone()));
        assert_eq!(LotteryInstruction::unpack(&[1, 0, 0]), Err(err.clone()));
        assert_eq!(LotteryInstruction::unpack(&[3, 1]), Err(err.clone()));
        assert_eq!(LotteryInstruction::unpack(&[42]), Err(err));
    }

    #[test]
    fn test_fulfill_randomness_accounts() {
        let program_id = Pubkey::new_unique();
        let round = Pubkey::new_unique();
        let vrf = Pubkey::new_unique();
        let winner = Pubkey::new_unique();

        let instruction = fulfill_randomness(&program_id, &round, &vrf, &winner, 9);

        assert_eq!(instruction.accounts[0], AccountMeta::new(round, false));
        assert_eq!(instruction.accounts[1], AccountMeta::new_readonly(vrf, false));
        assert_eq!(instruction.accounts[2], AccountMeta::new(winner, false));
        assert_eq!(
            LotteryInstruction::unpack(&instruction.data).unwrap(),
            LotteryInstruction::FulfillRandomness { request_id: 9 }
        );
    }
}
