// Switchboard VRF integration for the lottery coordinator
use borsh::BorshSerialize;
use solana_program::{
    account_info::AccountInfo,
    hash::hash,
    instruction::{AccountMeta, Instruction},
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
};
use std::convert::TryFrom;
use switchboard_v2::{VrfAccountData, VrfStatus, SWITCHBOARD_PROGRAM_ID};

use crate::{
    coordinator::{RandomnessProvider, RandomnessRequest},
    error::LotteryError,
    utils::random_values_from_result,
};

/// Bytes of randomness a Switchboard VRF account holds per request
const VRF_RESULT_LEN: usize = 32;

#[derive(BorshSerialize)]
struct VrfRequestRandomnessParams {
    permission_bump: u8,
    state_bump: u8,
}

/// Bumps of the Switchboard permission and program state PDAs. Opaque to
/// the coordinator, supplied by whoever triggers the resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VrfParams {
    pub permission_bump: u8,
    pub state_bump: u8,
}

/// Requests randomness from a Switchboard VRF account whose authority is the
/// round PDA.
///
/// The id handed back is the VRF account's request counter after this
/// request, so a delivery can be matched against the counter it carries.
/// Switchboard fixes the callback and its compute budget when the VRF
/// account is created; the request itself carries no budget.
pub struct SwitchboardVrf<'a, 'b> {
    pub authority: &'b AccountInfo<'a>,
    pub vrf: &'b AccountInfo<'a>,
    pub oracle_queue: &'b AccountInfo<'a>,
    pub queue_authority: &'b AccountInfo<'a>,
    pub data_buffer: &'b AccountInfo<'a>,
    pub permission: &'b AccountInfo<'a>,
    pub escrow: &'b AccountInfo<'a>,
    pub payer_wallet: &'b AccountInfo<'a>,
    pub payer_authority: &'b AccountInfo<'a>,
    pub recent_blockhashes: &'b AccountInfo<'a>,
    pub program_state: &'b AccountInfo<'a>,
    pub token_program: &'b AccountInfo<'a>,
    pub switchboard_program: &'b AccountInfo<'a>,
    pub params: VrfParams,
    /// Seeds of the authority PDA, bump included
    pub authority_seeds: &'b [&'b [u8]],
}

impl<'a, 'b> SwitchboardVrf<'a, 'b> {
    fn validate(&self) -> Result<(), ProgramError> {
        if *self.switchboard_program.key != SWITCHBOARD_PROGRAM_ID {
            msg!("Unexpected Switchboard program {}", self.switchboard_program.key);
            return Err(ProgramError::IncorrectProgramId);
        }
        if *self.vrf.owner != SWITCHBOARD_PROGRAM_ID {
            msg!("VRF account not owned by Switchboard program");
            return Err(ProgramError::InvalidAccountOwner);
        }
        if *self.token_program.key != spl_token::id() {
            msg!("Unexpected token program {}", self.token_program.key);
            return Err(ProgramError::IncorrectProgramId);
        }
        #[allow(deprecated)]
        let recent_blockhashes_id = solana_program::sysvar::recent_blockhashes::id();
        if *self.recent_blockhashes.key != recent_blockhashes_id {
            msg!("Recent blockhashes sysvar expected");
            return Err(ProgramError::InvalidArgument);
        }
        if !self.payer_authority.is_signer {
            msg!("Payer authority must sign the VRF request");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(())
    }

    fn request_instruction(&self) -> Result<Instruction, ProgramError> {
        let mut data = hash(b"global:vrf_request_randomness").to_bytes()[..8].to_vec();
        VrfRequestRandomnessParams {
            permission_bump: self.params.permission_bump,
            state_bump: self.params.state_bump,
        }
        .serialize(&mut data)
        .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;

        Ok(Instruction {
            program_id: SWITCHBOARD_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new_readonly(*self.authority.key, true),
                AccountMeta::new(*self.vrf.key, false),
                AccountMeta::new(*self.oracle_queue.key, false),
                AccountMeta::new_readonly(*self.queue_authority.key, false),
                AccountMeta::new_readonly(*self.data_buffer.key, false),
                AccountMeta::new(*self.permission.key, false),
                AccountMeta::new(*self.escrow.key, false),
                AccountMeta::new(*self.payer_wallet.key, false),
                AccountMeta::new_readonly(*self.payer_authority.key, true),
                AccountMeta::new_readonly(*self.recent_blockhashes.key, false),
                AccountMeta::new_readonly(*self.program_state.key, false),
                AccountMeta::new_readonly(*self.token_program.key, false),
            ],
            data,
        })
    }
}

impl<'a, 'b> RandomnessProvider for SwitchboardVrf<'a, 'b> {
    fn request(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError> {
        self.validate()?;

        if request.num_words as usize * 8 > VRF_RESULT_LEN {
            msg!("Cannot derive {} words from one VRF result", request.num_words);
            return Err(ProgramError::InvalidArgument);
        }

        let vrf_request_id = {
            let vrf = VrfAccountData::new(self.vrf)?;
            check_authority(&vrf, self.authority.key)?;
            let counter = vrf.counter;
            let next = counter.checked_add(1).ok_or(ProgramError::InvalidAccountData)?;
            request_id_from_counter(next)?
        };
        msg!(
            "Requesting {} word(s), {} confirmations, round request {}, VRF request {}",
            request.num_words,
            request.request_confirmations,
            request.request_id,
            vrf_request_id
        );

        let instruction = self.request_instruction()?;
        invoke_signed(
            &instruction,
            &[
                self.authority.clone(),
                self.vrf.clone(),
                self.oracle_queue.clone(),
                self.queue_authority.clone(),
                self.data_buffer.clone(),
                self.permission.clone(),
                self.escrow.clone(),
                self.payer_wallet.clone(),
                self.payer_authority.clone(),
                self.recent_blockhashes.clone(),
                self.program_state.clone(),
                self.token_program.clone(),
                self.switchboard_program.clone(),
            ],
            &[self.authority_seeds],
        )?;

        msg!("VRF randomness request {} submitted", vrf_request_id);
        Ok(vrf_request_id)
    }
}

/// Randomness read back from the VRF account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VrfDelivery {
    /// Request counter of the VRF account that produced the values
    pub request_id: u64,
    pub random_values: Vec<u64>,
}

fn request_id_from_counter(counter: u128) -> Result<u64, ProgramError> {
    u64::try_from(counter).map_err(|_| {
        msg!("VRF request counter {} out of range", counter);
        ProgramError::InvalidAccountData
    })
}

fn check_authority(vrf: &VrfAccountData, authority: &Pubkey) -> Result<(), ProgramError> {
    let vrf_authority = vrf.authority;
    if vrf_authority != *authority {
        msg!("VRF authority {} is not the round account {}", vrf_authority, authority);
        return Err(ProgramError::InvalidAccountData);
    }
    Ok(())
}

/// Check that the VRF account is a Switchboard VRF account controlled by
/// `authority`.
pub fn check_vrf_authority(vrf_account_info: &AccountInfo, authority: &Pubkey) -> Result<(), ProgramError> {
    if *vrf_account_info.owner != SWITCHBOARD_PROGRAM_ID {
        msg!("VRF account not owned by Switchboard program");
        return Err(ProgramError::InvalidAccountOwner);
    }
    let vrf = VrfAccountData::new(vrf_account_info)?;
    check_authority(&vrf, authority)
}

/// Read the verified randomness out of the registered VRF account.
///
/// Only the VRF account recorded at initialization, owned by the
/// Switchboard program, is accepted as the source of the callback. The
/// result must have passed verification.
pub fn read_randomness(
    vrf_account_info: &AccountInfo,
    registered: &Pubkey,
) -> Result<VrfDelivery, ProgramError> {
    if vrf_account_info.key != registered {
        msg!("VRF account {} is not the registered provider", vrf_account_info.key);
        return Err(LotteryError::UnauthorizedCallback.into());
    }
    if *vrf_account_info.owner != SWITCHBOARD_PROGRAM_ID {
        msg!("VRF account not owned by Switchboard program");
        return Err(LotteryError::UnauthorizedCallback.into());
    }

    let vrf = VrfAccountData::new(vrf_account_info)?;
    let status = vrf.status;
    if !matches!(status, VrfStatus::StatusVerified | VrfStatus::StatusCallbackSuccess) {
        msg!("VRF result has not been verified");
        return Err(LotteryError::RandomnessNotReady.into());
    }
    let result = vrf
        .get_result()
        .map_err(|_| ProgramError::from(LotteryError::RandomnessNotReady))?;
    if result == [0u8; VRF_RESULT_LEN] {
        return Err(LotteryError::RandomnessNotReady.into());
    }

    Ok(VrfDelivery {
        request_id: request_id_from_counter(vrf.counter)?,
        random_values: random_values_from_result(&result),
    })
}
