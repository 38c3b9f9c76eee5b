use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};
use crate::{
    error::LotteryError,
    events::ProgramLog,
    instruction::LotteryInstruction,
    payout::LamportPayout,
    state::{Round, RoundConfig, ROUND_SEED},
    utils::find_round_address,
    vrf::{check_vrf_authority, read_randomness, SwitchboardVrf, VrfParams},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::InitializeRound {
                entrance_fee,
                round_interval,
                callback_resource_limit,
            } => {
                msg!("Instruction: Initialize Round");
                Self::process_initialize_round(
                    accounts,
                    entrance_fee,
                    round_interval,
                    callback_resource_limit,
                    program_id,
                )
            }
            LotteryInstruction::Enter { payment } => {
                msg!("Instruction: Enter");
                Self::process_enter(accounts, payment, program_id)
            }
            LotteryInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            LotteryInstruction::BeginResolution { vrf_params, .. } => {
                msg!("Instruction: Begin Resolution");
                Self::process_begin_resolution(accounts, vrf_params, program_id)
            }
            LotteryInstruction::FulfillRandomness { request_id } => {
                msg!("Instruction: Fulfill Randomness");
                Self::process_fulfill_randomness(accounts, request_id, program_id)
            }
            LotteryInstruction::ForceReopen => {
                msg!("Instruction: Force Reopen");
                Self::process_force_reopen(accounts, program_id)
            }
        }
    }

    /// Load the round account, checking it is the program's round PDA
    fn load_round(round_info: &AccountInfo, program_id: &Pubkey) -> Result<Round, ProgramError> {
        if round_info.owner != program_id {
            msg!("Round account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let round = Round::unpack(&round_info.data.borrow())?;
        let expected = Pubkey::create_program_address(&[ROUND_SEED, &[round.bump()]], program_id)?;
        if *round_info.key != expected {
            msg!("Invalid round account address");
            return Err(ProgramError::InvalidArgument);
        }
        Ok(round)
    }

    fn store_round(round: Round, round_info: &AccountInfo) -> ProgramResult {
        Round::pack(round, &mut round_info.data.borrow_mut())
    }

    fn process_initialize_round(
        accounts: &[AccountInfo],
        entrance_fee: u64,
        round_interval: u64,
        callback_resource_limit: u32,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let operator_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vrf_account_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !operator_info.is_signer {
            msg!("Operator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if entrance_fee == 0 {
            msg!("Entrance fee must be greater than zero");
            return Err(ProgramError::InvalidArgument);
        }
        if callback_resource_limit == 0 {
            msg!("Callback resource limit must be greater than zero");
            return Err(ProgramError::InvalidArgument);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (expected_round_pubkey, bump_seed) = find_round_address(program_id);
        if *round_info.key != expected_round_pubkey {
            msg!("Invalid round account address");
            return Err(ProgramError::InvalidArgument);
        }
        check_vrf_authority(vrf_account_info, &expected_round_pubkey)?;

        if round_info.owner == program_id {
            if let Ok(existing) = Round::unpack_unchecked(&round_info.data.borrow()) {
                if existing.is_initialized() {
                    msg!("Round account is already initialized");
                    return Err(ProgramError::AccountAlreadyInitialized);
                }
            }
        } else {
            Self::create_round_account(
                operator_info,
                round_info,
                system_program_info,
                bump_seed,
                program_id,
            )?;
        }

        let now = Clock::get()?.unix_timestamp;
        let config = RoundConfig {
            operator: *operator_info.key,
            randomness_account: *vrf_account_info.key,
            entrance_fee,
            round_interval,
            callback_resource_limit,
        };
        Self::store_round(Round::new(config, bump_seed, now), round_info)?;

        msg!(
            "Round initialized: Operator={}, VRF={}, EntranceFee={}, Interval={}s",
            operator_info.key,
            vrf_account_info.key,
            entrance_fee,
            round_interval
        );
        Ok(())
    }

    /// Create the round PDA. The address is fixed, so lamports sent to it
    /// ahead of time must not block creation: a funded address is topped up
    /// to rent exemption, then allocated and assigned in place.
    fn create_round_account<'a>(
        operator_info: &AccountInfo<'a>,
        round_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        bump_seed: u8,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let rent = Rent::get()?;
        let required_lamports = rent.minimum_balance(Round::LEN);
        let signer_seeds: &[&[u8]] = &[ROUND_SEED, &[bump_seed]];

        if round_info.lamports() == 0 {
            msg!("Creating round account");
            return invoke_signed(
                &system_instruction::create_account(
                    operator_info.key,
                    round_info.key,
                    required_lamports,
                    Round::LEN as u64,
                    program_id,
                ),
                &[
                    operator_info.clone(),
                    round_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            );
        }

        msg!("Round address already holds {} lamports", round_info.lamports());
        let shortfall = required_lamports.saturating_sub(round_info.lamports());
        if shortfall > 0 {
            invoke(
                &system_instruction::transfer(operator_info.key, round_info.key, shortfall),
                &[
                    operator_info.clone(),
                    round_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(round_info.key, Round::LEN as u64),
            &[round_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(round_info.key, program_id),
            &[round_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }

    fn process_enter(accounts: &[AccountInfo], payment: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let entrant_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !entrant_info.is_signer {
            msg!("Entrant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut round = Self::load_round(round_info, program_id)?;
        round.enter(*entrant_info.key, payment, &mut ProgramLog)?;

        invoke(
            &system_instruction::transfer(entrant_info.key, round_info.key, payment),
            &[
                entrant_info.clone(),
                round_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        msg!(
            "Entered with {} lamports: slots={}, pool={}",
            payment,
            round.participant_count(),
            round.pool_balance()
        );
        Self::store_round(round, round_info)
    }

    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let round_info = next_account_info(account_info_iter)?;

        let round = Self::load_round(round_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        let ready = round.is_ready(now);

        msg!(
            "Upkeep needed: {} (state={:?}, slots={}, pool={}, last reset={})",
            ready,
            round.state(),
            round.participant_count(),
            round.pool_balance(),
            round.last_resolution_time()
        );
        set_return_data(&[ready as u8]);
        Ok(())
    }

    fn process_begin_resolution(
        accounts: &[AccountInfo],
        vrf_params: VrfParams,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let trigger_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vrf_account_info = next_account_info(account_info_iter)?;
        let oracle_queue_info = next_account_info(account_info_iter)?;
        let queue_authority_info = next_account_info(account_info_iter)?;
        let data_buffer_info = next_account_info(account_info_iter)?;
        let permission_info = next_account_info(account_info_iter)?;
        let escrow_info = next_account_info(account_info_iter)?;
        let payer_wallet_info = next_account_info(account_info_iter)?;
        let payer_authority_info = next_account_info(account_info_iter)?;
        let recent_blockhashes_info = next_account_info(account_info_iter)?;
        let program_state_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let switchboard_program_info = next_account_info(account_info_iter)?;

        // Anyone can trigger; readiness is checked by the coordinator
        if !trigger_info.is_signer {
            msg!("Trigger must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut round = Self::load_round(round_info, program_id)?;
        if *vrf_account_info.key != round.config().randomness_account {
            msg!("VRF account does not match the one registered with this round");
            return Err(ProgramError::InvalidArgument);
        }

        let bump = [round.bump()];
        let authority_seeds: &[&[u8]] = &[ROUND_SEED, &bump];
        let mut provider = SwitchboardVrf {
            authority: round_info,
            vrf: vrf_account_info,
            oracle_queue: oracle_queue_info,
            queue_authority: queue_authority_info,
            data_buffer: data_buffer_info,
            permission: permission_info,
            escrow: escrow_info,
            payer_wallet: payer_wallet_info,
            payer_authority: payer_authority_info,
            recent_blockhashes: recent_blockhashes_info,
            program_state: program_state_info,
            token_program: token_program_info,
            switchboard_program: switchboard_program_info,
            params: vrf_params,
            authority_seeds,
        };

        let now = Clock::get()?.unix_timestamp;
        let request_id = round.begin_resolution(now, &mut provider, &mut ProgramLog)?;

        msg!("Round calculating, awaiting request {}", request_id);
        Self::store_round(round, round_info)
    }

    fn process_fulfill_randomness(
        accounts: &[AccountInfo],
        request_id: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let round_info = next_account_info(account_info_iter)?;
        let vrf_account_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut round = Self::load_round(round_info, program_id)?;
        let delivery = read_randomness(vrf_account_info, &round.config().randomness_account)?;
        if delivery.request_id != request_id {
            msg!(
                "VRF account answers request {}, callback claims {}",
                delivery.request_id,
                request_id
            );
            return Err(LotteryError::UnauthorizedCallback.into());
        }

        let mut payout = LamportPayout {
            pool: round_info,
            recipient: winner_info,
            rent: Rent::get()?,
        };
        let now = Clock::get()?.unix_timestamp;
        let winner = round.resolve(
            delivery.request_id,
            &delivery.random_values,
            now,
            &mut payout,
            &mut ProgramLog,
        )?;

        msg!("Request {} resolved, winner {}", request_id, winner);
        Self::store_round(round, round_info)
    }

    fn process_force_reopen(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let operator_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        if !operator_info.is_signer {
            msg!("Operator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut round = Self::load_round(round_info, program_id)?;
        round.force_reopen(operator_info.key)?;

        msg!("Round reopened by operator {}", operator_info.key);
        Self::store_round(round, round_info)
    }
}
