use arrayref::array_ref;
use solana_program::pubkey::Pubkey;

use crate::state::{NUM_WORDS, ROUND_SEED};

/// Find the program derived address of the round account
pub fn find_round_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ROUND_SEED], program_id)
}

/// Split a 32-byte VRF result into the requested number of u64 words,
/// reading little-endian 8-byte chunks.
pub fn random_values_from_result(result: &[u8; 32]) -> Vec<u64> {
    (0..NUM_WORDS as usize)
        .map(|i| u64::from_le_bytes(*array_ref![result, i * 8, 8]))
        .collect()
}
