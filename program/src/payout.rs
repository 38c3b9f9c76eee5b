use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey, rent::Rent,
};

use crate::coordinator::FundTransfer;

/// Pays out of the program-owned round account by moving lamports directly.
/// The round account never drops below its rent-exempt reserve.
pub struct LamportPayout<'a, 'b> {
    pub pool: &'b AccountInfo<'a>,
    pub recipient: &'b AccountInfo<'a>,
    pub rent: Rent,
}

impl<'a, 'b> LamportPayout<'a, 'b> {
    /// Lamports held above the rent-exempt reserve
    pub fn available(&self) -> u64 {
        let reserve = self.rent.minimum_balance(self.pool.data_len());
        self.pool.lamports().saturating_sub(reserve)
    }
}

impl<'a, 'b> FundTransfer for LamportPayout<'a, 'b> {
    fn pay(&mut self, recipient: &Pubkey, amount: u64) -> ProgramResult {
        if self.recipient.key != recipient {
            msg!("Winner account {} does not match {}", self.recipient.key, recipient);
            return Err(ProgramError::InvalidArgument);
        }
        if !self.recipient.is_writable {
            msg!("Winner account must be writable");
            return Err(ProgramError::InvalidArgument);
        }
        if self.available() < amount {
            msg!("Pool holds {} lamports, {} owed", self.available(), amount);
            return Err(ProgramError::InsufficientFunds);
        }

        let pool_lamports = self
            .pool
            .lamports()
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        let recipient_lamports = self
            .recipient
            .lamports()
            .checked_add(amount)
            .ok_or(ProgramError::InvalidArgument)?;

        **self.pool.lamports.borrow_mut() = pool_lamports;
        **self.recipient.lamports.borrow_mut() = recipient_lamports;

        msg!("Paid {} lamports to {}", amount, recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::clock::Epoch;

    const RENT_EXEMPT_DATA: usize = 100;

    fn payout_fixture<'a>(
        pool_key: &'a Pubkey,
        winner_key: &'a Pubkey,
        owner: &'a Pubkey,
        pool_lamports: &'a mut u64,
        winner_lamports: &'a mut u64,
        pool_data: &'a mut [u8],
        winner_data: &'a mut [u8],
    ) -> (AccountInfo<'a>, AccountInfo<'a>) {
        let pool = AccountInfo::new(
            pool_key, false, true, pool_lamports, pool_data, owner, false, Epoch::default(),
        );
        let winner = AccountInfo::new(
            winner_key, false, true, winner_lamports, winner_data, owner, false, Epoch::default(),
        );
        (pool, winner)
    }

    #[test]
    fn test_pay_moves_lamports_above_reserve() {
        let rent = Rent::default();
        let reserve = rent.minimum_balance(RENT_EXEMPT_DATA);
        let (pool_key, winner_key, owner) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let (mut pool_lamports, mut winner_lamports) = (reserve + 300, 5);
        let (mut pool_data, mut winner_data) = (vec![0u8; RENT_EXEMPT_DATA], vec![]);
        let (pool, winner) = payout_fixture(
            &pool_key, &winner_key, &owner,
            &mut pool_lamports, &mut winner_lamports,
            &mut pool_data, &mut winner_data,
        );

        let mut payout = LamportPayout { pool: &pool, recipient: &winner, rent };
        payout.pay(&winner_key, 300).unwrap();

        assert_eq!(pool.lamports(), reserve);
        assert_eq!(winner.lamports(), 305);
    }

    #[test]
    fn test_pay_refuses_to_dip_into_reserve() {
        let rent = Rent::default();
        let reserve = rent.minimum_balance(RENT_EXEMPT_DATA);
        let (pool_key, winner_key, owner) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let (mut pool_lamports, mut winner_lamports) = (reserve + 299, 0);
        let (mut pool_data, mut winner_data) = (vec![0u8; RENT_EXEMPT_DATA], vec![]);
        let (pool, winner) = payout_fixture(
            &pool_key, &winner_key, &owner,
            &mut pool_lamports, &mut winner_lamports,
            &mut pool_data, &mut winner_data,
        );

        let mut payout = LamportPayout { pool: &pool, recipient: &winner, rent };

        assert_eq!(payout.pay(&winner_key, 300), Err(ProgramError::InsufficientFunds));
        assert_eq!(pool.lamports(), reserve + 299);
        assert_eq!(winner.lamports(), 0);
    }

    #[test]
    fn test_pay_rejects_wrong_winner_account() {
        let rent = Rent::default();
        let (pool_key, winner_key, owner) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let (mut pool_lamports, mut winner_lamports) = (u64::MAX / 2, 0);
        let (mut pool_data, mut winner_data) = (vec![0u8; RENT_EXEMPT_DATA], vec![]);
        let (pool, winner) = payout_fixture(
            &pool_key, &winner_key, &owner,
            &mut pool_lamports, &mut winner_lamports,
            &mut pool_data, &mut winner_data,
        );

        let mut payout = LamportPayout { pool: &pool, recipient: &winner, rent };

        assert_eq!(
            payout.pay(&Pubkey::new_unique(), 1),
            Err(ProgramError::InvalidArgument)
        );
        assert_eq!(winner.lamports(), 0);
    }
}
