use std::path::Path;

use anyhow::Result;

use crate::ledger::{Book, BookLedger};

use super::bag::TokenBag;

/// Coordinates the book ledger and the token bag.
///
/// The Secretary is the only component that mutates both: it chooses books
/// in the ledger and mints the matching tokens in the bag, always ledger
/// first. `commit` persists in the same order, so after a crash the ledger
/// can claim a book whose token was never written (recoverable by choosing
/// again after an operator clears the ledger row) but a token can never
/// exist for a book the ledger does not know is chosen.
pub struct Secretary {
    ledger: BookLedger,
    bag: TokenBag,
}

impl Secretary {
    pub fn new(ledger: BookLedger, bag: TokenBag) -> Self {
        Self { ledger, bag }
    }

    pub fn ledger(&self) -> &BookLedger {
        &self.ledger
    }

    pub fn bag(&self) -> &TokenBag {
        &self.bag
    }

    pub fn bag_size(&self) -> usize {
        self.bag.size()
    }

    /// Chooses one specific book: marks it chosen in the ledger, then mints
    /// its token into the bag. Fails without touching the bag if the ledger
    /// rejects the choice.
    pub fn choose_book(&mut self, barcode: &str) -> Result<()> {
        self.ledger.choose_book(barcode)?;
        self.bag.add_book(barcode);
        Ok(())
    }

    /// Chooses up to `count` unprocessed books in ledger file order.
    ///
    /// Returns the barcodes actually chosen; fewer than `count` means the
    /// ledger ran out of unprocessed books.
    pub fn choose_books(&mut self, count: usize) -> Result<Vec<String>> {
        let candidates: Vec<String> = self
            .ledger
            .all_unprocessed()
            .iter()
            .take(count)
            .map(|b| b.barcode.clone())
            .collect();
        for barcode in &candidates {
            self.choose_book(barcode)?;
        }
        tracing::info!("chose {} of {} requested books", candidates.len(), count);
        Ok(candidates)
    }

    /// Marks a book completed in the ledger. By this point the token has
    /// left the bag long ago, so only the ledger changes.
    pub fn mark_book_completed(&mut self, barcode: &str) -> Result<&Book> {
        self.ledger.mark_completed(barcode)
    }

    /// Pours every staged token into a pipeline bucket.
    pub fn pour_bag(&mut self, bucket: &Path) -> Result<usize> {
        self.bag.pour_into(bucket)
    }

    /// Persists ledger then bag.
    pub fn commit(&self) -> Result<()> {
        self.ledger.write_ledger(true)?;
        self.bag.dump()?;
        Ok(())
    }

    /// Hands out mutable access for the staging step.
    pub fn bag_mut(&mut self) -> &mut TokenBag {
        &mut self.bag
    }
}
