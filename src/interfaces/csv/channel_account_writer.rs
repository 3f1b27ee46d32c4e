use crate::domain::account::ChannelAccount;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

const HEADER: [&str; 3] = [
    "public_key",
    "locked_at_ledger_number",
    "locked_until_ledger_number",
];

/// The displayed columns of a channel account. The encrypted key is never written out.
#[derive(Serialize)]
struct ChannelAccountRow<'a> {
    public_key: &'a str,
    locked_at_ledger_number: Option<u32>,
    locked_until_ledger_number: Option<u32>,
}

impl<'a> From<&'a ChannelAccount> for ChannelAccountRow<'a> {
    fn from(account: &'a ChannelAccount) -> Self {
        Self {
            public_key: &account.public_key,
            locked_at_ledger_number: account.locked_at_ledger_number,
            locked_until_ledger_number: account.locked_until_ledger_number,
        }
    }
}

/// Writes channel account lease state as CSV.
pub struct ChannelAccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ChannelAccountWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        Self { writer }
    }

    /// Writes the header followed by one row per account. Unleased accounts have empty
    /// ledger columns.
    pub fn write_accounts(&mut self, accounts: &[ChannelAccount]) -> Result<()> {
        self.writer.write_record(HEADER)?;
        for account in accounts {
            self.writer.serialize(ChannelAccountRow::from(account))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
