pub mod channel_account_writer;
