//! Domain types and the ports the signing engine talks to.

pub mod account;
pub mod envelope;
pub mod keypair;
pub mod ports;
pub mod tenant;
