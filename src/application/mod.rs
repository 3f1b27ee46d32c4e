//! Application layer: the signing router and its strategies, channel account leasing,
//! distribution account resolution, and the services built on top of them.

pub mod channel_accounts;
pub mod leasing;
pub mod resolver;
pub mod signature_service;
pub mod signing;
