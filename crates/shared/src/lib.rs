//! Wire models and measurement math shared by the PhotoMOA backend and web client.

pub mod calc;
pub mod models;
pub mod scale;
