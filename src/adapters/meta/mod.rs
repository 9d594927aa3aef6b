//! Messenger and Instagram webhook intake.

pub mod messaging;
