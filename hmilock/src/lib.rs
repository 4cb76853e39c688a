//! The human-interface node of a keypad door lock: password entry on a 4x4 keypad and a
//! 16x2 LCD, with every decision left to a control node on the other end of a serial link.

pub mod capture;
pub mod config;
pub mod door;
pub mod error;
pub mod keys;
pub mod link;
pub mod lockout;
pub mod protocol;
pub mod screen;
pub mod session;
pub mod sim;
pub mod ticks;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod testkit;
