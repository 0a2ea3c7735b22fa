#![doc = include_str!("../README.md")]

// Public modules
mod common;
mod error;
mod finger_table;
mod key_store;
mod ring;

pub use crate::common::{Id, IdSpace};
pub use crate::error::{Error, Result};
pub use crate::finger_table::FingerTable;
pub use crate::key_store::{KeyStore, Value};
pub use crate::ring::{Lookup, LookupValue, Ring};
