//! Data model for raw tracker records and the field transitions they carry.

pub mod event;
pub mod raw;
