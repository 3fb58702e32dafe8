//! Contact domain types.
//!
//! A [`ContactDto`] is what arrives inside the message envelope. It is mapped
//! once into a [`Contact`], stamped with the processing time, handed to the
//! store and then dropped.

pub mod dto;
pub mod entity;
pub mod region;

pub use dto::{ContactDto, DtoError};
pub use entity::Contact;
pub use region::region_for_area_code;
