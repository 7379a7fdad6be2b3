//! DTO module
//!
//! Request and response shapes of the REST surface.

pub mod chat_dto;
pub mod session_dto;
