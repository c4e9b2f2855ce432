//! User handlers.

mod register_user;

pub use register_user::{RegisterUserCommand, RegisterUserHandler, RegisterUserResult};
