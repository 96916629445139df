mod command;
mod tc;
mod users;

pub use command::{Cli, Command};
pub use tc::run;
pub use users::{User, UserStore};
