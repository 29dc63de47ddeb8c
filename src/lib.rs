pub mod announcer;
pub mod archiver;
pub mod auth;
pub mod channel;
pub mod config;
pub mod conversations;
pub mod destalinator;
pub mod flagger;
pub mod markup;
pub mod scheduler;
pub mod slacker;
pub mod user;
pub mod warner;

#[cfg(test)]
pub(crate) mod testing;
