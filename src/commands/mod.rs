pub mod deploy;
pub mod login;
pub mod logout;
pub mod logs;
pub mod status;
