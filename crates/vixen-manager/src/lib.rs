pub mod cmd;
pub mod commands;
pub mod npm;
pub mod project;
pub mod supervise;
pub mod templates;
