pub mod app;
pub mod commands;
pub mod compile;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod plan;
pub mod replay;
pub mod run;
pub mod runtime;
pub mod serve;

pub use app::run;
