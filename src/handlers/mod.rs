pub mod history;
pub mod repl;
pub mod run;
