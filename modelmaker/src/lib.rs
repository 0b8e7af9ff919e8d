pub mod cli;
mod inspect;
mod io;
mod logging;
mod make;

pub use make::run_make;
