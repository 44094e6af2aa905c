//! `gatehouse completions`
//!
//! Carried from the teacher's `cli::completions::handle_completions` as-is:
//! pure CLI polish, no feature-scope implications.

use super::{Cli, CompletionsArgs};
use clap::CommandFactory;
use clap_complete::generate;
use std::io;

pub fn run(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, bin_name, &mut io::stdout());
}
