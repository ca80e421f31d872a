//! Shell completion scripts.

use clap::CommandFactory;
use clap_complete::Shell;

pub fn run<C: CommandFactory>(shell: Shell) {
    let mut command = C::command();
    clap_complete::generate(shell, &mut command, "nexus-streamer", &mut std::io::stdout());
}
