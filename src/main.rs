use ttsctl::cli::Cli;

fn main() {
    // Parse arguments, run the command and exit with its status
    std::process::exit(Cli::run());
}
