fn main() {
    #[cfg(feature = "cli")]
    confdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("confdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
