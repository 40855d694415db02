fn main() {
    if let Err(e) = nuclex_framework::core::Engine::run() {
        eprintln!("Engine failed to start: {}", e);
        std::process::exit(1);
    }
}
