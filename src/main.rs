fn main() {
    oven_sync::cli::run();
}
