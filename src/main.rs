fn main() -> Result<(), Box<dyn std::error::Error>> {
    webpane::cli::run()
}
