fn main() {
    if let Err(err) = phylorender::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
