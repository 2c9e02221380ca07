fn main() {
    if let Err(err) = chart_declutter::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
