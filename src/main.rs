fn main() {
    if let Err(err) = taxi_lens::run() {
        eprintln!("error: {err:#}");
        if let Some(hint) = taxi_lens::hint(&err) {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}
