fn main() {
    if let Err(e) = taskdeck_lib::run() {
        eprintln!("[TASKDECK] {}", e);
        std::process::exit(1);
    }
}
