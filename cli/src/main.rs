//! Binary entrypoint for fontpull-cli (made by FontLab https://www.fontlab.com/)

fn main() {
    if let Err(err) = fontpull_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
