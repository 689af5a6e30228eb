use modweave::cli;
use modweave::ui::output;

fn main() {
    if let Err(err) = cli::run() {
        output::error(output::format_error_chain(&*err));
        std::process::exit(1);
    }
}
