use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    loghunks::apps::run_loghunks(std::env::args().skip(1))
}
