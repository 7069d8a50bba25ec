//! # photo-mill CLI
//!
//! Command-line interface for the adaptive batch converter.
//!
//! ## Usage
//! ```bash
//! photo-mill convert ~/Photos ~/Photos-processed --max-side 3000
//! photo-mill convert ~/Photos ./out --no-raw --output-format json
//! ```

mod cli;

use photo_mill::Result;

fn main() -> Result<()> {
    cli::run()
}
